use super::{base_map::BaseMap, reaper, DecayMapBuilder};
use crate::{
    common::{
        builder_utils,
        concurrent::constants::{NOTIFIER_THREAD_NAME, REAPER_THREAD_NAME},
        log_prefix, thread_name,
    },
    notification::{
        notifier::{self, ListenerRegistry},
        ListenerId, TimeoutListener,
    },
    DecayMapError, EntrySet,
};

use parking_lot::Mutex;
use std::{
    borrow::Borrow,
    collections::hash_map::RandomState,
    fmt,
    hash::{BuildHasher, Hash},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

/// A thread-safe keyed store whose entries decay: every entry is removed
/// automatically once it has not been inserted nor read for the time-to-live
/// (TTL) of the map.
///
/// The TTL is sliding. [`put`](#method.put) sets the deadline of an entry to
/// _now + TTL_, and so does every successful [`get`](#method.get). An entry that
/// reaches its deadline is _timed out_: it is removed from the map, counted by
/// [`time_out_count`](#method.time_out_count), and reported exactly once to every
/// registered timeout listener. Entries removed by [`remove`](#method.remove) or
/// [`clear`](#method.clear) are not timed out and are never reported.
///
/// # Examples
///
/// ```rust
/// use decaymap::DecayMap;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), decaymap::DecayMapError> {
/// let map = DecayMap::new(Duration::from_secs(30))?;
///
/// map.add_listener(|request_id: &u64, peer: &String| {
///     println!("no response to request {request_id} from {peer} within 30s");
/// })?;
///
/// assert_eq!(map.put(42, "10.0.0.7".to_string())?, None);
///
/// // Reading the entry extends its life for another 30 seconds.
/// assert_eq!(map.get(&42)?, Some("10.0.0.7".to_string()));
///
/// // The response arrived: remove the entry. No timeout will be reported.
/// assert_eq!(map.remove(&42)?, Some("10.0.0.7".to_string()));
/// assert_eq!(map.size(), 0);
/// assert_eq!(map.time_out_count(), 0);
/// # Ok(())
/// # }
/// ```
///
/// # Background threads
///
/// Each map owns two threads:
///
/// - The _reaper_ sleeps until the earliest deadline of the map and then times
///   out the due entries. It is woken up early when a `put` schedules an earlier
///   deadline.
/// - The _notifier_ calls the timeout listeners. Listeners never run on the
///   reaper thread nor on the caller's thread, so a slow listener can delay other
///   notifications but not the expiry of other keys.
///
/// Besides the reaper, every operation first times out the entries whose
/// deadline has already passed. Therefore an entry is never observable past its
/// deadline, even if the reaper thread has not been scheduled yet.
///
/// # Consistency
///
/// All operations on a map are linearizable. In particular, a `get` racing with
/// the expiry of the same key either refreshes the entry (and the expiry does
/// not happen) or finds it absent (and the expiry happens exactly once).
///
/// # Cloning and shutdown
///
/// Cloning a `DecayMap` is cheap: all clones share the same entries and threads.
/// The map shuts down when [`shutdown`](#method.shutdown) is called on any clone,
/// or when the last clone is dropped. After the shutdown, `put`, `get`, `remove`,
/// `clear`, `add_listener` and `run_pending_tasks` return
/// [`DecayMapError::ShutDown`], while the inspection methods report an empty map.
///
/// Note that a timeout listener holding a clone of its own map keeps the map
/// alive until `shutdown` is called explicitly.
pub struct DecayMap<K, V, S = RandomState> {
    inner: Arc<Inner<K, V, S>>,
}

struct Inner<K, V, S> {
    base: Arc<BaseMap<K, V, S>>,
    listeners: Arc<ListenerRegistry<K, V>>,
    reaper: Mutex<Option<JoinHandle<()>>>,
    notifier: Mutex<Option<JoinHandle<()>>>,
    name: Option<String>,
}

impl<K, V, S> Inner<K, V, S> {
    fn stop(&self) {
        if self.base.stop() {
            self.stop_threads();
        }
    }

    fn stop_threads(&self) {
        #[cfg(feature = "logging")]
        log::debug!("{}Shutting down", log_prefix(self.name.as_deref()));

        join_thread(&self.reaper);
        // The notifier exits after delivering the entries that have already
        // timed out.
        join_thread(&self.notifier);
    }
}

impl<K, V, S> Drop for Inner<K, V, S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_thread(handle: &Mutex<Option<JoinHandle<()>>>) {
    if let Some(handle) = handle.lock().take() {
        // A listener may shut down its own map. The notifier cannot join itself.
        if handle.thread().id() != thread::current().id() {
            let _ = handle.join();
        }
    }
}

impl<K, V, S> Clone for DecayMap<K, V, S> {
    /// Makes a clone of this shared map.
    ///
    /// This operation is cheap as it only creates thread-safe reference counted
    /// pointers to the shared internal data structures.
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, S> fmt::Debug for DecayMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = &self.inner.base;
        f.debug_struct("DecayMap")
            .field("name", &self.inner.name)
            .field("ttl", &base.ttl())
            .field("time_out_count", &base.time_out_count())
            .field("removal_count", &base.removal_count())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl<K, V> DecayMap<K, V, RandomState>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Constructs a new `DecayMap<K, V>` whose entries decay after `ttl`.
    ///
    /// To set other configuration knobs such as the `initial_capacity` or the
    /// `name`, use the [`DecayMapBuilder`][builder-struct].
    ///
    /// # Errors
    ///
    /// Returns [`DecayMapError::InvalidTtl`] if `ttl` is zero, and
    /// [`DecayMapError::TtlTooLong`] if it is longer than 1000 years.
    ///
    /// [builder-struct]: ./struct.DecayMapBuilder.html
    pub fn new(ttl: Duration) -> Result<Self, DecayMapError> {
        DecayMapBuilder::new(ttl).build()
    }

    /// Returns a [`DecayMapBuilder`][builder-struct] for a map whose entries
    /// decay after `ttl`.
    ///
    /// [builder-struct]: ./struct.DecayMapBuilder.html
    pub fn builder(ttl: Duration) -> DecayMapBuilder<K, V> {
        DecayMapBuilder::new(ttl)
    }
}

impl<K, V, S> DecayMap<K, V, S>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    pub(crate) fn with_everything(
        ttl: Duration,
        initial_capacity: Option<usize>,
        name: Option<String>,
        build_hasher: S,
        listeners: Vec<TimeoutListener<K, V>>,
    ) -> Result<Self, DecayMapError> {
        builder_utils::ensure_ttl(ttl)?;

        let registry = Arc::new(ListenerRegistry::new(name.clone()));
        for listener in listeners {
            registry.add(listener);
        }

        let (outbox, notifier) = notifier::spawn(
            Arc::clone(&registry),
            thread_name(NOTIFIER_THREAD_NAME, name.as_deref()),
        )?;

        let inner = Inner {
            base: Arc::new(BaseMap::new(ttl, initial_capacity, build_hasher, outbox)),
            listeners: registry,
            reaper: Mutex::new(None),
            notifier: Mutex::new(Some(notifier)),
            name,
        };

        // If spawning the reaper fails, dropping `inner` stops the notifier.
        let reaper = reaper::spawn(
            Arc::clone(&inner.base),
            thread_name(REAPER_THREAD_NAME, inner.name.as_deref()),
            log_prefix(inner.name.as_deref()),
        )?;
        *inner.reaper.lock() = Some(reaper);

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Inserts a key-value pair into the map, or replaces the value of an
    /// existing entry. Either way the deadline of the entry is set to
    /// _now + TTL_.
    ///
    /// Returns the replaced value, if any. Replacing a value does not count as a
    /// timeout of the old value.
    pub fn put(&self, key: K, value: V) -> Result<Option<V>, DecayMapError> {
        self.inner.base.put(Arc::new(key), value)
    }

    /// Returns a _clone_ of the value corresponding to the key, and extends the
    /// life of the entry: its deadline is reset to _now + TTL_.
    ///
    /// Returns `Ok(None)` without any side effect on the key if it is absent or
    /// has already reached its deadline.
    ///
    /// If you want to store values that will be expensive to clone, wrap them by
    /// `std::sync::Arc` before storing in a map.
    ///
    /// The key may be any borrowed form of the map's key type, but `Hash` and `Eq`
    /// on the borrowed form _must_ match those for the key type.
    pub fn get<Q>(&self, key: &Q) -> Result<Option<V>, DecayMapError>
    where
        Arc<K>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.base.get(key)
    }

    /// Removes the entry of the key and returns its value, if any.
    ///
    /// The removal is silent: it is not counted as a timeout and the timeout
    /// listeners are not called. It is counted by
    /// [`removal_count`](#method.removal_count).
    pub fn remove<Q>(&self, key: &Q) -> Result<Option<V>, DecayMapError>
    where
        Arc<K>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.base.remove(key)
    }

    /// Returns `true` if the map holds a live entry for the key. Unlike `get`,
    /// this does not extend the life of the entry.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Arc<K>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.base.contains_key(key)
    }

    /// Returns the number of live entries.
    pub fn size(&self) -> usize {
        self.inner.base.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns a point-in-time snapshot of the live entries.
    ///
    /// The snapshot holds clones of the values. It is read-only and does not
    /// reflect later changes to the map. Taking a snapshot does not extend the
    /// life of the entries.
    pub fn entry_set(&self) -> EntrySet<K, V> {
        self.inner.base.entry_set()
    }

    /// Removes all entries. Like `remove`, this is silent.
    pub fn clear(&self) -> Result<(), DecayMapError> {
        self.inner.base.clear()
    }

    /// Registers a timeout listener. The listener is called on the notifier
    /// thread once for every entry that times out from now on, including
    /// entries inserted before the registration.
    ///
    /// A listener that panics is disabled. See the
    /// [`notification`][notification-mod] module for details.
    ///
    /// [notification-mod]: ../notification/index.html
    pub fn add_listener<F>(&self, listener: F) -> Result<ListenerId, DecayMapError>
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        if self.inner.base.is_shut_down() {
            return Err(DecayMapError::ShutDown);
        }
        Ok(self.inner.listeners.add(Arc::new(listener)))
    }

    /// Unregisters a timeout listener. Returns `false` if no listener has the
    /// id.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Times out the entries whose deadline has passed, right now on the
    /// caller's thread, instead of waiting for the reaper.
    pub fn run_pending_tasks(&self) -> Result<(), DecayMapError> {
        self.inner.base.run_pending_tasks()
    }

    /// Stops the map: the entries that have already reached their deadline are
    /// timed out, the other entries are dropped without notification, and the
    /// background threads are stopped.
    ///
    /// This method blocks until the notifier has delivered the pending timeout
    /// notifications. Calling it more than once has no effect.
    pub fn shutdown(&self) {
        if self.inner.base.shutdown() {
            self.inner.stop_threads();
        }
    }
}

impl<K, V, S> DecayMap<K, V, S> {
    /// Returns the cumulative number of entries that have timed out.
    pub fn time_out_count(&self) -> u64 {
        self.inner.base.time_out_count()
    }

    /// Returns the cumulative number of entries removed explicitly by `remove`
    /// or `clear`.
    pub fn removal_count(&self) -> u64 {
        self.inner.base.removal_count()
    }

    /// Returns the number of timeout listener calls that panicked.
    pub fn listener_failure_count(&self) -> u64 {
        self.inner.listeners.failure_count()
    }

    pub fn ttl(&self) -> Duration {
        self.inner.base.ttl()
    }

    /// Returns the name of the map, as given to
    /// [`DecayMapBuilder::name`](./struct.DecayMapBuilder.html#method.name).
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.base.is_shut_down()
    }
}

#[cfg(test)]
impl<K, V, S> DecayMap<K, V, S> {
    pub(crate) fn set_expiration_clock(&self, clock: crate::common::time::Clock) {
        self.inner.base.set_expiration_clock(clock);
    }

    pub(crate) fn scheduler_len(&self) -> usize {
        self.inner.base.scheduler_len()
    }
}

// To see the debug prints, run test as `cargo test -- --nocapture`
#[cfg(test)]
mod tests {
    use super::DecayMap;
    use crate::{
        common::time::{clock::Mock, Clock},
        DecayMapError,
    };

    use crossbeam_channel::Receiver;
    use std::{hash::Hash, sync::Arc, time::Duration};

    const TTL: Duration = Duration::from_secs(10);

    fn mocked_map<K, V>() -> (DecayMap<K, V>, Arc<Mock>)
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let map = DecayMap::new(TTL).expect("failed to build");
        let (clock, mock) = Clock::mock();
        map.set_expiration_clock(clock);
        (map, mock)
    }

    fn recording_listener<K, V>(map: &DecayMap<K, V>) -> Receiver<(K, V)>
    where
        K: Clone + Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        map.add_listener(move |k: &K, v: &V| {
            tx.send((k.clone(), v.clone())).expect("receiver dropped");
        })
        .expect("failed to add listener");
        rx
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn basic_single_thread() {
        let (map, _mock) = mocked_map();

        assert_eq!(map.put("a", "alice").unwrap(), None);
        assert_eq!(map.put("b", "bob").unwrap(), None);
        assert_eq!(map.get(&"a").unwrap(), Some("alice"));
        assert_eq!(map.get(&"b").unwrap(), Some("bob"));
        assert_eq!(map.size(), 2);

        // Replace the value.
        assert_eq!(map.put("a", "anna").unwrap(), Some("alice"));
        assert_eq!(map.get(&"a").unwrap(), Some("anna"));
        assert_eq!(map.size(), 2);

        assert_eq!(map.remove(&"b").unwrap(), Some("bob"));
        assert_eq!(map.remove(&"b").unwrap(), None);
        assert_eq!(map.get(&"b").unwrap(), None);
        assert_eq!(map.get(&"c").unwrap(), None);

        assert!(map.contains_key(&"a"));
        assert!(!map.contains_key(&"b"));
        assert_eq!(map.size(), 1);
        assert!(!map.is_empty());
        assert_eq!(map.time_out_count(), 0);
        assert_eq!(map.removal_count(), 1);
    }

    #[test]
    fn sliding_time_to_live() {
        let (map, mock) = mocked_map();
        let rx = recording_listener(&map);

        map.put("a", "alice").unwrap();

        mock.increment(secs(5)); // 5 secs from the start.
        assert_eq!(map.get(&"a").unwrap(), Some("alice"));

        mock.increment(secs(5)); // 10 secs.
        map.run_pending_tasks().unwrap();
        assert_eq!(map.get(&"a").unwrap(), Some("alice"));

        mock.increment(secs(9)); // 19 secs.
        // contains_key does not extend the life of the entry.
        assert!(map.contains_key(&"a"));

        mock.increment(secs(1)); // 20 secs.
        assert_eq!(map.get(&"a").unwrap(), None);
        assert_eq!(map.size(), 0);
        assert!(map.is_empty());
        assert_eq!(map.time_out_count(), 1);

        assert_eq!(rx.recv_timeout(secs(5)), Ok(("a", "alice")));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn replaced_value_is_not_timed_out() {
        let (map, mock) = mocked_map();
        let rx = recording_listener(&map);

        map.put("a", "alice").unwrap();

        mock.increment(secs(5)); // 5 secs from the start.
        assert_eq!(map.put("a", "anna").unwrap(), Some("alice"));

        mock.increment(secs(5)); // 10 secs.
        map.run_pending_tasks().unwrap();
        assert!(map.contains_key(&"a"));
        assert_eq!(map.time_out_count(), 0);

        mock.increment(secs(5)); // 15 secs.
        assert_eq!(map.get(&"a").unwrap(), None);
        assert_eq!(map.time_out_count(), 1);

        assert_eq!(rx.recv_timeout(secs(5)), Ok(("a", "anna")));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn put_on_a_due_entry_times_out_the_old_value() {
        let (map, mock) = mocked_map();
        let rx = recording_listener(&map);

        map.put("a", "alice").unwrap();

        mock.increment(secs(10)); // 10 secs from the start.

        // The old value has reached its deadline, so it is not "replaced".
        assert_eq!(map.put("a", "anna").unwrap(), None);
        assert_eq!(map.time_out_count(), 1);
        assert_eq!(map.get(&"a").unwrap(), Some("anna"));

        assert_eq!(rx.recv_timeout(secs(5)), Ok(("a", "alice")));
    }

    #[test]
    fn explicit_removal_is_silent() {
        let (map, mock) = mocked_map();
        let rx = recording_listener(&map);

        map.put(1, "one").unwrap();
        map.put(2, "two").unwrap();
        map.put(3, "three").unwrap();
        assert_eq!(map.remove(&1).unwrap(), Some("one"));
        assert_eq!(map.scheduler_len(), 2);

        map.clear().unwrap();
        assert_eq!(map.size(), 0);
        assert_eq!(map.scheduler_len(), 0);

        mock.increment(secs(20)); // 20 secs from the start.
        map.run_pending_tasks().unwrap();

        assert_eq!(map.time_out_count(), 0);
        assert_eq!(map.removal_count(), 3);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn refreshes_leave_a_single_live_schedule() {
        let (map, mock) = mocked_map();

        map.put(0u32, 0u32).unwrap();
        for _ in 0..5_000 {
            mock.increment(Duration::from_millis(1));
            assert_eq!(map.get(&0).unwrap(), Some(0));
        }
        assert_eq!(map.size(), 1);
        assert_eq!(map.scheduler_len(), 1);

        mock.increment(TTL);
        assert_eq!(map.size(), 0);
        assert_eq!(map.scheduler_len(), 0);
        assert_eq!(map.time_out_count(), 1);
    }

    #[test]
    fn entry_set_is_a_disconnected_snapshot() {
        let (map, mock) = mocked_map();

        map.put("a", "alice").unwrap();
        map.put("b", "bob").unwrap();

        mock.increment(secs(5)); // 5 secs from the start.
        let snapshot = map.entry_set();

        map.put("c", "cindy").unwrap();
        map.put("b", "bill").unwrap();
        assert_eq!(map.remove(&"a").unwrap(), Some("alice"));

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(&"a"), Some(&"alice"));
        assert_eq!(snapshot.get(&"b"), Some(&"bob"));
        assert!(!snapshot.contains_key(&"c"));

        let mut entry = snapshot.into_iter().next().expect("empty snapshot");
        assert!(matches!(
            entry.set_value("mallory"),
            Err(DecayMapError::ReadOnlySnapshot)
        ));

        // Taking a snapshot does not extend the life of the entries.
        map.put("d", "david").unwrap();
        let snapshot = map.entry_set();
        mock.increment(secs(10)); // 15 secs.
        assert_eq!(snapshot.len(), 3);
        assert!(map.entry_set().is_empty());
    }

    #[test]
    fn listener_added_after_put_is_notified_once() {
        let (map, mock) = mocked_map();

        map.put("a", "alice").unwrap();
        map.put("b", "bob").unwrap();
        let rx = recording_listener(&map);
        map.remove(&"b").unwrap();

        mock.increment(secs(10)); // 10 secs from the start.
        map.run_pending_tasks().unwrap();
        map.run_pending_tasks().unwrap();

        assert_eq!(rx.recv_timeout(secs(5)), Ok(("a", "alice")));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn removed_listener_is_not_notified() {
        let (map, mock) = mocked_map();
        let (tx, rx) = crossbeam_channel::unbounded();
        let id = map
            .add_listener(move |k: &u8, _v: &u8| tx.send(*k).unwrap())
            .unwrap();

        map.put(1, 1).unwrap();
        mock.increment(secs(10)); // 10 secs from the start.
        map.run_pending_tasks().unwrap();
        assert_eq!(rx.recv_timeout(secs(5)), Ok(1));

        assert!(map.remove_listener(id));
        map.put(2, 2).unwrap();
        mock.increment(secs(10)); // 20 secs.
        map.run_pending_tasks().unwrap();

        assert_eq!(map.time_out_count(), 2);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn panicking_listener_does_not_stop_notifications() {
        let (map, mock) = mocked_map();
        map.add_listener(|_k: &u32, _v: &u32| panic!("listener panicked on purpose"))
            .unwrap();
        let rx = recording_listener(&map);

        map.put(1, 10).unwrap();
        map.put(2, 20).unwrap();
        mock.increment(secs(10)); // 10 secs from the start.
        map.run_pending_tasks().unwrap();

        assert_eq!(rx.recv_timeout(secs(5)), Ok((1, 10)));
        assert_eq!(rx.recv_timeout(secs(5)), Ok((2, 20)));
        // The panicking listener was disabled after the first call.
        assert_eq!(map.listener_failure_count(), 1);

        // The map itself is not affected.
        map.put(3, 30).unwrap();
        assert_eq!(map.get(&3).unwrap(), Some(30));
        assert_eq!(map.time_out_count(), 2);
    }

    #[test]
    fn operations_after_shutdown() {
        let (map, mock) = mocked_map();
        let rx = recording_listener(&map);
        let map2 = map.clone();

        map.put("a", "alice").unwrap();
        mock.increment(secs(10)); // 10 secs from the start.
        map.put("b", "bob").unwrap();

        map2.shutdown();
        assert!(map.is_shut_down());

        // "a" had reached its deadline, so it was timed out and its notification
        // was delivered before `shutdown` returned. "b" was dropped silently.
        assert_eq!(map.time_out_count(), 1);
        assert_eq!(rx.try_recv(), Ok(("a", "alice")));
        assert!(rx.try_recv().is_err());

        assert!(matches!(map.put("c", "cindy"), Err(DecayMapError::ShutDown)));
        assert!(matches!(map.get(&"b"), Err(DecayMapError::ShutDown)));
        assert!(matches!(map.remove(&"b"), Err(DecayMapError::ShutDown)));
        assert!(matches!(map.clear(), Err(DecayMapError::ShutDown)));
        assert!(matches!(
            map.run_pending_tasks(),
            Err(DecayMapError::ShutDown)
        ));
        assert!(matches!(
            map.add_listener(|_k: &&str, _v: &&str| {}),
            Err(DecayMapError::ShutDown)
        ));

        assert_eq!(map.size(), 0);
        assert!(map.entry_set().is_empty());
        assert!(!map.contains_key(&"b"));

        // Calling shutdown again is a no-op.
        map.shutdown();
        assert_eq!(map.time_out_count(), 1);
    }

    #[test]
    fn listener_can_shut_down_its_own_map() {
        let (map, mock) = mocked_map::<u32, u32>();
        let (tx, rx) = crossbeam_channel::unbounded();

        let map2 = map.clone();
        map.add_listener(move |_k, _v| {
            map2.shutdown();
            tx.send(()).unwrap();
        })
        .unwrap();

        map.put(1, 1).unwrap();
        mock.increment(secs(10)); // 10 secs from the start.
        map.run_pending_tasks().unwrap();

        assert_eq!(rx.recv_timeout(secs(5)), Ok(()));
        assert!(map.is_shut_down());
    }
}
