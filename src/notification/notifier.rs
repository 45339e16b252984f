use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;

use super::{ListenerId, TimeoutListener};

#[cfg(feature = "logging")]
use crate::common::log_prefix;

/// An entry fired by the reaper, on its way to the listeners.
pub(crate) struct TimedOutEntry<K, V> {
    key: Arc<K>,
    value: V,
}

impl<K, V> TimedOutEntry<K, V> {
    pub(crate) fn new(key: Arc<K>, value: V) -> Self {
        Self { key, value }
    }
}

pub(crate) type Outbox<K, V> = Sender<TimedOutEntry<K, V>>;

struct RegisteredListener<K, V> {
    id: ListenerId,
    listener: TimeoutListener<K, V>,
    is_enabled: AtomicBool,
}

/// The set of timeout listeners of a map.
pub(crate) struct ListenerRegistry<K, V> {
    listeners: RwLock<Vec<Arc<RegisteredListener<K, V>>>>,
    next_id: AtomicU64,
    failure_count: AtomicU64,
    #[cfg(feature = "logging")]
    map_name: Option<String>,
}

impl<K, V> ListenerRegistry<K, V> {
    pub(crate) fn new(_map_name: Option<String>) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            #[cfg(feature = "logging")]
            map_name: _map_name,
        }
    }

    pub(crate) fn add(&self, listener: TimeoutListener<K, V>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(Arc::new(RegisteredListener {
            id,
            listener,
            is_enabled: AtomicBool::new(true),
        }));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let len = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != len
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub(crate) fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Acquire)
    }

    /// Calls every enabled listener with the timed out entry.
    pub(crate) fn notify(&self, key: &K, value: &V) {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        // Do not hold the lock while calling the listeners. A listener is allowed
        // to add or remove listeners.
        let listeners = self.listeners.read().clone();

        for registered in listeners {
            if !registered.is_enabled.load(Ordering::Acquire) {
                continue;
            }

            let listener_clo = || (registered.listener)(key, value);

            // Safety: It is safe to assert unwind safety here because we will not
            // call the listener again if it has been panicked.
            let result = catch_unwind(AssertUnwindSafe(listener_clo));
            if let Err(_payload) = result {
                registered.is_enabled.store(false, Ordering::Release);
                self.failure_count.fetch_add(1, Ordering::AcqRel);
                #[cfg(feature = "logging")]
                log_panic(&*_payload, registered.id, self.map_name.as_deref());
            }
        }
    }
}

/// Spawns the notifier thread. It delivers every entry sent to the returned
/// `Outbox`, and exits once all the senders have been dropped and the channel
/// has been drained.
pub(crate) fn spawn<K, V>(
    registry: Arc<ListenerRegistry<K, V>>,
    thread_name: String,
) -> std::io::Result<(Outbox<K, V>, JoinHandle<()>)>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let (snd, rcv) = crossbeam_channel::unbounded();
    let handle = thread::Builder::new()
        .name(thread_name)
        .spawn(move || run(&rcv, &registry))?;
    Ok((snd, handle))
}

fn run<K, V>(rcv: &Receiver<TimedOutEntry<K, V>>, registry: &ListenerRegistry<K, V>) {
    #[cfg(feature = "logging")]
    log::debug!("{}Notifier started", log_prefix(registry.map_name.as_deref()));

    for TimedOutEntry { key, value } in rcv.iter() {
        registry.notify(&key, &value);
    }

    #[cfg(feature = "logging")]
    log::debug!("{}Notifier stopped", log_prefix(registry.map_name.as_deref()));
}

#[cfg(feature = "logging")]
fn log_panic(
    payload: &(dyn std::any::Any + Send + 'static),
    id: ListenerId,
    map_name: Option<&str>,
) {
    // Try to downcast the payload into &str or String.
    //
    // NOTE: Clippy will complain if we use `if let Some(_)` here.
    // https://rust-lang.github.io/rust-clippy/master/index.html#manual_map
    let message: Option<std::borrow::Cow<'_, str>> =
        (payload.downcast_ref::<&str>().map(|s| (*s).into()))
            .or_else(|| payload.downcast_ref::<String>().map(Into::into));

    let cn = log_prefix(map_name);

    if let Some(m) = message {
        log::error!("{cn}Disabled timeout listener {id:?} because it panicked at '{m}'");
    } else {
        log::error!("{cn}Disabled timeout listener {id:?} because it panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::{ListenerRegistry, TimedOutEntry};

    use parking_lot::Mutex;
    use std::{sync::Arc, time::Duration};

    #[test]
    fn panicking_listener_is_disabled() {
        let registry = ListenerRegistry::<u32, String>::new(Some("test".into()));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen1 = Arc::clone(&seen);
        registry.add(Arc::new(move |k: &u32, v: &String| {
            seen1.lock().push((*k, v.clone()));
        }));
        registry.add(Arc::new(|k: &u32, _v: &String| {
            if *k == 1 {
                panic!("listener panicked on purpose");
            }
        }));

        registry.notify(&1, &"one".to_string());
        registry.notify(&2, &"two".to_string());

        assert_eq!(
            *seen.lock(),
            vec![(1, "one".to_string()), (2, "two".to_string())]
        );
        // The second listener panicked once and has been disabled since.
        assert_eq!(registry.failure_count(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_listener() {
        let registry = ListenerRegistry::<u32, u32>::new(None);
        let count = Arc::new(Mutex::new(0));

        let count1 = Arc::clone(&count);
        let id = registry.add(Arc::new(move |_k: &u32, _v: &u32| *count1.lock() += 1));

        registry.notify(&1, &1);
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        registry.notify(&2, &2);

        assert_eq!(*count.lock(), 1);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn notifier_thread_drains_and_exits() {
        let registry = Arc::new(ListenerRegistry::<u32, u32>::new(None));
        let (tx, rx) = crossbeam_channel::unbounded();
        registry.add(Arc::new(move |k: &u32, v: &u32| {
            tx.send((*k, *v)).expect("receiver dropped");
        }));

        let (outbox, handle) = super::spawn(Arc::clone(&registry), "test-notifier".into())
            .expect("failed to spawn");
        for i in 0..10 {
            outbox.send(TimedOutEntry::new(Arc::new(i), i * 10)).unwrap();
        }
        drop(outbox);
        handle.join().expect("notifier panicked");

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), 10);
        assert_eq!(received[3], (3, 30));
        assert!(rx.recv_timeout(Duration::from_millis(10)).is_err());
    }
}
