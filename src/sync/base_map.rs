use std::{
    borrow::Borrow,
    collections::HashMap,
    hash::{BuildHasher, Hash},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{
    common::{
        expiry_scheduler::ExpiryScheduler,
        time::{Clock, Instant},
    },
    notification::notifier::{Outbox, TimedOutEntry},
    snapshot::{EntrySet, SnapshotEntry},
    DecayMapError,
};

pub(crate) struct ValueEntry<K, V> {
    key: Arc<K>,
    value: V,
    deadline: Instant,
    generation: u64,
}

#[derive(Default)]
pub(super) struct ReaperState {
    /// `true` while the reaper is waiting on the condition variable.
    pub(super) is_parked: bool,
    /// When the parked reaper will wake up by itself. `None` means never.
    pub(super) wake_at: Option<Instant>,
}

/// Everything guarded by the map lock. The key table and the expiry scheduler
/// are only ever modified together, under this lock.
pub(super) struct State<K, V, S> {
    table: HashMap<Arc<K>, ValueEntry<K, V>, S>,
    scheduler: ExpiryScheduler<K, S>,
    pub(super) clock: Clock,
    last_generation: u64,
    outbox: Option<Outbox<K, V>>,
    pub(super) reaper: ReaperState,
    pub(super) is_shut_down: bool,
}

impl<K, V, S> State<K, V, S> {
    fn next_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }
}

pub(crate) struct BaseMap<K, V, S> {
    pub(super) state: Mutex<State<K, V, S>>,
    pub(super) reaper_cond: Condvar,
    ttl: Duration,
    timeout_count: CachePadded<AtomicU64>,
    removal_count: CachePadded<AtomicU64>,
}

impl<K, V, S> BaseMap<K, V, S> {
    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn time_out_count(&self) -> u64 {
        self.timeout_count.load(Ordering::Acquire)
    }

    pub(crate) fn removal_count(&self) -> u64 {
        self.removal_count.load(Ordering::Acquire)
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.state.lock().is_shut_down
    }

    /// Marks the map shut down, drops every entry without notifying, closes the
    /// outbox and wakes the reaper so that it exits. Returns `false` if the map
    /// was already shut down.
    pub(crate) fn stop(&self) -> bool {
        self.stop_locked(self.state.lock())
    }

    fn stop_locked(&self, mut state: MutexGuard<'_, State<K, V, S>>) -> bool {
        if state.is_shut_down {
            return false;
        }
        state.is_shut_down = true;
        let drained: Vec<_> = state.table.drain().collect();
        state.scheduler.clear();
        // Dropping the only sender lets the notifier exit once it has drained
        // the channel.
        state.outbox = None;
        std::mem::drop(state);

        self.reaper_cond.notify_all();
        // The values are dropped outside of the lock.
        std::mem::drop(drained);
        true
    }
}

impl<K, V, S> BaseMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Clone,
{
    pub(crate) fn new(
        ttl: Duration,
        initial_capacity: Option<usize>,
        build_hasher: S,
        outbox: Outbox<K, V>,
    ) -> Self {
        let capacity = initial_capacity.unwrap_or_default();
        let state = State {
            table: HashMap::with_capacity_and_hasher(capacity, build_hasher.clone()),
            scheduler: ExpiryScheduler::with_capacity_and_hasher(capacity, build_hasher),
            clock: Clock::default(),
            last_generation: 0,
            outbox: Some(outbox),
            reaper: ReaperState::default(),
            is_shut_down: false,
        };
        Self {
            state: Mutex::new(state),
            reaper_cond: Condvar::new(),
            ttl,
            timeout_count: Default::default(),
            removal_count: Default::default(),
        }
    }

    pub(crate) fn put(&self, key: Arc<K>, value: V) -> Result<Option<V>, DecayMapError> {
        let (mut state, now) = self.lock_live_and_reap()?;
        let deadline = now.saturating_add(self.ttl);
        let generation = state.next_generation();

        let entry = ValueEntry {
            key: Arc::clone(&key),
            value,
            deadline,
            generation,
        };
        let old_entry = state.table.insert(Arc::clone(&key), entry);
        state.scheduler.schedule(key, deadline, generation);
        self.wake_reaper_if_necessary(&mut state, deadline);

        Ok(old_entry.map(|e| e.value))
    }

    /// Returns a clone of the value and slides the deadline of the entry.
    pub(crate) fn get<Q>(&self, key: &Q) -> Result<Option<V>, DecayMapError>
    where
        Arc<K>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let (mut guard, now) = self.lock_live_and_reap()?;
        let state = &mut *guard;

        let Some(entry) = state.table.get_mut(key) else {
            return Ok(None);
        };
        state.last_generation += 1;
        entry.generation = state.last_generation;
        entry.deadline = now.saturating_add(self.ttl);
        state
            .scheduler
            .schedule(Arc::clone(&entry.key), entry.deadline, entry.generation);

        Ok(Some(entry.value.clone()))
    }

    pub(crate) fn remove<Q>(&self, key: &Q) -> Result<Option<V>, DecayMapError>
    where
        Arc<K>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (mut guard, _now) = self.lock_live_and_reap()?;
        let state = &mut *guard;

        let removed = state.table.remove(key).map(|entry| {
            state.scheduler.cancel(key);
            self.removal_count.fetch_add(1, Ordering::AcqRel);
            entry.value
        });
        Ok(removed)
    }

    pub(crate) fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Arc<K>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock_and_reap().table.contains_key(key)
    }

    pub(crate) fn size(&self) -> usize {
        let state = self.lock_and_reap();
        debug_assert_eq!(state.table.len(), state.scheduler.len());
        state.table.len()
    }

    pub(crate) fn entry_set(&self) -> EntrySet<K, V>
    where
        V: Clone,
    {
        let state = self.lock_and_reap();
        let entries = state
            .table
            .values()
            .map(|e| SnapshotEntry::new(Arc::clone(&e.key), e.value.clone()))
            .collect();
        EntrySet::new(entries)
    }

    pub(crate) fn clear(&self) -> Result<(), DecayMapError> {
        let (mut state, _now) = self.lock_live_and_reap()?;
        let drained: Vec<_> = state.table.drain().collect();
        state.scheduler.clear();
        self.removal_count
            .fetch_add(drained.len() as u64, Ordering::AcqRel);
        std::mem::drop(state);
        Ok(())
    }

    pub(crate) fn run_pending_tasks(&self) -> Result<(), DecayMapError> {
        self.lock_live_and_reap().map(|_| ())
    }

    /// Fires the entries that are already due, then stops the map.
    pub(crate) fn shutdown(&self) -> bool {
        let mut state = self.state.lock();
        if !state.is_shut_down {
            let now = state.clock.now();
            self.reap(&mut state, now);
        }
        self.stop_locked(state)
    }

    /// Fires every live entry whose deadline is at or before `now`: removes it
    /// from the table, counts it and sends it to the notifier. Scheduler nodes
    /// whose generation no longer matches the table are ignored.
    pub(super) fn reap(&self, state: &mut State<K, V, S>, now: Instant) -> usize {
        let mut fired = 0;

        for node in state.scheduler.pop_ready(now) {
            let is_current = matches!(
                state.table.get(&node.key),
                Some(entry) if entry.generation == node.generation
            );
            if !is_current {
                // Refreshed, replaced or removed since the node was scheduled.
                continue;
            }

            if let Some(entry) = state.table.remove(&node.key) {
                debug_assert!(entry.deadline <= now);
                self.timeout_count.fetch_add(1, Ordering::AcqRel);
                fired += 1;

                if let Some(outbox) = &state.outbox {
                    // Sending fails only when the notifier thread has gone away,
                    // and then there is nobody left to notify.
                    let _ = outbox.send(TimedOutEntry::new(entry.key, entry.value));
                }
            }
        }

        fired
    }

    pub(super) fn next_deadline(&self, state: &mut State<K, V, S>) -> Option<Instant> {
        state.scheduler.peek_next_deadline()
    }

    fn wake_reaper_if_necessary(&self, state: &mut State<K, V, S>, deadline: Instant) {
        let reaper = &mut state.reaper;
        if reaper.is_parked && reaper.wake_at.map_or(true, |at| deadline < at) {
            reaper.wake_at = Some(deadline);
            self.reaper_cond.notify_one();
        }
    }

    fn lock_live_and_reap(
        &self,
    ) -> Result<(MutexGuard<'_, State<K, V, S>>, Instant), DecayMapError> {
        let mut state = self.state.lock();
        if state.is_shut_down {
            return Err(DecayMapError::ShutDown);
        }
        let now = state.clock.now();
        self.reap(&mut state, now);
        Ok((state, now))
    }

    fn lock_and_reap(&self) -> MutexGuard<'_, State<K, V, S>> {
        let mut state = self.state.lock();
        let now = state.clock.now();
        self.reap(&mut state, now);
        state
    }
}

#[cfg(test)]
impl<K, V, S> BaseMap<K, V, S> {
    pub(crate) fn set_expiration_clock(&self, clock: Clock) {
        self.state.lock().clock = clock;
    }

    pub(crate) fn scheduler_len(&self) -> usize {
        self.state.lock().scheduler.len()
    }
}
