//! A min-heap of expiry deadlines with lazy deletion.
//!
//! Every (re)schedule of a key pushes a fresh `TimerNode` tagged with a new
//! generation. The generation currently associated with each key is kept in the
//! `live` index. Older nodes for the same key are left in the heap and become
//! stale: they are dropped when they reach the top of the heap, or when the heap
//! is compacted.

use std::{
    borrow::Borrow,
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashMap},
    hash::{BuildHasher, Hash},
    sync::Arc,
};

use smallvec::SmallVec;

use super::{
    concurrent::constants::{COMPACTION_MIN_STALE_NODES, COMPACTION_STALE_RATIO},
    time::Instant,
};

pub(crate) struct TimerNode<K> {
    deadline: Instant,
    generation: u64,
    key: Arc<K>,
}

// Generations are unique per map, so `(deadline, generation)` is a total order
// over the nodes and ties on the deadline are broken by scheduling order.
impl<K> Ord for TimerNode<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then_with(|| self.generation.cmp(&other.generation))
    }
}

impl<K> PartialOrd for TimerNode<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> PartialEq for TimerNode<K> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.generation == other.generation
    }
}

impl<K> Eq for TimerNode<K> {}

/// A key whose deadline has been reached, along with the generation it was
/// scheduled under.
#[derive(Debug)]
pub(crate) struct ReadyNode<K> {
    pub(crate) key: Arc<K>,
    pub(crate) generation: u64,
}

/// Most calls to `pop_ready` return zero or a handful of nodes.
pub(crate) type ReadyNodes<K> = SmallVec<[ReadyNode<K>; 8]>;

pub(crate) struct ExpiryScheduler<K, S> {
    heap: BinaryHeap<Reverse<TimerNode<K>>>,
    live: HashMap<Arc<K>, u64, S>,
}

impl<K, S> ExpiryScheduler<K, S> {
    /// The number of live nodes.
    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }
}

impl<K, S> ExpiryScheduler<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub(crate) fn with_capacity_and_hasher(capacity: usize, build_hasher: S) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            live: HashMap::with_capacity_and_hasher(capacity, build_hasher),
        }
    }

    /// Schedules `key` to become ready at `deadline`. A node previously scheduled
    /// for the same key becomes stale.
    pub(crate) fn schedule(&mut self, key: Arc<K>, deadline: Instant, generation: u64) {
        self.live.insert(Arc::clone(&key), generation);
        self.heap.push(Reverse(TimerNode {
            deadline,
            generation,
            key,
        }));
        self.compact_if_necessary();
    }

    /// Marks the node of `key` stale. Returns `false` if the key had no live
    /// node.
    pub(crate) fn cancel<Q>(&mut self, key: &Q) -> bool
    where
        Arc<K>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let cancelled = self.live.remove(key).is_some();
        if cancelled {
            self.compact_if_necessary();
        }
        cancelled
    }

    /// Removes and returns the live nodes whose deadline is at or before `now`,
    /// in deadline order. Stale nodes met on the way are discarded.
    pub(crate) fn pop_ready(&mut self, now: Instant) -> ReadyNodes<K> {
        let mut ready = ReadyNodes::new();

        while let Some(Reverse(head)) = self.heap.peek() {
            if !self.is_live(head) {
                self.heap.pop();
                continue;
            }
            if head.deadline > now {
                break;
            }
            if let Some(Reverse(node)) = self.heap.pop() {
                self.live.remove(&node.key);
                ready.push(ReadyNode {
                    key: node.key,
                    generation: node.generation,
                });
            }
        }

        ready
    }

    /// Returns the deadline of the earliest live node, or `None` when nothing is
    /// scheduled. Stale nodes on top of the heap are discarded.
    pub(crate) fn peek_next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse(head)) = self.heap.peek() {
            if self.is_live(head) {
                return Some(head.deadline);
            }
            self.heap.pop();
        }
        None
    }

    fn is_live(&self, node: &TimerNode<K>) -> bool {
        self.live.get(&node.key) == Some(&node.generation)
    }

    fn stale_count(&self) -> usize {
        self.heap.len() - self.live.len()
    }

    fn compact_if_necessary(&mut self) {
        let stale = self.stale_count();
        if stale < COMPACTION_MIN_STALE_NODES || stale < self.live.len() * COMPACTION_STALE_RATIO
        {
            return;
        }

        let live = &self.live;
        self.heap
            .retain(|Reverse(node)| live.get(&node.key) == Some(&node.generation));

        #[cfg(feature = "logging")]
        log::trace!(
            "Compacted the expiry scheduler: dropped {stale} stale nodes, {} remain",
            self.heap.len()
        );
    }

    #[cfg(test)]
    pub(crate) fn heap_len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::ExpiryScheduler;
    use crate::common::{concurrent::constants::COMPACTION_MIN_STALE_NODES, time::Instant};

    use std::{collections::hash_map::RandomState, sync::Arc};

    fn at(nanos: u64) -> Instant {
        Instant::from_nanos(nanos)
    }

    fn scheduler() -> ExpiryScheduler<&'static str, RandomState> {
        ExpiryScheduler::with_capacity_and_hasher(0, RandomState::default())
    }

    #[test]
    fn pop_ready_in_deadline_order() {
        let mut sched = scheduler();
        sched.schedule(Arc::new("c"), at(30), 3);
        sched.schedule(Arc::new("a"), at(10), 1);
        sched.schedule(Arc::new("b"), at(20), 2);
        assert_eq!(sched.len(), 3);
        assert_eq!(sched.peek_next_deadline(), Some(at(10)));

        // Nothing is due yet.
        assert!(sched.pop_ready(at(9)).is_empty());

        let ready = sched.pop_ready(at(20));
        let keys: Vec<_> = ready.iter().map(|n| *n.key).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(ready[0].generation, 1);
        assert_eq!(sched.len(), 1);
        assert_eq!(sched.peek_next_deadline(), Some(at(30)));

        let ready = sched.pop_ready(at(100));
        assert_eq!(ready.len(), 1);
        assert_eq!(sched.peek_next_deadline(), None);
        assert_eq!(sched.len(), 0);
    }

    #[test]
    fn rescheduling_makes_the_old_node_stale() {
        let mut sched = scheduler();
        sched.schedule(Arc::new("a"), at(10), 1);
        sched.schedule(Arc::new("a"), at(50), 2);

        // Both nodes are still in the heap but only one is live.
        assert_eq!(sched.heap_len(), 2);
        assert_eq!(sched.len(), 1);

        // The stale node at 10 is skipped.
        assert_eq!(sched.peek_next_deadline(), Some(at(50)));
        assert_eq!(sched.heap_len(), 1);
        assert!(sched.pop_ready(at(20)).is_empty());

        let ready = sched.pop_ready(at(50));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].generation, 2);
    }

    #[test]
    fn cancel() {
        let mut sched = scheduler();
        sched.schedule(Arc::new("a"), at(10), 1);
        sched.schedule(Arc::new("b"), at(20), 2);

        assert!(sched.cancel(&"a"));
        assert!(!sched.cancel(&"a"));
        assert!(!sched.cancel(&"z"));
        assert_eq!(sched.len(), 1);

        let ready = sched.pop_ready(at(100));
        assert_eq!(ready.len(), 1);
        assert_eq!(*ready[0].key, "b");
        assert_eq!(sched.heap_len(), 0);
    }

    #[test]
    fn compaction_bounds_stale_nodes() {
        let mut sched = ExpiryScheduler::with_capacity_and_hasher(0, RandomState::default());
        let key = Arc::new(0u32);
        let refreshes = (COMPACTION_MIN_STALE_NODES as u64) * 4;

        for generation in 0..refreshes {
            sched.schedule(Arc::clone(&key), at(generation + 1), generation);
        }

        assert_eq!(sched.len(), 1);
        assert!(sched.heap_len() <= COMPACTION_MIN_STALE_NODES + 1);
        assert_eq!(sched.peek_next_deadline(), Some(at(refreshes)));
    }
}
