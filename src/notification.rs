//! Timeout listeners.
//!
//! A timeout listener is a closure that the [`DecayMap`][decay-map] calls once
//! for every entry that expires. Entries removed explicitly (by `remove` or
//! `clear`) and entries whose value was replaced by `put` are never reported.
//!
//! Listeners are called on a dedicated notifier thread, never on the reaper
//! thread nor on the caller's thread, so a slow listener delays only other
//! notifications, not the expiry of other keys nor any map operation.
//!
//! A listener that panics is disabled and will not be called again. The panic is
//! logged (when the `logging` feature is enabled) and counted by
//! [`DecayMap::listener_failure_count`][failure-count]. Other listeners keep
//! receiving notifications.
//!
//! [decay-map]: ../sync/struct.DecayMap.html
//! [failure-count]: ../sync/struct.DecayMap.html#method.listener_failure_count

use std::sync::Arc;

pub(crate) mod notifier;

pub(crate) type TimeoutListener<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync + 'static>;

/// Identifies a timeout listener registered to a [`DecayMap`][decay-map].
///
/// Returned by [`DecayMap::add_listener`][add-listener] and accepted by
/// [`DecayMap::remove_listener`][remove-listener].
///
/// [decay-map]: ../sync/struct.DecayMap.html
/// [add-listener]: ../sync/struct.DecayMap.html#method.add_listener
/// [remove-listener]: ../sync/struct.DecayMap.html#method.remove_listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);
