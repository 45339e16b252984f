#![warn(clippy::all)]
#![warn(rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! `decaymap` provides a concurrent keyed store whose entries _decay_: an entry
//! that is neither inserted nor read for a fixed time-to-live (TTL) is removed
//! automatically, and the removal is reported exactly once to the registered
//! timeout listeners.
//!
//! It is meant to hold short-lived bindings such as pending completions, rolling
//! counter baselines or session handles, that must vanish when they are not
//! refreshed in time:
//!
//! - A pending-completion tracker puts a correlation key when a request is sent,
//!   removes it when the response arrives, and treats a timeout notification as
//!   "no response within the window".
//! - A rolling counter puts a baseline per counter name and treats a timeout as a
//!   stalled collector.
//!
//! # Example
//!
//! ```rust
//! use decaymap::DecayMap;
//! use std::{sync::mpsc, time::Duration};
//!
//! # fn main() -> Result<(), decaymap::DecayMapError> {
//! let (tx, rx) = mpsc::channel();
//! let tx = std::sync::Mutex::new(tx);
//!
//! let pending = DecayMap::builder(Duration::from_millis(200))
//!     .timeout_listener(move |id: &u32, request: &String| {
//!         tx.lock().unwrap().send((*id, request.clone())).unwrap();
//!     })
//!     .build()?;
//!
//! pending.put(1, "GET /status".to_string())?;
//! pending.put(2, "GET /metrics".to_string())?;
//!
//! // The response to request 2 arrives in time.
//! assert_eq!(pending.remove(&2)?, Some("GET /metrics".to_string()));
//!
//! // Request 1 times out.
//! let timed_out = rx.recv_timeout(Duration::from_secs(5)).unwrap();
//! assert_eq!(timed_out, (1, "GET /status".to_string()));
//! assert_eq!(pending.time_out_count(), 1);
//! assert_eq!(pending.size(), 0);
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//!
//! The key table and a min-heap of deadlines are guarded together by a single
//! lock. A refresh does not remove the old heap node of the key; instead every
//! (re)scheduling is tagged with a new _generation_, and heap nodes whose
//! generation no longer matches the table are discarded when they surface. A
//! background _reaper_ thread sleeps until the earliest deadline and times out
//! the due entries; the timed out entries are handed to a separate _notifier_
//! thread that calls the listeners.

pub mod notification;
pub mod sync;

mod common;
mod snapshot;

pub use common::error::DecayMapError;
pub use notification::ListenerId;
pub use snapshot::{EntrySet, SnapshotEntry};
pub use sync::{DecayMap, DecayMapBuilder};
