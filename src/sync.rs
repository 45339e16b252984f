//! Provides the thread-safe decay map.

mod base_map;
mod builder;
mod decay_map;
mod reaper;

pub use {builder::DecayMapBuilder, decay_map::DecayMap};
