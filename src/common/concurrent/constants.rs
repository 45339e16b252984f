/// The scheduler heap is compacted only when it holds at least this many stale
/// nodes...
pub(crate) const COMPACTION_MIN_STALE_NODES: usize = 1_024;

/// ...and when stale nodes outnumber the live ones by this factor.
pub(crate) const COMPACTION_STALE_RATIO: usize = 2;

// The name prefixes of the background threads.
pub(crate) const REAPER_THREAD_NAME: &str = "decaymap-reaper";
pub(crate) const NOTIFIER_THREAD_NAME: &str = "decaymap-notifier";
