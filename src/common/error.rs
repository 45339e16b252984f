/// The error type of the [`DecayMap`][decay-map] operations and of its
/// construction.
///
/// [decay-map]: ./sync/struct.DecayMap.html
#[derive(thiserror::Error, Debug)]
pub enum DecayMapError {
    /// The time-to-live given at construction time was zero. Entries would
    /// expire at the very instant they were inserted.
    #[error("The time-to-live of a decay map must be longer than zero")]
    InvalidTtl,

    /// The time-to-live given at construction time is longer than the
    /// supported range (1000 years).
    #[error("The time-to-live of a decay map must not be longer than 1000 years")]
    TtlTooLong,

    /// The operation was attempted after [`DecayMap::shutdown`][shutdown] was
    /// called on the map (or on any of its clones).
    ///
    /// [shutdown]: ./sync/struct.DecayMap.html#method.shutdown
    #[error("The decay map has been shut down")]
    ShutDown,

    /// An attempt was made to mutate an entry of an
    /// [`EntrySet`][entry-set] snapshot. Snapshots are disconnected copies and
    /// are read-only.
    ///
    /// [entry-set]: ./struct.EntrySet.html
    #[error("Entries of a decay map snapshot are read-only")]
    ReadOnlySnapshot,

    /// The operating system refused to spawn one of the background threads
    /// (the reaper or the notifier).
    #[error("Failed to spawn a background thread of the decay map")]
    ThreadSpawn(#[from] std::io::Error),
}
