use super::DecayMap;
use crate::{notification::TimeoutListener, DecayMapError};

use std::{
    collections::hash_map::RandomState,
    hash::{BuildHasher, Hash},
    sync::Arc,
    time::Duration,
};

/// Builds a [`DecayMap`][decay-map-struct] with various configuration knobs.
///
/// [decay-map-struct]: ./struct.DecayMap.html
///
/// # Examples
///
/// ```rust
/// use decaymap::sync::DecayMapBuilder;
///
/// use std::time::Duration;
///
/// # fn main() -> Result<(), decaymap::DecayMapError> {
/// let sessions = DecayMapBuilder::new(Duration::from_secs(15 * 60))
///     // The name shows up in the log and in the names of the background threads.
///     .name("sessions")
///     .initial_capacity(1_024)
///     .timeout_listener(|user: &String, _token: &u128| {
///         println!("session of {user} timed out");
///     })
///     .build()?;
///
/// sessions.put("alice".to_string(), 0x5eed)?;
/// assert_eq!(sessions.name(), Some("sessions"));
/// # Ok(())
/// # }
/// ```
///
pub struct DecayMapBuilder<K, V> {
    ttl: Duration,
    initial_capacity: Option<usize>,
    name: Option<String>,
    listeners: Vec<TimeoutListener<K, V>>,
}

impl<K, V> DecayMapBuilder<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Construct a new `DecayMapBuilder` that will be used to build a `DecayMap`
    /// whose entries decay after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            initial_capacity: None,
            name: None,
            listeners: Vec::new(),
        }
    }

    /// Builds a `DecayMap<K, V>`.
    ///
    /// # Errors
    ///
    /// Returns [`DecayMapError::InvalidTtl`] if the TTL is zero,
    /// [`DecayMapError::TtlTooLong`] if it is longer than 1000 years, and
    /// [`DecayMapError::ThreadSpawn`] if a background thread cannot be spawned.
    pub fn build(self) -> Result<DecayMap<K, V, RandomState>, DecayMapError> {
        let build_hasher = RandomState::default();
        self.build_with_hasher(build_hasher)
    }

    /// Builds a `DecayMap<K, V, S>`, with the given `hasher`.
    ///
    /// # Errors
    ///
    /// Same as [`build`](#method.build).
    pub fn build_with_hasher<S>(self, hasher: S) -> Result<DecayMap<K, V, S>, DecayMapError>
    where
        S: BuildHasher + Clone + Send + Sync + 'static,
    {
        DecayMap::with_everything(
            self.ttl,
            self.initial_capacity,
            self.name,
            hasher,
            self.listeners,
        )
    }
}

impl<K, V> DecayMapBuilder<K, V> {
    /// Sets the time-to-live of the map.
    pub fn ttl(self, ttl: Duration) -> Self {
        Self { ttl, ..self }
    }

    /// Sets the initial capacity of the map.
    pub fn initial_capacity(self, capacity: usize) -> Self {
        Self {
            initial_capacity: Some(capacity),
            ..self
        }
    }

    /// Sets the name of the map. The name is used in the log messages and in the
    /// names of the background threads.
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Registers a timeout listener. Can be called more than once to register
    /// several listeners.
    ///
    /// To register a listener after the map has been built, and to get a
    /// [`ListenerId`][listener-id] to unregister it later, use
    /// [`DecayMap::add_listener`][add-listener].
    ///
    /// [listener-id]: ../notification/struct.ListenerId.html
    /// [add-listener]: ./struct.DecayMap.html#method.add_listener
    pub fn timeout_listener(
        mut self,
        listener: impl Fn(&K, &V) + Send + Sync + 'static,
    ) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::DecayMapBuilder;
    use crate::DecayMapError;

    use std::time::Duration;

    #[test]
    fn build_map() {
        let map = DecayMapBuilder::new(Duration::from_secs(5))
            .name("build-map")
            .initial_capacity(100)
            .build()
            .expect("failed to build");

        map.put('a', "alice").unwrap();
        assert_eq!(map.get(&'a').unwrap(), Some("alice"));
        assert_eq!(map.ttl(), Duration::from_secs(5));
        assert_eq!(map.name(), Some("build-map"));

        let map = DecayMapBuilder::<char, &str>::new(Duration::from_secs(5))
            .ttl(Duration::from_millis(250))
            .build()
            .expect("failed to build");
        assert_eq!(map.ttl(), Duration::from_millis(250));
        assert_eq!(map.name(), None);
    }

    #[test]
    fn reject_invalid_ttl() {
        let result = DecayMapBuilder::<u32, u32>::new(Duration::ZERO).build();
        assert!(matches!(result, Err(DecayMapError::InvalidTtl)));

        let result = DecayMapBuilder::<u32, u32>::new(Duration::MAX).build();
        assert!(matches!(result, Err(DecayMapError::TtlTooLong)));
    }
}
