use std::time::Duration;

pub(crate) const MAX_NANOS: u64 = u64::MAX - 1;

/// `Instant` represents a point in time since the `Clock` was created. It has
/// nanosecond precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Instant {
    elapsed_ns: u64,
}

impl Instant {
    pub(crate) fn from_nanos(nanos: u64) -> Instant {
        debug_assert!(nanos <= MAX_NANOS);
        Instant { elapsed_ns: nanos }
    }

    pub(crate) fn from_duration_since_clock_start(duration: Duration) -> Instant {
        Instant::from_nanos(Self::duration_to_saturating_nanoseconds(duration))
    }

    #[cfg(test)]
    pub(crate) fn as_nanos(&self) -> u64 {
        self.elapsed_ns
    }

    /// Returns `self + duration`, saturating at the far end of the clock range
    /// instead of overflowing. A saturated deadline never comes due in practice.
    pub(crate) fn saturating_add(&self, duration: Duration) -> Instant {
        let nanos = Self::duration_to_saturating_nanoseconds(duration);
        Instant::from_nanos(self.elapsed_ns.saturating_add(nanos).min(MAX_NANOS))
    }

    /// Returns the amount of time elapsed from `earlier` to `self`, or zero if
    /// `earlier` is later than `self`.
    pub(crate) fn saturating_duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_nanos(self.elapsed_ns.saturating_sub(earlier.elapsed_ns))
    }

    /// Converts a `std::time::Duration` to nanoseconds, saturating to
    /// `MAX_NANOS` (`u64::MAX - 1`) if the duration is too large.
    /// (`Duration::as_nanos` returns `u128`)
    pub(crate) fn duration_to_saturating_nanoseconds(duration: Duration) -> u64 {
        u64::try_from(duration.as_nanos())
            .map(|n| n.min(MAX_NANOS))
            .unwrap_or(MAX_NANOS)
    }
}

#[cfg(test)]
mod tests {
    use super::{Instant, MAX_NANOS};
    use std::time::Duration;

    #[test]
    fn saturating_add() {
        let t = Instant::from_nanos(10);
        assert_eq!(t.saturating_add(Duration::from_nanos(5)).as_nanos(), 15);

        let far = Instant::from_nanos(MAX_NANOS - 1);
        assert_eq!(far.saturating_add(Duration::from_secs(1)).as_nanos(), MAX_NANOS);
        assert_eq!(t.saturating_add(Duration::MAX).as_nanos(), MAX_NANOS);
    }

    #[test]
    fn saturating_duration_since() {
        let early = Instant::from_nanos(1_000);
        let late = Instant::from_nanos(3_500);
        assert_eq!(late.saturating_duration_since(early), Duration::from_nanos(2_500));
        assert_eq!(early.saturating_duration_since(late), Duration::ZERO);
    }
}
