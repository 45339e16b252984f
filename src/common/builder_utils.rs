use std::time::Duration;

use super::error::DecayMapError;

const YEAR_SECONDS: u64 = 365 * 24 * 3600;

pub(crate) fn ensure_ttl(ttl: Duration) -> Result<(), DecayMapError> {
    let max_duration = Duration::from_secs(1_000 * YEAR_SECONDS);
    if ttl.is_zero() {
        Err(DecayMapError::InvalidTtl)
    } else if ttl > max_duration {
        Err(DecayMapError::TtlTooLong)
    } else {
        Ok(())
    }
}
