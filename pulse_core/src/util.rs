//! Common time helpers for pulse_core.

use std::time::Duration;

/// Convert an unsigned millisecond count to `i64`, saturating.
#[inline]
pub fn ms_to_i64(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Duration as whole milliseconds, saturating.
#[inline]
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
