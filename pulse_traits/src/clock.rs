use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Wall-clock abstraction shared by ingestion, gap filling and the motor loop.
///
/// - now_ms(): milliseconds since the Unix epoch
/// - ms_since(): helper to compute elapsed milliseconds from an earlier reading
pub trait Clock {
    fn now_ms(&self) -> i64;

    /// Milliseconds elapsed since `earlier_ms`, saturating at 0 when the clock went backwards.
    fn ms_since(&self, earlier_ms: i64) -> u64 {
        let diff = self.now_ms().saturating_sub(earlier_ms);
        u64::try_from(diff).unwrap_or(0)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

/// Default, real-time clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Deterministic clock whose time only moves when told to.
///
/// now_ms() = origin + offset
/// Clones share the same offset, so a test can hand one copy to the game
/// and keep another to drive time forward.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin_ms: i64,
    offset_ms: Arc<Mutex<i64>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Start at a fixed, recognisable epoch so test timestamps are stable.
    pub fn new() -> Self {
        Self::starting_at(1_700_000_000_000)
    }

    pub fn starting_at(origin_ms: i64) -> Self {
        Self {
            origin_ms,
            offset_ms: Arc::new(Mutex::new(0)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        self.advance_ms(i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
    }

    pub fn advance_ms(&self, ms: i64) {
        if let Ok(mut off) = self.offset_ms.lock() {
            *off = off.saturating_add(ms);
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        let off = self.offset_ms.lock().map(|g| *g).unwrap_or(0);
        self.origin_ms.saturating_add(off)
    }
}
