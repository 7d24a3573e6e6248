//! Carry-forward gap filling.
//!
//! Wearables report irregularly but the graph and the motor loop want a value
//! every tick. Two mechanisms cover that:
//!
//! - `GapFiller::tick` runs on a fixed interval and stores at most one
//!   synthetic sample per device per tick, repeating the last known bpm.
//! - `interpolate` rebuilds a continuous series for display on demand from
//!   the real samples only; it never touches the store.

use crate::session::SessionState;
use crate::store::SampleStore;
use crate::types::{DeviceId, Sample};

#[derive(Debug, Clone, Copy)]
pub struct GapFiller {
    interval_ms: i64,
}

impl GapFiller {
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
        }
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// One tick: for each device whose newest sample is at least one interval
    /// old, store a synthetic sample exactly one interval after it.
    ///
    /// Never catches up more than one interval per device per call, and does
    /// nothing while the session is idle. Returns what was synthesized.
    pub fn tick(
        &self,
        store: &mut SampleStore,
        session: &SessionState,
        now_ms: i64,
    ) -> Vec<(DeviceId, Sample)> {
        if session.is_idle() {
            return Vec::new();
        }
        let due: Vec<(DeviceId, Sample)> = store
            .cursors()
            .filter(|(_, cur)| now_ms.saturating_sub(cur.last_timestamp_ms) >= self.interval_ms)
            .map(|(device, cur)| {
                (
                    device.clone(),
                    Sample::synthetic(cur.last_timestamp_ms + self.interval_ms, cur.last_bpm),
                )
            })
            .collect();

        for (device, sample) in &due {
            store.insert(device, *sample);
            tracing::debug!(
                device = %device,
                ts = sample.timestamp_ms,
                bpm = sample.bpm,
                "gap filled"
            );
        }
        due
    }
}

/// Parameters of the on-demand interpolation view.
#[derive(Debug, Clone, Copy)]
pub struct InterpolationWindow {
    pub window_ms: i64,
    pub interval_ms: i64,
    pub buffer_ms: i64,
}

impl Default for InterpolationWindow {
    fn default() -> Self {
        Self {
            window_ms: 30_000,
            interval_ms: 1_000,
            buffer_ms: 200,
        }
    }
}

/// Best-effort continuous series over the last `window_ms`.
///
/// Real samples inside `[now - window_ms, now]` are sorted; every full missing interval
/// between two consecutive samples gets one carried-forward sample, and the
/// series is extended from the last sample up to `now - buffer_ms` the same
/// way. Synthetic samples already in `samples` are ignored.
pub fn interpolate(samples: &[Sample], now_ms: i64, w: InterpolationWindow) -> Vec<Sample> {
    let since = now_ms.saturating_sub(w.window_ms);
    let mut real: Vec<Sample> = samples
        .iter()
        .filter(|s| !s.synthetic && (since..=now_ms).contains(&s.timestamp_ms))
        .copied()
        .collect();
    real.sort_by_key(|s| s.timestamp_ms);

    if w.interval_ms <= 0 {
        return real;
    }

    let mut out = Vec::with_capacity(real.len());
    let mut iter = real.into_iter().peekable();
    while let Some(cur) = iter.next() {
        out.push(cur);
        let mut t = cur.timestamp_ms;
        match iter.peek() {
            Some(next) => {
                while next.timestamp_ms - t > w.interval_ms {
                    t += w.interval_ms;
                    out.push(Sample::synthetic(t, cur.bpm));
                }
            }
            None => {
                let end = now_ms.saturating_sub(w.buffer_ms);
                while end - t >= w.interval_ms {
                    t += w.interval_ms;
                    out.push(Sample::synthetic(t, cur.bpm));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> SessionState {
        let mut s = SessionState::default();
        s.start();
        s
    }

    #[test]
    fn tick_fills_one_interval_at_a_time() {
        let mut store = SampleStore::default();
        let s = running();
        let w1 = DeviceId::from("w1");
        store.append(&s, &w1, 72, 10_000).unwrap();

        let filler = GapFiller::new(1_000);
        // 5 s late, still only one synthetic sample per tick.
        let out = filler.tick(&mut store, &s, 15_000);
        assert_eq!(out, vec![(w1.clone(), Sample::synthetic(11_000, 72))]);
        let out = filler.tick(&mut store, &s, 15_000);
        assert_eq!(out, vec![(w1.clone(), Sample::synthetic(12_000, 72))]);
        assert_eq!(store.len(&w1), 3);
    }

    #[test]
    fn tick_waits_for_a_full_interval() {
        let mut store = SampleStore::default();
        let s = running();
        let w1 = DeviceId::from("w1");
        store.append(&s, &w1, 72, 10_000).unwrap();
        assert!(GapFiller::new(1_000).tick(&mut store, &s, 10_999).is_empty());
        assert_eq!(GapFiller::new(1_000).tick(&mut store, &s, 11_000).len(), 1);
    }

    #[test]
    fn idle_session_synthesizes_nothing() {
        let mut store = SampleStore::default();
        let mut s = running();
        let w1 = DeviceId::from("w1");
        store.append(&s, &w1, 72, 0).unwrap();
        s.stop();
        assert!(GapFiller::new(1_000).tick(&mut store, &s, 60_000).is_empty());
        assert_eq!(store.len(&w1), 1);
    }

    #[test]
    fn no_cursor_no_output() {
        let mut store = SampleStore::default();
        assert!(GapFiller::new(1_000).tick(&mut store, &running(), 1_000_000).is_empty());
    }

    #[test]
    fn interpolation_fills_interior_and_tail() {
        let samples = [Sample::real(1_000, 60), Sample::real(3_500, 70)];
        let now = 6_000;
        let view = interpolate(&samples, now, InterpolationWindow::default());
        let got: Vec<(i64, i32, bool)> = view
            .iter()
            .map(|s| (s.timestamp_ms, s.bpm, s.synthetic))
            .collect();
        assert_eq!(
            got,
            vec![
                (1_000, 60, false),
                (2_000, 60, true),
                (3_000, 60, true),
                (3_500, 70, false),
                (4_500, 70, true),
                (5_500, 70, true),
            ]
        );
    }

    #[test]
    fn interpolation_respects_buffer_and_window() {
        let samples = [
            Sample::real(0, 50),
            Sample::real(40_000, 80),
            Sample::synthetic(41_000, 80),
        ];
        // Window starts at 15_000, so the first sample is dropped.
        // Tail stops at 41_900: 41_000 qualifies, 42_000 does not.
        let view = interpolate(&samples, 42_100, InterpolationWindow::default());
        let ts: Vec<i64> = view.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(ts, vec![40_000, 41_000]);
        assert!(view[1].synthetic);
    }

    #[test]
    fn late_sample_changes_what_the_next_tick_carries() {
        let mut store = SampleStore::default();
        let s = running();
        let w1 = DeviceId::from("w1");
        let filler = GapFiller::new(1_000);
        let t0 = 50_000;
        store.append(&s, &w1, 70, t0).unwrap();
        assert_eq!(filler.tick(&mut store, &s, t0 + 1_000).len(), 1);

        store.append(&s, &w1, 100, t0 + 999).unwrap();
        assert_eq!(store.latest(&w1).map(|x| x.bpm), Some(100));

        let out = filler.tick(&mut store, &s, t0 + 2_000);
        assert_eq!(out, vec![(w1.clone(), Sample::synthetic(t0 + 1_999, 100))]);
        assert_eq!(store.latest(&w1).map(|x| x.bpm), Some(100));
    }

    #[test]
    fn interpolation_ignores_samples_after_now() {
        let now = 100_000;
        let samples = [Sample::real(now, 70), Sample::real(now + 10_000_000, 90)];
        let view = interpolate(&samples, now, InterpolationWindow::default());
        assert_eq!(view, vec![Sample::real(now, 70)]);
        assert!(view.iter().all(|s| s.timestamp_ms <= now));
    }

    #[test]
    fn adjacent_samples_need_no_fill() {
        let samples = [Sample::real(1_000, 60), Sample::real(2_000, 61)];
        let view = interpolate(
            &samples,
            2_100,
            InterpolationWindow {
                window_ms: 30_000,
                interval_ms: 1_000,
                buffer_ms: 200,
            },
        );
        assert_eq!(view.len(), 2);
    }
}
