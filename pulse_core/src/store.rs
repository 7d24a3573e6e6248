//! Per-device heart-rate time series.
//!
//! Series are kept sorted by timestamp. Appends land at the tail in the common
//! case; an out-of-order timestamp is inserted at its sorted position so a
//! backfilled gap never breaks ordering. Every insert also refreshes the
//! device's gap-fill cursor from the series tail, so the gap filler never
//! rescans a series.

use crate::session::SessionState;
use crate::types::{DeviceId, Sample};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

/// Where the gap filler carries forward from for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapCursor {
    pub last_timestamp_ms: i64,
    pub last_bpm: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sample rejected: session is idle")]
pub struct Rejected;

#[derive(Debug, Clone)]
pub struct SampleStore {
    series: BTreeMap<DeviceId, Vec<Sample>>,
    history: VecDeque<(DeviceId, Sample)>,
    history_cap: usize,
    cursors: BTreeMap<DeviceId, GapCursor>,
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new(30)
    }
}

impl SampleStore {
    pub fn new(history_cap: usize) -> Self {
        Self {
            series: BTreeMap::new(),
            history: VecDeque::with_capacity(history_cap),
            history_cap: history_cap.max(1),
            cursors: BTreeMap::new(),
        }
    }

    /// Rebuild a store from persisted series. Cursors are derived from the
    /// tail of each series; history starts empty.
    pub fn from_series(series: BTreeMap<DeviceId, Vec<Sample>>, history_cap: usize) -> Self {
        let mut store = Self::new(history_cap);
        for (device, mut samples) in series {
            samples.sort_by_key(|s| s.timestamp_ms);
            if let Some(last) = samples.last() {
                store.cursors.insert(
                    device.clone(),
                    GapCursor {
                        last_timestamp_ms: last.timestamp_ms,
                        last_bpm: last.bpm,
                    },
                );
            }
            store.series.insert(device, samples);
        }
        store
    }

    /// Accept a real sample unless the session is idle.
    pub fn append(
        &mut self,
        session: &SessionState,
        device: &DeviceId,
        bpm: i32,
        timestamp_ms: i64,
    ) -> Result<(), Rejected> {
        if session.is_idle() {
            return Err(Rejected);
        }
        let sample = Sample::real(timestamp_ms, bpm);
        self.insert(device, sample);
        self.history.push_back((device.clone(), sample));
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }
        Ok(())
    }

    /// Ungated insert used by the gap filler once it has checked the session
    /// itself, and by log replay.
    ///
    /// A real sample discards synthetic samples stamped at or after it. The
    /// cursor always follows the series tail afterwards.
    pub(crate) fn insert(&mut self, device: &DeviceId, sample: Sample) {
        let series = self.series.entry(device.clone()).or_default();
        if !sample.synthetic {
            let start = series.partition_point(|s| s.timestamp_ms < sample.timestamp_ms);
            if series[start..].iter().any(|s| s.synthetic) {
                let tail = series.split_off(start);
                let dropped = tail.iter().filter(|s| s.synthetic).count();
                series.extend(tail.into_iter().filter(|s| !s.synthetic));
                tracing::debug!(
                    device = %device,
                    dropped,
                    ts = sample.timestamp_ms,
                    "late sample superseded synthetic tail"
                );
            }
        }
        let idx = series.partition_point(|s| s.timestamp_ms <= sample.timestamp_ms);
        series.insert(idx, sample);

        if let Some(last) = series.last() {
            self.cursors.insert(
                device.clone(),
                GapCursor {
                    last_timestamp_ms: last.timestamp_ms,
                    last_bpm: last.bpm,
                },
            );
        }
    }

    pub fn latest(&self, device: &DeviceId) -> Option<Sample> {
        self.series.get(device).and_then(|s| s.last().copied())
    }

    /// Samples with `timestamp_ms >= since_ms`, oldest first.
    pub fn window(&self, device: &DeviceId, since_ms: i64) -> Vec<Sample> {
        match self.series.get(device) {
            Some(series) => {
                let start = series.partition_point(|s| s.timestamp_ms < since_ms);
                series[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Latest sample of every device that has one.
    pub fn latest_all(&self) -> BTreeMap<DeviceId, Sample> {
        self.series
            .iter()
            .filter_map(|(d, s)| s.last().map(|x| (d.clone(), *x)))
            .collect()
    }

    pub fn cursor(&self, device: &DeviceId) -> Option<GapCursor> {
        self.cursors.get(device).copied()
    }

    pub fn cursors(&self) -> impl Iterator<Item = (&DeviceId, &GapCursor)> {
        self.cursors.iter()
    }

    /// The last accepted real samples across all devices, oldest first.
    pub fn history(&self) -> Vec<(DeviceId, Sample)> {
        self.history.iter().cloned().collect()
    }

    pub fn series(&self) -> &BTreeMap<DeviceId, Vec<Sample>> {
        &self.series
    }

    pub(crate) fn into_series(self) -> BTreeMap<DeviceId, Vec<Sample>> {
        self.series
    }

    pub fn len(&self, device: &DeviceId) -> usize {
        self.series.get(device).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    pub fn reset(&mut self) {
        self.series.clear();
        self.history.clear();
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active() -> SessionState {
        let mut s = SessionState::default();
        s.start();
        s
    }

    fn id(s: &str) -> DeviceId {
        DeviceId::from(s)
    }

    #[test]
    fn idle_session_rejects_appends() {
        let mut store = SampleStore::default();
        let idle = SessionState::default();
        assert_eq!(store.append(&idle, &id("w1"), 70, 1_000), Err(Rejected));
        assert!(store.latest(&id("w1")).is_none());
        assert!(store.cursor(&id("w1")).is_none());
    }

    #[test]
    fn calibrating_session_accepts() {
        let mut store = SampleStore::default();
        let mut s = SessionState::default();
        s.start_calibration();
        store.append(&s, &id("w1"), 70, 1_000).unwrap();
        assert_eq!(store.latest(&id("w1")), Some(Sample::real(1_000, 70)));
    }

    #[test]
    fn window_is_sorted_and_inclusive() {
        let mut store = SampleStore::default();
        let s = active();
        for (ts, bpm) in [(1_000, 60), (3_000, 62), (2_000, 61), (4_000, 63)] {
            store.append(&s, &id("w1"), bpm, ts).unwrap();
        }
        let w = store.window(&id("w1"), 2_000);
        let ts: Vec<i64> = w.iter().map(|x| x.timestamp_ms).collect();
        assert_eq!(ts, vec![2_000, 3_000, 4_000]);
        assert_eq!(store.latest(&id("w1")).map(|x| x.bpm), Some(63));
        assert!(store.window(&id("nobody"), 0).is_empty());
    }

    #[test]
    fn interior_insert_keeps_cursor_at_tail() {
        let mut store = SampleStore::default();
        let s = active();
        store.append(&s, &id("w1"), 60, 1_000).unwrap();
        store.append(&s, &id("w1"), 70, 5_000).unwrap();
        store.insert(&id("w1"), Sample::synthetic(2_000, 60));
        let cur = store.cursor(&id("w1")).unwrap();
        assert_eq!(cur.last_timestamp_ms, 5_000);
        assert_eq!(cur.last_bpm, 70);
        assert_eq!(store.len(&id("w1")), 3);
    }

    #[test]
    fn late_real_sample_replaces_carried_tail() {
        let mut store = SampleStore::default();
        let s = active();
        let w1 = id("w1");
        store.append(&s, &w1, 70, 10_000).unwrap();
        store.insert(&w1, Sample::synthetic(11_000, 70));

        // Stamped just before the synthetic sample, delivered after it.
        store.append(&s, &w1, 100, 10_999).unwrap();
        assert_eq!(store.latest(&w1), Some(Sample::real(10_999, 100)));
        assert_eq!(
            store.cursor(&w1),
            Some(GapCursor {
                last_timestamp_ms: 10_999,
                last_bpm: 100
            })
        );
        assert_eq!(store.len(&w1), 2);
    }

    #[test]
    fn out_of_order_real_sample_leaves_newer_real_tail() {
        let mut store = SampleStore::default();
        let s = active();
        let w1 = id("w1");
        store.append(&s, &w1, 70, 5_000).unwrap();
        store.insert(&w1, Sample::synthetic(6_000, 70));
        store.append(&s, &w1, 90, 4_000).unwrap();
        assert_eq!(store.latest(&w1), Some(Sample::real(5_000, 70)));
        assert_eq!(store.cursor(&w1).map(|c| c.last_bpm), Some(70));
        assert_eq!(store.len(&w1), 2);
    }

    #[test]
    fn history_is_bounded_drop_oldest() {
        let mut store = SampleStore::new(3);
        let s = active();
        for i in 0..5 {
            store.append(&s, &id("w1"), 60 + i, i64::from(i) * 1_000).unwrap();
        }
        let bpms: Vec<i32> = store.history().iter().map(|(_, x)| x.bpm).collect();
        assert_eq!(bpms, vec![62, 63, 64]);
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = SampleStore::default();
        store.append(&active(), &id("w1"), 60, 1).unwrap();
        store.reset();
        assert!(store.is_empty());
        assert!(store.history().is_empty());
        assert_eq!(store.cursors().count(), 0);
    }

    #[test]
    fn from_series_rebuilds_cursors() {
        let mut series = BTreeMap::new();
        series.insert(id("w1"), vec![Sample::real(2_000, 66), Sample::real(1_000, 64)]);
        let store = SampleStore::from_series(series, 30);
        assert_eq!(
            store.cursor(&id("w1")),
            Some(GapCursor {
                last_timestamp_ms: 2_000,
                last_bpm: 66
            })
        );
    }
}
