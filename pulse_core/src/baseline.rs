//! Resting heart-rate baselines.
//!
//! During calibration each wearer sits still while their device reports; the
//! mean bpm over the trailing window becomes their zero point for speed.

use crate::config::CalibrationCfg;
use crate::error::{GameError, Result};
use crate::session::SessionState;
use crate::store::SampleStore;
use crate::types::DeviceId;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct BaselineCalibrator {
    cfg: CalibrationCfg,
    baselines: BTreeMap<DeviceId, f64>,
}

impl BaselineCalibrator {
    pub fn new(cfg: CalibrationCfg) -> Self {
        Self {
            cfg,
            baselines: BTreeMap::new(),
        }
    }

    pub fn with_baselines(cfg: CalibrationCfg, baselines: BTreeMap<DeviceId, f64>) -> Self {
        Self { cfg, baselines }
    }

    pub fn start_calibration(&self, session: &mut SessionState) {
        session.start_calibration();
    }

    pub fn stop_calibration(&self, session: &mut SessionState) {
        session.stop_calibration();
    }

    /// Mean bpm of the device's samples in the trailing window, stored as its
    /// baseline (replacing any earlier one).
    pub fn compute_baseline(
        &mut self,
        store: &SampleStore,
        device: &DeviceId,
        now_ms: i64,
    ) -> Result<f64> {
        let window = store.window(device, now_ms.saturating_sub(self.cfg.window_ms));
        if window.len() < self.cfg.min_samples || window.is_empty() {
            return Err(GameError::InsufficientSamples {
                have: window.len(),
                need: self.cfg.min_samples,
            });
        }
        let sum: i64 = window.iter().map(|s| i64::from(s.bpm)).sum();
        let avg = sum as f64 / window.len() as f64;
        self.baselines.insert(device.clone(), avg);
        tracing::info!(device = %device, baseline = avg, samples = window.len(), "baseline computed");
        Ok(avg)
    }

    pub fn get(&self, device: &DeviceId) -> Option<f64> {
        self.baselines.get(device).copied()
    }

    pub fn all(&self) -> &BTreeMap<DeviceId, f64> {
        &self.baselines
    }

    /// Whether every required device has a baseline, and which ones do not.
    pub fn all_calibrated(&self, required: &BTreeSet<DeviceId>) -> (bool, BTreeSet<DeviceId>) {
        let missing: BTreeSet<DeviceId> = required
            .iter()
            .filter(|d| !self.baselines.contains_key(*d))
            .cloned()
            .collect();
        (missing.is_empty(), missing)
    }

    pub fn reset(&mut self) {
        self.baselines.clear();
    }
}
