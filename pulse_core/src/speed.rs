//! Mapping from heart-rate excitement to motor speed and direction.

use crate::config::SpeedCfg;
use crate::types::DeviceId;
use pulse_traits::Direction;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::Duration;

/// Discrete speed level derived from `bpm - baseline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpeedTier {
    /// Pause the actuator; do not drive at zero speed.
    Stop,
    Slow,
    Medium,
    Fast,
}

impl SpeedTier {
    pub fn name(self) -> &'static str {
        match self {
            SpeedTier::Stop => "stop",
            SpeedTier::Slow => "slow",
            SpeedTier::Medium => "medium",
            SpeedTier::Fast => "fast",
        }
    }
}

/// Tier for a bpm delta using the default table (5 / 10 / 20 bpm).
pub fn tier(bpm_delta: f64) -> SpeedTier {
    SpeedMap::default().tier(bpm_delta)
}

/// Speed table with thresholds and rpm per tier.
#[derive(Debug, Clone)]
pub struct SpeedMap {
    /// `(min_delta, rpm)` for slow, medium, fast.
    tiers: [(f64, u32); 3],
    steps_per_revolution: u32,
    min_step_interval: Duration,
}

impl Default for SpeedMap {
    fn default() -> Self {
        Self::from_cfg(&SpeedCfg::default())
    }
}

impl SpeedMap {
    /// Build from config. Missing entries fall back to the defaults, and
    /// thresholds are sorted ascending.
    pub fn from_cfg(cfg: &SpeedCfg) -> Self {
        let defaults = [(5.0, 10), (10.0, 20), (20.0, 30)];
        let mut sorted = cfg.tiers.clone();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut tiers = defaults;
        for (slot, t) in tiers.iter_mut().zip(sorted) {
            *slot = t;
        }
        Self {
            tiers,
            steps_per_revolution: cfg.steps_per_revolution.max(1),
            min_step_interval: cfg.min_step_interval,
        }
    }

    pub fn tier(&self, bpm_delta: f64) -> SpeedTier {
        let [(slow, _), (medium, _), (fast, _)] = self.tiers;
        if bpm_delta.is_nan() || bpm_delta < slow {
            SpeedTier::Stop
        } else if bpm_delta < medium {
            SpeedTier::Slow
        } else if bpm_delta < fast {
            SpeedTier::Medium
        } else {
            SpeedTier::Fast
        }
    }

    pub fn rpm(&self, tier: SpeedTier) -> u32 {
        match tier {
            SpeedTier::Stop => 0,
            SpeedTier::Slow => self.tiers[0].1,
            SpeedTier::Medium => self.tiers[1].1,
            SpeedTier::Fast => self.tiers[2].1,
        }
    }

    /// Per-step wait for a given rpm, floored at the configured minimum.
    /// `None` for zero rpm.
    ///
    /// `4 * (60 / rpm) / steps_per_revolution`, matching a coil
    /// sequence that advances four phases per logical step.
    pub fn step_interval(&self, rpm: u32) -> Option<Duration> {
        if rpm == 0 {
            return None;
        }
        let secs = 4.0 * (60.0 / f64::from(rpm)) / f64::from(self.steps_per_revolution);
        Some(Duration::from_secs_f64(secs).max(self.min_step_interval))
    }
}

/// Per-holder rotation direction with a random chance of reversing on each
/// re-evaluation.
#[derive(Debug)]
pub struct DirectionPolicy {
    flip_probability: f64,
    directions: HashMap<DeviceId, Direction>,
    rng: StdRng,
}

impl DirectionPolicy {
    pub fn new(flip_probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            flip_probability: if flip_probability.is_nan() {
                0.0
            } else {
                flip_probability.clamp(0.0, 1.0)
            },
            directions: HashMap::new(),
            rng,
        }
    }

    /// Direction for `holder` at this re-evaluation tick. The first call for a
    /// holder always yields forward; later calls may flip.
    pub fn next(&mut self, holder: &DeviceId) -> Direction {
        match self.directions.get_mut(holder) {
            None => {
                self.directions.insert(holder.clone(), Direction::Forward);
                tracing::debug!(device = %holder, "initial direction forward");
                Direction::Forward
            }
            Some(dir) => {
                if self.rng.gen_bool(self.flip_probability) {
                    let prev = *dir;
                    *dir = prev.flipped();
                    tracing::debug!(device = %holder, from = %prev, to = %dir, "direction flipped");
                }
                *dir
            }
        }
    }

    pub fn current(&self, holder: &DeviceId) -> Option<Direction> {
        self.directions.get(holder).copied()
    }

    pub fn reset(&mut self) {
        self.directions.clear();
    }
}
