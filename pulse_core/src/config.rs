//! Runtime configuration types for the game engine and motor loop.
//!
//! These are separate from the TOML-deserialized config in `pulse_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

/// Sample store and gap-filler settings.
#[derive(Debug, Clone)]
pub struct GameCfg {
    /// Gap-fill interval in ms.
    pub tick_ms: i64,
    /// Window for the recent and interpolated views.
    pub display_window_ms: i64,
    /// The interpolation view stops this far before now.
    pub interp_buffer_ms: i64,
    /// Capacity of the cross-device history ring.
    pub history_cap: usize,
    /// Inclusive accepted bpm range.
    pub bpm_min: i32,
    pub bpm_max: i32,
    /// Submitted timestamps beyond `now + max_future_skew_ms` are rejected.
    pub max_future_skew_ms: i64,
}

impl Default for GameCfg {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            display_window_ms: 30_000,
            interp_buffer_ms: 200,
            history_cap: 30,
            bpm_min: 1,
            bpm_max: 300,
            max_future_skew_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    pub window_ms: i64,
    pub min_samples: usize,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            window_ms: 10_000,
            min_samples: 5,
        }
    }
}

/// Speed table and stepper geometry.
#[derive(Debug, Clone)]
pub struct SpeedCfg {
    /// Each entry is `(min_delta_bpm, rpm)`. Sorted ascending by delta at use.
    pub tiers: Vec<(f64, u32)>,
    pub steps_per_revolution: u32,
    pub min_step_interval: Duration,
}

impl Default for SpeedCfg {
    fn default() -> Self {
        Self {
            tiers: vec![(5.0, 10), (10.0, 20), (20.0, 30)],
            steps_per_revolution: 2048,
            min_step_interval: Duration::from_millis(3),
        }
    }
}

/// Motor control loop pacing.
#[derive(Debug, Clone)]
pub struct ControlCfg {
    pub burst_steps: u32,
    pub flip_probability: f64,
    pub eval_period: Duration,
    pub idle_period: Duration,
    pub feed_timeout: Duration,
    pub seed: Option<u64>,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            burst_steps: 32,
            flip_probability: 0.5,
            eval_period: Duration::from_secs(1),
            idle_period: Duration::from_millis(50),
            feed_timeout: Duration::from_secs(2),
            seed: None,
        }
    }
}
