#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the heart-rate game server and motor controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section is optional; omitted keys take the documented defaults.
use serde::Deserialize;
use serde::de::Deserializer;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GameCfg {
    /// Gap-fill interval; a device with no sample for this long gets a carried-forward one.
    pub tick_ms: u64,
    /// Window used by the live graph / recent views.
    pub display_window_ms: u64,
    /// The interpolation view stops extending this far before "now".
    pub interp_buffer_ms: u64,
    /// Capacity of the cross-device recent history.
    pub history_cap: usize,
    /// Accepted bpm range for submitted samples (inclusive).
    pub bpm_min: i32,
    pub bpm_max: i32,
    /// How far past the local clock a submitted timestamp may lie.
    pub max_future_skew_ms: u64,
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Look-back window for the baseline average.
    pub window_ms: u64,
    /// Minimum samples inside the window before a baseline may be computed.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SpeedCfg {
    /// Speed table. Accepts either:
    /// - array of tables: [{ min_delta = 5, rpm = 10 }, ...]
    /// - array of tuples: [[5, 10], [10, 20], ...]
    ///
    /// Exactly three entries, slow then medium then fast. Deltas below the
    /// first `min_delta` stop the motor.
    #[serde(deserialize_with = "de_speed_tiers")]
    pub tiers: Vec<(f64, u32)>,
}

impl Default for SpeedCfg {
    fn default() -> Self {
        Self {
            tiers: vec![(5.0, 10), (10.0, 20), (20.0, 30)],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TierToml {
    Tuple((f64, u32)),
    Table { min_delta: f64, rpm: u32 },
}

fn de_speed_tiers<'de, D>(deserializer: D) -> Result<Vec<(f64, u32)>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Vec<TierToml>> = Option::deserialize(deserializer)?;
    let mut out = Vec::new();
    if let Some(items) = opt {
        for t in items {
            match t {
                TierToml::Tuple((delta, rpm)) => out.push((delta, rpm)),
                TierToml::Table { min_delta, rpm } => out.push((min_delta, rpm)),
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MotorCfg {
    pub steps_per_revolution: u32,
    /// Floor for the per-step interval (microseconds).
    pub min_step_interval_us: u64,
    /// Steps driven per loop iteration before the loop looks again.
    pub burst_steps: u32,
    /// Chance of reversing direction on each re-evaluation tick (0.0..=1.0).
    pub flip_probability: f64,
    /// How often the controller re-reads the turn holder and bpm.
    pub eval_ms: u64,
    /// Sleep while paused.
    pub idle_ms: u64,
    /// Bound on a single feed read.
    pub feed_timeout_ms: u64,
    /// Optional RNG seed for reproducible direction changes.
    pub seed: Option<u64>,
}

impl Default for MotorCfg {
    fn default() -> Self {
        Self {
            steps_per_revolution: 2048,
            min_step_interval_us: 3000,
            burst_steps: 32,
            flip_probability: 0.5,
            eval_ms: 1000,
            idle_ms: 50,
            feed_timeout_ms: 2000,
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    /// Coil pins of the unipolar stepper, in sequence order.
    pub motor: [u8; 4],
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            motor: [18, 23, 24, 25],
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Storage {
    /// Directory holding one JSON record per entity; in-memory only when absent.
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub game: GameCfg,
    pub calibration: CalibrationCfg,
    pub speed: SpeedCfg,
    pub motor: MotorCfg,
    pub pins: Pins,
    pub storage: Storage,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Game
        if self.game.tick_ms == 0 {
            eyre::bail!("game.tick_ms must be >= 1");
        }
        if self.game.tick_ms > 60 * 1000 {
            eyre::bail!("game.tick_ms is unreasonably large (>1min)");
        }
        if self.game.display_window_ms < self.game.tick_ms {
            eyre::bail!("game.display_window_ms must be >= game.tick_ms");
        }
        if self.game.interp_buffer_ms >= self.game.display_window_ms {
            eyre::bail!("game.interp_buffer_ms must be < game.display_window_ms");
        }
        if self.game.history_cap == 0 {
            eyre::bail!("game.history_cap must be >= 1");
        }
        if self.game.max_future_skew_ms > 60 * 1000 {
            eyre::bail!("game.max_future_skew_ms is unreasonably large (>1min)");
        }
        if self.game.bpm_min < 1 {
            eyre::bail!("game.bpm_min must be >= 1");
        }
        if self.game.bpm_max < self.game.bpm_min {
            eyre::bail!("game.bpm_max must be >= game.bpm_min");
        }

        // Calibration
        if self.calibration.window_ms == 0 {
            eyre::bail!("calibration.window_ms must be >= 1");
        }
        if self.calibration.min_samples == 0 {
            eyre::bail!("calibration.min_samples must be >= 1");
        }

        // Speed
        if self.speed.tiers.len() != 3 {
            eyre::bail!("speed.tiers must have exactly 3 entries (slow, medium, fast)");
        }
        for (delta, rpm) in &self.speed.tiers {
            if !delta.is_finite() || *delta <= 0.0 {
                eyre::bail!("speed.tiers min_delta must be finite and > 0");
            }
            if *rpm == 0 {
                eyre::bail!("speed.tiers rpm must be > 0");
            }
        }
        if self.speed.tiers.windows(2).any(|w| w[1].0 <= w[0].0) {
            eyre::bail!("speed.tiers min_delta must be strictly increasing");
        }

        // Motor
        if self.motor.steps_per_revolution == 0 {
            eyre::bail!("motor.steps_per_revolution must be > 0");
        }
        if self.motor.burst_steps == 0 {
            eyre::bail!("motor.burst_steps must be >= 1");
        }
        if !(0.0..=1.0).contains(&self.motor.flip_probability) {
            eyre::bail!("motor.flip_probability must be in [0.0, 1.0]");
        }
        if self.motor.eval_ms == 0 {
            eyre::bail!("motor.eval_ms must be >= 1");
        }
        if self.motor.idle_ms == 0 {
            eyre::bail!("motor.idle_ms must be >= 1");
        }
        if self.motor.feed_timeout_ms == 0 || self.motor.feed_timeout_ms > 10_000 {
            eyre::bail!("motor.feed_timeout_ms must be in [1, 10000]");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
