//! `From` implementations bridging `pulse_config` types to `pulse_core` types.

use crate::config::{CalibrationCfg, ControlCfg, GameCfg, SpeedCfg};
use crate::util::ms_to_i64;
use std::time::Duration;

// ── GameCfg ──────────────────────────────────────────────────────────────────

impl From<&pulse_config::GameCfg> for GameCfg {
    fn from(c: &pulse_config::GameCfg) -> Self {
        Self {
            tick_ms: ms_to_i64(c.tick_ms),
            display_window_ms: ms_to_i64(c.display_window_ms),
            interp_buffer_ms: ms_to_i64(c.interp_buffer_ms),
            history_cap: c.history_cap,
            bpm_min: c.bpm_min,
            bpm_max: c.bpm_max,
            max_future_skew_ms: ms_to_i64(c.max_future_skew_ms),
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&pulse_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &pulse_config::CalibrationCfg) -> Self {
        Self {
            window_ms: ms_to_i64(c.window_ms),
            min_samples: c.min_samples,
        }
    }
}

// ── SpeedCfg ─────────────────────────────────────────────────────────────────

impl From<&pulse_config::Config> for SpeedCfg {
    fn from(c: &pulse_config::Config) -> Self {
        Self {
            tiers: c.speed.tiers.clone(),
            steps_per_revolution: c.motor.steps_per_revolution,
            min_step_interval: Duration::from_micros(c.motor.min_step_interval_us),
        }
    }
}

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&pulse_config::MotorCfg> for ControlCfg {
    fn from(c: &pulse_config::MotorCfg) -> Self {
        Self {
            burst_steps: c.burst_steps,
            flip_probability: c.flip_probability,
            eval_period: Duration::from_millis(c.eval_ms),
            idle_period: Duration::from_millis(c.idle_ms),
            feed_timeout: Duration::from_millis(c.feed_timeout_ms),
            seed: c.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_across_crates() {
        let file = pulse_config::Config::default();
        let game: GameCfg = (&file.game).into();
        let core = GameCfg::default();
        assert_eq!(game.tick_ms, core.tick_ms);
        assert_eq!(game.display_window_ms, core.display_window_ms);
        assert_eq!(game.history_cap, core.history_cap);

        let speed: SpeedCfg = (&file).into();
        assert_eq!(speed.tiers, SpeedCfg::default().tiers);
        assert_eq!(speed.min_step_interval, SpeedCfg::default().min_step_interval);

        let control: ControlCfg = (&file.motor).into();
        assert_eq!(control.eval_period, ControlCfg::default().eval_period);
        assert_eq!(control.feed_timeout, ControlCfg::default().feed_timeout);
    }
}
