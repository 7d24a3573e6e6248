//! Full game with virtual wearables.
//!
//! Each wearable has a resting heart rate. While a device holds the turn its
//! rate climbs; everyone keeps reporting, so non-holders exercise the
//! not-your-turn gate. The gap filler and motor loop run on their own
//! threads exactly as they would against real devices.

use pulse_core::runner::{ControlTask, GapFillTask};
use pulse_core::{
    CalibrationCfg, ControlCfg, DeviceId, Game, GameCfg, IgnoreReason, MotorController, SpeedCfg,
    SpeedMap, SubmitOutcome,
};
use pulse_traits::Actuator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SimParams {
    pub devices: usize,
    pub rounds: u32,
    pub turn: Duration,
    pub sample_every: Duration,
    pub seed: Option<u64>,
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct SimReport {
    pub accepted: u64,
    pub ignored_not_your_turn: u64,
    pub ignored_idle: u64,
    pub baselines: BTreeMap<DeviceId, f64>,
    pub turns: Vec<DeviceId>,
    pub interrupted: bool,
}

struct Wearable {
    id: DeviceId,
    resting: f64,
}

impl Wearable {
    /// bpm at `progress` (0..1) through the wearer's own turn, or at rest.
    fn bpm(&self, rng: &mut StdRng, excited: Option<f64>) -> i64 {
        let lift = excited.map_or(0.0, |p| 30.0 * p.clamp(0.0, 1.0));
        let noise: f64 = rng.gen_range(-1.5..=1.5);
        (self.resting + lift + noise).round() as i64
    }
}

pub fn run_simulation<A>(
    cfg: &pulse_config::Config,
    params: &SimParams,
    actuator: A,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<SimReport>
where
    A: Actuator + Send + 'static,
{
    if params.devices == 0 {
        eyre::bail!("simulate needs at least one device");
    }
    let game_cfg = GameCfg::from(&cfg.game);
    let cal_cfg = CalibrationCfg::from(&cfg.calibration);
    let mut builder = Game::builder()
        .with_game_cfg(game_cfg.clone())
        .with_calibration_cfg(cal_cfg.clone());
    if let Some(dir) = params.state_dir.as_ref().or(cfg.storage.state_dir.as_ref()) {
        builder = builder.with_state_dir(dir.clone());
    }
    let game = Arc::new(builder.build()?);
    game.reset();

    let mut rng = match params.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let wearables: Vec<Wearable> = (1..=params.devices)
        .map(|i| Wearable {
            id: DeviceId::new(format!("watch{i}")),
            resting: 62.0 + 6.0 * (i as f64 - 1.0),
        })
        .collect();
    for w in &wearables {
        game.register(w.id.as_str())?;
    }

    let mut report = SimReport::default();

    // Calibration: backdated resting samples spread over the window.
    game.start_calibration();
    let now = game.now_ms();
    let n = cal_cfg.min_samples + 1;
    let spacing = (cal_cfg.window_ms / (n as i64 + 1)).clamp(1, 500);
    for w in &wearables {
        for k in (0..n).rev() {
            let ts = now - spacing * k as i64;
            let bpm = w.bpm(&mut rng, None);
            tally(&mut report, game.submit_sample(w.id.as_str(), bpm, Some(ts))?);
        }
        game.compute_baseline(w.id.as_str())?;
    }
    game.stop_calibration();
    report.baselines = game.baselines();

    game.start_session()?;

    let control_cfg = ControlCfg::from(&cfg.motor);
    let speed = SpeedMap::from_cfg(&SpeedCfg::from(cfg));
    let gap_fill = GapFillTask::spawn(
        game.clone(),
        Duration::from_millis(cfg.game.tick_ms),
    );
    let control = ControlTask::spawn(MotorController::new(
        game.clone(),
        actuator,
        speed,
        control_cfg,
    ));

    'rounds: for round in 0..params.rounds {
        let holder = game.advance_turn()?;
        tracing::info!(round, holder = %holder, "turn begins");
        report.turns.push(holder.clone());
        let started = Instant::now();
        while started.elapsed() < params.turn {
            if shutdown.load(Ordering::Relaxed) {
                report.interrupted = true;
                break 'rounds;
            }
            let progress = started.elapsed().as_secs_f64() / params.turn.as_secs_f64().max(1e-3);
            for w in &wearables {
                let excited = (w.id == holder).then_some(progress);
                let bpm = w.bpm(&mut rng, excited);
                tally(&mut report, game.submit_sample(w.id.as_str(), bpm, None)?);
            }
            std::thread::sleep(params.sample_every);
        }
    }

    game.stop_session();
    control.shutdown();
    gap_fill.shutdown();
    tracing::info!(
        accepted = report.accepted,
        ignored = report.ignored_not_your_turn,
        turns = report.turns.len(),
        "simulation finished"
    );
    Ok(report)
}

fn tally(report: &mut SimReport, outcome: SubmitOutcome) {
    match outcome {
        SubmitOutcome::Accepted => report.accepted += 1,
        SubmitOutcome::Ignored(IgnoreReason::NotYourTurn(_)) => report.ignored_not_your_turn += 1,
        SubmitOutcome::Ignored(IgnoreReason::SessionIdle) => report.ignored_idle += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_hardware::SimulatedActuator;

    #[test]
    fn short_game_visits_each_device_and_drives_motor() {
        let cfg = pulse_config::Config::default();
        let params = SimParams {
            devices: 2,
            rounds: 2,
            turn: Duration::from_millis(1500),
            sample_every: Duration::from_millis(50),
            seed: Some(11),
            state_dir: None,
        };
        let actuator = SimulatedActuator::paced();
        let probe = actuator.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let report = run_simulation(&cfg, &params, actuator, &stop).unwrap();

        assert_eq!(
            report.turns,
            vec![DeviceId::from("watch1"), DeviceId::from("watch2")]
        );
        assert_eq!(report.baselines.len(), 2);
        assert!(report.accepted > 0);
        assert!(report.ignored_not_your_turn > 0);
        assert!(!report.interrupted);
        // Shutdown always ends with the coils released.
        assert_eq!(
            probe.events().last(),
            Some(&pulse_hardware::ActuatorEvent::Pause)
        );
    }

    #[test]
    fn zero_devices_is_rejected() {
        let params = SimParams {
            devices: 0,
            rounds: 1,
            turn: Duration::from_millis(10),
            sample_every: Duration::from_millis(5),
            seed: None,
            state_dir: None,
        };
        let stop = Arc::new(AtomicBool::new(false));
        assert!(
            run_simulation(
                &pulse_config::Config::default(),
                &params,
                SimulatedActuator::new(),
                &stop
            )
            .is_err()
        );
    }
}
