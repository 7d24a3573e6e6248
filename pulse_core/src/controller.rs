//! Motor control loop: turn holder's excitement → speed tier → actuator.
//!
//! The controller re-reads the game through a `TurnFeed` every evaluation
//! period and keeps driving bursts with the last command in between. Any
//! feed or actuator failure pauses the motor; the next evaluation retries.

use std::sync::Arc;
use std::time::Duration;

use pulse_traits::clock::{Clock, SystemClock};
use pulse_traits::{Actuator, Direction};

use crate::config::ControlCfg;
use crate::error::GameError;
use crate::game::Game;
use crate::hw_error::map_boundary_error;
use crate::speed::{DirectionPolicy, SpeedMap, SpeedTier};
use crate::types::{DeviceId, Sample};
use crate::util::duration_ms;

/// What the controller needs from the game at one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSnapshot {
    pub running: bool,
    pub holder: Option<DeviceId>,
    /// Latest sample of the holder, real or carried forward.
    pub latest: Option<Sample>,
    pub baseline: Option<f64>,
}

/// Source of control snapshots. Reads are bounded by `timeout`.
pub trait TurnFeed {
    fn snapshot(
        &mut self,
        timeout: Duration,
    ) -> Result<ControlSnapshot, Box<dyn std::error::Error + Send + Sync>>;
}

impl TurnFeed for Arc<Game> {
    fn snapshot(
        &mut self,
        _timeout: Duration,
    ) -> Result<ControlSnapshot, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.control_snapshot())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PauseReason {
    SessionNotRunning,
    NoHolder,
    NoSample,
    NoBaseline,
    /// Excitement below the slowest tier.
    BelowThreshold,
    FeedUnavailable(GameError),
    ActuatorFault(GameError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriveCommand {
    pub holder: DeviceId,
    pub tier: SpeedTier,
    pub rpm: u32,
    pub direction: Direction,
    pub step_interval: Duration,
}

/// Result of one controller iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlStatus {
    /// One burst was driven with this command.
    Driving(DriveCommand),
    /// The actuator is paused.
    Paused(PauseReason),
}

pub struct MotorController<F, A> {
    feed: F,
    actuator: A,
    speed: SpeedMap,
    directions: DirectionPolicy,
    cfg: ControlCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    last_eval_ms: Option<i64>,
    command: Option<DriveCommand>,
    last_pause: PauseReason,
    paused: bool,
}

impl<F: TurnFeed, A: Actuator> MotorController<F, A> {
    pub fn new(feed: F, actuator: A, speed: SpeedMap, cfg: ControlCfg) -> Self {
        let directions = DirectionPolicy::new(cfg.flip_probability, cfg.seed);
        Self {
            feed,
            actuator,
            speed,
            directions,
            cfg,
            clock: Arc::new(SystemClock::new()),
            last_eval_ms: None,
            command: None,
            last_pause: PauseReason::SessionNotRunning,
            paused: false,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cfg(&self) -> &ControlCfg {
        &self.cfg
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Last command in effect, if driving.
    pub fn command(&self) -> Option<&DriveCommand> {
        self.command.as_ref()
    }

    /// One loop iteration: re-evaluate if the period elapsed, then drive one
    /// burst with the current command or stay paused.
    pub fn step(&mut self) -> ControlStatus {
        let now = self.clock.now_ms();
        let due = self
            .last_eval_ms
            .is_none_or(|t| self.clock.ms_since(t) >= duration_ms(self.cfg.eval_period));
        if due {
            self.last_eval_ms = Some(now);
            if let ControlStatus::Paused(reason) = self.evaluate() {
                return ControlStatus::Paused(reason);
            }
        }

        let Some(cmd) = self.command.clone() else {
            return ControlStatus::Paused(self.last_pause.clone());
        };
        match self
            .actuator
            .drive(cmd.direction, cmd.step_interval, self.cfg.burst_steps)
        {
            Ok(()) => {
                self.paused = false;
                ControlStatus::Driving(cmd)
            }
            Err(e) => {
                let err = map_boundary_error(e.as_ref());
                tracing::warn!(error = %err, "actuator drive failed; pausing until next evaluation");
                self.pause(PauseReason::ActuatorFault(err))
            }
        }
    }

    /// Read the feed and decide the command without driving.
    pub fn evaluate(&mut self) -> ControlStatus {
        let snap = match self.feed.snapshot(self.cfg.feed_timeout) {
            Ok(s) => s,
            Err(e) => {
                let err = map_boundary_error(e.as_ref());
                tracing::warn!(error = %err, "turn feed unavailable");
                return self.pause(PauseReason::FeedUnavailable(err));
            }
        };
        if !snap.running {
            return self.pause(PauseReason::SessionNotRunning);
        }
        let Some(holder) = snap.holder else {
            return self.pause(PauseReason::NoHolder);
        };
        let Some(sample) = snap.latest else {
            return self.pause(PauseReason::NoSample);
        };
        let Some(baseline) = snap.baseline else {
            return self.pause(PauseReason::NoBaseline);
        };

        let delta = f64::from(sample.bpm) - baseline;
        let tier = self.speed.tier(delta);
        let rpm = self.speed.rpm(tier);
        let Some(step_interval) = self.speed.step_interval(rpm) else {
            return self.pause(PauseReason::BelowThreshold);
        };
        let direction = self.directions.next(&holder);

        let cmd = DriveCommand {
            holder,
            tier,
            rpm,
            direction,
            step_interval,
        };
        if self.command.as_ref() != Some(&cmd) {
            tracing::info!(
                device = %cmd.holder,
                bpm = sample.bpm,
                baseline,
                tier = cmd.tier.name(),
                rpm,
                direction = %cmd.direction,
                "motor command"
            );
        }
        self.command = Some(cmd.clone());
        ControlStatus::Driving(cmd)
    }

    fn pause(&mut self, reason: PauseReason) -> ControlStatus {
        self.command = None;
        if !self.paused {
            if let Err(e) = self.actuator.pause() {
                tracing::warn!(error = %map_boundary_error(e.as_ref()), "actuator pause failed");
            }
            self.paused = true;
            tracing::info!(?reason, "motor paused");
        }
        self.last_pause = reason.clone();
        ControlStatus::Paused(reason)
    }

    /// Pause the actuator unconditionally. Used on shutdown.
    pub fn halt(&mut self) {
        self.command = None;
        if let Err(e) = self.actuator.pause() {
            tracing::warn!(error = %map_boundary_error(e.as_ref()), "actuator pause failed");
        }
        self.paused = true;
    }
}
