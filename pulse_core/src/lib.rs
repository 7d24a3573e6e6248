#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core heart-rate game logic (hardware-agnostic).
//!
//! Wearables submit bpm samples; one device at a time holds the turn, and
//! the holder's excitement over their resting baseline drives a motor.
//! All actuator interaction goes through `pulse_traits::Actuator`.
//!
//! ## Architecture
//!
//! - **Samples**: per-device sorted series plus a bounded history (`store`)
//! - **Gap filling**: carry-forward on a fixed tick, and an on-demand
//!   interpolation view (`gap_fill`)
//! - **Calibration**: resting baselines from a trailing window (`baseline`)
//! - **Turns**: toggle-style declare and round-robin advance (`turn`)
//! - **Speed**: bpm delta → tier → step interval, with random direction
//!   flips (`speed`)
//! - **Coordination**: `Game` serializes every mutation behind one lock and
//!   optionally persists each entity as a JSON record (`game`, `persist`)
//! - **Background work**: gap-fill and motor-control threads (`runner`,
//!   `controller`)

pub mod baseline;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod game;
pub mod gap_fill;
pub mod hw_error;
pub mod persist;
pub mod runner;
pub mod session;
pub mod speed;
pub mod store;
pub mod turn;
pub mod types;
pub mod util;

pub use baseline::BaselineCalibrator;
pub use config::{CalibrationCfg, ControlCfg, GameCfg, SpeedCfg};
pub use controller::{
    ControlSnapshot, ControlStatus, DriveCommand, MotorController, PauseReason, TurnFeed,
};
pub use error::{ErrorKind, GameError, Result};
pub use game::{Game, GameBuilder, IgnoreReason, SubmitOutcome};
pub use gap_fill::{GapFiller, InterpolationWindow, interpolate};
pub use runner::{ControlTask, GapFillTask, Periodic, PeriodicTask};
pub use session::{SessionMode, SessionState};
pub use speed::{DirectionPolicy, SpeedMap, SpeedTier, tier};
pub use store::{Rejected, SampleStore};
pub use turn::{DeclareOutcome, TurnArbitrator};
pub use types::{DeviceId, Sample};
