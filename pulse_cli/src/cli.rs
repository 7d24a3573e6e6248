//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub const DEFAULT_CONFIG: &str = "etc/pulse_config.toml";

#[derive(Parser, Debug)]
#[command(name = "pulse", version, about = "Heart-rate turn game CLI")]
pub struct Cli {
    /// Path to config TOML (typed). Defaults are used when the default path is absent.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a full game with virtual wearables: calibrate, start, rotate turns
    Simulate {
        /// Number of virtual wearables (watch1, watch2, ...)
        #[arg(long, default_value_t = 2)]
        devices: usize,
        /// Turns to play; each advances to the next device
        #[arg(long, default_value_t = 2)]
        rounds: u32,
        /// Duration of one turn in ms
        #[arg(long = "turn-ms", value_name = "MS", default_value_t = 3000)]
        turn_ms: u64,
        /// Interval between samples from each wearable in ms
        #[arg(long = "sample-ms", value_name = "MS", default_value_t = 100)]
        sample_ms: u64,
        /// Seed for the wearables' heart-rate noise
        #[arg(long)]
        seed: Option<u64>,
        /// Persist state here (overrides [storage] state_dir)
        #[arg(long = "state-dir", value_name = "DIR")]
        state_dir: Option<PathBuf>,
    },
    /// Print the speed tier for a bpm against a resting baseline
    Tier {
        #[arg(long)]
        bpm: f64,
        #[arg(long)]
        baseline: f64,
    },
    /// Show the persisted game state
    Status {
        #[arg(long = "state-dir", value_name = "DIR")]
        state_dir: Option<PathBuf>,
    },
    /// Clear samples, session, turn, baselines and registrations
    Reset {
        #[arg(long = "state-dir", value_name = "DIR")]
        state_dir: Option<PathBuf>,
    },
    /// Quick health check (config, state dir, actuator)
    SelfCheck,
}
