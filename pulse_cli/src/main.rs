#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `pulse`: run, inspect and reset the heart-rate turn game.

mod cli;
mod error_fmt;
mod sim;

use clap::Parser;
use cli::{Cli, Commands, DEFAULT_CONFIG, FILE_GUARD, JSON_MODE};
use eyre::{WrapErr, eyre};
use pulse_core::persist::StateDir;
use pulse_core::{Game, SpeedCfg, SpeedMap};
use pulse_traits::Actuator;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("warning: failed to install color-eyre: {e}");
    }

    let code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", error_fmt::format_error_json(&e));
            } else {
                eprintln!("{}", error_fmt::humanize(&e));
            }
            error_fmt::exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> eyre::Result<()> {
    let (cfg, defaulted) = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    if defaulted {
        tracing::warn!(path = ?cli.config, "config not found; using built-in defaults");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })
        .wrap_err("install Ctrl-C handler")?;
    }

    match cli.cmd {
        Commands::Simulate {
            devices,
            rounds,
            turn_ms,
            sample_ms,
            seed,
            state_dir,
        } => {
            let params = sim::SimParams {
                devices,
                rounds,
                turn: Duration::from_millis(turn_ms),
                sample_every: Duration::from_millis(sample_ms.max(1)),
                seed,
                state_dir,
            };
            let report = simulate(&cfg, &params, &shutdown)?;
            print_sim_report(cli.json, &report.0, report.1.as_ref());
        }
        Commands::Tier { bpm, baseline } => {
            let map = SpeedMap::from_cfg(&SpeedCfg::from(&cfg));
            let delta = bpm - baseline;
            let tier = map.tier(delta);
            let rpm = map.rpm(tier);
            let interval = map.step_interval(rpm);
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "delta": delta,
                        "tier": tier.name(),
                        "rpm": rpm,
                        "step_interval_ms": interval.map(|d| d.as_secs_f64() * 1000.0),
                    })
                );
            } else {
                match interval {
                    Some(d) => println!(
                        "delta {delta:+.1} bpm → {} ({rpm} rpm, {:.2} ms/step)",
                        tier.name(),
                        d.as_secs_f64() * 1000.0
                    ),
                    None => println!("delta {delta:+.1} bpm → {} (motor paused)", tier.name()),
                }
            }
        }
        Commands::Status { state_dir } => {
            let dir = StateDir::open(require_state_dir(state_dir, &cfg)?)?;
            let state = dir.load();
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "session": {
                            "running": state.session.running,
                            "calibrating": state.session.calibrating,
                            "game_over": state.session.game_over,
                        },
                        "turn": state.turn.holder.as_ref().map(|d| d.as_str()),
                        "registered": state.registrations.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
                        "baselines": state.baselines.iter().map(|(d, b)| (d.as_str(), *b)).collect::<std::collections::BTreeMap<_, _>>(),
                        "samples": state.samples.iter().map(|(d, s)| (d.as_str(), s.len())).collect::<std::collections::BTreeMap<_, _>>(),
                    })
                );
            } else {
                println!("session: {:?}", state.session.mode());
                println!(
                    "turn: {}",
                    state.turn.holder.as_ref().map_or("none", |d| d.as_str())
                );
                for id in &state.registrations {
                    let baseline = state
                        .baselines
                        .get(id)
                        .map_or_else(|| "uncalibrated".to_string(), |b| format!("{b:.1} bpm"));
                    let samples = state.samples.get(id).map_or(0, Vec::len);
                    println!("  {id}: baseline {baseline}, {samples} samples");
                }
            }
        }
        Commands::Reset { state_dir } => {
            let dir = require_state_dir(state_dir, &cfg)?;
            let game = Game::builder().with_state_dir(dir.clone()).build()?;
            game.reset();
            if cli.json {
                println!("{}", json!({ "reset": true, "state_dir": dir }));
            } else {
                println!("state cleared in {}", dir.display());
            }
        }
        Commands::SelfCheck => {
            if let Some(dir) = &cfg.storage.state_dir {
                StateDir::open(dir)?;
            }
            let mut actuator = make_actuator(&cfg)?;
            actuator
                .pause()
                .map_err(|e| eyre!("actuator self-check failed: {e}"))?;
            if cli.json {
                println!("{}", json!({ "ok": true }));
            } else {
                println!("OK");
            }
        }
    }
    Ok(())
}

/// Load and validate the config. A missing file at the default path yields
/// defaults; any other missing file is an error.
fn load_config(path: &Path) -> eyre::Result<(pulse_config::Config, bool)> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        return Ok((pulse_config::Config::default(), true));
    }
    Ok((pulse_config::load_file(path)?, false))
}

fn require_state_dir(arg: Option<PathBuf>, cfg: &pulse_config::Config) -> eyre::Result<PathBuf> {
    arg.or_else(|| cfg.storage.state_dir.clone())
        .ok_or_else(|| eyre!("no state directory: pass --state-dir or set [storage] state_dir"))
}

type DynActuator = Box<dyn Actuator + Send>;

#[cfg(feature = "hardware")]
fn make_actuator(cfg: &pulse_config::Config) -> eyre::Result<DynActuator> {
    let stepper = pulse_hardware::UlnStepper::new(cfg.pins.motor)
        .map_err(|e| eyre!("open motor pins: {e}"))?;
    Ok(Box::new(stepper))
}

#[cfg(not(feature = "hardware"))]
fn make_actuator(_cfg: &pulse_config::Config) -> eyre::Result<DynActuator> {
    Ok(Box::new(pulse_hardware::SimulatedActuator::paced()))
}

/// Burst and pause counts, available with the simulated actuator only.
struct MotorStats {
    bursts: usize,
    reversals: usize,
    pauses: usize,
}

#[cfg(feature = "hardware")]
fn simulate(
    cfg: &pulse_config::Config,
    params: &sim::SimParams,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<(sim::SimReport, Option<MotorStats>)> {
    let actuator = make_actuator(cfg)?;
    Ok((sim::run_simulation(cfg, params, actuator, shutdown)?, None))
}

#[cfg(not(feature = "hardware"))]
fn simulate(
    cfg: &pulse_config::Config,
    params: &sim::SimParams,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<(sim::SimReport, Option<MotorStats>)> {
    use pulse_hardware::ActuatorEvent;

    let actuator = pulse_hardware::SimulatedActuator::paced();
    let probe = actuator.clone();
    let report = sim::run_simulation(cfg, params, actuator, shutdown)?;

    let mut stats = MotorStats {
        bursts: 0,
        reversals: 0,
        pauses: 0,
    };
    let mut last_dir = None;
    for ev in probe.events() {
        match ev {
            ActuatorEvent::Drive { direction, .. } => {
                stats.bursts += 1;
                if last_dir.is_some_and(|d| d != direction) {
                    stats.reversals += 1;
                }
                last_dir = Some(direction);
            }
            ActuatorEvent::Pause => stats.pauses += 1,
        }
    }
    Ok((report, Some(stats)))
}

fn print_sim_report(json_out: bool, report: &sim::SimReport, motor: Option<&MotorStats>) {
    if json_out {
        let mut obj = json!({
            "accepted": report.accepted,
            "ignored_not_your_turn": report.ignored_not_your_turn,
            "ignored_idle": report.ignored_idle,
            "turns": report.turns.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
            "baselines": report.baselines.iter().map(|(d, b)| (d.as_str(), *b)).collect::<std::collections::BTreeMap<_, _>>(),
            "interrupted": report.interrupted,
        });
        if let Some(m) = motor {
            obj["motor"] = json!({
                "bursts": m.bursts,
                "reversals": m.reversals,
                "pauses": m.pauses,
            });
        }
        println!("{obj}");
        return;
    }
    println!("Baselines:");
    for (id, b) in &report.baselines {
        println!("  {id}: {b:.1} bpm");
    }
    let turns: Vec<&str> = report.turns.iter().map(|d| d.as_str()).collect();
    println!("Turns: {}", turns.join(" → "));
    println!(
        "Samples: {} accepted, {} ignored (not their turn), {} ignored (idle)",
        report.accepted, report.ignored_not_your_turn, report.ignored_idle
    );
    if let Some(m) = motor {
        println!(
            "Motor: {} bursts, {} reversals, {} pauses",
            m.bursts, m.reversals, m.pauses
        );
    }
    if report.interrupted {
        println!("Interrupted by Ctrl-C.");
    } else {
        println!("Game complete.");
    }
}

fn init_tracing(json: bool, level: &str, logging: &pulse_config::Logging) -> eyre::Result<()> {
    let console_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = vec![console];

    if let Some(file) = &logging.file {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre!("logging.file must name a file"))?;
        std::fs::create_dir_all(dir).wrap_err_with(|| format!("create log dir {dir:?}"))?;
        let appender = match logging.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| eyre!("init tracing: {e}"))
}
