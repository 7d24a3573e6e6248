//! Background tasks: the gap filler and the motor control loop.
//!
//! Each `PeriodicTask` spawns exactly one thread. Shutdown is signalled over
//! a channel so a sleeping task wakes immediately; the thread finishes its
//! current tick, runs its `finish` hook and exits. Dropping the task joins.
use crossbeam_channel as xch;
use pulse_traits::Actuator;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::controller::{ControlStatus, MotorController, TurnFeed};
use crate::game::Game;

/// Work run repeatedly on a background thread.
pub trait Periodic: Send + 'static {
    /// Run one tick and return how long to wait before the next one.
    fn tick(&mut self) -> Duration;
    /// Called once on the task thread after the last tick.
    fn finish(&mut self) {}
}

pub struct PeriodicTask {
    name: &'static str,
    stop_tx: Option<xch::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn spawn<P: Periodic>(name: &'static str, mut work: P) -> Self {
        let (stop_tx, stop_rx) = xch::bounded::<()>(1);
        let join_handle = std::thread::spawn(move || {
            tracing::debug!(task = name, "task started");
            loop {
                let wait = work.tick();
                match stop_rx.recv_timeout(wait) {
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => break,
                }
            }
            work.finish();
            tracing::debug!(task = name, "task exiting cleanly");
        });
        Self {
            name,
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
    }

    /// Signal the task and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        // Dropping the sender disconnects the channel and wakes the thread.
        self.stop_tx.take();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!(task = self.name, "task joined"),
                Err(e) => tracing::warn!(task = self.name, ?e, "task panicked during shutdown"),
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

// ── Gap fill ────────────────────────────────────────────────────────────────

pub struct GapFillTask {
    game: Arc<Game>,
    period: Duration,
}

impl GapFillTask {
    pub fn spawn(game: Arc<Game>, period: Duration) -> PeriodicTask {
        PeriodicTask::spawn("gap-fill", Self { game, period })
    }
}

impl Periodic for GapFillTask {
    fn tick(&mut self) -> Duration {
        let filled = self.game.gap_fill_tick();
        if filled > 0 {
            tracing::trace!(filled, "gap fill tick");
        }
        self.period
    }
}

// ── Motor control ───────────────────────────────────────────────────────────

pub struct ControlTask<F, A> {
    controller: MotorController<F, A>,
}

impl<F, A> ControlTask<F, A>
where
    F: TurnFeed + Send + 'static,
    A: Actuator + Send + 'static,
{
    pub fn spawn(controller: MotorController<F, A>) -> PeriodicTask {
        PeriodicTask::spawn("motor-control", Self { controller })
    }
}

impl<F, A> Periodic for ControlTask<F, A>
where
    F: TurnFeed + Send + 'static,
    A: Actuator + Send + 'static,
{
    fn tick(&mut self) -> Duration {
        match self.controller.step() {
            // The burst itself paced the loop.
            ControlStatus::Driving(_) => Duration::ZERO,
            ControlStatus::Paused(_) => self.controller.cfg().idle_period,
        }
    }

    fn finish(&mut self) {
        self.controller.halt();
        tracing::info!("motor halted");
    }
}
