//! The coordinating state container behind every external operation.
//!
//! `Game` owns the sample store, session, turn, baselines and registration
//! set behind a single mutex. Every operation takes the lock once, so
//! `declare`, `advance` and `append` are linearizable with respect to each
//! other. When built with a state directory, accepted and synthetic samples
//! are appended to a sample log and every other mutation rewrites that
//! entity's JSON record.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pulse_traits::clock::{Clock, SystemClock};

use crate::baseline::BaselineCalibrator;
use crate::config::{CalibrationCfg, GameCfg};
use crate::controller::ControlSnapshot;
use crate::error::{GameError, Result};
use crate::gap_fill::{GapFiller, InterpolationWindow, interpolate};
use crate::persist::{PersistedState, Record, StateDir, TurnRecord};
use crate::session::SessionState;
use crate::store::SampleStore;
use crate::turn::{DeclareOutcome, TurnArbitrator};
use crate::types::{DeviceId, Sample};

/// Longest accepted device identifier, in bytes.
pub const MAX_DEVICE_ID_LEN: usize = 64;

// ── Outcomes ────────────────────────────────────────────────────────────────

/// Why a well-formed sample was not stored. Not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Neither running nor calibrating.
    SessionIdle,
    /// Another device holds the turn.
    NotYourTurn(DeviceId),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::SessionIdle => f.write_str("session idle"),
            IgnoreReason::NotYourTurn(holder) => {
                write!(f, "not this device's turn (holder: {holder})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Ignored(IgnoreReason),
}

// ── State ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct GameState {
    session: SessionState,
    store: SampleStore,
    turns: TurnArbitrator,
    baselines: BaselineCalibrator,
    registered: BTreeSet<DeviceId>,
}

pub struct Game {
    state: Mutex<GameState>,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: GameCfg,
    filler: GapFiller,
    storage: Option<StateDir>,
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("cfg", &self.cfg)
            .field("storage", &self.storage.as_ref().map(StateDir::path))
            .finish_non_exhaustive()
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct GameBuilder {
    game: Option<GameCfg>,
    calibration: Option<CalibrationCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    state_dir: Option<PathBuf>,
}

impl GameBuilder {
    pub fn with_game_cfg(mut self, cfg: GameCfg) -> Self {
        self.game = Some(cfg);
        self
    }

    pub fn with_calibration_cfg(mut self, cfg: CalibrationCfg) -> Self {
        self.calibration = Some(cfg);
        self
    }

    /// Inject a clock (tests use `ManualClock`).
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Back the game with a sample log plus one JSON record per other
    /// entity under `dir`.
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    /// Build the game, loading persisted state when a state directory is set.
    ///
    /// Unreadable or corrupt records load as empty. The session always starts
    /// idle regardless of what was persisted.
    pub fn build(self) -> eyre::Result<Game> {
        let cfg = self.game.unwrap_or_default();
        let cal = self.calibration.unwrap_or_default();
        if cfg.tick_ms <= 0 {
            eyre::bail!("game.tick_ms must be >= 1");
        }
        if cal.min_samples == 0 {
            eyre::bail!("calibration.min_samples must be >= 1");
        }
        if cfg.max_future_skew_ms < 0 {
            eyre::bail!("game.max_future_skew_ms must be >= 0");
        }
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let storage = self.state_dir.map(StateDir::open).transpose()?;
        Ok(Game::assemble(cfg, cal, clock, storage))
    }
}

// ── Operations ──────────────────────────────────────────────────────────────

impl Game {
    pub fn builder() -> GameBuilder {
        GameBuilder::default()
    }

    /// In-memory game with default settings and the system clock.
    pub fn in_memory() -> Self {
        Self::assemble(
            GameCfg::default(),
            CalibrationCfg::default(),
            Arc::new(SystemClock::new()),
            None,
        )
    }

    fn assemble(
        cfg: GameCfg,
        cal: CalibrationCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        storage: Option<StateDir>,
    ) -> Self {
        let loaded = match &storage {
            Some(dir) => {
                let loaded = dir.load();
                tracing::info!(
                    dir = ?dir.path(),
                    devices = loaded.samples.len(),
                    registered = loaded.registrations.len(),
                    baselines = loaded.baselines.len(),
                    "state loaded"
                );
                loaded
            }
            None => PersistedState::default(),
        };
        let state = GameState {
            session: SessionState::default(),
            store: SampleStore::from_series(loaded.samples, cfg.history_cap),
            turns: TurnArbitrator::with_holder(loaded.turn.holder),
            baselines: BaselineCalibrator::with_baselines(cal, loaded.baselines),
            registered: loaded.registrations,
        };
        let game = Self {
            state: Mutex::new(state),
            clock,
            filler: GapFiller::new(cfg.tick_ms),
            cfg,
            storage,
        };
        {
            let st = game.lock();
            // Writes back the idle session and compacts the sample log.
            game.persist(&st, &[Record::Session, Record::Samples]);
        }
        game
    }

    pub fn cfg(&self) -> &GameCfg {
        &self.cfg
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    fn lock(&self) -> MutexGuard<'_, GameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, st: &GameState, records: &[Record]) {
        let Some(dir) = &self.storage else {
            return;
        };
        for &record in records {
            let res = match record {
                Record::Samples => dir.rewrite_samples(st.store.series()),
                Record::Turn => dir.save(
                    record,
                    &TurnRecord {
                        holder: st.turns.holder().cloned(),
                    },
                ),
                Record::Session => dir.save(record, &st.session),
                Record::Baselines => dir.save(record, st.baselines.all()),
                Record::Registrations => dir.save(record, &st.registered),
            };
            if let Err(e) = res {
                tracing::warn!(file = record.file_name(), error = %e, "persist failed; in-memory state kept");
            }
        }
    }

    fn log_samples(&self, entries: &[(DeviceId, Sample)]) {
        let Some(dir) = &self.storage else {
            return;
        };
        if let Err(e) = dir.append_samples(entries) {
            tracing::warn!(file = Record::Samples.file_name(), error = %e, "persist failed; in-memory state kept");
        }
    }

    // Registration

    pub fn register(&self, device: &str) -> Result<bool> {
        let id = parse_device(device)?;
        let mut st = self.lock();
        let added = st.registered.insert(id.clone());
        if added {
            tracing::info!(device = %id, "device registered");
            self.persist(&st, &[Record::Registrations]);
        }
        Ok(added)
    }

    /// Remove a device from the registration set. A current holder keeps the
    /// turn until the next declare or advance.
    pub fn unregister(&self, device: &str) -> Result<bool> {
        let id = parse_device(device)?;
        let mut st = self.lock();
        let removed = st.registered.remove(&id);
        if removed {
            tracing::info!(device = %id, "device unregistered");
            self.persist(&st, &[Record::Registrations]);
        }
        Ok(removed)
    }

    pub fn registered(&self) -> BTreeSet<DeviceId> {
        self.lock().registered.clone()
    }

    // Ingestion

    /// Validate, then gate on session mode, then on turn ownership.
    ///
    /// `timestamp_ms` defaults to the game clock. An explicit timestamp must
    /// be positive and no more than `max_future_skew_ms` ahead of the clock.
    pub fn submit_sample(
        &self,
        device: &str,
        bpm: i64,
        timestamp_ms: Option<i64>,
    ) -> Result<SubmitOutcome> {
        let id = parse_device(device)?;
        let bpm = i32::try_from(bpm)
            .ok()
            .filter(|b| (self.cfg.bpm_min..=self.cfg.bpm_max).contains(b))
            .ok_or_else(|| {
                GameError::Validation(format!(
                    "bpm {bpm} outside {}..={}",
                    self.cfg.bpm_min, self.cfg.bpm_max
                ))
            })?;
        let now = self.clock.now_ms();
        if let Some(ts) = timestamp_ms {
            if ts <= 0 {
                return Err(GameError::Validation(format!("timestamp {ts} must be positive")));
            }
            let limit = now.saturating_add(self.cfg.max_future_skew_ms);
            if ts > limit {
                return Err(GameError::Validation(format!(
                    "timestamp {ts} is more than {} ms ahead of now ({now})",
                    self.cfg.max_future_skew_ms
                )));
            }
        }
        let ts = timestamp_ms.unwrap_or(now);

        let mut st = self.lock();
        if st.session.is_idle() {
            tracing::debug!(device = %id, bpm, "sample ignored: session idle");
            return Ok(SubmitOutcome::Ignored(IgnoreReason::SessionIdle));
        }
        if let Some(holder) = st.turns.holder()
            && *holder != id
        {
            let holder = holder.clone();
            tracing::debug!(device = %id, holder = %holder, bpm, "sample ignored: not this device's turn");
            return Ok(SubmitOutcome::Ignored(IgnoreReason::NotYourTurn(holder)));
        }
        let session = st.session;
        if st.store.append(&session, &id, bpm, ts).is_err() {
            return Ok(SubmitOutcome::Ignored(IgnoreReason::SessionIdle));
        }
        tracing::debug!(device = %id, bpm, ts, "sample accepted");
        self.log_samples(&[(id, Sample::real(ts, bpm))]);
        Ok(SubmitOutcome::Accepted)
    }

    /// Latest sample of the turn holder, or of every device when nobody
    /// holds the turn.
    pub fn latest_samples(&self) -> BTreeMap<DeviceId, Sample> {
        let st = self.lock();
        match st.turns.holder() {
            Some(holder) => st
                .store
                .latest(holder)
                .map(|s| (holder.clone(), s))
                .into_iter()
                .collect(),
            None => st.store.latest_all(),
        }
    }

    /// Samples of `device` inside the display window.
    pub fn recent(&self, device: &str) -> Result<Vec<Sample>> {
        let id = parse_device(device)?;
        let since = self.clock.now_ms().saturating_sub(self.cfg.display_window_ms);
        Ok(self.lock().store.window(&id, since))
    }

    /// Continuous carried-forward view of `device` for graphing.
    pub fn interpolated(&self, device: &str) -> Result<Vec<Sample>> {
        let id = parse_device(device)?;
        let now = self.clock.now_ms();
        let since = now.saturating_sub(self.cfg.display_window_ms);
        let samples = self.lock().store.window(&id, since);
        Ok(interpolate(
            &samples,
            now,
            InterpolationWindow {
                window_ms: self.cfg.display_window_ms,
                interval_ms: self.cfg.tick_ms,
                buffer_ms: self.cfg.interp_buffer_ms,
            },
        ))
    }

    /// Last accepted real samples across all devices, oldest first.
    pub fn history(&self) -> Vec<(DeviceId, Sample)> {
        self.lock().store.history()
    }

    // Turn

    pub fn declare_turn(&self, device: &str) -> Result<DeclareOutcome> {
        let id = parse_device(device)?;
        let mut guard = self.lock();
        let st = &mut *guard;
        let outcome = st.turns.declare(&id, &st.registered)?;
        if !matches!(outcome, DeclareOutcome::Blocked(_)) {
            self.persist(st, &[Record::Turn]);
        }
        Ok(outcome)
    }

    pub fn advance_turn(&self) -> Result<DeviceId> {
        let mut guard = self.lock();
        let st = &mut *guard;
        let next = st.turns.advance(&st.registered)?;
        self.persist(st, &[Record::Turn]);
        Ok(next)
    }

    /// Admin override: give the turn to `device` directly.
    pub fn assign_turn(&self, device: &str) -> Result<()> {
        let id = parse_device(device)?;
        let mut st = self.lock();
        if !st.session.running {
            return Err(GameError::NotRunning);
        }
        if !st.registered.contains(&id) {
            return Err(GameError::UnknownDevice(id));
        }
        st.turns.assign(id);
        self.persist(&st, &[Record::Turn]);
        Ok(())
    }

    pub fn current_turn(&self) -> Option<DeviceId> {
        self.lock().turns.holder().cloned()
    }

    // Session

    /// Start the game. Every registered device needs a baseline first.
    pub fn start_session(&self) -> Result<()> {
        let mut st = self.lock();
        let (ok, missing) = st.baselines.all_calibrated(&st.registered);
        if !ok {
            tracing::warn!(missing = ?missing, "session start refused");
            return Err(GameError::MissingBaselines(missing));
        }
        st.session.start();
        tracing::info!(devices = st.registered.len(), "session started");
        self.persist(&st, &[Record::Session]);
        Ok(())
    }

    pub fn stop_session(&self) {
        let mut st = self.lock();
        let was_running = st.session.running;
        st.session.stop();
        if was_running {
            tracing::info!("session stopped; game over");
            self.persist(&st, &[Record::Session]);
        }
    }

    pub fn status(&self) -> SessionState {
        self.lock().session
    }

    // Calibration

    pub fn start_calibration(&self) {
        let mut guard = self.lock();
        let st = &mut *guard;
        st.baselines.start_calibration(&mut st.session);
        tracing::info!("calibration started");
        self.persist(st, &[Record::Session]);
    }

    pub fn stop_calibration(&self) {
        let mut guard = self.lock();
        let st = &mut *guard;
        st.baselines.stop_calibration(&mut st.session);
        tracing::info!("calibration stopped");
        self.persist(st, &[Record::Session]);
    }

    pub fn compute_baseline(&self, device: &str) -> Result<f64> {
        let id = parse_device(device)?;
        let now = self.clock.now_ms();
        let mut guard = self.lock();
        let st = &mut *guard;
        let avg = st.baselines.compute_baseline(&st.store, &id, now)?;
        self.persist(st, &[Record::Baselines]);
        Ok(avg)
    }

    pub fn baselines(&self) -> BTreeMap<DeviceId, f64> {
        self.lock().baselines.all().clone()
    }

    // Maintenance

    /// Clear samples, session, turn, baselines and registrations.
    pub fn reset(&self) {
        let mut st = self.lock();
        st.store.reset();
        st.session.reset();
        st.turns.reset();
        st.baselines.reset();
        st.registered.clear();
        tracing::info!("game state reset");
        self.persist(&st, &Record::ALL);
    }

    /// One gap-fill tick at the current clock time. Returns how many
    /// synthetic samples were stored.
    pub fn gap_fill_tick(&self) -> usize {
        let now = self.clock.now_ms();
        let mut guard = self.lock();
        let st = &mut *guard;
        let filled = self.filler.tick(&mut st.store, &st.session, now);
        self.log_samples(&filled);
        filled.len()
    }

    /// Everything the motor loop needs, read under one lock.
    pub fn control_snapshot(&self) -> ControlSnapshot {
        let st = self.lock();
        let holder = st.turns.holder().cloned();
        let (latest, baseline) = match &holder {
            Some(h) => (st.store.latest(h), st.baselines.get(h)),
            None => (None, None),
        };
        ControlSnapshot {
            running: st.session.running,
            holder,
            latest,
            baseline,
        }
    }
}

fn parse_device(raw: &str) -> Result<DeviceId> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GameError::Validation("device id is empty".into()));
    }
    if trimmed.len() > MAX_DEVICE_ID_LEN {
        return Err(GameError::Validation(format!(
            "device id longer than {MAX_DEVICE_ID_LEN} bytes"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(GameError::Validation("device id contains control characters".into()));
    }
    Ok(DeviceId::from(trimmed))
}
