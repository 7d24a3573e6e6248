//! File-backed state.
//!
//! Samples go to an append-only JSON-lines log, one sample per line, so an
//! accepted sample costs one short write no matter how long the session has
//! run. The log is replaced atomically only when it is compacted at open or
//! cleared by a reset. Every other entity is one small JSON record, replaced
//! atomically on each change.
//!
//! Loading never fails on content. A missing, empty, or corrupt record is
//! treated as "no data" and logged, so a damaged file resets that entity
//! instead of stopping the process. A corrupt log line drops that line only.

use crate::session::SessionState;
use crate::store::SampleStore;
use crate::types::{DeviceId, Sample};
use eyre::WrapErr;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The entities persisted as separate files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Samples,
    Turn,
    Session,
    Baselines,
    Registrations,
}

impl Record {
    pub const ALL: [Record; 5] = [
        Record::Samples,
        Record::Turn,
        Record::Session,
        Record::Baselines,
        Record::Registrations,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Record::Samples => "samples.jsonl",
            Record::Turn => "turn.json",
            Record::Session => "session.json",
            Record::Baselines => "baselines.json",
            Record::Registrations => "registrations.json",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub holder: Option<DeviceId>,
}

/// One line of the sample log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub device: DeviceId,
    #[serde(flatten)]
    pub sample: Sample,
}

/// Everything read back at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub samples: BTreeMap<DeviceId, Vec<Sample>>,
    pub turn: TurnRecord,
    pub session: SessionState,
    pub baselines: BTreeMap<DeviceId, f64>,
    pub registrations: BTreeSet<DeviceId>,
}

/// Decode one record; `None` for empty or unparsable input.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    let text = std::str::from_utf8(bytes).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Decode a sample log. Returns the readable entries in file order and the
/// number of non-blank lines that were skipped.
pub fn decode_sample_log(bytes: &[u8]) -> (Vec<LogEntry>, usize) {
    let mut entries = Vec::new();
    let mut skipped = 0;
    for line in bytes.split(|b| *b == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match decode::<LogEntry>(line) {
            Some(entry) => entries.push(entry),
            None => skipped += 1,
        }
    }
    (entries, skipped)
}

fn encode_lines<'a>(
    entries: impl IntoIterator<Item = (&'a DeviceId, &'a Sample)>,
) -> eyre::Result<Vec<u8>> {
    let mut out = Vec::new();
    for (device, sample) in entries {
        let entry = LogEntry {
            device: device.clone(),
            sample: *sample,
        };
        serde_json::to_writer(&mut out, &entry).wrap_err("encode sample log entry")?;
        out.push(b'\n');
    }
    Ok(out)
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".new");
    {
        let mut f = File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

#[derive(Debug)]
pub struct StateDir {
    dir: PathBuf,
    // Lazily opened append handle for the sample log. Dropped whenever the
    // log is replaced so the next append opens the new file.
    log: Mutex<Option<File>>,
}

impl StateDir {
    pub fn open(dir: impl Into<PathBuf>) -> eyre::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).wrap_err_with(|| format!("create state dir {dir:?}"))?;
        Ok(Self {
            dir,
            log: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, record: Record) -> PathBuf {
        self.dir.join(record.file_name())
    }

    fn log_handle(&self) -> MutexGuard<'_, Option<File>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn save<T: Serialize>(&self, record: Record, value: &T) -> eyre::Result<()> {
        let bytes = serde_json::to_vec_pretty(value)
            .wrap_err_with(|| format!("encode {}", record.file_name()))?;
        let path = self.record_path(record);
        write_atomic(&path, &bytes).wrap_err_with(|| format!("write {path:?}"))?;
        tracing::trace!(file = record.file_name(), bytes = bytes.len(), "record saved");
        Ok(())
    }

    /// Append samples to the log. Cost depends only on `entries`.
    pub fn append_samples(&self, entries: &[(DeviceId, Sample)]) -> eyre::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let bytes = encode_lines(entries.iter().map(|(d, s)| (d, s)))?;
        let path = self.record_path(Record::Samples);
        let mut handle = self.log_handle();
        // A failed write drops the handle; the next append reopens the file.
        let mut file = match handle.take() {
            Some(f) => f,
            None => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .wrap_err_with(|| format!("open {path:?}"))?,
        };
        file.write_all(&bytes).wrap_err_with(|| format!("append {path:?}"))?;
        *handle = Some(file);
        tracing::trace!(lines = entries.len(), bytes = bytes.len(), "samples appended");
        Ok(())
    }

    /// Replace the log with exactly `series`, oldest first per device.
    pub fn rewrite_samples(&self, series: &BTreeMap<DeviceId, Vec<Sample>>) -> eyre::Result<()> {
        let bytes = encode_lines(
            series
                .iter()
                .flat_map(|(device, samples)| samples.iter().map(move |s| (device, s))),
        )?;
        let path = self.record_path(Record::Samples);
        let mut handle = self.log_handle();
        *handle = None;
        write_atomic(&path, &bytes).wrap_err_with(|| format!("write {path:?}"))?;
        tracing::debug!(bytes = bytes.len(), "sample log rewritten");
        Ok(())
    }

    fn read_record(&self, record: Record) -> Option<Vec<u8>> {
        let path = self.record_path(record);
        match fs::read(&path) {
            Ok(b) => Some(b),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(file = record.file_name(), error = %e, "unreadable record; starting empty");
                None
            }
        }
    }

    fn load_record<T: DeserializeOwned + Default>(&self, record: Record) -> T {
        let Some(bytes) = self.read_record(record) else {
            return T::default();
        };
        match decode::<T>(&bytes) {
            Some(v) => v,
            None => {
                if !bytes.iter().all(u8::is_ascii_whitespace) {
                    tracing::warn!(file = record.file_name(), "corrupt record; starting empty");
                }
                T::default()
            }
        }
    }

    /// Replay the sample log in file order with the store's insert rules.
    fn load_samples(&self) -> BTreeMap<DeviceId, Vec<Sample>> {
        let Some(bytes) = self.read_record(Record::Samples) else {
            return BTreeMap::new();
        };
        let (entries, skipped) = decode_sample_log(&bytes);
        if skipped > 0 {
            tracing::warn!(file = Record::Samples.file_name(), skipped, "corrupt sample log lines dropped");
        }
        let mut store = SampleStore::new(1);
        for entry in &entries {
            store.insert(&entry.device, entry.sample);
        }
        store.into_series()
    }

    pub fn load(&self) -> PersistedState {
        PersistedState {
            samples: self.load_samples(),
            turn: self.load_record(Record::Turn),
            session: self.load_record(Record::Session),
            baselines: self.load_record(Record::Baselines),
            registrations: self.load_record(Record::Registrations),
        }
    }
}
