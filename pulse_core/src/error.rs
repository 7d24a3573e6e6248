use crate::types::DeviceId;
use std::collections::BTreeSet;
use thiserror::Error;

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input; rejected at the boundary and never stored.
    Validation,
    /// Wrong mode or missing prerequisite; the operation had no side effect.
    Precondition,
    /// A collaborator was unreachable; retry on the next tick.
    TransientIo,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GameError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("session is not running")]
    NotRunning,
    #[error("insufficient samples: {have} in window, need {need}")]
    InsufficientSamples { have: usize, need: usize },
    #[error("no registered devices")]
    NoRegisteredDevices,
    #[error("unknown device: {0}")]
    UnknownDevice(DeviceId),
    #[error("missing baselines: {}", join_ids(.0))]
    MissingBaselines(BTreeSet<DeviceId>),
    #[error("collaborator fault: {0}")]
    Hardware(String),
    #[error("collaborator unavailable: {0}")]
    Transient(String),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::Validation(_) => ErrorKind::Validation,
            GameError::NotRunning
            | GameError::InsufficientSamples { .. }
            | GameError::NoRegisteredDevices
            | GameError::UnknownDevice(_)
            | GameError::MissingBaselines(_) => ErrorKind::Precondition,
            GameError::Hardware(_) | GameError::Transient(_) => ErrorKind::TransientIo,
        }
    }
}

fn join_ids(ids: &BTreeSet<DeviceId>) -> String {
    ids.iter()
        .map(DeviceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, GameError>;
pub use eyre::Report;
