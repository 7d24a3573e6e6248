//! Identifiers and samples shared by every component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one physical wearable (e.g. `watch1`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One heart-rate reading. Ordered by `timestamp_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub bpm: i32,
    /// Carried forward by the gap filler rather than reported by a device.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

impl Sample {
    pub fn real(timestamp_ms: i64, bpm: i32) -> Self {
        Self {
            timestamp_ms,
            bpm,
            synthetic: false,
        }
    }

    pub fn synthetic(timestamp_ms: i64, bpm: i32) -> Self {
        Self {
            timestamp_ms,
            bpm,
            synthetic: true,
        }
    }
}
