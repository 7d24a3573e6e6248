//! Maps `Box<dyn Error>` from trait boundaries to typed `GameError`.
//!
//! `Actuator` and `TurnFeed` return `Box<dyn Error + Send + Sync>`; this
//! module classifies those failures, with an optional feature-gated path for
//! `pulse_hardware::HwError` downcasting. Every mapped error is retryable on
//! the next tick; the control loop never treats it as fatal.

use crate::error::GameError;

/// Map an `Actuator` or `TurnFeed` error to a typed `GameError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_boundary_error(e: &(dyn std::error::Error + 'static)) -> GameError {
    // Feature-gated: try to downcast to HwError for precise mapping
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<pulse_hardware::error::HwError>() {
            return match hw {
                pulse_hardware::error::HwError::Timeout => GameError::Transient(hw.to_string()),
                other => GameError::Hardware(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("unreachable")
        || lower.contains("unavailable")
    {
        GameError::Transient(s)
    } else {
        GameError::Hardware(s)
    }
}
