//! Human-readable error descriptions and structured JSON error formatting.

use pulse_core::{ErrorKind, GameError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(ge) = err.downcast_ref::<GameError>() {
        return match ge {
            GameError::MissingBaselines(missing) => {
                let ids: Vec<&str> = missing.iter().map(|d| d.as_str()).collect();
                format!(
                    "What happened: The game cannot start; no baseline for {}.\nLikely causes: Calibration was skipped or too few samples arrived for these devices.\nHow to fix: Run calibration until each device has reported enough samples, compute their baselines, then start again.",
                    ids.join(", ")
                )
            }
            GameError::InsufficientSamples { have, need } => format!(
                "What happened: Baseline needs {need} samples in the calibration window but only {have} arrived.\nLikely causes: The wearable is not reporting, or calibration stopped too early.\nHow to fix: Keep calibrating longer, or lower calibration.min_samples in the config."
            ),
            GameError::NoRegisteredDevices => {
                "What happened: No devices are registered, so there is nobody to give the turn to.\nLikely causes: Registration was skipped or state was reset.\nHow to fix: Register at least one wearable before advancing turns.".to_string()
            }
            GameError::UnknownDevice(id) => format!(
                "What happened: Device {id} is not registered.\nLikely causes: Typo in the device id, or the device was unregistered.\nHow to fix: Register the device first."
            ),
            GameError::Validation(msg) => format!(
                "What happened: Input was rejected ({msg}).\nLikely causes: Empty device id, bpm outside game.bpm_min..=game.bpm_max, or a timestamp beyond game.max_future_skew_ms.\nHow to fix: Correct the input and resend."
            ),
            GameError::Hardware(msg) => format!(
                "What happened: The motor driver or turn feed reported a fault ({msg}).\nLikely causes: Wrong [pins] values, wiring or power problems.\nHow to fix: Check the coil pins and driver power, then retry."
            ),
            GameError::Transient(msg) => format!(
                "What happened: A collaborator was unreachable ({msg}).\nLikely causes: Driver or feed timed out.\nHow to fix: Retry; the control loop recovers on its own at the next tick."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: The session is in the wrong mode for this operation.\nHow to fix: Check `pulse status` and start calibration or the session first."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open motor pins") || lower.contains("gpio") {
        return "What happened: Failed to initialize the stepper coil pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix [pins] motor in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass an existing TOML file with --config. Original: {msg}"
        );
    }

    if lower.contains("parse config") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: A TOML syntax error or an out-of-range value.\nHow to fix: Edit the config file and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: validation 2, precondition 3, transient 4, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<GameError>().map(GameError::kind) {
        Some(ErrorKind::Validation) => 2,
        Some(ErrorKind::Precondition) => 3,
        Some(ErrorKind::TransientIo) => 4,
        None => 1,
    }
}

fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "Validation",
        ErrorKind::Precondition => "Precondition",
        ErrorKind::TransientIo => "TransientIo",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(ge) = err.downcast_ref::<GameError>() {
        let mut obj = json!({
            "reason": kind_name(ge.kind()),
            "error": ge.to_string(),
            "message": humanize(err),
        });
        if let GameError::MissingBaselines(missing) = ge {
            obj["details"] = json!({
                "missing": missing.iter().map(|d| d.as_str()).collect::<Vec<_>>()
            });
        }
        return obj.to_string();
    }

    // Generic error JSON
    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}
