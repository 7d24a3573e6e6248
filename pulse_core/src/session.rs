//! Session mode: idle, running, or calibrating.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Idle,
    Running,
    Calibrating,
}

/// Running and calibrating are never both set; both clear is idle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub running: bool,
    pub game_over: bool,
    pub calibrating: bool,
}

impl SessionState {
    pub fn mode(&self) -> SessionMode {
        if self.running {
            SessionMode::Running
        } else if self.calibrating {
            SessionMode::Calibrating
        } else {
            SessionMode::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.mode() == SessionMode::Idle
    }

    pub fn start(&mut self) {
        self.running = true;
        self.calibrating = false;
        self.game_over = false;
    }

    /// Ends a running game. Stopping an idle or calibrating session is a no-op.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.game_over = true;
        }
    }

    pub fn start_calibration(&mut self) {
        self.calibrating = true;
        self.running = false;
        self.game_over = false;
    }

    pub fn stop_calibration(&mut self) {
        self.calibrating = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
