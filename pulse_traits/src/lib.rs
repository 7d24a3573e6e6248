pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::fmt;
use std::time::Duration;

/// Rotation direction of the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Reverse => f.write_str("reverse"),
        }
    }
}

pub trait Actuator {
    /// Drive `steps` steps in `direction`, waiting `step_interval` between steps.
    fn drive(
        &mut self,
        direction: Direction,
        step_interval: Duration,
        steps: u32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// Stop driving and release the coils.
    fn pause(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn drive(
        &mut self,
        direction: Direction,
        step_interval: Duration,
        steps: u32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).drive(direction, step_interval, steps)
    }

    fn pause(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).pause()
    }
}
