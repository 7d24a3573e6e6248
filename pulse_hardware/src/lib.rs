pub mod error;
pub mod sequence;

use pulse_traits::{Actuator, Direction};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::HwError;

/// What the simulated actuator was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorEvent {
    Drive {
        direction: Direction,
        step_interval: Duration,
        steps: u32,
    },
    Pause,
}

/// Simulated actuator implementation.
///
/// Records every command in a shared log, tracks the coil phase the real
/// stepper would be in, and can be told to fail like an unreachable driver.
/// Clones share the log and the fault switch.
#[derive(Debug, Clone, Default)]
pub struct SimulatedActuator {
    events: Arc<Mutex<Vec<ActuatorEvent>>>,
    unreachable: Arc<AtomicBool>,
    phase: u32,
    /// Sleep for the burst duration, like the real driver.
    paced: bool,
}

impl SimulatedActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated actuator whose `drive` blocks for `steps * step_interval`.
    pub fn paced() -> Self {
        Self {
            paced: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<ActuatorEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make subsequent commands fail with `HwError::Timeout`.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::Relaxed);
    }

    /// Coil levels the real stepper would currently hold.
    pub fn coils(&self, direction: Direction) -> [bool; 4] {
        sequence::coil_levels(direction, self.phase)
    }

    fn record(&self, event: ActuatorEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Actuator for SimulatedActuator {
    fn drive(
        &mut self,
        direction: Direction,
        step_interval: Duration,
        steps: u32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Timeout));
        }
        self.phase = self.phase.wrapping_add(steps) % sequence::PHASES;
        self.record(ActuatorEvent::Drive {
            direction,
            step_interval,
            steps,
        });
        tracing::trace!(%direction, ?step_interval, steps, "simulated burst");
        if self.paced {
            std::thread::sleep(step_interval.saturating_mul(steps));
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Timeout));
        }
        self.record(ActuatorEvent::Pause);
        Ok(())
    }
}

#[cfg(feature = "hardware")]
pub use stepper::UlnStepper;

#[cfg(feature = "hardware")]
mod stepper {
    use crate::error::HwError;
    use crate::sequence;
    use pulse_traits::{Actuator, Direction};
    use rppal::gpio::{Gpio, OutputPin};
    use std::thread::sleep;
    use std::time::Duration;

    /// 4-coil unipolar stepper on GPIO, two coils energised per phase (0x99 pattern).
    pub struct UlnStepper {
        coils: Vec<OutputPin>,
        phase: u32,
    }

    impl UlnStepper {
        pub fn new(pins: [u8; 4]) -> Result<Self, HwError> {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            let mut coils = Vec::with_capacity(4);
            for pin in pins {
                let out = gpio
                    .get(pin)
                    .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))?
                    .into_output_low();
                coils.push(out);
            }
            tracing::info!(?pins, "stepper coils ready");
            Ok(Self { coils, phase: 0 })
        }

        fn apply(&mut self, levels: [bool; 4]) {
            for (pin, high) in self.coils.iter_mut().zip(levels) {
                if high {
                    pin.set_high();
                } else {
                    pin.set_low();
                }
            }
        }
    }

    impl Actuator for UlnStepper {
        fn drive(
            &mut self,
            direction: Direction,
            step_interval: Duration,
            steps: u32,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            for _ in 0..steps {
                self.apply(sequence::coil_levels(direction, self.phase));
                self.phase = (self.phase + 1) % sequence::PHASES;
                sleep(step_interval);
            }
            Ok(())
        }

        fn pause(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.apply([false; 4]);
            tracing::debug!("stepper coils released");
            Ok(())
        }
    }

    impl Drop for UlnStepper {
        fn drop(&mut self) {
            self.apply([false; 4]);
        }
    }
}
