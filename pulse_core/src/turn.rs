//! Turn arbitration: which single device currently owns the sensor stream.
//!
//! The arbitrator is a plain state machine; linearizability comes from the
//! `Game` mutex that owns it.

use crate::error::{GameError, Result};
use crate::types::DeviceId;
use std::collections::BTreeSet;

/// Result of a `declare` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclareOutcome {
    /// Nobody held the turn; the caller does now.
    Granted,
    /// The caller already held the turn and has given it up.
    Released,
    /// Someone else holds the turn; nothing changed.
    Blocked(DeviceId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnArbitrator {
    holder: Option<DeviceId>,
}

impl TurnArbitrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holder(holder: Option<DeviceId>) -> Self {
        Self { holder }
    }

    pub fn holder(&self) -> Option<&DeviceId> {
        self.holder.as_ref()
    }

    /// Toggle-style claim. A second declare by the holder releases the turn.
    ///
    /// The device must be registered at declare time; a holder that is later
    /// unregistered keeps the turn until the next declare or advance.
    pub fn declare(
        &mut self,
        device: &DeviceId,
        registered: &BTreeSet<DeviceId>,
    ) -> Result<DeclareOutcome> {
        if !registered.contains(device) {
            return Err(GameError::UnknownDevice(device.clone()));
        }
        let outcome = match &self.holder {
            None => {
                self.holder = Some(device.clone());
                DeclareOutcome::Granted
            }
            Some(h) if h == device => {
                self.holder = None;
                DeclareOutcome::Released
            }
            Some(h) => DeclareOutcome::Blocked(h.clone()),
        };
        tracing::info!(device = %device, ?outcome, "turn declare");
        Ok(outcome)
    }

    /// Hand the turn to the next registered device in sorted order, or to the
    /// first one when the current holder is absent or no longer registered.
    pub fn advance(&mut self, registered: &BTreeSet<DeviceId>) -> Result<DeviceId> {
        // BTreeSet iterates in sorted order.
        let ids: Vec<&DeviceId> = registered.iter().collect();
        if ids.is_empty() {
            return Err(GameError::NoRegisteredDevices);
        }
        let next_index = match &self.holder {
            Some(h) => match ids.iter().position(|d| *d == h) {
                Some(i) => (i + 1) % ids.len(),
                None => 0,
            },
            None => 0,
        };
        let next = ids[next_index].clone();
        tracing::info!(from = ?self.holder, to = %next, "turn advanced");
        self.holder = Some(next.clone());
        Ok(next)
    }

    /// Set the holder directly (admin override). The caller checks preconditions.
    pub fn assign(&mut self, device: DeviceId) {
        tracing::info!(device = %device, "turn assigned");
        self.holder = Some(device);
    }

    pub fn reset(&mut self) {
        self.holder = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<DeviceId> {
        ids.iter().map(|s| DeviceId::from(*s)).collect()
    }

    #[test]
    fn declare_grants_then_toggles_off() {
        let reg = set(&["w1", "w2"]);
        let mut t = TurnArbitrator::new();
        let w1 = DeviceId::from("w1");
        assert_eq!(t.declare(&w1, &reg).unwrap(), DeclareOutcome::Granted);
        assert_eq!(t.holder(), Some(&w1));
        assert_eq!(t.declare(&w1, &reg).unwrap(), DeclareOutcome::Released);
        assert_eq!(t.holder(), None);
    }

    #[test]
    fn other_device_is_blocked() {
        let reg = set(&["w1", "w2"]);
        let mut t = TurnArbitrator::new();
        t.declare(&DeviceId::from("w1"), &reg).unwrap();
        assert_eq!(
            t.declare(&DeviceId::from("w2"), &reg).unwrap(),
            DeclareOutcome::Blocked(DeviceId::from("w1"))
        );
        assert_eq!(t.holder(), Some(&DeviceId::from("w1")));
    }

    #[test]
    fn unregistered_device_cannot_declare() {
        let mut t = TurnArbitrator::new();
        let err = t.declare(&DeviceId::from("ghost"), &set(&["w1"])).unwrap_err();
        assert_eq!(err, GameError::UnknownDevice(DeviceId::from("ghost")));
        assert!(t.holder().is_none());
    }

    #[test]
    fn advance_wraps_and_recovers_from_stale_holder() {
        let reg = set(&["w2", "w1", "w3"]);
        let mut t = TurnArbitrator::new();
        assert_eq!(t.advance(&reg).unwrap().as_str(), "w1");
        assert_eq!(t.advance(&reg).unwrap().as_str(), "w2");
        assert_eq!(t.advance(&reg).unwrap().as_str(), "w3");
        assert_eq!(t.advance(&reg).unwrap().as_str(), "w1");

        let mut stale = TurnArbitrator::with_holder(Some(DeviceId::from("gone")));
        assert_eq!(stale.advance(&reg).unwrap().as_str(), "w1");
    }

    #[test]
    fn advance_without_devices_fails_without_side_effect() {
        let mut t = TurnArbitrator::with_holder(Some(DeviceId::from("w1")));
        assert_eq!(t.advance(&BTreeSet::new()), Err(GameError::NoRegisteredDevices));
        assert_eq!(t.holder().map(DeviceId::as_str), Some("w1"));
        t.reset();
        assert!(t.holder().is_none());
    }
}
