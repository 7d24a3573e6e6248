use pulse_hardware::{ActuatorEvent, SimulatedActuator};
use pulse_traits::{Actuator, Direction};
use rstest::rstest;
use std::time::Duration;

#[rstest]
#[case(1, [true, true, false, false])]
#[case(2, [false, true, true, false])]
#[case(32, [true, false, false, true])]
fn phase_follows_step_count(#[case] steps: u32, #[case] coils: [bool; 4]) {
    let mut act = SimulatedActuator::new();
    act.drive(Direction::Forward, Duration::from_millis(3), steps)
        .unwrap();
    assert_eq!(act.coils(Direction::Forward), coils);
}

#[test]
fn recovers_after_fault_clears() {
    let mut act = SimulatedActuator::new();
    let handle = act.clone();
    handle.set_unreachable(true);
    assert!(act.pause().is_err());
    handle.set_unreachable(false);
    act.pause().unwrap();
    assert_eq!(handle.events(), vec![ActuatorEvent::Pause]);
}

#[test]
fn paced_drive_blocks_for_the_burst() {
    let mut act = SimulatedActuator::paced();
    let start = std::time::Instant::now();
    act.drive(Direction::Reverse, Duration::from_millis(2), 10)
        .unwrap();
    assert!(start.elapsed() >= Duration::from_millis(20));
}
