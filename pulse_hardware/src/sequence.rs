//! Coil pattern for a 4-phase unipolar stepper (ULN2003-style driver).
//!
//! Both directions walk the same 0x99 pattern; forward shifts it right
//! against the low nibble, reverse shifts it left against the high nibble.

use pulse_traits::Direction;

const PATTERN: u32 = 0x99;

/// Phases in one full coil cycle.
pub const PHASES: u32 = 4;

/// Coil levels for `phase` (taken modulo 4), in pin order.
pub fn coil_levels(direction: Direction, phase: u32) -> [bool; 4] {
    let j = phase % PHASES;
    let mut out = [false; 4];
    for (i, level) in (0u32..).zip(out.iter_mut()) {
        *level = match direction {
            Direction::Forward => (PATTERN >> j) & (0x08 >> i) != 0,
            Direction::Reverse => (PATTERN << j) & (0x80 >> i) != 0,
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, [true, false, false, true])]
    #[case(1, [true, true, false, false])]
    #[case(2, [false, true, true, false])]
    #[case(3, [false, false, true, true])]
    #[case(4, [true, false, false, true])]
    fn forward_phases(#[case] phase: u32, #[case] expect: [bool; 4]) {
        assert_eq!(coil_levels(Direction::Forward, phase), expect);
    }

    #[rstest]
    #[case(0, [true, false, false, true])]
    #[case(1, [false, false, true, true])]
    #[case(2, [false, true, true, false])]
    #[case(3, [true, true, false, false])]
    fn reverse_phases(#[case] phase: u32, #[case] expect: [bool; 4]) {
        assert_eq!(coil_levels(Direction::Reverse, phase), expect);
    }

    #[test]
    fn two_adjacent_coils_always_energized() {
        for d in [Direction::Forward, Direction::Reverse] {
            for p in 0..PHASES {
                assert_eq!(coil_levels(d, p).iter().filter(|l| **l).count(), 2);
            }
        }
    }
}
