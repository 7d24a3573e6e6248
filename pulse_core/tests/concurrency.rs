//! Racing callers against one shared `Game`.
//!
//! Verifies that:
//! - Concurrent declares grant the turn to exactly one device
//! - Samples racing an advance are stored exactly when reported accepted

use pulse_core::{DeclareOutcome, DeviceId, Game, SubmitOutcome};
use std::sync::{Arc, Barrier};
use std::thread;

fn shared_game(devices: usize) -> Arc<Game> {
    let game = Arc::new(Game::in_memory());
    for i in 0..devices {
        game.register(&format!("dev{i}")).unwrap();
    }
    game
}

#[test]
fn concurrent_declares_grant_exactly_one() {
    for _ in 0..20 {
        let game = shared_game(8);
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let game = game.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    game.declare_turn(&format!("dev{i}")).unwrap()
                })
            })
            .collect();
        let outcomes: Vec<DeclareOutcome> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let granted = outcomes
            .iter()
            .filter(|o| **o == DeclareOutcome::Granted)
            .count();
        assert_eq!(granted, 1);
        let holder = game.current_turn().unwrap();
        for o in &outcomes {
            if let DeclareOutcome::Blocked(h) = o {
                assert_eq!(*h, holder);
            }
        }
    }
}

#[test]
fn samples_racing_advance_are_counted_once() {
    // Start before registering so no baselines are required.
    let game = Arc::new(Game::in_memory());
    game.start_session().unwrap();
    for i in 0..3 {
        game.register(&format!("dev{i}")).unwrap();
    }
    game.advance_turn().unwrap();

    let barrier = Arc::new(Barrier::new(4));
    let submitters: Vec<_> = (0..3)
        .map(|i| {
            let game = game.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let id = format!("dev{i}");
                let mut accepted = 0;
                for _ in 0..200 {
                    if game.submit_sample(&id, 80, None).unwrap() == SubmitOutcome::Accepted {
                        accepted += 1;
                    }
                }
                accepted
            })
        })
        .collect();
    let advancer = {
        let game = game.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            (0..50)
                .map(|_| game.advance_turn().unwrap())
                .collect::<Vec<DeviceId>>()
        })
    };

    let accepted: usize = submitters.into_iter().map(|h| h.join().unwrap()).sum();
    let holders = advancer.join().unwrap();
    assert_eq!(holders.len(), 50);

    // Accepted and stored agree exactly.
    let stored: usize = (0..3)
        .map(|i| game.recent(&format!("dev{i}")).unwrap().len())
        .sum();
    assert_eq!(stored, accepted);
}
