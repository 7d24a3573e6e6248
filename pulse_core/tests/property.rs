use proptest::prelude::*;
use pulse_core::{
    DeclareOutcome, DeviceId, GapFiller, InterpolationWindow, Sample, SampleStore, SessionState,
    TurnArbitrator, interpolate,
};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
enum TurnOp {
    Declare(usize),
    Advance,
}

prop_compose! {
    fn registered_strategy()(n in 1usize..6) -> BTreeSet<DeviceId> {
        (0..n).map(|i| DeviceId::new(format!("dev{i}"))).collect()
    }
}

fn turn_ops() -> impl Strategy<Value = Vec<TurnOp>> {
    prop::collection::vec(
        prop_oneof![
            3 => (0usize..8).prop_map(TurnOp::Declare),
            1 => Just(TurnOp::Advance),
        ],
        1..60,
    )
}

#[derive(Debug, Clone)]
enum FeedOp {
    /// A device report stamped `jitter` ms away from the clock: late, out of
    /// order, or slightly ahead.
    Report { jitter: i64, bpm: i32 },
    Tick,
}

// Each op first advances the clock by the paired amount.
fn feed_ops() -> impl Strategy<Value = Vec<(i64, FeedOp)>> {
    prop::collection::vec(
        (
            0i64..1_500,
            prop_oneof![
                3 => (-2_500i64..=600, 40i32..200)
                    .prop_map(|(jitter, bpm)| FeedOp::Report { jitter, bpm }),
                2 => Just(FeedOp::Tick),
            ],
        ),
        1..80,
    )
}

prop_compose! {
    // Strictly increasing timestamps with irregular gaps.
    fn arrivals()(gaps in prop::collection::vec(1i64..4_000, 1..40), bpm in 40i32..200)
        -> Vec<Sample>
    {
        let mut t = 1_000;
        gaps.into_iter()
            .map(|g| {
                t += g;
                Sample::real(t, bpm)
            })
            .collect()
    }
}

proptest! {
    // At most one holder, and only a registered device ever becomes one.
    #[test]
    fn turn_holder_is_exclusive(registered in registered_strategy(), ops in turn_ops()) {
        let mut turns = TurnArbitrator::new();
        for op in ops {
            let before = turns.holder().cloned();
            match op {
                TurnOp::Declare(i) => {
                    let id = DeviceId::new(format!("dev{i}"));
                    match turns.declare(&id, &registered) {
                        Ok(DeclareOutcome::Granted) => {
                            prop_assert!(before.is_none());
                            prop_assert_eq!(turns.holder(), Some(&id));
                        }
                        Ok(DeclareOutcome::Released) => {
                            prop_assert_eq!(before.as_ref(), Some(&id));
                            prop_assert!(turns.holder().is_none());
                        }
                        Ok(DeclareOutcome::Blocked(h)) => {
                            prop_assert_eq!(before.as_ref(), Some(&h));
                            prop_assert_eq!(turns.holder(), Some(&h));
                        }
                        Err(_) => {
                            prop_assert!(!registered.contains(&id));
                            prop_assert_eq!(turns.holder().cloned(), before);
                        }
                    }
                }
                TurnOp::Advance => {
                    let next = turns.advance(&registered).unwrap();
                    prop_assert!(registered.contains(&next));
                }
            }
            if let Some(h) = turns.holder() {
                prop_assert!(registered.contains(h));
            }
        }
    }

    // N advances from any start visit every registered device exactly once.
    #[test]
    fn advance_cycles_through_everyone(registered in registered_strategy(), start in 0usize..6) {
        let ids: Vec<DeviceId> = registered.iter().cloned().collect();
        let start = ids.get(start % ids.len()).cloned();
        let mut turns = TurnArbitrator::with_holder(start.clone());
        let visited: Vec<DeviceId> = (0..ids.len())
            .map(|_| turns.advance(&registered).unwrap())
            .collect();
        let unique: BTreeSet<DeviceId> = visited.iter().cloned().collect();
        prop_assert_eq!(unique, registered.clone());
        prop_assert_eq!(turns.holder().cloned(), start);
    }

    // Each tick adds at most one synthetic sample per device, each exactly
    // one interval after the device's previous newest sample.
    #[test]
    fn gap_filler_never_outruns_one_interval(
        samples in arrivals(),
        ticks in prop::collection::vec(0i64..5_000, 1..30),
        interval in 200i64..3_000,
    ) {
        let mut session = SessionState::default();
        session.start();
        let id = DeviceId::from("w1");
        let mut store = SampleStore::default();
        for s in &samples {
            store.append(&session, &id, s.bpm, s.timestamp_ms).unwrap();
        }
        let filler = GapFiller::new(interval);
        let mut now = samples.last().map_or(0, |s| s.timestamp_ms);
        for step in ticks {
            now += step;
            let before = store.latest(&id).unwrap();
            let out = filler.tick(&mut store, &session, now);
            prop_assert!(out.len() <= 1);
            if let Some((_, s)) = out.first() {
                prop_assert!(s.synthetic);
                prop_assert_eq!(s.timestamp_ms, before.timestamp_ms + interval);
                prop_assert_eq!(s.bpm, before.bpm);
                prop_assert!(s.timestamp_ms <= now);
            }
        }
    }

    // Whatever order reports and ticks arrive in, the gap filler carries the
    // newest real reading and the display view stays inside its window.
    #[test]
    fn interleaved_reports_and_ticks_track_newest_reading(
        ops in feed_ops(),
        interval in 200i64..2_000,
    ) {
        let mut session = SessionState::default();
        session.start();
        let id = DeviceId::from("w1");
        let mut store = SampleStore::default();
        let filler = GapFiller::new(interval);
        let w = InterpolationWindow {
            window_ms: 10_000,
            interval_ms: interval,
            buffer_ms: 200,
        };
        let mut now = 100_000i64;
        let mut newest: Option<Sample> = None;
        for (advance, op) in ops {
            now += advance;
            match op {
                FeedOp::Report { jitter, bpm } => {
                    let ts = now + jitter;
                    store.append(&session, &id, bpm, ts).unwrap();
                    if newest.is_none_or(|n| ts >= n.timestamp_ms) {
                        newest = Some(Sample::real(ts, bpm));
                    }
                }
                FeedOp::Tick => {
                    filler.tick(&mut store, &session, now);
                }
            }
            if let Some(n) = newest {
                let cur = store.cursor(&id).unwrap();
                prop_assert_eq!(cur.last_bpm, n.bpm);
                prop_assert!(cur.last_timestamp_ms >= n.timestamp_ms);
                prop_assert_eq!(store.latest(&id).map(|s| s.bpm), Some(n.bpm));
            }
            let view = interpolate(&store.window(&id, now - w.window_ms), now, w);
            for s in &view {
                prop_assert!((now - w.window_ms..=now).contains(&s.timestamp_ms));
            }
        }
    }

    #[test]
    fn idle_session_is_never_filled(samples in arrivals(), later in 0i64..1_000_000) {
        let mut session = SessionState::default();
        session.start();
        let id = DeviceId::from("w1");
        let mut store = SampleStore::default();
        for s in &samples {
            store.append(&session, &id, s.bpm, s.timestamp_ms).unwrap();
        }
        session.stop();
        let len = store.len(&id);
        let now = samples.last().map_or(0, |s| s.timestamp_ms) + later;
        prop_assert!(GapFiller::new(1_000).tick(&mut store, &session, now).is_empty());
        prop_assert_eq!(store.len(&id), len);
    }

    // The display view keeps every real sample, stays sorted, and never
    // leaves a gap wider than one interval.
    #[test]
    fn interpolation_is_gapless_and_sorted(samples in arrivals()) {
        let now = samples.last().map_or(0, |s| s.timestamp_ms) + 2_500;
        let w = InterpolationWindow {
            window_ms: 1_000_000,
            interval_ms: 1_000,
            buffer_ms: 200,
        };
        let view = interpolate(&samples, now, w);
        prop_assert_eq!(view.iter().filter(|s| !s.synthetic).count(), samples.len());
        for pair in view.windows(2) {
            prop_assert!(pair[0].timestamp_ms < pair[1].timestamp_ms);
            prop_assert!(pair[1].timestamp_ms - pair[0].timestamp_ms <= w.interval_ms);
        }
    }
}
