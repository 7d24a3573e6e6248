use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use pulse_core::{
    DeviceId, GapFiller, InterpolationWindow, Sample, SampleStore, SessionState, interpolate,
};

// Irregular arrivals: mostly ~1 s apart with occasional multi-second dropouts.
fn synth_arrivals(n: usize, seed: u32) -> Vec<Sample> {
    let mut state = seed.max(1);
    let mut next_u32 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        x
    };
    let mut t = 0i64;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let r = next_u32();
        t += if r % 10 == 0 {
            3_000 + i64::from(r % 5_000)
        } else {
            600 + i64::from(r % 800)
        };
        let bpm = 70 + ((i as f64 / 40.0).sin() * 15.0) as i32;
        out.push(Sample::real(t, bpm));
    }
    out
}

fn configure(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p pulse_core --bench interpolation
    match std::env::var("BENCH_SAMPLE_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
    {
        Some(n) => g.sample_size(n.max(10)),
        None => g.sample_size(50),
    };
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }
}

pub fn bench_interpolate(c: &mut Criterion) {
    let mut g = c.benchmark_group("interpolate");
    configure(&mut g);

    let samples = synth_arrivals(5_000, 0xC0FFEE);
    let now = samples.last().map_or(0, |s| s.timestamp_ms) + 2_000;
    for &window_ms in &[30_000i64, 300_000, 3_000_000] {
        let w = InterpolationWindow {
            window_ms,
            ..InterpolationWindow::default()
        };
        g.bench_function(format!("window_{window_ms}ms"), |b| {
            b.iter(|| black_box(interpolate(black_box(&samples), now, w)))
        });
    }
    g.finish();
}

pub fn bench_gap_fill_tick(c: &mut Criterion) {
    let mut g = c.benchmark_group("gap_fill_tick");
    configure(&mut g);

    let mut session = SessionState::default();
    session.start();
    let mut store = SampleStore::default();
    for d in 0..16 {
        let id = DeviceId::new(format!("watch{d}"));
        for s in synth_arrivals(500, 0xBEEF + d) {
            let _ = store.append(&session, &id, s.bpm, s.timestamp_ms);
        }
    }
    let filler = GapFiller::new(1_000);
    let now = 10_000_000;

    g.bench_function("16_devices", |b| {
        b.iter_batched(
            || store.clone(),
            |mut st| black_box(filler.tick(&mut st, &session, now)),
            BatchSize::LargeInput,
        )
    });
    g.finish();
}

criterion_group!(interpolation, bench_interpolate, bench_gap_fill_tick);
criterion_main!(interpolation);
