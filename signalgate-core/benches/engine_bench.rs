//! Criterion benchmarks for signalgate hot paths.
//!
//! Benchmarks:
//! 1. Per-bar pipeline (one confirmed bar through every stage)
//! 2. Full replay through the engine at several series lengths
//! 3. Reference feature builder
//! 4. Dynamic risk update

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use signalgate_core::config::EngineConfig;
use signalgate_core::domain::{Bar, Bias, EntryOrigin, FeatureSnapshot, ProbabilityEstimate, Side};
use signalgate_core::engine::{pipeline, EngineState, SignalEngine};
use signalgate_core::features::FeatureBuilder;
use signalgate_core::risk;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let t0 = Utc.with_ymd_and_hms(2020, 1, 2, 14, 30, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            let open = close - 0.3;
            Bar {
                index: i,
                timestamp: t0 + Duration::minutes(5 * i as i64),
                open,
                high: close + 1.5,
                low: open - 1.5,
                close,
                volume: 1_000_000.0,
                confirmed: true,
            }
        })
        .collect()
}

fn bullish() -> FeatureSnapshot {
    FeatureSnapshot {
        atr: Some(1.0),
        atr_percentile: Some(50.0),
        trend_strength: Some(30.0),
        choppiness: Some(40.0),
        trend_dir: Some(Bias::Bullish),
        momentum: Some(0.8),
        stack: Some(Bias::Bullish),
        osc_cross: Some(Bias::Bullish),
        structure_break: Some(Bias::Bullish),
        probability: ProbabilityEstimate::calibrated(0.66, 0.34),
        confidence: Some(0.7),
        ..Default::default()
    }
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_step(c: &mut Criterion) {
    let config = EngineConfig::default();
    let bar = &make_bars(1)[0];
    let features = bullish();
    let state = EngineState::default();
    c.bench_function("pipeline_step_flat_entry", |b| {
        b.iter(|| pipeline::step(black_box(&state), black_box(bar), black_box(&features), &config))
    });
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    for n in [1_000usize, 10_000] {
        let bars = make_bars(n);
        let features = FeatureBuilder::default().build(&bars);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut engine = SignalEngine::new(EngineConfig::default()).unwrap();
                let mut count = 0usize;
                for (bar, f) in bars.iter().zip(&features) {
                    count += engine.on_bar(bar, f).events.len();
                }
                black_box(count)
            })
        });
    }
    group.finish();
}

fn bench_features(c: &mut Criterion) {
    let bars = make_bars(5_000);
    let builder = FeatureBuilder::default();
    c.bench_function("feature_builder_5000", |b| {
        b.iter(|| builder.build(black_box(&bars)))
    });
}

fn bench_risk_update(c: &mut Criterion) {
    let config = EngineConfig::default().risk;
    let bars = make_bars(200);
    let features = bullish();
    let pos = risk::open_position(Side::Long, EntryOrigin::Score, &bars[0], &features, &config);
    c.bench_function("risk_update_200_bars", |b| {
        b.iter(|| {
            let mut p = pos.clone();
            for bar in &bars[1..] {
                p = risk::update(&p, bar, &features, &config);
            }
            black_box(p)
        })
    });
}

criterion_group!(benches, bench_step, bench_replay, bench_features, bench_risk_update);
criterion_main!(benches);
