//! Benchmarks for the per-tick signal path

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal_macros::dec;
use scalp_hub::scalp::realized_pnl;
use scalp_hub::signal::{
    Direction, MarketSnapshot, RandomSignalEngine, SignalEngine, SignalFilter,
};

fn snapshot() -> MarketSnapshot {
    MarketSnapshot {
        symbol: "BTCUSDT".to_string(),
        price: dec!(43250),
        timestamp: Utc::now(),
    }
}

fn benchmark_signal_evaluation(c: &mut Criterion) {
    let engine = RandomSignalEngine::seeded(42, dec!(85));
    let snapshot = snapshot();

    c.bench_function("random_signal_evaluate", |b| {
        b.iter(|| engine.evaluate(black_box(&snapshot)))
    });
}

fn benchmark_evaluate_and_gate(c: &mut Criterion) {
    let engine = RandomSignalEngine::seeded(42, dec!(85));
    let filter = SignalFilter::new(dec!(90));
    let snapshot = snapshot();

    c.bench_function("signal_evaluate_and_gate", |b| {
        b.iter(|| {
            engine
                .evaluate(black_box(&snapshot))
                .map(|signal| filter.apply(&signal))
        })
    });
}

fn benchmark_realized_pnl(c: &mut Criterion) {
    c.bench_function("realized_pnl", |b| {
        b.iter(|| {
            realized_pnl(
                black_box(Direction::Short),
                black_box(dec!(43250)),
                black_box(dec!(43187.5)),
                black_box(dec!(100)),
            )
        })
    });
}

criterion_group!(
    benches,
    benchmark_signal_evaluation,
    benchmark_evaluate_and_gate,
    benchmark_realized_pnl
);
criterion_main!(benches);
