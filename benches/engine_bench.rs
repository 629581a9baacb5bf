//! Benchmarks for the replay engine and the optimizers.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ballast::backtest::{BacktestConfiguration, BacktestEngine};
use ballast::cvar::{CvarOptimizer, CvarVariant};
use ballast::series::{ReturnSeries, ReturnSeriesStore};
use ballast::strategy::{Strategy, StrategyContext};
use ballast::types::{Direction, OptimizationConstraints, Signal};
use ballast::HrpOptimizer;

struct EqualLong;

impl Strategy for EqualLong {
    fn name(&self) -> &str {
        "equal-long"
    }

    fn on_rebalance(&mut self, ctx: &StrategyContext) -> Vec<Signal> {
        ctx.instruments
            .iter()
            .map(|i| Signal::new(i.clone(), Direction::Long, 0.6))
            .collect()
    }
}

fn seeded_store(instruments: usize, periods: usize) -> (ReturnSeriesStore, Vec<String>) {
    let mut store = ReturnSeriesStore::new();
    let mut names = Vec::with_capacity(instruments);
    for k in 0..instruments {
        let name = format!("I{:02}", k);
        let timestamps: Vec<_> = (0..periods)
            .map(|i| {
                Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap() + Duration::days(i as i64)
            })
            .collect();
        let values: Vec<f64> = (0..periods)
            .map(|i| 0.0005 + 0.015 * (((i * 13 + k * 7) % 19) as f64 / 19.0 - 0.5))
            .collect();
        store.insert(ReturnSeries::from_values(&name, &timestamps, &values).unwrap());
        names.push(name);
    }
    (store, names)
}

fn bench_replay(c: &mut Criterion) {
    let (store, names) = seeded_store(8, 504);
    c.bench_function("replay_8x504", |b| {
        b.iter(|| {
            let engine = BacktestEngine::new(BacktestConfiguration::default());
            let result = engine.run(&mut EqualLong, &store, &names).unwrap();
            black_box(result.final_equity);
        })
    });
}

fn bench_hrp(c: &mut Criterion) {
    let (store, names) = seeded_store(16, 252);
    let aligned = store.aligned(&names, 252).unwrap();
    c.bench_function("hrp_16x252", |b| {
        b.iter(|| {
            let hrp = HrpOptimizer::new();
            let allocation = hrp
                .allocate_from_rows(&aligned.instruments, &aligned.rows)
                .unwrap();
            black_box(allocation.weights);
        })
    });
}

fn bench_cvar(c: &mut Criterion) {
    let (store, names) = seeded_store(8, 126);
    let aligned = store.aligned(&names, 126).unwrap();
    let scenarios = aligned.scenarios();
    c.bench_function("cvar_8x126", |b| {
        b.iter(|| {
            let optimizer = CvarOptimizer::default();
            let solution = optimizer
                .optimize(
                    &names,
                    &scenarios,
                    &OptimizationConstraints::default(),
                    &CvarVariant::MinCvar,
                )
                .unwrap();
            black_box(solution.weights);
        })
    });
}

criterion_group!(benches, bench_replay, bench_hrp, bench_cvar);
criterion_main!(benches);
