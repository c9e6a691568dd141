//! Criterion benchmarks for whole splitting steps.

use cardion_bench::{reference_profile, single_partition, stress_profile};
use cardion_core::TimeInterval;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn bench_step(c: &mut Criterion, name: &str, config: &cardion_engine::SimulationConfig) {
    let mut orchestrator = single_partition(config).unwrap();
    let dt = config.time.pde_step;

    c.bench_function(name, |b| {
        b.iter(|| {
            let t = orchestrator.time();
            let summary = orchestrator
                .run(&TimeInterval::new(t, t + dt, dt).unwrap())
                .unwrap();
            black_box(&summary);
        });
    });
}

fn bench_step_reference(c: &mut Criterion) {
    bench_step(c, "step_364_nodes", &reference_profile());
}

fn bench_step_stress(c: &mut Criterion) {
    bench_step(c, "step_5151_nodes", &stress_profile());
}

fn bench_ten_steps_reference(c: &mut Criterion) {
    let config = reference_profile();
    c.bench_function("10_steps_364_nodes", |b| {
        b.iter(|| {
            let mut orchestrator = single_partition(&config).unwrap();
            let summary = orchestrator
                .run(&TimeInterval::new(0.0, 0.01, config.time.pde_step).unwrap())
                .unwrap();
            black_box(&summary);
        });
    });
}

criterion_group!(
    benches,
    bench_step_reference,
    bench_step_stress,
    bench_ten_steps_reference
);
criterion_main!(benches);
