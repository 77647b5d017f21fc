use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sim_core::{EducationLevel, HealthFacility, SimConfig, ZoneSize, ZoneUse};
use sim_runtime::Simulation;

fn seeded_city() -> Simulation {
    let cfg = SimConfig {
        initial_funds: 1_000_000,
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(cfg).unwrap();
    sim.build_zoning(ZoneUse::Residential, 40, ZoneSize::Small).unwrap();
    sim.build_zoning(ZoneUse::Residential, 20, ZoneSize::Large).unwrap();
    sim.build_zoning(ZoneUse::Commercial, 30, ZoneSize::Medium).unwrap();
    sim.build_civic(EducationLevel::Elementary, 2).unwrap();
    sim.build_civic(HealthFacility::Clinic, 3).unwrap();
    sim
}

fn bench_week(c: &mut Criterion) {
    let mut sim = seeded_city();
    c.bench_function("sim_week", |b| {
        b.iter(|| {
            sim.run_days(7);
            black_box(sim.funds())
        })
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let mut sim = seeded_city();
    sim.run_days(28);
    c.bench_function("city_snapshot", |b| b.iter(|| black_box(sim.snapshot())));
}

criterion_group!(benches, bench_week, bench_snapshot);
criterion_main!(benches);
