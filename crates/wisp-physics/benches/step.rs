//! Frame throughput of the automaton at different worker counts.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use wisp_core::{Cell, SimulationConfig};
use wisp_physics::Automaton;

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("automaton_step");
    for workers in [1usize, 2, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &workers,
            |b, &workers| {
                let mut automaton = Automaton::new(
                    250,
                    250,
                    SimulationConfig::default(),
                    Some(workers),
                    1.0,
                    1.0,
                )
                .unwrap();
                automaton
                    .set_cell(
                        125,
                        125,
                        Cell {
                            air_pressure: 5.0,
                            heat_energy: 5.0,
                            fog: 2.0,
                            flow: [0.0, 0.0],
                        },
                    )
                    .unwrap();
                b.iter(|| {
                    automaton.resume();
                    automaton.wait_for();
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
