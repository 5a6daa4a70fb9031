//! Slice-boundary correctness: multi-worker runs must match the
//! single-worker result.

use wisp_core::{Cell, SimulationConfig};
use wisp_physics::Automaton;

fn spike_grid(workers: usize, width: i32, height: i32, spike: (i32, i32)) -> Automaton {
    let mut automaton = Automaton::new(
        width,
        height,
        SimulationConfig::default(),
        Some(workers),
        1.0,
        1.0,
    )
    .unwrap();
    automaton
        .set_cell(
            spike.0,
            spike.1,
            Cell {
                air_pressure: 3.0,
                heat_energy: 2.0,
                fog: 1.0,
                flow: [0.0, 0.0],
            },
        )
        .unwrap();
    automaton
}

fn assert_grids_match(a: &Automaton, b: &Automaton, tolerance: f64) {
    for y in 0..a.height() {
        for x in 0..a.width() {
            let ca = a.cell_at(x, y);
            let cb = b.cell_at(x, y);
            assert!(
                (ca.air_pressure - cb.air_pressure).abs() < tolerance,
                "pressure diverged at ({x}, {y}): {} vs {}",
                ca.air_pressure,
                cb.air_pressure
            );
            assert!(
                (ca.heat_energy - cb.heat_energy).abs() < tolerance,
                "heat diverged at ({x}, {y}): {} vs {}",
                ca.heat_energy,
                cb.heat_energy
            );
            assert!(
                (ca.fog - cb.fog).abs() < tolerance,
                "fog diverged at ({x}, {y}): {} vs {}",
                ca.fog,
                cb.fog
            );
            for axis in 0..2 {
                assert!(
                    (ca.flow[axis] - cb.flow[axis]).abs() < tolerance,
                    "flow[{axis}] diverged at ({x}, {y})"
                );
            }
        }
    }
}

#[test]
fn two_workers_match_one_across_the_boundary() {
    // 4-row grid, two workers: the slice boundary sits between rows 1
    // and 2. A spike on the boundary row must diffuse identically to the
    // single-worker run.
    let mut single = spike_grid(1, 8, 4, (3, 1));
    let mut double = spike_grid(2, 8, 4, (3, 1));
    assert_eq!(double.worker_count(), 2);

    for _ in 0..100 {
        single.resume();
        single.wait_for();
        double.resume();
        double.wait_for();
    }

    assert_grids_match(&single, &double, 1e-12);
}

#[test]
fn single_row_slices_match() {
    // Four workers on four rows force the single-row slice path, where a
    // worker's top and bottom boundary are the same row.
    let mut single = spike_grid(1, 6, 4, (2, 2));
    let mut quad = spike_grid(4, 6, 4, (2, 2));
    assert_eq!(quad.worker_count(), 4);

    for _ in 0..60 {
        single.resume();
        single.wait_for();
        quad.resume();
        quad.wait_for();
    }

    assert_grids_match(&single, &quad, 1e-12);
}

#[test]
fn three_workers_match_on_uneven_slices() {
    // 8 rows over 3 workers: slices of 2, 2 and 4 rows.
    let mut single = spike_grid(1, 10, 8, (5, 3));
    let mut triple = spike_grid(3, 10, 8, (5, 3));
    assert_eq!(triple.worker_count(), 3);

    for _ in 0..80 {
        single.resume();
        single.wait_for();
        triple.resume();
        triple.wait_for();
    }

    assert_grids_match(&single, &triple, 1e-12);
}

#[test]
fn repeated_frames_with_interleaved_reads() {
    // Reading the front buffer while frames are in flight must observe
    // stable values from the previous frame.
    let mut automaton = spike_grid(2, 8, 8, (4, 4));
    for _ in 0..50 {
        let before = automaton.cell_at(4, 4).air_pressure;
        automaton.resume();
        // Front buffer is immutable while the frame computes.
        let during = automaton.cell_at(4, 4).air_pressure;
        assert_eq!(before, during);
        automaton.wait_for();
    }
}
