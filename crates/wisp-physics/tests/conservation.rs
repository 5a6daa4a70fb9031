//! Closed-grid conservation and relaxation behaviour of the automaton.

use wisp_core::{Cell, SimulationConfig};
use wisp_physics::Automaton;

fn step(automaton: &mut Automaton, frames: usize) {
    for _ in 0..frames {
        automaton.resume();
        automaton.wait_for();
    }
}

#[test]
fn uniform_grid_stays_uniform() {
    // 10x10, uniform pressure and temperature, no obstacles: after 1000
    // frames every cell is still exactly uniform to within 1e-9.
    let mut automaton = Automaton::new(
        10,
        10,
        SimulationConfig::default(),
        Some(2),
        1.0,
        1.0,
    )
    .unwrap();

    step(&mut automaton, 1000);

    for y in 0..10 {
        for x in 0..10 {
            let cell = automaton.cell_at(x, y);
            assert!(
                (cell.air_pressure - 1.0).abs() < 1e-9,
                "pressure drifted at ({x}, {y}): {}",
                cell.air_pressure
            );
            assert!(
                (cell.heat_energy - 1.0).abs() < 1e-9,
                "heat drifted at ({x}, {y}): {}",
                cell.heat_energy
            );
        }
    }
}

#[test]
fn pressure_spike_decays_monotonically() {
    // 10x10 with a 2.0 spike at the corner, friction 0.1, damping 0.5:
    // the spike relaxes monotonically and total pressure is conserved.
    let sim = SimulationConfig {
        flow_friction: 0.1,
        flow_damping: 0.5,
        convection_friction: 0.0,
        heat_flow_friction: 0.0,
        fog_flow_friction: 0.0,
    };
    let mut automaton = Automaton::new(10, 10, sim, Some(1), 1.0, 0.0).unwrap();
    automaton
        .set_cell(
            0,
            0,
            Cell {
                air_pressure: 2.0,
                heat_energy: 0.0,
                fog: 0.0,
                flow: [0.0, 0.0],
            },
        )
        .unwrap();

    let total_before = automaton.totals().air_pressure;
    let mut previous = automaton.cell_at(0, 0).air_pressure;

    for frame in 0..500 {
        step(&mut automaton, 1);
        let current = automaton.cell_at(0, 0).air_pressure;
        assert!(
            current <= previous + 1e-9,
            "pressure rose at frame {frame}: {previous} -> {current}"
        );
        previous = current;
    }

    assert!(
        previous < 1.1,
        "spike failed to relax within 500 frames: {previous}"
    );
    let total_after = automaton.totals().air_pressure;
    assert!(
        (total_before - total_after).abs() < 1e-9,
        "pressure not conserved: {total_before} -> {total_after}"
    );
}

#[test]
fn heat_and_fog_survive_transport() {
    // A hot, foggy corner spreads out; heat and fog totals are conserved
    // on a closed grid.
    let mut automaton = Automaton::new(
        12,
        12,
        SimulationConfig::default(),
        Some(3),
        1.0,
        1.0,
    )
    .unwrap();
    automaton
        .set_cell(
            5,
            5,
            Cell {
                air_pressure: 2.0,
                heat_energy: 6.0,
                fog: 3.0,
                flow: [0.0, 0.0],
            },
        )
        .unwrap();

    let before = automaton.totals();
    step(&mut automaton, 200);
    let after = automaton.totals();

    assert!((before.air_pressure - after.air_pressure).abs() < 1e-9);
    assert!((before.heat_energy - after.heat_energy).abs() < 1e-9);
    assert!((before.fog - after.fog).abs() < 1e-9);
    // The spike actually spread.
    assert!(automaton.cell_at(5, 5).fog < 3.0);
    assert!(automaton.cell_at(6, 5).fog > 0.0);
}

#[test]
fn bad_flow_is_sanitized_on_activation() {
    let mut automaton = Automaton::new(
        6,
        6,
        SimulationConfig::default(),
        Some(1),
        1.0,
        1.0,
    )
    .unwrap();
    automaton
        .set_cell(
            2,
            2,
            Cell {
                air_pressure: 1.0,
                heat_energy: 1.0,
                fog: 0.0,
                flow: [f64::NAN, f64::INFINITY],
            },
        )
        .unwrap();

    step(&mut automaton, 1);

    let cell = automaton.cell_at(2, 2);
    assert!(cell.flow[0].is_finite());
    assert!(cell.flow[1].is_finite());
    assert!(cell.air_pressure.is_finite());
}

mod proptests {
    use super::*;
    use proptest::prelude::*;
    use wisp_core::{CellStamp, ObjectId, Stamp};

    fn arb_cell() -> impl Strategy<Value = Cell> {
        (0.0f64..10.0, 0.0f64..10.0, 0.0f64..5.0).prop_map(|(pressure, heat, fog)| Cell {
            air_pressure: pressure,
            heat_energy: heat,
            fog,
            flow: [0.0, 0.0],
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn one_step_conserves_totals(
            cells in prop::collection::vec(arb_cell(), 36),
            workers in 1usize..4,
        ) {
            let mut automaton = Automaton::new(
                6,
                6,
                SimulationConfig::default(),
                Some(workers),
                0.0,
                0.0,
            )
            .unwrap();
            for (i, cell) in cells.iter().enumerate() {
                automaton.set_cell((i % 6) as i32, (i / 6) as i32, *cell).unwrap();
            }
            let before = automaton.totals();
            automaton.resume();
            automaton.wait_for();
            let after = automaton.totals();

            prop_assert!((before.air_pressure - after.air_pressure).abs() < 1e-6);
            prop_assert!((before.heat_energy - after.heat_energy).abs() < 1e-6);
            prop_assert!((before.fog - after.fog).abs() < 1e-6);
        }

        #[test]
        fn conduction_through_obstacles_conserves_heat(
            temperature in 0.5f64..5.0,
            workers in 1usize..3,
        ) {
            let mut automaton = Automaton::new(
                15,
                15,
                SimulationConfig::default(),
                Some(workers),
                1.0,
                1.0,
            )
            .unwrap();
            let stamp = Stamp::new(CellStamp::full());
            automaton
                .place_object(wisp_core::Coord::new(5, 5), &stamp, ObjectId(1), 1.0, temperature)
                .unwrap();
            let before = automaton.totals();
            for _ in 0..20 {
                automaton.resume();
                automaton.wait_for();
            }
            let after = automaton.totals();
            prop_assert!((before.heat_energy - after.heat_energy).abs() < 1e-6,
                "heat not conserved: {} -> {}", before.heat_energy, after.heat_energy);
        }
    }
}
