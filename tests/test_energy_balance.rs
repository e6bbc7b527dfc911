// Integration tests for the source/material energy balance: the IMC
// coupling must neither create nor destroy energy outside of physical
// emission and absorption.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use yaimc::{
    Brick, BrickGeometry, CouplingMode, Dungeon, EmissionSource, MaterialConfig, MaterialRegistry,
    ScatterLaw, RADIATION_CONST,
};

fn material(temperature: f64, volume: f64) -> MaterialConfig {
    MaterialConfig {
        number_of_groups: 1,
        capture: vec![1.0],
        scatter: vec![0.0],
        cv: vec![1.0],
        alpha: 1.0,
        temperature,
        volume,
        coupling: CouplingMode::Standard,
        scatter_law: ScatterLaw::P0,
        name: None,
    }
}

#[test]
fn test_append_imc_sum_matches_emission_for_any_count() {
    // Single material filling the whole bounding box: no sample can miss,
    // and the renormalized total must equal the emission exactly.
    let geometry = Arc::new(BrickGeometry::single([0.0; 3], [2.0; 3], 0).unwrap());
    let source = EmissionSource::new(Arc::clone(&geometry), 1000).unwrap();
    let mut registry = MaterialRegistry::from_configs(&[material(300.0, 8.0)]).unwrap();
    registry.set_time_step(1.0).unwrap();
    let emitted = registry.get(0).unwrap().emitted_radiation();

    for n in [1usize, 13, 100, 997] {
        let mut store = Dungeon::new(1024).unwrap();
        let mut rng = StdRng::seed_from_u64(n as u64);
        source
            .append_imc(&mut store, &registry, n, &mut rng)
            .unwrap();
        assert_eq!(store.len(), n);
        let total = store.total_weight();
        assert!(
            (total - emitted).abs() < 1e-9 * emitted,
            "n = {}: sampled {} vs emitted {}",
            n,
            total,
            emitted
        );
    }
}

#[test]
fn test_append_imc_balances_every_region() {
    // Two slabs at very different temperatures: the hot one dominates the
    // raw weights, but per-region renormalization keeps both exact.
    let geometry = Arc::new(
        BrickGeometry::new(vec![
            Brick::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0], 0, 1),
            Brick::new([1.0, 0.0, 0.0], [2.0, 1.0, 1.0], 1, 2),
        ])
        .unwrap(),
    );
    let source = EmissionSource::new(Arc::clone(&geometry), 1000).unwrap();
    let mut registry =
        MaterialRegistry::from_configs(&[material(100.0, 1.0), material(500.0, 1.0)]).unwrap();
    registry.set_time_step(0.25).unwrap();

    let mut store = Dungeon::new(4096).unwrap();
    let mut rng = StdRng::seed_from_u64(1234);
    source
        .append_imc(&mut store, &registry, 1000, &mut rng)
        .unwrap();

    for index in 0..2 {
        let emitted = registry.get(index).unwrap().emitted_radiation();
        let sampled: f64 = store
            .live()
            .iter()
            .filter(|r| r.mat_index == index)
            .map(|r| r.weight)
            .sum();
        assert!(
            (sampled - emitted).abs() < 1e-9 * emitted,
            "material {}: sampled {} vs emitted {}",
            index,
            sampled,
            emitted
        );
    }
}

#[test]
fn test_steady_state_material_update() {
    // T = 300, cv = 1, sigma_p = 1, V = 1, dt = 1, alpha = 1: feeding the
    // emitted energy straight back leaves the material exactly where it
    // started.
    let mut registry = MaterialRegistry::from_configs(&[material(300.0, 1.0)]).unwrap();
    registry.set_time_step(1.0).unwrap();

    let mat = registry.get(0).unwrap();
    let u_r = RADIATION_CONST * 300f64.powi(4);
    assert!((u_r - 0.01372 * 8.1e9).abs() < 1e-3 * u_r);
    let emitted = mat.emitted_radiation();
    let energy_before = mat.mat_energy();

    registry.update_all(&[emitted]).unwrap();

    let mat = registry.get(0).unwrap();
    assert!((mat.mat_energy() - energy_before).abs() < 1e-9 * energy_before.abs());
    assert!((mat.temperature() - 300.0).abs() < 1e-7);
}

#[test]
fn test_cooling_and_heating_move_temperature_the_right_way() {
    let mut registry = MaterialRegistry::from_configs(&[material(300.0, 1.0)]).unwrap();
    registry.set_time_step(1.0).unwrap();
    let emitted = registry.get(0).unwrap().emitted_radiation();

    // Absorbing less than emitted cools the material.
    registry.update_all(&[0.5 * emitted]).unwrap();
    let cooled = registry.get(0).unwrap().temperature();
    assert!(cooled < 300.0);

    // Absorbing much more than emitted heats it back past the start.
    let emitted2 = registry.get(0).unwrap().emitted_radiation();
    registry
        .update_all(&[emitted2 + (300.0 - cooled) + 5.0])
        .unwrap();
    assert!(registry.get(0).unwrap().temperature() > 300.0);
}
