//! Property-based tests for the population store's conservation laws.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use yaimc::{Dungeon, ParticleRecord};

fn filled_store(weights: &[f64], spread: f64) -> Dungeon {
    let mut store = Dungeon::new(weights.len().max(1) * 2).unwrap();
    for (i, &w) in weights.iter().enumerate() {
        let x = spread * (i as f64 / weights.len().max(1) as f64);
        store
            .detain(ParticleRecord::new([x, 0.0, 0.0], [0.0, 0.0, 1.0], w, 0, 0))
            .unwrap();
    }
    store
}

proptest! {
    /// norm_weight hits any positive target exactly, from any positive
    /// starting weights.
    #[test]
    fn norm_weight_is_exact(
        weights in prop::collection::vec(0.01f64..100.0, 1..60),
        target in 0.001f64..1e6,
    ) {
        let mut store = filled_store(&weights, 1.0);
        store.norm_weight(target).unwrap();
        prop_assert!((store.total_weight() - target).abs() < 1e-9 * target);
    }

    /// norm_size lands on the requested population for every valid target,
    /// and never fabricates weights.
    #[test]
    fn norm_size_hits_target(
        weights in prop::collection::vec(0.01f64..100.0, 1..60),
        n in 1usize..100,
        seed in 0u64..1000,
    ) {
        let mut store = filled_store(&weights, 1.0);
        prop_assume!(n <= store.capacity());
        let original: Vec<f64> = store.live().iter().map(|r| r.weight).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        store.norm_size(n, &mut rng).unwrap();
        prop_assert_eq!(store.len(), n);
        for r in store.live() {
            prop_assert!(original.contains(&r.weight));
        }
    }

    /// reduce_size conserves total weight whenever the population is dense
    /// enough to merge.
    #[test]
    fn reduce_size_conserves_weight(
        weights in prop::collection::vec(0.01f64..10.0, 4..50),
        seed in 0u64..1000,
    ) {
        // Spread 0.05 keeps every pair within the default merge radius.
        let mut store = filled_store(&weights, 0.05);
        let before = store.total_weight();
        let target = weights.len() / 2;
        prop_assume!(target >= 1);
        let mut rng = StdRng::seed_from_u64(seed);
        store.reduce_size(target, &mut rng).unwrap();
        prop_assert_eq!(store.len(), target);
        prop_assert!((store.total_weight() - before).abs() < 1e-9 * before);
    }

    /// combine is a local conservation law: weights add, positions average
    /// by weight, population drops by one.
    #[test]
    fn combine_conserves_weight_and_centroid(
        w1 in 0.01f64..50.0,
        w2 in 0.01f64..50.0,
        x1 in -10.0f64..10.0,
        x2 in -10.0f64..10.0,
    ) {
        let mut store = Dungeon::new(4).unwrap();
        store.detain(ParticleRecord::new([x1, 0.0, 0.0], [0.0, 0.0, 1.0], w1, 0, 0)).unwrap();
        store.detain(ParticleRecord::new([x2, 0.0, 0.0], [0.0, 0.0, 1.0], w2, 0, 0)).unwrap();
        store.combine(0, 1).unwrap();
        prop_assert_eq!(store.len(), 1);
        let merged = store.get(0).unwrap();
        prop_assert!((merged.weight - (w1 + w2)).abs() < 1e-12);
        let centroid = (x1 * w1 + x2 * w2) / (w1 + w2);
        prop_assert!((merged.position[0] - centroid).abs() < 1e-9);
    }

    /// Per-region capping conserves weight and honors the cap for every
    /// region map.
    #[test]
    fn region_cap_holds_everywhere(
        counts in prop::collection::vec(1usize..20, 1..5),
        cap in 1usize..10,
    ) {
        let total: usize = counts.iter().sum();
        let mut store = Dungeon::new(total.max(1) * 2).unwrap();
        for (region, &count) in counts.iter().enumerate() {
            for i in 0..count {
                let x = region as f64 * 100.0 + 0.001 * i as f64;
                store
                    .detain(ParticleRecord::new([x, 0.0, 0.0], [0.0, 0.0, 1.0], 1.0, 0, region))
                    .unwrap();
            }
        }
        let before = store.total_weight();
        store.reduce_size_by_region(cap, |r| r.mat_index).unwrap();
        let mut observed = vec![0usize; counts.len()];
        for r in store.live() {
            observed[r.mat_index] += 1;
        }
        for &n in &observed {
            prop_assert!(n <= cap);
        }
        prop_assert!((store.total_weight() - before).abs() < 1e-9 * before);
    }
}
