use proptest::prelude::*;
use spikemerge::sort::{
    Bisect, BisectParams, InitialPartition, InterfaceEnergy, MergeEngine, MergeState, Partition, Session,
};

fn features_strategy() -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 2), 8..48)
}

fn partition(features: &[Vec<f32>]) -> Partition {
    Bisect::new(BisectParams {
        max_bisections: 3,
        max_passes: 10,
        min_cluster_size: 2,
    })
    .partition(features)
    .unwrap()
}

fn initial_state(features: &[Vec<f32>], part: &Partition) -> MergeState {
    let energy = InterfaceEnergy::compute(features, part).unwrap();
    MergeState::new(energy, part.sizes.clone(), part.assignment.clone()).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || (a - b).abs() <= 1e-9 * (1.0 + a.abs().max(b.abs()))
}

proptest! {
    #[test]
    fn prop_sizes_conserved_and_count_drops_by_one(
        features in features_strategy(),
        picks in prop::collection::vec((0usize..64, 0usize..64), 0..8),
    ) {
        let part = partition(&features);
        let mut state = initial_state(&features, &part);
        let total = state.total_live_size();
        prop_assert_eq!(total, features.len());

        for (a, b) in picks {
            let live = state.live_clusters();
            if live.len() < 2 {
                break;
            }
            let x = live[a % live.len()];
            let y = live[b % live.len()];
            if x == y {
                continue;
            }
            let before = state.live_count();
            state.merge(x, y).unwrap();
            prop_assert_eq!(state.live_count(), before - 1);
            prop_assert_eq!(state.total_live_size(), total);
        }
    }

    #[test]
    fn prop_incremental_energy_matches_recompute(
        features in features_strategy(),
        picks in prop::collection::vec((0usize..64, 0usize..64), 1..8),
    ) {
        let part = partition(&features);
        let mut state = initial_state(&features, &part);

        for (a, b) in picks {
            let live = state.live_clusters();
            if live.len() < 2 {
                break;
            }
            let x = live[a % live.len()];
            let y = live[(a + 1 + b % (live.len() - 1)) % live.len()];
            state.merge(x, y).unwrap();
        }

        let fresh = state.recompute_energy(&features, part.kernel_scale).unwrap();
        for i in 0..state.n_clusters() {
            for j in i..state.n_clusters() {
                let inc = state.energy().get(i, j);
                let full = fresh.get(i, j);
                prop_assert!(close(inc, full), "E({}, {}): incremental {} vs recomputed {}", i, j, inc, full);
            }
        }
    }

    #[test]
    fn prop_engine_terminates_within_c0_minus_one(
        features in features_strategy(),
        cutoff in 0.0f64..1.0,
    ) {
        let part = partition(&features);
        let mut state = initial_state(&features, &part);
        let c0 = state.n_clusters();
        let merges = MergeEngine::new(cutoff).run(&mut state).unwrap();
        prop_assert!(merges <= c0 - 1);
        prop_assert_eq!(state.history().len(), merges);
        prop_assert!(MergeEngine::new(cutoff).step(&mut state).unwrap().is_none());
    }

    #[test]
    fn prop_strengths_are_finite_with_unit_diagonal(features in features_strategy()) {
        let part = partition(&features);
        let state = initial_state(&features, &part);
        let j = state.strength();
        for i in 0..state.n_clusters() {
            prop_assert_eq!(j.get(i, i), 1.0);
            for k in 0..state.n_clusters() {
                prop_assert!(j.get(i, k).is_finite());
            }
        }
    }

    #[test]
    fn prop_set_cutoff_is_a_pure_replay(
        features in features_strategy(),
        cutoff in 0.0f64..1.0,
        detour in 0.0f64..1.0,
    ) {
        let part = partition(&features);
        let initial = initial_state(&features, &part);
        let waveforms = features.clone();
        let mut session = Session::new(initial.clone(), initial, 1.0, waveforms).unwrap();

        session.set_cutoff(cutoff).unwrap();
        let first = session.finalize().unwrap();

        session.set_cutoff(detour).unwrap();
        let live = session.state().live_clusters();
        if let Some(&c) = live.first() {
            session.reject(c).unwrap();
        }
        session.set_cutoff(cutoff).unwrap();
        let second = session.finalize().unwrap();

        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_finalize_id_map_is_sound(
        features in features_strategy(),
        cutoff in 0.0f64..1.0,
        reject in prop::option::of(0usize..64),
    ) {
        let part = partition(&features);
        let initial = initial_state(&features, &part);
        let mut session = Session::new(initial.clone(), initial, 1.0, features.clone()).unwrap();
        session.set_cutoff(cutoff).unwrap();
        let rejected = reject.map(|r| {
            let live = session.state().live_clusters();
            live[r % live.len()]
        });
        if let Some(r) = rejected {
            session.reject(r).unwrap();
        }
        let f = session.finalize().unwrap();
        let state = session.state();

        // Survivors map bijectively onto 1..=K.
        let mut units: Vec<usize> = state.live_clusters().iter().map(|&c| f.id_map[c]).collect();
        units.sort_unstable();
        prop_assert_eq!(units, (1..=f.units).collect::<Vec<_>>());
        prop_assert!(f.rms.windows(2).all(|w| w[0] <= w[1]));

        // Merged-away ids follow their survivor.
        for rec in state.history() {
            prop_assert_eq!(f.id_map[rec.absorbed], f.id_map[rec.survivor]);
        }
        if let Some(r) = rejected {
            prop_assert_eq!(f.id_map[r], 0);
        }
        for (spike, &label) in f.labels.iter().enumerate() {
            prop_assert_eq!(label, f.id_map[part.assignment[spike]]);
        }
    }
}
