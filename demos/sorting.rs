//! Sort three synthetic units on two electrodes, then adjust one by hand.

use spikemerge::sort::{sort_electrodes, BisectParams, Command, CutoffParams, ElectrodeData, SortConfig};

fn unit(center: [f32; 3], amplitude: f32, n: usize, phase: usize) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
    let mut features = Vec::with_capacity(n);
    let mut waveforms = Vec::with_capacity(n);
    for i in 0..n {
        let jitter = |k: usize| (((i + phase) * (7 + 4 * k)) % 17) as f32 / 17.0 - 0.5;
        features.push(center.iter().enumerate().map(|(k, &c)| c + jitter(k)).collect());
        waveforms.push(
            (0..32)
                .map(|t| amplitude * (-((t as f32 - 10.0) / 3.0).powi(2)).exp() + 0.05 * jitter(t % 3))
                .collect(),
        );
    }
    (features, waveforms)
}

fn electrode(id: u32, units: &[([f32; 3], f32, usize)]) -> ElectrodeData {
    let mut features = Vec::new();
    let mut waveforms = Vec::new();
    for (k, &(center, amplitude, n)) in units.iter().enumerate() {
        let (f, w) = unit(center, amplitude, n, k * 5);
        features.extend(f);
        waveforms.extend(w);
    }
    ElectrodeData {
        electrode: id,
        features,
        waveforms,
        kernel_scale: None,
    }
}

fn main() {
    let electrodes = vec![
        electrode(1, &[([0.0, 0.0, 0.0], 40.0, 120), ([12.0, 0.0, 4.0], 90.0, 80)]),
        electrode(2, &[([0.0, 6.0, 0.0], 60.0, 150)]),
    ];

    let config = SortConfig::default()
        .with_bisect(BisectParams {
            max_bisections: 4,
            max_passes: 10,
            min_cluster_size: 10,
        })
        .with_cutoff(CutoffParams::default().with_seed(42));

    let outcomes = sort_electrodes(&electrodes, &config).unwrap();
    for (outcome, data) in outcomes.into_iter().zip(&electrodes) {
        let sorted = match outcome.result {
            Ok(sorted) => sorted,
            Err(err) => {
                println!("electrode {}: failed ({err})", outcome.electrode);
                continue;
            }
        };
        println!(
            "electrode {}: {} initial clusters -> {} after {} merges (cutoff {:.3}, {:?})",
            sorted.electrode,
            sorted.initial.n_clusters(),
            sorted.automated.live_count(),
            sorted.history().len(),
            sorted.cutoff.value,
            sorted.cutoff.source,
        );

        let mut session = sorted.into_session(data.waveforms.clone()).unwrap();
        let live = session.state().live_clusters();
        if live.len() > 2 {
            // Fold the two lowest ids together by hand.
            session.apply(Command::Merge(live[0], live[1])).unwrap();
        }
        let finalized = session.finalize().unwrap();
        println!("  final units: {}, rms per unit: {:?}", finalized.units, finalized.rms);
        println!("  id map: {:?}", finalized.id_map);
    }
}
