use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::prelude::*;
use spikemerge::sort::{
    sort_electrode, Bisect, BisectParams, CutoffParams, ElectrodeData, InitialPartition, InterfaceEnergy,
    SortConfig,
};

fn synthetic(n: usize, d: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let offset = if i % 3 == 0 { 8.0 } else { 0.0 };
            (0..d).map(|_| offset + rng.random::<f32>()).collect()
        })
        .collect()
}

fn bench_sorting(c: &mut Criterion) {
    let mut group = c.benchmark_group("sorting");

    let features = synthetic(1000, 8, 42);
    let params = BisectParams {
        max_bisections: 5,
        max_passes: 10,
        min_cluster_size: 10,
    };
    let partition = Bisect::new(params.clone()).partition(&features).unwrap();

    group.bench_function("interface_energy_n1000_d8", |b| {
        b.iter(|| InterfaceEnergy::compute(black_box(&features), black_box(&partition)).unwrap())
    });

    let data = ElectrodeData {
        electrode: 1,
        waveforms: features.clone(),
        features,
        kernel_scale: None,
    };
    let config = SortConfig::default()
        .with_bisect(params)
        .with_cutoff(CutoffParams::default().with_seed(42).with_nboot(200));

    group.bench_function("sort_electrode_n1000_d8", |b| {
        b.iter(|| sort_electrode(black_box(&data), &config).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_sorting);
criterion_main!(benches);
