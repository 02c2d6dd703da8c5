//! Spike sorting by interface energy.
//!
//! The pipeline for one electrode, leaf to root:
//!
//! 1. **Initial clustering** ([`Bisect`]): recursive two-centroid bisection
//!    deliberately over-segments feature space.
//! 2. **Interface energy** ([`InterfaceEnergy`]): kernel-summed proximity
//!    between every pair of initial clusters.
//! 3. **Connection strength** ([`ConnectionStrength`]): energy normalized by
//!    each cluster's own cohesion.
//! 4. **Cutoff** ([`CutoffEstimator`]): an explicit threshold, or the upper BCa
//!    bootstrap bound on a high percentile of the strengths.
//! 5. **Merging** ([`MergeEngine`]): greedily fold the strongest pair together
//!    while it stays above the cutoff, updating the matrices incrementally.
//!
//! A [`Session`] then lets a human replay, redirect or finalize the result.
//!
//! ## Connection strength
//!
//! With `n_i` spikes per cluster and `E` the interface energy,
//!
//! ```text
//! En(i, j) = E(i, j) / (n_i n_j)            i != j
//! En(i, i) = E(i, i) / ((n_i² - n_i) / 2)
//! J(i, j)  = 2 En(i, j) / (En(i, i) + En(j, j))
//! ```
//!
//! `J` close to 1 means two clusters touch as densely as they hang together
//! internally, which is what over-segmented pieces of one neuron look like.
//!
//! ## Usage
//!
//! ```rust
//! use spikemerge::sort::{sort_electrode, BisectParams, CutoffParams, ElectrodeData, SortConfig};
//!
//! let features: Vec<Vec<f32>> = (0..40)
//!     .map(|i| vec![(i % 7) as f32 * 0.1, (i % 5) as f32 * 0.1])
//!     .collect();
//! let waveforms = features.clone();
//! let data = ElectrodeData { electrode: 1, features, waveforms, kernel_scale: None };
//!
//! let config = SortConfig::default()
//!     .with_bisect(BisectParams { max_bisections: 2, max_passes: 10, min_cluster_size: 5 })
//!     .with_cutoff(CutoffParams::default().with_seed(42));
//! let sorted = sort_electrode(&data, &config).unwrap();
//! assert_eq!(sorted.automated.total_live_size(), 40);
//! ```

mod bisect;
mod cutoff;
mod energy;
mod merge;
mod pipeline;
mod session;
mod strength;
mod traits;
mod triangular;
mod util;

pub use bisect::{Bisect, BisectParams};
pub use cutoff::{Cutoff, CutoffEstimator, CutoffFallback, CutoffParams, CutoffSource};
pub use energy::{InterfaceEnergy, KernelParams};
pub use merge::{MergeEngine, MergeRecord, MergeState, MergeStatus};
pub use pipeline::{
    sort_electrode, sort_electrode_with, sort_electrodes, ElectrodeData, ElectrodeOutcome, ElectrodeSort,
    SortConfig,
};
pub use session::{Command, Finalized, ResetMode, Session};
pub use strength::ConnectionStrength;
pub use traits::{InitialPartition, Partition};
pub use triangular::{merge_targets, MergeTargets, TriMatrix};
