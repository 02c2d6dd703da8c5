//! Per-electrode sorting pipeline and the cross-electrode driver.
//!
//! Electrodes share no mutable state, so [`sort_electrodes`] runs them on the
//! rayon pool and reports one outcome per electrode: a failure on one
//! electrode never aborts the others.

use rayon::prelude::*;

use super::bisect::{Bisect, BisectParams};
use super::cutoff::{Cutoff, CutoffEstimator, CutoffParams};
use super::energy::{InterfaceEnergy, KernelParams};
use super::merge::{MergeEngine, MergeRecord, MergeState};
use super::session::Session;
use super::traits::InitialPartition;
use super::triangular::TriMatrix;
use crate::error::{Error, Result};

/// Configuration threaded through every stage.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SortConfig {
    /// Initial clustering.
    pub bisect: BisectParams,
    /// Kernel scale derivation.
    pub kernel: KernelParams,
    /// Cutoff policy and bootstrap settings.
    pub cutoff: CutoffParams,
}

impl SortConfig {
    /// Set the bisection parameters.
    pub fn with_bisect(mut self, bisect: BisectParams) -> Self {
        self.bisect = bisect;
        self
    }

    /// Set the kernel parameters.
    pub fn with_kernel(mut self, kernel: KernelParams) -> Self {
        self.kernel = kernel;
        self
    }

    /// Set the cutoff parameters.
    pub fn with_cutoff(mut self, cutoff: CutoffParams) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Validate every parameter; nothing runs on an invalid config.
    pub fn validate(&self) -> Result<()> {
        self.bisect.validate()?;
        self.kernel.validate()?;
        self.cutoff.validate()
    }
}

/// Upstream input for one electrode: aligned, projected spikes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElectrodeData {
    /// Electrode id.
    pub electrode: u32,
    /// Reduced feature vector per spike.
    pub features: Vec<Vec<f32>>,
    /// Raw waveform per spike.
    pub waveforms: Vec<Vec<f32>>,
    /// Kernel scale supplied by the feature source, if any.
    pub kernel_scale: Option<f64>,
}

/// Products of the automatic pipeline for one electrode.
#[derive(Clone, Debug)]
pub struct ElectrodeSort {
    /// Electrode id.
    pub electrode: u32,
    /// Kernel scale `d0` the energies were computed with.
    pub kernel_scale: f64,
    /// Cutoff the automatic merge stopped at.
    pub cutoff: Cutoff,
    /// State before merging.
    pub initial: MergeState,
    /// State after the automatic merge.
    pub automated: MergeState,
}

impl ElectrodeSort {
    /// Interface energy over the initial clusters.
    pub fn raw_energy(&self) -> &TriMatrix {
        self.initial.energy()
    }

    /// Interface energy after the automatic merge.
    pub fn automated_energy(&self) -> &TriMatrix {
        self.automated.energy()
    }

    /// Initial cluster id per spike.
    pub fn initial_assignment(&self) -> &[usize] {
        self.initial.assignment()
    }

    /// Merged cluster id per spike.
    pub fn automated_assignment(&self) -> &[usize] {
        self.automated.assignment()
    }

    /// Spikes per initial cluster.
    pub fn initial_sizes(&self) -> &[usize] {
        self.initial.sizes()
    }

    /// Spikes per cluster after merging.
    pub fn automated_sizes(&self) -> &[usize] {
        self.automated.sizes()
    }

    /// Chronological merge history of the automatic merge.
    pub fn history(&self) -> &[MergeRecord] {
        self.automated.history()
    }

    /// Open a manual override session on this result.
    pub fn into_session(self, waveforms: Vec<Vec<f32>>) -> Result<Session> {
        Session::new(self.initial, self.automated, self.cutoff.value, waveforms)
    }
}

/// Outcome of one electrode in a multi-electrode run.
#[derive(Debug)]
pub struct ElectrodeOutcome {
    /// Electrode id.
    pub electrode: u32,
    /// Result or the error that stopped this electrode.
    pub result: Result<ElectrodeSort>,
}

/// Run the full pipeline on one electrode with the default bisecting clusterer.
pub fn sort_electrode(data: &ElectrodeData, config: &SortConfig) -> Result<ElectrodeSort> {
    let partitioner = Bisect::new(config.bisect.clone()).with_kernel(config.kernel.clone());
    sort_electrode_with(&partitioner, data, config)
}

/// Run the full pipeline on one electrode with a caller-supplied initial clusterer.
pub fn sort_electrode_with<P: InitialPartition + ?Sized>(
    partitioner: &P,
    data: &ElectrodeData,
    config: &SortConfig,
) -> Result<ElectrodeSort> {
    config.validate()?;
    if data.waveforms.len() != data.features.len() {
        return Err(Error::WaveformMismatch {
            spikes: data.features.len(),
            waveforms: data.waveforms.len(),
        });
    }

    let mut partition = partitioner.partition(&data.features)?;
    if let Some(scale) = data.kernel_scale {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::InvalidParameter {
                name: "kernel_scale",
                message: "must be positive and finite",
            });
        }
        partition.kernel_scale = scale;
    }
    let kernel_scale = partition.kernel_scale;

    let energy = InterfaceEnergy::compute(&data.features, &partition)?;
    let initial = MergeState::new(energy, partition.sizes, partition.assignment)?;
    let cutoff = CutoffEstimator::new(config.cutoff.clone()).estimate(initial.strength(), initial.live_mask())?;

    let mut automated = initial.clone();
    let merges = MergeEngine::new(cutoff.value).run(&mut automated)?;

    tracing::info!(
        electrode = data.electrode,
        spikes = data.features.len(),
        initial_clusters = initial.n_clusters(),
        final_clusters = automated.live_count(),
        merges,
        cutoff = %format!("{:.4}", cutoff.value),
        source = ?cutoff.source,
        "electrode sorted"
    );

    Ok(ElectrodeSort {
        electrode: data.electrode,
        kernel_scale,
        cutoff,
        initial,
        automated,
    })
}

/// Sort every electrode in parallel.
///
/// The configuration is validated once up front; after that each electrode
/// succeeds or fails on its own.
pub fn sort_electrodes(electrodes: &[ElectrodeData], config: &SortConfig) -> Result<Vec<ElectrodeOutcome>> {
    config.validate()?;
    Ok(electrodes
        .par_iter()
        .map(|data| {
            let result = sort_electrode(data, config);
            if let Err(err) = &result {
                tracing::warn!(electrode = data.electrode, error = %err, "electrode failed");
            }
            ElectrodeOutcome {
                electrode: data.electrode,
                result,
            }
        })
        .collect())
}
