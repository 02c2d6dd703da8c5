//! Interface energy between clusters.
//!
//! For clusters `i != j` the energy is the kernel sum over every cross pair:
//!
//! ```text
//! E(i, j) = Σ_{a ∈ i, b ∈ j} exp(-‖a - b‖ / d0)
//! ```
//!
//! The diagonal holds the self-energy over unique intra-cluster pairs, i.e. the
//! full double sum with the `n_i` zero-distance terms removed and halved:
//!
//! ```text
//! E(i, i) = (Σ_{a, b ∈ i} exp(-‖a - b‖ / d0) - n_i) / 2 = Σ_{a < b ∈ i} exp(-‖a - b‖ / d0)
//! ```
//!
//! A singleton therefore has zero self-energy; the connection-strength stage
//! deals with that.
//!
//! Cost is O(N²) kernel evaluations for N spikes. Every cell is independent, so
//! the cells are computed in parallel with rayon and written back afterwards.

use rayon::prelude::*;

use super::traits::Partition;
use super::triangular::TriMatrix;
use super::util;
use crate::error::{Error, Result};

/// How the kernel scale `d0` is derived when the feature source does not supply one.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelParams {
    /// `d0 = sqrt(trace(cov(features))) / scale_divisor`. Larger values make the
    /// kernel more local.
    pub scale_divisor: f64,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self { scale_divisor: 10.0 }
    }
}

impl KernelParams {
    /// Reject non-positive or non-finite divisors.
    pub fn validate(&self) -> Result<()> {
        if !(self.scale_divisor.is_finite() && self.scale_divisor > 0.0) {
            return Err(Error::InvalidParameter {
                name: "scale_divisor",
                message: "must be positive and finite",
            });
        }
        Ok(())
    }
}

/// Interface-energy computation over a fixed set of clusters.
pub struct InterfaceEnergy;

impl InterfaceEnergy {
    /// Energy matrix for the clusters of `partition`.
    pub fn compute(features: &[Vec<f32>], partition: &Partition) -> Result<TriMatrix> {
        if partition.assignment.len() != features.len() {
            return Err(Error::DimensionMismatch {
                expected: features.len(),
                found: partition.assignment.len(),
            });
        }
        Self::from_groups(features, &partition.members(), partition.kernel_scale)
    }

    /// Energy matrix for explicit spike groups; group `g` becomes cluster `g`.
    pub fn from_groups(features: &[Vec<f32>], groups: &[Vec<usize>], kernel_scale: f64) -> Result<TriMatrix> {
        if !(kernel_scale.is_finite() && kernel_scale > 0.0) {
            return Err(Error::InvalidParameter {
                name: "kernel_scale",
                message: "must be positive and finite",
            });
        }
        let c = groups.len();
        let cells: Vec<(usize, usize)> = (0..c).flat_map(|j| (0..=j).map(move |i| (i, j))).collect();

        let values: Vec<f64> = cells
            .par_iter()
            .map(|&(i, j)| {
                if i == j {
                    self_energy(features, &groups[i], kernel_scale)
                } else {
                    cross_energy(features, &groups[i], &groups[j], kernel_scale)
                }
            })
            .collect();

        let mut energy = TriMatrix::zeros(c);
        for (&(i, j), v) in cells.iter().zip(values) {
            energy.set(i, j, v);
        }
        Ok(energy)
    }
}

#[inline]
fn kernel(a: &[f32], b: &[f32], d0: f64) -> f64 {
    (-util::euclidean(a, b) / d0).exp()
}

pub(crate) fn cross_energy(features: &[Vec<f32>], a: &[usize], b: &[usize], d0: f64) -> f64 {
    let mut sum = 0.0;
    for &p in a {
        for &q in b {
            sum += kernel(&features[p], &features[q], d0);
        }
    }
    sum
}

pub(crate) fn self_energy(features: &[Vec<f32>], members: &[usize], d0: f64) -> f64 {
    let mut sum = 0.0;
    for (s, &p) in members.iter().enumerate() {
        for &q in &members[s + 1..] {
            sum += kernel(&features[p], &features[q], d0);
        }
    }
    sum
}
