//! Greedy agglomerative merging over connection strength.
//!
//! Each step picks the live pair with the largest off-diagonal strength. If it
//! falls below the cutoff the engine terminates; otherwise the higher id is
//! absorbed into the lower one and the matrices are updated in place:
//!
//! 1. `n(i) += n(j)`, `n(j) = 0`
//! 2. `E(i, i) += E(j, j) + E(i, j)`
//! 3. `E(i, k) += E(j, k)` for every other live `k`
//! 4. row/column `j` is nulled in `E` and `J`
//! 5. `J` is recomputed along row/column `i` only
//! 6. `(i, j)` is appended to the history
//! 7. spikes labelled `j` are relabelled `i`
//!
//! The result equals recomputing `E` from scratch on the merged clusters, at
//! O(C) matrix work per step instead of O(N²) kernel evaluations.

use super::energy::InterfaceEnergy;
use super::strength::ConnectionStrength;
use super::triangular::{merge_targets, TriMatrix};
use crate::error::{Error, Result};

/// One merge: `absorbed` was folded into `survivor` (`survivor < absorbed`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergeRecord {
    /// Lower id, kept.
    pub survivor: usize,
    /// Higher id, now dead.
    pub absorbed: usize,
}

/// Working state of one electrode: energies, strengths, sizes, labels and history.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeState {
    energy: TriMatrix,
    strength: TriMatrix,
    sizes: Vec<usize>,
    live: Vec<bool>,
    rejected: Vec<bool>,
    assignment: Vec<usize>,
    history: Vec<MergeRecord>,
}

impl MergeState {
    /// Initial state over `sizes.len()` clusters, all live.
    pub fn new(energy: TriMatrix, sizes: Vec<usize>, assignment: Vec<usize>) -> Result<Self> {
        let c = sizes.len();
        if energy.dim() != c {
            return Err(Error::DimensionMismatch {
                expected: c,
                found: energy.dim(),
            });
        }
        let mut counts = vec![0usize; c];
        for &label in &assignment {
            if label >= c {
                return Err(Error::InvalidParameter {
                    name: "assignment",
                    message: "cluster id out of range",
                });
            }
            counts[label] += 1;
        }
        if counts != sizes {
            return Err(Error::InvalidParameter {
                name: "sizes",
                message: "must match the spike counts of the assignment",
            });
        }

        let live = vec![true; c];
        let strength = ConnectionStrength::compute(&energy, &sizes, &live);
        Ok(Self {
            energy,
            strength,
            sizes,
            live,
            rejected: vec![false; c],
            assignment,
            history: Vec::new(),
        })
    }

    /// Interface-energy matrix (dead rows are NaN).
    pub fn energy(&self) -> &TriMatrix {
        &self.energy
    }

    /// Connection-strength matrix (dead rows are NaN).
    pub fn strength(&self) -> &TriMatrix {
        &self.strength
    }

    /// Spikes per cluster id; zero for merged-away clusters.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Cluster id per spike.
    pub fn assignment(&self) -> &[usize] {
        &self.assignment
    }

    /// Chronological merge history.
    pub fn history(&self) -> &[MergeRecord] {
        &self.history
    }

    /// Number of cluster ids (live or not).
    pub fn n_clusters(&self) -> usize {
        self.sizes.len()
    }

    /// Whether `cluster` can still take part in merges.
    pub fn is_live(&self, cluster: usize) -> bool {
        self.live.get(cluster).copied().unwrap_or(false)
    }

    /// Whether `cluster` was explicitly rejected.
    pub fn is_rejected(&self, cluster: usize) -> bool {
        self.rejected.get(cluster).copied().unwrap_or(false)
    }

    /// Live cluster ids, ascending.
    pub fn live_clusters(&self) -> Vec<usize> {
        (0..self.n_clusters()).filter(|&c| self.live[c]).collect()
    }

    /// Number of live clusters.
    pub fn live_count(&self) -> usize {
        self.live.iter().filter(|&&l| l).count()
    }

    /// Total spikes over live clusters.
    pub fn total_live_size(&self) -> usize {
        self.sizes
            .iter()
            .zip(&self.live)
            .filter(|(_, &l)| l)
            .map(|(&n, _)| n)
            .sum()
    }

    pub(crate) fn live_mask(&self) -> &[bool] {
        &self.live
    }

    /// Strongest live off-diagonal pair `(i, j, J(i, j))` with `i < j`.
    ///
    /// Pairs are scanned in lexicographic order and only a strictly larger value
    /// replaces the incumbent, so the lowest pair wins ties.
    pub fn best_pair(&self) -> Option<(usize, usize, f64)> {
        let c = self.n_clusters();
        let mut best: Option<(usize, usize, f64)> = None;
        for i in (0..c).filter(|&i| self.live[i]) {
            for j in ((i + 1)..c).filter(|&j| self.live[j]) {
                let v = self.strength.get(i, j);
                if v.is_finite() && best.map_or(true, |(_, _, b)| v > b) {
                    best = Some((i, j, v));
                }
            }
        }
        best
    }

    fn check_live(&self, cluster: usize) -> Result<()> {
        if self.is_live(cluster) {
            Ok(())
        } else {
            Err(Error::StaleReference { cluster })
        }
    }

    /// Merge clusters `a` and `b`; the lower id survives.
    pub fn merge(&mut self, a: usize, b: usize) -> Result<MergeRecord> {
        if a == b {
            return Err(Error::SelfMerge { cluster: a });
        }
        self.check_live(a)?;
        self.check_live(b)?;
        let (i, j) = if a < b { (a, b) } else { (b, a) };

        self.sizes[i] += self.sizes[j];
        self.sizes[j] = 0;

        let absorbed_self = self.energy.get(j, j) + self.energy.get(i, j);
        self.energy.add(i, i, absorbed_self);

        let targets = merge_targets(i, j, self.n_clusters());
        for ((&k, &(sr, sc)), &(ar, ac)) in targets.others.iter().zip(&targets.survivor).zip(&targets.absorbed) {
            if self.live[k] {
                let moved = self.energy.get(ar, ac);
                self.energy.add(sr, sc, moved);
            }
        }

        self.live[j] = false;
        self.energy.null_cluster(j);
        self.strength.null_cluster(j);
        ConnectionStrength::update_row(&mut self.strength, &self.energy, &self.sizes, &self.live, i);

        let record = MergeRecord {
            survivor: i,
            absorbed: j,
        };
        self.history.push(record);

        for label in &mut self.assignment {
            if *label == j {
                *label = i;
            }
        }
        Ok(record)
    }

    /// Delete `cluster`: its rows are nulled and it never wins a search again.
    ///
    /// Its spikes keep the id; finalization maps them to label 0.
    pub fn reject(&mut self, cluster: usize) -> Result<()> {
        self.check_live(cluster)?;
        self.live[cluster] = false;
        self.rejected[cluster] = true;
        self.energy.null_cluster(cluster);
        self.strength.null_cluster(cluster);
        Ok(())
    }

    /// Interface energy recomputed from scratch for the live clusters of this state.
    ///
    /// Dead rows are NaN, matching the incrementally maintained matrix.
    pub fn recompute_energy(&self, features: &[Vec<f32>], kernel_scale: f64) -> Result<TriMatrix> {
        if features.len() != self.assignment.len() {
            return Err(Error::DimensionMismatch {
                expected: self.assignment.len(),
                found: features.len(),
            });
        }
        let c = self.n_clusters();
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); c];
        for (spike, &label) in self.assignment.iter().enumerate() {
            if self.live[label] {
                groups[label].push(spike);
            }
        }
        let mut energy = InterfaceEnergy::from_groups(features, &groups, kernel_scale)?;
        for k in (0..c).filter(|&k| !self.live[k]) {
            energy.null_cluster(k);
        }
        Ok(energy)
    }
}

/// Whether another merge can happen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeStatus {
    /// At least two live clusters and a pair at or above the cutoff.
    Active,
    /// Nothing left to merge.
    Terminated,
}

/// Sequential greedy merge loop for a fixed cutoff.
#[derive(Clone, Copy, Debug)]
pub struct MergeEngine {
    cutoff: f64,
}

impl MergeEngine {
    /// Engine that merges while the best strength is at least `cutoff`.
    pub fn new(cutoff: f64) -> Self {
        Self { cutoff }
    }

    /// The cutoff.
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Current status of `state` under this cutoff.
    pub fn status(&self, state: &MergeState) -> MergeStatus {
        match state.best_pair() {
            Some((_, _, v)) if v >= self.cutoff => MergeStatus::Active,
            _ => MergeStatus::Terminated,
        }
    }

    /// Perform one merge, or return `None` when terminated.
    pub fn step(&self, state: &mut MergeState) -> Result<Option<MergeRecord>> {
        let Some((i, j, v)) = state.best_pair() else {
            return Ok(None);
        };
        if v < self.cutoff {
            return Ok(None);
        }
        let record = state.merge(i, j)?;
        tracing::debug!(
            survivor = record.survivor,
            absorbed = record.absorbed,
            strength = %format!("{:.4}", v),
            live = state.live_count(),
            "merged clusters"
        );
        Ok(Some(record))
    }

    /// Merge until terminated; returns the number of merges made.
    ///
    /// Live clusters drop by one per merge, so at most `C0 - 1` steps run.
    pub fn run(&self, state: &mut MergeState) -> Result<usize> {
        let mut merges = 0;
        for _ in 0..state.n_clusters().saturating_sub(1) {
            if self.step(state)?.is_none() {
                break;
            }
            merges += 1;
        }
        Ok(merges)
    }
}
