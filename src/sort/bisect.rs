//! Over-segmenting initial clusterer.
//!
//! Each round splits every cluster in two with a two-centroid partition (a
//! k-means with k = 2 seeded from the cluster's extreme points), then keeps the
//! split only when both halves hold at least `min_cluster_size` spikes. After
//! `max_bisections` rounds a single cloud can be tiled by up to
//! `2^max_bisections` clusters.
//!
//! Over-segmentation is intended: curved or drifting clouds are captured by
//! several small pieces, and the merge stage reassembles them by interface
//! energy.

use super::energy::KernelParams;
use super::traits::{InitialPartition, Partition};
use super::util;
use crate::error::{Error, Result};

/// Bisection parameters (B, M and K).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BisectParams {
    /// Maximum number of bisection rounds.
    pub max_bisections: usize,
    /// Maximum reassignment passes per two-centroid split.
    pub max_passes: usize,
    /// Minimum spikes a child must keep for a split to be accepted.
    pub min_cluster_size: usize,
}

impl Default for BisectParams {
    fn default() -> Self {
        Self {
            max_bisections: 6,
            max_passes: 10,
            min_cluster_size: 20,
        }
    }
}

impl BisectParams {
    /// Reject non-positive counts.
    pub fn validate(&self) -> Result<()> {
        if self.max_bisections == 0 {
            return Err(Error::InvalidParameter {
                name: "max_bisections",
                message: "must be at least 1",
            });
        }
        if self.max_passes == 0 {
            return Err(Error::InvalidParameter {
                name: "max_passes",
                message: "must be at least 1",
            });
        }
        if self.min_cluster_size == 0 {
            return Err(Error::InvalidParameter {
                name: "min_cluster_size",
                message: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// Recursive two-centroid bisection.
#[derive(Clone, Debug, Default)]
pub struct Bisect {
    params: BisectParams,
    kernel: KernelParams,
}

impl Bisect {
    /// Create a bisector from explicit parameters.
    pub fn new(params: BisectParams) -> Self {
        Self {
            params,
            kernel: KernelParams::default(),
        }
    }

    /// Set the maximum number of bisection rounds.
    pub fn with_max_bisections(mut self, max_bisections: usize) -> Self {
        self.params.max_bisections = max_bisections;
        self
    }

    /// Set the maximum reassignment passes per split.
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.params.max_passes = max_passes;
        self
    }

    /// Set the minimum child size.
    pub fn with_min_cluster_size(mut self, min_cluster_size: usize) -> Self {
        self.params.min_cluster_size = min_cluster_size;
        self
    }

    /// Set how the kernel scale is derived from the features.
    pub fn with_kernel(mut self, kernel: KernelParams) -> Self {
        self.kernel = kernel;
        self
    }

    /// Access the bisection parameters.
    pub fn params(&self) -> &BisectParams {
        &self.params
    }

    /// Split `members` in two, or `None` when the cluster has no spread or a
    /// side comes back empty.
    fn two_means(&self, data: &[Vec<f32>], members: &[usize], dim: usize) -> Option<(Vec<usize>, Vec<usize>)> {
        let mean = util::centroid(data, members, dim);
        let first = farthest_from(data, members, |p| util::squared_distance_to(p, &mean))?;
        let second = farthest_from(data, members, |p| util::squared_euclidean(p, &data[first]))?;
        if util::squared_euclidean(&data[first], &data[second]) == 0.0 {
            return None;
        }

        let mut centers: [Vec<f64>; 2] = [
            data[first].iter().map(|&x| f64::from(x)).collect(),
            data[second].iter().map(|&x| f64::from(x)).collect(),
        ];
        let mut side = vec![false; members.len()];

        for pass in 0..self.params.max_passes {
            let mut changed = false;
            for (slot, &m) in members.iter().enumerate() {
                let d0 = util::squared_distance_to(&data[m], &centers[0]);
                let d1 = util::squared_distance_to(&data[m], &centers[1]);
                // Ties stay with the first centroid.
                let right = d1 < d0;
                if right != side[slot] {
                    side[slot] = right;
                    changed = true;
                }
            }
            if pass > 0 && !changed {
                break;
            }
            let (left, right) = split_by(members, &side);
            if left.is_empty() || right.is_empty() {
                return None;
            }
            centers = [util::centroid(data, &left, dim), util::centroid(data, &right, dim)];
        }

        let (left, right) = split_by(members, &side);
        if left.is_empty() || right.is_empty() {
            None
        } else {
            Some((left, right))
        }
    }
}

impl InitialPartition for Bisect {
    fn partition(&self, features: &[Vec<f32>]) -> Result<Partition> {
        self.params.validate()?;
        self.kernel.validate()?;
        let dim = util::check_dimensions(features)?;
        let n = features.len();
        let k = self.params.min_cluster_size;

        let mut clusters: Vec<Vec<usize>> = vec![(0..n).collect()];
        for round in 0..self.params.max_bisections {
            let mut next: Vec<Vec<usize>> = Vec::with_capacity(clusters.len() * 2);
            let mut split_any = false;
            for members in clusters {
                if members.len() < 2 * k {
                    next.push(members);
                    continue;
                }
                match self.two_means(features, &members, dim) {
                    Some((left, right)) if left.len() >= k && right.len() >= k => {
                        next.push(left);
                        next.push(right);
                        split_any = true;
                    }
                    _ => {
                        tracing::debug!(round, size = members.len(), "bisection refused");
                        next.push(members);
                    }
                }
            }
            clusters = next;
            if !split_any {
                tracing::debug!(round, clusters = clusters.len(), "bisection converged early");
                break;
            }
        }

        let mut assignment = vec![0usize; n];
        let mut sizes = Vec::with_capacity(clusters.len());
        for (id, members) in clusters.iter().enumerate() {
            for &m in members {
                assignment[m] = id;
            }
            sizes.push(members.len());
        }

        tracing::debug!(spikes = n, clusters = sizes.len(), "initial partition built");

        Ok(Partition {
            assignment,
            sizes,
            kernel_scale: util::kernel_scale(features, self.kernel.scale_divisor),
        })
    }
}

fn farthest_from(data: &[Vec<f32>], members: &[usize], dist: impl Fn(&[f32]) -> f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for &m in members {
        let d = dist(&data[m]);
        if best.map_or(true, |(_, bd)| d > bd) {
            best = Some((m, d));
        }
    }
    best.map(|(m, _)| m)
}

fn split_by(members: &[usize], side: &[bool]) -> (Vec<usize>, Vec<usize>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for (&m, &r) in members.iter().zip(side.iter()) {
        if r {
            right.push(m);
        } else {
            left.push(m);
        }
    }
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cluster(center: &[f32], n: usize, spread: f32) -> Vec<Vec<f32>> {
        let mut points = Vec::with_capacity(n);
        for i in 0..n {
            let p = center
                .iter()
                .enumerate()
                .map(|(d, &c)| c + spread * ((i * 7 + d * 13) % 11) as f32 / 11.0 - spread / 2.0)
                .collect();
            points.push(p);
        }
        points
    }

    #[test]
    fn separates_two_blobs_first() {
        let mut data = make_cluster(&[0.0, 0.0], 30, 0.5);
        data.extend(make_cluster(&[20.0, 20.0], 30, 0.5));

        let part = Bisect::default()
            .with_max_bisections(1)
            .with_min_cluster_size(5)
            .partition(&data)
            .unwrap();

        assert_eq!(part.n_clusters(), 2);
        assert_eq!(part.sizes, vec![30, 30]);
        let a = part.assignment[0];
        assert!(part.assignment[..30].iter().all(|&l| l == a));
        assert!(part.assignment[30..].iter().all(|&l| l != a));
    }

    #[test]
    fn respects_minimum_child_size() {
        let data = make_cluster(&[0.0, 0.0, 0.0], 50, 2.0);
        let part = Bisect::default()
            .with_max_bisections(8)
            .with_min_cluster_size(10)
            .partition(&data)
            .unwrap();

        assert!(part.sizes.iter().all(|&s| s >= 10));
        assert_eq!(part.sizes.iter().sum::<usize>(), 50);
        assert!(part.n_clusters() <= 5);
    }

    #[test]
    fn over_segments_a_single_cloud() {
        let data = make_cluster(&[1.0, -1.0], 200, 4.0);
        let part = Bisect::default()
            .with_max_bisections(3)
            .with_min_cluster_size(5)
            .partition(&data)
            .unwrap();
        assert!(part.n_clusters() > 1);
        assert!(part.n_clusters() <= 8);
        for (spike, &c) in part.assignment.iter().enumerate() {
            assert!(c < part.n_clusters(), "spike {spike} has id {c}");
        }
    }

    #[test]
    fn identical_points_stay_together() {
        let data = vec![vec![1.0, 1.0]; 40];
        let part = Bisect::default().with_min_cluster_size(2).partition(&data).unwrap();
        assert_eq!(part.sizes, vec![40]);
        assert_eq!(part.kernel_scale, 1.0);
    }

    #[test]
    fn invalid_params() {
        let data = vec![vec![0.0, 0.0]];
        assert!(Bisect::default().with_max_bisections(0).partition(&data).is_err());
        assert!(Bisect::default().with_max_passes(0).partition(&data).is_err());
        assert!(Bisect::default().with_min_cluster_size(0).partition(&data).is_err());
        assert!(matches!(Bisect::default().partition(&[]), Err(Error::EmptyInput)));
    }
}
