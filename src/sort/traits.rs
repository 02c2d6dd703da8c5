use crate::error::Result;

/// Output of an initial (over-segmenting) clusterer for one electrode.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Partition {
    /// Dense cluster id per spike, in `0..sizes.len()`.
    pub assignment: Vec<usize>,
    /// Spikes per cluster.
    pub sizes: Vec<usize>,
    /// Distance normalizer `d0` for the interface-energy kernel.
    pub kernel_scale: f64,
}

impl Partition {
    /// Number of clusters.
    pub fn n_clusters(&self) -> usize {
        self.sizes.len()
    }

    /// Spike indices grouped by cluster id.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = self.sizes.iter().map(|&n| Vec::with_capacity(n)).collect();
        for (spike, &c) in self.assignment.iter().enumerate() {
            groups[c].push(spike);
        }
        groups
    }
}

/// Common interface for initial clusterers that over-segment feature space.
pub trait InitialPartition {
    /// Partition `features` (one row per spike) into many small clusters.
    fn partition(&self, features: &[Vec<f32>]) -> Result<Partition>;
}
