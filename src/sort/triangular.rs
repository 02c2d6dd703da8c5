//! Packed symmetric matrix over cluster ids.
//!
//! Only the upper triangle (row <= col) is stored, column by column: entry
//! `(r, c)` lives at `c * (c + 1) / 2 + r`. Every accessor normalizes its
//! arguments so callers may pass `(i, j)` in either order.

/// Symmetric `n x n` matrix storing only `row <= col`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TriMatrix {
    n: usize,
    data: Vec<f64>,
}

impl TriMatrix {
    /// All-zero matrix of dimension `n`.
    pub fn zeros(n: usize) -> Self {
        Self::filled(n, 0.0)
    }

    /// Matrix of dimension `n` with every stored entry set to `value`.
    pub fn filled(n: usize, value: f64) -> Self {
        Self {
            n,
            data: vec![value; n * (n + 1) / 2],
        }
    }

    /// Build from a full square matrix, reading the upper triangle.
    ///
    /// # Panics
    ///
    /// Panics if `rows` is not square.
    pub fn from_dense(rows: &[Vec<f64>]) -> Self {
        let n = rows.len();
        let mut m = Self::zeros(n);
        for (r, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), n, "matrix must be square");
            for (c, &v) in row.iter().enumerate().skip(r) {
                m.set(r, c, v);
            }
        }
        m
    }

    /// Dimension.
    pub fn dim(&self) -> usize {
        self.n
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> usize {
        let (r, c) = ordered(i, j);
        debug_assert!(c < self.n, "index ({i}, {j}) out of range for dim {}", self.n);
        c * (c + 1) / 2 + r
    }

    /// Entry `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[self.index(i, j)]
    }

    /// Overwrite entry `(i, j)`.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        let idx = self.index(i, j);
        self.data[idx] = value;
    }

    /// Add `delta` to entry `(i, j)`.
    #[inline]
    pub fn add(&mut self, i: usize, j: usize, delta: f64) {
        let idx = self.index(i, j);
        self.data[idx] += delta;
    }

    /// Diagonal as a vector.
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.n).map(|i| self.get(i, i)).collect()
    }

    /// Null row/column `i` including its diagonal entry (NaN).
    pub fn null_cluster(&mut self, i: usize) {
        for k in 0..self.n {
            self.set(i, k, f64::NAN);
        }
    }

    /// Iterate strictly-upper entries as `(row, col, value)` with `row < col`.
    pub fn iter_upper(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.n).flat_map(move |c| (0..c).map(move |r| (r, c, self.get(r, c))))
    }

    /// Expand to a full square matrix.
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        (0..self.n)
            .map(|i| (0..self.n).map(|j| self.get(i, j)).collect())
            .collect()
    }
}

#[inline]
pub(crate) fn ordered(i: usize, j: usize) -> (usize, usize) {
    if i <= j {
        (i, j)
    } else {
        (j, i)
    }
}

/// The two L-shaped index sets touched when cluster `absorbed` merges into `survivor`.
///
/// `survivor[t]` and `absorbed[t]` are the normalized `(row, col)` cells linking
/// each cluster to the same third cluster `others[t]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeTargets {
    /// Third clusters, ascending.
    pub others: Vec<usize>,
    /// Cells `(survivor, k)` for every `k` other than the two merging clusters.
    pub survivor: Vec<(usize, usize)>,
    /// Cells `(absorbed, k)` for every `k` other than the two merging clusters.
    pub absorbed: Vec<(usize, usize)>,
}

/// Build the disjoint cell sets for merging `j` into `i` in a matrix of dimension `n`.
///
/// Covers `k < i`, `i < k < j` and `k > j` alike in O(n).
pub fn merge_targets(i: usize, j: usize, n: usize) -> MergeTargets {
    debug_assert!(i != j && i < n && j < n);
    let cap = n.saturating_sub(2);
    let mut out = MergeTargets {
        others: Vec::with_capacity(cap),
        survivor: Vec::with_capacity(cap),
        absorbed: Vec::with_capacity(cap),
    };
    for k in (0..n).filter(|&k| k != i && k != j) {
        out.others.push(k);
        out.survivor.push(ordered(i, k));
        out.absorbed.push(ordered(j, k));
    }
    out
}
