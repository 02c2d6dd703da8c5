//! Merge cutoff estimation.
//!
//! An explicit `defcut > 0` is returned unchanged. Otherwise the cutoff is the
//! upper end of a bias-corrected and accelerated (BCa) bootstrap interval for
//! the `ptile`-th percentile of the live off-diagonal connection strengths.
//!
//! # BCa
//!
//! With bootstrap replicates `θ*_b`, point estimate `θ̂` and jackknife
//! leave-one-out estimates `θ_(i)`:
//!
//! ```text
//! z0 = Φ⁻¹( #{θ*_b < θ̂}/B + #{θ*_b = θ̂}/(2B) )
//! a  = Σ (θ̄ - θ_(i))³ / (6 (Σ (θ̄ - θ_(i))²)^{3/2})
//! q  = Φ( z0 + (z0 + z_{1-α/2}) / (1 - a (z0 + z_{1-α/2})) )
//! ```
//!
//! and the bound is the `q`-quantile of the sorted replicates.
//!
//! Resamples run in parallel; each owns an RNG seeded from `(seed, index)`, so
//! a fixed seed gives the same cutoff on any thread count.
//!
//! # References
//!
//! Efron, B. (1987). "Better Bootstrap Confidence Intervals." JASA 82(397).

use rand::prelude::*;
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal};

use super::triangular::TriMatrix;
use super::util;
use crate::error::{Error, Result};

/// What to do when the bootstrap cannot be run meaningfully.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CutoffFallback {
    /// Plain `ptile` percentile of whatever strengths exist (1.0 when none).
    #[default]
    Percentile,
    /// A fixed cutoff in `[0, 1]`.
    Fixed(f64),
    /// Return [`Error::UnderdeterminedBootstrap`].
    Fail,
}

/// Cutoff estimation parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CutoffParams {
    /// Explicit cutoff in `[0, 1]`; any positive value bypasses the bootstrap.
    pub defcut: f64,
    /// Number of bootstrap resamples.
    pub nboot: usize,
    /// Interval level; the bound uses `z_{1-alpha/2}`.
    pub alpha: f64,
    /// Percentile (0–100) of the strengths that is bootstrapped.
    pub ptile: f64,
    /// Fewest off-diagonal strengths for which the bootstrap is attempted.
    pub min_pairs: usize,
    /// Behaviour when the bootstrap is underdetermined.
    pub fallback: CutoffFallback,
    /// Optional RNG seed for reproducibility.
    pub seed: Option<u64>,
}

impl Default for CutoffParams {
    fn default() -> Self {
        Self {
            defcut: 0.0,
            nboot: 1000,
            alpha: 0.05,
            ptile: 95.0,
            min_pairs: 10,
            fallback: CutoffFallback::Percentile,
            seed: None,
        }
    }
}

impl CutoffParams {
    /// Set an explicit cutoff.
    pub fn with_defcut(mut self, defcut: f64) -> Self {
        self.defcut = defcut;
        self
    }

    /// Set the number of bootstrap resamples.
    pub fn with_nboot(mut self, nboot: usize) -> Self {
        self.nboot = nboot;
        self
    }

    /// Set the interval level.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the bootstrapped percentile.
    pub fn with_ptile(mut self, ptile: f64) -> Self {
        self.ptile = ptile;
        self
    }

    /// Set the minimum number of strengths needed to bootstrap.
    pub fn with_min_pairs(mut self, min_pairs: usize) -> Self {
        self.min_pairs = min_pairs;
        self
    }

    /// Set the underdetermined-bootstrap fallback.
    pub fn with_fallback(mut self, fallback: CutoffFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check every field before any computation starts.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.defcut) {
            return Err(Error::InvalidParameter {
                name: "defcut",
                message: "must be in [0, 1]",
            });
        }
        if self.nboot == 0 {
            return Err(Error::InvalidParameter {
                name: "nboot",
                message: "must be at least 1",
            });
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(Error::InvalidParameter {
                name: "alpha",
                message: "must be in (0, 1)",
            });
        }
        if !(0.0..=100.0).contains(&self.ptile) {
            return Err(Error::InvalidParameter {
                name: "ptile",
                message: "must be in [0, 100]",
            });
        }
        if self.min_pairs < 2 {
            return Err(Error::InvalidParameter {
                name: "min_pairs",
                message: "must be at least 2",
            });
        }
        if let CutoffFallback::Fixed(v) = self.fallback {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::InvalidParameter {
                    name: "fallback",
                    message: "fixed cutoff must be in [0, 1]",
                });
            }
        }
        Ok(())
    }
}

/// Where a cutoff value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CutoffSource {
    /// `defcut` was positive.
    Explicit,
    /// BCa bootstrap bound.
    Bootstrap,
    /// The configured fallback.
    Fallback,
}

/// A connection-strength cutoff.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cutoff {
    /// Threshold below which merging stops.
    pub value: f64,
    /// How `value` was obtained.
    pub source: CutoffSource,
}

/// Derives the merge cutoff from connection strengths.
#[derive(Clone, Debug, Default)]
pub struct CutoffEstimator {
    params: CutoffParams,
}

impl CutoffEstimator {
    /// Create an estimator.
    pub fn new(params: CutoffParams) -> Self {
        Self { params }
    }

    /// Access the parameters.
    pub fn params(&self) -> &CutoffParams {
        &self.params
    }

    /// Estimate the cutoff from the live off-diagonal entries of `strength`.
    pub fn estimate(&self, strength: &TriMatrix, live: &[bool]) -> Result<Cutoff> {
        self.params.validate()?;
        if self.params.defcut > 0.0 {
            return Ok(Cutoff {
                value: self.params.defcut,
                source: CutoffSource::Explicit,
            });
        }

        let mut values: Vec<f64> = strength
            .iter_upper()
            .filter(|&(i, j, v)| live[i] && live[j] && v.is_finite())
            .map(|(_, _, v)| v)
            .collect();
        values.sort_by(|a, b| a.total_cmp(b));

        if values.len() < self.params.min_pairs {
            return self.fallback(&values);
        }

        match self.bca_upper(&values)? {
            Some(value) => Ok(Cutoff {
                value,
                source: CutoffSource::Bootstrap,
            }),
            None => self.fallback(&values),
        }
    }

    fn fallback(&self, sorted: &[f64]) -> Result<Cutoff> {
        tracing::warn!(
            pairs = sorted.len(),
            required = self.params.min_pairs,
            fallback = ?self.params.fallback,
            "bootstrap underdetermined; using fallback cutoff"
        );
        let value = match self.params.fallback {
            CutoffFallback::Percentile if sorted.is_empty() => 1.0,
            CutoffFallback::Percentile => util::percentile_sorted(sorted, self.params.ptile),
            CutoffFallback::Fixed(v) => v,
            CutoffFallback::Fail => {
                return Err(Error::UnderdeterminedBootstrap {
                    pairs: sorted.len(),
                    required: self.params.min_pairs,
                })
            }
        };
        Ok(Cutoff {
            value,
            source: CutoffSource::Fallback,
        })
    }

    /// Upper BCa bound, or `None` when the correction is undefined.
    fn bca_upper(&self, sorted: &[f64]) -> Result<Option<f64>> {
        let p = self.params.ptile;
        let n = sorted.len();
        let theta = util::percentile_sorted(sorted, p);

        let base = self.params.seed.unwrap_or_else(|| rand::rng().random());
        let mut boot: Vec<f64> = (0..self.params.nboot)
            .into_par_iter()
            .map(|resample| {
                let mut rng = StdRng::seed_from_u64(base.wrapping_add(resample as u64));
                let mut sample: Vec<f64> = (0..n).map(|_| sorted[rng.random_range(0..n)]).collect();
                sample.sort_by(|a, b| a.total_cmp(b));
                util::percentile_sorted(&sample, p)
            })
            .collect();
        boot.sort_by(|a, b| a.total_cmp(b));
        if boot.first() == boot.last() {
            return Ok(None);
        }

        let normal = Normal::new(0.0, 1.0).map_err(|e| Error::Numerical(e.to_string()))?;

        let below = boot.iter().filter(|&&t| t < theta).count() as f64;
        let equal = boot.iter().filter(|&&t| t == theta).count() as f64;
        let prop = (below + equal / 2.0) / boot.len() as f64;
        if prop <= 0.0 || prop >= 1.0 {
            return Ok(None);
        }
        let z0 = normal.inverse_cdf(prop);

        let jack: Vec<f64> = (0..n).map(|i| util::percentile_sorted_without(sorted, i, p)).collect();
        let jack_mean = jack.iter().sum::<f64>() / n as f64;
        let (num, den) = jack.iter().fold((0.0, 0.0), |(num, den), &t| {
            let d = jack_mean - t;
            (num + d * d * d, den + d * d)
        });
        let accel = if den > 0.0 { num / (6.0 * den.powf(1.5)) } else { 0.0 };

        let z = normal.inverse_cdf(1.0 - self.params.alpha / 2.0);
        let shifted = z0 + z;
        let q = normal.cdf(z0 + shifted / (1.0 - accel * shifted));
        if !q.is_finite() {
            return Ok(None);
        }
        let bound = util::percentile_sorted(&boot, q * 100.0);

        tracing::debug!(
            pairs = n,
            nboot = boot.len(),
            theta = %format!("{:.4}", theta),
            z0 = %format!("{:.4}", z0),
            accel = %format!("{:.4}", accel),
            bound = %format!("{:.4}", bound),
            "BCa cutoff estimated"
        );
        Ok(bound.is_finite().then_some(bound))
    }
}
