//! Connection strength: interface energy normalized by cluster cohesion.
//!
//! With `En(i, j) = E(i, j) / (n_i n_j)` and the per-pair self-energy
//! `En(i, i) = E(i, i) / ((n_i² - n_i) / 2)`,
//!
//! ```text
//! J(i, j) = 2 En(i, j) / (En(i, i) + En(j, j))
//! ```
//!
//! Substitutions keep every live entry finite:
//! - `J(i, i) = 1` for every live cluster, including zero self-energy.
//! - A cluster with fewer than two spikes has no cohesion; the denominator then
//!   uses the other side only (`2 En(k, k)`).
//! - No usable cohesion on either side, a zero denominator, or any non-finite
//!   result gives `J(i, j) = 0`.
//!
//! Dead clusters have NaN rows.

use super::triangular::TriMatrix;

/// Connection-strength computation.
pub struct ConnectionStrength;

impl ConnectionStrength {
    /// Full matrix from `energy` and `sizes`; clusters with `live[i] == false` get NaN rows.
    pub fn compute(energy: &TriMatrix, sizes: &[usize], live: &[bool]) -> TriMatrix {
        let c = energy.dim();
        debug_assert_eq!(sizes.len(), c);
        debug_assert_eq!(live.len(), c);

        let cohesion: Vec<Option<f64>> = (0..c).map(|i| cohesion(energy, sizes, i)).collect();
        let mut strength = TriMatrix::filled(c, f64::NAN);
        for j in 0..c {
            if !live[j] {
                continue;
            }
            for i in 0..=j {
                if live[i] {
                    strength.set(i, j, pair_strength(energy, sizes, &cohesion, i, j));
                }
            }
        }
        strength
    }

    /// Recompute only row/column `i` of `strength`: O(C).
    pub fn update_row(strength: &mut TriMatrix, energy: &TriMatrix, sizes: &[usize], live: &[bool], i: usize) {
        let c = energy.dim();
        let cohesion: Vec<Option<f64>> = (0..c)
            .map(|k| if live[k] { cohesion(energy, sizes, k) } else { None })
            .collect();
        for k in 0..c {
            let value = if live[i] && live[k] {
                pair_strength(energy, sizes, &cohesion, i, k)
            } else {
                f64::NAN
            };
            strength.set(i, k, value);
        }
    }
}

/// Normalized self-energy, or `None` when undefined (fewer than two spikes).
fn cohesion(energy: &TriMatrix, sizes: &[usize], i: usize) -> Option<f64> {
    let n = sizes[i] as f64;
    if sizes[i] < 2 {
        return None;
    }
    let v = energy.get(i, i) / ((n * n - n) / 2.0);
    v.is_finite().then_some(v)
}

fn pair_strength(energy: &TriMatrix, sizes: &[usize], cohesion: &[Option<f64>], i: usize, j: usize) -> f64 {
    if i == j {
        return 1.0;
    }
    let denom = match (cohesion[i], cohesion[j]) {
        (Some(a), Some(b)) => a + b,
        (Some(a), None) | (None, Some(a)) => 2.0 * a,
        (None, None) => return 0.0,
    };
    let cross = energy.get(i, j) / (sizes[i] as f64 * sizes[j] as f64);
    let value = 2.0 * cross / denom;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
