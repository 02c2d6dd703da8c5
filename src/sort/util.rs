use crate::error::{Error, Result};

/// Check that `data` is non-empty and every row shares one non-zero dimension.
pub(crate) fn check_dimensions(data: &[Vec<f32>]) -> Result<usize> {
    let first = data.first().ok_or(Error::EmptyInput)?;
    let d = first.len();
    if d == 0 {
        return Err(Error::InvalidParameter {
            name: "dimension",
            message: "must be at least 1",
        });
    }
    for point in data.iter().skip(1) {
        if point.len() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: point.len(),
            });
        }
    }
    Ok(d)
}

#[inline]
pub(crate) fn squared_euclidean(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum()
}

#[inline]
pub(crate) fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Mean of the rows selected by `members`.
pub(crate) fn centroid(data: &[Vec<f32>], members: &[usize], dim: usize) -> Vec<f64> {
    let mut acc = vec![0.0f64; dim];
    if members.is_empty() {
        return acc;
    }
    for &m in members {
        for (a, &x) in acc.iter_mut().zip(data[m].iter()) {
            *a += f64::from(x);
        }
    }
    let inv = 1.0 / members.len() as f64;
    for a in &mut acc {
        *a *= inv;
    }
    acc
}

#[inline]
pub(crate) fn squared_distance_to(point: &[f32], center: &[f64]) -> f64 {
    point
        .iter()
        .zip(center.iter())
        .map(|(x, c)| {
            let d = f64::from(*x) - c;
            d * d
        })
        .sum()
}

/// Data-derived kernel scale: `sqrt(trace(cov(data))) / divisor`.
///
/// A zero trace means every spike sits on the same point, so every distance is
/// zero and any positive scale gives the same kernel; 1.0 is returned then.
pub(crate) fn kernel_scale(data: &[Vec<f32>], divisor: f64) -> f64 {
    let n = data.len();
    if n < 2 {
        return 1.0;
    }
    let dim = data[0].len();
    let all: Vec<usize> = (0..n).collect();
    let mean = centroid(data, &all, dim);
    let total: f64 = data.iter().map(|p| squared_distance_to(p, &mean)).sum();
    // Unbiased per-dimension variances summed.
    let trace = total / (n - 1) as f64;
    let scale = trace.sqrt() / divisor;
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// Percentile of ascending-sorted data by linear interpolation at rank `p/100 * (n-1)`.
pub(crate) fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    percentile_by(sorted.len(), p, |i| sorted[i])
}

/// Percentile of `sorted` with the element at position `skip` left out.
///
/// Used by the jackknife: removing one order statistic only shifts indices, so
/// each leave-one-out percentile costs O(1).
pub(crate) fn percentile_sorted_without(sorted: &[f64], skip: usize, p: f64) -> f64 {
    percentile_by(sorted.len() - 1, p, |i| {
        if i < skip {
            sorted[i]
        } else {
            sorted[i + 1]
        }
    })
}

fn percentile_by(n: usize, p: f64, at: impl Fn(usize) -> f64) -> f64 {
    match n {
        0 => f64::NAN,
        1 => at(0),
        _ => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            at(lo) + (at(hi) - at(lo)) * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&s, 0.0), 1.0);
        assert_eq!(percentile_sorted(&s, 100.0), 5.0);
        assert_eq!(percentile_sorted(&s, 50.0), 3.0);
        assert!((percentile_sorted(&s, 90.0) - 4.6).abs() < 1e-12);
    }

    #[test]
    fn leave_one_out_matches_explicit_removal() {
        let s = [0.1, 0.2, 0.4, 0.8, 1.6, 3.2];
        for skip in 0..s.len() {
            let mut rest = s.to_vec();
            rest.remove(skip);
            for p in [0.0, 25.0, 50.0, 95.0, 100.0] {
                let a = percentile_sorted_without(&s, skip, p);
                let b = percentile_sorted(&rest, p);
                assert!((a - b).abs() < 1e-12, "skip={skip} p={p}");
            }
        }
    }

    #[test]
    fn kernel_scale_of_identical_points_is_one() {
        let data = vec![vec![2.0, 2.0]; 5];
        assert_eq!(kernel_scale(&data, 10.0), 1.0);
    }

    #[test]
    fn kernel_scale_matches_trace() {
        // Variance 1 in x only (unbiased over four points: values -1,-1,1,1 -> var 4/3).
        let data = vec![vec![-1.0, 0.0], vec![-1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]];
        let expected = (4.0f64 / 3.0).sqrt() / 10.0;
        assert!((kernel_scale(&data, 10.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn ragged_input_is_rejected() {
        let data = vec![vec![0.0, 0.0], vec![1.0]];
        assert!(matches!(
            check_dimensions(&data),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));
        assert!(matches!(check_dimensions(&[]), Err(Error::EmptyInput)));
    }
}
