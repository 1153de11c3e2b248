// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use bio::stats::LogProb;
use ndarray::{Array2, Axis};

/// Log-sum-exp of plain log-space values.
pub fn ln_sum_exp(values: &[f64]) -> f64 {
    let probs: Vec<LogProb> = values.iter().map(|v| LogProb(*v)).collect();
    *LogProb::ln_sum_exp(&probs)
}

/// Bin index of `x` with respect to increasing `bins`, following the
/// convention `bins[i - 1] <= x < bins[i]`. Values below the first boundary
/// yield 0, values at or above the last boundary yield `bins.len()`.
pub fn digitize(x: f64, bins: &[f64]) -> usize {
    bins.partition_point(|b| *b <= x)
}

/// Piecewise linear interpolation of `(xp, fp)` at `x`. Outside of the
/// support, the boundary values are returned.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert_eq!(xp.len(), fp.len());
    let last = xp.len() - 1;
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }
    // first index with xp[i] > x, at least 1 because x > xp[0]
    let i = xp.partition_point(|v| *v <= x);
    let (x0, x1) = (xp[i - 1], xp[i]);
    let (f0, f1) = (fp[i - 1], fp[i]);
    if f0 == f1 {
        // avoids NaN for infinite plateaus
        return f0;
    }
    f0 + (f1 - f0) * (x - x0) / (x1 - x0)
}

/// Index of the value closest to `x`. Ties resolve to the lower index.
pub fn nearest_index(values: &[f64], x: f64) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, dist), (i, v)| {
            let d = (v - x).abs();
            if d < dist {
                (i, d)
            } else {
                (best, dist)
            }
        })
        .0
}

/// Normalize every column of a log-space matrix so that it sums to one in
/// probability space. Columns without any mass are left untouched.
pub fn normalize_columns(matrix: &mut Array2<f64>) {
    for mut column in matrix.axis_iter_mut(Axis(1)) {
        let total = ln_sum_exp(&column.to_vec());
        if total.is_finite() {
            column.mapv_inplace(|v| v - total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_ln_sum_exp() {
        assert_relative_eq!(ln_sum_exp(&[0.5f64.ln(), 0.5f64.ln()]), 0.0, epsilon = 1e-12);
        assert_eq!(ln_sum_exp(&[]), f64::NEG_INFINITY);
        assert_eq!(
            ln_sum_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]),
            f64::NEG_INFINITY
        );
        assert_relative_eq!(ln_sum_exp(&[-1000.0, -1000.0]), -1000.0 + 2f64.ln());
    }

    #[test]
    fn test_digitize() {
        let bins = [0.0, 100.0, 200.0];
        assert_eq!(digitize(-1.0, &bins), 0);
        assert_eq!(digitize(0.0, &bins), 1);
        assert_eq!(digitize(99.9, &bins), 1);
        assert_eq!(digitize(100.0, &bins), 2);
        assert_eq!(digitize(200.0, &bins), 3);
        assert_eq!(digitize(1e6, &bins), 3);
    }

    #[test]
    fn test_interp() {
        let xp = [0.0, 1.0, 2.0];
        let fp = [0.0, 10.0, 30.0];
        assert_relative_eq!(interp(0.5, &xp, &fp), 5.0);
        assert_relative_eq!(interp(1.5, &xp, &fp), 20.0);
        assert_relative_eq!(interp(1.0, &xp, &fp), 10.0);
        assert_eq!(interp(-3.0, &xp, &fp), 0.0);
        assert_eq!(interp(3.0, &xp, &fp), 30.0);
    }

    #[test]
    fn test_nearest_index() {
        let values = [0.1, 0.3, 0.5, 0.9];
        assert_eq!(nearest_index(&values, 0.0), 0);
        assert_eq!(nearest_index(&values, 0.35), 1);
        assert_eq!(nearest_index(&values, 0.8), 3);
    }

    #[test]
    fn test_normalize_columns() {
        let mut m = array![[0.0, f64::NEG_INFINITY], [0.0, -3.0]];
        normalize_columns(&mut m);
        for column in m.columns() {
            assert_relative_eq!(ln_sum_exp(&column.to_vec()), 0.0, epsilon = 1e-12);
        }
        assert_relative_eq!(m[[0, 0]], 0.5f64.ln(), epsilon = 1e-12);
        assert_eq!(m[[0, 1]], f64::NEG_INFINITY);
    }
}
