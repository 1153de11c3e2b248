// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Transition probabilities between frequency bins over one generation into
//! the past, from a Gaussian approximation of the Wright-Fisher diffusion
//! with selection and dominance.

use bio::stats::LogProb;
use ndarray::Array2;

use crate::model::tables::NormalTables;
use crate::model::ModelContext;
use crate::utils;

/// ln (Φ(hi) - Φ(lo)) for `lo <= hi`, evaluated on the side of the
/// distribution where the difference does not cancel.
fn ln_normal_mass(lo: f64, hi: f64, tables: &NormalTables) -> f64 {
    if hi <= 0.0 {
        let (a, b) = (tables.ln_cdf(hi), tables.ln_cdf(lo));
        a + *LogProb((b - a).min(0.0)).ln_one_minus_exp()
    } else if lo >= 0.0 {
        let (a, b) = (tables.ln_sf(lo), tables.ln_sf(hi));
        a + *LogProb((b - a).min(0.0)).ln_one_minus_exp()
    } else {
        let outside = LogProb(tables.ln_cdf(lo)).ln_add_exp(LogProb(tables.ln_sf(hi)));
        *LogProb((*outside).min(0.0)).ln_one_minus_exp()
    }
}

/// Expected frequency one generation into the past, given frequency `x`
/// now.
pub fn backward_mean(x: f64, s: f64, h: f64) -> f64 {
    x - s * x * (1.0 - x) * (x + h * (1.0 - 2.0 * x))
}

/// Row-stochastic log transition matrix (F × F) for selection `s`, dominance
/// `h` and population size `n`. Mass below the first and above the last bin
/// edge is absorbed by the boundary bins.
pub fn transition_matrix(
    freqs: &[f64],
    edges: &[f64],
    s: f64,
    h: f64,
    n: f64,
    tables: &NormalTables,
) -> Array2<f64> {
    let f = freqs.len();
    debug_assert_eq!(edges.len() + 1, f);

    let mut matrix = Array2::from_elem((f, f), f64::NEG_INFINITY);
    let mut z = vec![0.0; edges.len()];
    for (i, &x) in freqs.iter().enumerate() {
        let mu = backward_mean(x, s, h);
        let sigma = (x * (1.0 - x) / (2.0 * n)).sqrt();
        for (zj, edge) in z.iter_mut().zip(edges) {
            *zj = (edge - mu) / sigma;
        }

        let mut row = matrix.row_mut(i);
        row[0] = tables.ln_cdf(z[0]);
        row[f - 1] = tables.ln_sf(z[f - 2]);
        for j in 1..f - 1 {
            row[j] = ln_normal_mass(z[j - 1], z[j], tables);
        }

        let total = utils::ln_sum_exp(&row.to_vec());
        if total.is_finite() {
            row.mapv_inplace(|p| p - total);
        }
    }
    matrix
}

/// Transition matrices for every step of the time grid. Consecutive steps
/// with the same population size and selection coefficient share one matrix.
#[derive(Debug, Clone)]
pub struct Transitions {
    matrices: Vec<Array2<f64>>,
    step_matrix: Vec<usize>,
}

impl Transitions {
    /// `selection` holds one coefficient per epoch of the time grid; step `k`
    /// uses the selection coefficient and population size of epoch `k`.
    pub fn build(ctx: &ModelContext, selection: &[f64]) -> Self {
        let freqs = ctx.frequency_grid().freqs();
        let edges = ctx.frequency_grid().edges();
        let n_steps = ctx.time_grid().n_steps();

        let mut matrices = Vec::new();
        let mut step_matrix = Vec::with_capacity(n_steps);
        let mut last = None;
        for k in 0..n_steps {
            let key = (ctx.demography().size(k), selection[k]);
            if last != Some(key) {
                matrices.push(transition_matrix(
                    freqs,
                    &edges,
                    key.1,
                    ctx.dominance(),
                    key.0,
                    ctx.tables(),
                ));
                last = Some(key);
            }
            step_matrix.push(matrices.len() - 1);
        }

        Transitions {
            matrices,
            step_matrix,
        }
    }

    /// Log transition matrix of step `k`, rows indexing the frequency at
    /// epoch `k`, columns the frequency at epoch `k + 1`.
    pub fn step(&self, k: usize) -> &Array2<f64> {
        &self.matrices[self.step_matrix[k]]
    }

    pub fn n_steps(&self) -> usize {
        self.step_matrix.len()
    }

    /// Number of distinct matrices.
    pub fn n_matrices(&self) -> usize {
        self.matrices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use ndarray::Axis;

    use crate::model::grid::FrequencyGrid;
    use crate::model::tests::context;

    #[test]
    fn test_rows_are_normalized() {
        let tables = NormalTables::standard();
        let grid = FrequencyGrid::from_beta_quantiles(40, 10000.0).unwrap();
        let matrix = transition_matrix(grid.freqs(), &grid.edges(), 0.05, 0.5, 10000.0, &tables);
        for row in matrix.axis_iter(Axis(0)) {
            assert_abs_diff_eq!(utils::ln_sum_exp(&row.to_vec()), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_drift_is_local() {
        let tables = NormalTables::standard();
        let grid = FrequencyGrid::from_beta_quantiles(40, 10000.0).unwrap();
        let matrix = transition_matrix(grid.freqs(), &grid.edges(), 0.0, 0.5, 10000.0, &tables);
        // with a large population, frequencies barely move in one generation
        for i in 0..grid.len() {
            assert!(matrix[[i, i]] > (0.5f64).ln());
        }
    }

    #[test]
    fn test_selection_shifts_mass() {
        let tables = NormalTables::standard();
        let grid = FrequencyGrid::from_beta_quantiles(20, 100.0).unwrap();
        let neutral = transition_matrix(grid.freqs(), &grid.edges(), 0.0, 0.5, 100.0, &tables);
        let positive = transition_matrix(grid.freqs(), &grid.edges(), 0.1, 0.5, 100.0, &tables);
        // positive selection now means a lower frequency in the past
        let i = 10;
        assert!(positive[[i, 0]] > neutral[[i, 0]]);
        assert!(positive[[i, 19]] < neutral[[i, 19]]);
    }

    #[test]
    fn test_backward_mean() {
        assert_eq!(backward_mean(0.3, 0.0, 0.5), 0.3);
        // additive selection: x - s x (1 - x) / 2
        assert_abs_diff_eq!(backward_mean(0.5, 0.1, 0.5), 0.5 - 0.1 * 0.25 * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_matrices_are_shared() {
        let ctx = context(20.0, 10, 1000.0);
        let transitions = Transitions::build(&ctx, &ctx.expand_selection(&[0.01]));
        assert_eq!(transitions.n_steps(), 19);
        assert_eq!(transitions.n_matrices(), 1);

        let mut selection = vec![0.0; 20];
        selection[5] = 0.02;
        let transitions = Transitions::build(&ctx, &selection);
        assert_eq!(transitions.n_matrices(), 3);
        assert_eq!(transitions.step(4), transitions.step(0));
        assert_ne!(transitions.step(5), transitions.step(6));
    }
}
