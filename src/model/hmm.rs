// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Log-space forward and backward recursions over the frequency bins.
//!
//! Both matrices have one row per epoch (T) and one column per frequency bin
//! (F). The backward recursion starts from the present-day prior and moves
//! into the past:
//!
//! ```text
//! B[k, j] = e_k[j] + ln Σ_i exp(B[k - 1, i] + P_k[i, j]),   B[-1] = prior
//! ```
//!
//! so that `B[k]` is the joint probability of the evidence up to step `k` and
//! the frequency at epoch `k + 1`. The last row is the open boundary beyond
//! the time cutoff. The forward recursion starts at the cutoff and moves
//! towards the present:
//!
//! ```text
//! F[k, i] = ln Σ_j exp(F[k + 1, j] + e_k[j] + P_k[i, j]),   F[T - 1] = 0
//! ```

use bio::stats::LogProb;
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::model::emission::EmissionModel;
use crate::model::transition::Transitions;
use crate::model::ModelContext;
use crate::utils;

/// Log prior of the present-day frequency. It is concentrated on the bin
/// nearest to a known current frequency unless coalescence times are
/// available, and flat otherwise.
pub fn present_prior(ctx: &ModelContext, has_coalescences: bool) -> Array1<f64> {
    let n = ctx.n_freqs();
    match ctx.current_freq() {
        Some(x) if !has_coalescences => {
            let mut prior = Array1::from_elem(n, f64::NEG_INFINITY);
            prior[ctx.frequency_grid().nearest(x)] = 0.0;
            prior
        }
        _ => Array1::from_elem(n, -(n as f64).ln()),
    }
}

fn sanitize(row: &mut [f64]) {
    for p in row.iter_mut().filter(|p| p.is_nan()) {
        *p = f64::NEG_INFINITY;
    }
}

/// Result of the backward recursion (T × F).
#[derive(Debug, Clone, PartialEq)]
pub struct BackwardMatrix(Array2<f64>);

impl BackwardMatrix {
    pub fn matrix(&self) -> &Array2<f64> {
        &self.0
    }

    /// Log-likelihood of all evidence, marginalized over the frequency at
    /// the time cutoff (row `T - 2`).
    pub fn log_likelihood(&self) -> f64 {
        let t = self.0.nrows();
        utils::ln_sum_exp(&self.0.row(t - 2).to_vec())
    }
}

/// Result of the forward recursion (T × F).
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardMatrix(Array2<f64>);

impl ForwardMatrix {
    pub fn matrix(&self) -> &Array2<f64> {
        &self.0
    }

    /// Log-likelihood of all evidence given the present-day `prior`. Equals
    /// [`BackwardMatrix::log_likelihood`] up to rounding.
    pub fn log_likelihood(&self, prior: ArrayView1<'_, f64>) -> f64 {
        utils::ln_sum_exp(&(&prior + &self.0.row(0)).to_vec())
    }
}

/// HMM of one sampled genealogy under a fixed selection trajectory.
#[derive(Debug, new)]
pub struct Hmm<'a> {
    transitions: &'a Transitions,
    emissions: &'a EmissionModel,
}

impl<'a> Hmm<'a> {
    fn n_freqs(&self) -> usize {
        self.emissions.ln_probs().ncols()
    }

    pub fn backward(&self, prior: ArrayView1<'_, f64>) -> BackwardMatrix {
        let n_steps = self.transitions.n_steps();
        let f = self.n_freqs();
        let mut matrix = Array2::<f64>::zeros((n_steps + 1, f));
        let mut terms = vec![LogProb::ln_zero(); f];
        let mut prev = prior.to_vec();

        for k in 0..n_steps {
            let transition = self.transitions.step(k);
            let emission = self.emissions.step(k);
            let mut current = vec![0.0; f];
            for (j, value) in current.iter_mut().enumerate() {
                for (i, term) in terms.iter_mut().enumerate() {
                    *term = LogProb(prev[i] + transition[[i, j]]);
                }
                *value = emission[j] + *LogProb::ln_sum_exp(&terms);
            }
            sanitize(&mut current);
            matrix
                .row_mut(k)
                .assign(&ArrayView1::from(current.as_slice()));
            prev = current;
        }

        BackwardMatrix(matrix)
    }

    pub fn forward(&self) -> ForwardMatrix {
        let n_steps = self.transitions.n_steps();
        let f = self.n_freqs();
        let mut matrix = Array2::<f64>::zeros((n_steps + 1, f));
        let mut terms = vec![LogProb::ln_zero(); f];

        for k in (0..n_steps).rev() {
            let transition = self.transitions.step(k);
            let next: Vec<f64> = matrix
                .row(k + 1)
                .iter()
                .zip(self.emissions.step(k))
                .map(|(alpha, e)| alpha + e)
                .collect();
            let mut current = vec![0.0; f];
            for (i, value) in current.iter_mut().enumerate() {
                for (j, term) in terms.iter_mut().enumerate() {
                    *term = LogProb(next[j] + transition[[i, j]]);
                }
                *value = *LogProb::ln_sum_exp(&terms);
            }
            sanitize(&mut current);
            matrix
                .row_mut(k)
                .assign(&ArrayView1::from(current.as_slice()));
        }

        ForwardMatrix(matrix)
    }
}

/// Unnormalized log posterior of the frequency at every epoch (F × T).
pub fn ln_joint(
    prior: ArrayView1<'_, f64>,
    forward: &ForwardMatrix,
    backward: &BackwardMatrix,
) -> Array2<f64> {
    let fwd = forward.matrix();
    let bwd = backward.matrix();
    let t = fwd.nrows();
    let mut joint = Array2::<f64>::zeros((prior.len(), t));
    joint.column_mut(0).assign(&(&prior + &fwd.row(0)));
    for k in 1..t {
        joint
            .column_mut(k)
            .assign(&(&fwd.row(k) + &bwd.row(k - 1)));
    }
    joint.mapv_inplace(|p| if p.is_nan() { f64::NEG_INFINITY } else { p });
    joint
}

/// Column-normalized log posterior of the frequency at every epoch (F × T).
pub fn ln_posterior(
    prior: ArrayView1<'_, f64>,
    forward: &ForwardMatrix,
    backward: &BackwardMatrix,
) -> Array2<f64> {
    let mut posterior = ln_joint(prior, forward, backward);
    utils::normalize_columns(&mut posterior);
    posterior
}

/// Sum over frequency bins of every column, in log space.
pub(crate) fn column_totals(matrix: &Array2<f64>) -> Vec<f64> {
    matrix
        .axis_iter(Axis(1))
        .map(|column| utils::ln_sum_exp(&column.to_vec()))
        .collect()
}
