// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Importance sampling over sampled genealogies.
//!
//! Genealogies are drawn under a model without selection. Each sample is
//! reweighted by the ratio of its likelihood under the selection trajectory
//! to its density under the neutral proposal. With a single sample, its
//! likelihood is used as is.

use itertools::Itertools;
use ndarray::Array2;
use rayon::prelude::*;

use crate::data::ancient::AncientSamples;
use crate::data::genealogy::{Genealogies, LineageTimes};
use crate::model::emission::{EmissionModel, StepEvents};
use crate::model::hmm::{self, Hmm};
use crate::model::transition::Transitions;
use crate::model::ModelContext;
use crate::utils;

/// Log density of a sampled genealogy under the neutral coalescent with the
/// population size history of `ctx`, pooling derived and ancestral lineages.
pub fn ln_proposal_density(ctx: &ModelContext, sample: &LineageTimes) -> f64 {
    let grid = ctx.time_grid();
    let pooled = sample
        .derived()
        .iter()
        .chain(sample.ancestral())
        .copied()
        .sorted_by(|a, b| a.total_cmp(b))
        .collect_vec();
    let events = StepEvents::new(
        &pooled,
        sample.derived_lineages() + sample.ancestral_lineages(),
        grid,
    );
    (0..grid.n_steps())
        .map(|k| events.ln_density(k, 2.0 * ctx.demography().size(k), grid))
        .sum()
}

/// Selection-independent evidence of one sampled genealogy (or of the
/// ancient samples alone).
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct SampleEvidence {
    #[getset(get = "pub")]
    emissions: EmissionModel,
    /// Log density under the proposal distribution.
    #[getset(get_copy = "pub")]
    ln_proposal: f64,
}

/// Evidence of a run, prepared once before optimization.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct Evidence {
    #[getset(get = "pub")]
    samples: Vec<SampleEvidence>,
    /// Whether coalescence times are available.
    #[getset(get_copy = "pub")]
    coalescences: bool,
    /// Whether there is any evidence at all.
    #[getset(get_copy = "pub")]
    informative: bool,
}

impl Evidence {
    pub fn prepare(
        ctx: &ModelContext,
        genealogies: &Genealogies,
        ancient: &AncientSamples,
    ) -> Self {
        let samples = genealogies.samples();
        let coalescences = !samples.is_empty();
        let samples = if coalescences {
            samples
                .par_iter()
                .map(|sample| SampleEvidence {
                    emissions: EmissionModel::new(ctx, Some(sample), ancient),
                    ln_proposal: ln_proposal_density(ctx, sample),
                })
                .collect()
        } else {
            vec![SampleEvidence {
                emissions: EmissionModel::new(ctx, None, ancient),
                ln_proposal: 0.0,
            }]
        };
        debug!("prepared evidence of {} sample(s)", samples.len());

        Evidence {
            samples,
            coalescences,
            informative: coalescences || !ancient.is_empty() || ctx.current_freq().is_some(),
        }
    }

    /// Number of importance samples (at least 1).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_importance_sampling(&self) -> bool {
        self.samples.len() > 1
    }
}

/// Result of the HMM on one sample.
#[derive(Debug, Clone, new)]
pub struct SampleOutcome {
    pub ln_likelihood: f64,
    pub ln_proposal: f64,
    /// Unnormalized log posterior (F × T), only when reconstructing.
    pub joint: Option<Array2<f64>>,
}

impl SampleOutcome {
    /// Log importance weight.
    pub fn ln_weight(&self) -> f64 {
        self.ln_likelihood - self.ln_proposal
    }
}

/// Runs the HMM on every sample in parallel and combines the results.
#[derive(Debug, new)]
pub struct ImportanceSampler<'a> {
    ctx: &'a ModelContext,
    evidence: &'a Evidence,
}

impl<'a> ImportanceSampler<'a> {
    fn outcomes(&self, transitions: &Transitions, with_posterior: bool) -> Vec<SampleOutcome> {
        let prior = hmm::present_prior(self.ctx, self.evidence.coalescences());
        self.evidence
            .samples()
            .par_iter()
            .map(|sample| {
                let model = Hmm::new(transitions, sample.emissions());
                let backward = model.backward(prior.view());
                let joint = if with_posterior {
                    Some(hmm::ln_joint(prior.view(), &model.forward(), &backward))
                } else {
                    None
                };
                SampleOutcome::new(backward.log_likelihood(), sample.ln_proposal(), joint)
            })
            .collect()
    }

    /// Combined log-likelihood of the selection trajectory behind
    /// `transitions`.
    pub fn ln_likelihood(&self, transitions: &Transitions) -> f64 {
        combine_ln_likelihood(&self.outcomes(transitions, false))
    }

    /// Combined log-likelihood and column-normalized log posterior (F × T).
    pub fn posterior(&self, transitions: &Transitions) -> (f64, Array2<f64>) {
        let outcomes = self.outcomes(transitions, true);
        (
            combine_ln_likelihood(&outcomes),
            combine_posteriors(&outcomes),
        )
    }
}

/// `ln(1/M Σ_i L_i / L0_i)` for M > 1 samples, the plain log-likelihood for a
/// single one.
pub fn combine_ln_likelihood(outcomes: &[SampleOutcome]) -> f64 {
    match outcomes {
        [] => f64::NEG_INFINITY,
        [single] => single.ln_likelihood,
        _ => {
            let weights = outcomes.iter().map(SampleOutcome::ln_weight).collect_vec();
            utils::ln_sum_exp(&weights) - (outcomes.len() as f64).ln()
        }
    }
}

/// Weight every sample's unnormalized posterior by its importance weight,
/// sum over samples and normalize every time column.
///
/// # Panics
///
/// If an outcome was computed without its posterior.
pub fn combine_posteriors(outcomes: &[SampleOutcome]) -> Array2<f64> {
    let joints = outcomes
        .iter()
        .map(|outcome| {
            outcome
                .joint
                .as_ref()
                .expect("bug: posterior requested from outcome without joint matrix")
        })
        .collect_vec();

    let mut posterior = if outcomes.len() == 1 {
        joints[0].clone()
    } else {
        let weights = outcomes.iter().map(SampleOutcome::ln_weight).collect_vec();
        let mut combined = Array2::from_elem(joints[0].raw_dim(), 0.0);
        let mut terms = vec![0.0; joints.len()];
        for ((f, t), value) in combined.indexed_iter_mut() {
            for (term, (joint, w)) in terms.iter_mut().zip(joints.iter().zip(&weights)) {
                *term = w + joint[[f, t]];
            }
            *value = utils::ln_sum_exp(&terms);
        }
        combined
    };
    utils::normalize_columns(&mut posterior);
    posterior
}
