// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Maximum likelihood estimation of selection coefficients and the
//! posterior frequency trajectory at the estimate.

pub mod importance;
pub mod nelder_mead;
pub mod objective;
pub mod trajectory;

use anyhow::Result;

use self::importance::Evidence;
use self::nelder_mead::{initial_simplex, NelderMead, NelderMeadOptions};
use self::objective::LikelihoodObjective;
use self::trajectory::{Posterior, TrajectoryReconstructor};
use crate::model::ModelContext;

#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct SelectionEstimate {
    /// Maximum likelihood selection coefficient per selection epoch.
    #[getset(get = "pub")]
    coefficients: Vec<f64>,
    #[getset(get_copy = "pub")]
    neg_log_likelihood: f64,
    /// Negative log-likelihood without selection.
    #[getset(get_copy = "pub")]
    neutral_neg_log_likelihood: f64,
    #[getset(get_copy = "pub")]
    converged: bool,
    #[getset(get_copy = "pub")]
    evaluations: usize,
    #[getset(get = "pub")]
    posterior: Posterior,
}

impl SelectionEstimate {
    /// Log-likelihood ratio of the estimate against neutrality.
    pub fn ln_likelihood_ratio(&self) -> f64 {
        -self.neg_log_likelihood + self.neutral_neg_log_likelihood
    }
}

/// Maximize the likelihood over the selection coefficients, starting from
/// neutrality, and reconstruct the frequency trajectory at the maximum.
pub fn estimate_selection(
    ctx: &ModelContext,
    evidence: &Evidence,
    options: &NelderMeadOptions,
) -> Result<SelectionEstimate> {
    let dim = ctx.selection_epochs().dimension();
    let objective = LikelihoodObjective::new(ctx, evidence);

    let neutral = vec![0.0; dim];
    let neutral_neg_log_likelihood = objective.neg_log_likelihood(&neutral);
    debug!("neutral negative log-likelihood: {}", neutral_neg_log_likelihood);

    info!("Optimizing likelihood surface using Nelder-Mead.");
    if evidence.is_importance_sampling() {
        info!(
            "Importance sampling with M = {} sampled genealogies.",
            evidence.len()
        );
    }
    let minimum = NelderMead::new(*options).minimize(
        |s| objective.neg_log_likelihood(s),
        initial_simplex(dim),
    );
    if !minimum.converged() {
        warn!(
            "Nelder-Mead did not converge within {} iterations ({} evaluations), reporting the best point found.",
            minimum.iterations(),
            minimum.evaluations()
        );
    }

    let (coefficients, neg_log_likelihood) = if minimum.value() <= neutral_neg_log_likelihood {
        (minimum.x().clone(), minimum.value())
    } else {
        info!("No point of the simplex search beats neutrality, reporting s = 0.");
        (neutral, neutral_neg_log_likelihood)
    };

    info!("Reconstructing allele frequency trajectory.");
    let posterior = TrajectoryReconstructor::new(ctx, evidence).reconstruct(&coefficients)?;

    Ok(SelectionEstimate {
        coefficients,
        neg_log_likelihood,
        neutral_neg_log_likelihood,
        converged: minimum.converged(),
        evaluations: minimum.evaluations(),
        posterior,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    use crate::data::ancient::AncientSamples;
    use crate::data::genealogy::Genealogies;
    use crate::model::tests::context;

    #[test]
    fn test_estimate_selection() {
        let ctx = context(40.0, 12, 1000.0);
        let genealogies = Genealogies::from_sampled_times(
            &array![[2.0, 5.0, 9.0], [3.0, 4.5, 12.0]],
            &array![[6.0, 30.0], [7.5, 25.0]],
            0,
            1,
        )
        .unwrap();
        let evidence = Evidence::prepare(&ctx, &genealogies, &AncientSamples::empty());
        let estimate = estimate_selection(&ctx, &evidence, &NelderMeadOptions::default()).unwrap();

        assert_eq!(estimate.coefficients().len(), 1);
        assert!(estimate.coefficients()[0].abs() <= 0.1);
        assert!(estimate.neg_log_likelihood().is_finite());
        assert!(estimate.ln_likelihood_ratio() >= 0.0);
        assert_eq!(estimate.posterior().ln_probs().shape(), &[12, 40]);
    }
}
