// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Posterior allele frequency trajectory at given selection coefficients.

use anyhow::Result;
use ndarray::{Array2, Axis};

use crate::errors::Error;
use crate::estimation::importance::{Evidence, ImportanceSampler};
use crate::estimation::objective;
use crate::model::transition::Transitions;
use crate::model::ModelContext;

/// Log posterior of the frequency bins (rows) at every epoch (columns).
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct Posterior {
    #[getset(get = "pub")]
    ln_probs: Array2<f64>,
    /// Log-likelihood of the evidence at the reconstructed trajectory.
    #[getset(get_copy = "pub")]
    ln_likelihood: f64,
}

impl Posterior {
    /// Posterior mean frequency at every epoch.
    pub fn expected_frequencies(&self, freqs: &[f64]) -> Vec<f64> {
        self.ln_probs
            .axis_iter(Axis(1))
            .map(|column| {
                column
                    .iter()
                    .zip(freqs)
                    .map(|(ln_p, x)| ln_p.exp() * x)
                    .sum()
            })
            .collect()
    }

    pub fn into_ln_probs(self) -> Array2<f64> {
        self.ln_probs
    }
}

#[derive(Debug, new)]
pub struct TrajectoryReconstructor<'a> {
    ctx: &'a ModelContext,
    evidence: &'a Evidence,
}

impl<'a> TrajectoryReconstructor<'a> {
    pub fn reconstruct(&self, coefficients: &[f64]) -> Result<Posterior> {
        let s_max = self.ctx.s_max();
        if !objective::within_bounds(coefficients, s_max) {
            let (epoch, value) = coefficients
                .iter()
                .copied()
                .enumerate()
                .find(|(_, s)| !(s.abs() <= s_max))
                .unwrap_or((0, f64::NAN));
            warn!("selection coefficient exceeds bounds, consider raising --s-max");
            return Err(Error::BoundViolation {
                epoch,
                value,
                s_max,
            }
            .into());
        }

        if !self.evidence.informative() {
            info!("no evidence available, reporting the flat prior");
            let f = self.ctx.n_freqs();
            return Ok(Posterior {
                ln_probs: Array2::from_elem((f, self.ctx.n_epochs()), -(f as f64).ln()),
                ln_likelihood: 0.0,
            });
        }

        let transitions = Transitions::build(self.ctx, &self.ctx.expand_selection(coefficients));
        let (ln_likelihood, ln_probs) =
            ImportanceSampler::new(self.ctx, self.evidence).posterior(&transitions);
        Ok(Posterior {
            ln_probs,
            ln_likelihood,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use crate::data::ancient::AncientSamples;
    use crate::data::genealogy::Genealogies;
    use crate::model::hmm;
    use crate::model::tests::context;

    #[test]
    fn test_flat_posterior() {
        let ctx = context(20.0, 10, 1000.0);
        let evidence = Evidence::prepare(&ctx, &Genealogies::NoData, &AncientSamples::empty());
        let posterior = TrajectoryReconstructor::new(&ctx, &evidence)
            .reconstruct(&[0.03])
            .unwrap();
        assert_eq!(posterior.ln_probs().shape(), &[10, 20]);
        assert!(posterior
            .ln_probs()
            .iter()
            .all(|p| *p == -(10f64).ln()));
    }

    #[test]
    fn test_bound_violation() {
        let ctx = context(20.0, 10, 1000.0);
        let evidence = Evidence::prepare(&ctx, &Genealogies::NoData, &AncientSamples::empty());
        let err = TrajectoryReconstructor::new(&ctx, &evidence)
            .reconstruct(&[0.3])
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::BoundViolation {
                epoch: 0,
                value: 0.3,
                s_max: 0.1
            })
        );
    }

    #[test]
    fn test_ancient_only_posterior() {
        let ctx = context(20.0, 12, 1000.0);
        // diploid samples, homozygous derived at age 5, heterozygous at age 15
        let ancient = AncientSamples::new(array![
            [5.0, f64::NEG_INFINITY, f64::NEG_INFINITY, 0.0],
            [15.0, f64::NEG_INFINITY, 0.0, f64::NEG_INFINITY]
        ])
        .unwrap();
        let evidence = Evidence::prepare(&ctx, &Genealogies::NoData, &ancient);
        let posterior = TrajectoryReconstructor::new(&ctx, &evidence)
            .reconstruct(&[0.0])
            .unwrap();

        assert_eq!(posterior.ln_probs().shape(), &[12, 20]);
        assert!(posterior.ln_likelihood().is_finite());
        for total in hmm::column_totals(posterior.ln_probs()) {
            assert_abs_diff_eq!(total, 0.0, epsilon = 1e-9);
        }
        let expected = posterior.expected_frequencies(ctx.frequency_grid().freqs());
        assert_eq!(expected.len(), 20);
        // the homozygous derived sample pulls the frequency up
        assert!(expected[6] > 0.5);
    }
}
