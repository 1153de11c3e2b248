// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Negative log-likelihood of selection coefficients.

use crate::estimation::importance::{Evidence, ImportanceSampler};
use crate::model::transition::Transitions;
use crate::model::ModelContext;

/// Cost of a candidate parameter vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cost {
    Feasible(f64),
    /// The candidate violates the selection bound.
    Infeasible,
}

impl Cost {
    /// Numeric cost, with infeasible candidates mapped to +∞.
    pub fn saturate(self) -> f64 {
        match self {
            Cost::Feasible(cost) => cost,
            Cost::Infeasible => f64::INFINITY,
        }
    }

    pub fn is_feasible(&self) -> bool {
        matches!(self, Cost::Feasible(_))
    }
}

/// Whether every coefficient (and the implicit neutral tail) lies within
/// `[-s_max, s_max]`. NaN is never within bounds.
pub fn within_bounds(coefficients: &[f64], s_max: f64) -> bool {
    coefficients
        .iter()
        .chain(&[0.0])
        .all(|s| s.abs() <= s_max)
}

#[derive(Debug, new)]
pub struct LikelihoodObjective<'a> {
    ctx: &'a ModelContext,
    evidence: &'a Evidence,
}

impl<'a> LikelihoodObjective<'a> {
    /// Cost of free coefficients, one per selection epoch.
    pub fn evaluate(&self, coefficients: &[f64]) -> Cost {
        if !within_bounds(coefficients, self.ctx.s_max()) {
            debug!("coefficients {:?} out of bounds", coefficients);
            return Cost::Infeasible;
        }
        let selection = self.ctx.expand_selection(coefficients);
        let cost = self.evaluate_trajectory(&selection);
        debug!("coefficients {:?}: negative log-likelihood {}", coefficients, cost);
        Cost::Feasible(cost)
    }

    /// Negative log-likelihood of a selection coefficient per epoch.
    pub fn evaluate_trajectory(&self, selection: &[f64]) -> f64 {
        let transitions = Transitions::build(self.ctx, selection);
        -ImportanceSampler::new(self.ctx, self.evidence).ln_likelihood(&transitions)
    }

    /// [`evaluate`](Self::evaluate) at the optimizer boundary.
    pub fn neg_log_likelihood(&self, coefficients: &[f64]) -> f64 {
        self.evaluate(coefficients).saturate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    use crate::data::ancient::AncientSamples;
    use crate::data::genealogy::Genealogies;
    use crate::model::tests::context;

    #[test]
    fn test_within_bounds() {
        assert!(within_bounds(&[0.1, -0.1], 0.1));
        assert!(!within_bounds(&[0.05, -0.11], 0.1));
        assert!(!within_bounds(&[f64::NAN], 0.1));
        assert!(within_bounds(&[], 0.1));
    }

    #[test]
    fn test_infeasible_saturates() {
        assert_eq!(Cost::Infeasible.saturate(), f64::INFINITY);
        assert_eq!(Cost::Feasible(3.5).saturate(), 3.5);
    }

    #[test]
    fn test_out_of_bounds_is_infeasible() {
        let ctx = context(30.0, 12, 1000.0);
        let genealogies =
            Genealogies::from_sampled_times(&array![[2.5, 7.0]], &array![[4.0]], 0, 1).unwrap();
        let evidence = Evidence::prepare(&ctx, &genealogies, &AncientSamples::empty());
        let objective = LikelihoodObjective::new(&ctx, &evidence);

        assert_eq!(objective.evaluate(&[0.2]), Cost::Infeasible);
        assert_eq!(objective.neg_log_likelihood(&[-0.5]), f64::INFINITY);
        let cost = objective.evaluate(&[0.05]);
        assert!(cost.is_feasible());
        assert!(cost.saturate().is_finite());
    }
}
