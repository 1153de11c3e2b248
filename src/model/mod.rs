// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Hidden Markov model over a discretized allele frequency.
//!
//! Everything that stays fixed during a run (grids, population sizes, normal
//! lookup tables, selection epochs and flags) lives in a [`ModelContext`],
//! which is passed explicitly to the transition and emission models and to
//! the HMM recursions.

pub mod emission;
pub mod grid;
pub mod hmm;
pub mod tables;
pub mod transition;

use self::grid::{Demography, FrequencyGrid, SelectionEpochs, TimeGrid};
use self::tables::NormalTables;

/// Invariant state of a run.
#[derive(Debug, Clone, Builder, Getters, CopyGetters)]
#[builder(pattern = "owned", build_fn(validate = "Self::validate"))]
pub struct ModelContext {
    #[getset(get = "pub")]
    time_grid: TimeGrid,
    #[getset(get = "pub")]
    frequency_grid: FrequencyGrid,
    #[getset(get = "pub")]
    demography: Demography,
    #[getset(get = "pub")]
    tables: NormalTables,
    #[getset(get = "pub")]
    selection_epochs: SelectionEpochs,
    /// Dominance coefficient of the derived allele.
    #[builder(default = "0.5")]
    #[getset(get_copy = "pub")]
    dominance: f64,
    /// Bound on the absolute value of every selection coefficient.
    #[builder(default = "0.1")]
    #[getset(get_copy = "pub")]
    s_max: f64,
    /// Present-day frequency of the derived allele, if known.
    #[builder(default)]
    #[getset(get_copy = "pub")]
    current_freq: Option<f64>,
}

impl ModelContextBuilder {
    fn validate(&self) -> Result<(), String> {
        if let (Some(grid), Some(demography)) = (&self.time_grid, &self.demography) {
            if grid.len() != demography.sizes().len() {
                return Err(format!(
                    "population sizes cover {} epochs but the time grid has {}",
                    demography.sizes().len(),
                    grid.len()
                ));
            }
        }
        if let Some(h) = self.dominance {
            if !h.is_finite() {
                return Err(format!("dominance coefficient has to be finite, found {}", h));
            }
        }
        if let Some(s_max) = self.s_max {
            if !(s_max > 0.0) {
                return Err(format!("--s-max has to be positive, found {}", s_max));
            }
        }
        if let Some(Some(x)) = self.current_freq {
            if !(0.0..=1.0).contains(&x) {
                return Err(format!("current frequency has to be within [0, 1], found {}", x));
            }
        }
        Ok(())
    }
}

impl ModelContext {
    /// Number of epochs (T).
    pub fn n_epochs(&self) -> usize {
        self.time_grid.len()
    }

    /// Number of frequency bins (F).
    pub fn n_freqs(&self) -> usize {
        self.frequency_grid.len()
    }

    /// Selection coefficient of every epoch for the free coefficients `s`.
    pub fn expand_selection(&self, s: &[f64]) -> Vec<f64> {
        self.selection_epochs.expand(s, &self.time_grid)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Small context for unit tests: constant size, coarse frequency grid.
    pub(crate) fn context(cutoff: f64, n_freqs: usize, size: f64) -> ModelContext {
        let time_grid = TimeGrid::new(cutoff).unwrap();
        ModelContextBuilder::default()
            .demography(Demography::constant(size, &time_grid).unwrap())
            .frequency_grid(FrequencyGrid::from_beta_quantiles(n_freqs, size).unwrap())
            .selection_epochs(SelectionEpochs::single(cutoff).unwrap())
            .tables(NormalTables::standard())
            .time_grid(time_grid)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let ctx = context(50.0, 10, 1000.0);
        assert_eq!(ctx.dominance(), 0.5);
        assert_eq!(ctx.s_max(), 0.1);
        assert_eq!(ctx.current_freq(), None);
        assert_eq!(ctx.n_epochs(), 50);
        assert_eq!(ctx.n_freqs(), 10);
        assert_eq!(ctx.expand_selection(&[0.02]), vec![0.02; 50]);
    }

    #[test]
    fn test_builder_validation() {
        let time_grid = TimeGrid::new(50.0).unwrap();
        let other_grid = TimeGrid::new(20.0).unwrap();
        let result = ModelContextBuilder::default()
            .demography(Demography::constant(1000.0, &other_grid).unwrap())
            .frequency_grid(FrequencyGrid::from_beta_quantiles(10, 1000.0).unwrap())
            .selection_epochs(SelectionEpochs::single(50.0).unwrap())
            .tables(NormalTables::generate(5.0, 0.1))
            .time_grid(time_grid)
            .build();
        assert!(result.is_err());
    }
}
