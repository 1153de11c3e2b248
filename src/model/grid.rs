// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Discretization of time and allele frequency, the population size per
//! generation and the partition of time into selection epochs.

use anyhow::Result;
use itertools_num::linspace;
use statrs::distribution::{Beta, ContinuousCDF};

use crate::errors::Error;
use crate::utils;

/// Epochs in generations before present, strictly increasing and starting
/// at the present. Step `k` of the model spans `(epochs[k], epochs[k + 1]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    epochs: Vec<f64>,
}

impl TimeGrid {
    /// One epoch per generation: `0, 1, ..., ceil(cutoff) - 1`.
    pub fn new(cutoff: f64) -> Result<Self> {
        if !(cutoff.is_finite() && cutoff > 1.0) {
            return Err(Error::InvalidTimeGrid {
                msg: format!("time cutoff has to exceed 1 generation, found {}", cutoff),
            }
            .into());
        }
        let n = cutoff.ceil() as usize;
        Self::from_epochs((0..n).map(|e| e as f64).collect())
    }

    pub fn from_epochs(epochs: Vec<f64>) -> Result<Self> {
        if epochs.len() < 2 {
            return Err(Error::InvalidTimeGrid {
                msg: "at least two epochs are required".to_owned(),
            }
            .into());
        }
        if !(epochs[0] >= 0.0) || epochs.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(Error::InvalidTimeGrid {
                msg: "epochs have to be non-negative and strictly increasing".to_owned(),
            }
            .into());
        }
        Ok(TimeGrid { epochs })
    }

    pub fn epochs(&self) -> &[f64] {
        &self.epochs
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    /// Number of model steps, i.e. transitions between consecutive epochs.
    pub fn n_steps(&self) -> usize {
        self.epochs.len() - 1
    }

    pub fn cutoff(&self) -> f64 {
        self.epochs[self.epochs.len() - 1]
    }

    /// Step containing time `t`, i.e. the `k` with `epochs[k] < t <= epochs[k + 1]`.
    /// Times at or before the first epoch belong to step 0, times beyond the
    /// last epoch to no step.
    pub fn step_of(&self, t: f64) -> Option<usize> {
        if t > self.cutoff() || t.is_nan() {
            None
        } else {
            Some(
                self.epochs[1..]
                    .partition_point(|e| *e < t)
                    .min(self.n_steps() - 1),
            )
        }
    }
}

/// Allele frequencies serving as the hidden states, strictly increasing in (0, 1).
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyGrid {
    freqs: Vec<f64>,
}

impl FrequencyGrid {
    /// Quantiles of a Beta(1, 1) prior at `n_bins` equidistant probabilities
    /// between `1 / (2N)` and `1 - 1 / (2N)`, with `N` the present-day
    /// effective population size.
    pub fn from_beta_quantiles(n_bins: usize, population_size: f64) -> Result<Self> {
        if !(population_size > 1.0) {
            return Err(Error::InvalidFrequencyGrid {
                msg: format!(
                    "present-day population size has to exceed 1, found {}",
                    population_size
                ),
            }
            .into());
        }
        let c = 1.0 / (2.0 * population_size);
        let prior = Beta::new(1.0, 1.0)?;
        Self::from_frequencies(
            linspace(c, 1.0 - c, n_bins)
                .map(|q| prior.inverse_cdf(q))
                .collect(),
        )
    }

    pub fn from_frequencies(freqs: Vec<f64>) -> Result<Self> {
        if freqs.len() < 3 {
            return Err(Error::InvalidFrequencyGrid {
                msg: format!("at least 3 frequency bins are required, found {}", freqs.len()),
            }
            .into());
        }
        if freqs.iter().any(|x| !(*x > 0.0 && *x < 1.0))
            || freqs.windows(2).any(|w| !(w[0] < w[1]))
        {
            return Err(Error::InvalidFrequencyGrid {
                msg: "frequencies have to be strictly increasing within (0, 1)".to_owned(),
            }
            .into());
        }
        Ok(FrequencyGrid { freqs })
    }

    pub fn freqs(&self) -> &[f64] {
        &self.freqs
    }

    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    /// Index of the bin closest to frequency `x`.
    pub fn nearest(&self, x: f64) -> usize {
        utils::nearest_index(&self.freqs, x)
    }

    /// Boundaries between neighbouring bins (midpoints), `len() - 1` values.
    pub fn edges(&self) -> Vec<f64> {
        self.freqs.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }
}

/// Diploid effective population size for every epoch of a [`TimeGrid`].
#[derive(Debug, Clone, PartialEq)]
pub struct Demography {
    sizes: Vec<f64>,
}

impl Demography {
    pub fn new(sizes: Vec<f64>, grid: &TimeGrid) -> Result<Self> {
        if sizes.len() != grid.len() {
            return Err(Error::InvalidPopulationSize {
                msg: format!(
                    "{} population sizes given for {} epochs",
                    sizes.len(),
                    grid.len()
                ),
            }
            .into());
        }
        if let Some(n) = sizes.iter().find(|n| !(n.is_finite() && **n > 0.0)) {
            return Err(Error::InvalidPopulationSize {
                msg: format!("population sizes have to be positive, found {}", n),
            }
            .into());
        }
        Ok(Demography { sizes })
    }

    pub fn constant(size: f64, grid: &TimeGrid) -> Result<Self> {
        Self::new(vec![size; grid.len()], grid)
    }

    /// Piecewise constant sizes: `sizes[i]` applies from `boundaries[i]`
    /// on. Epochs before the first boundary take the first size, epochs past
    /// the available sizes the last one.
    pub fn piecewise(boundaries: &[f64], sizes: &[f64], grid: &TimeGrid) -> Result<Self> {
        if sizes.is_empty() {
            return Err(Error::InvalidPopulationSize {
                msg: "no population sizes given".to_owned(),
            }
            .into());
        }
        let per_epoch = grid
            .epochs()
            .iter()
            .map(|e| {
                let i = utils::digitize(*e, boundaries).max(1) - 1;
                sizes[i.min(sizes.len() - 1)]
            })
            .collect();
        Self::new(per_epoch, grid)
    }

    /// Every epoch's size multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Result<Self> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(Error::InvalidPopulationSize {
                msg: format!("scaling factor has to be positive, found {}", factor),
            }
            .into());
        }
        Ok(Demography {
            sizes: self.sizes.iter().map(|n| n * factor).collect(),
        })
    }

    pub fn sizes(&self) -> &[f64] {
        &self.sizes
    }

    pub fn size(&self, epoch: usize) -> f64 {
        self.sizes[epoch]
    }
}

/// Boundaries of the epochs with their own selection coefficient.
///
/// A vector of `len() - 1` coefficients parameterizes selection; time
/// before the first and at or after the last boundary is neutral.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEpochs {
    bins: Vec<f64>,
}

impl SelectionEpochs {
    pub fn new(bins: Vec<f64>) -> Result<Self> {
        if bins.len() < 2 {
            return Err(Error::InvalidTimeBins {
                msg: format!("at least two boundaries are required, found {}", bins.len()),
            }
            .into());
        }
        if bins.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(Error::InvalidTimeBins {
                msg: "boundaries have to be strictly increasing".to_owned(),
            }
            .into());
        }
        Ok(SelectionEpochs { bins })
    }

    /// A single epoch spanning `[0, cutoff)`.
    pub fn single(cutoff: f64) -> Result<Self> {
        Self::new(vec![0.0, cutoff])
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    /// Number of free selection coefficients.
    pub fn dimension(&self) -> usize {
        self.bins.len() - 1
    }

    /// Selection coefficient for every epoch of the time grid.
    pub fn expand(&self, coefficients: &[f64], grid: &TimeGrid) -> Vec<f64> {
        assert_eq!(
            coefficients.len(),
            self.dimension(),
            "bug: number of selection coefficients does not match the selection epochs"
        );
        grid.epochs()
            .iter()
            .map(|e| match utils::digitize(*e, &self.bins) {
                0 => 0.0,
                i => coefficients.get(i - 1).copied().unwrap_or(0.0),
            })
            .collect()
    }
}
