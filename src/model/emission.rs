// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Emission log-likelihoods per model step and frequency bin.
//!
//! Step `k` covers the time interval `(e_k, e_{k+1}]` and its emission is
//! evaluated at the frequency reached at epoch `e_{k+1}`. Coalescence times
//! are scored with the coalescent density of the derived and the ancestral
//! sub-population, ancient samples with their genotype likelihoods.
//! Emissions do not depend on selection and are computed once per sampled
//! genealogy.

use ndarray::{Array2, ArrayView1};

use crate::data::ancient::{self, AncientSamples};
use crate::data::genealogy::LineageTimes;
use crate::model::grid::TimeGrid;
use crate::model::ModelContext;

fn pairs(lineages: usize) -> f64 {
    (lineages * lineages.saturating_sub(1)) as f64 / 2.0
}

/// Log density of the coalescence `events` (sorted, within `(start, end]`)
/// of `lineages` lineages in a population of `size` haploid individuals,
/// including the probability of no further coalescence until `end`.
pub fn ln_coalescent_density(
    events: &[f64],
    lineages: usize,
    size: f64,
    start: f64,
    end: f64,
) -> f64 {
    let mut k = lineages;
    let mut prev = start;
    let mut ln_p = 0.0;
    for &t in events {
        if k < 2 {
            break;
        }
        ln_p += -size.ln() - pairs(k) * (t - prev).max(0.0) / size;
        k -= 1;
        prev = t;
    }
    ln_p - pairs(k) * (end - prev).max(0.0) / size
}

/// Coalescence events of one lineage class, grouped by model step, together
/// with the number of lineages entering every step.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StepEvents {
    lineages: Vec<usize>,
    events: Vec<Vec<f64>>,
}

impl StepEvents {
    /// Group sorted `times` of `lineages` sampled lineages. Events beyond the
    /// time grid are dropped.
    pub(crate) fn new(times: &[f64], lineages: usize, grid: &TimeGrid) -> Self {
        let mut events = vec![Vec::new(); grid.n_steps()];
        for &t in times {
            if let Some(k) = grid.step_of(t) {
                events[k].push(t);
            }
        }
        let mut remaining = lineages;
        let lineages = events
            .iter()
            .map(|step| {
                let entering = remaining;
                remaining = remaining.saturating_sub(step.len());
                entering
            })
            .collect();
        StepEvents { lineages, events }
    }

    /// Log density of step `k` in a population of `size`.
    pub(crate) fn ln_density(&self, k: usize, size: f64, grid: &TimeGrid) -> f64 {
        let epochs = grid.epochs();
        ln_coalescent_density(
            &self.events[k],
            self.lineages[k],
            size,
            epochs[k],
            epochs[k + 1],
        )
    }
}

/// Emission log-likelihoods, one row per model step and one column per
/// frequency bin.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionModel {
    ln_probs: Array2<f64>,
}

impl EmissionModel {
    /// Combined emissions of an optional sampled genealogy and the ancient
    /// samples. Without any data, all emissions are 0.
    pub fn new(ctx: &ModelContext, genealogy: Option<&LineageTimes>, ancient: &AncientSamples) -> Self {
        let mut ln_probs = Array2::zeros((ctx.time_grid().n_steps(), ctx.n_freqs()));
        if let Some(times) = genealogy {
            ln_probs += &Self::coalescent(ctx, times);
        }
        if !ancient.is_empty() {
            ln_probs += &Self::ancient(ctx, ancient);
        }
        EmissionModel { ln_probs }
    }

    /// Coalescent emissions: derived lineages evolve in a sub-population of
    /// size `2Nx`, ancestral lineages in one of size `2N(1 - x)`.
    pub fn coalescent(ctx: &ModelContext, times: &LineageTimes) -> Array2<f64> {
        let grid = ctx.time_grid();
        let freqs = ctx.frequency_grid().freqs();
        let derived = StepEvents::new(times.derived(), times.derived_lineages(), grid);
        let ancestral = StepEvents::new(times.ancestral(), times.ancestral_lineages(), grid);

        let mut ln_probs = Array2::zeros((grid.n_steps(), freqs.len()));
        for (k, mut row) in ln_probs.outer_iter_mut().enumerate() {
            let haploid_size = 2.0 * ctx.demography().size(k);
            for (p, &x) in row.iter_mut().zip(freqs) {
                *p = derived.ln_density(k, haploid_size * x, grid)
                    + ancestral.ln_density(k, haploid_size * (1.0 - x), grid);
            }
        }
        ln_probs
    }

    /// Genotype likelihood emissions. A sample of age `a` is attached to the
    /// step ending at or after `a`; samples beyond the time grid are skipped.
    pub fn ancient(ctx: &ModelContext, samples: &AncientSamples) -> Array2<f64> {
        let grid = ctx.time_grid();
        let freqs = ctx.frequency_grid().freqs();
        let mut ln_probs = Array2::zeros((grid.n_steps(), freqs.len()));
        for (age, gl) in samples.iter() {
            match grid.step_of(age) {
                Some(k) => {
                    for (p, &x) in ln_probs.row_mut(k).iter_mut().zip(freqs) {
                        *p += *ancient::ln_genotype_emission(gl, x);
                    }
                }
                None => warn!(
                    "ancient sample of age {} lies beyond the time cutoff of {} generations, skipping",
                    age,
                    grid.cutoff()
                ),
            }
        }
        ln_probs
    }

    /// Emission log-likelihoods of step `k` per frequency bin.
    pub fn step(&self, k: usize) -> ArrayView1<'_, f64> {
        self.ln_probs.row(k)
    }

    pub fn ln_probs(&self) -> &Array2<f64> {
        &self.ln_probs
    }
}
