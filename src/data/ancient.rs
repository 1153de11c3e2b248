// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::Path;

use anyhow::Result;
use bio::stats::LogProb;
use itertools::Itertools;
use ndarray::{Array2, ArrayView1, Axis};

use crate::errors::Error;

/// Genotype likelihoods of ancient samples.
///
/// Each row holds the sample age (generations before present) followed by
/// the log-likelihoods of its genotypes: two columns for haploid samples
/// (ancestral, derived), three for diploid samples (homozygous ancestral,
/// heterozygous, homozygous derived).
#[derive(Debug, Clone, PartialEq)]
pub struct AncientSamples {
    rows: Array2<f64>,
}

impl AncientSamples {
    pub fn new(rows: Array2<f64>) -> Result<Self> {
        if rows.nrows() > 0 && !(rows.ncols() == 3 || rows.ncols() == 4) {
            return Err(Error::InvalidAncientSamples {
                row: 0,
                msg: format!(
                    "expected an age followed by 2 (haploid) or 3 (diploid) genotype likelihoods, found {} columns",
                    rows.ncols()
                ),
            }
            .into());
        }
        for (i, row) in rows.axis_iter(Axis(0)).enumerate() {
            if !(row[0].is_finite() && row[0] >= 0.0) {
                return Err(Error::InvalidAncientSamples {
                    row: i,
                    msg: format!("age must be a non-negative number, found {}", row[0]),
                }
                .into());
            }
            if row.iter().skip(1).any(|gl| gl.is_nan() || *gl > 0.0) {
                return Err(Error::InvalidAncientSamples {
                    row: i,
                    msg: "genotype likelihoods have to be given in log space".to_owned(),
                }
                .into());
            }
        }
        Ok(AncientSamples { rows })
    }

    pub fn empty() -> Self {
        AncientSamples {
            rows: Array2::zeros((0, 4)),
        }
    }

    /// Read whitespace-delimited rows of (age, log GL...).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let table = super::read_table(path, 0, 0)?;
        if table.is_empty() {
            return Ok(Self::empty());
        }
        let ncols = table[0].len();
        if let Some(i) = table.iter().position(|row| row.len() != ncols) {
            return Err(Error::InvalidAncientSamples {
                row: i,
                msg: format!("expected {} columns, found {}", ncols, table[i].len()),
            }
            .into());
        }
        let rows = Array2::from_shape_vec(
            (table.len(), ncols),
            table.into_iter().flatten().collect_vec(),
        )?;
        Self::new(rows)
    }

    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_age(&self) -> Option<f64> {
        self.ages().fold(None, |max, age| match max {
            Some(m) if m >= age => Some(m),
            _ => Some(age),
        })
    }

    pub fn ages(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.column(0).into_iter().copied()
    }

    /// Samples as (age, genotype log-likelihoods).
    pub fn iter(&self) -> impl Iterator<Item = (f64, ArrayView1<'_, f64>)> + '_ {
        self.rows
            .axis_iter(Axis(0))
            .map(|row| (row[0], row.slice_move(ndarray::s![1..])))
    }
}

/// Log-probability of a sample's genotype likelihoods given the derived
/// allele frequency `x` in the population. Diploid genotypes are weighted
/// with Hardy-Weinberg proportions.
pub fn ln_genotype_emission(genotype_likelihoods: ArrayView1<'_, f64>, x: f64) -> LogProb {
    let ln_der = x.ln();
    let ln_anc = (1.0 - x).ln();
    let gl = genotype_likelihoods;
    let terms = if gl.len() == 2 {
        vec![LogProb(ln_anc + gl[0]), LogProb(ln_der + gl[1])]
    } else {
        vec![
            LogProb(2.0 * ln_anc + gl[0]),
            LogProb(2f64.ln() + ln_der + ln_anc + gl[1]),
            LogProb(2.0 * ln_der + gl[2]),
        ]
    };
    LogProb::ln_sum_exp(&terms)
}
