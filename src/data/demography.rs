// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Population size history in the `.coal` format of Relate.
//!
//! The first line lists the group labels and is skipped. The second line
//! holds the epoch boundaries in generations, the third line the pairwise
//! coalescence rate per epoch, preceded by two identifier columns. The
//! effective size of an epoch is `0.5 / rate`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::errors::Error;
use crate::model::grid::{Demography, TimeGrid};

/// Read a `.coal` file and resolve the population size of every epoch of
/// `grid`.
pub fn read_coal_file<P: AsRef<Path>>(path: P, grid: &TimeGrid) -> Result<Demography> {
    let path = path.as_ref();
    let table = super::read_table(path, 1, 0)?;
    parse_coal_table(&table, grid)
        .with_context(|| format!("unable to read population size history {}", path.display()))
}

fn parse_coal_table(table: &[Vec<f64>], grid: &TimeGrid) -> Result<Demography> {
    if table.len() < 2 {
        return Err(Error::InvalidPopulationSize {
            msg: format!("expected at least 2 numeric lines, found {}", table.len()),
        }
        .into());
    }
    let boundaries = &table[0];
    let rates = &table[1];
    if rates.len() < 4 {
        return Err(Error::InvalidPopulationSize {
            msg: "no coalescence rates given".to_owned(),
        }
        .into());
    }
    if boundaries.windows(2).any(|w| !(w[0] < w[1])) {
        return Err(Error::InvalidPopulationSize {
            msg: "epoch boundaries have to be strictly increasing".to_owned(),
        }
        .into());
    }

    // the trailing column is not an epoch rate
    let mut sizes: Vec<f64> = rates[2..rates.len() - 1]
        .iter()
        .map(|rate| 0.5 / rate)
        .collect();
    if let Some(last) = sizes.last().copied() {
        sizes.push(last);
    }
    debug!(
        "read {} population sizes for {} epoch boundaries",
        sizes.len(),
        boundaries.len()
    );

    Demography::piecewise(boundaries, &sizes, grid)
}
