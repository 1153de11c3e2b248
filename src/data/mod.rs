// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Readers for the inputs of a run: sampled genealogies, ancient genotype
//! likelihoods, population size histories and selection epoch boundaries.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub mod ancient;
pub mod demography;
pub mod genealogy;
pub mod time_bins;

/// Read a whitespace-delimited numeric table, skipping the given number of
/// leading and trailing lines. Blank lines are ignored.
pub fn read_table<P: AsRef<Path>>(
    path: P,
    skip_header: usize,
    skip_footer: usize,
) -> Result<Vec<Vec<f64>>> {
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).with_context(|| format!("unable to read {}", path.display()))?;
    parse_table(&content, skip_header, skip_footer)
        .with_context(|| format!("unable to parse {}", path.display()))
}

pub(crate) fn parse_table(
    content: &str,
    skip_header: usize,
    skip_footer: usize,
) -> Result<Vec<Vec<f64>>> {
    let lines: Vec<&str> = content.lines().collect();
    let end = lines.len().saturating_sub(skip_footer);
    let start = skip_header.min(end);

    lines[start..end]
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            line.split_whitespace()
                .map(|value| {
                    value.parse::<f64>().with_context(|| {
                        format!("invalid number '{}' in line {}", value, start + i + 1)
                    })
                })
                .collect()
        })
        .collect()
}
