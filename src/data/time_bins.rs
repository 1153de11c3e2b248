// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::Path;

use anyhow::{Context, Result};

use crate::model::grid::SelectionEpochs;

/// Read the boundaries of the selection epochs, given as whitespace-delimited
/// generation values (on one or several lines).
pub fn read_time_bins<P: AsRef<Path>>(path: P) -> Result<SelectionEpochs> {
    let path = path.as_ref();
    let bins = super::read_table(path, 0, 0)?
        .into_iter()
        .flatten()
        .collect();
    SelectionEpochs::new(bins).with_context(|| format!("invalid time bins in {}", path.display()))
}
