// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Result artifacts and tabular reports.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::estimation::trajectory::Posterior;
use crate::estimation::SelectionEstimate;
use crate::model::ModelContext;

fn artifact_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

fn write_array<T: Serialize>(path: &Path, array: &T) -> Result<()> {
    let writer = BufWriter::new(
        File::create(path).with_context(|| format!("unable to create {}", path.display()))?,
    );
    bincode::serialize_into(writer, array)
        .with_context(|| format!("unable to write {}", path.display()))
}

fn read_array<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("unable to open {}", path.display()))?,
    );
    bincode::deserialize_from(reader).with_context(|| format!("unable to read {}", path.display()))
}

/// Epochs, frequency bins and log posterior (frequency × epoch) of a run,
/// stored as `<prefix>.epochs.bin`, `<prefix>.freqs.bin` and
/// `<prefix>.post.bin`.
#[derive(Debug, Clone, PartialEq, Getters, new)]
pub struct TrajectoryArtifacts {
    #[getset(get = "pub")]
    epochs: Array1<f64>,
    #[getset(get = "pub")]
    freqs: Array1<f64>,
    #[getset(get = "pub")]
    posterior: Array2<f64>,
}

impl TrajectoryArtifacts {
    pub fn from_posterior(ctx: &ModelContext, posterior: &Posterior) -> Self {
        TrajectoryArtifacts {
            epochs: Array1::from(ctx.time_grid().epochs().to_vec()),
            freqs: Array1::from(ctx.frequency_grid().freqs().to_vec()),
            posterior: posterior.ln_probs().clone(),
        }
    }

    pub fn write<P: AsRef<Path>>(&self, prefix: P) -> Result<()> {
        let prefix = prefix.as_ref();
        write_array(&artifact_path(prefix, ".epochs.bin"), &self.epochs)?;
        write_array(&artifact_path(prefix, ".freqs.bin"), &self.freqs)?;
        write_array(&artifact_path(prefix, ".post.bin"), &self.posterior)?;
        info!("Wrote trajectory to {}.{{epochs,freqs,post}}.bin", prefix.display());
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(prefix: P) -> Result<Self> {
        let prefix = prefix.as_ref();
        Ok(TrajectoryArtifacts {
            epochs: read_array(&artifact_path(prefix, ".epochs.bin"))?,
            freqs: read_array(&artifact_path(prefix, ".freqs.bin"))?,
            posterior: read_array(&artifact_path(prefix, ".post.bin"))?,
        })
    }
}

#[derive(Debug, Serialize)]
struct EpochEstimate {
    epoch: String,
    selection: f64,
}

#[derive(Debug, Serialize)]
struct TrajectoryPoint {
    generation: usize,
    freq: f64,
}

/// Maximum likelihood selection coefficient of every selection epoch as
/// TSV.
pub fn write_estimate<W: Write>(
    ctx: &ModelContext,
    estimate: &SelectionEstimate,
    writer: W,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    let bins = ctx.selection_epochs().bins();
    for ((start, end), s) in bins.iter().zip(&bins[1..]).zip(estimate.coefficients()) {
        writer.serialize(EpochEstimate {
            epoch: format!("{}-{}", start, end),
            selection: *s,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Posterior mean frequency at twenty evenly spaced generations as TSV.
pub fn write_trajectory<W: Write>(
    ctx: &ModelContext,
    posterior: &Posterior,
    writer: W,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    let expected = posterior.expected_frequencies(ctx.frequency_grid().freqs());
    let bins = ctx.selection_epochs().bins();
    let end = (bins[bins.len() - 1].max(0.0) as usize).min(expected.len());
    let step = (end / 20).max(1);
    for generation in (0..end).step_by(step) {
        writer.serialize(TrajectoryPoint {
            generation,
            freq: expected[generation],
        })?;
    }
    writer.flush()?;
    Ok(())
}
