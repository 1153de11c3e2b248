// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Coalescence times of sampled genealogies.
//!
//! The binary time file holds, for each mutation, a block of ancestral and a
//! block of derived coalescence times for every sampled genealogy. Loading
//! resolves the shape once into a [`Genealogies`] value, so that downstream
//! code never has to inspect array dimensions.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use flate2::read::MultiGzDecoder;
use ndarray::{s, Array2, Array3, ArrayView2, Axis};

use crate::errors::{self, Error};

/// Padding value for lineage slots without a coalescence.
pub const NOT_COALESCED: f64 = -1.0;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const HEADER_LEN: usize = 8;
const MUTATION_HEADER_LEN: usize = 12;

/// Coalescence times of one sampled genealogy, sorted and without padding.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct LineageTimes {
    /// Times at which two derived lineages coalesce.
    #[getset(get = "pub")]
    derived: Vec<f64>,
    /// Times at which two ancestral lineages coalesce.
    #[getset(get = "pub")]
    ancestral: Vec<f64>,
}

impl LineageTimes {
    pub fn new<D, A>(derived: D, ancestral: A) -> Self
    where
        D: IntoIterator<Item = f64>,
        A: IntoIterator<Item = f64>,
    {
        let prepare = |times: Vec<f64>| {
            let mut times: Vec<f64> = times.into_iter().filter(|t| *t >= 0.0).collect();
            times.sort_by(|a, b| a.total_cmp(b));
            times
        };
        LineageTimes {
            derived: prepare(derived.into_iter().collect()),
            ancestral: prepare(ancestral.into_iter().collect()),
        }
    }

    fn from_padded(times: ArrayView2<'_, f64>) -> Self {
        Self::new(times.row(0).iter().copied(), times.row(1).iter().copied())
    }

    /// Number of sampled derived lineages at present.
    pub fn derived_lineages(&self) -> usize {
        self.derived.len() + 1
    }

    /// Number of sampled ancestral lineages at present.
    pub fn ancestral_lineages(&self) -> usize {
        self.ancestral.len() + 1
    }
}

/// Content of a binary time file (first mutation only).
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct SampledTimes {
    #[getset(get_copy = "pub")]
    breakpoint: i32,
    /// Number of sampled haplotypes carrying the derived allele.
    #[getset(get_copy = "pub")]
    derived_count: usize,
    /// Total number of sampled haplotypes.
    #[getset(get_copy = "pub")]
    sample_size: usize,
    /// Derived coalescence times, one row per sampled genealogy.
    #[getset(get = "pub")]
    derived: Array2<f64>,
    /// Ancestral coalescence times, one row per sampled genealogy.
    #[getset(get = "pub")]
    ancestral: Array2<f64>,
}

impl SampledTimes {
    /// Read a time file, transparently decompressing gzip input.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut raw = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut raw))
            .with_context(|| format!("unable to open time file {}", path.display()))?;

        let data = if raw.starts_with(&GZIP_MAGIC) {
            let mut decompressed = Vec::new();
            MultiGzDecoder::new(&raw[..])
                .read_to_end(&mut decompressed)
                .with_context(|| format!("unable to decompress time file {}", path.display()))?;
            decompressed
        } else {
            raw
        };

        Self::from_bytes(&data, path)
    }

    /// Parse the little-endian layout of a time file. `path` is only used
    /// for diagnostics.
    pub fn from_bytes(data: &[u8], path: &Path) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::EmptyTimeFile {
                path: path.to_owned(),
            }
            .into());
        }
        ensure_len(data, HEADER_LEN, path)?;

        let n_mutations = LittleEndian::read_i32(&data[0..4]);
        let samples_per_mutation = LittleEndian::read_i32(&data[4..8]);
        if n_mutations <= 0 {
            return Err(Error::EmptyTimeFile {
                path: path.to_owned(),
            }
            .into());
        }
        if samples_per_mutation <= 0 {
            return Err(Error::MalformedHeader {
                path: path.to_owned(),
                msg: format!(
                    "number of sampled genealogies per mutation must be positive, found {}",
                    samples_per_mutation
                ),
            }
            .into());
        }
        if n_mutations > 1 {
            warn!(
                "Time file {} contains {} mutations, only the first one is used.",
                path.display(),
                n_mutations
            );
        }

        let mut pos = HEADER_LEN;
        ensure_len(data, pos + MUTATION_HEADER_LEN, path)?;
        let breakpoint = LittleEndian::read_i32(&data[pos..pos + 4]);
        let daf = LittleEndian::read_i32(&data[pos + 4..pos + 8]);
        let n = LittleEndian::read_i32(&data[pos + 8..pos + 12]);
        pos += MUTATION_HEADER_LEN;

        if daf < 1 || n <= daf {
            return Err(Error::MalformedHeader {
                path: path.to_owned(),
                msg: format!(
                    "derived allele count {} is incompatible with sample size {}",
                    daf, n
                ),
            }
            .into());
        }

        let samples = samples_per_mutation as usize;
        let ancestral = read_block(data, &mut pos, samples, (n - daf - 1) as usize, path)?;
        let derived = read_block(data, &mut pos, samples, (daf - 1) as usize, path)?;

        Ok(SampledTimes {
            breakpoint,
            derived_count: daf as usize,
            sample_size: n as usize,
            derived,
            ancestral,
        })
    }
}

fn ensure_len(data: &[u8], expected: usize, path: &Path) -> Result<()> {
    if data.len() < expected {
        Err(Error::TruncatedTimeFile {
            path: path.to_owned(),
            expected,
            found: data.len(),
        }
        .into())
    } else {
        Ok(())
    }
}

fn read_block(
    data: &[u8],
    pos: &mut usize,
    rows: usize,
    cols: usize,
    path: &Path,
) -> Result<Array2<f64>> {
    let end = *pos + rows * cols * 4;
    ensure_len(data, end, path)?;
    let values = data[*pos..end]
        .chunks_exact(4)
        .map(|bytes| LittleEndian::read_f32(bytes) as f64)
        .collect();
    *pos = end;
    Ok(Array2::from_shape_vec((rows, cols), values)?)
}

/// Sampled genealogies of a run, resolved once at load time.
///
/// Arrays are padded with [`NOT_COALESCED`]. Axis 0 separates derived (0) and
/// ancestral (1) lineages, axis 1 indexes coalescence events and, for
/// [`Genealogies::MultiSample`], axis 2 indexes the sampled genealogy.
#[derive(Debug, Clone, PartialEq)]
pub enum Genealogies {
    NoData,
    SingleSample(Array2<f64>),
    MultiSample(Array3<f64>),
}

impl Genealogies {
    /// Build from per-sample time matrices (one row per sampled genealogy),
    /// keeping every `thin`-th sample after discarding the first `burnin`.
    pub fn from_sampled_times(
        derived: &Array2<f64>,
        ancestral: &Array2<f64>,
        burnin: usize,
        thin: usize,
    ) -> Result<Self> {
        if thin == 0 {
            return Err(errors::invalid_parameter("thin", "must be at least 1").into());
        }
        if derived.nrows() != ancestral.nrows() {
            return Err(Error::InconsistentShape {
                msg: format!(
                    "{} samples of derived times but {} samples of ancestral times",
                    derived.nrows(),
                    ancestral.nrows()
                ),
            }
            .into());
        }
        if derived.is_empty() || ancestral.is_empty() {
            return Err(Error::InconsistentShape {
                msg: format!(
                    "degenerate coalescence times: derived {:?}, ancestral {:?}",
                    derived.shape(),
                    ancestral.shape()
                ),
            }
            .into());
        }

        let selected: Vec<usize> = (burnin..derived.nrows()).step_by(thin).collect();
        if selected.is_empty() {
            return Err(Error::InconsistentShape {
                msg: format!(
                    "no sampled genealogy left after a burn-in of {} out of {} samples",
                    burnin,
                    derived.nrows()
                ),
            }
            .into());
        }

        let n_der = derived.ncols();
        let n_anc = ancestral.ncols();
        let slots = n_der + n_anc + 2;
        let mut times = Array3::from_elem((2, slots, selected.len()), NOT_COALESCED);
        for (j, &i) in selected.iter().enumerate() {
            times.slice_mut(s![0, ..n_der, j]).assign(&derived.row(i));
            times.slice_mut(s![1, ..n_anc, j]).assign(&ancestral.row(i));
        }

        Ok(if selected.len() == 1 {
            Genealogies::SingleSample(times.index_axis(Axis(2), 0).to_owned())
        } else {
            Genealogies::MultiSample(times)
        })
    }

    /// Number of sampled genealogies.
    pub fn len(&self) -> usize {
        match self {
            Genealogies::NoData => 0,
            Genealogies::SingleSample(_) => 1,
            Genealogies::MultiSample(times) => times.len_of(Axis(2)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted, unpadded coalescence times of every sampled genealogy.
    pub fn samples(&self) -> Vec<LineageTimes> {
        match self {
            Genealogies::NoData => Vec::new(),
            Genealogies::SingleSample(times) => vec![LineageTimes::from_padded(times.view())],
            Genealogies::MultiSample(times) => times
                .axis_iter(Axis(2))
                .map(LineageTimes::from_padded)
                .collect(),
        }
    }

    /// Number of derived and ancestral lineages sampled at present.
    pub fn lineage_counts(&self) -> Option<(usize, usize)> {
        self.samples()
            .first()
            .map(|sample| (sample.derived_lineages(), sample.ancestral_lineages()))
    }

    /// Uniform three-axis view of the padded times (derived/ancestral ×
    /// coalescence × sample).
    pub fn to_array(&self) -> Array3<f64> {
        match self {
            Genealogies::NoData => Array3::zeros((2, 0, 0)),
            Genealogies::SingleSample(times) => times.clone().insert_axis(Axis(2)),
            Genealogies::MultiSample(times) => times.clone(),
        }
    }
}
