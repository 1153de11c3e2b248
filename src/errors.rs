// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("malformed header in time file {path}: {msg}")]
    MalformedHeader { path: PathBuf, msg: String },
    #[error("time file {path} is truncated: expected at least {expected} bytes, found {found}")]
    TruncatedTimeFile {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("time file {path} is empty or does not contain any mutation")]
    EmptyTimeFile { path: PathBuf },
    #[error("inconsistent coalescence time arrays: {msg}")]
    InconsistentShape { msg: String },
    #[error(
        "selection coefficient {value} of epoch {epoch} exceeds the bound of {s_max}; consider raising --s-max"
    )]
    BoundViolation { epoch: usize, value: f64, s_max: f64 },
    #[error("invalid normal lookup table: {msg}")]
    InvalidTable { msg: String },
    #[error("invalid time grid: {msg}")]
    InvalidTimeGrid { msg: String },
    #[error("invalid frequency grid: {msg}")]
    InvalidFrequencyGrid { msg: String },
    #[error("invalid population size history: {msg}")]
    InvalidPopulationSize { msg: String },
    #[error("invalid time bins: {msg}")]
    InvalidTimeBins { msg: String },
    #[error("invalid ancient sample in row {row}: {msg}")]
    InvalidAncientSamples { row: usize, msg: String },
    #[error("invalid value for {name}: {msg}")]
    InvalidParameter { name: String, msg: String },
    #[error(
        "neither coalescence times (--times) nor ancient samples (--ancient-samps) were provided"
    )]
    MissingData,
}

pub(crate) fn invalid_parameter(name: &str, msg: &str) -> Error {
    Error::InvalidParameter {
        name: name.to_owned(),
        msg: msg.to_owned(),
    }
}
