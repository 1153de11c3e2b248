// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Estimation of time-varying natural selection on a single variant.
//!
//! Evidence comes from sampled genealogies (coalescence times of derived and
//! ancestral lineages) and/or genotype likelihoods of ancient samples. A hidden
//! Markov model over a discretized allele frequency yields the likelihood of a
//! selection trajectory, which is maximized with a Nelder-Mead simplex search.
//! At the maximum, the posterior distribution of the allele frequency over time
//! is reconstructed.

#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

pub mod cli;
pub mod data;
pub mod errors;
pub mod estimation;
pub mod model;
pub mod output;
pub mod utils;
