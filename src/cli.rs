// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use structopt::StructOpt;

use crate::data::ancient::AncientSamples;
use crate::data::demography::read_coal_file;
use crate::data::genealogy::{Genealogies, SampledTimes};
use crate::data::time_bins::read_time_bins;
use crate::errors::{self, Error};
use crate::estimation::importance::Evidence;
use crate::estimation::nelder_mead::NelderMeadOptions;
use crate::estimation::{self, SelectionEstimate};
use crate::model::grid::{Demography, FrequencyGrid, SelectionEpochs, TimeGrid};
use crate::model::tables::NormalTables;
use crate::model::{ModelContext, ModelContextBuilder};
use crate::output::{self, TrajectoryArtifacts};

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "seltrace",
    about = "Estimate time-varying selection on a variant from sampled genealogies and/or ancient genotype likelihoods."
)]
#[structopt(setting = structopt::clap::AppSettings::ColoredHelp)]
pub struct Seltrace {
    #[structopt(
        long,
        parse(from_os_str),
        help = "Prefix of the coalescence time file (reads <prefix>.palm, optionally gzip-compressed)."
    )]
    pub times: Option<PathBuf>,
    #[structopt(
        long = "ancient-samps",
        parse(from_os_str),
        help = "Whitespace-delimited ancient samples: age followed by genotype log-likelihoods \
                (3 columns haploid, 4 columns diploid)."
    )]
    pub ancient_samps: Option<PathBuf>,
    #[structopt(
        long = "pop-freq",
        help = "Present-day frequency of the derived allele (default: fraction of derived \
                lineages in the genealogies)."
    )]
    pub pop_freq: Option<f64>,
    #[structopt(
        long,
        parse(from_os_str),
        help = "Prefix for the trajectory output (<prefix>.{epochs,freqs,post}.bin). If omitted, \
                a summary of the trajectory is printed to STDOUT."
    )]
    pub out: Option<PathBuf>,
    #[structopt(
        short = "N",
        long = "N",
        default_value = "10000",
        help = "Constant effective population size (halved for the transition and coalescent terms)."
    )]
    pub population_size: f64,
    #[structopt(
        long,
        parse(from_os_str),
        help = "Population size history in the .coal format of Relate. Overrides --N."
    )]
    pub coal: Option<PathBuf>,
    #[structopt(long, default_value = "0.5", help = "Dominance coefficient.")]
    pub dom: f64,
    #[structopt(
        long,
        default_value = "0",
        help = "Number of sampled genealogies to discard from the beginning."
    )]
    pub burnin: usize,
    #[structopt(long, default_value = "1", help = "Use every n-th sampled genealogy.")]
    pub thin: usize,
    #[structopt(
        long = "t-cutoff",
        default_value = "1000",
        help = "Time cutoff in generations (with ancient samples only, the oldest age plus one)."
    )]
    pub t_cutoff: f64,
    #[structopt(
        long = "time-bins",
        parse(from_os_str),
        help = "Boundaries of the epochs with their own selection coefficient, in generations."
    )]
    pub time_bins: Option<PathBuf>,
    #[structopt(
        long = "s-max",
        default_value = "0.1",
        help = "Bound on the absolute selection coefficient."
    )]
    pub s_max: f64,
    #[structopt(
        long,
        default_value = "1e-4",
        help = "Absolute tolerance on the selection coefficients for convergence."
    )]
    pub xtol: f64,
    #[structopt(
        long,
        default_value = "1e-4",
        help = "Absolute tolerance on the log-likelihood for convergence."
    )]
    pub ftol: f64,
    #[structopt(
        long = "max-iter",
        help = "Maximum number of Nelder-Mead iterations (default: 200 per selection epoch)."
    )]
    pub max_iter: Option<usize>,
    #[structopt(
        long = "freq-bins",
        default_value = "120",
        help = "Number of allele frequency bins."
    )]
    pub freq_bins: usize,
    #[structopt(long, help = "Number of threads (default: one per core).")]
    pub threads: Option<usize>,
    #[structopt(
        long = "z-bins",
        parse(from_os_str),
        help = "Table of z values for the normal log-CDF lookup (generated if omitted)."
    )]
    pub z_bins: Option<PathBuf>,
    #[structopt(long = "z-logcdf", parse(from_os_str), help = "Table of ln Φ(z).")]
    pub z_logcdf: Option<PathBuf>,
    #[structopt(long = "z-logsf", parse(from_os_str), help = "Table of ln (1 - Φ(z)).")]
    pub z_logsf: Option<PathBuf>,
    #[structopt(short, long, help = "Print debug messages.")]
    pub verbose: bool,
    #[structopt(short, long, help = "Only print warnings and errors.")]
    pub quiet: bool,
}

fn load_genealogies(opt: &Seltrace) -> Result<Genealogies> {
    match opt.times {
        Some(ref prefix) => {
            let mut path = OsString::from(prefix.as_os_str());
            path.push(".palm");
            let times = SampledTimes::from_path(PathBuf::from(path))?;
            info!(
                "Loaded coalescence times of {} sampled genealogies ({} of {} haplotypes derived).",
                times.derived().nrows(),
                times.derived_count(),
                times.sample_size()
            );
            Genealogies::from_sampled_times(times.derived(), times.ancestral(), opt.burnin, opt.thin)
        }
        None => Ok(Genealogies::NoData),
    }
}

fn load_tables(opt: &Seltrace) -> Result<NormalTables> {
    match (&opt.z_bins, &opt.z_logcdf, &opt.z_logsf) {
        (Some(z), Some(ln_cdf), Some(ln_sf)) => NormalTables::from_files(z, ln_cdf, ln_sf),
        (None, None, None) => Ok(NormalTables::standard()),
        _ => Err(errors::invalid_parameter(
            "--z-bins/--z-logcdf/--z-logsf",
            "either all or none of the lookup tables have to be given",
        )
        .into()),
    }
}

/// Build the invariant model context from the command line and the loaded
/// data.
pub fn model_context(
    opt: &Seltrace,
    genealogies: &Genealogies,
    ancient: &AncientSamples,
) -> Result<ModelContext> {
    let cutoff = if genealogies.is_empty() {
        ancient
            .max_age()
            .map_or(opt.t_cutoff, |age| (age + 1.0).max(2.0))
    } else {
        opt.t_cutoff
    };
    let time_grid = TimeGrid::new(cutoff)?;

    let demography = match opt.coal {
        Some(ref path) => read_coal_file(path, &time_grid)?,
        None => Demography::constant(opt.population_size, &time_grid)?,
    };
    let frequency_grid = FrequencyGrid::from_beta_quantiles(opt.freq_bins, demography.size(0))?;
    // the grid resolves the given size, the HMM runs on half of it
    let demography = demography.scaled(0.5)?;
    let selection_epochs = match opt.time_bins {
        Some(ref path) => read_time_bins(path)?,
        None => SelectionEpochs::single(cutoff)?,
    };

    let current_freq = opt.pop_freq.or_else(|| {
        genealogies
            .lineage_counts()
            .map(|(n, m)| n as f64 / (n + m) as f64)
    });

    Ok(ModelContextBuilder::default()
        .time_grid(time_grid)
        .demography(demography)
        .frequency_grid(frequency_grid)
        .selection_epochs(selection_epochs)
        .tables(load_tables(opt)?)
        .dominance(opt.dom)
        .s_max(opt.s_max)
        .current_freq(current_freq)
        .build()?)
}

fn report(ctx: &ModelContext, estimate: &SelectionEstimate, out: Option<&PathBuf>) -> Result<()> {
    println!("logLR: {:.4}", estimate.ln_likelihood_ratio());
    println!();
    println!("MLE:");
    output::write_estimate(ctx, estimate, io::stdout())?;

    match out {
        Some(prefix) => TrajectoryArtifacts::from_posterior(ctx, estimate.posterior()).write(prefix),
        None => {
            println!();
            println!("Trajectory:");
            output::write_trajectory(ctx, estimate.posterior(), io::stdout())
        }
    }
}

pub fn run(opt: Seltrace) -> Result<()> {
    if opt.times.is_none() && opt.ancient_samps.is_none() {
        return Err(Error::MissingData.into());
    }
    if let Some(threads) = opt.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    info!("Loading data and initializing model.");
    let genealogies = load_genealogies(&opt)?;
    let ancient = match opt.ancient_samps {
        Some(ref path) => AncientSamples::from_path(path)?,
        None => AncientSamples::empty(),
    };
    let ctx = model_context(&opt, &genealogies, &ancient)
        .context("unable to initialize the model")?;
    debug!(
        "{} epochs, {} frequency bins, {} selection epochs",
        ctx.n_epochs(),
        ctx.n_freqs(),
        ctx.selection_epochs().dimension()
    );

    let evidence = Evidence::prepare(&ctx, &genealogies, &ancient);
    let options = NelderMeadOptions {
        xatol: opt.xtol,
        fatol: opt.ftol,
        max_iter: opt.max_iter,
        ..Default::default()
    };
    let estimate = estimation::estimate_selection(&ctx, &evidence, &options)?;

    report(&ctx, &estimate, opt.out.as_ref())?;
    info!("Finished.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::transition::{transition_matrix, Transitions};

    fn options(args: &[&str]) -> Seltrace {
        Seltrace::from_iter(
            ["seltrace", "--ancient-samps", "ancient.txt"]
                .iter()
                .chain(args),
        )
    }

    #[test]
    fn test_model_context_halves_population_size() {
        let opt = options(&["-N", "10000", "--t-cutoff", "10", "--freq-bins", "15"]);
        let ctx = model_context(&opt, &Genealogies::NoData, &AncientSamples::empty()).unwrap();

        assert_eq!(ctx.demography().sizes(), &[5000.0; 10]);
        assert_eq!(
            ctx.frequency_grid(),
            &FrequencyGrid::from_beta_quantiles(15, 10000.0).unwrap()
        );

        let freqs = ctx.frequency_grid().freqs();
        let edges = ctx.frequency_grid().edges();
        let transitions = Transitions::build(&ctx, &ctx.expand_selection(&[0.0]));
        let halved = transition_matrix(freqs, &edges, 0.0, 0.5, 5000.0, ctx.tables());
        let full = transition_matrix(freqs, &edges, 0.0, 0.5, 10000.0, ctx.tables());
        assert_eq!(transitions.step(0), &halved);
        assert_ne!(transitions.step(0), &full);
    }

    #[test]
    fn test_model_context_rejects_partial_tables() {
        let opt = options(&["--z-bins", "z.txt"]);
        assert!(model_context(&opt, &Genealogies::NoData, &AncientSamples::empty()).is_err());
    }
}
