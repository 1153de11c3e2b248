// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use approx::assert_abs_diff_eq;
use byteorder::{LittleEndian, WriteBytesExt};
use ndarray::{array, Axis};
use structopt::StructOpt;

use seltrace::cli::{self, Seltrace};
use seltrace::data::ancient::AncientSamples;
use seltrace::data::genealogy::Genealogies;
use seltrace::estimation::importance::Evidence;
use seltrace::estimation::nelder_mead::NelderMeadOptions;
use seltrace::estimation::objective::{Cost, LikelihoodObjective};
use seltrace::estimation::trajectory::TrajectoryReconstructor;
use seltrace::estimation::{estimate_selection, SelectionEstimate};
use seltrace::model::grid::{Demography, FrequencyGrid, SelectionEpochs, TimeGrid};
use seltrace::model::tables::NormalTables;
use seltrace::model::{ModelContext, ModelContextBuilder};
use seltrace::output::TrajectoryArtifacts;
use seltrace::utils;

fn setup_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn context(cutoff: f64, bins: Vec<f64>, n_freqs: usize, current_freq: Option<f64>) -> ModelContext {
    let time_grid = TimeGrid::new(cutoff).unwrap();
    ModelContextBuilder::default()
        .demography(Demography::constant(10000.0, &time_grid).unwrap())
        .frequency_grid(FrequencyGrid::from_beta_quantiles(n_freqs, 10000.0).unwrap())
        .selection_epochs(SelectionEpochs::new(bins).unwrap())
        .tables(NormalTables::standard())
        .time_grid(time_grid)
        .s_max(0.1)
        .current_freq(current_freq)
        .build()
        .unwrap()
}

/// Two sampled genealogies with 3 derived and 2 ancestral coalescence times.
fn genealogies() -> Genealogies {
    Genealogies::from_sampled_times(
        &array![[35.0, 140.0, 610.0], [42.0, 155.0, 580.0]],
        &array![[260.0, 890.0], [310.0, 760.0]],
        0,
        1,
    )
    .unwrap()
}

fn assert_normalized(posterior: &ndarray::Array2<f64>) {
    for column in posterior.axis_iter(Axis(1)) {
        assert_abs_diff_eq!(utils::ln_sum_exp(&column.to_vec()), 0.0, epsilon = 1e-9);
    }
}

#[test]
fn test_importance_sampled_estimate() {
    setup_logger();
    let ctx = context(1000.0, vec![0.0, 1000.0], 20, None);
    let genealogies = genealogies();
    assert_eq!(genealogies.len(), 2);
    let evidence = Evidence::prepare(&ctx, &genealogies, &AncientSamples::empty());

    let estimate: SelectionEstimate =
        estimate_selection(&ctx, &evidence, &NelderMeadOptions::default()).unwrap();

    assert_eq!(estimate.coefficients().len(), 1);
    let s = estimate.coefficients()[0];
    assert!(s.is_finite() && s.abs() <= 0.1);
    assert!(estimate.neg_log_likelihood().is_finite());
    assert!(estimate.ln_likelihood_ratio() >= 0.0);

    let posterior = estimate.posterior().ln_probs();
    assert_eq!(posterior.shape(), &[20, 1000]);
    assert_normalized(posterior);
}

#[test]
fn test_objective_bounds() {
    let ctx = context(200.0, vec![0.0, 100.0, 200.0], 15, None);
    let evidence = Evidence::prepare(&ctx, &genealogies(), &AncientSamples::empty());
    let objective = LikelihoodObjective::new(&ctx, &evidence);

    for s in &[[0.11, 0.0], [0.0, -0.2], [1.0, 1.0], [f64::NAN, 0.0]] {
        assert_eq!(objective.evaluate(s), Cost::Infeasible);
        assert_eq!(objective.neg_log_likelihood(s), f64::INFINITY);
    }
    assert!(objective.neg_log_likelihood(&[0.1, -0.1]).is_finite());
}

#[test]
fn test_objective_depends_on_expanded_trajectory_only() {
    let coarse = context(200.0, vec![0.0, 200.0], 15, None);
    let fine = context(200.0, vec![0.0, 50.0, 120.0, 200.0], 15, None);
    let genealogies = genealogies();

    let coarse_evidence = Evidence::prepare(&coarse, &genealogies, &AncientSamples::empty());
    let fine_evidence = Evidence::prepare(&fine, &genealogies, &AncientSamples::empty());
    let coarse_cost = LikelihoodObjective::new(&coarse, &coarse_evidence).evaluate(&[0.04]);
    let fine_cost = LikelihoodObjective::new(&fine, &fine_evidence).evaluate(&[0.04, 0.04, 0.04]);
    assert_eq!(coarse.expand_selection(&[0.04]), fine.expand_selection(&[0.04, 0.04, 0.04]));
    assert_eq!(coarse_cost, fine_cost);
}

#[test]
fn test_single_sample_without_importance_sampling() {
    let ctx = context(200.0, vec![0.0, 200.0], 15, None);
    let genealogies = Genealogies::from_sampled_times(
        &array![[35.0, 140.0, 610.0], [42.0, 155.0, 580.0]],
        &array![[260.0, 890.0], [310.0, 760.0]],
        1,
        1,
    )
    .unwrap();
    assert!(matches!(genealogies, Genealogies::SingleSample(_)));
    let evidence = Evidence::prepare(&ctx, &genealogies, &AncientSamples::empty());
    assert!(!evidence.is_importance_sampling());

    let objective = LikelihoodObjective::new(&ctx, &evidence);
    let posterior = TrajectoryReconstructor::new(&ctx, &evidence)
        .reconstruct(&[0.02])
        .unwrap();
    // the raw likelihood of the single sample, no proposal correction
    assert_abs_diff_eq!(
        -posterior.ln_likelihood(),
        objective.neg_log_likelihood(&[0.02]),
        epsilon = 1e-9
    );
}

#[test]
fn test_ancient_only_trajectory() {
    let ctx = context(51.0, vec![0.0, 51.0], 15, None);
    let ancient = AncientSamples::new(array![
        [10.0, f64::NEG_INFINITY, -2.0, 0.0],
        [30.0, -0.5, 0.0, -3.0],
        [50.0, 0.0, -1.0, -4.0]
    ])
    .unwrap();
    let evidence = Evidence::prepare(&ctx, &Genealogies::NoData, &ancient);
    let posterior = TrajectoryReconstructor::new(&ctx, &evidence)
        .reconstruct(&[0.01])
        .unwrap();

    assert_eq!(posterior.ln_probs().shape(), &[15, 51]);
    assert!(posterior.ln_likelihood().is_finite());
    assert_normalized(posterior.ln_probs());
}

#[test]
fn test_flat_posterior_without_evidence() {
    let ctx = context(30.0, vec![0.0, 30.0], 12, None);
    let evidence = Evidence::prepare(&ctx, &Genealogies::NoData, &AncientSamples::empty());
    let posterior = TrajectoryReconstructor::new(&ctx, &evidence)
        .reconstruct(&[0.0])
        .unwrap();
    for p in posterior.ln_probs().iter() {
        assert_abs_diff_eq!(*p, -(12f64).ln(), epsilon = 1e-12);
    }
}

#[test]
fn test_artifact_round_trip() {
    let ctx = context(40.0, vec![0.0, 40.0], 10, Some(0.4));
    let ancient = AncientSamples::new(array![[20.0, -1.0, 0.0, -1.0]]).unwrap();
    let evidence = Evidence::prepare(&ctx, &Genealogies::NoData, &ancient);
    let posterior = TrajectoryReconstructor::new(&ctx, &evidence)
        .reconstruct(&[-0.01])
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("trajectory");
    let artifacts = TrajectoryArtifacts::from_posterior(&ctx, &posterior);
    artifacts.write(&prefix).unwrap();
    let reloaded = TrajectoryArtifacts::read(&prefix).unwrap();

    assert_eq!(reloaded, artifacts);
    assert_eq!(reloaded.posterior(), posterior.ln_probs());
    assert_eq!(reloaded.epochs().len(), 40);
    assert_eq!(reloaded.freqs().len(), 10);
}

fn write_time_file(path: &Path) {
    // 4 derived and 3 ancestral haplotypes, two sampled genealogies
    let mut data = Vec::new();
    data.write_i32::<LittleEndian>(1).unwrap();
    data.write_i32::<LittleEndian>(2).unwrap();
    for value in &[1000, 4, 7] {
        data.write_i32::<LittleEndian>(*value).unwrap();
    }
    for t in &[26.0f32, 89.0, 31.0, 76.0] {
        data.write_f32::<LittleEndian>(*t).unwrap();
    }
    for t in &[3.5f32, 14.0, 61.0, 4.2, 15.5, 58.0] {
        data.write_f32::<LittleEndian>(*t).unwrap();
    }
    File::create(path).unwrap().write_all(&data).unwrap();
}

#[test]
fn test_command_line_run() {
    setup_logger();
    let dir = tempfile::tempdir().unwrap();
    write_time_file(&dir.path().join("locus.palm"));
    let out = dir.path().join("result");

    let opt = Seltrace::from_iter(vec![
        "seltrace".to_owned(),
        "--times".to_owned(),
        dir.path().join("locus").display().to_string(),
        "--out".to_owned(),
        out.display().to_string(),
        "--t-cutoff".to_owned(),
        "100".to_owned(),
        "--freq-bins".to_owned(),
        "15".to_owned(),
    ]);
    assert_eq!(opt.population_size, 10000.0);
    cli::run(opt).unwrap();

    let artifacts = TrajectoryArtifacts::read(&out).unwrap();
    assert_eq!(artifacts.epochs().len(), 100);
    assert_eq!(artifacts.freqs().len(), 15);
    assert_eq!(artifacts.posterior().shape(), &[15, 100]);
    assert_normalized(artifacts.posterior());
}

#[test]
fn test_command_line_requires_data() {
    let opt = Seltrace::from_iter(vec!["seltrace"]);
    assert!(cli::run(opt).is_err());
}
