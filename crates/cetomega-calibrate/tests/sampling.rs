//! End-to-end calibration runs on synthetic BAO data.
//!
//! The observations are generated from the model itself, so the generating
//! point has $\chi^2 = 0$ and is the global maximum of the posterior.

use approx::assert_relative_eq;
use cetomega_calibrate::{
    Chain, FreeParameter, FreeParameters, ObservationSet, RunConfig, SamplingResult,
};
use cetomega_core::QuadratureSettings;
use std::fmt::Write as _;
use std::sync::Arc;

const TRUTH: FreeParameters = FreeParameters {
    omega_m: 0.3,
    alpha0: 3.0,
    alpha1: 0.5,
};

fn config(n_steps: usize, burn_in: usize) -> RunConfig {
    let mut config = RunConfig::default();
    config.quadrature = QuadratureSettings {
        hubble_points: 40,
        distance_points: 60,
    };
    config.sampler.n_steps = n_steps;
    config.sampler.burn_in = burn_in;
    config.sampler.progress_every = 250;
    config.sampler.start = TRUTH;
    config
}

/// Observation table written in the on-disk format, with the measurements
/// placed exactly on the model.
fn synthetic_table(config: &RunConfig) -> String {
    let integrator = config.integrator().unwrap();
    let params = config.fixed_parameters().assemble(&TRUTH);
    let rd = config.cosmology.sound_horizon;

    let mut table = String::from("# z DM/rd DH/rd sigma_DM sigma_DH corr\n");
    for (z, sigma_dm, sigma_dh) in [(0.51, 0.17, 0.43), (0.93, 0.15, 0.19), (2.33, 0.53, 0.10)] {
        let dm = integrator.transverse_comoving_distance(z, &params).unwrap() / rd;
        let dh = integrator.radial_distance(z, &params).unwrap() / rd;
        writeln!(
            table,
            "{} {:e} {:e} {} {} -0.4",
            z, dm, dh, sigma_dm, sigma_dh
        )
        .unwrap();
    }
    table
}

fn observations(config: &RunConfig) -> Arc<ObservationSet> {
    Arc::new(synthetic_table(config).parse().unwrap())
}

fn run(config: &RunConfig) -> SamplingResult {
    config.build_sampler(observations(config)).unwrap().run()
}

#[test]
fn truth_has_zero_chi_squared() {
    let config = config(10, 0);
    let posterior = config.build_posterior(observations(&config)).unwrap();

    let params = config.fixed_parameters().assemble(&TRUTH);
    let chi2 = posterior.likelihood().chi_squared(&params).unwrap();
    assert_relative_eq!(chi2, 0.0, epsilon = 1e-12);
    assert!(posterior.log_posterior(&FreeParameters::new(0.33, 3.0, 0.5)) < -1e-3);
}

#[test]
fn run_is_reproducible() {
    let config = config(400, 100);

    let first = run(&config);
    let second = run(&config);

    assert_eq!(first.chain.len(), 400);
    assert_eq!(first.chain, second.chain);
    assert_eq!(first.acceptance_rate(), second.acceptance_rate());
    assert_eq!(first.best_fit(), second.best_fit());
}

#[test]
fn chain_stays_near_the_maximum() {
    let config = config(1500, 500);
    let result = run(&config);

    let log_probs = result.chain.flat_log_probs(0);
    assert!(log_probs.iter().all(|&lp| lp.is_finite() && lp <= 1e-12));

    let rate = result.acceptance_rate();
    assert!(rate > 0.0 && rate < 1.0, "acceptance rate {}", rate);

    let best = result.best_fit().unwrap();
    assert!(best.step >= 500);
    assert!(best.log_posterior > -3.0, "best {:?}", best);

    let bounds = &config.sampler.priors;
    for i in 0..result.chain.len() {
        let state = FreeParameters::from_slice(result.chain.sample(i).unwrap()).unwrap();
        assert!(bounds.within_bounds(&state));
    }
}

#[test]
fn narrow_prior_is_respected() {
    let mut config = config(600, 100);
    config
        .sampler
        .priors
        .insert("Omega_m", 0.295, 0.305)
        .insert("alpha0", 2.9, 3.1);
    let result = run(&config);

    let samples = result.chain.to_param_map(0);
    assert!(samples[FreeParameter::OmegaM.name()]
        .iter()
        .all(|&v| (0.295..=0.305).contains(&v)));
    assert!(samples[FreeParameter::Alpha0.name()]
        .iter()
        .all(|&v| (2.9..=3.1).contains(&v)));
}

#[test]
fn parallel_chains_are_independent_and_reproducible() {
    let config = config(200, 50);
    let sampler = config.build_sampler(observations(&config)).unwrap();

    let results = sampler.run_chains(&[42, 43]);
    assert_eq!(results[0].chain, sampler.run().chain);
    assert_ne!(results[0].chain, results[1].chain);
}

#[test]
fn outputs_can_be_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("bao.txt");
    let mut config = config(300, 100);
    std::fs::write(&data_path, synthetic_table(&config)).unwrap();
    config.data = data_path;

    let observations = ObservationSet::load(&config.data).unwrap();
    assert_eq!(observations.len(), 3);
    let result = config.build_sampler(Arc::new(observations)).unwrap().run();

    let chain_path = dir.path().join("chain.bin");
    result.chain.save(&chain_path).unwrap();
    assert_eq!(Chain::load(&chain_path).unwrap(), result.chain);

    let csv_path = dir.path().join("chain.csv");
    result.chain.write_csv(&csv_path, result.burn_in).unwrap();
    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    assert_eq!(
        reader.headers().unwrap(),
        vec!["Omega_m", "alpha0", "alpha1", "log_posterior"]
    );

    let rows: Vec<Vec<f64>> = reader
        .records()
        .map(|record| {
            record
                .unwrap()
                .iter()
                .map(|field| field.parse().unwrap())
                .collect()
        })
        .collect();
    assert_eq!(rows.len(), 200);
    let flat = result.chain.flat_samples(result.burn_in);
    let log_probs = result.chain.flat_log_probs(result.burn_in);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row[..3], flat.row(i).to_vec()[..]);
        assert_eq!(row[3], log_probs[i]);
    }
}
