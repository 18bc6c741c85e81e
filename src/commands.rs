use anyhow::{bail, Context, Result};
use cetomega_calibrate::{FreeParameters, ObservationSet, RunConfig, SamplingResult};
use cetomega_core::quadrature::uniform_grid;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Serialize)]
struct DistanceRecord {
    z: f64,
    #[serde(rename = "H")]
    hubble_rate: f64,
    #[serde(rename = "DM")]
    dm: f64,
    #[serde(rename = "DH")]
    dh: f64,
}

#[derive(Serialize)]
struct PullRecord {
    z: f64,
    dm_over_rd_obs: f64,
    dm_over_rd_model: f64,
    dm_pull: f64,
    dh_over_rd_obs: f64,
    dh_over_rd_model: f64,
    dh_pull: f64,
}

fn writer_for(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    })
}

fn load_observations(config: &RunConfig) -> Result<Arc<ObservationSet>> {
    let observations = ObservationSet::load(&config.data)
        .with_context(|| format!("Failed to load observations {}", config.data.display()))?;
    Ok(Arc::new(observations))
}

/// Tabulate $H$, $D_M$ and $D_H$ on `points` redshifts spanning `[0, z_max]`.
pub fn summary(
    config: &RunConfig,
    point: FreeParameters,
    z_max: f64,
    points: usize,
    output: Option<&Path>,
) -> Result<()> {
    if !(z_max.is_finite() && z_max >= 0.0) || points == 0 {
        bail!("Redshift grid needs z_max >= 0 and at least one point");
    }

    let params = config.fixed_parameters().assemble(&point);
    params.validate()?;
    let redshifts = uniform_grid(z_max, points).to_vec();
    let table = config.integrator()?.tabulate(&redshifts, &params)?;

    let mut writer = csv::Writer::from_writer(writer_for(output)?);
    for row in table.rows() {
        writer.serialize(DistanceRecord {
            z: row.z,
            hubble_rate: row.hubble_rate,
            dm: row.dm,
            dh: row.dh,
        })?;
    }
    writer.flush()?;

    info!(points, z_max, ?point, "Wrote distance table");
    Ok(())
}

/// Evaluate the chi-squared at one point and optionally write the pulls.
pub fn chi2(config: &RunConfig, point: FreeParameters, output: Option<&Path>) -> Result<()> {
    let observations = load_observations(config)?;
    let posterior = config.build_posterior(Arc::clone(&observations))?;

    if !posterior.within_bounds(&point) {
        warn!(?point, "Point lies outside the prior bounds");
    }

    let params = config.fixed_parameters().assemble(&point);
    params.validate()?;
    let residuals = posterior
        .likelihood()
        .residuals(&params)
        .context("Model is undefined at this point")?;

    println!(
        "chi2 = {:.6} (DM: {:.6}, DH: {:.6}, {} bins)",
        residuals.chi_squared(),
        residuals.chi_squared_dm(),
        residuals.chi_squared_dh(),
        observations.len()
    );

    if let Some(path) = output {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for (i, row) in observations.rows().enumerate() {
            writer.serialize(PullRecord {
                z: row.z,
                dm_over_rd_obs: row.dm_over_rd,
                dm_over_rd_model: residuals.dm_over_rd_model[i],
                dm_pull: residuals.dm_pull[i],
                dh_over_rd_obs: row.dh_over_rd,
                dh_over_rd_model: residuals.dh_over_rd_model[i],
                dh_pull: residuals.dh_pull[i],
            })?;
        }
        writer.flush()?;
        info!(path = %path.display(), "Wrote pulls");
    }
    Ok(())
}

fn report(result: &SamplingResult) {
    println!(
        "seed {}: {} steps, acceptance rate {:.3}",
        result.seed,
        result.n_steps,
        result.acceptance_rate()
    );
    match result.best_fit() {
        Some(best) => println!(
            "  best: Omega_m = {:.5}, alpha0 = {:.5}, alpha1 = {:.5}, log_posterior = {:.4}",
            best.parameters.omega_m,
            best.parameters.alpha0,
            best.parameters.alpha1,
            best.log_posterior
        ),
        None => warn!(seed = result.seed, "No finite post-burn-in point"),
    }
}

fn save(result: &SamplingResult, output_dir: &Path, stem: &str) -> Result<()> {
    let csv_path = output_dir.join(format!("{}.csv", stem));
    result
        .chain
        .write_csv(&csv_path, result.burn_in)
        .with_context(|| format!("Failed to write {}", csv_path.display()))?;

    let bin_path = output_dir.join(format!("{}.bin", stem));
    result
        .chain
        .save(&bin_path)
        .with_context(|| format!("Failed to write {}", bin_path.display()))?;

    info!(
        csv = %csv_path.display(),
        chain = %bin_path.display(),
        "Saved chain"
    );
    Ok(())
}

/// Run one or more chains and save them under `output_dir`.
///
/// The CSV files hold the post-burn-in rows; the binary files hold the whole
/// chain.
pub fn sample(config: &RunConfig, chains: usize, output_dir: &Path) -> Result<()> {
    if chains == 0 {
        bail!("At least one chain is required");
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let observations = load_observations(config)?;
    let sampler = config.build_sampler(observations)?;

    if chains == 1 {
        let result = sampler.run();
        report(&result);
        return save(&result, output_dir, "chain");
    }

    let first_seed = config.sampler.seed;
    let seeds: Vec<u64> = (0..chains as u64)
        .map(|i| first_seed.wrapping_add(i))
        .collect();
    let results = sampler.run_chains(&seeds);
    for (i, result) in results.iter().enumerate() {
        report(result);
        save(result, output_dir, &format!("chain_{}", i))?;
    }
    Ok(())
}
