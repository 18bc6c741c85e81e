//! CETΩ command-line interface
//!
//! ```bash
//! # H(z), D_M(z) and D_H(z) on a redshift grid
//! cetomega summary --z-max 2 --points 50
//!
//! # chi-squared and per-bin pulls at one parameter point
//! cetomega chi2 --data data/mock_bao.txt --omega-m 0.31
//!
//! # Metropolis-Hastings run configured from a TOML file
//! cetomega sample --config cetomega.toml --output-dir runs/
//! ```

mod commands;

use anyhow::{Context, Result};
use cetomega_calibrate::{FreeParameters, RunConfig};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Fit the CETΩ expansion-rate model to BAO distance measurements
#[derive(Parser, Debug)]
#[command(name = "cetomega")]
#[command(version, about)]
struct Cli {
    /// Run configuration (TOML). Defaults are used for anything not set.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tabulate H(z), D_M(z) and D_H(z) on a uniform redshift grid as CSV
    Summary {
        #[command(flatten)]
        point: PointArgs,

        /// Largest redshift of the grid
        #[arg(long, default_value_t = 2.0)]
        z_max: f64,

        /// Number of grid points
        #[arg(long, default_value_t = 50)]
        points: usize,

        /// Output CSV file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Evaluate the BAO chi-squared at one parameter point
    Chi2 {
        #[command(flatten)]
        point: PointArgs,

        /// Observation table (overrides the configuration)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Write per-bin pulls to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the Metropolis-Hastings sampler
    Sample {
        /// Observation table (overrides the configuration)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Number of steps (overrides the configuration)
        #[arg(long)]
        steps: Option<usize>,

        /// Burn-in length (overrides the configuration)
        #[arg(long)]
        burn_in: Option<usize>,

        /// Seed of the first chain (overrides the configuration)
        #[arg(long)]
        seed: Option<u64>,

        /// Number of independent chains, seeded consecutively
        #[arg(long, default_value_t = 1)]
        chains: usize,

        /// Directory for the chain files
        #[arg(short, long, default_value = "data")]
        output_dir: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// A point in $(\Omega_m, \alpha_0, \alpha_1)$.
#[derive(Args, Debug, Clone, Copy)]
struct PointArgs {
    #[arg(long, default_value_t = 0.3, allow_negative_numbers = true)]
    omega_m: f64,

    #[arg(long, default_value_t = 3.0, allow_negative_numbers = true)]
    alpha0: f64,

    #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
    alpha1: f64,
}

impl From<PointArgs> for FreeParameters {
    fn from(point: PointArgs) -> Self {
        FreeParameters::new(point.omega_m, point.alpha0, point.alpha1)
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn load_config(path: Option<&PathBuf>) -> Result<RunConfig> {
    match path {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Summary {
            point,
            z_max,
            points,
            output,
        } => commands::summary(&config, point.into(), z_max, points, output.as_deref()),
        Command::Chi2 {
            point,
            data,
            output,
        } => {
            if let Some(data) = data {
                config.data = data;
            }
            commands::chi2(&config, point.into(), output.as_deref())
        }
        Command::Sample {
            data,
            steps,
            burn_in,
            seed,
            chains,
            output_dir,
        } => {
            if let Some(data) = data {
                config.data = data;
            }
            if let Some(steps) = steps {
                config.sampler.n_steps = steps;
            }
            if let Some(burn_in) = burn_in {
                config.sampler.burn_in = burn_in;
            }
            if let Some(seed) = seed {
                config.sampler.seed = seed;
            }
            config
                .validate()
                .context("Invalid sampler settings after command-line overrides")?;
            commands::sample(&config, chains, &output_dir)
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
