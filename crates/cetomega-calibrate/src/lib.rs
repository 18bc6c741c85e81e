//! Bayesian calibration of the CETΩ model against BAO distance measurements.
//!
//! The pieces, leaf first:
//!
//! - [`ObservationSet`]: BAO measurements of $D_M/r_d$ and $D_H/r_d$ loaded
//!   from a whitespace-delimited table
//! - [`BaoLikelihood`]: chi-squared of the model distances against the data
//! - [`Posterior`]: flat priors on the free parameters combined with the
//!   likelihood
//! - [`MetropolisSampler`]: a seeded random-walk Metropolis chain over
//!   $(\Omega_m, \alpha_0, \alpha_1)$
//! - [`Chain`]: the recorded trajectory, consumed by external plotting tools
//!
//! [`RunConfig`] ties them together from a TOML file.

pub mod chain;
pub mod config;
pub mod likelihood;
pub mod observations;
pub mod posterior;
pub mod priors;
pub mod sampler;

pub use chain::Chain;
pub use config::{CosmologyConfig, RunConfig};
pub use likelihood::{chi_squared, BaoLikelihood, BaoResiduals};
pub use observations::{ObservationRow, ObservationSet};
pub use posterior::{FixedParameters, LogPosterior, Posterior};
pub use priors::{FreeParameter, FreeParameters, PriorBounds, ProposalScale};
pub use sampler::{
    metropolis_accept, BestFit, MetropolisSampler, ProgressInfo, SamplerConfig, SamplerRun,
    SamplingResult, StepOutcome,
};

use cetomega_core::CosmologyError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading data, configuring or running a calibration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed observation data: {0}")]
    Format(String),
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Sampling error: {0}")]
    Sampling(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Cosmology(#[from] CosmologyError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience type for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
