//! Run configuration
//!
//! A run is described by a TOML file. Every section is optional and missing
//! values fall back to the reference analysis:
//!
//! ```toml
//! data = "data/mock_bao.txt"
//!
//! [cosmology]
//! h0 = 70.0
//! omega_r = 9e-5
//! kappa = 1.0
//! sound_horizon = 147.0
//!
//! [quadrature]
//! hubble_points = 300
//! distance_points = 600
//!
//! [sampler]
//! n_steps = 20000
//! burn_in = 5000
//! seed = 42
//! progress_every = 1000
//!
//! [sampler.start]
//! Omega_m = 0.3
//! alpha0 = 3.0
//! alpha1 = 0.5
//!
//! [sampler.priors]
//! Omega_m = [0.1, 0.5]
//! alpha0 = [1.5, 6.0]
//! alpha1 = [-2.0, 2.0]
//!
//! [sampler.proposal_scale]
//! Omega_m = 0.02
//! alpha0 = 0.2
//! alpha1 = 0.1
//! ```

use crate::likelihood::BaoLikelihood;
use crate::observations::ObservationSet;
use crate::posterior::{FixedParameters, Posterior};
use crate::sampler::{MetropolisSampler, SamplerConfig};
use crate::{Error, Result};
use cetomega_core::constants::{H0_DEFAULT, KAPPA_DEFAULT, OMEGA_R_DEFAULT};
use cetomega_core::{DistanceIntegrator, FloatValue, QuadratureSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Parameters held fixed during a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmologyConfig {
    /// Hubble constant in km/s/Mpc. Default: 70.0
    pub h0: FloatValue,
    /// Default: 9e-5
    pub omega_r: FloatValue,
    /// Default: 1.0
    pub kappa: FloatValue,
    /// Sound horizon at the drag epoch $r_d$ in Mpc. Default: 147.0
    pub sound_horizon: FloatValue,
}

impl Default for CosmologyConfig {
    fn default() -> Self {
        Self {
            h0: H0_DEFAULT,
            omega_r: OMEGA_R_DEFAULT,
            kappa: KAPPA_DEFAULT,
            sound_horizon: 147.0,
        }
    }
}

/// Everything needed to run a calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Path to the BAO observation table
    ///
    /// Default: data/mock_bao.txt
    pub data: PathBuf,
    pub cosmology: CosmologyConfig,
    pub quadrature: QuadratureSettings,
    pub sampler: SamplerConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data: PathBuf::from("data/mock_bao.txt"),
            cosmology: CosmologyConfig::default(),
            quadrature: QuadratureSettings::default(),
            sampler: SamplerConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parse and validate a configuration.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(content)
            .map_err(|e| Error::InvalidConfiguration(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "Loaded run configuration");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize configuration: {}", e)))
    }

    /// Reject configurations that cannot produce a run.
    pub fn validate(&self) -> Result<()> {
        let cosmology = &self.cosmology;
        if !(cosmology.sound_horizon.is_finite() && cosmology.sound_horizon > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "sound_horizon must be positive, got {}",
                cosmology.sound_horizon
            )));
        }
        if !(cosmology.h0.is_finite() && cosmology.h0 > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "h0 must be positive, got {}",
                cosmology.h0
            )));
        }
        if !(cosmology.omega_r.is_finite() && cosmology.kappa.is_finite()) {
            return Err(Error::InvalidConfiguration(
                "omega_r and kappa must be finite".to_string(),
            ));
        }
        self.quadrature
            .validate()
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        self.sampler.validate()
    }

    pub fn integrator(&self) -> Result<DistanceIntegrator> {
        Ok(DistanceIntegrator::new(self.quadrature)?)
    }

    pub fn fixed_parameters(&self) -> FixedParameters {
        FixedParameters {
            h0: self.cosmology.h0,
            omega_r: self.cosmology.omega_r,
            kappa: self.cosmology.kappa,
        }
    }

    pub fn likelihood(&self, observations: Arc<ObservationSet>) -> Result<BaoLikelihood> {
        BaoLikelihood::new(
            observations,
            self.cosmology.sound_horizon,
            self.integrator()?,
        )
    }

    pub fn build_posterior(&self, observations: Arc<ObservationSet>) -> Result<Posterior> {
        Posterior::new(
            self.likelihood(observations)?,
            self.fixed_parameters(),
            self.sampler.priors.clone(),
        )
    }

    /// Wire observations, posterior and sampler together.
    pub fn build_sampler(
        &self,
        observations: Arc<ObservationSet>,
    ) -> Result<MetropolisSampler<Posterior>> {
        MetropolisSampler::new(self.build_posterior(observations)?, self.sampler.clone())
    }
}
