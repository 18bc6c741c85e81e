//! Log-posterior of the free parameters
//!
//! $$\ln p(\theta | d) = \ln \pi(\theta) - \frac{1}{2} \chi^2(\theta)$$
//!
//! with a flat prior $\pi$ on $\theta = (\Omega_m, \alpha_0, \alpha_1)$. The
//! likelihood is only evaluated inside the prior bounds.

use crate::likelihood::BaoLikelihood;
use crate::priors::{FreeParameters, PriorBounds};
use crate::Result;
use cetomega_core::constants::{H0_DEFAULT, KAPPA_DEFAULT, OMEGA_R_DEFAULT};
use cetomega_core::{FloatValue, ModelParameters};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Target density of the sampler.
///
/// Implementations must never return NaN for a point that should be rejected;
/// use $-\infty$ instead.
pub trait LogPosterior {
    fn log_posterior(&self, free: &FreeParameters) -> FloatValue;
}

/// Model parameters that are not sampled.
///
/// The CETΩ density fraction is not fixed either: it closes the density budget,
/// $\Omega_\Omega = 1 - \Omega_m - \Omega_r$, for every sampled $\Omega_m$.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedParameters {
    /// Default: 70.0
    pub h0: FloatValue,
    /// Default: 9e-5
    pub omega_r: FloatValue,
    /// Default: 1.0
    pub kappa: FloatValue,
}

impl Default for FixedParameters {
    fn default() -> Self {
        Self {
            h0: H0_DEFAULT,
            omega_r: OMEGA_R_DEFAULT,
            kappa: KAPPA_DEFAULT,
        }
    }
}

impl FixedParameters {
    /// Merge with a sampled point into the full parameter vector.
    pub fn assemble(&self, free: &FreeParameters) -> ModelParameters {
        ModelParameters::flat(
            self.h0,
            free.omega_m,
            self.omega_r,
            free.alpha0,
            free.alpha1,
            self.kappa,
        )
    }
}

/// Flat prior times BAO likelihood.
#[derive(Debug, Clone)]
pub struct Posterior {
    likelihood: BaoLikelihood,
    fixed: FixedParameters,
    bounds: PriorBounds,
}

impl Posterior {
    pub fn new(
        likelihood: BaoLikelihood,
        fixed: FixedParameters,
        bounds: PriorBounds,
    ) -> Result<Self> {
        bounds.validate()?;
        Ok(Self {
            likelihood,
            fixed,
            bounds,
        })
    }

    pub fn likelihood(&self) -> &BaoLikelihood {
        &self.likelihood
    }

    pub fn fixed(&self) -> &FixedParameters {
        &self.fixed
    }

    pub fn bounds(&self) -> &PriorBounds {
        &self.bounds
    }

    pub fn within_bounds(&self, free: &FreeParameters) -> bool {
        self.bounds.within_bounds(free)
    }

    pub fn log_prior(&self, free: &FreeParameters) -> FloatValue {
        self.bounds.log_prior(free)
    }

    /// $-\chi^2 / 2$ at the full parameter vector built from `free`.
    ///
    /// # Errors
    ///
    /// Domain errors from the distance integrals, e.g. a vanishing structural
    /// exponent.
    pub fn log_likelihood(&self, free: &FreeParameters) -> Result<FloatValue> {
        self.likelihood.ln_likelihood(&self.fixed.assemble(free))
    }

    /// Log-prior plus log-likelihood.
    ///
    /// Returns $-\infty$ without touching the likelihood when the point is
    /// outside the prior bounds. Points where the model is undefined also
    /// evaluate to $-\infty$.
    pub fn log_posterior(&self, free: &FreeParameters) -> FloatValue {
        let log_prior = self.log_prior(free);
        if !log_prior.is_finite() {
            return FloatValue::NEG_INFINITY;
        }

        match self.log_likelihood(free) {
            Ok(log_likelihood) if !log_likelihood.is_nan() => log_prior + log_likelihood,
            Ok(_) => {
                debug!(?free, "Log-likelihood is NaN; rejecting point");
                FloatValue::NEG_INFINITY
            }
            Err(e) => {
                debug!(?free, error = %e, "Model undefined; rejecting point");
                FloatValue::NEG_INFINITY
            }
        }
    }
}

impl LogPosterior for Posterior {
    fn log_posterior(&self, free: &FreeParameters) -> FloatValue {
        Posterior::log_posterior(self, free)
    }
}
