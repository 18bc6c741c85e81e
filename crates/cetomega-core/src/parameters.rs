//! CETΩ model parameters
//!
//! The full parameter vector of the model, in the fixed order
//! $(H_0, \Omega_m, \Omega_r, \Omega_\Omega, \alpha_0, \alpha_1, \kappa)$.

use crate::constants::{
    ALPHA0_DEFAULT, ALPHA1_DEFAULT, H0_DEFAULT, KAPPA_DEFAULT, OMEGA_M_DEFAULT, OMEGA_R_DEFAULT,
};
use crate::errors::{CosmologyError, CosmologyResult};
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Number of entries in the full parameter vector.
pub const N_MODEL_PARAMETERS: usize = 7;

/// Parameters of the CETΩ expansion history.
///
/// The density fractions are expected to close,
/// $\Omega_m + \Omega_r + \Omega_\Omega = 1$, but this is not enforced: callers
/// that build parameter sets by hand are responsible for it. Use
/// [`ModelParameters::flat`] to derive $\Omega_\Omega$ from closure.
///
/// # Default Values
///
/// Defaults describe a flat universe with $H_0 = 70$, $\Omega_m = 0.3$,
/// $\Omega_r = 9 \times 10^{-5}$, $\alpha_0 = 3$, $\alpha_1 = 0.5$ and $\kappa = 1$.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    /// Hubble constant (km/s/Mpc).
    /// Default: 70.0
    pub h0: FloatValue,

    /// Matter density fraction (dimensionless).
    /// Default: 0.3
    pub omega_m: FloatValue,

    /// Radiation density fraction (dimensionless).
    /// Default: 9e-5
    pub omega_r: FloatValue,

    /// CETΩ density fraction (dimensionless).
    /// Default: $1 - \Omega_m - \Omega_r$
    pub omega_omega: FloatValue,

    /// Structural exponent today, $\alpha(a = 1)$.
    /// Default: 3.0
    pub alpha0: FloatValue,

    /// Linear evolution of the structural exponent with $1 - a$.
    /// Default: 0.5
    pub alpha1: FloatValue,

    /// Coupling of the logarithmic term in the equation of state.
    /// Default: 1.0
    pub kappa: FloatValue,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self::flat(
            H0_DEFAULT,
            OMEGA_M_DEFAULT,
            OMEGA_R_DEFAULT,
            ALPHA0_DEFAULT,
            ALPHA1_DEFAULT,
            KAPPA_DEFAULT,
        )
    }
}

impl ModelParameters {
    /// Build a parameter set whose CETΩ fraction closes the density budget.
    ///
    /// $$\Omega_\Omega = 1 - \Omega_m - \Omega_r$$
    pub fn flat(
        h0: FloatValue,
        omega_m: FloatValue,
        omega_r: FloatValue,
        alpha0: FloatValue,
        alpha1: FloatValue,
        kappa: FloatValue,
    ) -> Self {
        Self {
            h0,
            omega_m,
            omega_r,
            omega_omega: 1.0 - omega_m - omega_r,
            alpha0,
            alpha1,
            kappa,
        }
    }

    /// Departure from a closed density budget, $\Omega_m + \Omega_r + \Omega_\Omega - 1$.
    pub fn closure_residual(&self) -> FloatValue {
        self.omega_m + self.omega_r + self.omega_omega - 1.0
    }

    /// Parameters in the canonical order
    /// $(H_0, \Omega_m, \Omega_r, \Omega_\Omega, \alpha_0, \alpha_1, \kappa)$.
    pub fn to_array(&self) -> [FloatValue; N_MODEL_PARAMETERS] {
        [
            self.h0,
            self.omega_m,
            self.omega_r,
            self.omega_omega,
            self.alpha0,
            self.alpha1,
            self.kappa,
        ]
    }

    /// Inverse of [`ModelParameters::to_array`].
    pub fn from_array(values: [FloatValue; N_MODEL_PARAMETERS]) -> Self {
        let [h0, omega_m, omega_r, omega_omega, alpha0, alpha1, kappa] = values;
        Self {
            h0,
            omega_m,
            omega_r,
            omega_omega,
            alpha0,
            alpha1,
            kappa,
        }
    }

    /// Check that every entry is finite and that $H_0 > 0$.
    ///
    /// An open density budget is allowed but logged.
    pub fn validate(&self) -> CosmologyResult<()> {
        if let Some(position) = self.to_array().iter().position(|v| !v.is_finite()) {
            return Err(CosmologyError::InvalidParameter(format!(
                "Parameter at position {} is not finite: {:?}",
                position, self
            )));
        }
        if self.h0 <= 0.0 {
            return Err(CosmologyError::InvalidParameter(format!(
                "H0 must be positive, got {}",
                self.h0
            )));
        }
        let residual = self.closure_residual();
        if residual.abs() > 1e-6 {
            warn!(
                residual,
                "Density fractions do not sum to one; the model is not spatially flat"
            );
        }
        Ok(())
    }
}
