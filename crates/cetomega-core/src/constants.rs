//! Physical constants and model defaults.

use crate::FloatValue;

/// Speed of light (km/s).
pub const C_LIGHT: FloatValue = 299_792.458;

/// Default Hubble constant (km/s/Mpc).
pub const H0_DEFAULT: FloatValue = 70.0;

/// Default matter density fraction.
pub const OMEGA_M_DEFAULT: FloatValue = 0.3;

/// Default radiation density fraction.
pub const OMEGA_R_DEFAULT: FloatValue = 9e-5;

/// Default constant part of the structural exponent.
pub const ALPHA0_DEFAULT: FloatValue = 3.0;

/// Default linear evolution of the structural exponent.
pub const ALPHA1_DEFAULT: FloatValue = 0.5;

/// Default coupling of the logarithmic term in $w_\Omega(a)$.
pub const KAPPA_DEFAULT: FloatValue = 1.0;
