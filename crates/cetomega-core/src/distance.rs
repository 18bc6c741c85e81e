//! Hubble rate and BAO distances
//!
//! # What This Module Does
//!
//! 1. Integrates the CETΩ equation of state to get the evolution of the
//!    component's density,
//!    $$I(z) = \int_0^z \frac{1 + w_\Omega(a(z'))}{1 + z'} dz', \quad a = \frac{1}{1 + z}$$
//!
//! 2. Combines it with matter and radiation into the Hubble rate,
//!    $$H(z) = H_0 \sqrt{\Omega_m (1+z)^3 + \Omega_r (1+z)^4 + \Omega_\Omega e^{3 I(z)}}$$
//!
//! 3. Integrates $c / H$ to get the comoving distance,
//!    $$\chi(z) = \int_0^z \frac{c}{H(z')} dz'$$
//!
//! All distances are in Mpc. The universe is taken to be flat, so the
//! transverse comoving distance $D_M$ equals $\chi$. The radial distance is
//! $D_H = c / H(z)$.
//!
//! Nothing is cached between calls: every evaluation builds its own quadrature
//! grids.

use crate::constants::C_LIGHT;
use crate::equation_of_state::effective_equation_of_state;
use crate::errors::{CosmologyError, CosmologyResult};
use crate::parameters::ModelParameters;
use crate::quadrature::{integrate_from_zero, QuadratureSettings};
use crate::FloatValue;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Evaluates the CETΩ expansion history on fixed-resolution quadrature grids.
///
/// The integrator only holds its grid resolution, so it is `Copy` and can be
/// shared freely between threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceIntegrator {
    quadrature: QuadratureSettings,
}

impl DistanceIntegrator {
    /// Create an integrator with custom grid resolution.
    pub fn new(quadrature: QuadratureSettings) -> CosmologyResult<Self> {
        quadrature.validate()?;
        Ok(Self { quadrature })
    }

    pub fn quadrature(&self) -> QuadratureSettings {
        self.quadrature
    }

    /// Integral of $(1 + w_\Omega) / (1 + z')$ from 0 to `z`.
    fn dark_energy_integral(
        &self,
        z: FloatValue,
        params: &ModelParameters,
    ) -> CosmologyResult<FloatValue> {
        integrate_from_zero(z, self.quadrature.hubble_points, |zp| {
            let a = 1.0 / (1.0 + zp);
            let w = effective_equation_of_state(a, params.alpha0, params.alpha1, params.kappa)?;
            Ok((1.0 + w) / (1.0 + zp))
        })
    }

    /// Dimensionless $E^2(z) = H^2(z) / H_0^2$.
    ///
    /// # Errors
    ///
    /// Domain errors from the equation of state, or
    /// [`CosmologyError::UndefinedExpansionRate`] when $E^2$ is not a finite
    /// positive number.
    pub fn expansion_rate_squared(
        &self,
        z: FloatValue,
        params: &ModelParameters,
    ) -> CosmologyResult<FloatValue> {
        check_redshift(z)?;

        let integral = self.dark_energy_integral(z, params)?;
        let expo = (3.0 * integral).exp();
        let opz = 1.0 + z;

        let e2 = params.omega_m * opz.powi(3)
            + params.omega_r * opz.powi(4)
            + params.omega_omega * expo;
        if !(e2.is_finite() && e2 > 0.0) {
            return Err(CosmologyError::UndefinedExpansionRate { z, value: e2 });
        }
        Ok(e2)
    }

    /// Hubble rate $H(z)$ in km/s/Mpc.
    pub fn hubble_rate(
        &self,
        z: FloatValue,
        params: &ModelParameters,
    ) -> CosmologyResult<FloatValue> {
        Ok(params.h0 * self.expansion_rate_squared(z, params)?.sqrt())
    }

    /// Comoving distance $\chi(z)$ in Mpc.
    ///
    /// The Hubble rate is recomputed at every one of the `distance_points`
    /// grid nodes, each with its own `hubble_points` grid.
    pub fn comoving_distance(
        &self,
        z: FloatValue,
        params: &ModelParameters,
    ) -> CosmologyResult<FloatValue> {
        check_redshift(z)?;

        integrate_from_zero(z, self.quadrature.distance_points, |zp| {
            Ok(C_LIGHT / self.hubble_rate(zp, params)?)
        })
    }

    /// Transverse comoving distance $D_M(z)$ in Mpc.
    ///
    /// Identical to [`DistanceIntegrator::comoving_distance`] since there is
    /// no curvature term.
    pub fn transverse_comoving_distance(
        &self,
        z: FloatValue,
        params: &ModelParameters,
    ) -> CosmologyResult<FloatValue> {
        self.comoving_distance(z, params)
    }

    /// Radial (Hubble) distance $D_H(z) = c / H(z)$ in Mpc.
    pub fn radial_distance(
        &self,
        z: FloatValue,
        params: &ModelParameters,
    ) -> CosmologyResult<FloatValue> {
        Ok(C_LIGHT / self.hubble_rate(z, params)?)
    }

    /// [`DistanceIntegrator::hubble_rate`] at each redshift.
    pub fn hubble_rates(
        &self,
        redshifts: &[FloatValue],
        params: &ModelParameters,
    ) -> CosmologyResult<Array1<FloatValue>> {
        self.map_redshifts(redshifts, |z| self.hubble_rate(z, params))
    }

    /// [`DistanceIntegrator::transverse_comoving_distance`] at each redshift.
    pub fn transverse_comoving_distances(
        &self,
        redshifts: &[FloatValue],
        params: &ModelParameters,
    ) -> CosmologyResult<Array1<FloatValue>> {
        self.map_redshifts(redshifts, |z| self.transverse_comoving_distance(z, params))
    }

    /// [`DistanceIntegrator::radial_distance`] at each redshift.
    pub fn radial_distances(
        &self,
        redshifts: &[FloatValue],
        params: &ModelParameters,
    ) -> CosmologyResult<Array1<FloatValue>> {
        self.map_redshifts(redshifts, |z| self.radial_distance(z, params))
    }

    /// Evaluate $H$, $D_M$ and $D_H$ at each redshift.
    pub fn tabulate(
        &self,
        redshifts: &[FloatValue],
        params: &ModelParameters,
    ) -> CosmologyResult<DistanceTable> {
        Ok(DistanceTable {
            redshift: Array1::from(redshifts.to_vec()),
            hubble_rate: self.hubble_rates(redshifts, params)?,
            transverse_comoving_distance: self.transverse_comoving_distances(redshifts, params)?,
            radial_distance: self.radial_distances(redshifts, params)?,
        })
    }

    fn map_redshifts<F>(
        &self,
        redshifts: &[FloatValue],
        f: F,
    ) -> CosmologyResult<Array1<FloatValue>>
    where
        F: Fn(FloatValue) -> CosmologyResult<FloatValue>,
    {
        redshifts.iter().map(|&z| f(z)).collect()
    }
}

/// The integrals are defined for $z > -1$ (positive scale factor).
fn check_redshift(z: FloatValue) -> CosmologyResult<()> {
    if !(z > -1.0) || !z.is_finite() {
        return Err(CosmologyError::RedshiftOutOfDomain(z));
    }
    Ok(())
}

/// Expansion history sampled on a set of redshifts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceTable {
    pub redshift: Array1<FloatValue>,
    /// km/s/Mpc
    pub hubble_rate: Array1<FloatValue>,
    /// Mpc
    pub transverse_comoving_distance: Array1<FloatValue>,
    /// Mpc
    pub radial_distance: Array1<FloatValue>,
}

/// One redshift of a [`DistanceTable`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceRow {
    pub z: FloatValue,
    pub hubble_rate: FloatValue,
    pub dm: FloatValue,
    pub dh: FloatValue,
}

impl DistanceTable {
    pub fn len(&self) -> usize {
        self.redshift.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redshift.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = DistanceRow> + '_ {
        (0..self.len()).map(move |i| DistanceRow {
            z: self.redshift[i],
            hubble_rate: self.hubble_rate[i],
            dm: self.transverse_comoving_distance[i],
            dh: self.radial_distance[i],
        })
    }
}
