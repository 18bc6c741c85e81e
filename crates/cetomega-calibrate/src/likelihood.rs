//! BAO likelihood
//!
//! For every redshift bin the model predicts
//!
//! $$\frac{D_M(z)}{r_d}, \qquad \frac{D_H(z)}{r_d}$$
//!
//! and the chi-squared sums the squared pulls of both channels,
//!
//! $$\chi^2 = \sum_i \left(\frac{D_M(z_i)/r_d - \hat{D}_{M,i}}{\sigma_{M,i}}\right)^2
//!          + \left(\frac{D_H(z_i)/r_d - \hat{D}_{H,i}}{\sigma_{H,i}}\right)^2$$
//!
//! The $D_M$/$D_H$ correlation in the data is not used: the two channels are
//! treated as independent. The sound horizon $r_d$ is a fixed input, not a
//! fitted parameter.

use crate::observations::ObservationSet;
use crate::{Error, Result};
use cetomega_core::{DistanceIntegrator, FloatValue, ModelParameters};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Model predictions and pulls for each redshift bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaoResiduals {
    pub z: Array1<FloatValue>,
    pub dm_over_rd_model: Array1<FloatValue>,
    pub dh_over_rd_model: Array1<FloatValue>,
    /// $(D_M^{model}/r_d - D_M^{obs}/r_d) / \sigma_{D_M}$
    pub dm_pull: Array1<FloatValue>,
    /// $(D_H^{model}/r_d - D_H^{obs}/r_d) / \sigma_{D_H}$
    pub dh_pull: Array1<FloatValue>,
}

impl BaoResiduals {
    pub fn chi_squared_dm(&self) -> FloatValue {
        self.dm_pull.mapv(|p| p * p).sum()
    }

    pub fn chi_squared_dh(&self) -> FloatValue {
        self.dh_pull.mapv(|p| p * p).sum()
    }

    /// Sum of both channels.
    pub fn chi_squared(&self) -> FloatValue {
        self.chi_squared_dm() + self.chi_squared_dh()
    }
}

/// Compute model predictions and pulls against a set of observations.
pub fn residuals(
    integrator: &DistanceIntegrator,
    params: &ModelParameters,
    observations: &ObservationSet,
    sound_horizon: FloatValue,
) -> Result<BaoResiduals> {
    let z = observations.z();
    let redshifts = z.to_vec();

    let dm_over_rd_model =
        integrator.transverse_comoving_distances(&redshifts, params)? / sound_horizon;
    let dh_over_rd_model = integrator.radial_distances(&redshifts, params)? / sound_horizon;

    let dm_pull = (&dm_over_rd_model - observations.dm_over_rd()) / observations.sigma_dm();
    let dh_pull = (&dh_over_rd_model - observations.dh_over_rd()) / observations.sigma_dh();

    Ok(BaoResiduals {
        z: z.clone(),
        dm_over_rd_model,
        dh_over_rd_model,
        dm_pull,
        dh_pull,
    })
}

/// Chi-squared of the model against a set of observations.
///
/// # Errors
///
/// Propagates domain errors from the distance integrals.
pub fn chi_squared(
    integrator: &DistanceIntegrator,
    params: &ModelParameters,
    observations: &ObservationSet,
    sound_horizon: FloatValue,
) -> Result<FloatValue> {
    Ok(residuals(integrator, params, observations, sound_horizon)?.chi_squared())
}

/// Chi-squared likelihood of a fixed set of BAO observations.
///
/// The observations are held behind an [`Arc`] so that independent chains can
/// share one copy of the data.
#[derive(Debug, Clone)]
pub struct BaoLikelihood {
    observations: Arc<ObservationSet>,
    sound_horizon: FloatValue,
    integrator: DistanceIntegrator,
}

impl BaoLikelihood {
    /// # Arguments
    ///
    /// * `observations` - BAO measurements
    /// * `sound_horizon` - $r_d$ in Mpc, must be positive
    /// * `integrator` - Distance integrator (sets the quadrature resolution)
    pub fn new(
        observations: impl Into<Arc<ObservationSet>>,
        sound_horizon: FloatValue,
        integrator: DistanceIntegrator,
    ) -> Result<Self> {
        if !(sound_horizon.is_finite() && sound_horizon > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "Sound horizon must be positive, got {}",
                sound_horizon
            )));
        }
        Ok(Self {
            observations: observations.into(),
            sound_horizon,
            integrator,
        })
    }

    pub fn observations(&self) -> &ObservationSet {
        &self.observations
    }

    pub fn sound_horizon(&self) -> FloatValue {
        self.sound_horizon
    }

    pub fn integrator(&self) -> &DistanceIntegrator {
        &self.integrator
    }

    pub fn residuals(&self, params: &ModelParameters) -> Result<BaoResiduals> {
        residuals(&self.integrator, params, &self.observations, self.sound_horizon)
    }

    pub fn chi_squared(&self, params: &ModelParameters) -> Result<FloatValue> {
        chi_squared(&self.integrator, params, &self.observations, self.sound_horizon)
    }

    /// $\ln \mathcal{L} = -\chi^2 / 2$
    pub fn ln_likelihood(&self, params: &ModelParameters) -> Result<FloatValue> {
        Ok(-0.5 * self.chi_squared(params)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observations::ObservationRow;
    use approx::assert_relative_eq;
    use cetomega_core::{CosmologyError, QuadratureSettings};

    const RD: f64 = 147.0;

    fn integrator() -> DistanceIntegrator {
        DistanceIntegrator::new(QuadratureSettings {
            hubble_points: 40,
            distance_points: 50,
        })
        .unwrap()
    }

    /// Observations that sit exactly on the model, with given offsets in
    /// units of sigma.
    fn synthetic(params: &ModelParameters, offsets: &[(f64, f64)]) -> ObservationSet {
        let integrator = integrator();
        let redshifts = [0.3, 0.7, 1.5];
        let rows: Vec<ObservationRow> = redshifts
            .iter()
            .zip(offsets)
            .map(|(&z, &(dm_offset, dh_offset))| {
                let sigma_dm = 0.2;
                let sigma_dh = 0.5;
                ObservationRow {
                    z,
                    dm_over_rd: integrator.transverse_comoving_distance(z, params).unwrap() / RD
                        + dm_offset * sigma_dm,
                    dh_over_rd: integrator.radial_distance(z, params).unwrap() / RD
                        + dh_offset * sigma_dh,
                    sigma_dm,
                    sigma_dh,
                    corr: -0.4,
                }
            })
            .collect();
        ObservationSet::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_exact_predictions_give_zero_chi_squared() {
        let params = ModelParameters::default();
        let observations = synthetic(&params, &[(0.0, 0.0); 3]);
        let likelihood = BaoLikelihood::new(observations, RD, integrator()).unwrap();

        assert_eq!(likelihood.chi_squared(&params).unwrap(), 0.0);
        assert_eq!(likelihood.ln_likelihood(&params).unwrap(), 0.0);
    }

    #[test]
    fn test_chi_squared_sums_both_channels() {
        let params = ModelParameters::default();
        let observations = synthetic(&params, &[(1.0, 0.0), (0.0, -2.0), (0.5, 0.5)]);
        let likelihood = BaoLikelihood::new(observations, RD, integrator()).unwrap();

        let residuals = likelihood.residuals(&params).unwrap();
        // Observed = model + offset * sigma, so pull = -offset
        assert_relative_eq!(residuals.dm_pull[0], -1.0, epsilon = 1e-9);
        assert_relative_eq!(residuals.dh_pull[1], 2.0, epsilon = 1e-9);
        assert_relative_eq!(residuals.chi_squared_dm(), 1.25, epsilon = 1e-9);
        assert_relative_eq!(residuals.chi_squared_dh(), 4.25, epsilon = 1e-9);

        let chi2 = likelihood.chi_squared(&params).unwrap();
        assert_relative_eq!(chi2, 5.5, epsilon = 1e-9);
        assert_relative_eq!(likelihood.ln_likelihood(&params).unwrap(), -2.75, epsilon = 1e-9);
    }

    #[test]
    fn test_correlation_is_ignored() {
        let params = ModelParameters::default();
        let observations = synthetic(&params, &[(1.0, 1.0); 3]);
        let decorrelated: Vec<ObservationRow> = observations
            .rows()
            .map(|row| ObservationRow { corr: 0.0, ..row })
            .collect();
        let decorrelated = ObservationSet::from_rows(&decorrelated).unwrap();

        let chi2 = chi_squared(&integrator(), &params, &observations, RD).unwrap();
        let chi2_uncorrelated = chi_squared(&integrator(), &params, &decorrelated, RD).unwrap();
        assert_eq!(chi2, chi2_uncorrelated);
    }

    #[test]
    fn test_different_parameters_increase_chi_squared() {
        let truth = ModelParameters::default();
        let observations = synthetic(&truth, &[(0.0, 0.0); 3]);
        let likelihood = BaoLikelihood::new(observations, RD, integrator()).unwrap();

        let shifted = ModelParameters::flat(70.0, 0.35, 9e-5, 3.0, 0.5, 1.0);
        assert!(likelihood.chi_squared(&shifted).unwrap() > 1.0);
    }

    #[test]
    fn test_domain_error_propagates() {
        let params = ModelParameters::default();
        let observations = synthetic(&params, &[(0.0, 0.0); 3]);
        let likelihood = BaoLikelihood::new(observations, RD, integrator()).unwrap();

        let broken = ModelParameters {
            omega_m: -5.0,
            omega_omega: 0.0,
            ..params
        };
        let err = likelihood.chi_squared(&broken).unwrap_err();
        assert!(matches!(
            err,
            Error::Cosmology(CosmologyError::UndefinedExpansionRate { .. })
        ));
    }

    #[test]
    fn test_invalid_sound_horizon() {
        let params = ModelParameters::default();
        let observations = synthetic(&params, &[(0.0, 0.0); 3]);
        assert!(BaoLikelihood::new(observations.clone(), 0.0, integrator()).is_err());
        assert!(BaoLikelihood::new(observations, f64::NAN, integrator()).is_err());
    }
}
