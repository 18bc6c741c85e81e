//! Composite trapezoidal quadrature on uniform grids.
//!
//! All integrals in the model start at zero redshift, so the grids here always
//! span $[0, x_{max}]$.

use crate::errors::{CosmologyError, CosmologyResult};
use crate::FloatValue;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Resolution of the quadrature grids used by the distance integrals.
///
/// Finer grids cost more per likelihood evaluation. The Hubble rate integral
/// is nested inside the comoving distance integral, so the cost of a single
/// distance scales as `hubble_points * distance_points`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadratureSettings {
    /// Number of grid points for the equation-of-state integral inside $H(z)$.
    /// Default: 300
    pub hubble_points: usize,

    /// Number of grid points for the comoving distance integral.
    /// Default: 600
    pub distance_points: usize,
}

impl Default for QuadratureSettings {
    fn default() -> Self {
        Self {
            hubble_points: 300,
            distance_points: 600,
        }
    }
}

impl QuadratureSettings {
    /// A trapezoid needs at least both end points.
    pub fn validate(&self) -> CosmologyResult<()> {
        if self.hubble_points < 2 || self.distance_points < 2 {
            return Err(CosmologyError::InvalidParameter(format!(
                "Quadrature grids need at least 2 points, got hubble_points={} distance_points={}",
                self.hubble_points, self.distance_points
            )));
        }
        Ok(())
    }
}

/// Uniform grid of `n_points` values spanning `[0, upper]`.
///
/// The last point is exactly `upper`.
pub fn uniform_grid(upper: FloatValue, n_points: usize) -> Array1<FloatValue> {
    let mut grid = Array1::linspace(0.0, upper, n_points);
    if n_points > 0 {
        grid[n_points - 1] = upper;
    }
    grid
}

/// Composite trapezoidal rule for samples `y` taken at abscissae `x`.
///
/// $$\int y \, dx \approx \sum_i \frac{(x_{i+1} - x_i)(y_i + y_{i+1})}{2}$$
///
/// Returns zero for fewer than two samples.
pub fn trapezoid(y: ArrayView1<FloatValue>, x: ArrayView1<FloatValue>) -> FloatValue {
    debug_assert_eq!(y.len(), x.len());

    x.iter()
        .zip(x.iter().skip(1))
        .zip(y.iter().zip(y.iter().skip(1)))
        .map(|((x0, x1), (y0, y1))| (x1 - x0) * (y0 + y1) / 2.0)
        .sum()
}

/// Integrate a fallible integrand from zero to `upper`.
///
/// The integrand is evaluated once per grid point, in order. The first error
/// aborts the integration and is returned. An upper limit of exactly zero
/// returns zero without evaluating the integrand.
pub fn integrate_from_zero<F>(
    upper: FloatValue,
    n_points: usize,
    mut integrand: F,
) -> CosmologyResult<FloatValue>
where
    F: FnMut(FloatValue) -> CosmologyResult<FloatValue>,
{
    if upper == 0.0 {
        return Ok(0.0);
    }

    let grid = uniform_grid(upper, n_points);
    let values = grid
        .iter()
        .map(|&x| integrand(x))
        .collect::<CosmologyResult<Array1<FloatValue>>>()?;

    Ok(trapezoid(values.view(), grid.view()))
}
