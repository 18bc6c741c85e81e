//! Expansion history of the CETΩ dark-energy model.
//!
//! The CETΩ component has an effective equation of state driven by a
//! structural exponent $\alpha(a) = \alpha_0 + \alpha_1 (1 - a)$. This crate
//! turns that equation of state into a Hubble rate and the comoving and radial
//! distances probed by BAO measurements.
//!
//! Everything here is a pure function of its arguments: no state is shared
//! between calls, so a single [`DistanceIntegrator`] can be used from many
//! threads at once.

pub mod constants;
pub mod distance;
pub mod equation_of_state;
pub mod errors;
pub mod parameters;
pub mod quadrature;

pub use distance::{DistanceIntegrator, DistanceRow, DistanceTable};
pub use errors::{CosmologyError, CosmologyResult};
pub use parameters::ModelParameters;
pub use quadrature::QuadratureSettings;

/// Floating point type used for all model quantities.
pub type FloatValue = f64;
