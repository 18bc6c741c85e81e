//! Effective equation of state of the CETΩ component
//!
//! The component is characterised by a structural exponent that evolves
//! linearly with the scale factor,
//!
//! $$\alpha(a) = \alpha_0 + \alpha_1 (1 - a)$$
//!
//! and an effective equation of state
//!
//! $$w_\Omega(a) = -1 + \frac{1}{\alpha(a)} - \kappa \ln(a) \frac{\alpha'(a)}{\alpha(a)^2}$$
//!
//! with $\alpha'(a) = -\alpha_1$.

use crate::errors::{CosmologyError, CosmologyResult};
use crate::FloatValue;

/// Structural exponent $\alpha(a) = \alpha_0 + \alpha_1 (1 - a)$.
pub fn structural_exponent(a: FloatValue, alpha0: FloatValue, alpha1: FloatValue) -> FloatValue {
    alpha0 + alpha1 * (1.0 - a)
}

/// Effective equation of state $w_\Omega(a)$.
///
/// # Errors
///
/// * [`CosmologyError::NonPositiveScaleFactor`] if `a <= 0` (or NaN)
/// * [`CosmologyError::VanishingExponent`] if $\alpha(a) = 0$, where the
///   equation of state is undefined
pub fn effective_equation_of_state(
    a: FloatValue,
    alpha0: FloatValue,
    alpha1: FloatValue,
    kappa: FloatValue,
) -> CosmologyResult<FloatValue> {
    if !(a > 0.0) {
        return Err(CosmologyError::NonPositiveScaleFactor(a));
    }

    let alpha = structural_exponent(a, alpha0, alpha1);
    if alpha == 0.0 {
        return Err(CosmologyError::VanishingExponent(a));
    }
    let dalpha_da = -alpha1;

    Ok(-1.0 + 1.0 / alpha - kappa * a.ln() * (dalpha_da / alpha.powi(2)))
}
