use thiserror::Error;

/// Error type for invalid model evaluations.
///
/// Every variant except [`CosmologyError::InvalidParameter`] is a domain
/// error: the model is mathematically undefined at the requested point.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CosmologyError {
    #[error("Scale factor must be positive, got a={0}")]
    NonPositiveScaleFactor(f64),
    #[error("Structural exponent alpha(a) vanishes at a={0}")]
    VanishingExponent(f64),
    #[error("Redshift z={0} is outside the integration domain (-1, inf)")]
    RedshiftOutOfDomain(f64),
    #[error("Expansion rate is undefined at z={z}: H^2/H0^2={value}")]
    UndefinedExpansionRate { z: f64, value: f64 },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl CosmologyError {
    /// Whether the error marks a point outside the model's mathematical domain.
    pub fn is_domain_error(&self) -> bool {
        !matches!(self, CosmologyError::InvalidParameter(_))
    }
}

/// Convenience type for `Result<T, CosmologyError>`.
pub type CosmologyResult<T> = Result<T, CosmologyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_classification() {
        assert!(CosmologyError::NonPositiveScaleFactor(0.0).is_domain_error());
        assert!(CosmologyError::VanishingExponent(0.5).is_domain_error());
        assert!(CosmologyError::UndefinedExpansionRate { z: 1.0, value: -0.1 }.is_domain_error());
        assert!(!CosmologyError::InvalidParameter("h0".to_string()).is_domain_error());
    }

    #[test]
    fn test_display() {
        let err = CosmologyError::NonPositiveScaleFactor(-1.0);
        assert_eq!(err.to_string(), "Scale factor must be positive, got a=-1");
    }
}
