//! Free parameters, flat priors and proposal widths
//!
//! Only three parameters are sampled: $\Omega_m$, $\alpha_0$ and $\alpha_1$.
//! Everything else in [`cetomega_core::ModelParameters`] is held fixed by the
//! run configuration.
//!
//! Bounds and proposal widths are keyed by parameter name (`Omega_m`,
//! `alpha0`, `alpha1`) so they read naturally in configuration files:
//!
//! ```toml
//! [sampler.priors]
//! Omega_m = [0.1, 0.5]
//! alpha0 = [1.5, 6.0]
//! alpha1 = [-2.0, 2.0]
//! ```

use crate::{Error, Result};
use cetomega_core::FloatValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of sampled parameters.
pub const N_FREE: usize = 3;

/// A sampled parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FreeParameter {
    OmegaM,
    Alpha0,
    Alpha1,
}

impl FreeParameter {
    /// All free parameters in chain order.
    pub const ALL: [FreeParameter; N_FREE] = [
        FreeParameter::OmegaM,
        FreeParameter::Alpha0,
        FreeParameter::Alpha1,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FreeParameter::OmegaM => "Omega_m",
            FreeParameter::Alpha0 => "alpha0",
            FreeParameter::Alpha1 => "alpha1",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Position in the chain's parameter vector.
    pub fn index(&self) -> usize {
        match self {
            FreeParameter::OmegaM => 0,
            FreeParameter::Alpha0 => 1,
            FreeParameter::Alpha1 => 2,
        }
    }

    /// Names of all free parameters in chain order.
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|p| p.name().to_string()).collect()
    }
}

impl fmt::Display for FreeParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A point in the sampled parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreeParameters {
    #[serde(rename = "Omega_m")]
    pub omega_m: FloatValue,
    pub alpha0: FloatValue,
    pub alpha1: FloatValue,
}

impl Default for FreeParameters {
    /// Starting point of the reference analysis.
    fn default() -> Self {
        Self {
            omega_m: 0.3,
            alpha0: 3.0,
            alpha1: 0.5,
        }
    }
}

impl FreeParameters {
    pub fn new(omega_m: FloatValue, alpha0: FloatValue, alpha1: FloatValue) -> Self {
        Self {
            omega_m,
            alpha0,
            alpha1,
        }
    }

    pub fn get(&self, parameter: FreeParameter) -> FloatValue {
        match parameter {
            FreeParameter::OmegaM => self.omega_m,
            FreeParameter::Alpha0 => self.alpha0,
            FreeParameter::Alpha1 => self.alpha1,
        }
    }

    pub fn to_array(&self) -> [FloatValue; N_FREE] {
        [self.omega_m, self.alpha0, self.alpha1]
    }

    pub fn from_array(values: [FloatValue; N_FREE]) -> Self {
        let [omega_m, alpha0, alpha1] = values;
        Self::new(omega_m, alpha0, alpha1)
    }

    /// Read a point back from a chain row.
    pub fn from_slice(values: &[FloatValue]) -> Option<Self> {
        match values {
            [omega_m, alpha0, alpha1] => Some(Self::new(*omega_m, *alpha0, *alpha1)),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Reject any name that is not a free parameter, and require every free
/// parameter to be present.
fn check_names<V>(map: &IndexMap<String, V>, what: &str) -> Result<()> {
    if map.is_empty() {
        return Err(Error::InvalidConfiguration(format!("{} are empty", what)));
    }
    if let Some(unknown) = map.keys().find(|k| FreeParameter::from_name(k).is_none()) {
        return Err(Error::InvalidConfiguration(format!(
            "{} name unknown parameter {:?}; expected one of {:?}",
            what,
            unknown,
            FreeParameter::names()
        )));
    }
    if let Some(missing) = FreeParameter::ALL
        .iter()
        .find(|p| !map.contains_key(p.name()))
    {
        return Err(Error::InvalidConfiguration(format!(
            "{} are missing {}",
            what, missing
        )));
    }
    Ok(())
}

/// Inclusive uniform prior bounds for each free parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorBounds {
    bounds: IndexMap<String, (FloatValue, FloatValue)>,
}

impl Default for PriorBounds {
    fn default() -> Self {
        let mut bounds = Self::empty();
        bounds
            .insert("Omega_m", 0.1, 0.5)
            .insert("alpha0", 1.5, 6.0)
            .insert("alpha1", -2.0, 2.0);
        bounds
    }
}

impl PriorBounds {
    pub fn empty() -> Self {
        Self {
            bounds: IndexMap::new(),
        }
    }

    /// Add or replace the bounds of a parameter.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        min: FloatValue,
        max: FloatValue,
    ) -> &mut Self {
        self.bounds.insert(name.into(), (min, max));
        self
    }

    pub fn interval(&self, parameter: FreeParameter) -> Option<(FloatValue, FloatValue)> {
        self.bounds.get(parameter.name()).copied()
    }

    /// Every free parameter needs finite bounds with `min <= max`.
    pub fn validate(&self) -> Result<()> {
        check_names(&self.bounds, "prior bounds")?;
        for (name, &(min, max)) in &self.bounds {
            if !(min.is_finite() && max.is_finite() && min <= max) {
                return Err(Error::InvalidConfiguration(format!(
                    "prior bounds for {} must be finite with min <= max, got [{}, {}]",
                    name, min, max
                )));
            }
        }
        Ok(())
    }

    /// Whether every component lies inside its inclusive interval.
    ///
    /// A parameter without bounds, or a NaN value, counts as outside.
    pub fn within_bounds(&self, free: &FreeParameters) -> bool {
        FreeParameter::ALL.iter().all(|&p| match self.interval(p) {
            Some((min, max)) => {
                let value = free.get(p);
                min <= value && value <= max
            }
            None => false,
        })
    }

    /// Flat (improper) log-prior: zero inside the bounds, $-\infty$ outside.
    pub fn log_prior(&self, free: &FreeParameters) -> FloatValue {
        if self.within_bounds(free) {
            0.0
        } else {
            FloatValue::NEG_INFINITY
        }
    }
}

/// Standard deviation of the Gaussian random-walk proposal for each free
/// parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalScale {
    scales: IndexMap<String, FloatValue>,
}

impl Default for ProposalScale {
    fn default() -> Self {
        let mut scales = Self::empty();
        scales
            .insert("Omega_m", 0.02)
            .insert("alpha0", 0.2)
            .insert("alpha1", 0.1);
        scales
    }
}

impl ProposalScale {
    pub fn empty() -> Self {
        Self {
            scales: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, sigma: FloatValue) -> &mut Self {
        self.scales.insert(name.into(), sigma);
        self
    }

    pub fn sigma(&self, parameter: FreeParameter) -> Option<FloatValue> {
        self.scales.get(parameter.name()).copied()
    }

    /// Every free parameter needs a finite, strictly positive width.
    pub fn validate(&self) -> Result<()> {
        check_names(&self.scales, "proposal scales")?;
        for (name, &sigma) in &self.scales {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(Error::InvalidConfiguration(format!(
                    "proposal scale for {} must be positive, got {}",
                    name, sigma
                )));
            }
        }
        Ok(())
    }

    /// Widths in chain order.
    pub fn to_array(&self) -> Result<[FloatValue; N_FREE]> {
        self.validate()?;
        let mut sigmas = [0.0; N_FREE];
        for p in FreeParameter::ALL {
            sigmas[p.index()] = self.sigma(p).ok_or_else(|| {
                Error::InvalidConfiguration(format!("missing proposal scale for {}", p))
            })?;
        }
        Ok(sigmas)
    }
}
