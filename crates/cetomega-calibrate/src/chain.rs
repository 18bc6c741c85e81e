//! Storage for a single Markov chain.
//!
//! Every step of the sampler is recorded, including rejected steps (which
//! repeat the previous state), so row `i` of the chain is the state after
//! step `i`.

use crate::priors::FreeParameters;
use crate::{Error, Result};
use cetomega_core::FloatValue;
use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Recorded states and log-posteriors of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    /// Parameter names in column order
    param_names: Vec<String>,

    /// Row-major samples: `len * n_params` values
    samples: Vec<FloatValue>,

    /// Log-posterior of each row
    log_posteriors: Vec<FloatValue>,
}

impl Chain {
    /// Create a new empty chain.
    pub fn new(param_names: Vec<String>) -> Self {
        Self::with_capacity(param_names, 0)
    }

    /// Create an empty chain with room for `capacity` rows.
    pub fn with_capacity(param_names: Vec<String>, capacity: usize) -> Self {
        let n_params = param_names.len();
        Self {
            param_names,
            samples: Vec::with_capacity(capacity * n_params),
            log_posteriors: Vec::with_capacity(capacity),
        }
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// [`Error::Sampling`] if the number of values does not match the number
    /// of parameters.
    pub fn push(&mut self, values: &[FloatValue], log_posterior: FloatValue) -> Result<()> {
        if values.len() != self.n_params() {
            return Err(Error::Sampling(format!(
                "Expected {} values per sample, got {}",
                self.n_params(),
                values.len()
            )));
        }
        self.samples.extend_from_slice(values);
        self.log_posteriors.push(log_posterior);
        Ok(())
    }

    pub(crate) fn record(&mut self, state: &FreeParameters, log_posterior: FloatValue) {
        self.samples.extend_from_slice(&state.to_array());
        self.log_posteriors.push(log_posterior);
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.log_posteriors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_posteriors.is_empty()
    }

    pub fn n_params(&self) -> usize {
        self.param_names.len()
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Row `i` of the chain.
    pub fn sample(&self, i: usize) -> Option<&[FloatValue]> {
        let n = self.n_params();
        (i < self.len()).then(|| &self.samples[i * n..(i + 1) * n])
    }

    pub fn log_posterior(&self, i: usize) -> Option<FloatValue> {
        self.log_posteriors.get(i).copied()
    }

    /// Get samples, discarding the first `discard` rows.
    ///
    /// # Returns
    ///
    /// Array of shape `(len - discard, n_params)`. Empty when `discard` is
    /// at least the chain length.
    pub fn flat_samples(&self, discard: usize) -> Array2<FloatValue> {
        let n_params = self.n_params();
        if discard >= self.len() {
            return Array2::zeros((0, n_params));
        }

        let n_keep = self.len() - discard;
        Array2::from_shape_fn((n_keep, n_params), |(i, j)| {
            self.samples[(discard + i) * n_params + j]
        })
    }

    /// Get log-posteriors, discarding the first `discard` rows.
    pub fn flat_log_probs(&self, discard: usize) -> Array1<FloatValue> {
        if discard >= self.len() {
            return Array1::zeros(0);
        }
        Array1::from(self.log_posteriors[discard..].to_vec())
    }

    /// Map from parameter name to its post-discard samples.
    pub fn to_param_map(&self, discard: usize) -> IndexMap<String, Array1<FloatValue>> {
        let flat = self.flat_samples(discard);
        self.param_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), flat.column(i).to_owned()))
            .collect()
    }

    /// Row with the highest log-posterior after discarding `discard` rows.
    ///
    /// Ties resolve to the earliest row. Returns the absolute row index, or
    /// `None` if no kept row has a log-posterior above $-\infty$.
    pub fn best(&self, discard: usize) -> Option<(usize, &[FloatValue], FloatValue)> {
        let mut best: Option<(usize, FloatValue)> = None;
        for (i, &lp) in self.log_posteriors.iter().enumerate().skip(discard) {
            let improves = match best {
                Some((_, best_lp)) => lp > best_lp,
                None => lp > FloatValue::NEG_INFINITY,
            };
            if improves {
                best = Some((i, lp));
            }
        }
        let (i, lp) = best?;
        Some((i, self.sample(i)?, lp))
    }

    /// Save the chain to a file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file to create
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);

        bincode::serialize_into(&mut writer, self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize chain: {}", e)))?;

        writer.flush().map_err(|e| Error::io(path, e))?;

        Ok(())
    }

    /// Load a chain written by [`Chain::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut reader = BufReader::new(file);

        let chain: Chain = bincode::deserialize_from(&mut reader)
            .map_err(|e| Error::Serialization(format!("Failed to deserialize chain: {}", e)))?;
        chain.check_shape()?;

        Ok(chain)
    }

    /// `samples` must hold exactly `n_params` values per log-posterior.
    fn check_shape(&self) -> Result<()> {
        if self.samples.len() != self.len() * self.n_params() {
            return Err(Error::Serialization(format!(
                "Chain holds {} sample values for {} rows of {} parameters",
                self.samples.len(),
                self.len(),
                self.n_params()
            )));
        }
        Ok(())
    }

    /// Write the post-discard rows as CSV.
    ///
    /// The header is the parameter names followed by `log_posterior`.
    pub fn to_csv_writer<W: std::io::Write>(&self, writer: W, discard: usize) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let to_error = |e: csv::Error| Error::Serialization(format!("Failed to write CSV: {}", e));

        let mut header: Vec<&str> = self.param_names.iter().map(String::as_str).collect();
        header.push("log_posterior");
        csv_writer.write_record(&header).map_err(to_error)?;

        for i in discard..self.len() {
            let (Some(values), Some(lp)) = (self.sample(i), self.log_posterior(i)) else {
                continue;
            };
            let record: Vec<String> = values
                .iter()
                .chain(std::iter::once(&lp))
                .map(|v| v.to_string())
                .collect();
            csv_writer.write_record(&record).map_err(to_error)?;
        }

        csv_writer
            .flush()
            .map_err(|e| Error::Serialization(format!("Failed to flush CSV: {}", e)))?;
        Ok(())
    }

    /// Write the post-discard rows to a CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P, discard: usize) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        self.to_csv_writer(BufWriter::new(file), discard)
    }
}
