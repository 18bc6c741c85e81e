//! BAO observations
//!
//! Each row of an observation file is one redshift bin:
//!
//! ```text
//! # z   DM/rd   DH/rd   sigma_DM   sigma_DH   corr
//! 0.51  13.62   20.98   0.25       0.61       -0.45
//! ```
//!
//! Columns are separated by any whitespace. Lines starting with `#` and blank
//! lines are skipped, and anything after a `#` on a data line is ignored.
//! Columns beyond the sixth are ignored.

use crate::{Error, Result};
use cetomega_core::FloatValue;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

const N_COLUMNS: usize = 6;
const COLUMN_NAMES: [&str; N_COLUMNS] = [
    "z",
    "DM_over_rd",
    "DH_over_rd",
    "sigma_DM",
    "sigma_DH",
    "corr",
];

/// A set of BAO distance measurements.
///
/// All arrays have the same length, one entry per redshift bin. The
/// correlation between the $D_M$ and $D_H$ errors is kept but not used by the
/// chi-squared, which treats the two channels as independent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSet {
    z: Array1<FloatValue>,
    dm_over_rd: Array1<FloatValue>,
    dh_over_rd: Array1<FloatValue>,
    sigma_dm: Array1<FloatValue>,
    sigma_dh: Array1<FloatValue>,
    corr: Array1<FloatValue>,
}

/// One redshift bin of an [`ObservationSet`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    pub z: FloatValue,
    pub dm_over_rd: FloatValue,
    pub dh_over_rd: FloatValue,
    pub sigma_dm: FloatValue,
    pub sigma_dh: FloatValue,
    pub corr: FloatValue,
}

impl ObservationRow {
    fn from_columns(columns: [FloatValue; N_COLUMNS]) -> Self {
        let [z, dm_over_rd, dh_over_rd, sigma_dm, sigma_dh, corr] = columns;
        Self {
            z,
            dm_over_rd,
            dh_over_rd,
            sigma_dm,
            sigma_dh,
            corr,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !(self.z > -1.0) {
            return Err(format!("redshift must be above -1, got z={}", self.z));
        }
        if !(self.sigma_dm > 0.0) || !(self.sigma_dh > 0.0) {
            return Err(format!(
                "uncertainties must be positive, got sigma_DM={} sigma_DH={}",
                self.sigma_dm, self.sigma_dh
            ));
        }
        Ok(())
    }
}

impl ObservationSet {
    /// Build an observation set from rows.
    ///
    /// # Errors
    ///
    /// [`Error::Format`] if there are no rows, a value is not finite, a
    /// redshift is at or below $-1$ or an uncertainty is not positive.
    pub fn from_rows(rows: &[ObservationRow]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::Format("no observations".to_string()));
        }
        for (i, row) in rows.iter().enumerate() {
            let values = [
                row.z,
                row.dm_over_rd,
                row.dh_over_rd,
                row.sigma_dm,
                row.sigma_dh,
                row.corr,
            ];
            if let Some(column) = values.iter().position(|v| !v.is_finite()) {
                return Err(Error::Format(format!(
                    "row {}: {} is not finite",
                    i, COLUMN_NAMES[column]
                )));
            }
            row.validate()
                .map_err(|message| Error::Format(format!("row {}: {}", i, message)))?;
        }

        let column =
            |f: fn(&ObservationRow) -> FloatValue| rows.iter().map(f).collect::<Array1<_>>();
        Ok(Self {
            z: column(|r| r.z),
            dm_over_rd: column(|r| r.dm_over_rd),
            dh_over_rd: column(|r| r.dh_over_rd),
            sigma_dm: column(|r| r.sigma_dm),
            sigma_dh: column(|r| r.sigma_dh),
            corr: column(|r| r.corr),
        })
    }

    /// Load observations from a text file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let observations = Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            Error::Format(message) => Error::Format(format!("{}: {}", path.display(), message)),
            other => other,
        })?;

        info!(
            path = %path.display(),
            n_bins = observations.len(),
            "Loaded BAO observations"
        );
        Ok(observations)
    }

    /// Parse observations from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut rows = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = line.map_err(|e| Error::Format(format!("line {}: {}", line_number, e)))?;
            let content = match line.split_once('#') {
                Some((before, _)) => before,
                None => line.as_str(),
            };
            if content.trim().is_empty() {
                continue;
            }

            let row = parse_row(content)
                .map_err(|message| Error::Format(format!("line {}: {}", line_number, message)))?;
            rows.push(row);
        }

        Self::from_rows(&rows)
    }

    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    pub fn z(&self) -> &Array1<FloatValue> {
        &self.z
    }

    pub fn dm_over_rd(&self) -> &Array1<FloatValue> {
        &self.dm_over_rd
    }

    pub fn dh_over_rd(&self) -> &Array1<FloatValue> {
        &self.dh_over_rd
    }

    pub fn sigma_dm(&self) -> &Array1<FloatValue> {
        &self.sigma_dm
    }

    pub fn sigma_dh(&self) -> &Array1<FloatValue> {
        &self.sigma_dh
    }

    /// Correlation between the $D_M$ and $D_H$ errors in each bin.
    pub fn corr(&self) -> &Array1<FloatValue> {
        &self.corr
    }

    pub fn row(&self, i: usize) -> Option<ObservationRow> {
        (i < self.len()).then(|| ObservationRow {
            z: self.z[i],
            dm_over_rd: self.dm_over_rd[i],
            dh_over_rd: self.dh_over_rd[i],
            sigma_dm: self.sigma_dm[i],
            sigma_dh: self.sigma_dh[i],
            corr: self.corr[i],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = ObservationRow> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }
}

impl FromStr for ObservationSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_reader(s.as_bytes())
    }
}

fn parse_row(content: &str) -> std::result::Result<ObservationRow, String> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    if fields.len() < N_COLUMNS {
        return Err(format!(
            "expected at least {} columns, found {}",
            N_COLUMNS,
            fields.len()
        ));
    }

    let mut columns = [0.0; N_COLUMNS];
    for (i, (value, field)) in columns.iter_mut().zip(&fields).enumerate() {
        *value = field
            .parse::<FloatValue>()
            .map_err(|_| format!("{} is not a number: {:?}", COLUMN_NAMES[i], field))?;
    }

    Ok(ObservationRow::from_columns(columns))
}
