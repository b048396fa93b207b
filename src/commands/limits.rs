//! Limit files
//!
//! Production-test limits are kept in TOML files. Each key holds either
//! one value applied to every cell or one value per cell:
//!
//! ```toml
//! min = [100]
//! max = [3000]
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LimitsError {
    #[error("failed to read limits file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid limits file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("limits file has no `{0}` entry")]
    Missing(&'static str),
}

/// Contents of a limits file; absent keys are empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitFile {
    /// Lower bound, or expected bits for TRX tests
    pub min: Vec<i32>,
    /// Upper bound
    pub max: Vec<i32>,
    /// Maximum |surface| of the extended high-resistance test
    pub surface: Vec<i32>,
    /// Maximum TX run-out
    pub tx_roe: Vec<i32>,
    /// Maximum RX run-out
    pub rx_roe: Vec<i32>,
    /// Coupling-image threshold of the extended TRX pins
    pub delta: Vec<i32>,
    /// Reference image in firmware order
    pub reference: Vec<i32>,
}

impl LimitFile {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, LimitsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| LimitsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, LimitsError> {
        Ok(toml::from_str(content)?)
    }

    /// Fail when `key` is empty
    pub fn require(&self, key: &'static str, values: &[i32]) -> Result<(), LimitsError> {
        if values.is_empty() {
            Err(LimitsError::Missing(key))
        } else {
            Ok(())
        }
    }
}
