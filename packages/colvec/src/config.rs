//! Store configuration.
//!
//! Persisted as `colvec_config.json` in a store directory. Every field has
//! a default, so a partial file (or none at all) is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VectorError};

/// Config file name inside a store directory.
pub const CONFIG_FILE_NAME: &str = "colvec_config.json";

/// Default number of elements per segment.
pub const DEFAULT_SEGMENT_SIZE: usize = 65_536;

/// Default divisor applied to a float vector's value range to derive its
/// distinctness resolution.
pub const DEFAULT_RESOLUTION_DIVISOR: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Elements per segment (the swap unit).
    pub segment_size: usize,
    /// Byte budget for resident segments. Auto-detected when absent.
    pub memory_budget_bytes: Option<usize>,
    /// Directory for swapped-out segments. In-memory store when absent.
    pub spill_dir: Option<PathBuf>,
    /// Quantile targets estimated at seal time for numeric vectors.
    pub quantiles: Vec<f64>,
    /// Divisor for the auto-derived float resolution.
    pub resolution_divisor: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            memory_budget_bytes: None,
            spill_dir: None,
            quantiles: vec![0.25, 0.5, 0.75],
            resolution_divisor: DEFAULT_RESOLUTION_DIVISOR,
        }
    }
}

impl StoreConfig {
    /// Read config from a store directory. Returns None if the file doesn't exist.
    pub fn read_from(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(Some(config))
    }

    /// Write config to a store directory.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONFIG_FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_size == 0 {
            return Err(VectorError::InvalidConfig("segment_size must be positive".into()));
        }
        if let Some(q) = self.quantiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
            return Err(VectorError::InvalidConfig(format!(
                "quantile {q} outside [0, 1]"
            )));
        }
        if !(self.resolution_divisor > 0.0) {
            return Err(VectorError::InvalidConfig(
                "resolution_divisor must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn with_segment_size(mut self, segment_size: usize) -> Self {
        self.segment_size = segment_size;
        self
    }

    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget_bytes = Some(bytes);
        self
    }

    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }

    /// Per-vector options derived from this config.
    pub fn vector_options(&self) -> VectorOptions {
        VectorOptions {
            segment_size: self.segment_size,
            quantiles: self.quantiles.clone(),
            resolution_divisor: self.resolution_divisor,
        }
    }
}

/// Options a vector is created with.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorOptions {
    pub segment_size: usize,
    pub quantiles: Vec<f64>,
    pub resolution_divisor: f64,
}

impl VectorOptions {
    pub fn with_segment_size(segment_size: usize) -> Self {
        Self {
            segment_size,
            ..Self::default()
        }
    }
}

impl Default for VectorOptions {
    fn default() -> Self {
        StoreConfig::default().vector_options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = StoreConfig::default();
        config.validate().unwrap();
        assert_eq!(config.segment_size, DEFAULT_SEGMENT_SIZE);
        assert_eq!(config.quantiles, vec![0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::default()
            .with_segment_size(1024)
            .with_memory_budget(1 << 20);
        config.write_to(dir.path()).unwrap();

        let loaded = StoreConfig::read_from(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(StoreConfig::read_from(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{"segment_size": 16}"#).unwrap();
        let loaded = StoreConfig::read_from(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.segment_size, 16);
        assert_eq!(loaded.resolution_divisor, DEFAULT_RESOLUTION_DIVISOR);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let err = StoreConfig::default().with_segment_size(0).validate().unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");

        let mut config = StoreConfig::default();
        config.quantiles = vec![0.5, 1.5];
        assert!(config.validate().is_err());
    }
}
