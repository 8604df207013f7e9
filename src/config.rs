//! Experiment configuration.
//!
//! Loaded from JSON; every field has a default, so `{}` is a valid config.
//!
//! ```json
//! {
//!   "model": "text-embedding-3-large",
//!   "store": { "kind": "directory", "path": "embeddings" },
//!   "max_batch_size": 256,
//!   "export_path": "dataset_pd_all.csv"
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::StoreConfig;
use crate::{Error, Result};

/// Settings for one bias experiment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Embedding model the provider is expected to serve.
    pub model: String,
    pub store: StoreConfig,
    /// Cap on sentences per provider request (also capped by the provider).
    pub max_batch_size: usize,
    /// Ignore cached vectors and rewrite them.
    pub force_recompute: bool,
    /// Where to write the generated sentence table, if anywhere.
    pub export_path: Option<PathBuf>,
    /// Names taken from each ranked name list.
    pub top_names: usize,
    /// Occupations taken from each end of the ranked occupation list.
    pub top_occupations: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-large".to_string(),
            store: StoreConfig::Memory,
            max_batch_size: 2048,
            force_recompute: false,
            export_path: None,
            top_names: 20,
            top_occupations: 10,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(Error::Config("max_batch_size must be at least 1".into()));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config("model must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = ExperimentConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ExperimentConfig::default());
        assert_eq!(config.model, "text-embedding-3-large");
    }

    #[test]
    fn test_directory_store() {
        let config = ExperimentConfig::from_json_str(
            r#"{"store": {"kind": "directory", "path": "embeddings"}, "max_batch_size": 16}"#,
        )
        .unwrap();
        assert_eq!(config.store, StoreConfig::Directory { path: "embeddings".into() });
        assert_eq!(config.max_batch_size, 16);
    }

    #[test]
    fn test_zero_batch_rejected() {
        let err = ExperimentConfig::from_json_str(r#"{"max_batch_size": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ExperimentConfig::from_json_str("{"),
            Err(Error::Serialization(_))
        ));
    }
}
