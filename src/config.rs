//! Index, search and build settings, loadable from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::IndexKind;

/// Index parameters. Persisted alongside the vectors so a loaded index
/// searches exactly like the one that was built.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct Params {
    pub dim: usize,
    pub kind: IndexKind,
    pub ef_construction: usize,
    pub ef_search: usize,
    /// Allowed deviation of a vector's L2 norm from 1.
    pub norm_epsilon: f32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            dim: 512,
            kind: IndexKind::Flat,
            ef_construction: 200,
            ef_search: 50,
            norm_epsilon: 1e-3,
        }
    }
}

impl Params {
    pub fn with_dim(dim: usize) -> Self {
        Self {
            dim,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct SearchParams {
    /// Distinct identities returned per query.
    pub top_k: usize,
    /// Raw neighbors fetched before deduplication.
    pub overfetch: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: 6,
            overfetch: 50,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct BuildParams {
    pub workers: usize,
    pub max_images: Option<usize>,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            workers: 8,
            max_images: None,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub index: Params,
    pub search: SearchParams,
    pub build: BuildParams,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let config = Self::from_toml_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("failed to parse: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.index.dim == 0 {
            return Err(Error::Config("index.dim must be greater than 0".into()));
        }
        if !(self.index.norm_epsilon > 0.0 && self.index.norm_epsilon < 1.0) {
            return Err(Error::Config("index.norm_epsilon must be in (0, 1)".into()));
        }
        if self.search.top_k == 0 {
            return Err(Error::Config("search.top_k must be at least 1".into()));
        }
        if self.search.overfetch < self.search.top_k {
            return Err(Error::Config(format!(
                "search.overfetch ({}) must be >= search.top_k ({})",
                self.search.overfetch, self.search.top_k
            )));
        }
        if self.build.workers == 0 {
            return Err(Error::Config("build.workers must be at least 1".into()));
        }
        Ok(())
    }
}
