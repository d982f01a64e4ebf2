//! Evaluation settings loaded from TOML
//!
//! ```toml
//! sentinel = 100.0
//! missing_key = { fallback = 0.0 }   # or "error"
//! max_depth = 256
//! step_limit = 1_000_000
//! ```

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interp::{HostPolicy, Limits, MissingKeyPolicy};

#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Cannot read config file {}", path.display())]
    #[diagnostic(code(config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    #[diagnostic(
        code(config::parse),
        help("known keys are sentinel, missing_key, max_depth and step_limit")
    )]
    Parse(#[from] toml::de::Error),

    #[error("max_depth must be at least 1")]
    #[diagnostic(code(config::max_depth))]
    ZeroDepth,
}

/// Settings for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvalConfig {
    /// Returned by `SET-ENV!`
    pub sentinel: f64,
    pub missing_key: MissingKeyPolicy,
    pub max_depth: usize,
    pub step_limit: Option<u64>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        let limits = Limits::default();
        let policy = HostPolicy::default();
        Self {
            sentinel: policy.sentinel,
            missing_key: policy.missing_key,
            max_depth: limits.max_depth,
            step_limit: limits.step_limit,
        }
    }
}

impl EvalConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EvalConfig = toml::from_str(text)?;
        if config.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), ?config, "Loaded config");
        Ok(config)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_depth: self.max_depth,
            step_limit: self.step_limit,
        }
    }

    pub fn host_policy(&self) -> HostPolicy {
        HostPolicy {
            missing_key: self.missing_key,
            sentinel: self.sentinel,
        }
    }
}
