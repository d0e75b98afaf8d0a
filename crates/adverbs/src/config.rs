// SPDX-License-Identifier: Apache-2.0
//! Configuration for locating the verbs library.
//!
//! Precedence (highest to lowest):
//! 1. Environment variables (`ADVERBS_LIBRARY`)
//! 2. Configuration file (YAML)
//! 3. Default values
//!
//! ```yaml
//! library_path: /opt/rdma-core/lib/libibverbs.so.1
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerbsError};
use crate::loader::DEFAULT_LIBRARY;

/// Environment variable overriding [`VerbsConfig::library_path`].
pub const ENV_LIBRARY: &str = "ADVERBS_LIBRARY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbsConfig {
    /// Path or soname passed to `dlopen`.
    #[serde(default = "default_library_path")]
    pub library_path: PathBuf,
}

fn default_library_path() -> PathBuf {
    PathBuf::from(DEFAULT_LIBRARY)
}

impl Default for VerbsConfig {
    fn default() -> Self {
        Self {
            library_path: default_library_path(),
        }
    }
}

impl VerbsConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            VerbsError::Config(format!("cannot read '{}': {e}", path.display()))
        })?;

        let config: VerbsConfig = serde_yaml_ng::from_str(&contents).map_err(|e| {
            VerbsError::Config(format!("cannot parse '{}': {e}", path.display()))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Load configuration with the following precedence:
    /// 1. Start from the file if provided, otherwise defaults
    /// 2. Apply environment variable overrides
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let config = config.merge_env();
        config.validate()?;

        tracing::debug!("verbs configuration: {config:?}");
        Ok(config)
    }

    fn merge_env(self) -> Self {
        self.merge_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn merge_env_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_LIBRARY).filter(|v| !v.is_empty()) {
            self.library_path = PathBuf::from(v);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.library_path.as_os_str().is_empty() {
            return Err(VerbsError::Config("library_path must not be empty".into()));
        }
        Ok(())
    }
}
