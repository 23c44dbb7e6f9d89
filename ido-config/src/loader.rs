//! TOML config loading with a default search path.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Config;
use crate::validation::validate;

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
}

/// Loads a `Config` from an explicit path, the `IDO_CONFIG` environment
/// variable, or the platform config dir (`<config>/ido/config.toml`), in
/// that order. A missing file yields defaults; a malformed file is an
/// error.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// The path this loader will read, if one resolves.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.path {
            return Some(path.clone());
        }
        if let Ok(env_path) = std::env::var("IDO_CONFIG")
            && !env_path.is_empty()
        {
            return Some(PathBuf::from(env_path));
        }
        dirs::config_dir().map(|dir| dir.join("ido").join("config.toml"))
    }

    pub fn load(&self) -> Result<Config, ConfigLoadError> {
        let Some(path) = self.resolved_path() else {
            debug!("no config path resolvable, using defaults");
            return Ok(Config::default());
        };

        if !path.exists() {
            debug!(path = %path.display(), "config file absent, using defaults");
            return Ok(Config::default());
        }

        let config = Self::load_from(&path)?;
        for warning in validate(&config) {
            warn!(%warning, "config warning");
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Config, ConfigLoadError> {
        let raw = std::fs::read_to_string(path).map_err(|source| {
            ConfigLoadError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let config =
            toml::from_str(&raw).map_err(|source| ConfigLoadError::Parse {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}
