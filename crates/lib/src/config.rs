//! `trellis.toml`: per-repository settings.
//!
//! ```toml
//! [tailor]
//! build_file_name = "BUILD"
//! build_file_header = "# Generated"
//! alias_mapping = { python_library = "py_lib" }
//!
//! [docker]
//! tailor = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::backend::BackendOptions;
use crate::tailor::TailorOptions;

pub const CONFIG_FILE_NAME: &str = "trellis.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid tailor settings in {path}: {message}")]
  Invalid { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrellisConfig {
  pub tailor: TailorOptions,
  pub python: BackendOptions,
  pub shell: BackendOptions,
  pub docker: BackendOptions,
}

impl TrellisConfig {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    config.validate(path)?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
  }

  /// `trellis.toml` under `root`, or the defaults when there is none.
  pub fn load_from_root(root: &Path) -> Result<Self, ConfigError> {
    let path = root.join(CONFIG_FILE_NAME);
    if path.is_file() {
      Self::load(&path)
    } else {
      Ok(Self::default())
    }
  }

  fn validate(&self, path: &Path) -> Result<(), ConfigError> {
    self.tailor.validate().map_err(|e| ConfigError::Invalid {
      path: path.to_path_buf(),
      message: e.to_string(),
    })
  }
}
