//! Floor configuration, loaded from TOML.
//!
//! ```toml
//! columns = 6
//! rows = 7
//! ```
//!
//! Missing keys fall back to the standard 6x7 factory floor.

use crate::geometry::Position;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Errors that can occur while loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("floor dimensions must be positive, got {columns}x{rows}")]
    InvalidDimensions { columns: i32, rows: i32 },
}

/// Dimensions of the factory floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorConfig {
    pub columns: i32,
    pub rows: i32,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self { columns: 6, rows: 7 }
    }
}

impl FloorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FloorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), columns = config.columns, rows = config.rows, "loaded floor config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns <= 0 || self.rows <= 0 {
            return Err(ConfigError::InvalidDimensions {
                columns: self.columns,
                rows: self.rows,
            });
        }
        Ok(())
    }

    /// Whether `position` is a cell of this floor.
    pub fn contains(&self, position: Position) -> bool {
        (0..self.columns).contains(&position.column) && (0..self.rows).contains(&position.row)
    }
}
