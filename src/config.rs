// SPDX-License-Identifier: MPL-2.0

use std::path::{Path, PathBuf};
use thiserror::Error;

pub const APP_ID: &str = "io.github.shion.Shion";
pub const APP_NAME: &str = "Shion";

pub const WINDOW_WIDTH: i32 = 960;
pub const WINDOW_HEIGHT: i32 = 540;

#[cfg(feature = "devel")]
pub const IS_DEVEL: bool = true;
#[cfg(not(feature = "devel"))]
pub const IS_DEVEL: bool = false;

/// Development builds keep their own database so they never touch real data
pub const DB_FILE_NAME: &str = if IS_DEVEL || cfg!(debug_assertions) {
    "data-dev.db"
} else {
    "data.db"
};

/// Overrides the platform config directory
pub const CONFIG_DIR_ENV: &str = "SHION_CONFIG_DIR";
/// Fallback log filter when RUST_LOG is unset
pub const LOG_FILTER_ENV: &str = "SHION_LOG";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine the platform config directory")]
    Unresolvable,
    #[error("failed to create config directory {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

/// Runtime configuration gathered from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    config_dir: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_dir: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config_dir = std::env::var_os(CONFIG_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let log_filter = std::env::var(LOG_FILTER_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Self {
            config_dir,
            log_filter,
        }
    }

    /// Pin the config directory instead of using the platform location
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Resolve the directory for persistent files, creating it if absent.
    /// Path: ~/.config/io.github.shion.Shion unless overridden
    pub fn resolve_config_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = match &self.config_dir {
            Some(dir) => dir.clone(),
            None => dirs::config_dir()
                .ok_or(ConfigError::Unresolvable)?
                .join(APP_ID),
        };

        ensure_dir(&dir)?;
        Ok(dir)
    }
}

fn ensure_dir(dir: &Path) -> Result<(), ConfigError> {
    if dir.exists() && !dir.is_dir() {
        return Err(ConfigError::NotADirectory(dir.to_path_buf()));
    }

    std::fs::create_dir_all(dir).map_err(|source| ConfigError::Create {
        path: dir.to_path_buf(),
        source,
    })
}
