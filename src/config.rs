//! Configuration
//!
//! Settings come from a TOML file and are overridden by CLI flags. The file
//! is looked up in this order:
//! 1. an explicit path (`--config`)
//! 2. `$ZIPLIFT_CONFIG`
//! 3. `<config dir>/ziplift/config.toml`, when it exists
//!
//! Without a file the defaults apply.
//!
//! ```toml
//! retries = 2
//!
//! [session]
//! workers = 4
//! verify_checksum = false
//! ```

use crate::error::ConfigError;
use crate::queue::DEFAULT_CONCURRENCY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "ZIPLIFT_CONFIG";

/// Upper bound for concurrent work items
const MAX_WORKERS: usize = 64;

/// Upper bound for the transfer multiplier
const MAX_TRANSFER_MULTIPLIER: u64 = 1_000;

/// Knobs of a single extraction session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Work items running at once (folder creations and file uploads)
    pub workers: usize,

    /// Relative cost of decompressing and uploading one byte, compared to
    /// reading it from the archive
    pub transfer_multiplier: u64,

    /// Fixed progress weight of every entry, whatever its size
    pub entry_overhead: u64,

    /// Check CRC-32 of every decompressed file
    pub verify_checksum: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_CONCURRENCY,
            transfer_multiplier: 3,
            entry_overhead: 20_000,
            verify_checksum: true,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid {
                field: "workers",
                reason: format!("must be between 1 and {}, got {}", MAX_WORKERS, self.workers),
            });
        }
        if self.transfer_multiplier == 0 || self.transfer_multiplier > MAX_TRANSFER_MULTIPLIER {
            return Err(ConfigError::Invalid {
                field: "transfer_multiplier",
                reason: format!(
                    "must be between 1 and {}, got {}",
                    MAX_TRANSFER_MULTIPLIER, self.transfer_multiplier
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,

    /// Automatic `execute(retry)` rounds after a run with errors
    pub retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            retries: 1,
        }
    }
}

impl Config {
    /// Load from the first config file found, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::locate(explicit) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.session.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        Self::default_path().filter(|p| p.is_file())
    }

    /// `<config dir>/ziplift/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ziplift").join("config.toml"))
    }
}
