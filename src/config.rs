//! `config.toml` loading.
//!
//! ```toml
//! database_path = "rollcall.db"
//! display_offset_hours = 9
//!
//! [runtime]
//! batch_max_ops = 32
//! snapshot_every_ops = 500
//! ```

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::handle::RuntimeConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the user config directory")]
    NoConfigDir,
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("display offset out of range: {0} hours")]
    InvalidOffset(i32),
}

fn default_database_path() -> PathBuf {
    PathBuf::from("rollcall.db")
}

fn default_display_offset_hours() -> i32 {
    9
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// UTC offset used when rendering check-in times.
    #[serde(default = "default_display_offset_hours")]
    pub display_offset_hours: i32,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            display_offset_hours: default_display_offset_hours(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Config {
    /// `~/.config/rollcall/config.toml` or the platform equivalent.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join("rollcall").join("config.toml"))
    }

    /// Loads `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.display_offset()?;
        Ok(config)
    }

    pub fn display_offset(&self) -> Result<FixedOffset, ConfigError> {
        self.display_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::InvalidOffset(self.display_offset_hours))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::parse("").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.display_offset().unwrap().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn partial_runtime_table_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            database_path = "/tmp/event.db"
            display_offset_hours = 0

            [runtime]
            batch_max_ops = 4
            "#,
        )
        .expect("parse");

        assert_eq!(config.database_path, PathBuf::from("/tmp/event.db"));
        assert_eq!(config.runtime.batch_max_ops, 4);
        assert_eq!(config.runtime.persist_queue_bound, RuntimeConfig::default().persist_queue_bound);
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        let err = Config::parse("display_offset_hours = 30").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOffset(30)));
    }
}
