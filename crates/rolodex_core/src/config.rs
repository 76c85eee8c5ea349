//! Layered runtime configuration.
//!
//! Sources, highest priority first:
//! 1. `ROLODEX_*` environment variables (`ROLODEX_DATABASE_PATH`,
//!    `ROLODEX_LOG_LEVEL`, `ROLODEX_LOG_DIR`)
//! 2. `rolodex.toml` in the working directory
//! 3. Built-in defaults

use crate::logging::{default_log_level, normalize_level, LogTarget};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "rolodex.toml";
pub const ENV_PREFIX: &str = "ROLODEX_";
const DEFAULT_DATABASE_FILE: &str = "rolodex.db";

#[derive(Debug)]
pub enum ConfigError {
    Figment(Box<figment::Error>),
    InvalidValue { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Figment(err) => write!(f, "configuration error: {err}"),
            Self::InvalidValue { field, reason } => {
                write!(f, "invalid configuration value for `{field}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Figment(err) => Some(err.as_ref()),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self::Figment(Box::new(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RolodexConfig {
    /// SQLite file holding contacts, interactions and tasks.
    pub database_path: PathBuf,
    pub log_level: String,
    /// Rolling log directory; logs go to stderr when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for RolodexConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_FILE),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl RolodexConfig {
    /// Loads and validates configuration from every source.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Provider chain used by [`RolodexConfig::load`].
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE_NAME))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn log_target(&self) -> LogTarget {
        match &self.log_dir {
            Some(dir) => LogTarget::Directory(dir.clone()),
            None => LogTarget::Stderr,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database_path",
                reason: "must not be empty".to_string(),
            });
        }
        normalize_level(&self.log_level).map_err(|err| ConfigError::InvalidValue {
            field: "log_level",
            reason: err.to_string(),
        })?;
        Ok(())
    }
}
