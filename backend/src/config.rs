/// Runtime configuration for the page store
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::application::repositories::DEFAULT_BATCH_SIZE;

pub const DATABASE_PATH_VAR: &str = "WIKI_DATABASE_PATH";
pub const BUSY_TIMEOUT_VAR: &str = "WIKI_BUSY_TIMEOUT_MS";
pub const HISTORY_BATCH_SIZE_VAR: &str = "WIKI_HISTORY_BATCH_SIZE";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("Could not read {key}: {source}")]
    Env {
        key: &'static str,
        #[source]
        source: dotenvy::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where the SQLite database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    InMemory,
    File(PathBuf),
}

/// Settings for opening a [`SqlitePageRepository`](crate::infrastructure::persistence::SqlitePageRepository)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database: DatabaseLocation,
    /// How long a write waits on a locked database before failing
    pub busy_timeout: Duration,
    /// Revisions fetched per round trip when walking history
    pub history_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database: DatabaseLocation::InMemory,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            history_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseLocation::File(path.into()),
            ..Self::default()
        }
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn with_history_batch_size(mut self, batch_size: usize) -> Self {
        self.history_batch_size = batch_size;
        self
    }

    /// Read settings from the process environment, after loading a `.env`
    /// file if one exists. Unset variables keep their defaults.
    pub fn from_env() -> ConfigResult<Self> {
        let mut values = Vec::new();
        for key in [DATABASE_PATH_VAR, BUSY_TIMEOUT_VAR, HISTORY_BATCH_SIZE_VAR] {
            match dotenvy::var(key) {
                Ok(value) => values.push((key, value)),
                Err(dotenvy::Error::EnvVar(std::env::VarError::NotPresent)) => {}
                Err(source) => return Err(ConfigError::Env { key, source }),
            }
        }

        Self::from_lookup(|key| {
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        })
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let mut config = match lookup(DATABASE_PATH_VAR) {
            Some(path) if path == ":memory:" || path.is_empty() => Self::in_memory(),
            Some(path) => Self::with_path(path),
            None => Self::in_memory(),
        };

        if let Some(raw) = lookup(BUSY_TIMEOUT_VAR) {
            let millis = parse_positive(BUSY_TIMEOUT_VAR, &raw)?;
            config = config.with_busy_timeout(Duration::from_millis(millis as u64));
        }

        if let Some(raw) = lookup(HISTORY_BATCH_SIZE_VAR) {
            config = config.with_history_batch_size(parse_positive(HISTORY_BATCH_SIZE_VAR, &raw)?);
        }

        Ok(config)
    }
}

fn parse_positive(key: &'static str, raw: &str) -> ConfigResult<usize> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        }),
    }
}
