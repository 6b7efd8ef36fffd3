use crate::constants::{
    DEFAULT_CONFIG_PATH, DEFAULT_INPUT_PATH, DEFAULT_SQLITE_PATH, ENV_DB_PATH, ENV_INPUT,
    ENV_LIBSQL_AUTH_TOKEN, ENV_LIBSQL_URL, ENV_METRICS_ADDR, ENV_STORAGE,
};
use crate::error::{LoaderError, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub storage: StorageConfig,
    pub loader: LoaderConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_INPUT_PATH),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
    Libsql,
}

impl FromStr for StorageBackend {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            "libsql" | "turso" => Ok(StorageBackend::Libsql),
            other => Err(LoaderError::Config(format!(
                "Unknown storage backend '{}' (expected sqlite, memory or libsql)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub sqlite_path: PathBuf,
    pub libsql_url: Option<String>,
    pub libsql_auth_token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
            libsql_url: None,
            libsql_auth_token: None,
        }
    }
}

/// Policy switches for a load run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Run the content/release-date association pass.
    pub link_release_dates: bool,
    /// Keep collecting association targets for records whose content row
    /// already exists, so an interrupted run can finish its join tables.
    pub relink_existing: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            link_release_dates: true,
            relink_existing: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub listen_addr: Option<SocketAddr>,
}

impl Config {
    /// Load from `path`, or from `catalog_loader.toml` when none is given.
    /// A missing file yields defaults; environment variables win over both.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path).map_err(|e| {
                LoaderError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;
            Self::from_toml(&content)?
        } else if path.is_some() {
            return Err(LoaderError::Config(format!(
                "Config file '{}' does not exist",
                config_path.display()
            )));
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from a key lookup; `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(input) = lookup(ENV_INPUT) {
            self.input.path = PathBuf::from(input);
        }
        if let Some(db_path) = lookup(ENV_DB_PATH) {
            self.storage.sqlite_path = PathBuf::from(db_path);
        }
        if let Some(backend) = lookup(ENV_STORAGE) {
            self.storage.backend = backend.parse()?;
        }
        if let Some(url) = lookup(ENV_LIBSQL_URL) {
            self.storage.libsql_url = Some(url);
        }
        if let Some(token) = lookup(ENV_LIBSQL_AUTH_TOKEN) {
            self.storage.libsql_auth_token = Some(token);
        }
        if let Some(addr) = lookup(ENV_METRICS_ADDR) {
            let addr = addr.parse().map_err(|e| {
                LoaderError::Config(format!("Invalid {} '{}': {}", ENV_METRICS_ADDR, addr, e))
            })?;
            self.metrics.listen_addr = Some(addr);
        }
        Ok(())
    }
}
