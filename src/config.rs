use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Value of `database` in `botanica.toml` that selects in-memory mode
pub const MEMORY_DATABASE: &str = ":memory:";

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreMode {
    /// Ephemeral store scoped to the database handle
    InMemory,
    /// SQLite file, created if missing
    Durable(PathBuf),
}

impl StoreMode {
    pub fn is_durable(&self) -> bool {
        matches!(self, StoreMode::Durable(_))
    }
}

/// Connection settings for a [`crate::BotanicalDatabase`]
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub mode: StoreMode,
    /// Reader connections opened in durable mode (in-memory shares one connection)
    pub read_connections: usize,
    /// How long a connection waits on a locked database file
    pub busy_timeout_ms: u64,
    /// Enforce the SQL-level foreign keys in addition to the store's own checks
    pub foreign_keys: bool,
}

impl DatabaseConfig {
    pub const DEFAULT_READ_CONNECTIONS: usize = 4;
    pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

    pub fn new(mode: StoreMode) -> Self {
        Self {
            mode,
            read_connections: Self::DEFAULT_READ_CONNECTIONS,
            busy_timeout_ms: Self::DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: true,
        }
    }

    /// Configuration for an in-memory database
    pub fn memory() -> Self {
        Self::new(StoreMode::InMemory)
    }

    /// Configuration for a file-based database
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new(StoreMode::Durable(path.as_ref().to_path_buf()))
    }

    pub fn with_read_connections(mut self, count: usize) -> Self {
        self.read_connections = count.max(1);
        self
    }

    pub fn with_busy_timeout_ms(mut self, millis: u64) -> Self {
        self.busy_timeout_ms = millis;
        self
    }
}

/// On-disk configuration file (`botanica.toml`)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BotanicaConfig {
    pub database: Option<String>,
    pub read_connections: Option<usize>,
    pub busy_timeout_ms: Option<u64>,
}

impl BotanicaConfig {
    /// Resolve the file settings into a connection config, relative paths
    /// taken against `base`
    pub fn database_config(&self, base: &Path) -> DatabaseConfig {
        let mut config = match self.database.as_deref() {
            None | Some(MEMORY_DATABASE) => DatabaseConfig::memory(),
            Some(path) => DatabaseConfig::file(base.join(path)),
        };
        if let Some(count) = self.read_connections {
            config = config.with_read_connections(count);
        }
        if let Some(millis) = self.busy_timeout_ms {
            config = config.with_busy_timeout_ms(millis);
        }
        config
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("botanica.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".botanica").join("botanica.db")
}

pub fn load_config(path: Option<&Path>) -> Result<Option<BotanicaConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: BotanicaConfig = toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &BotanicaConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "config already exists at {} (pass force to overwrite)",
            path.display()
        )));
    }

    let contents = toml::to_string_pretty(config).map_err(|e| Error::Config(e.to_string()))?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
