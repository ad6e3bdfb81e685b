use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct Settings {
    pub environment: Option<String>,
    pub port: Option<u16>,
    /// `postgres` (default) or `memory`.
    pub storage: Option<String>,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub run_migrations: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl Settings {
    pub fn is_production(&self) -> bool {
        self.environment.as_deref() == Some("PROD")
    }

    pub fn storage_backend(&self) -> Result<StorageBackend, ConfigError> {
        match self.storage.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("postgres") => Ok(StorageBackend::Postgres),
            Some("memory") => Ok(StorageBackend::Memory),
            Some(other) => Err(ConfigError::Message(format!(
                "unknown STORAGE backend {}",
                other
            ))),
        }
    }

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::NotFound("DATABASE_URL".to_string()))
    }
}

pub fn load_settings() -> Result<Settings, ConfigError> {
    let settings = Config::builder();
    let settings = settings.add_source(Environment::default().try_parsing(true));
    settings.build()?.try_deserialize()
}
