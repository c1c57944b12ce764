//! Process settings from the environment.

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// PostgreSQL URL. `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub schema_config_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub max_body_bytes: usize,
    pub db_max_connections: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: None,
            schema_config_path: PathBuf::from("config"),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    }
}

impl Settings {
    /// Read settings from the process environment, loading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        fn parse<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
            match raw {
                Some(s) if !s.trim().is_empty() => s
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::Load(format!("{} has an invalid value: {}", key, s))),
                _ => Ok(default),
            }
        }
        let defaults = Settings::default();
        Ok(Settings {
            database_url: get("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            schema_config_path: get("SCHEMA_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.schema_config_path),
            bind_addr: parse("BIND_ADDR", get("BIND_ADDR"), defaults.bind_addr)?,
            max_body_bytes: parse("MAX_BODY_BYTES", get("MAX_BODY_BYTES"), defaults.max_body_bytes)?,
            db_max_connections: parse("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), defaults.db_max_connections)?,
        })
    }
}
