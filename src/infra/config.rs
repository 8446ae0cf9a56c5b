//! For reading application configuration.

use serde::Deserialize;
use std::time::Duration;

/// Application configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Where items and members are kept.
    pub storage: StorageBackend,
    /// Database configuration, used by [`StorageBackend::Postgres`].
    pub database: DatabaseConfig,
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    /// Server address.
    pub http_address: String,
    /// Server http port.
    pub http_port: u16,
    /// How long a request may take before it is aborted.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// The maximum number of requests served at once.
    pub concurrency_limit: usize,
}

/// The storage backend to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Keep everything in process memory.
    Memory,
    /// Keep everything in PostgreSQL.
    Postgres,
}

/// Database configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    /// The database username.
    pub username: String,
    /// The database password.
    pub password: String,
    /// The database port.
    pub port: u16,
    /// The database name.
    pub database_name: String,
    /// The database host.
    pub host: String,
}

/// Retrieve [`Config`] from defaults, the optional `config` file and the environment.
#[tracing::instrument]
pub fn load_config() -> color_eyre::Result<Config> {
    let config = config::Config::builder()
        .set_default("server.http_address", "127.0.0.1")?
        .set_default("server.http_port", 8080)?
        .set_default("server.request_timeout", "10s")?
        .set_default("server.concurrency_limit", 100)?
        .set_default("storage", "memory")?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "postgres")?
        .set_default("database.port", 5432)?
        .set_default("database.database_name", "shop")?
        .set_default("database.host", "localhost")?
        .add_source(config::File::with_name("config").required(false))
        .add_source(
            config::Environment::with_prefix("app")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    Ok(config)
}
