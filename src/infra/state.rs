//! Global application state.
//!
//! Used for access to common resources such as the stores
//! and the configuration.

use super::{
    config::{Config, StorageBackend},
    database::{self, DbPool},
    error::ApiResult,
};
use crate::feature::{
    item::item_repository::{DynItemStore, MemoryItemStore, PgItemStore},
    member::member_repository::{DynMemberStore, MemoryMemberStore, PgMemberStore},
};
use axum::extract::FromRef;
use std::sync::Arc;

/// Global application state.
#[derive(Clone, FromRef)]
pub struct AppState {
    config: Config,
    items: DynItemStore,
    members: DynMemberStore,
}

impl AppState {
    /// Constructs a new [`AppState`] from existing stores.
    pub fn new(config: Config, items: DynItemStore, members: DynMemberStore) -> Self {
        Self {
            config,
            items,
            members,
        }
    }

    /// Constructs an [`AppState`] backed by fresh in-memory stores.
    pub fn in_memory(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(MemoryItemStore::default()),
            Arc::new(MemoryMemberStore::default()),
        )
    }

    /// Constructs an [`AppState`] backed by PostgreSQL.
    pub fn postgres(config: Config, db: DbPool) -> Self {
        Self::new(
            config,
            Arc::new(PgItemStore::new(db.clone())),
            Arc::new(PgMemberStore::new(db)),
        )
    }

    /// Constructs an [`AppState`] for the configured storage backend.
    pub async fn from_config(config: Config) -> ApiResult<Self> {
        match config.storage {
            StorageBackend::Memory => {
                tracing::info!("Using in-memory storage");
                Ok(Self::in_memory(config))
            }
            StorageBackend::Postgres => {
                tracing::info!("Using postgres storage at {}", config.database.host);
                let db = database::init_db(&config.database);
                database::migrate(&db).await?;
                Ok(Self::postgres(config, db))
            }
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}
