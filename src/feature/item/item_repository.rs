//! Types and functions for storing and loading items.

use crate::infra::{
    database::DbPool,
    error::{ApiResult, ClientError},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{instrument, Instrument};

/// The fields of an item, without its id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    /// The item's name.
    pub name: String,
    /// The price of a single unit.
    pub price: i32,
    /// The number of units in stock.
    pub quantity: i32,
}

/// An existing item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    /// The item's id.
    pub id: i64,
    /// The item's name.
    pub name: String,
    /// The price of a single unit.
    pub price: i32,
    /// The number of units in stock.
    pub quantity: i32,
}

impl Item {
    fn from_new(id: i64, new_item: NewItem) -> Self {
        Self {
            id,
            name: new_item.name,
            price: new_item.price,
            quantity: new_item.quantity,
        }
    }
}

/// Anything that can store items.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ItemStore: Send + Sync {
    /// Lists all items.
    async fn find_all(&self) -> ApiResult<Vec<Item>>;

    /// Fetches an item.
    async fn find_by_id(&self, id: i64) -> ApiResult<Option<Item>>;

    /// Stores a new item and assigns it an id.
    async fn save(&self, new_item: NewItem) -> ApiResult<Item>;

    /// Replaces the fields of an existing item.
    async fn update(&self, id: i64, new_item: NewItem) -> ApiResult<()>;
}

/// A shared, type-erased item store.
pub type DynItemStore = Arc<dyn ItemStore>;

#[derive(Debug, Default)]
struct ItemTable {
    last_id: i64,
    rows: BTreeMap<i64, Item>,
}

/// An item store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    table: RwLock<ItemTable>,
}

#[async_trait::async_trait]
impl ItemStore for MemoryItemStore {
    #[instrument(skip(self))]
    async fn find_all(&self) -> ApiResult<Vec<Item>> {
        let items: Vec<Item> = self.table.read().await.rows.values().cloned().collect();
        tracing::info!("Listed {} items", items.len());
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> ApiResult<Option<Item>> {
        let item = self.table.read().await.rows.get(&id).cloned();
        tracing::info!("Found item: {:?}", item);
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn save(&self, new_item: NewItem) -> ApiResult<Item> {
        let mut table = self.table.write().await;
        table.last_id += 1;
        let item = Item::from_new(table.last_id, new_item);
        table.rows.insert(item.id, item.clone());
        tracing::info!("Created item {:?}", item);
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn update(&self, id: i64, new_item: NewItem) -> ApiResult<()> {
        let mut table = self.table.write().await;
        let Some(item) = table.rows.get_mut(&id) else {
            tracing::warn!("Item not found");
            return Err(ClientError::NotFound.into());
        };
        *item = Item::from_new(id, new_item);
        tracing::info!("Updated item {:?}", item);
        Ok(())
    }
}

/// An item store backed by PostgreSQL.
#[derive(Clone, Debug)]
pub struct PgItemStore {
    db: DbPool,
}

impl PgItemStore {
    /// Creates a new store.
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl ItemStore for PgItemStore {
    #[instrument(skip(self))]
    async fn find_all(&self) -> ApiResult<Vec<Item>> {
        tracing::info!("Listing items");
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, price, quantity FROM items
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .instrument(tracing::info_span!("fetch_all"))
        .await?;
        tracing::info!("Listed {} items", items.len());
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> ApiResult<Option<Item>> {
        tracing::info!("Reading item");
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, price, quantity FROM items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .instrument(tracing::info_span!("fetch_optional"))
        .await?;
        tracing::info!("Found item: {:?}", item);
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn save(&self, new_item: NewItem) -> ApiResult<Item> {
        tracing::info!("Creating item {:?}", new_item);
        let mut tx = self.db.begin().await?;
        let item = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (name, price, quantity)
            VALUES ($1, $2, $3)
            RETURNING id, name, price, quantity
            "#,
        )
        .bind(&new_item.name)
        .bind(new_item.price)
        .bind(new_item.quantity)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!("Created item {:?}", item);
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn update(&self, id: i64, new_item: NewItem) -> ApiResult<()> {
        tracing::info!("Updating item {:?}", new_item);
        let mut tx = self.db.begin().await?;
        let rows = sqlx::query(
            r#"
            UPDATE items
            SET name = $2, price = $3, quantity = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&new_item.name)
        .bind(new_item.price)
        .bind(new_item.quantity)
        .execute(&mut *tx)
        .await?;

        if rows.rows_affected() == 0 {
            tracing::warn!("Item not found");
            return Err(ClientError::NotFound.into());
        }

        tx.commit().await?;
        tracing::info!("Updated item");
        Ok(())
    }
}
