//! Types and functions for storing and loading members.
//!
//! Member names are unique. Stores enforce this themselves, checking and
//! writing in one step, so two concurrent registrations of the same name
//! cannot both succeed.

use crate::infra::{
    database::DbPool,
    error::{ApiResult, ClientError},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{instrument, Instrument};
use utoipa::ToSchema;
use validator::Validate;

/// A member name, as submitted when joining or renaming.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewMember {
    /// The member's name.
    #[schema(example = "spring")]
    #[validate(length(min = 1))]
    pub name: String,
}

/// An existing member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Member {
    /// The member's id.
    pub id: i64,
    /// The member's name.
    #[schema(example = "spring")]
    pub name: String,
}

pub(crate) fn duplicate_member() -> ClientError {
    ClientError::Conflict("member already exists".to_string())
}

/// Anything that can store members.
#[mockall::automock]
#[async_trait::async_trait]
pub trait MemberStore: Send + Sync {
    /// Lists the members with exactly this name.
    async fn find_by_name(&self, name: &str) -> ApiResult<Vec<Member>>;

    /// Lists all members.
    async fn find_all(&self) -> ApiResult<Vec<Member>>;

    /// Fetches a member.
    async fn find_one(&self, id: i64) -> ApiResult<Option<Member>>;

    /// Stores a new member unless the name is taken.
    async fn save_unique(&self, name: &str) -> ApiResult<Member>;

    /// Renames a member unless any member, itself included, has the name.
    async fn rename_unique(&self, id: i64, name: &str) -> ApiResult<()>;
}

/// A shared, type-erased member store.
pub type DynMemberStore = Arc<dyn MemberStore>;

#[derive(Debug, Default)]
struct MemberTable {
    last_id: i64,
    rows: BTreeMap<i64, Member>,
}

impl MemberTable {
    fn name_taken(&self, name: &str) -> bool {
        self.rows.values().any(|m| m.name == name)
    }
}

/// A member store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryMemberStore {
    table: RwLock<MemberTable>,
}

#[async_trait::async_trait]
impl MemberStore for MemoryMemberStore {
    #[instrument(skip(self))]
    async fn find_by_name(&self, name: &str) -> ApiResult<Vec<Member>> {
        let members = self
            .table
            .read()
            .await
            .rows
            .values()
            .filter(|m| m.name == name)
            .cloned()
            .collect();
        Ok(members)
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> ApiResult<Vec<Member>> {
        let members: Vec<Member> = self.table.read().await.rows.values().cloned().collect();
        tracing::info!("Listed {} members", members.len());
        Ok(members)
    }

    #[instrument(skip(self))]
    async fn find_one(&self, id: i64) -> ApiResult<Option<Member>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    #[instrument(skip(self))]
    async fn save_unique(&self, name: &str) -> ApiResult<Member> {
        let mut table = self.table.write().await;
        if table.name_taken(name) {
            tracing::warn!("Member name is taken");
            return Err(duplicate_member().into());
        }
        table.last_id += 1;
        let member = Member {
            id: table.last_id,
            name: name.to_string(),
        };
        table.rows.insert(member.id, member.clone());
        tracing::info!("Created member {:?}", member);
        Ok(member)
    }

    #[instrument(skip(self))]
    async fn rename_unique(&self, id: i64, name: &str) -> ApiResult<()> {
        let mut table = self.table.write().await;
        if table.name_taken(name) {
            tracing::warn!("Member name is taken");
            return Err(duplicate_member().into());
        }
        let Some(member) = table.rows.get_mut(&id) else {
            tracing::warn!("Member not found");
            return Err(ClientError::NotFound.into());
        };
        member.name = name.to_string();
        tracing::info!("Renamed member {:?}", member);
        Ok(())
    }
}

/// A member store backed by PostgreSQL.
///
/// `members.name` is `UNIQUE`, so the database settles races between
/// concurrent writers.
#[derive(Clone, Debug)]
pub struct PgMemberStore {
    db: DbPool,
}

impl PgMemberStore {
    /// Creates a new store.
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl MemberStore for PgMemberStore {
    #[instrument(skip(self))]
    async fn find_by_name(&self, name: &str) -> ApiResult<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(
            r#"
            SELECT id, name FROM members
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_all(&self.db)
        .instrument(tracing::info_span!("fetch_all"))
        .await?;
        Ok(members)
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> ApiResult<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(
            r#"
            SELECT id, name FROM members
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .instrument(tracing::info_span!("fetch_all"))
        .await?;
        tracing::info!("Listed {} members", members.len());
        Ok(members)
    }

    #[instrument(skip(self))]
    async fn find_one(&self, id: i64) -> ApiResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(
            r#"
            SELECT id, name FROM members
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .instrument(tracing::info_span!("fetch_optional"))
        .await?;
        Ok(member)
    }

    #[instrument(skip(self))]
    async fn save_unique(&self, name: &str) -> ApiResult<Member> {
        let mut tx = self.db.begin().await?;
        let member = sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO members (name)
            VALUES ($1)
            ON CONFLICT (name) DO NOTHING
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(member) = member else {
            tracing::warn!("Member name is taken");
            return Err(duplicate_member().into());
        };
        tx.commit().await?;
        tracing::info!("Created member {:?}", member);
        Ok(member)
    }

    #[instrument(skip(self))]
    async fn rename_unique(&self, id: i64, name: &str) -> ApiResult<()> {
        let mut tx = self.db.begin().await?;
        let taken: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM members
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;
        if taken.is_some() {
            tracing::warn!("Member name is taken");
            return Err(duplicate_member().into());
        }

        // A concurrent rename can still win the race; the unique constraint
        // turns that into a conflict.
        let rows = sqlx::query(
            r#"
            UPDATE members
            SET name = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(name)
        .execute(&mut *tx)
        .await?;

        if rows.rows_affected() == 0 {
            tracing::warn!("Member not found");
            return Err(ClientError::NotFound.into());
        }

        tx.commit().await?;
        tracing::info!("Renamed member");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::error::ApiError;

    fn is_conflict<T>(result: &ApiResult<T>) -> bool {
        matches!(result, Err(ApiError::ClientError(ClientError::Conflict(_))))
    }

    #[tokio::test]
    async fn save_unique_rejects_taken_name() {
        let store = MemoryMemberStore::default();
        let first = store.save_unique("spring").await.unwrap();
        assert_eq!(1, first.id);
        assert!(is_conflict(&store.save_unique("spring").await));
        assert_eq!(vec![first], store.find_all().await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_joins_of_one_name_admit_exactly_one() {
        let store = Arc::new(MemoryMemberStore::default());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.save_unique("spring").await.is_ok() })
            })
            .collect();
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(1, admitted);
        assert_eq!(1, store.find_by_name("spring").await.unwrap().len());
    }

    #[tokio::test]
    async fn rename_checks_every_member() {
        let store = MemoryMemberStore::default();
        let a = store.save_unique("kim").await.unwrap();
        store.save_unique("lee").await.unwrap();

        assert!(is_conflict(&store.rename_unique(a.id, "lee").await));
        assert!(is_conflict(&store.rename_unique(a.id, "kim").await));
        store.rename_unique(a.id, "park").await.unwrap();

        let renamed = store.find_one(a.id).await.unwrap().unwrap();
        assert_eq!("park", renamed.name);
        assert_eq!(2, store.find_all().await.unwrap().len());
    }

    #[tokio::test]
    async fn rename_of_missing_member_is_not_found() {
        let store = MemoryMemberStore::default();
        let result = store.rename_unique(9, "kim").await;
        assert!(matches!(
            result,
            Err(ApiError::ClientError(ClientError::NotFound))
        ));
    }

    #[sqlx::test]
    #[ignore = "requires a running postgres"]
    async fn postgres_enforces_unique_names(db: DbPool) {
        let store = PgMemberStore::new(db);
        let kim = store.save_unique("kim").await.unwrap();
        assert!(is_conflict(&store.save_unique("kim").await));
        store.save_unique("lee").await.unwrap();
        assert!(is_conflict(&store.rename_unique(kim.id, "lee").await));
        assert!(is_conflict(&store.rename_unique(kim.id, "kim").await));
        store.rename_unique(kim.id, "park").await.unwrap();
        assert_eq!(2, store.find_all().await.unwrap().len());
    }
}
