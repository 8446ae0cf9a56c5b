//! A service for registering and renaming members.

use super::member_repository::{Member, MemberStore, NewMember};
use crate::infra::{error::ApiResult, validation::Valid};
use tracing::instrument;

/// Registers a member and returns its id.
///
/// Fails with a conflict if another member already has the name.
#[instrument(skip(store))]
pub async fn join<S: MemberStore + ?Sized>(store: &S, new_member: Valid<NewMember>) -> ApiResult<i64> {
    let new_member = new_member.into_inner();
    let member = store.save_unique(&new_member.name).await?;
    tracing::info!("Member {} joined", member.id);
    Ok(member.id)
}

/// Lists all members.
#[instrument(skip(store))]
pub async fn find_members<S: MemberStore + ?Sized>(store: &S) -> ApiResult<Vec<Member>> {
    store.find_all().await
}

/// Lists the members with exactly this name.
#[instrument(skip(store))]
pub async fn find_by_name<S: MemberStore + ?Sized>(store: &S, name: &str) -> ApiResult<Vec<Member>> {
    store.find_by_name(name).await
}

/// Fetches a member.
#[instrument(skip(store))]
pub async fn find_one<S: MemberStore + ?Sized>(store: &S, id: i64) -> ApiResult<Option<Member>> {
    store.find_one(id).await
}

/// Renames a member in place.
///
/// Fails with a conflict if any member has the name, including the member
/// being renamed, and with not found if there is no such member.
#[instrument(skip(store))]
pub async fn update<S: MemberStore + ?Sized>(
    store: &S,
    id: i64,
    new_name: Valid<NewMember>,
) -> ApiResult<()> {
    let new_name = new_name.into_inner();
    store.rename_unique(id, &new_name.name).await
}
