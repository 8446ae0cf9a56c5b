//! The member API implementation.

use super::{
    member_repository::{DynMemberStore, Member, NewMember},
    member_service,
};
use crate::infra::{
    error::{ApiResult, ClientError},
    extract::{Json, Query},
    state::AppState,
    validation::Valid,
};
use axum::{extract::State, Router};
use axum_extra::routing::{RouterExt, TypedPath};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

/// The member API endpoints.
pub fn routes() -> Router<AppState> {
    Router::new()
        .typed_post(join)
        .typed_get(list_members)
        .typed_get(get_member)
        .typed_put(update_member)
}

#[derive(Debug, Deserialize, TypedPath)]
#[typed_path("/members", rejection(ClientError))]
pub struct Members;

#[derive(Debug, Deserialize, TypedPath)]
#[typed_path("/members/:id", rejection(ClientError))]
pub struct MembersId(pub i64);

/// The id assigned to a new member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MemberId {
    /// The member's id.
    pub id: i64,
}

/// Filters for listing members.
#[derive(Clone, Debug, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MemberFilter {
    /// Only list members with exactly this name.
    name: Option<String>,
}

/// Registers a new member.
#[utoipa::path(
    post,
    path = "/api/members",
    request_body = NewMember,
    responses(
        (status = 201, description = "Created", body = MemberId),
        (status = 409, description = "Conflict", body = ErrorBody),
        (status = 422, description = "Unprocessable Entity", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody),
    )
)]
#[instrument(skip_all)]
pub async fn join(
    Members: Members,
    State(members): State<DynMemberStore>,
    Json(new_member): Json<NewMember>,
) -> ApiResult<(StatusCode, Json<MemberId>)> {
    let new_member = Valid::new(new_member)?;
    let id = member_service::join(&*members, new_member).await?;
    Ok((StatusCode::CREATED, Json(MemberId { id })))
}

/// Lists members.
#[utoipa::path(
    get,
    path = "/api/members",
    params(MemberFilter),
    responses(
        (status = 200, description = "Success", body = [Member]),
        (status = 500, description = "Internal Server Error", body = ErrorBody),
    )
)]
#[instrument(skip(members))]
pub async fn list_members(
    Members: Members,
    State(members): State<DynMemberStore>,
    Query(filter): Query<MemberFilter>,
) -> ApiResult<Json<Vec<Member>>> {
    let found = match &filter.name {
        Some(name) => member_service::find_by_name(&*members, name).await?,
        None => member_service::find_members(&*members).await?,
    };
    Ok(Json(found))
}

/// Gets a member.
#[utoipa::path(
    get,
    path = "/api/members/{id}",
    params(("id" = i64, Path, description = "The member's id")),
    responses(
        (status = 200, description = "Ok", body = Member),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody),
    )
)]
#[instrument(skip(members))]
pub async fn get_member(
    MembersId(id): MembersId,
    State(members): State<DynMemberStore>,
) -> ApiResult<Json<Member>> {
    let member = member_service::find_one(&*members, id)
        .await?
        .ok_or(ClientError::NotFound)?;
    Ok(Json(member))
}

/// Renames a member.
#[utoipa::path(
    put,
    path = "/api/members/{id}",
    params(("id" = i64, Path, description = "The member's id")),
    request_body = NewMember,
    responses(
        (status = 204, description = "No Content"),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Conflict", body = ErrorBody),
        (status = 422, description = "Unprocessable Entity", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody),
    )
)]
#[instrument(skip(members))]
pub async fn update_member(
    MembersId(id): MembersId,
    State(members): State<DynMemberStore>,
    Json(new_name): Json<NewMember>,
) -> ApiResult<StatusCode> {
    let new_name = Valid::new(new_name)?;
    member_service::update(&*members, id, new_name).await?;
    Ok(StatusCode::NO_CONTENT)
}
