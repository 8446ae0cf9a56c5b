//! OpenAPI configuration.

use crate::feature::member::{member_api, member_repository};

/// OpenApi configuration.
#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        member_api::join,
        member_api::list_members,
        member_api::get_member,
        member_api::update_member,
    ),
    components(
        schemas(
            member_repository::NewMember,
            member_repository::Member,
            member_api::MemberId,
            crate::infra::error::ErrorBody
        )
    )
)]
#[derive(Clone, Copy, Debug)]
pub struct ApiDoc;
