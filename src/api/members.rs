//! Member management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::member::{CreateMember, Member, MemberQuery, UpdateMember},
};

/// Paginated list of members
#[derive(Serialize, ToSchema)]
pub struct MemberListResponse {
    pub items: Vec<Member>,
    pub total: i64,
}

/// List members
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    params(MemberQuery),
    responses(
        (status = 200, description = "Members", body = MemberListResponse)
    )
)]
pub async fn list_members(
    State(state): State<crate::AppState>,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<MemberListResponse>> {
    let (items, total) = state.services.members.list_members(&query).await?;
    Ok(Json(MemberListResponse { items, total }))
}

/// Get a single member
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member details", body = Member),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.get_member(id).await?;
    Ok(Json(member))
}

/// Register a new member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = Member),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_member(
    State(state): State<crate::AppState>,
    Json(request): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<Member>)> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let member = state.services.members.create_member(request).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Update a member
#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn update_member(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateMember>,
) -> AppResult<Json<Member>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let member = state.services.members.update_member(id, request).await?;
    Ok(Json(member))
}
