use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{DeleteUserParams, DeletedUserResponse, ExhibitResponse, RoleResponse};
use crate::handlers::form::{parse_flag, parse_id};
use crate::middleware::Caller;
use crate::startup::AppState;

pub async fn approve_exhibit(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "exhibit")?;
    let exhibit = state.moderation.approve_exhibit(&ctx, id).await?;
    Ok(Json(ExhibitResponse::from(exhibit)))
}

pub async fn reject_exhibit(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "exhibit")?;
    let exhibit = state.moderation.reject_exhibit(&ctx, id).await?;
    Ok(Json(ExhibitResponse::from(exhibit)))
}

pub async fn list_users(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.moderation.list_users(&ctx).await?))
}

pub async fn list_roles(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> Result<impl IntoResponse, AppError> {
    let roles: Vec<RoleResponse> = state
        .moderation
        .list_roles(&ctx)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();
    Ok(Json(roles))
}

pub async fn make_admin(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "user")?;
    Ok(Json(state.moderation.promote_to_admin(&ctx, id).await?))
}

pub async fn remove_admin(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "user")?;
    Ok(Json(state.moderation.demote_from_admin(&ctx, id).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
    Query(params): Query<DeleteUserParams>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "user")?;
    let cascade = parse_flag(params.with_exhibits.as_deref(), "with_exhibits")?;
    let deleted = state.moderation.delete_user(&ctx, id, cascade).await?;
    Ok(Json(DeletedUserResponse::from(deleted)))
}
