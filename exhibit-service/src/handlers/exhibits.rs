use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{ExhibitListParams, ExhibitListResponse, ExhibitResponse};
use crate::handlers::form::{parse_id, Form};
use crate::middleware::Caller;
use crate::services::moderation::{ListingFilter, Submission};
use crate::services::policy::{Action, AuthorizationPolicy};
use crate::startup::AppState;

pub async fn list_exhibits(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Query(params): Query<ExhibitListParams>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ListingFilter::from(params);
    let exhibits = state.moderation.list_exhibits(&ctx, &filter).await?;
    Ok(Json(ExhibitListResponse::from(exhibits)))
}

pub async fn list_exhibit_types(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.moderation.list_exhibit_types(&ctx).await?))
}

pub async fn get_exhibit(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "exhibit")?;
    let exhibit = state.moderation.view_exhibit(&ctx, id).await?;
    Ok(Json(ExhibitResponse::from(exhibit)))
}

pub async fn create_exhibit(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    // Reject anonymous callers before buffering the upload.
    AuthorizationPolicy::authorize(&ctx, Action::SubmitExhibit, ctx.caller_id())?;
    let mut form = Form::read(multipart).await?;

    let type_id = form
        .text("type")
        .and_then(|raw| raw.trim().parse::<i32>().ok())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid exhibit type")))?;

    let submission = Submission {
        title: form.text("title").unwrap_or_default().to_string(),
        type_id,
        description: form.text("description").unwrap_or_default().to_string(),
        file: form.take_file("file"),
    };

    let exhibit = state.moderation.submit_exhibit(&ctx, submission).await?;
    Ok((StatusCode::CREATED, Json(ExhibitResponse::from(exhibit))))
}

pub async fn my_exhibits(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> Result<impl IntoResponse, AppError> {
    let exhibits = state.moderation.list_my_exhibits(&ctx).await?;
    Ok(Json(ExhibitListResponse::from(exhibits)))
}

pub async fn delete_exhibit(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "exhibit")?;
    state.moderation.delete_exhibit(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
