use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::handlers::form::Form;
use crate::middleware::Caller;
use crate::services::moderation::Upload;
use crate::services::policy::{Action, AuthorizationPolicy};
use crate::startup::AppState;

pub async fn get_user(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.moderation.get_user(&ctx, &username).await?))
}

pub async fn me(
    State(state): State<AppState>,
    Caller(ctx): Caller,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.moderation.me(&ctx).await?))
}

pub async fn update_photo(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    AuthorizationPolicy::authorize(&ctx, Action::UpdateProfilePhoto, ctx.caller_id())?;
    let mut form = Form::read(multipart).await?;
    let upload: Upload = form
        .take_file("file")
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("File is required")))?;

    Ok(Json(state.moderation.update_profile_photo(&ctx, upload).await?))
}
