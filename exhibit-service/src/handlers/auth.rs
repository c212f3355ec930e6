use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use tower_sessions::Session;

use crate::dtos::LoginRequest;
use crate::handlers::form::Form;
use crate::middleware::Caller;
use crate::services::moderation::{Credentials, Registration};
use crate::startup::AppState;
use crate::utils::password::Password;

pub async fn sign_up(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = Form::read(multipart).await?;

    let registration = Registration {
        username: form.text("username").unwrap_or_default().trim().to_string(),
        email: form.text("email").unwrap_or_default().trim().to_string(),
        password: form.text("password").unwrap_or_default().to_string(),
        profile_photo: form.take_file("profile_photo"),
    };

    let user = state.moderation.register(&ctx, registration).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .moderation
        .login(
            &session,
            Credentials {
                login: payload.login,
                password: Password::new(payload.password),
            },
        )
        .await?;
    Ok(Json(user))
}

pub async fn logout(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    state.moderation.logout(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
