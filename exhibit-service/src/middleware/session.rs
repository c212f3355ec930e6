use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use tower_sessions::Session;

use crate::services::session::AuthContext;
use crate::startup::AppState;

/// Caller identity resolved from the session cookie.
///
/// Never rejects an anonymous request: whether anonymity is acceptable is up
/// to the authorization policy. Rejects sessions whose attributes are
/// unusable. A session whose identity was deleted is cleared and the caller
/// treated as anonymous.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::InternalError(anyhow::anyhow!(msg)))?;

        let ctx = state.moderation.resolve_caller(&session).await?;

        if let Some(user_id) = ctx.caller_id() {
            tracing::Span::current().record("user_id", user_id);
        }

        Ok(Caller(ctx))
    }
}
