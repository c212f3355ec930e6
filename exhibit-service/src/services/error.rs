use service_core::error::AppError;
use thiserror::Error;

use super::session::SessionError;

/// Failure raised by an identity or exhibit store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Referenced row does not exist: {0}")]
    ForeignKeyViolation(String),

    #[error("Store call timed out")]
    Timeout,

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Store error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let constraint = db.constraint().unwrap_or_default().to_string();
            match db.code().as_deref() {
                Some("23505") => return StoreError::UniqueViolation(constraint),
                Some("23503") => return StoreError::ForeignKeyViolation(constraint),
                _ => {}
            }
        }
        match err {
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            other => StoreError::Backend(anyhow::Error::new(other)),
        }
    }
}

/// Outcome kinds of every moderation use case.
#[derive(Error, Debug)]
pub enum ModerationError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

impl ModerationError {
    pub fn unauthenticated() -> Self {
        ModerationError::Unauthenticated("Authentication required".to_string())
    }

    pub fn forbidden() -> Self {
        ModerationError::Forbidden("Forbidden".to_string())
    }

    pub fn not_found(what: &str) -> Self {
        ModerationError::NotFound(format!("{} not found", what))
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        ModerationError::InvalidInput(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ModerationError::Unauthenticated(_) => "unauthenticated",
            ModerationError::Forbidden(_) => "forbidden",
            ModerationError::NotFound(_) => "not_found",
            ModerationError::InvalidInput(_) => "invalid_input",
            ModerationError::Conflict(_) => "conflict",
            ModerationError::Internal(_) => "internal_failure",
        }
    }
}

impl From<StoreError> for ModerationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(_) => {
                ModerationError::Conflict("Resource already exists".to_string())
            }
            StoreError::ForeignKeyViolation(_) => {
                ModerationError::InvalidInput("Referenced resource does not exist".to_string())
            }
            StoreError::Timeout => ModerationError::Internal(anyhow::anyhow!("store call timed out")),
            StoreError::Corrupt(msg) => ModerationError::Internal(anyhow::anyhow!(msg)),
            StoreError::Backend(e) => ModerationError::Internal(e),
        }
    }
}

impl From<SessionError> for ModerationError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Store(msg) => {
                ModerationError::Internal(anyhow::anyhow!("session store failure: {}", msg))
            }
            other => {
                tracing::warn!(error = %other, "Rejecting request with unusable session");
                ModerationError::unauthenticated()
            }
        }
    }
}

impl From<ModerationError> for AppError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::Unauthenticated(msg) => AppError::Unauthorized(anyhow::anyhow!(msg)),
            ModerationError::Forbidden(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ModerationError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ModerationError::InvalidInput(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ModerationError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ModerationError::Internal(e) => AppError::InternalError(e),
        }
    }
}
