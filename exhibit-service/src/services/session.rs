//! Per-request session state and the authorization context derived from it.
//!
//! A session carries three attributes: `user_id`, `user_role` and
//! `is_admin`. They are written together on login and cleared together on
//! logout. Anything else (a partial set, a value of the wrong type, a role
//! that disagrees with the admin flag) resolves to an error, never to a
//! guess.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::models::{Role, User};

pub const USER_ID_KEY: &str = "user_id";
pub const USER_ROLE_KEY: &str = "user_role";
pub const IS_ADMIN_KEY: &str = "is_admin";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session attribute `{0}` is malformed")]
    Malformed(&'static str),

    #[error("Session attributes are incomplete")]
    Incomplete,

    #[error("Session role and admin flag disagree")]
    Inconsistent,

    #[error("Session store error: {0}")]
    Store(String),
}

/// What gets written into a session on login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: i32,
    pub role: Role,
}

impl From<&User> for SessionIdentity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
        }
    }
}

/// Typed access to the attributes of the current session.
#[async_trait]
pub trait SessionContext: Send + Sync {
    async fn user_id(&self) -> Result<Option<i32>, SessionError>;
    async fn user_role(&self) -> Result<Option<i32>, SessionError>;
    async fn is_admin(&self) -> Result<Option<bool>, SessionError>;

    /// Replace the session identity with `identity`. Implementations rotate
    /// the session id where the backing store supports it.
    async fn establish(&self, identity: SessionIdentity) -> Result<(), SessionError>;

    /// Drop every attribute.
    async fn clear(&self) -> Result<(), SessionError>;
}

#[async_trait]
impl SessionContext for tower_sessions::Session {
    async fn user_id(&self) -> Result<Option<i32>, SessionError> {
        self.get::<i32>(USER_ID_KEY)
            .await
            .map_err(|e| map_session_error(USER_ID_KEY, e))
    }

    async fn user_role(&self) -> Result<Option<i32>, SessionError> {
        self.get::<i32>(USER_ROLE_KEY)
            .await
            .map_err(|e| map_session_error(USER_ROLE_KEY, e))
    }

    async fn is_admin(&self) -> Result<Option<bool>, SessionError> {
        self.get::<bool>(IS_ADMIN_KEY)
            .await
            .map_err(|e| map_session_error(IS_ADMIN_KEY, e))
    }

    async fn establish(&self, identity: SessionIdentity) -> Result<(), SessionError> {
        self.cycle_id()
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;
        self.insert(USER_ID_KEY, identity.user_id)
            .await
            .map_err(|e| map_session_error(USER_ID_KEY, e))?;
        self.insert(USER_ROLE_KEY, identity.role.id())
            .await
            .map_err(|e| map_session_error(USER_ROLE_KEY, e))?;
        self.insert(IS_ADMIN_KEY, identity.role.is_admin())
            .await
            .map_err(|e| map_session_error(IS_ADMIN_KEY, e))?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.flush()
            .await
            .map_err(|e| SessionError::Store(e.to_string()))
    }
}

fn map_session_error(key: &'static str, err: tower_sessions::session::Error) -> SessionError {
    match err {
        tower_sessions::session::Error::SerdeJson(_) => SessionError::Malformed(key),
        other => SessionError::Store(other.to_string()),
    }
}

/// Session held in memory. Used by tests and by callers that drive the
/// moderation service without an HTTP layer.
#[derive(Debug, Default)]
pub struct MemorySession {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: SessionIdentity) -> Self {
        let session = Self::new();
        session.set_raw(USER_ID_KEY, Value::from(identity.user_id));
        session.set_raw(USER_ROLE_KEY, Value::from(identity.role.id()));
        session.set_raw(IS_ADMIN_KEY, Value::from(identity.role.is_admin()));
        session
    }

    /// Write an arbitrary JSON value, bypassing the typed setters.
    pub fn set_raw(&self, key: &str, value: Value) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().map(|v| v.is_empty()).unwrap_or(true)
    }

    fn read<T: serde::de::DeserializeOwned>(
        &self,
        key: &'static str,
    ) -> Result<Option<T>, SessionError> {
        let values = self
            .values
            .lock()
            .map_err(|e| SessionError::Store(format!("Lock error: {}", e)))?;
        match values.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|_| SessionError::Malformed(key)),
        }
    }
}

#[async_trait]
impl SessionContext for MemorySession {
    async fn user_id(&self) -> Result<Option<i32>, SessionError> {
        self.read(USER_ID_KEY)
    }

    async fn user_role(&self) -> Result<Option<i32>, SessionError> {
        self.read(USER_ROLE_KEY)
    }

    async fn is_admin(&self) -> Result<Option<bool>, SessionError> {
        self.read(IS_ADMIN_KEY)
    }

    async fn establish(&self, identity: SessionIdentity) -> Result<(), SessionError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| SessionError::Store(format!("Lock error: {}", e)))?;
        values.clear();
        values.insert(USER_ID_KEY.to_string(), Value::from(identity.user_id));
        values.insert(USER_ROLE_KEY.to_string(), Value::from(identity.role.id()));
        values.insert(IS_ADMIN_KEY.to_string(), Value::from(identity.role.is_admin()));
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.values
            .lock()
            .map_err(|e| SessionError::Store(format!("Lock error: {}", e)))?
            .clear();
        Ok(())
    }
}

/// Snapshot of who is calling, taken once per request.
///
/// `caller_id` and `caller_role` are either both present (authenticated) or
/// both absent (anonymous).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthContext {
    caller: Option<(i32, Role)>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { caller: None }
    }

    pub fn authenticated(caller_id: i32, role: Role) -> Self {
        Self {
            caller: Some((caller_id, role)),
        }
    }

    pub fn user(caller_id: i32) -> Self {
        Self::authenticated(caller_id, Role::User)
    }

    pub fn admin(caller_id: i32) -> Self {
        Self::authenticated(caller_id, Role::Admin)
    }

    pub fn is_authenticated(&self) -> bool {
        self.caller.is_some()
    }

    pub fn caller_id(&self) -> Option<i32> {
        self.caller.map(|(id, _)| id)
    }

    pub fn caller_role(&self) -> Option<Role> {
        self.caller.map(|(_, role)| role)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.caller_role(), Some(Role::Admin))
    }

    /// Build the context from session attributes.
    ///
    /// An empty session is anonymous. A session with a user id must also
    /// carry a known role and an admin flag that agrees with it.
    pub async fn resolve(session: &dyn SessionContext) -> Result<Self, SessionError> {
        let user_id = session.user_id().await?;
        let role_id = session.user_role().await?;
        let is_admin = session.is_admin().await?;

        let Some(user_id) = user_id else {
            if role_id.is_some() || is_admin.is_some() {
                return Err(SessionError::Incomplete);
            }
            return Ok(Self::anonymous());
        };

        let role_id = role_id.ok_or(SessionError::Incomplete)?;
        let is_admin = is_admin.ok_or(SessionError::Incomplete)?;
        let role = Role::from_id(role_id).ok_or(SessionError::Malformed(USER_ROLE_KEY))?;

        if role.is_admin() != is_admin {
            return Err(SessionError::Inconsistent);
        }

        Ok(Self::authenticated(user_id, role))
    }
}
