//! Identity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity created at bootstrap. It can never be deleted or have its
/// role changed.
pub const BOOTSTRAP_ADMIN_ID: i32 = 1;

/// Profile photo value meaning "no custom photo". Never deleted on replace.
pub const DEFAULT_PROFILE_PHOTO: &str = "default.png";

/// Closed set of roles. Ids match the seeded `user_roles` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    pub fn id(&self) -> i32 {
        match self {
            Role::User => 1,
            Role::Admin => 2,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Role::User),
            2 => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored identity, including the password hash.
///
/// Deliberately not `Serialize`: the only way out to a caller is
/// [`User::sanitized`].
#[derive(Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub profile_photo_path: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("profile_photo_path", &self.profile_photo_path)
            .field("role", &self.role)
            .finish()
    }
}

impl User {
    pub fn is_bootstrap_admin(&self) -> bool {
        self.id == BOOTSTRAP_ADMIN_ID
    }

    pub fn has_custom_photo(&self) -> bool {
        self.profile_photo_path != DEFAULT_PROFILE_PHOTO
    }

    /// Convert to a response with no credential material.
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// Input for inserting an identity.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub profile_photo_path: String,
    pub role: Role,
}

/// Identity as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub profile_photo_path: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            profile_photo_path: u.profile_photo_path,
            role: u.role,
            created_at: u.created_at,
        }
    }
}
