use crate::models::Role;
use crate::services::moderation::DeletedUser;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username, or email when it contains `@`.
    pub login: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteUserParams {
    pub with_exhibits: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RoleResponse {
    pub id: i32,
    pub name: String,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            id: role.id(),
            name: role.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedUserResponse {
    pub id: i32,
    pub exhibits_removed: usize,
}

impl From<DeletedUser> for DeletedUserResponse {
    fn from(d: DeletedUser) -> Self {
        Self {
            id: d.id,
            exhibits_removed: d.exhibits_removed,
        }
    }
}
