//! Persistence seams for identities and exhibits.

use async_trait::async_trait;

use crate::models::{Exhibit, ExhibitQuery, ExhibitStatus, ExhibitType, NewExhibit, NewUser, Role, User};
use crate::services::error::StoreError;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    /// Returns `false` when no identity has this id.
    async fn update_role(&self, id: i32, role: Role) -> Result<bool, StoreError>;
    async fn update_profile_photo(&self, id: i32, path: &str) -> Result<bool, StoreError>;
    async fn delete_user(&self, id: i32) -> Result<bool, StoreError>;
    /// Create the identity with the bootstrap id unless it already exists.
    /// Returns `true` when a row was written.
    async fn insert_bootstrap_admin(&self, user: NewUser) -> Result<bool, StoreError>;
    async fn health_check(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ExhibitStore: Send + Sync {
    async fn insert_exhibit(&self, exhibit: NewExhibit) -> Result<Exhibit, StoreError>;
    async fn find_exhibit(&self, id: i32) -> Result<Option<Exhibit>, StoreError>;
    /// Newest first.
    async fn list_exhibits(&self, query: &ExhibitQuery) -> Result<Vec<Exhibit>, StoreError>;
    async fn list_exhibits_by_author(&self, author_id: i32) -> Result<Vec<Exhibit>, StoreError>;
    /// Single-row compare-and-set. Returns `false` if the exhibit is gone or
    /// its status is no longer `from`.
    async fn transition_status(
        &self,
        id: i32,
        from: ExhibitStatus,
        to: ExhibitStatus,
    ) -> Result<bool, StoreError>;
    async fn delete_exhibit(&self, id: i32) -> Result<bool, StoreError>;
    async fn list_exhibit_types(&self) -> Result<Vec<ExhibitType>, StoreError>;
    async fn find_exhibit_type(&self, id: i32) -> Result<Option<ExhibitType>, StoreError>;
}
