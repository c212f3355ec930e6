//! Identity lookups shared by the account use cases and startup.

use crate::models::{NewUser, Role, User, DEFAULT_PROFILE_PHOTO};
use crate::services::error::StoreError;
use crate::services::store::IdentityStore;
use crate::utils::password::{hash_password, Password};

/// Resolve a login handle: anything containing `@` is an email, otherwise a
/// username.
pub async fn find_by_login(
    store: &dyn IdentityStore,
    login: &str,
) -> Result<Option<User>, StoreError> {
    let login = login.trim();
    if login.contains('@') {
        store.find_user_by_email(login).await
    } else {
        store.find_user_by_username(login).await
    }
}

/// Credentials for the identity created at startup.
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: Password,
}

/// Create the bootstrap administrator if it does not exist yet.
pub async fn ensure_bootstrap_admin(
    store: &dyn IdentityStore,
    admin: BootstrapAdmin,
) -> Result<bool, StoreError> {
    let password_hash = hash_password(&admin.password)?.into_string();
    let created = store
        .insert_bootstrap_admin(NewUser {
            username: admin.username,
            email: admin.email,
            password_hash,
            profile_photo_path: DEFAULT_PROFILE_PHOTO.to_string(),
            role: Role::Admin,
        })
        .await?;

    if created {
        tracing::info!("Bootstrap administrator created");
    } else {
        tracing::debug!("Bootstrap administrator already present");
    }
    Ok(created)
}
