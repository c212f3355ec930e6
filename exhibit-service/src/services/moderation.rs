//! Use-case orchestration.
//!
//! Each operation takes the caller's [`AuthContext`], asks
//! [`AuthorizationPolicy`] for a decision, applies [`ExhibitLifecycle`]
//! rules where status is involved and then persists through the stores.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use validator::{Validate, ValidationError};

use crate::models::{
    Exhibit, ExhibitQuery, ExhibitStatus, ExhibitType, NewExhibit, NewUser, Role, User,
    UserResponse, DEFAULT_PROFILE_PHOTO,
};
use crate::services::error::{ModerationError, StoreError};
use crate::services::identity::find_by_login;
use crate::services::lifecycle::{ExhibitLifecycle, ModerationDecision, TransitionPolicy};
use crate::services::policy::{Action, AuthorizationPolicy};
use crate::services::session::{AuthContext, SessionContext, SessionIdentity};
use crate::services::storage::{AssetKind, AssetStorage};
use crate::services::store::{ExhibitStore, IdentityStore};
use crate::utils::filename::hashed_file_name;
use crate::utils::password::{hash_password, verify_password, Password, PasswordHashString};

const FORBIDDEN_USERNAME_CHARS: &str = "!@#$%^&*()_+-=";

/// An uploaded file as received from the caller.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Clone, Validate)]
pub struct Registration {
    #[validate(
        length(min = 3, max = 255, message = "Username must be 3 to 255 characters"),
        custom(function = "validate_username_chars")
    )]
    pub username: String,
    #[validate(email(message = "Email is not valid"))]
    pub email: String,
    #[validate(length(min = 8, max = 255, message = "Password must be 8 to 255 characters"))]
    pub password: String,
    pub profile_photo: Option<Upload>,
}

fn validate_username_chars(username: &str) -> Result<(), ValidationError> {
    if username.chars().any(|c| FORBIDDEN_USERNAME_CHARS.contains(c)) {
        let mut err = ValidationError::new("username_chars");
        err.message = Some("Username contains forbidden characters".into());
        return Err(err);
    }
    Ok(())
}

pub struct Credentials {
    pub login: String,
    pub password: Password,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub title: String,
    pub type_id: i32,
    pub description: String,
    pub file: Option<Upload>,
}

/// Raw listing filter as supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub status: Option<String>,
    pub username: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    pub end_date: Option<String>,
}

impl ListingFilter {
    /// Parse into a store query. The status filter is only parsed for
    /// admins; for everyone else it is overridden anyway.
    pub fn to_query(&self, ctx: &AuthContext) -> Result<ExhibitQuery, ModerationError> {
        let start = parse_date("start_date", self.start_date.as_deref())?;
        let end = parse_date("end_date", self.end_date.as_deref())?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ModerationError::invalid(
                    "start_date must not be after end_date",
                ));
            }
        }

        let status = match non_blank(self.status.as_deref()) {
            Some(raw) if ctx.is_admin() => Some(
                raw.parse::<ExhibitStatus>()
                    .map_err(ModerationError::InvalidInput)?,
            ),
            _ => None,
        };

        let created_before = match end {
            Some(end) => Some(start_of_day(
                end.succ_opt()
                    .ok_or_else(|| ModerationError::invalid("end_date is out of range"))?,
            )?),
            None => None,
        };

        Ok(ExhibitQuery {
            status,
            username: non_blank(self.username.as_deref()).map(str::to_string),
            created_from: start.map(start_of_day).transpose()?,
            created_before,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ModerationError> {
    non_blank(value)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ModerationError::invalid(format!("{} must be a YYYY-MM-DD date", field))
            })
        })
        .transpose()
}

fn start_of_day(date: NaiveDate) -> Result<DateTime<Utc>, ModerationError> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ModerationError::invalid("date is out of range"))
}

/// Result of a user deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedUser {
    pub id: i32,
    pub exhibits_removed: usize,
}

#[derive(Clone)]
pub struct ModerationService {
    identities: Arc<dyn IdentityStore>,
    exhibits: Arc<dyn ExhibitStore>,
    storage: Arc<dyn AssetStorage>,
    lifecycle: ExhibitLifecycle,
}

impl ModerationService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        exhibits: Arc<dyn ExhibitStore>,
        storage: Arc<dyn AssetStorage>,
        policy: TransitionPolicy,
    ) -> Self {
        Self {
            identities,
            exhibits,
            storage,
            lifecycle: ExhibitLifecycle::new(policy),
        }
    }

    pub async fn health_check(&self) -> Result<(), ModerationError> {
        self.identities.health_check().await.map_err(Into::into)
    }

    // ==================== Accounts ====================

    pub async fn register(
        &self,
        ctx: &AuthContext,
        registration: Registration,
    ) -> Result<UserResponse, ModerationError> {
        if ctx.is_authenticated() {
            return Err(ModerationError::invalid("Already logged in"));
        }
        registration
            .validate()
            .map_err(|e| ModerationError::invalid(e.to_string()))?;

        let password_hash = hash_password(&Password::new(registration.password.clone()))
            .map_err(ModerationError::Internal)?
            .into_string();

        let photo = match &registration.profile_photo {
            Some(upload) if !upload.data.is_empty() => {
                let name = hashed_file_name(&registration.username, &upload.file_name);
                self.store_asset(AssetKind::ProfilePhoto, &name, upload.data.clone())
                    .await?;
                Some(name)
            }
            _ => None,
        };

        let inserted = self
            .identities
            .insert_user(NewUser {
                username: registration.username,
                email: registration.email,
                password_hash,
                profile_photo_path: photo
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PROFILE_PHOTO.to_string()),
                role: Role::User,
            })
            .await;

        match inserted {
            Ok(user) => {
                tracing::info!(user_id = user.id, "User registered");
                Ok(user.sanitized())
            }
            Err(err) => {
                if let Some(name) = photo {
                    self.discard_asset(AssetKind::ProfilePhoto, &name).await;
                }
                Err(match err {
                    StoreError::UniqueViolation(_) => ModerationError::Conflict(
                        "User with this username or email already exists".to_string(),
                    ),
                    other => other.into(),
                })
            }
        }
    }

    /// Check credentials and write the identity into `session`.
    pub async fn login(
        &self,
        session: &dyn SessionContext,
        credentials: Credentials,
    ) -> Result<UserResponse, ModerationError> {
        if let Ok(ctx) = self.resolve_caller(session).await {
            if ctx.is_authenticated() {
                return Err(ModerationError::invalid("Already logged in"));
            }
        }

        let invalid = || ModerationError::Unauthenticated("Invalid login or password".to_string());

        let user = find_by_login(self.identities.as_ref(), &credentials.login)
            .await?
            .ok_or_else(invalid)?;

        let matches = verify_password(
            &credentials.password,
            &PasswordHashString::new(user.password_hash.clone()),
        )
        .map_err(ModerationError::Internal)?;
        if !matches {
            tracing::info!(user_id = user.id, "Login rejected");
            return Err(invalid());
        }

        session.establish(SessionIdentity::from(&user)).await?;
        tracing::info!(user_id = user.id, role = %user.role, "User logged in");
        Ok(user.sanitized())
    }

    /// Resolve the caller from `session`. A session whose identity has been
    /// deleted is cleared and treated as anonymous.
    pub async fn resolve_caller(
        &self,
        session: &dyn SessionContext,
    ) -> Result<AuthContext, ModerationError> {
        let ctx = AuthContext::resolve(session).await?;
        let Some(id) = ctx.caller_id() else {
            return Ok(ctx);
        };
        if self.identities.find_user_by_id(id).await?.is_some() {
            return Ok(ctx);
        }

        tracing::info!(user_id = id, "Dropping session of deleted identity");
        session.clear().await?;
        Ok(AuthContext::anonymous())
    }

    pub async fn logout(&self, session: &dyn SessionContext) -> Result<(), ModerationError> {
        let ctx = AuthContext::resolve(session).await?;
        AuthorizationPolicy::authorize(&ctx, Action::Logout, ctx.caller_id())?;
        session.clear().await?;
        tracing::info!(user_id = ctx.caller_id(), "User logged out");
        Ok(())
    }

    pub async fn me(&self, ctx: &AuthContext) -> Result<UserResponse, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::ViewOwnProfile, ctx.caller_id())?;
        Ok(self.require_caller(ctx).await?.sanitized())
    }

    pub async fn get_user(
        &self,
        ctx: &AuthContext,
        username: &str,
    ) -> Result<UserResponse, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::ViewUser, None)?;
        self.identities
            .find_user_by_username(username)
            .await?
            .map(|u| u.sanitized())
            .ok_or_else(|| ModerationError::not_found("User"))
    }

    pub async fn list_users(&self, ctx: &AuthContext) -> Result<Vec<UserResponse>, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::ListUsers, None)?;
        let users = self.identities.list_users().await?;
        Ok(users.iter().map(User::sanitized).collect())
    }

    pub async fn list_roles(&self, ctx: &AuthContext) -> Result<Vec<Role>, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::ListRoles, None)?;
        Ok(Role::ALL.to_vec())
    }

    pub async fn promote_to_admin(
        &self,
        ctx: &AuthContext,
        target_id: i32,
    ) -> Result<UserResponse, ModerationError> {
        self.change_role(ctx, target_id, Role::Admin).await
    }

    pub async fn demote_from_admin(
        &self,
        ctx: &AuthContext,
        target_id: i32,
    ) -> Result<UserResponse, ModerationError> {
        self.change_role(ctx, target_id, Role::User).await
    }

    /// Active sessions of the target keep their role until the next login.
    async fn change_role(
        &self,
        ctx: &AuthContext,
        target_id: i32,
        role: Role,
    ) -> Result<UserResponse, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::ChangeRole, Some(target_id))?;
        self.require_caller(ctx).await?;

        if !self.identities.update_role(target_id, role).await? {
            return Err(ModerationError::not_found("User"));
        }
        tracing::info!(
            admin_id = ctx.caller_id(),
            target_id,
            role = %role,
            "User role changed"
        );

        self.identities
            .find_user_by_id(target_id)
            .await?
            .map(|u| u.sanitized())
            .ok_or_else(|| ModerationError::not_found("User"))
    }

    /// Delete an identity. With `cascade` its exhibits (rows and files) go
    /// first; otherwise they stay with a dangling author reference.
    pub async fn delete_user(
        &self,
        ctx: &AuthContext,
        target_id: i32,
        cascade: bool,
    ) -> Result<DeletedUser, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::DeleteUser, Some(target_id))?;
        self.require_caller(ctx).await?;

        let user = self
            .identities
            .find_user_by_id(target_id)
            .await?
            .ok_or_else(|| ModerationError::not_found("User"))?;

        let mut exhibits_removed = 0;
        if cascade {
            for exhibit in self.exhibits.list_exhibits_by_author(target_id).await? {
                self.remove_exhibit(&exhibit).await?;
                exhibits_removed += 1;
            }
        }

        if !self.identities.delete_user(target_id).await? {
            return Err(ModerationError::not_found("User"));
        }

        if user.has_custom_photo() {
            self.discard_asset(AssetKind::ProfilePhoto, &user.profile_photo_path)
                .await;
        }

        tracing::info!(
            admin_id = ctx.caller_id(),
            target_id,
            cascade,
            exhibits_removed,
            "User deleted"
        );
        Ok(DeletedUser {
            id: target_id,
            exhibits_removed,
        })
    }

    /// Store the new photo, drop the old one, then point the identity at the
    /// new file. Failing to drop the old photo aborts the whole operation.
    pub async fn update_profile_photo(
        &self,
        ctx: &AuthContext,
        upload: Upload,
    ) -> Result<UserResponse, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::UpdateProfilePhoto, ctx.caller_id())?;
        if upload.data.is_empty() {
            return Err(ModerationError::invalid("File is required"));
        }

        let user = self.require_caller(ctx).await?;
        let new_name = hashed_file_name(&user.username, &upload.file_name);
        self.store_asset(AssetKind::ProfilePhoto, &new_name, upload.data)
            .await?;

        if user.has_custom_photo() {
            let old_key = AssetKind::ProfilePhoto.key(&user.profile_photo_path);
            if let Err(e) = self.storage.delete(&old_key).await {
                self.discard_asset(AssetKind::ProfilePhoto, &new_name).await;
                return Err(ModerationError::Internal(anyhow::anyhow!(
                    "Failed to delete old photo: {}",
                    e
                )));
            }
        }

        match self.identities.update_profile_photo(user.id, &new_name).await {
            Ok(true) => {}
            Ok(false) => {
                self.discard_asset(AssetKind::ProfilePhoto, &new_name).await;
                return Err(ModerationError::unauthenticated());
            }
            Err(err) => {
                self.discard_asset(AssetKind::ProfilePhoto, &new_name).await;
                return Err(err.into());
            }
        }

        tracing::info!(user_id = user.id, "Profile photo updated");
        Ok(self.require_caller(ctx).await?.sanitized())
    }

    // ==================== Exhibits ====================

    pub async fn list_exhibit_types(
        &self,
        ctx: &AuthContext,
    ) -> Result<Vec<ExhibitType>, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::ListExhibitTypes, None)?;
        Ok(self.exhibits.list_exhibit_types().await?)
    }

    pub async fn submit_exhibit(
        &self,
        ctx: &AuthContext,
        submission: Submission,
    ) -> Result<Exhibit, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::SubmitExhibit, ctx.caller_id())?;
        let author_id = self.require_caller(ctx).await?.id;

        let title = submission.title.trim().to_string();
        if title.is_empty() {
            return Err(ModerationError::invalid("Title is required"));
        }
        let file = match submission.file {
            Some(file) if !file.data.is_empty() => file,
            _ => return Err(ModerationError::invalid("File is required")),
        };
        if self
            .exhibits
            .find_exhibit_type(submission.type_id)
            .await?
            .is_none()
        {
            return Err(ModerationError::invalid("Invalid exhibit type"));
        }

        let asset_path = hashed_file_name(&title, &file.file_name);
        self.store_asset(AssetKind::Exhibit, &asset_path, file.data)
            .await?;

        let inserted = self
            .exhibits
            .insert_exhibit(NewExhibit {
                title,
                type_id: submission.type_id,
                description: submission.description,
                asset_path: asset_path.clone(),
                author_id,
                status: ExhibitLifecycle::initial_status(),
            })
            .await;

        match inserted {
            Ok(exhibit) => {
                metrics::counter!("exhibit_submissions_total").increment(1);
                tracing::info!(exhibit_id = exhibit.id, author_id, "Exhibit submitted");
                Ok(exhibit)
            }
            Err(err) => {
                self.discard_asset(AssetKind::Exhibit, &asset_path).await;
                Err(err.into())
            }
        }
    }

    /// Invisible exhibits are reported exactly like missing ones.
    pub async fn view_exhibit(
        &self,
        ctx: &AuthContext,
        id: i32,
    ) -> Result<Exhibit, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::ViewExhibit, None)?;
        self.exhibits
            .find_exhibit(id)
            .await?
            .filter(|e| ExhibitLifecycle::is_visible(e, ctx))
            .ok_or_else(|| ModerationError::not_found("Exhibit"))
    }

    pub async fn list_exhibits(
        &self,
        ctx: &AuthContext,
        filter: &ListingFilter,
    ) -> Result<Vec<Exhibit>, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::ListExhibits, None)?;
        let requested = filter.to_query(ctx)?;
        let query = ExhibitLifecycle::constrain_query(ctx, requested);
        let exhibits = self.exhibits.list_exhibits(&query).await?;
        Ok(ExhibitLifecycle::filter_for_listing(exhibits, ctx, &query))
    }

    pub async fn list_my_exhibits(&self, ctx: &AuthContext) -> Result<Vec<Exhibit>, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::ListOwnExhibits, ctx.caller_id())?;
        let author_id = ctx.caller_id().ok_or_else(ModerationError::unauthenticated)?;
        Ok(self.exhibits.list_exhibits_by_author(author_id).await?)
    }

    pub async fn approve_exhibit(
        &self,
        ctx: &AuthContext,
        id: i32,
    ) -> Result<Exhibit, ModerationError> {
        self.moderate(ctx, id, ModerationDecision::Approve).await
    }

    pub async fn reject_exhibit(
        &self,
        ctx: &AuthContext,
        id: i32,
    ) -> Result<Exhibit, ModerationError> {
        self.moderate(ctx, id, ModerationDecision::Reject).await
    }

    async fn moderate(
        &self,
        ctx: &AuthContext,
        id: i32,
        decision: ModerationDecision,
    ) -> Result<Exhibit, ModerationError> {
        AuthorizationPolicy::authorize(ctx, Action::ModerateExhibit, None)?;
        self.require_caller(ctx).await?;

        let exhibit = self
            .exhibits
            .find_exhibit(id)
            .await?
            .ok_or_else(|| ModerationError::not_found("Exhibit"))?;

        let transition = self
            .lifecycle
            .transition(exhibit.status, decision)
            .map_err(|e| ModerationError::Conflict(e.to_string()))?;

        if transition.is_noop() {
            metrics::counter!(
                "exhibit_moderation_total",
                "decision" => decision.as_str(),
                "outcome" => "unchanged"
            )
            .increment(1);
            return Ok(exhibit);
        }

        let applied = self
            .exhibits
            .transition_status(id, transition.from, transition.to)
            .await?;
        if !applied {
            return Err(match self.exhibits.find_exhibit(id).await? {
                None => ModerationError::not_found("Exhibit"),
                Some(_) => ModerationError::Conflict(
                    "Exhibit was moderated concurrently, retry".to_string(),
                ),
            });
        }

        metrics::counter!(
            "exhibit_moderation_total",
            "decision" => decision.as_str(),
            "outcome" => "applied"
        )
        .increment(1);
        tracing::info!(
            exhibit_id = id,
            admin_id = ctx.caller_id(),
            from = %transition.from,
            to = %transition.to,
            "Exhibit moderated"
        );

        self.exhibits
            .find_exhibit(id)
            .await?
            .ok_or_else(|| ModerationError::not_found("Exhibit"))
    }

    /// Remove the asset first; the row is only deleted once the file is
    /// gone.
    pub async fn delete_exhibit(&self, ctx: &AuthContext, id: i32) -> Result<(), ModerationError> {
        if !ctx.is_authenticated() {
            AuthorizationPolicy::authorize(ctx, Action::DeleteExhibit, None)?;
        }

        let exhibit = self
            .exhibits
            .find_exhibit(id)
            .await?
            .ok_or_else(|| ModerationError::not_found("Exhibit"))?;

        AuthorizationPolicy::authorize(ctx, Action::DeleteExhibit, Some(exhibit.author_id))?;
        self.require_caller(ctx).await?;
        self.remove_exhibit(&exhibit).await?;

        tracing::info!(exhibit_id = id, caller_id = ctx.caller_id(), "Exhibit deleted");
        Ok(())
    }

    // ==================== Helpers ====================

    /// The caller's stored identity. A session outliving its identity is
    /// unauthenticated.
    async fn require_caller(&self, ctx: &AuthContext) -> Result<User, ModerationError> {
        let id = ctx.caller_id().ok_or_else(ModerationError::unauthenticated)?;
        self.identities
            .find_user_by_id(id)
            .await?
            .ok_or_else(ModerationError::unauthenticated)
    }

    async fn remove_exhibit(&self, exhibit: &Exhibit) -> Result<(), ModerationError> {
        let key = AssetKind::Exhibit.key(&exhibit.asset_path);
        self.storage.delete(&key).await.map_err(|e| {
            ModerationError::Internal(anyhow::anyhow!(
                "Failed to delete exhibit file {}: {}",
                key,
                e
            ))
        })?;

        if !self.exhibits.delete_exhibit(exhibit.id).await? {
            return Err(ModerationError::not_found("Exhibit"));
        }
        Ok(())
    }

    async fn store_asset(
        &self,
        kind: AssetKind,
        name: &str,
        data: Vec<u8>,
    ) -> Result<(), ModerationError> {
        self.storage
            .upload(&kind.key(name), data)
            .await
            .map_err(|e| ModerationError::Internal(anyhow::anyhow!("Failed to save file: {}", e)))
    }

    /// Best-effort cleanup of a file that is no longer referenced.
    async fn discard_asset(&self, kind: AssetKind, name: &str) {
        let key = kind.key(name);
        if let Err(e) = self.storage.delete(&key).await {
            tracing::warn!(key = %key, error = %e, "Failed to remove unreferenced asset");
        }
    }
}
