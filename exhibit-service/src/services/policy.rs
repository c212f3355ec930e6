//! Authorization policy.
//!
//! Pure decision function from (caller, action, resource owner) to
//! allow/deny. Nothing here touches a store.

use crate::models::BOOTSTRAP_ADMIN_ID;
use crate::services::error::ModerationError;
use crate::services::session::AuthContext;

/// Operations subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ViewExhibit,
    ListExhibits,
    ListExhibitTypes,
    ViewUser,
    SubmitExhibit,
    ListOwnExhibits,
    ViewOwnProfile,
    UpdateProfilePhoto,
    Logout,
    DeleteExhibit,
    ModerateExhibit,
    ListUsers,
    ListRoles,
    ChangeRole,
    DeleteUser,
}

impl Action {
    pub fn requires_authentication(self) -> bool {
        !matches!(
            self,
            Action::ViewExhibit | Action::ListExhibits | Action::ListExhibitTypes | Action::ViewUser
        )
    }

    pub fn requires_admin(self) -> bool {
        matches!(
            self,
            Action::ModerateExhibit
                | Action::ListUsers
                | Action::ListRoles
                | Action::ChangeRole
                | Action::DeleteUser
        )
    }

    /// Owner-scoped actions are allowed for the resource owner or an admin.
    pub fn is_owner_scoped(self) -> bool {
        matches!(self, Action::DeleteExhibit | Action::UpdateProfilePhoto)
    }

    /// Actions that may never target the bootstrap administrator.
    pub fn protects_bootstrap_admin(self) -> bool {
        matches!(self, Action::ChangeRole | Action::DeleteUser)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::ViewExhibit => "view_exhibit",
            Action::ListExhibits => "list_exhibits",
            Action::ListExhibitTypes => "list_exhibit_types",
            Action::ViewUser => "view_user",
            Action::SubmitExhibit => "submit_exhibit",
            Action::ListOwnExhibits => "list_own_exhibits",
            Action::ViewOwnProfile => "view_own_profile",
            Action::UpdateProfilePhoto => "update_profile_photo",
            Action::Logout => "logout",
            Action::DeleteExhibit => "delete_exhibit",
            Action::ModerateExhibit => "moderate_exhibit",
            Action::ListUsers => "list_users",
            Action::ListRoles => "list_roles",
            Action::ChangeRole => "change_role",
            Action::DeleteUser => "delete_user",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    Forbidden,
    ProtectedIdentity,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::Forbidden => "forbidden",
            DenyReason::ProtectedIdentity => "protected_identity",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::Unauthenticated => write!(f, "Authentication required"),
            DenyReason::Forbidden => write!(f, "Forbidden"),
            DenyReason::ProtectedIdentity => {
                write!(f, "The bootstrap administrator cannot be modified")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Turn a denial into the matching error and count it.
    pub fn enforce(self, action: Action) -> Result<(), ModerationError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                metrics::counter!(
                    "authorization_denied_total",
                    "reason" => reason.as_str(),
                    "action" => action.as_str()
                )
                .increment(1);
                tracing::warn!(
                    action = action.as_str(),
                    reason = reason.as_str(),
                    "Access denied"
                );
                Err(match reason {
                    DenyReason::Unauthenticated => {
                        ModerationError::Unauthenticated(reason.to_string())
                    }
                    DenyReason::Forbidden | DenyReason::ProtectedIdentity => {
                        ModerationError::Forbidden(reason.to_string())
                    }
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationPolicy;

impl AuthorizationPolicy {
    /// Decide whether `ctx` may perform `action`.
    ///
    /// `resource_owner_id` is the owner of the target for owner-scoped
    /// actions and the target identity for role changes and deletions.
    /// Rules apply in order: authentication, bootstrap protection, admin
    /// requirement, ownership. An owner-scoped action with no known owner is
    /// only open to admins.
    pub fn decide(ctx: &AuthContext, action: Action, resource_owner_id: Option<i32>) -> Decision {
        if action.requires_authentication() && !ctx.is_authenticated() {
            return Decision::Deny(DenyReason::Unauthenticated);
        }

        if action.protects_bootstrap_admin() && resource_owner_id == Some(BOOTSTRAP_ADMIN_ID) {
            return Decision::Deny(DenyReason::ProtectedIdentity);
        }

        if action.requires_admin() && !ctx.is_admin() {
            return Decision::Deny(DenyReason::Forbidden);
        }

        if action.is_owner_scoped() && !ctx.is_admin() {
            let is_owner = resource_owner_id.is_some() && ctx.caller_id() == resource_owner_id;
            if !is_owner {
                return Decision::Deny(DenyReason::Forbidden);
            }
        }

        Decision::Allow
    }

    pub fn authorize(
        ctx: &AuthContext,
        action: Action,
        resource_owner_id: Option<i32>,
    ) -> Result<(), ModerationError> {
        Self::decide(ctx, action, resource_owner_id).enforce(action)
    }
}
