//! Exhibit moderation state machine and the visibility rules that follow
//! from status and caller identity.

use crate::models::{Exhibit, ExhibitQuery, ExhibitStatus};
use crate::services::session::AuthContext;

/// How re-moderation of an already decided exhibit is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any decision may overwrite any status; the last write wins.
    #[default]
    Permissive,
    /// Only Pending exhibits may be decided.
    Strict,
}

impl TransitionPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            TransitionPolicy::Strict
        } else {
            TransitionPolicy::Permissive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationDecision {
    Approve,
    Reject,
}

impl ModerationDecision {
    pub fn target(self) -> ExhibitStatus {
        match self {
            ModerationDecision::Approve => ExhibitStatus::Approved,
            ModerationDecision::Reject => ExhibitStatus::Rejected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModerationDecision::Approve => "approve",
            ModerationDecision::Reject => "reject",
        }
    }
}

/// A validated status change. `from == to` means nothing needs writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ExhibitStatus,
    pub to: ExhibitStatus,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    InvalidTransition {
        from: ExhibitStatus,
        to: ExhibitStatus,
    },
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleError::InvalidTransition { from, to } => {
                write!(f, "Exhibit cannot move from {} to {}", from, to)
            }
        }
    }
}

impl std::error::Error for LifecycleError {}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExhibitLifecycle {
    policy: TransitionPolicy,
}

impl ExhibitLifecycle {
    pub fn new(policy: TransitionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Status every new exhibit starts in.
    pub fn initial_status() -> ExhibitStatus {
        ExhibitStatus::Pending
    }

    pub fn transition(
        &self,
        current: ExhibitStatus,
        decision: ModerationDecision,
    ) -> Result<Transition, LifecycleError> {
        let to = decision.target();
        let transition = Transition { from: current, to };

        if transition.is_noop() {
            return Ok(transition);
        }

        match (self.policy, current) {
            (TransitionPolicy::Permissive, _) | (TransitionPolicy::Strict, ExhibitStatus::Pending) => {
                Ok(transition)
            }
            (TransitionPolicy::Strict, from) => Err(LifecycleError::InvalidTransition { from, to }),
        }
    }

    pub fn approve(&self, current: ExhibitStatus) -> Result<Transition, LifecycleError> {
        self.transition(current, ModerationDecision::Approve)
    }

    pub fn reject(&self, current: ExhibitStatus) -> Result<Transition, LifecycleError> {
        self.transition(current, ModerationDecision::Reject)
    }

    /// Approved exhibits are public. Anything else is visible to admins and
    /// to its author only.
    pub fn is_visible(exhibit: &Exhibit, ctx: &AuthContext) -> bool {
        match exhibit.status {
            ExhibitStatus::Approved => true,
            ExhibitStatus::Pending | ExhibitStatus::Rejected => {
                ctx.is_admin() || exhibit.is_authored_by(ctx.caller_id())
            }
        }
    }

    /// Narrow a requested listing query to what the caller may see.
    /// Non-admins are pinned to Approved whatever they asked for.
    pub fn constrain_query(ctx: &AuthContext, mut query: ExhibitQuery) -> ExhibitQuery {
        if !ctx.is_admin() {
            query.status = Some(ExhibitStatus::Approved);
        }
        query
    }

    /// Apply the listing rules to an already fetched set, preserving order.
    pub fn filter_for_listing(
        exhibits: Vec<Exhibit>,
        ctx: &AuthContext,
        requested: &ExhibitQuery,
    ) -> Vec<Exhibit> {
        let query = Self::constrain_query(ctx, requested.clone());
        exhibits.into_iter().filter(|e| query.matches(e)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn exhibit(id: i32, author_id: i32, status: ExhibitStatus) -> Exhibit {
        Exhibit {
            id,
            title: format!("exhibit {}", id),
            type_id: 1,
            type_name: Some("Photo".to_string()),
            description: String::new(),
            asset_path: format!("{}.png", id),
            author_id,
            author_username: Some(format!("user{}", author_id)),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn contexts() -> Vec<AuthContext> {
        vec![
            AuthContext::anonymous(),
            AuthContext::user(2),
            AuthContext::user(3),
            AuthContext::admin(4),
        ]
    }

    #[test]
    fn new_exhibits_start_pending() {
        assert_eq!(ExhibitLifecycle::initial_status(), ExhibitStatus::Pending);
    }

    #[test]
    fn approved_is_visible_to_everyone() {
        let approved = exhibit(1, 2, ExhibitStatus::Approved);
        for ctx in contexts() {
            assert!(ExhibitLifecycle::is_visible(&approved, &ctx));
        }
    }

    #[test]
    fn undecided_visible_only_to_admin_or_author() {
        for status in [ExhibitStatus::Pending, ExhibitStatus::Rejected] {
            let e = exhibit(1, 2, status);
            for ctx in contexts() {
                let expected = ctx.is_admin() || ctx.caller_id() == Some(2);
                assert_eq!(ExhibitLifecycle::is_visible(&e, &ctx), expected, "{:?}", ctx);
            }
        }
    }

    #[test]
    fn non_admin_listing_never_leaks_unapproved() {
        let all = vec![
            exhibit(1, 2, ExhibitStatus::Pending),
            exhibit(2, 2, ExhibitStatus::Approved),
            exhibit(3, 3, ExhibitStatus::Rejected),
            exhibit(4, 3, ExhibitStatus::Approved),
        ];
        for status in [None, Some(ExhibitStatus::Pending), Some(ExhibitStatus::Rejected)] {
            let requested = ExhibitQuery {
                status,
                ..Default::default()
            };
            for ctx in contexts().into_iter().filter(|c| !c.is_admin()) {
                let listed = ExhibitLifecycle::filter_for_listing(all.clone(), &ctx, &requested);
                let ids: Vec<i32> = listed.iter().map(|e| e.id).collect();
                assert_eq!(ids, vec![2, 4]);
            }
        }
    }

    #[test]
    fn admin_listing_honours_requested_status() {
        let all = vec![
            exhibit(1, 2, ExhibitStatus::Pending),
            exhibit(2, 2, ExhibitStatus::Approved),
            exhibit(3, 3, ExhibitStatus::Pending),
        ];
        let admin = AuthContext::admin(4);

        let pending = ExhibitQuery {
            status: Some(ExhibitStatus::Pending),
            ..Default::default()
        };
        let ids: Vec<i32> = ExhibitLifecycle::filter_for_listing(all.clone(), &admin, &pending)
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);

        let everything =
            ExhibitLifecycle::filter_for_listing(all, &admin, &ExhibitQuery::default());
        assert_eq!(everything.len(), 3);
    }

    #[test]
    fn permissive_policy_allows_overwrite() {
        let lifecycle = ExhibitLifecycle::new(TransitionPolicy::Permissive);
        let t = lifecycle.reject(ExhibitStatus::Approved).unwrap();
        assert_eq!(t.from, ExhibitStatus::Approved);
        assert_eq!(t.to, ExhibitStatus::Rejected);
        assert!(!t.is_noop());
    }

    #[test]
    fn strict_policy_only_decides_pending() {
        let lifecycle = ExhibitLifecycle::new(TransitionPolicy::Strict);
        assert!(lifecycle.approve(ExhibitStatus::Pending).is_ok());
        assert!(lifecycle.reject(ExhibitStatus::Pending).is_ok());
        assert_eq!(
            lifecycle.approve(ExhibitStatus::Rejected),
            Err(LifecycleError::InvalidTransition {
                from: ExhibitStatus::Rejected,
                to: ExhibitStatus::Approved,
            })
        );
    }

    #[test]
    fn same_status_is_noop_under_both_policies() {
        for policy in [TransitionPolicy::Permissive, TransitionPolicy::Strict] {
            let t = ExhibitLifecycle::new(policy)
                .approve(ExhibitStatus::Approved)
                .unwrap();
            assert!(t.is_noop());
        }
    }
}
