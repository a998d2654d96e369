//! crates/critique_core/src/policy.rs
//!
//! The authorization policy as one pure decision function, evaluated by the
//! web layer after authentication. Keeping it free of HTTP types makes the
//! role/ownership rules testable on their own.

use crate::domain::User;
use uuid::Uuid;

/// What the actor is trying to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn is_read(&self) -> bool {
        matches!(self, Action::List | Action::Retrieve)
    }
}

/// The resource group the action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Categories, genres and titles.
    Catalog,
    /// A review or comment owned by `author_id`.
    Authored { author_id: Uuid },
    /// Arbitrary user accounts (the admin-only surface).
    Accounts,
    /// The caller's own profile.
    OwnProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Maps (actor, action, resource) to a decision.
///
/// `actor` is `None` for unauthenticated requests. The caller distinguishes
/// 401 from 403 by whether an actor was present at all.
pub fn decide(actor: Option<&User>, action: Action, resource: Resource) -> Decision {
    match resource {
        Resource::Catalog => {
            if action.is_read() {
                return Decision::Allow;
            }
            match actor {
                Some(user) if user.is_admin() => Decision::Allow,
                _ => Decision::Deny,
            }
        }
        Resource::Authored { author_id } => {
            if action.is_read() {
                return Decision::Allow;
            }
            match (action, actor) {
                (Action::Create, Some(_)) => Decision::Allow,
                (Action::Update | Action::Delete, Some(user))
                    if user.id == author_id || user.is_moderator() || user.is_admin() =>
                {
                    Decision::Allow
                }
                _ => Decision::Deny,
            }
        }
        Resource::Accounts => match actor {
            Some(user) if user.is_admin() => Decision::Allow,
            _ => Decision::Deny,
        },
        Resource::OwnProfile => match actor {
            Some(_) => Decision::Allow,
            None => Decision::Deny,
        },
    }
}
