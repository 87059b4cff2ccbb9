// ── Core error types ──
//
// What reconciler callers see. Store failures arrive already classified
// (`StoreError`) and are split into transient and permanent here; the
// not-found drift path never becomes an error.

use std::fmt;

use thiserror::Error;

use crate::drift::{self, DriftClass};
use crate::model::{EntityId, EntityKind, EntityRef};
use crate::reconcile::PassState;
use crate::store::{StoreError, Verb};
use crate::validate::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOp {
    Add,
    Remove,
}

/// One team membership call that did not go through.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipFailure {
    pub user: EntityId,
    pub op: MembershipOp,
    pub error: StoreError,
}

impl fmt::Display for MembershipFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.op {
            MembershipOp::Add => "add",
            MembershipOp::Remove => "remove",
        };
        write!(f, "{verb} user {}: {}", self.user, self.error)
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Local, pre-network ───────────────────────────────────────────
    #[error("{entity}: invalid {}: {source}", .source.field())]
    Validation {
        entity: EntityRef,
        source: ValidationError,
    },

    #[error("{entity} references {reference}, which does not exist")]
    UnresolvedReference {
        entity: EntityRef,
        reference: EntityRef,
    },

    #[error("{entity} must be replaced: immutable field(s) changed: {}", .fields.join(", "))]
    ImmutableFieldChanged {
        entity: EntityRef,
        fields: Vec<&'static str>,
    },

    // ── Remote failures ──────────────────────────────────────────────
    #[error("{entity}: {source} (transient, the pass may be retried)")]
    Transient {
        entity: EntityRef,
        source: StoreError,
    },

    #[error("{entity}: {source}")]
    Permanent {
        entity: EntityRef,
        source: StoreError,
    },

    // ── Name lookups ─────────────────────────────────────────────────
    #[error("no {kind} named '{name}'")]
    NotFound { kind: EntityKind, name: String },

    #[error("{count} {kind} records are named '{name}'")]
    Ambiguous {
        kind: EntityKind,
        name: String,
        count: usize,
    },

    // ── Partial convergence ──────────────────────────────────────────
    #[error(
        "{team}: {} membership change(s) failed: {}",
        .failures.len(),
        .failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    PartialMembership {
        team: EntityRef,
        failures: Vec<MembershipFailure>,
    },

    // ── Internal bookkeeping ─────────────────────────────────────────
    #[error("{entity}: cannot {action} from state {from}")]
    InvalidTransition {
        entity: EntityRef,
        from: PassState,
        action: &'static str,
    },

    #[error("{entity}: more than one {verb} call in a single pass")]
    CallBudgetExceeded { entity: EntityRef, verb: Verb },

    // ── Connection / configuration ───────────────────────────────────
    #[error("Cannot connect to server at {url}: {source}")]
    ConnectionFailed { url: String, source: StoreError },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Wrap a store failure for `entity`, keeping its drift class.
    ///
    /// A `NotFound` that reaches this point was not on a drift path
    /// (e.g. an update target vanished mid-call) and is permanent.
    pub fn from_store(entity: EntityRef, source: StoreError) -> Self {
        match drift::classify(&source) {
            DriftClass::TransientFailure => Self::Transient { entity, source },
            DriftClass::NotFound | DriftClass::PermanentFailure => {
                Self::Permanent { entity, source }
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient { .. } => true,
            Self::ConnectionFailed { source, .. } => {
                drift::classify(source) == DriftClass::TransientFailure
            }
            _ => false,
        }
    }

    /// The entity the failure is about, when there is one.
    pub fn entity(&self) -> Option<&EntityRef> {
        match self {
            Self::Validation { entity, .. }
            | Self::UnresolvedReference { entity, .. }
            | Self::ImmutableFieldChanged { entity, .. }
            | Self::Transient { entity, .. }
            | Self::Permanent { entity, .. }
            | Self::InvalidTransition { entity, .. }
            | Self::CallBudgetExceeded { entity, .. } => Some(entity),
            Self::PartialMembership { team, .. } => Some(team),
            Self::NotFound { .. }
            | Self::Ambiguous { .. }
            | Self::ConnectionFailed { .. }
            | Self::Config { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_ref() -> EntityRef {
        EntityRef::known(EntityKind::Stack, EntityId::from("s1"))
    }

    #[test]
    fn store_errors_keep_their_class() {
        assert!(CoreError::from_store(stack_ref(), StoreError::Timeout).is_transient());
        let conflict = StoreError::Rejected {
            status: Some(409),
            message: "exists".into(),
        };
        assert!(!CoreError::from_store(stack_ref(), conflict).is_transient());
    }

    #[test]
    fn validation_message_names_field() {
        let err = CoreError::Validation {
            entity: EntityRef::new(EntityKind::RoleAssignment, None),
            source: ValidationError::MutualExclusion {
                first: "user_id",
                second: "team_id",
                both_set: true,
            },
        };
        let message = err.to_string();
        assert!(message.starts_with("role_assignment (not yet created): invalid user_id"));
        assert!(message.contains("team_id"));
    }

    #[test]
    fn partial_membership_lists_each_failure() {
        let err = CoreError::PartialMembership {
            team: EntityRef::known(EntityKind::Team, EntityId::from("t1")),
            failures: vec![MembershipFailure {
                user: EntityId::from("u9"),
                op: MembershipOp::Add,
                error: StoreError::Timeout,
            }],
        };
        let message = err.to_string();
        assert!(message.contains("1 membership change(s) failed"));
        assert!(message.contains("add user u9"));
    }
}
