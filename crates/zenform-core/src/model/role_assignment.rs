// ── Role assignment domain type ──

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entity_id::EntityId;
use super::kinds::{EntityKind, ResourceKind, SubjectKind};
use super::{ChangeSet, Entity, Reference};
use crate::diff::{self, Diff};
use crate::validate::{self, ValidationError};

/// Who a role is granted to. Exactly one side is ever bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Subject {
    User(EntityId),
    Team(EntityId),
}

impl Subject {
    pub fn kind(&self) -> SubjectKind {
        match self {
            Self::User(_) => SubjectKind::User,
            Self::Team(_) => SubjectKind::Team,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            Self::User(id) | Self::Team(id) => id,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: EntityId,
    pub resource_id: EntityId,
    pub resource_type: ResourceKind,
    pub subject: Subject,
    pub role: String,
}

/// Operator-facing shape: the two subject fields are kept apart so the
/// exclusivity rule can report exactly what was declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignmentSpec {
    pub resource_id: EntityId,
    pub resource_type: String,
    #[serde(default)]
    pub user_id: Option<EntityId>,
    #[serde(default)]
    pub team_id: Option<EntityId>,
    pub role: String,
}

impl RoleAssignmentSpec {
    /// The bound subject, if exactly one side is set.
    pub fn subject(&self) -> Option<Subject> {
        match (&self.user_id, &self.team_id) {
            (Some(user), None) => Some(Subject::User(user.clone())),
            (None, Some(team)) => Some(Subject::Team(team.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleAssignmentPatch {
    pub role: Option<String>,
}

impl ChangeSet for RoleAssignmentPatch {
    fn changed_fields(&self) -> Vec<&'static str> {
        if self.role.is_some() { vec!["role"] } else { Vec::new() }
    }
}

impl Entity for RoleAssignment {
    const KIND: EntityKind = EntityKind::RoleAssignment;
    type Spec = RoleAssignmentSpec;
    type Patch = RoleAssignmentPatch;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(spec: &RoleAssignmentSpec) -> Result<(), ValidationError> {
        validate::role_assignment(spec)
    }

    fn diff(current: &Self, desired: &RoleAssignmentSpec) -> Diff<RoleAssignmentPatch> {
        diff::role_assignment(current, desired)
    }

    fn references(spec: &RoleAssignmentSpec) -> Vec<Reference> {
        let mut refs = Vec::with_capacity(2);
        if let Ok(kind) = spec.resource_type.parse::<ResourceKind>() {
            let id = spec.resource_id.clone();
            refs.push(match kind {
                ResourceKind::Project => Reference::Project(id),
                ResourceKind::Stack => Reference::Stack(id),
                ResourceKind::Workspace => Reference::Workspace(id),
            });
        }
        match spec.subject() {
            Some(Subject::User(id)) => refs.push(Reference::User(id)),
            Some(Subject::Team(id)) => refs.push(Reference::Team(id)),
            None => {}
        }
        refs
    }
}
