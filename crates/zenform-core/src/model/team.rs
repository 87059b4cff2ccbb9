// ── Team domain type ──

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::entity_id::EntityId;
use super::kinds::EntityKind;
use super::{ChangeSet, Entity, Named, Reference};
use crate::diff::{self, Diff};
use crate::validate::{self, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub members: BTreeSet<EntityId>,
    /// Always `members.len()` for a record returned by a reconciler.
    pub member_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub members: BTreeSet<EntityId>,
}

/// Field changes only. Membership goes through [`MembershipPlan`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ChangeSet for TeamPatch {
    fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        fields
    }
}

/// Membership calls needed to move a team to its desired member set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipPlan {
    pub add: Vec<EntityId>,
    pub remove: Vec<EntityId>,
}

impl MembershipPlan {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    pub fn len(&self) -> usize {
        self.add.len() + self.remove.len()
    }
}

impl Entity for Team {
    const KIND: EntityKind = EntityKind::Team;
    type Spec = TeamSpec;
    type Patch = TeamPatch;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(spec: &TeamSpec) -> Result<(), ValidationError> {
        validate::team(spec)
    }

    fn diff(current: &Self, desired: &TeamSpec) -> Diff<TeamPatch> {
        diff::team(current, desired)
    }

    fn references(spec: &TeamSpec) -> Vec<Reference> {
        spec.members.iter().cloned().map(Reference::User).collect()
    }

    fn membership_plan(current: &Self, desired: &TeamSpec) -> MembershipPlan {
        diff::membership(&current.members, &desired.members)
    }
}

impl Named for Team {
    fn name(&self) -> &str {
        &self.name
    }
}
