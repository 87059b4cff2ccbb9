// ── Stack domain type ──

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity_id::EntityId;
use super::kinds::{ComponentType, EntityKind};
use super::{ChangeSet, Entity, Named, Reference};
use crate::diff::{self, Diff};
use crate::validate::{self, ValidationError};

/// A named set of components, at most one per component type as far as
/// the operator is concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub id: EntityId,
    pub name: String,
    /// The server may hold several ids per slot; every one is kept so a
    /// diff against the single-id desired view sees the extras.
    pub components: BTreeMap<ComponentType, Vec<EntityId>>,
    pub labels: BTreeMap<String, String>,
    pub created: Option<DateTime<Utc>>,
}

impl Stack {
    /// The component filling `slot`, in the single-instance view.
    pub fn component(&self, slot: ComponentType) -> Option<&EntityId> {
        self.components.get(&slot).and_then(|ids| ids.first())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSpec {
    pub name: String,
    /// Component type (as written by the operator) → component id.
    #[serde(default)]
    pub components: BTreeMap<String, EntityId>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl StackSpec {
    /// Slots that parse as known component types. Validation rejects
    /// the rest before this is ever relied on.
    pub fn typed_components(&self) -> BTreeMap<ComponentType, EntityId> {
        self.components
            .iter()
            .filter_map(|(slot, id)| {
                ComponentType::from_str(slot)
                    .ok()
                    .map(|t| (t, id.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackPatch {
    pub name: Option<String>,
    pub components: Option<BTreeMap<ComponentType, EntityId>>,
    pub labels: Option<BTreeMap<String, String>>,
}

impl ChangeSet for StackPatch {
    fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("name", self.name.is_some()),
            ("components", self.components.is_some()),
            ("labels", self.labels.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }
}

impl Entity for Stack {
    const KIND: EntityKind = EntityKind::Stack;
    type Spec = StackSpec;
    type Patch = StackPatch;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(spec: &StackSpec) -> Result<(), ValidationError> {
        validate::stack(spec)
    }

    fn diff(current: &Self, desired: &StackSpec) -> Diff<StackPatch> {
        diff::stack(current, desired)
    }

    fn references(spec: &StackSpec) -> Vec<Reference> {
        spec.typed_components()
            .into_iter()
            .map(|(slot, id)| Reference::Component {
                id,
                slot: Some(slot),
            })
            .collect()
    }
}

impl Named for Stack {
    fn name(&self) -> &str {
        &self.name
    }
}
