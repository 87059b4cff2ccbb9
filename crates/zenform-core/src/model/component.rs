// ── Stack component domain type ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity_id::EntityId;
use super::kinds::{ComponentType, EntityKind};
use super::{ChangeSet, Entity, Named, Reference};
use crate::diff::{self, Diff};
use crate::validate::{self, ValidationError};

/// A single pluggable piece of a stack (artifact store, orchestrator, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackComponent {
    pub id: EntityId,
    pub name: String,
    pub component_type: ComponentType,
    pub flavor: String,
    pub configuration: BTreeMap<String, Value>,
    pub connector: Option<EntityId>,
    pub connector_resource_id: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub created: Option<DateTime<Utc>>,
}

/// Desired state for a stack component.
///
/// `component_type` stays a plain string here: an unknown type is a
/// validation failure, not a parse failure of the whole manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub flavor: String,
    #[serde(default)]
    pub configuration: BTreeMap<String, Value>,
    #[serde(default)]
    pub connector: Option<EntityId>,
    #[serde(default)]
    pub connector_resource_id: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentPatch {
    pub name: Option<String>,
    pub configuration: Option<BTreeMap<String, Value>>,
    /// `Some(None)` detaches the connector.
    pub connector: Option<Option<EntityId>>,
    pub connector_resource_id: Option<Option<String>>,
    pub labels: Option<BTreeMap<String, String>>,
}

impl ChangeSet for ComponentPatch {
    fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("name", self.name.is_some()),
            ("configuration", self.configuration.is_some()),
            ("connector", self.connector.is_some()),
            ("connector_resource_id", self.connector_resource_id.is_some()),
            ("labels", self.labels.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }
}

impl Entity for StackComponent {
    const KIND: EntityKind = EntityKind::StackComponent;
    type Spec = ComponentSpec;
    type Patch = ComponentPatch;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(spec: &ComponentSpec) -> Result<(), ValidationError> {
        validate::component(spec)
    }

    fn diff(current: &Self, desired: &ComponentSpec) -> Diff<ComponentPatch> {
        diff::component(current, desired)
    }

    fn references(spec: &ComponentSpec) -> Vec<Reference> {
        spec.connector
            .iter()
            .map(|id| Reference::Connector(id.clone()))
            .collect()
    }
}

impl Named for StackComponent {
    fn name(&self) -> &str {
        &self.name
    }
}
