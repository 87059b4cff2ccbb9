// ── Project domain type ──

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity_id::EntityId;
use super::kinds::EntityKind;
use super::{ChangeSet, Entity, Named, Reference};
use crate::diff::{self, Diff};
use crate::validate::{self, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: EntityId,
    pub name: String,
    pub workspace_id: EntityId,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    pub metadata: BTreeMap<String, Value>,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub name: String,
    pub workspace_id: EntityId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub metadata: Option<BTreeMap<String, Value>>,
}

impl ChangeSet for ProjectPatch {
    fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("name", self.name.is_some()),
            ("description", self.description.is_some()),
            ("tags", self.tags.is_some()),
            ("metadata", self.metadata.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }
}

impl Entity for Project {
    const KIND: EntityKind = EntityKind::Project;
    type Spec = ProjectSpec;
    type Patch = ProjectPatch;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(spec: &ProjectSpec) -> Result<(), ValidationError> {
        validate::project(spec)
    }

    fn diff(current: &Self, desired: &ProjectSpec) -> Diff<ProjectPatch> {
        diff::project(current, desired)
    }

    fn references(spec: &ProjectSpec) -> Vec<Reference> {
        vec![Reference::Workspace(spec.workspace_id.clone())]
    }
}

impl Named for Project {
    fn name(&self) -> &str {
        &self.name
    }
}
