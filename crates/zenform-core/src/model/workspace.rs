// ── Workspace domain type ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity_id::EntityId;
use super::kinds::EntityKind;
use super::{ChangeSet, Entity, Named};
use crate::diff::{self, Diff};
use crate::validate::{self, ValidationError};

/// Provisioning state of the server behind a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WorkspaceStatus {
    Pending,
    Creating,
    Available,
    Failed,
    Deactivated,
    Deleted,
}

/// A tenant workspace; owns projects and stacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: EntityId,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub is_managed: bool,
    pub status: WorkspaceStatus,
    /// Only populated once the underlying server is provisioned.
    pub server_url: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

impl Workspace {
    /// The server URL, if the workspace has finished provisioning.
    pub fn server_url(&self) -> Option<&str> {
        match self.status {
            WorkspaceStatus::Available => self.server_url.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSpec {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_managed")]
    pub is_managed: bool,
}

fn default_managed() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspacePatch {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

impl ChangeSet for WorkspacePatch {
    fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.display_name.is_some() {
            fields.push("display_name");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        fields
    }
}

impl Entity for Workspace {
    const KIND: EntityKind = EntityKind::Workspace;
    type Spec = WorkspaceSpec;
    type Patch = WorkspacePatch;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(spec: &WorkspaceSpec) -> Result<(), ValidationError> {
        validate::workspace(spec)
    }

    fn diff(current: &Self, desired: &WorkspaceSpec) -> Diff<WorkspacePatch> {
        diff::workspace(current, desired)
    }

    fn is_gone(&self) -> bool {
        self.status == WorkspaceStatus::Deleted
    }
}

impl Named for Workspace {
    fn name(&self) -> &str {
        &self.name
    }
}
