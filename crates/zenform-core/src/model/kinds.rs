// ── Canonical enumerations ──
//
// Closed vocabularies shared by validation, diffing and the wire layer.
// String forms match what the server uses on the wire.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use super::entity_id::EntityId;

/// Every kind of remote record the engine knows how to talk about.
///
/// `User` only ever appears as a reference target; users are not
/// reconciled.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Workspace,
    Project,
    Stack,
    StackComponent,
    ServiceConnector,
    Team,
    RoleAssignment,
    User,
}

/// The slot a stack component fills inside a stack.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComponentType {
    Alerter,
    Annotator,
    ArtifactStore,
    ContainerRegistry,
    DataValidator,
    ExperimentTracker,
    FeatureStore,
    ImageBuilder,
    ModelDeployer,
    ModelRegistry,
    Orchestrator,
    StepOperator,
}

/// Cloud / platform family a service connector authenticates against.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectorType {
    Aws,
    Gcp,
    Azure,
    Kubernetes,
    Docker,
    Hyperai,
}

/// Kind of resource a role assignment grants access to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    Project,
    Stack,
    Workspace,
}

impl ResourceKind {
    /// The entity kind a resource id of this type points at.
    pub fn entity_kind(self) -> EntityKind {
        match self {
            Self::Project => EntityKind::Project,
            Self::Stack => EntityKind::Stack,
            Self::Workspace => EntityKind::Workspace,
        }
    }
}

/// Which side of the user/team pair a role assignment binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubjectKind {
    User,
    Team,
}

/// An entity kind paired with its identifier, when one is known yet.
///
/// Carried by every error so messages can name exactly what failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Option<EntityId>,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Option<EntityId>) -> Self {
        Self { kind, id }
    }

    pub fn known(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id: Some(id) }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} {id}", self.kind),
            None => write!(f, "{} (not yet created)", self.kind),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn component_type_uses_snake_case() {
        assert_eq!(ComponentType::ArtifactStore.as_ref(), "artifact_store");
        assert_eq!(
            ComponentType::from_str("container_registry").unwrap(),
            ComponentType::ContainerRegistry
        );
        assert!(ComponentType::from_str("artifact-store").is_err());
    }

    #[test]
    fn connector_type_is_lowercase() {
        assert_eq!(ConnectorType::from_str("aws").unwrap(), ConnectorType::Aws);
        assert_eq!(ConnectorType::Kubernetes.to_string(), "kubernetes");
    }

    #[test]
    fn entity_ref_display() {
        let r = EntityRef::known(EntityKind::StackComponent, EntityId::from("c1"));
        assert_eq!(r.to_string(), "stack_component c1");
        let r = EntityRef::new(EntityKind::Stack, None);
        assert_eq!(r.to_string(), "stack (not yet created)");
    }
}
