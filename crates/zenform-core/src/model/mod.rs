// ── Domain model ──
//
// Canonical remote records, the desired-state records operators declare,
// and the per-type change sets that drive update calls.

pub mod component;
pub mod connector;
pub mod entity_id;
pub mod kinds;
pub mod project;
pub mod role_assignment;
pub mod stack;
pub mod team;
pub mod user;
pub mod workspace;

use std::fmt;

pub use component::{ComponentPatch, ComponentSpec, StackComponent};
pub use connector::{ConnectorPatch, ConnectorSpec, ServiceConnector};
pub use entity_id::EntityId;
pub use kinds::{ComponentType, ConnectorType, EntityKind, EntityRef, ResourceKind, SubjectKind};
pub use project::{Project, ProjectPatch, ProjectSpec};
pub use role_assignment::{RoleAssignment, RoleAssignmentPatch, RoleAssignmentSpec, Subject};
pub use stack::{Stack, StackPatch, StackSpec};
pub use team::{MembershipPlan, Team, TeamPatch, TeamSpec};
pub use user::User;
pub use workspace::{Workspace, WorkspacePatch, WorkspaceSpec, WorkspaceStatus};

use crate::diff::Diff;
use crate::validate::ValidationError;

/// A minimal set of field changes for one entity type.
///
/// Map- and set-valued fields are carried whole: the update contract
/// replaces them atomically.
pub trait ChangeSet: fmt::Debug + Default + Send + Sync {
    /// Names of the fields this change set touches, in declaration order.
    fn changed_fields(&self) -> Vec<&'static str>;

    fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }
}

/// An entity the store must already hold before a dependent write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Workspace(EntityId),
    Project(EntityId),
    Stack(EntityId),
    /// A component, optionally required to fill a particular stack slot.
    Component {
        id: EntityId,
        slot: Option<ComponentType>,
    },
    Connector(EntityId),
    Team(EntityId),
    User(EntityId),
}

impl Reference {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Workspace(_) => EntityKind::Workspace,
            Self::Project(_) => EntityKind::Project,
            Self::Stack(_) => EntityKind::Stack,
            Self::Component { .. } => EntityKind::StackComponent,
            Self::Connector(_) => EntityKind::ServiceConnector,
            Self::Team(_) => EntityKind::Team,
            Self::User(_) => EntityKind::User,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            Self::Workspace(id)
            | Self::Project(id)
            | Self::Stack(id)
            | Self::Component { id, .. }
            | Self::Connector(id)
            | Self::Team(id)
            | Self::User(id) => id,
        }
    }
}

/// A remotely managed record type and the rules that govern it.
///
/// Each implementation wires its type into the validation rules engine
/// and the diff engine; the generic reconciler drives the rest.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: EntityKind;

    /// The desired-state record an operator declares.
    type Spec: fmt::Debug + Send + Sync;

    /// The minimal update payload.
    type Patch: ChangeSet;

    fn id(&self) -> &EntityId;

    /// Local, pre-network validation of a desired record.
    fn validate(spec: &Self::Spec) -> Result<(), ValidationError>;

    /// Compare last-known remote state against the desired record.
    fn diff(current: &Self, desired: &Self::Spec) -> Diff<Self::Patch>;

    /// Entities that must already exist before this record is written.
    fn references(_spec: &Self::Spec) -> Vec<Reference> {
        Vec::new()
    }

    /// Membership calls needed on top of the field update (teams only).
    fn membership_plan(_current: &Self, _desired: &Self::Spec) -> MembershipPlan {
        MembershipPlan::default()
    }

    /// A record the server still returns but reports as torn down.
    fn is_gone(&self) -> bool {
        false
    }

    fn entity_ref(&self) -> EntityRef {
        EntityRef::known(Self::KIND, self.id().clone())
    }
}

/// Entity types that carry a unique, operator-facing name.
pub trait Named: Entity {
    fn name(&self) -> &str;
}
