//! Reconciliation and validation engine between `zenform-api` and the
//! declarative front-end.
//!
//! This crate owns the decision logic for converging remote MLOps server
//! entities (workspaces, projects, stacks, stack components, service
//! connectors, teams, role assignments) to a declared desired state:
//!
//! - **[`Reconciler`]**: one generic state machine instantiated per entity
//!   type. Each call is a single pass (`Planned` → `Created`/`Read` →
//!   `Diffed` → `Updated` → `Read`, or `Deleted`/`Missing`) with at most one
//!   create, update and delete call, every remote call bounded by the
//!   [`ReconcileContext`] deadline.
//!
//! - **Validation** ([`validate`], [`rules`]): pure, table-driven checks run
//!   before any network call. Component type/flavor/configuration and
//!   connector type/auth-method/resource-type compatibility live in static
//!   tables; adding a flavor is a data change.
//!
//! - **Diff engine** ([`diff`]): minimal change sets per entity type. Maps
//!   and sets are replaced whole; a change to an immutable field yields
//!   [`Diff::Replace`] instead of a patch.
//!
//! - **Drift reporter** ([`drift`]): sorts store failures into not-found
//!   (the reconciler reports [`Outcome::Missing`]), transient and permanent.
//!
//! - **Stores** ([`store`]): the [`RemoteStore`] collaborator traits, an
//!   HTTP-backed [`HttpStore`] and the process-local [`MemoryStore`].

pub mod config;
pub(crate) mod convert;
pub mod diff;
pub mod drift;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod rules;
pub mod store;
pub mod validate;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{AuthCredentials, ServerConfig, TlsVerification};
pub use diff::Diff;
pub use drift::DriftClass;
pub use error::{CoreError, MembershipFailure, MembershipOp};
pub use reconcile::{
    Action, ComponentReconciler, ConnectorReconciler, Outcome, PassState, PlannedAction,
    ProjectReconciler, ReconcileContext, Reconciler, RoleAssignmentReconciler, StackReconciler,
    TeamReconciler, WorkspaceReconciler,
};
pub use store::{
    EntityStore, HttpStore, InMemory, ListFilter, MembershipStore, MemoryStore, Page,
    RemoteStore, StoreError, Verb,
};
pub use validate::ValidationError;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ChangeSet, ComponentSpec, ComponentType, ConnectorSpec, ConnectorType, Entity, EntityId,
    EntityKind, EntityRef, Named, Project, ProjectSpec, Reference, ResourceKind, RoleAssignment,
    RoleAssignmentSpec, ServiceConnector, Stack, StackComponent, StackSpec, Subject, Team,
    TeamSpec, User, Workspace, WorkspaceSpec, WorkspaceStatus,
};
