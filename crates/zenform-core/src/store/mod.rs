// ── Remote entity store ──
//
// The collaborator every reconciler talks to. The server is the only
// source of truth; implementations hold no state across passes beyond
// what the server itself holds.

mod http;
mod memory;

use std::collections::BTreeSet;

use async_trait::async_trait;
use strum::{Display, IntoStaticStr};
use thiserror::Error;

use crate::model::{
    Entity, EntityId, EntityKind, Project, RoleAssignment, ServiceConnector, Stack,
    StackComponent, Team, User, Workspace,
};

pub use http::HttpStore;
pub use memory::{InMemory, MemoryStore};

/// A single store call, as counted by call budgets and call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Verb {
    Create,
    Get,
    Update,
    Delete,
    List,
    AddMember,
    RemoveMember,
}

/// Why a store call failed, already classified by what the caller can do
/// about it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("deadline exceeded before the server answered")]
    Timeout,

    #[error("server unavailable{}: {message}", fmt_status(.status.as_ref()))]
    Unavailable { status: Option<u16>, message: String },

    #[error("request rejected{}: {message}", fmt_status(.status.as_ref()))]
    Rejected { status: Option<u16>, message: String },

    #[error("invalid or expired credentials")]
    Unauthorized,

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),
}

fn fmt_status(status: Option<&u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ── Listing ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    /// Exact-name filter; the server may still return near matches.
    pub name: Option<String>,
    /// 1-based.
    pub page: u32,
    pub size: u32,
}

impl ListFilter {
    pub const DEFAULT_PAGE_SIZE: u32 = 100;

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn next_page(&self) -> Self {
        Self {
            page: self.page + 1,
            ..self.clone()
        }
    }
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            name: None,
            page: 1,
            size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub index: u32,
    pub total_pages: u32,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.items.is_empty() || self.index >= self.total_pages
    }
}

// ── Store traits ─────────────────────────────────────────────────────

/// Create/get/update/delete/list for one entity type.
#[async_trait]
pub trait EntityStore<R: Entity>: Send + Sync {
    async fn create(&self, spec: &R::Spec) -> Result<R, StoreError>;

    /// Must fail with [`StoreError::NotFound`] when the id is unknown.
    async fn get(&self, id: &EntityId) -> Result<R, StoreError>;

    async fn update(&self, id: &EntityId, patch: &R::Patch) -> Result<R, StoreError>;

    /// Deleting an id that is already gone fails with `NotFound`; the
    /// reconciler treats that as success.
    async fn delete(&self, id: &EntityId) -> Result<(), StoreError>;

    async fn list(&self, filter: &ListFilter) -> Result<Page<R>, StoreError>;
}

/// User lookups and team membership calls.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn get_user(&self, id: &EntityId) -> Result<User, StoreError>;

    async fn list_members(&self, team: &EntityId) -> Result<BTreeSet<EntityId>, StoreError>;

    async fn add_member(&self, team: &EntityId, user: &EntityId) -> Result<(), StoreError>;

    async fn remove_member(&self, team: &EntityId, user: &EntityId) -> Result<(), StoreError>;
}

/// Everything a reconciler may need: every entity type plus membership.
pub trait RemoteStore:
    EntityStore<Workspace>
    + EntityStore<Project>
    + EntityStore<Stack>
    + EntityStore<StackComponent>
    + EntityStore<ServiceConnector>
    + EntityStore<Team>
    + EntityStore<RoleAssignment>
    + MembershipStore
{
}

impl<T> RemoteStore for T where
    T: EntityStore<Workspace>
        + EntityStore<Project>
        + EntityStore<Stack>
        + EntityStore<StackComponent>
        + EntityStore<ServiceConnector>
        + EntityStore<Team>
        + EntityStore<RoleAssignment>
        + MembershipStore
{
}
