// ── In-memory store ──
//
// A process-local stand-in for the server, used by the test-suite and by
// offline planning. Records live in `DashMap`s keyed by id, patches are
// applied whole-field, secret values are dropped on write, and every call
// is counted so tests can assert exactly which writes a pass issued.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use super::{EntityStore, ListFilter, MembershipStore, Page, StoreError, Verb};
use crate::model::{
    Entity, EntityId, EntityKind, Project, RoleAssignment, ServiceConnector, Stack,
    StackComponent, Team, User, Workspace, WorkspaceStatus,
};

/// How an entity type lives inside [`MemoryStore`].
pub trait InMemory: Entity {
    /// Build the record the server would return for a fresh create.
    fn materialize(id: EntityId, spec: &Self::Spec) -> Self;

    /// Apply a change set the way the server's update endpoint does.
    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Name used for list filtering and duplicate detection.
    fn record_name(&self) -> Option<&str>;

    fn spec_name(spec: &Self::Spec) -> Option<&str>;

    fn collection(store: &MemoryStore) -> &DashMap<EntityId, Self>;
}

type CallKey = (Verb, EntityKind);

#[derive(Default)]
pub struct MemoryStore {
    workspaces: DashMap<EntityId, Workspace>,
    projects: DashMap<EntityId, Project>,
    stacks: DashMap<EntityId, Stack>,
    components: DashMap<EntityId, StackComponent>,
    connectors: DashMap<EntityId, ServiceConnector>,
    teams: DashMap<EntityId, Team>,
    role_assignments: DashMap<EntityId, RoleAssignment>,
    users: DashMap<EntityId, User>,

    calls: DashMap<CallKey, usize>,
    failures: Mutex<HashMap<CallKey, VecDeque<StoreError>>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` (pairs with paused tokio time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    // ── Seeding and inspection ───────────────────────────────────────

    /// Insert a record as if someone else had created it.
    pub fn seed<R: InMemory>(&self, record: R) {
        R::collection(self).insert(record.id().clone(), record);
    }

    /// Drop a record behind the reconciler's back.
    pub fn forget<R: InMemory>(&self, id: &EntityId) -> Option<R> {
        R::collection(self).remove(id).map(|(_, r)| r)
    }

    pub fn snapshot<R: InMemory>(&self, id: &EntityId) -> Option<R> {
        R::collection(self).get(id).map(|r| r.value().clone())
    }

    pub fn count<R: InMemory>(&self) -> usize {
        R::collection(self).len()
    }

    pub fn add_user(&self, name: &str) -> EntityId {
        let id = EntityId::generate();
        self.users.insert(
            id.clone(),
            User {
                id: id.clone(),
                name: name.to_owned(),
                email: None,
                active: true,
            },
        );
        id
    }

    // ── Call log ─────────────────────────────────────────────────────

    pub fn calls(&self, verb: Verb, kind: EntityKind) -> usize {
        self.calls.get(&(verb, kind)).map_or(0, |n| *n)
    }

    /// Every call that could have changed remote state.
    pub fn writes(&self) -> usize {
        self.calls
            .iter()
            .filter(|entry| {
                matches!(
                    entry.key().0,
                    Verb::Create | Verb::Update | Verb::Delete | Verb::AddMember | Verb::RemoveMember
                )
            })
            .map(|entry| *entry.value())
            .sum()
    }

    pub fn reset_calls(&self) {
        self.calls.clear();
    }

    // ── Failure injection ────────────────────────────────────────────

    /// Make the next `verb` call on `kind` fail with `err`. Queued
    /// failures are consumed in order.
    pub fn fail_next(&self, verb: Verb, kind: EntityKind, err: StoreError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.entry((verb, kind)).or_default().push_back(err);
        }
    }

    async fn enter(&self, verb: Verb, kind: EntityKind) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        *self.calls.entry((verb, kind)).or_insert(0) += 1;
        trace!(%verb, %kind, "memory store call");

        let injected = self
            .failures
            .lock()
            .ok()
            .and_then(|mut failures| failures.get_mut(&(verb, kind))?.pop_front());
        injected.map_or(Ok(()), Err)
    }
}

fn not_found<R: Entity>(id: &EntityId) -> StoreError {
    StoreError::NotFound {
        kind: R::KIND,
        id: id.clone(),
    }
}

// ── Generic entity store ─────────────────────────────────────────────

#[async_trait]
impl<R: InMemory> EntityStore<R> for MemoryStore {
    async fn create(&self, spec: &R::Spec) -> Result<R, StoreError> {
        self.enter(Verb::Create, R::KIND).await?;
        let collection = R::collection(self);

        if let Some(name) = R::spec_name(spec) {
            if collection
                .iter()
                .any(|entry| entry.value().record_name() == Some(name))
            {
                return Err(StoreError::Rejected {
                    status: Some(409),
                    message: format!("{} '{name}' already exists", R::KIND),
                });
            }
        }

        let record = R::materialize(EntityId::generate(), spec);
        collection.insert(record.id().clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &EntityId) -> Result<R, StoreError> {
        self.enter(Verb::Get, R::KIND).await?;
        R::collection(self)
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| not_found::<R>(id))
    }

    async fn update(&self, id: &EntityId, patch: &R::Patch) -> Result<R, StoreError> {
        self.enter(Verb::Update, R::KIND).await?;
        let mut record = R::collection(self)
            .get_mut(id)
            .ok_or_else(|| not_found::<R>(id))?;
        record.apply_patch(patch);
        Ok(record.clone())
    }

    async fn delete(&self, id: &EntityId) -> Result<(), StoreError> {
        self.enter(Verb::Delete, R::KIND).await?;
        R::collection(self)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found::<R>(id))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Page<R>, StoreError> {
        self.enter(Verb::List, R::KIND).await?;
        let mut matching: Vec<R> = R::collection(self)
            .iter()
            .filter(|entry| {
                filter
                    .name
                    .as_deref()
                    .is_none_or(|name| entry.value().record_name() == Some(name))
            })
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(|a, b| a.id().cmp(b.id()));

        let size = filter.size.max(1) as usize;
        let total_pages = matching.len().div_ceil(size).max(1);
        let start = (filter.page.max(1) as usize - 1) * size;
        let items = matching.into_iter().skip(start).take(size).collect();
        Ok(Page {
            index: filter.page,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
            items,
        })
    }
}

// ── Users and membership ─────────────────────────────────────────────

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn get_user(&self, id: &EntityId) -> Result<User, StoreError> {
        self.enter(Verb::Get, EntityKind::User).await?;
        self.users
            .get(id)
            .map(|u| u.value().clone())
            .ok_or_else(|| not_found_user(id))
    }

    async fn list_members(&self, team: &EntityId) -> Result<BTreeSet<EntityId>, StoreError> {
        self.enter(Verb::List, EntityKind::User).await?;
        self.teams
            .get(team)
            .map(|t| t.members.clone())
            .ok_or_else(|| not_found::<Team>(team))
    }

    async fn add_member(&self, team: &EntityId, user: &EntityId) -> Result<(), StoreError> {
        self.enter(Verb::AddMember, EntityKind::Team).await?;
        if !self.users.contains_key(user) {
            return Err(not_found_user(user));
        }
        let mut record = self
            .teams
            .get_mut(team)
            .ok_or_else(|| not_found::<Team>(team))?;
        record.members.insert(user.clone());
        record.member_count = member_count(&record.members);
        Ok(())
    }

    async fn remove_member(&self, team: &EntityId, user: &EntityId) -> Result<(), StoreError> {
        self.enter(Verb::RemoveMember, EntityKind::Team).await?;
        let mut record = self
            .teams
            .get_mut(team)
            .ok_or_else(|| not_found::<Team>(team))?;
        record.members.remove(user);
        record.member_count = member_count(&record.members);
        Ok(())
    }
}

fn not_found_user(id: &EntityId) -> StoreError {
    StoreError::NotFound {
        kind: EntityKind::User,
        id: id.clone(),
    }
}

fn member_count(members: &BTreeSet<EntityId>) -> u32 {
    u32::try_from(members.len()).unwrap_or(u32::MAX)
}

// ── Per-type storage rules ───────────────────────────────────────────

impl InMemory for Workspace {
    fn materialize(id: EntityId, spec: &Self::Spec) -> Self {
        Self {
            server_url: Some(format!("https://{}.workspaces.local", spec.name)),
            id,
            name: spec.name.clone(),
            display_name: spec.display_name.clone(),
            description: spec.description.clone(),
            is_managed: spec.is_managed,
            status: WorkspaceStatus::Available,
            created: Some(chrono::Utc::now()),
        }
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(display_name) = &patch.display_name {
            self.display_name = Some(display_name.clone());
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
    }

    fn record_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn spec_name(spec: &Self::Spec) -> Option<&str> {
        Some(&spec.name)
    }

    fn collection(store: &MemoryStore) -> &DashMap<EntityId, Self> {
        &store.workspaces
    }
}

impl InMemory for Project {
    fn materialize(id: EntityId, spec: &Self::Spec) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            workspace_id: spec.workspace_id.clone(),
            description: spec.description.clone(),
            tags: spec.tags.clone(),
            metadata: spec.metadata.clone(),
            created: Some(chrono::Utc::now()),
        }
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(tags) = &patch.tags {
            self.tags.clone_from(tags);
        }
        if let Some(metadata) = &patch.metadata {
            self.metadata.clone_from(metadata);
        }
    }

    fn record_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn spec_name(spec: &Self::Spec) -> Option<&str> {
        Some(&spec.name)
    }

    fn collection(store: &MemoryStore) -> &DashMap<EntityId, Self> {
        &store.projects
    }
}

impl InMemory for Stack {
    fn materialize(id: EntityId, spec: &Self::Spec) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            components: spec
                .typed_components()
                .into_iter()
                .map(|(slot, component)| (slot, vec![component]))
                .collect(),
            labels: spec.labels.clone(),
            created: Some(chrono::Utc::now()),
        }
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(components) = &patch.components {
            self.components = components
                .iter()
                .map(|(slot, component)| (*slot, vec![component.clone()]))
                .collect();
        }
        if let Some(labels) = &patch.labels {
            self.labels.clone_from(labels);
        }
    }

    fn record_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn spec_name(spec: &Self::Spec) -> Option<&str> {
        Some(&spec.name)
    }

    fn collection(store: &MemoryStore) -> &DashMap<EntityId, Self> {
        &store.stacks
    }
}

impl InMemory for StackComponent {
    /// Only ever called with validated specs; an unparseable type falls
    /// back to the first slot rather than panicking.
    fn materialize(id: EntityId, spec: &Self::Spec) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            component_type: spec
                .component_type
                .parse()
                .unwrap_or(crate::model::ComponentType::Alerter),
            flavor: spec.flavor.clone(),
            configuration: spec.configuration.clone(),
            connector: spec.connector.clone(),
            connector_resource_id: spec.connector_resource_id.clone(),
            labels: spec.labels.clone(),
            created: Some(chrono::Utc::now()),
        }
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(configuration) = &patch.configuration {
            self.configuration.clone_from(configuration);
        }
        if let Some(connector) = &patch.connector {
            self.connector.clone_from(connector);
        }
        if let Some(resource_id) = &patch.connector_resource_id {
            self.connector_resource_id.clone_from(resource_id);
        }
        if let Some(labels) = &patch.labels {
            self.labels.clone_from(labels);
        }
    }

    fn record_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn spec_name(spec: &Self::Spec) -> Option<&str> {
        Some(&spec.name)
    }

    fn collection(store: &MemoryStore) -> &DashMap<EntityId, Self> {
        &store.components
    }
}

impl InMemory for ServiceConnector {
    fn materialize(id: EntityId, spec: &Self::Spec) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            connector_type: spec
                .connector_type
                .parse()
                .unwrap_or(crate::model::ConnectorType::Docker),
            auth_method: spec.auth_method.clone(),
            resource_types: spec.resource_types.clone(),
            resource_id: spec.resource_id.clone(),
            configuration: spec.configuration.clone(),
            secret_keys: spec.secrets.keys().cloned().collect(),
            labels: spec.labels.clone(),
            expires_at: None,
            created: Some(chrono::Utc::now()),
        }
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(resource_types) = &patch.resource_types {
            self.resource_types.clone_from(resource_types);
        }
        if let Some(resource_id) = &patch.resource_id {
            self.resource_id.clone_from(resource_id);
        }
        if let Some(configuration) = &patch.configuration {
            self.configuration.clone_from(configuration);
        }
        if let Some(secrets) = &patch.secrets {
            self.secret_keys = secrets.keys().cloned().collect();
        }
        if let Some(labels) = &patch.labels {
            self.labels.clone_from(labels);
        }
    }

    fn record_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn spec_name(spec: &Self::Spec) -> Option<&str> {
        Some(&spec.name)
    }

    fn collection(store: &MemoryStore) -> &DashMap<EntityId, Self> {
        &store.connectors
    }
}

impl InMemory for Team {
    /// Teams are created empty; members arrive through membership calls.
    fn materialize(id: EntityId, spec: &Self::Spec) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            description: spec.description.clone(),
            members: BTreeSet::new(),
            member_count: 0,
        }
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
    }

    fn record_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn spec_name(spec: &Self::Spec) -> Option<&str> {
        Some(&spec.name)
    }

    fn collection(store: &MemoryStore) -> &DashMap<EntityId, Self> {
        &store.teams
    }
}

impl InMemory for RoleAssignment {
    fn materialize(id: EntityId, spec: &Self::Spec) -> Self {
        let subject = spec
            .subject()
            .unwrap_or_else(|| crate::model::Subject::User(EntityId::from("")));
        Self {
            id,
            resource_id: spec.resource_id.clone(),
            resource_type: spec
                .resource_type
                .parse()
                .unwrap_or(crate::model::ResourceKind::Workspace),
            subject,
            role: spec.role.clone(),
        }
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        if let Some(role) = &patch.role {
            self.role.clone_from(role);
        }
    }

    fn record_name(&self) -> Option<&str> {
        None
    }

    fn spec_name(_spec: &Self::Spec) -> Option<&str> {
        None
    }

    fn collection(store: &MemoryStore) -> &DashMap<EntityId, Self> {
        &store.role_assignments
    }
}
