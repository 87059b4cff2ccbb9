//! Desired-state manifest: YAML loading, dependency tiers and
//! `name:<entity>` reference binding.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use zenform_core::{
    ComponentSpec, ConnectorSpec, Entity, EntityId, EntityKind, ListFilter, Project, ProjectSpec,
    ResourceKind, RoleAssignment, RoleAssignmentSpec, ServiceConnector, Stack, StackComponent,
    StackSpec, Team, TeamSpec, Workspace, WorkspaceSpec,
};

use crate::error::CliError;

/// Prefix marking a reference to another entity declared in the manifest.
pub const NAME_PREFIX: &str = "name:";

/// One manifest entry: the desired record plus the id it is pinned to,
/// when the operator knows it.
#[derive(Debug, Clone, Deserialize)]
pub struct Declared<S> {
    #[serde(default)]
    pub id: Option<EntityId>,

    #[serde(flatten)]
    pub spec: S,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub service_connectors: Vec<Declared<ConnectorSpec>>,
    #[serde(default)]
    pub workspaces: Vec<Declared<WorkspaceSpec>>,
    #[serde(default)]
    pub teams: Vec<Declared<TeamSpec>>,
    #[serde(default)]
    pub components: Vec<Declared<ComponentSpec>>,
    #[serde(default)]
    pub projects: Vec<Declared<ProjectSpec>>,
    #[serde(default)]
    pub stacks: Vec<Declared<StackSpec>>,
    #[serde(default)]
    pub role_assignments: Vec<Declared<RoleAssignmentSpec>>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|e| CliError::Manifest {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&text).map_err(|reason| CliError::Manifest {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    pub fn len(&self) -> usize {
        self.service_connectors.len()
            + self.workspaces.len()
            + self.teams.len()
            + self.components.len()
            + self.projects.len()
            + self.stacks.len()
            + self.role_assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A binding table where every declared name maps to its pinned id or
    /// a placeholder. Used for offline checks.
    pub fn placeholder_bindings(&self) -> Result<Bindings, CliError> {
        let mut bindings = Bindings::strict();
        declare(&mut bindings, &self.service_connectors)?;
        declare(&mut bindings, &self.workspaces)?;
        declare(&mut bindings, &self.teams)?;
        declare(&mut bindings, &self.components)?;
        declare(&mut bindings, &self.projects)?;
        declare(&mut bindings, &self.stacks)?;
        Ok(bindings)
    }
}

fn declare<S: Declarable>(bindings: &mut Bindings, entries: &[Declared<S>]) -> Result<(), CliError> {
    for entry in entries {
        let Some(name) = entry.spec.name() else {
            continue;
        };
        let kind = S::Entity::KIND;
        if bindings.contains(kind, name) {
            return Err(CliError::Duplicate {
                kind,
                name: name.to_owned(),
            });
        }
        let id = entry.id.clone().unwrap_or_else(EntityId::generate);
        bindings.insert(kind, name, id);
    }
    Ok(())
}

// ── Reference binding ────────────────────────────────────────────────

/// Declared names mapped to server ids, filled in tier by tier.
#[derive(Debug, Default)]
pub struct Bindings {
    ids: HashMap<(EntityKind, String), EntityId>,
    /// Keep unknown `name:` references as they are instead of failing.
    lenient: bool,
}

impl Bindings {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn lenient() -> Self {
        Self {
            lenient: true,
            ..Self::default()
        }
    }

    pub fn insert(&mut self, kind: EntityKind, name: &str, id: EntityId) {
        self.ids.insert((kind, name.to_owned()), id);
    }

    pub fn contains(&self, kind: EntityKind, name: &str) -> bool {
        self.ids.contains_key(&(kind, name.to_owned()))
    }

    /// Replace a `name:<entity>` reference with the bound id.
    pub fn resolve(&self, kind: EntityKind, id: &EntityId) -> Result<EntityId, CliError> {
        let Some(name) = name_reference(id) else {
            return Ok(id.clone());
        };
        match self.ids.get(&(kind, name.to_owned())) {
            Some(bound) => Ok(bound.clone()),
            None if self.lenient => Ok(id.clone()),
            None => Err(CliError::UnresolvedName {
                kind,
                name: name.to_owned(),
            }),
        }
    }

    fn resolve_opt(
        &self,
        kind: EntityKind,
        id: Option<&EntityId>,
    ) -> Result<Option<EntityId>, CliError> {
        id.map(|id| self.resolve(kind, id)).transpose()
    }
}

pub fn name_reference(id: &EntityId) -> Option<&str> {
    match id {
        EntityId::Opaque(s) => s.strip_prefix(NAME_PREFIX),
        EntityId::Uuid(_) => None,
    }
}

/// A manifest record type: how it is labelled and how its references
/// are bound.
pub trait Declarable: Clone + Send + Sync {
    type Entity: Entity<Spec = Self>;

    /// Operator-facing name, for entity types that have one.
    fn name(&self) -> Option<&str>;

    fn label(&self) -> String {
        self.name().unwrap_or_default().to_owned()
    }

    /// A copy with every `name:` reference replaced by a bound id.
    fn bind(&self, bindings: &Bindings) -> Result<Self, CliError>;

    /// Narrows the listing used to find an already existing record.
    fn lookup_filter(&self) -> ListFilter {
        self.name().map(ListFilter::by_name).unwrap_or_default()
    }

    /// Whether `entity` is the remote record this entry declares.
    fn matches(&self, entity: &Self::Entity) -> bool;
}

impl Declarable for WorkspaceSpec {
    type Entity = Workspace;

    fn matches(&self, entity: &Self::Entity) -> bool {
        entity.name == self.name
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn bind(&self, _bindings: &Bindings) -> Result<Self, CliError> {
        Ok(self.clone())
    }
}

impl Declarable for ConnectorSpec {
    type Entity = ServiceConnector;

    fn matches(&self, entity: &Self::Entity) -> bool {
        entity.name == self.name
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn bind(&self, _bindings: &Bindings) -> Result<Self, CliError> {
        Ok(self.clone())
    }
}

impl Declarable for TeamSpec {
    type Entity = Team;

    fn matches(&self, entity: &Self::Entity) -> bool {
        entity.name == self.name
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn bind(&self, _bindings: &Bindings) -> Result<Self, CliError> {
        Ok(self.clone())
    }
}

impl Declarable for ProjectSpec {
    type Entity = Project;

    fn matches(&self, entity: &Self::Entity) -> bool {
        entity.name == self.name
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn bind(&self, bindings: &Bindings) -> Result<Self, CliError> {
        Ok(Self {
            workspace_id: bindings.resolve(EntityKind::Workspace, &self.workspace_id)?,
            ..self.clone()
        })
    }
}

impl Declarable for ComponentSpec {
    type Entity = StackComponent;

    fn matches(&self, entity: &Self::Entity) -> bool {
        entity.name == self.name
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn bind(&self, bindings: &Bindings) -> Result<Self, CliError> {
        Ok(Self {
            connector: bindings
                .resolve_opt(EntityKind::ServiceConnector, self.connector.as_ref())?,
            ..self.clone()
        })
    }
}

impl Declarable for StackSpec {
    type Entity = Stack;

    fn matches(&self, entity: &Self::Entity) -> bool {
        entity.name == self.name
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn bind(&self, bindings: &Bindings) -> Result<Self, CliError> {
        let components = self
            .components
            .iter()
            .map(|(slot, id)| Ok((slot.clone(), bindings.resolve(EntityKind::StackComponent, id)?)))
            .collect::<Result<_, CliError>>()?;
        Ok(Self {
            components,
            ..self.clone()
        })
    }
}

impl Declarable for RoleAssignmentSpec {
    type Entity = RoleAssignment;

    /// Resource and subject identify an assignment; the role is mutable.
    fn matches(&self, entity: &RoleAssignment) -> bool {
        entity.resource_id == self.resource_id && self.subject().as_ref() == Some(&entity.subject)
    }

    fn name(&self) -> Option<&str> {
        None
    }

    fn label(&self) -> String {
        format!("{}@{}/{}", self.role, self.resource_type, self.resource_id)
    }

    fn bind(&self, bindings: &Bindings) -> Result<Self, CliError> {
        // An unparseable resource type is left for validation to report.
        let resource_id = match self.resource_type.parse::<ResourceKind>() {
            Ok(kind) => bindings.resolve(kind.entity_kind(), &self.resource_id)?,
            Err(_) => self.resource_id.clone(),
        };
        Ok(Self {
            resource_id,
            team_id: bindings.resolve_opt(EntityKind::Team, self.team_id.as_ref())?,
            ..self.clone()
        })
    }
}
