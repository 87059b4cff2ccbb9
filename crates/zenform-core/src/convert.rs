// ── Wire-to-domain conversions ──
//
// Bridges `zenform_api::types` into `crate::model` and back. Responses
// are parsed into strong types; a value the model cannot represent is a
// decode error, never silently dropped. Connector secret values are
// exposed here and nowhere else, on their way into a request body.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};

use zenform_api::types::{
    ComponentRequest, ComponentResponse, ComponentUpdate, ConnectorRequest, ConnectorResponse,
    ConnectorUpdate, ProjectRequest, ProjectResponse, ProjectUpdate, RoleAssignmentRequest,
    RoleAssignmentResponse, RoleAssignmentUpdate, StackRequest, StackResponse, StackUpdate,
    TeamRequest, TeamResponse, TeamUpdate, UserResponse, WorkspaceRequest, WorkspaceResponse,
    WorkspaceUpdate,
};

use crate::model::{
    ComponentPatch, ComponentSpec, ComponentType, ConnectorPatch, ConnectorSpec, ConnectorType,
    EntityId, Project, ProjectPatch, ProjectSpec, ResourceKind, RoleAssignment,
    RoleAssignmentPatch, RoleAssignmentSpec, ServiceConnector, Stack, StackComponent, StackPatch,
    StackSpec, Subject, Team, TeamPatch, TeamSpec, User, Workspace, WorkspacePatch,
    WorkspaceSpec, WorkspaceStatus,
};
use crate::store::StoreError;

// ── Helpers ──────────────────────────────────────────────────────────

impl From<Infallible> for StoreError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Decode any wire record whose domain counterpart is `TryFrom` it
/// (infallible `From` conversions included).
pub(crate) fn decode<W, T>(wire: W) -> Result<T, StoreError>
where
    T: TryFrom<W>,
    StoreError: From<T::Error>,
{
    T::try_from(wire).map_err(StoreError::from)
}

fn parse<T: FromStr>(what: &str, raw: &str) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Decode(format!("unrecognised {what} '{raw}'")))
}

fn expose(secrets: &BTreeMap<String, SecretString>) -> BTreeMap<String, String> {
    secrets
        .iter()
        .map(|(k, v)| (k.clone(), v.expose_secret().to_owned()))
        .collect()
}

fn slot_map(components: &BTreeMap<ComponentType, EntityId>) -> BTreeMap<String, Vec<String>> {
    components
        .iter()
        .map(|(slot, id)| (slot.to_string(), vec![id.to_string()]))
        .collect()
}

// ── Responses → domain ───────────────────────────────────────────────

impl TryFrom<WorkspaceResponse> for Workspace {
    type Error = StoreError;

    fn try_from(w: WorkspaceResponse) -> Result<Self, Self::Error> {
        let status = parse::<WorkspaceStatus>("workspace status", &w.status)?;
        // A URL reported before provisioning finishes is not yet usable.
        let server_url = w
            .server_url
            .filter(|_| status == WorkspaceStatus::Available);
        Ok(Self {
            id: w.id.into(),
            name: w.name,
            display_name: w.display_name,
            description: w.description,
            is_managed: w.is_managed,
            status,
            server_url,
            created: w.created,
        })
    }
}

impl From<ProjectResponse> for Project {
    fn from(p: ProjectResponse) -> Self {
        Self {
            id: p.id.into(),
            name: p.name,
            workspace_id: p.workspace_id.into(),
            description: p.description,
            tags: p.tags,
            metadata: p.metadata,
            created: p.created,
        }
    }
}

impl TryFrom<StackResponse> for Stack {
    type Error = StoreError;

    fn try_from(s: StackResponse) -> Result<Self, Self::Error> {
        let components = s
            .components
            .into_iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(slot, ids)| {
                let slot = parse::<ComponentType>("component type", &slot)?;
                Ok((slot, ids.into_iter().map(EntityId::from).collect()))
            })
            .collect::<Result<_, StoreError>>()?;
        Ok(Self {
            id: s.id.into(),
            name: s.name,
            components,
            labels: s.labels,
            created: s.created,
        })
    }
}

impl TryFrom<ComponentResponse> for StackComponent {
    type Error = StoreError;

    fn try_from(c: ComponentResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            id: c.id.into(),
            name: c.name,
            component_type: parse("component type", &c.component_type)?,
            flavor: c.flavor,
            configuration: c.configuration,
            connector: c.connector_id.map(EntityId::from),
            connector_resource_id: c.connector_resource_id,
            labels: c.labels,
            created: c.created,
        })
    }
}

impl TryFrom<ConnectorResponse> for ServiceConnector {
    type Error = StoreError;

    fn try_from(c: ConnectorResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            id: c.id.into(),
            name: c.name,
            connector_type: parse::<ConnectorType>("connector type", &c.connector_type)?,
            auth_method: c.auth_method,
            resource_types: c.resource_types,
            resource_id: c.resource_id,
            configuration: c.configuration,
            secret_keys: c.secrets.into_keys().collect(),
            labels: c.labels,
            expires_at: c.expires_at,
            created: c.created,
        })
    }
}

/// Teams come back without their member list; it is fetched separately.
pub(crate) fn team_from_parts(t: TeamResponse, members: BTreeSet<EntityId>) -> Team {
    let member_count = u32::try_from(members.len()).unwrap_or(u32::MAX);
    if member_count != t.member_count {
        tracing::debug!(
            team = %t.id,
            reported = t.member_count,
            listed = member_count,
            "member count differs from member list"
        );
    }
    Team {
        id: t.id.into(),
        name: t.name,
        description: t.description,
        members,
        member_count,
    }
}

impl TryFrom<RoleAssignmentResponse> for RoleAssignment {
    type Error = StoreError;

    fn try_from(r: RoleAssignmentResponse) -> Result<Self, Self::Error> {
        let subject = match (r.user_id, r.team_id) {
            (Some(user), None) => Subject::User(user.into()),
            (None, Some(team)) => Subject::Team(team.into()),
            _ => {
                return Err(StoreError::Decode(format!(
                    "role assignment {} does not bind exactly one subject",
                    r.id
                )));
            }
        };
        Ok(Self {
            id: r.id.into(),
            resource_id: r.resource_id.into(),
            resource_type: parse::<ResourceKind>("resource type", &r.resource_type)?,
            subject,
            role: r.role,
        })
    }
}

impl From<UserResponse> for User {
    fn from(u: UserResponse) -> Self {
        Self {
            id: u.id.into(),
            name: u.name,
            email: u.email,
            active: u.active,
        }
    }
}

// ── Desired records → create requests ────────────────────────────────

impl From<&WorkspaceSpec> for WorkspaceRequest {
    fn from(s: &WorkspaceSpec) -> Self {
        Self {
            name: s.name.clone(),
            display_name: s.display_name.clone(),
            description: s.description.clone(),
            is_managed: s.is_managed,
        }
    }
}

impl From<&ProjectSpec> for ProjectRequest {
    fn from(s: &ProjectSpec) -> Self {
        Self {
            name: s.name.clone(),
            workspace_id: s.workspace_id.to_string(),
            description: s.description.clone(),
            tags: s.tags.clone(),
            metadata: s.metadata.clone(),
        }
    }
}

impl From<&StackSpec> for StackRequest {
    fn from(s: &StackSpec) -> Self {
        Self {
            name: s.name.clone(),
            components: slot_map(&s.typed_components()),
            labels: s.labels.clone(),
        }
    }
}

impl From<&ComponentSpec> for ComponentRequest {
    fn from(s: &ComponentSpec) -> Self {
        Self {
            name: s.name.clone(),
            component_type: s.component_type.clone(),
            flavor: s.flavor.clone(),
            configuration: s.configuration.clone(),
            connector_id: s.connector.as_ref().map(ToString::to_string),
            connector_resource_id: s.connector_resource_id.clone(),
            labels: s.labels.clone(),
        }
    }
}

impl From<&ConnectorSpec> for ConnectorRequest {
    fn from(s: &ConnectorSpec) -> Self {
        Self {
            name: s.name.clone(),
            connector_type: s.connector_type.clone(),
            auth_method: s.auth_method.clone(),
            resource_types: s.resource_types.clone(),
            resource_id: s.resource_id.clone(),
            configuration: s.configuration.clone(),
            secrets: expose(&s.secrets),
            labels: s.labels.clone(),
        }
    }
}

impl From<&TeamSpec> for TeamRequest {
    fn from(s: &TeamSpec) -> Self {
        Self {
            name: s.name.clone(),
            description: s.description.clone(),
        }
    }
}

impl From<&RoleAssignmentSpec> for RoleAssignmentRequest {
    fn from(s: &RoleAssignmentSpec) -> Self {
        Self {
            resource_id: s.resource_id.to_string(),
            resource_type: s.resource_type.clone(),
            user_id: s.user_id.as_ref().map(ToString::to_string),
            team_id: s.team_id.as_ref().map(ToString::to_string),
            role: s.role.clone(),
        }
    }
}

// ── Patches → update requests ────────────────────────────────────────

impl From<&WorkspacePatch> for WorkspaceUpdate {
    fn from(p: &WorkspacePatch) -> Self {
        Self {
            name: p.name.clone(),
            display_name: p.display_name.clone().map(Some),
            description: p.description.clone().map(Some),
        }
    }
}

impl From<&ProjectPatch> for ProjectUpdate {
    fn from(p: &ProjectPatch) -> Self {
        Self {
            name: p.name.clone(),
            description: p.description.clone().map(Some),
            tags: p.tags.clone(),
            metadata: p.metadata.clone(),
        }
    }
}

impl From<&StackPatch> for StackUpdate {
    fn from(p: &StackPatch) -> Self {
        Self {
            name: p.name.clone(),
            components: p.components.as_ref().map(slot_map),
            labels: p.labels.clone(),
        }
    }
}

impl From<&ComponentPatch> for ComponentUpdate {
    fn from(p: &ComponentPatch) -> Self {
        Self {
            name: p.name.clone(),
            configuration: p.configuration.clone(),
            connector_id: p
                .connector
                .as_ref()
                .map(|c| c.as_ref().map(ToString::to_string)),
            connector_resource_id: p.connector_resource_id.clone(),
            labels: p.labels.clone(),
        }
    }
}

impl From<&ConnectorPatch> for ConnectorUpdate {
    fn from(p: &ConnectorPatch) -> Self {
        Self {
            name: p.name.clone(),
            resource_types: p.resource_types.clone(),
            resource_id: p.resource_id.clone(),
            configuration: p.configuration.clone(),
            secrets: p.secrets.as_ref().map(expose),
            labels: p.labels.clone(),
        }
    }
}

impl From<&TeamPatch> for TeamUpdate {
    fn from(p: &TeamPatch) -> Self {
        Self {
            name: p.name.clone(),
            description: p.description.clone().map(Some),
        }
    }
}

impl From<&RoleAssignmentPatch> for RoleAssignmentUpdate {
    fn from(p: &RoleAssignmentPatch) -> Self {
        Self {
            role: p.role.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    const A: &str = "550e8400-e29b-41d4-a716-446655440000";
    const B: &str = "6a3c1e0e-3f41-4a57-9a8e-0d5c8a1f2b10";

    #[test]
    fn role_assignment_with_two_subjects_fails_to_decode() {
        let raw: RoleAssignmentResponse = serde_json::from_value(json!({
            "id": A,
            "resource_id": B,
            "resource_type": "stack",
            "user_id": A,
            "team_id": B,
            "role": "admin"
        }))
        .unwrap();
        assert!(matches!(
            RoleAssignment::try_from(raw),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn connector_keeps_secret_names_only() {
        let raw: ConnectorResponse = serde_json::from_value(json!({
            "id": A,
            "name": "aws",
            "connector_type": "aws",
            "auth_method": "secret-key",
            "resource_types": ["s3-bucket"],
            "secrets": { "aws_secret_access_key": null }
        }))
        .unwrap();
        let connector = ServiceConnector::try_from(raw).unwrap();
        assert_eq!(
            connector.secret_keys,
            BTreeSet::from(["aws_secret_access_key".to_owned()])
        );
    }

    #[test]
    fn stack_patch_sends_one_id_per_slot() {
        let patch = StackPatch {
            components: Some(BTreeMap::from([(
                ComponentType::ArtifactStore,
                EntityId::from(A),
            )])),
            ..StackPatch::default()
        };
        let body = StackUpdate::from(&patch);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "components": { "artifact_store": [A] } })
        );
    }

    #[test]
    fn pending_workspace_has_no_server_url() {
        let raw: WorkspaceResponse = serde_json::from_value(json!({
            "id": A,
            "name": "ml",
            "status": "pending",
            "server_url": "https://ml.example"
        }))
        .unwrap();
        let ws = Workspace::try_from(raw).unwrap();
        assert_eq!(ws.server_url, None);
        assert_eq!(serde_json::to_value(&ws).unwrap()["server_url"], json!(null));
    }

    #[test]
    fn available_workspace_keeps_server_url() {
        let raw: WorkspaceResponse = serde_json::from_value(json!({
            "id": A,
            "name": "ml",
            "status": "available",
            "server_url": "https://ml.example"
        }))
        .unwrap();
        let ws = Workspace::try_from(raw).unwrap();
        assert_eq!(ws.server_url.as_deref(), Some("https://ml.example"));
    }

    #[test]
    fn empty_stack_slots_are_dropped() {
        let raw: StackResponse = serde_json::from_value(json!({
            "id": A,
            "name": "prod",
            "components": { "artifact_store": [B], "orchestrator": [] }
        }))
        .unwrap();
        let stack = Stack::try_from(raw).unwrap();
        assert_eq!(
            stack.components,
            BTreeMap::from([(ComponentType::ArtifactStore, vec![EntityId::from(B)])])
        );
    }

    #[test]
    fn unknown_workspace_status_is_a_decode_error() {
        let raw: WorkspaceResponse = serde_json::from_value(json!({
            "id": A,
            "name": "ml",
            "status": "hibernating"
        }))
        .unwrap();
        let err = Workspace::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("hibernating"));
    }
}
