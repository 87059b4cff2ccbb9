//! Wire types for the server REST API (`/api/v1/`).
//!
//! Response types mirror the JSON the server returns; request types are
//! what the client sends on create (`*Request`) and update (`*Update`).
//! Update bodies only carry the fields being changed: `None` fields are
//! skipped, and `Some(None)` on a nullable reference serializes as `null`
//! to clear it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ── Pagination ───────────────────────────────────────────────────────

/// Generic pagination wrapper returned by all list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// 1-based page index.
    pub index: u32,
    pub max_size: u32,
    pub total_pages: u32,
    pub total: u64,
    pub items: Vec<T>,
}

// ── Auth / server ────────────────────────────────────────────────────

/// Token returned by `POST /api/v1/login`.
#[derive(Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Server metadata from `GET /api/v1/info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfoResponse {
    pub id: Uuid,
    pub version: String,
    #[serde(default)]
    pub deployment_type: Option<String>,
    #[serde(default)]
    pub auth_scheme: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
}

// ── Users ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

// ── Workspaces ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_managed: bool,
    /// One of: `pending`, `creating`, `available`, `failed`,
    /// `deactivated`, `deleted`.
    pub status: String,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_managed: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkspaceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

// ── Projects ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub workspace_id: Uuid,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRequest {
    pub name: String,
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

// ── Stacks ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackResponse {
    pub id: Uuid,
    pub name: String,
    /// Component type → component ids. The server allows several per
    /// type; the operator-facing model exposes at most one.
    #[serde(default)]
    pub components: BTreeMap<String, Vec<Uuid>>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StackRequest {
    pub name: String,
    pub components: BTreeMap<String, Vec<String>>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StackUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

// ── Stack components ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub flavor: String,
    #[serde(default)]
    pub configuration: BTreeMap<String, Value>,
    #[serde(default)]
    pub connector_id: Option<Uuid>,
    #[serde(default)]
    pub connector_resource_id: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub flavor: String,
    pub configuration: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector_resource_id: Option<String>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComponentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector_resource_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

// ── Service connectors ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorResponse {
    pub id: Uuid,
    pub name: String,
    pub connector_type: String,
    pub auth_method: String,
    #[serde(default)]
    pub resource_types: BTreeSet<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub configuration: BTreeMap<String, Value>,
    /// Secret names only. The server never returns secret values.
    #[serde(default)]
    pub secrets: BTreeMap<String, Option<Value>>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Clone, Serialize)]
pub struct ConnectorRequest {
    pub name: String,
    pub connector_type: String,
    pub auth_method: String,
    pub resource_types: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub configuration: BTreeMap<String, Value>,
    pub secrets: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

impl fmt::Debug for ConnectorRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorRequest")
            .field("name", &self.name)
            .field("connector_type", &self.connector_type)
            .field("auth_method", &self.auth_method)
            .field("resource_types", &self.resource_types)
            .field("resource_id", &self.resource_id)
            .field("configuration", &self.configuration)
            .field("secrets", &self.secrets.keys().collect::<Vec<_>>())
            .field("labels", &self.labels)
            .finish()
    }
}

#[derive(Clone, Default, Serialize)]
pub struct ConnectorUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

impl fmt::Debug for ConnectorUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorUpdate")
            .field("name", &self.name)
            .field("resource_types", &self.resource_types)
            .field("resource_id", &self.resource_id)
            .field("configuration", &self.configuration)
            .field(
                "secrets",
                &self.secrets.as_ref().map(|s| s.keys().collect::<Vec<_>>()),
            )
            .field("labels", &self.labels)
            .finish()
    }
}

// ── Teams ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub member_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

// ── Role assignments ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignmentResponse {
    pub id: Uuid,
    pub resource_id: Uuid,
    /// One of: `project`, `stack`, `workspace`.
    pub resource_type: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub team_id: Option<Uuid>,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleAssignmentRequest {
    pub resource_id: String,
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RoleAssignmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn update_clears_nullable_reference_with_null() {
        let body = ComponentUpdate {
            connector_id: Some(None),
            ..ComponentUpdate::default()
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "connector_id": null }));
    }

    #[test]
    fn connector_request_debug_hides_secret_values() {
        let req = ConnectorRequest {
            name: "aws".into(),
            connector_type: "aws".into(),
            auth_method: "secret-key".into(),
            resource_types: BTreeSet::new(),
            resource_id: None,
            configuration: BTreeMap::new(),
            secrets: BTreeMap::from([("aws_secret_access_key".into(), "hunter2".into())]),
            labels: BTreeMap::new(),
        };
        let rendered = format!("{req:?}");
        assert!(rendered.contains("aws_secret_access_key"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn component_response_reads_type_field() {
        let raw = serde_json::json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "name": "test-store",
            "type": "artifact_store",
            "flavor": "local",
        });
        let resp: ComponentResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(resp.component_type, "artifact_store");
        assert!(resp.configuration.is_empty());
    }
}
