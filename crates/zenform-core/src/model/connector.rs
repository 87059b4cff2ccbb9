// ── Service connector domain type ──

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity_id::EntityId;
use super::kinds::{ConnectorType, EntityKind};
use super::{ChangeSet, Entity, Named};
use crate::diff::{self, Diff};
use crate::validate::{self, ValidationError};

/// Credentials broker for one cloud or platform account.
///
/// Secret values are write-only: the canonical record only knows which
/// secret names are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConnector {
    pub id: EntityId,
    pub name: String,
    pub connector_type: ConnectorType,
    pub auth_method: String,
    pub resource_types: BTreeSet<String>,
    pub resource_id: Option<String>,
    pub configuration: BTreeMap<String, Value>,
    pub secret_keys: BTreeSet<String>,
    pub labels: BTreeMap<String, String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Clone, Deserialize)]
pub struct ConnectorSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub connector_type: String,
    pub auth_method: String,
    #[serde(default)]
    pub resource_types: BTreeSet<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub configuration: BTreeMap<String, Value>,
    #[serde(default)]
    pub secrets: BTreeMap<String, SecretString>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Resend secret values even when the set of secret names matches.
    #[serde(default)]
    pub force_secrets: bool,
}

impl fmt::Debug for ConnectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorSpec")
            .field("name", &self.name)
            .field("connector_type", &self.connector_type)
            .field("auth_method", &self.auth_method)
            .field("resource_types", &self.resource_types)
            .field("resource_id", &self.resource_id)
            .field("configuration", &self.configuration)
            .field("secrets", &self.secrets.keys().collect::<Vec<_>>())
            .field("labels", &self.labels)
            .field("force_secrets", &self.force_secrets)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct ConnectorPatch {
    pub name: Option<String>,
    pub resource_types: Option<BTreeSet<String>>,
    pub resource_id: Option<Option<String>>,
    pub configuration: Option<BTreeMap<String, Value>>,
    pub secrets: Option<BTreeMap<String, SecretString>>,
    pub labels: Option<BTreeMap<String, String>>,
}

impl fmt::Debug for ConnectorPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorPatch")
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

impl ChangeSet for ConnectorPatch {
    fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("name", self.name.is_some()),
            ("resource_types", self.resource_types.is_some()),
            ("resource_id", self.resource_id.is_some()),
            ("configuration", self.configuration.is_some()),
            ("secrets", self.secrets.is_some()),
            ("labels", self.labels.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }
}

impl Entity for ServiceConnector {
    const KIND: EntityKind = EntityKind::ServiceConnector;
    type Spec = ConnectorSpec;
    type Patch = ConnectorPatch;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(spec: &ConnectorSpec) -> Result<(), ValidationError> {
        validate::connector(spec)
    }

    fn diff(current: &Self, desired: &ConnectorSpec) -> Diff<ConnectorPatch> {
        diff::connector(current, desired)
    }
}

impl Named for ServiceConnector {
    fn name(&self) -> &str {
        &self.name
    }
}
