// ── Local validation ──
//
// Pure checks run before any network call. Every validator returns the
// first failure it finds; table lookups go through `rules`.

use std::str::FromStr;

use thiserror::Error;

use crate::model::{
    ComponentSpec, ComponentType, ConnectorSpec, ConnectorType, EntityId, ProjectSpec,
    ResourceKind, RoleAssignmentSpec, StackSpec, TeamSpec, WorkspaceSpec,
};
use crate::rules;

const WORKSPACE_NAME_MAX: usize = 50;

/// A desired record that can never be accepted as written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown component type '{value}'")]
    UnknownComponentType { value: String },

    #[error("flavor '{flavor}' is not supported for component type {component_type}")]
    UnsupportedFlavor {
        component_type: ComponentType,
        flavor: String,
    },

    #[error("configuration key '{key}' is not recognised for {component_type}/{flavor}")]
    UnknownConfigKey {
        component_type: ComponentType,
        flavor: String,
        key: String,
    },

    #[error("unknown connector type '{value}'")]
    UnknownConnectorType { value: String },

    #[error("auth_method {auth_method} not valid for connector type {connector_type}")]
    InvalidAuthMethod {
        connector_type: ConnectorType,
        auth_method: String,
    },

    #[error("resource type {resource_type} not valid for connector type {connector_type}")]
    InvalidResourceType {
        connector_type: ConnectorType,
        resource_type: String,
    },

    /// Exactly one of two fields must be set.
    #[error("{}", mutual_exclusion_message(.first, .second, .both_set))]
    MutualExclusion {
        first: &'static str,
        second: &'static str,
        /// `true` when both were set, `false` when neither was.
        both_set: bool,
    },

    #[error("component {component_id} is a {actual}, not a {slot}")]
    ComponentSlotMismatch {
        slot: ComponentType,
        component_id: EntityId,
        actual: ComponentType,
    },

    #[error("{field}: {reason}")]
    Field { field: &'static str, reason: String },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn mutual_exclusion_message(first: &str, second: &str, both_set: &bool) -> String {
    if *both_set {
        format!("only one of {first} and {second} may be set, got both")
    } else {
        format!("exactly one of {first} and {second} must be set, got neither")
    }
}

impl ValidationError {
    /// The offending field, for diagnostics.
    pub fn field(&self) -> &'static str {
        match self {
            Self::UnknownComponentType { .. } => "type",
            Self::UnsupportedFlavor { .. } => "flavor",
            Self::UnknownConfigKey { .. } => "configuration",
            Self::UnknownConnectorType { .. } => "connector_type",
            Self::InvalidAuthMethod { .. } => "auth_method",
            Self::InvalidResourceType { .. } => "resource_types",
            Self::MutualExclusion { first, .. } => *first,
            Self::ComponentSlotMismatch { .. } => "components",
            Self::Field { field, .. } => *field,
        }
    }

    fn field_error(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Field {
            field,
            reason: reason.into(),
        }
    }
}

// ── Reusable checks ──────────────────────────────────────────────────

/// Exactly one of a pair of optional fields must be set.
pub fn exactly_one(
    first: (&'static str, bool),
    second: (&'static str, bool),
) -> Result<(), ValidationError> {
    match (first.1, second.1) {
        (true, false) | (false, true) => Ok(()),
        (both_set, _) => Err(ValidationError::MutualExclusion {
            first: first.0,
            second: second.0,
            both_set,
        }),
    }
}

fn name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::field_error(field, "must not be empty"));
    }
    if value.trim() != value {
        return Err(ValidationError::field_error(
            field,
            "must not start or end with whitespace",
        ));
    }
    Ok(())
}

fn component_type(value: &str) -> Result<ComponentType, ValidationError> {
    ComponentType::from_str(value).map_err(|_| ValidationError::UnknownComponentType {
        value: value.to_owned(),
    })
}

// ── Per-entity validators ────────────────────────────────────────────

pub fn workspace(spec: &WorkspaceSpec) -> Result<(), ValidationError> {
    name("name", &spec.name)?;
    if spec.name.len() > WORKSPACE_NAME_MAX {
        return Err(ValidationError::field_error(
            "name",
            format!("must be at most {WORKSPACE_NAME_MAX} characters"),
        ));
    }
    let slug = spec
        .name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !slug || spec.name.starts_with('-') || spec.name.ends_with('-') {
        return Err(ValidationError::field_error(
            "name",
            "must contain only lowercase letters, digits and inner hyphens",
        ));
    }
    Ok(())
}

pub fn project(spec: &ProjectSpec) -> Result<(), ValidationError> {
    name("name", &spec.name)
}

pub fn component(spec: &ComponentSpec) -> Result<(), ValidationError> {
    name("name", &spec.name)?;
    let ty = component_type(&spec.component_type)?;

    if rules::flavor_rule(ty, &spec.flavor).is_none() {
        return Err(ValidationError::UnsupportedFlavor {
            component_type: ty,
            flavor: spec.flavor.clone(),
        });
    }

    if let Some(key) = spec
        .configuration
        .keys()
        .find(|key| !rules::accepts_config_key(ty, &spec.flavor, key))
    {
        return Err(ValidationError::UnknownConfigKey {
            component_type: ty,
            flavor: spec.flavor.clone(),
            key: key.clone(),
        });
    }

    if spec.connector_resource_id.is_some() && spec.connector.is_none() {
        return Err(ValidationError::field_error(
            "connector_resource_id",
            "requires connector to be set",
        ));
    }
    Ok(())
}

/// Configuration and secret contents are left to the server: valid
/// values can depend on resources only it can resolve.
pub fn connector(spec: &ConnectorSpec) -> Result<(), ValidationError> {
    name("name", &spec.name)?;
    let ty = ConnectorType::from_str(&spec.connector_type).map_err(|_| {
        ValidationError::UnknownConnectorType {
            value: spec.connector_type.clone(),
        }
    })?;
    let Some(rule) = rules::connector_rule(ty) else {
        return Err(ValidationError::UnknownConnectorType {
            value: spec.connector_type.clone(),
        });
    };

    if !rule.auth_methods.contains(&spec.auth_method.as_str()) {
        return Err(ValidationError::InvalidAuthMethod {
            connector_type: ty,
            auth_method: spec.auth_method.clone(),
        });
    }

    if spec.resource_types.is_empty() {
        return Err(ValidationError::field_error(
            "resource_types",
            "at least one resource type is required",
        ));
    }
    if let Some(bad) = spec
        .resource_types
        .iter()
        .find(|rt| !rule.resource_types.contains(&rt.as_str()))
    {
        return Err(ValidationError::InvalidResourceType {
            connector_type: ty,
            resource_type: bad.clone(),
        });
    }
    Ok(())
}

pub fn stack(spec: &StackSpec) -> Result<(), ValidationError> {
    name("name", &spec.name)?;
    for slot in spec.components.keys() {
        component_type(slot)?;
    }
    Ok(())
}

pub fn team(spec: &TeamSpec) -> Result<(), ValidationError> {
    name("name", &spec.name)
}

pub fn role_assignment(spec: &RoleAssignmentSpec) -> Result<(), ValidationError> {
    exactly_one(
        ("user_id", spec.user_id.is_some()),
        ("team_id", spec.team_id.is_some()),
    )?;
    if ResourceKind::from_str(&spec.resource_type).is_err() {
        return Err(ValidationError::field_error(
            "resource_type",
            format!(
                "'{}' is not one of project, stack, workspace",
                spec.resource_type
            ),
        ));
    }
    if spec.role.trim().is_empty() {
        return Err(ValidationError::field_error("role", "must not be empty"));
    }
    Ok(())
}
