//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use zenform_config::ConfigError;
use zenform_core::{CoreError, EntityKind, StoreError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to server at {url}")]
    #[diagnostic(
        code(zenform::connection_failed),
        help(
            "Check that the server is running and reachable.\n\
             Try: zenform get server --insecure"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: StoreError,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed for profile '{profile}'")]
    #[diagnostic(
        code(zenform::auth_failed),
        help("Verify the API key or token configured for this profile.")
    )]
    AuthFailed { profile: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(zenform::no_credentials),
        help(
            "Set api_key_env or api_token_env in the profile, store a key in the\n\
             keyring under '{profile}/api-key', or export ZENML_API_KEY."
        )
    )]
    NoCredentials { profile: String },

    // ── Lookups ──────────────────────────────────────────────────────
    #[error("{kind} '{identifier}' not found")]
    #[diagnostic(code(zenform::not_found))]
    NotFound {
        kind: EntityKind,
        identifier: String,
    },

    #[error("{count} {kind} records are named '{name}'")]
    #[diagnostic(
        code(zenform::ambiguous),
        help("Pin the entry with an explicit `id:` in the manifest.")
    )]
    Ambiguous {
        kind: EntityKind,
        name: String,
        count: usize,
    },

    // ── Manifest ─────────────────────────────────────────────────────
    #[error("Cannot read manifest {path}: {reason}")]
    #[diagnostic(code(zenform::manifest))]
    Manifest { path: String, reason: String },

    #[error("Reference name:{name} does not match any {kind} in the manifest")]
    #[diagnostic(
        code(zenform::unresolved_name),
        help("Declare the {kind} in the same manifest, or reference it by id.")
    )]
    UnresolvedName { kind: EntityKind, name: String },

    #[error("{kind} '{name}' is declared more than once")]
    #[diagnostic(code(zenform::duplicate))]
    Duplicate { kind: EntityKind, name: String },

    #[error("{kind} '{name}': invalid {field}: {reason}")]
    #[diagnostic(code(zenform::invalid_entry))]
    InvalidEntry {
        kind: EntityKind,
        name: String,
        field: &'static str,
        reason: String,
    },

    #[error("{count} manifest entries failed validation")]
    #[diagnostic(
        code(zenform::invalid_manifest),
        help("Nothing was sent to the server.")
    )]
    InvalidManifest { count: usize },

    // ── Reconciliation ───────────────────────────────────────────────
    #[error("{failed} of {total} entities did not converge")]
    #[diagnostic(
        code(zenform::not_converged),
        help("Transient failures may succeed on the next run; fix the others first.")
    )]
    NotConverged { failed: usize, total: usize },

    #[error("{0}")]
    #[diagnostic(code(zenform::conflict))]
    Conflict(CoreError),

    #[error("{0}")]
    #[diagnostic(code(zenform::remote))]
    Remote(CoreError),

    #[error("{0}")]
    #[diagnostic(code(zenform::api_error))]
    Api(#[from] zenform_api::Error),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(zenform::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(zenform::profile_not_found),
        help("Expected a [profiles.{name}] table in {path}")
    )]
    ProfileNotFound { name: String, path: String },

    #[error(transparent)]
    #[diagnostic(code(zenform::config))]
    Config(Box<figment::Error>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(zenform::confirmation_required),
        help("Re-run with --yes (-y) to proceed.")
    )]
    ConfirmationRequired { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(
        code(zenform::timeout),
        help("Increase the deadline with --pass-timeout or check server responsiveness.")
    )]
    Timeout(CoreError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict(_) => exit_code::CONFLICT,
            Self::Timeout(_) => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::Manifest { .. }
            | Self::UnresolvedName { .. }
            | Self::Duplicate { .. }
            | Self::InvalidEntry { .. }
            | Self::InvalidManifest { .. }
            | Self::ProfileNotFound { .. }
            | Self::ConfirmationRequired { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                path: zenform_config::config_path().display().to_string(),
            },
            ConfigError::Figment(err) => Self::Config(err),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed {
                source: StoreError::Unauthorized,
                ..
            } => Self::AuthFailed {
                profile: "current".into(),
            },
            CoreError::ConnectionFailed { url, source } => Self::ConnectionFailed { url, source },
            CoreError::NotFound { kind, name } => Self::NotFound {
                kind,
                identifier: name,
            },
            CoreError::Ambiguous { kind, name, count } => Self::Ambiguous { kind, name, count },
            CoreError::Validation { entity, source } => Self::Validation {
                field: source.field().into(),
                reason: format!("{entity}: {source}"),
            },
            err @ CoreError::Transient {
                source: StoreError::Timeout,
                ..
            } => Self::Timeout(err),
            err @ (CoreError::ImmutableFieldChanged { .. }
            | CoreError::Permanent {
                source: StoreError::Rejected {
                    status: Some(409), ..
                },
                ..
            }) => Self::Conflict(err),
            err => Self::Remote(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use zenform_core::{EntityId, EntityRef};

    use super::*;

    #[test]
    fn remote_failures_map_to_exit_codes() {
        let entity = EntityRef::known(EntityKind::Stack, EntityId::from("s1"));

        let timeout = CliError::from(CoreError::Transient {
            entity: entity.clone(),
            source: StoreError::Timeout,
        });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let replace = CliError::from(CoreError::ImmutableFieldChanged {
            entity: entity.clone(),
            fields: vec!["flavor"],
        });
        assert_eq!(replace.exit_code(), exit_code::CONFLICT);

        let unavailable = CliError::from(CoreError::Transient {
            entity,
            source: StoreError::Unavailable {
                status: Some(503),
                message: "down".into(),
            },
        });
        assert_eq!(unavailable.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn unauthorized_connect_is_an_auth_failure() {
        let err = CliError::from(CoreError::ConnectionFailed {
            url: "https://zen.example.com".into(),
            source: StoreError::Unauthorized,
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
