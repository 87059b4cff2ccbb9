// ── Compatibility tables ──
//
// Immutable rule data consulted by the validators. Supporting a new
// flavor or connector type means adding a row here; no validator code
// branches on a particular type.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::model::{ComponentType, ConnectorType};

/// One recognised `(component type, flavor)` pair and the configuration
/// keys its schema accepts.
#[derive(Debug)]
pub struct FlavorRule {
    pub component_type: ComponentType,
    pub flavor: &'static str,
    pub config_keys: &'static [&'static str],
}

/// Allowed auth methods and resource types for one connector type.
#[derive(Debug)]
pub struct ConnectorRule {
    pub connector_type: ConnectorType,
    pub auth_methods: &'static [&'static str],
    pub resource_types: &'static [&'static str],
}

macro_rules! flavor {
    ($ty:ident, $flavor:literal, [$($key:literal),* $(,)?]) => {
        FlavorRule {
            component_type: ComponentType::$ty,
            flavor: $flavor,
            config_keys: &[$($key),*],
        }
    };
}

pub static FLAVOR_RULES: &[FlavorRule] = &[
    // ── Alerters ──
    flavor!(Alerter, "slack", ["slack_token", "default_slack_channel_id"]),
    flavor!(Alerter, "discord", ["discord_token", "default_discord_channel_id"]),
    // ── Annotators ──
    flavor!(Annotator, "label_studio", ["instance_url", "port", "api_key", "project_name"]),
    // ── Artifact stores ──
    flavor!(ArtifactStore, "local", ["path"]),
    flavor!(
        ArtifactStore,
        "s3",
        ["path", "key", "secret", "token", "client_kwargs", "config_kwargs", "s3_additional_kwargs"]
    ),
    flavor!(ArtifactStore, "gcp", ["path"]),
    flavor!(ArtifactStore, "azure", ["path"]),
    // ── Container registries ──
    flavor!(ContainerRegistry, "default", ["uri"]),
    flavor!(ContainerRegistry, "dockerhub", ["uri"]),
    flavor!(ContainerRegistry, "aws", ["uri", "default_repository"]),
    flavor!(ContainerRegistry, "gcp", ["uri"]),
    flavor!(ContainerRegistry, "azure", ["uri"]),
    flavor!(ContainerRegistry, "github", ["uri"]),
    // ── Data validators ──
    flavor!(DataValidator, "great_expectations", ["context_root_dir", "context_config"]),
    flavor!(DataValidator, "deepchecks", []),
    flavor!(DataValidator, "evidently", []),
    // ── Experiment trackers ──
    flavor!(
        ExperimentTracker,
        "mlflow",
        ["tracking_uri", "tracking_username", "tracking_password", "tracking_token"]
    ),
    flavor!(ExperimentTracker, "wandb", ["api_key", "entity", "project_name"]),
    flavor!(ExperimentTracker, "neptune", ["project", "api_token"]),
    flavor!(ExperimentTracker, "comet", ["api_key", "project_name", "workspace"]),
    // ── Feature stores ──
    flavor!(FeatureStore, "feast", ["online_host", "online_port", "feast_repo"]),
    // ── Image builders ──
    flavor!(ImageBuilder, "local", []),
    flavor!(
        ImageBuilder,
        "kaniko",
        ["kubernetes_context", "kubernetes_namespace", "executor_image"]
    ),
    flavor!(ImageBuilder, "gcp", ["project", "cloud_builder_image"]),
    // ── Model deployers ──
    flavor!(ModelDeployer, "mlflow", ["service_path"]),
    flavor!(ModelDeployer, "seldon", ["kubernetes_context", "kubernetes_namespace", "base_url"]),
    flavor!(ModelDeployer, "bentoml", ["service_path"]),
    // ── Model registries ──
    flavor!(ModelRegistry, "mlflow", []),
    // ── Orchestrators ──
    flavor!(Orchestrator, "local", []),
    flavor!(Orchestrator, "local_docker", []),
    flavor!(
        Orchestrator,
        "kubernetes",
        ["kubernetes_context", "kubernetes_namespace", "synchronous", "incluster"]
    ),
    flavor!(Orchestrator, "kubeflow", ["kubernetes_context", "kubeflow_hostname", "synchronous"]),
    flavor!(Orchestrator, "airflow", ["local"]),
    flavor!(Orchestrator, "sagemaker", ["execution_role", "synchronous"]),
    flavor!(
        Orchestrator,
        "vertex",
        ["project", "location", "workload_service_account", "synchronous"]
    ),
    // ── Step operators ──
    flavor!(StepOperator, "sagemaker", ["role", "instance_type", "experiment_name"]),
    flavor!(StepOperator, "vertex", ["project", "region", "machine_type"]),
    flavor!(
        StepOperator,
        "azureml",
        ["subscription_id", "resource_group", "workspace_name", "compute_target_name"]
    ),
    flavor!(StepOperator, "kubernetes", ["kubernetes_namespace", "service_account_name"]),
];

pub static CONNECTOR_RULES: &[ConnectorRule] = &[
    ConnectorRule {
        connector_type: ConnectorType::Aws,
        auth_methods: &[
            "implicit",
            "secret-key",
            "sts-token",
            "iam-role",
            "session-token",
            "federation-token",
        ],
        resource_types: &["aws-generic", "s3-bucket", "kubernetes-cluster", "docker-registry"],
    },
    ConnectorRule {
        connector_type: ConnectorType::Gcp,
        auth_methods: &[
            "implicit",
            "user-account",
            "service-account",
            "external-account",
            "oauth2-token",
            "impersonation",
        ],
        resource_types: &["gcp-generic", "gcs-bucket", "kubernetes-cluster", "docker-registry"],
    },
    ConnectorRule {
        connector_type: ConnectorType::Azure,
        auth_methods: &["implicit", "service-principal", "access-token"],
        resource_types: &[
            "azure-generic",
            "blob-container",
            "kubernetes-cluster",
            "docker-registry",
        ],
    },
    ConnectorRule {
        connector_type: ConnectorType::Kubernetes,
        auth_methods: &["password", "token"],
        resource_types: &["kubernetes-cluster"],
    },
    ConnectorRule {
        connector_type: ConnectorType::Docker,
        auth_methods: &["password"],
        resource_types: &["docker-registry"],
    },
    ConnectorRule {
        connector_type: ConnectorType::Hyperai,
        auth_methods: &["rsa-key", "dsa-key", "ecdsa-key", "ed25519-key"],
        resource_types: &["hyperai-instance"],
    },
];

// ── Indices ──────────────────────────────────────────────────────────

static FLAVOR_INDEX: LazyLock<HashMap<(ComponentType, &'static str), &'static FlavorRule>> =
    LazyLock::new(|| {
        FLAVOR_RULES
            .iter()
            .map(|rule| ((rule.component_type, rule.flavor), rule))
            .collect()
    });

static CONNECTOR_INDEX: LazyLock<HashMap<ConnectorType, &'static ConnectorRule>> =
    LazyLock::new(|| {
        CONNECTOR_RULES
            .iter()
            .map(|rule| (rule.connector_type, rule))
            .collect()
    });

static CONFIG_KEY_INDEX: LazyLock<HashMap<(ComponentType, &'static str), HashSet<&'static str>>> =
    LazyLock::new(|| {
        FLAVOR_RULES
            .iter()
            .map(|rule| {
                (
                    (rule.component_type, rule.flavor),
                    rule.config_keys.iter().copied().collect(),
                )
            })
            .collect()
    });

// ── Lookups ──────────────────────────────────────────────────────────

pub fn flavor_rule(component_type: ComponentType, flavor: &str) -> Option<&'static FlavorRule> {
    FLAVOR_INDEX.get(&(component_type, flavor)).copied()
}

/// Flavors recognised for a component type, in table order.
pub fn flavors_for(component_type: ComponentType) -> Vec<&'static str> {
    FLAVOR_RULES
        .iter()
        .filter(|rule| rule.component_type == component_type)
        .map(|rule| rule.flavor)
        .collect()
}

/// Whether `key` belongs to the configuration schema of a known pair.
/// Unknown pairs accept nothing.
pub fn accepts_config_key(component_type: ComponentType, flavor: &str, key: &str) -> bool {
    CONFIG_KEY_INDEX
        .get(&(component_type, flavor))
        .is_some_and(|keys| keys.contains(key))
}

pub fn connector_rule(connector_type: ConnectorType) -> Option<&'static ConnectorRule> {
    CONNECTOR_INDEX.get(&connector_type).copied()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn every_component_type_has_a_flavor() {
        for ty in ComponentType::iter() {
            assert!(!flavors_for(ty).is_empty(), "{ty} has no flavors");
        }
    }

    #[test]
    fn every_connector_type_has_a_rule() {
        for ty in ConnectorType::iter() {
            let rule = connector_rule(ty);
            assert!(
                rule.is_some_and(|r| !r.auth_methods.is_empty() && !r.resource_types.is_empty()),
                "{ty} has no usable connector rule"
            );
        }
    }

    #[test]
    fn flavor_pairs_are_unique() {
        let mut seen = HashSet::new();
        for rule in FLAVOR_RULES {
            assert!(
                seen.insert((rule.component_type, rule.flavor)),
                "duplicate row {}/{}",
                rule.component_type,
                rule.flavor
            );
        }
        assert_eq!(FLAVOR_INDEX.len(), FLAVOR_RULES.len());
    }

    #[test]
    fn config_keys_follow_the_pair() {
        assert!(accepts_config_key(ComponentType::ArtifactStore, "local", "path"));
        assert!(!accepts_config_key(ComponentType::ArtifactStore, "local", "uri"));
        assert!(accepts_config_key(ComponentType::ContainerRegistry, "default", "uri"));
        assert!(!accepts_config_key(ComponentType::ArtifactStore, "dockerhub", "uri"));
    }

    #[test]
    fn same_flavor_name_differs_by_type() {
        assert!(flavor_rule(ComponentType::Orchestrator, "sagemaker").is_some());
        assert!(flavor_rule(ComponentType::StepOperator, "sagemaker").is_some());
        assert!(flavor_rule(ComponentType::ArtifactStore, "sagemaker").is_none());
    }
}
