// ── Diff engine ──
//
// Per-entity comparison of last-known remote state against a desired
// record. A field lands in the patch only when its desired value differs.
// Maps and sets are compared and sent whole. Optional scalars that the
// desired record leaves as `None` are not managed and never diffed.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{
    ChangeSet, ComponentPatch, ComponentSpec, ConnectorPatch, ConnectorSpec, EntityId,
    MembershipPlan, Project, ProjectPatch, ProjectSpec, RoleAssignment, RoleAssignmentPatch,
    RoleAssignmentSpec, ServiceConnector, Stack, StackComponent, StackPatch, StackSpec, Team,
    TeamPatch, TeamSpec, Workspace, WorkspacePatch, WorkspaceSpec,
};

/// What it takes to move a remote record to its desired state.
#[derive(Debug, Clone, PartialEq)]
pub enum Diff<P> {
    /// Nothing differs; no write call.
    Unchanged,
    /// A minimal in-place update.
    Update(P),
    /// An immutable field differs; the record must be replaced.
    Replace { fields: Vec<&'static str> },
}

impl<P: ChangeSet> Diff<P> {
    /// Immutable changes win over any mutable ones.
    pub fn from_parts(immutable: Vec<&'static str>, patch: P) -> Self {
        if !immutable.is_empty() {
            Self::Replace { fields: immutable }
        } else if patch.is_empty() {
            Self::Unchanged
        } else {
            Self::Update(patch)
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// Field names touched, whichever way they would be applied.
    pub fn fields(&self) -> Vec<&'static str> {
        match self {
            Self::Unchanged => Vec::new(),
            Self::Update(patch) => patch.changed_fields(),
            Self::Replace { fields } => fields.clone(),
        }
    }
}

// ── Field helpers ────────────────────────────────────────────────────

fn changed<T: PartialEq + Clone>(current: &T, desired: &T) -> Option<T> {
    (current != desired).then(|| desired.clone())
}

/// `None` in the desired record leaves the remote value alone.
fn changed_managed(current: Option<&String>, desired: Option<&String>) -> Option<String> {
    let desired = desired?;
    (current != Some(desired)).then(|| desired.clone())
}

/// Nullable references: `None` in the desired record clears the field.
fn changed_nullable<T: PartialEq + Clone>(
    current: Option<&T>,
    desired: Option<&T>,
) -> Option<Option<T>> {
    (current != desired).then(|| desired.cloned())
}

fn immutable(fields: &[(&'static str, bool)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter_map(|(field, differs)| differs.then_some(*field))
        .collect()
}

// ── Per-entity diffs ─────────────────────────────────────────────────

pub fn workspace(current: &Workspace, desired: &WorkspaceSpec) -> Diff<WorkspacePatch> {
    let patch = WorkspacePatch {
        name: changed(&current.name, &desired.name),
        display_name: changed_managed(
            current.display_name.as_ref(),
            desired.display_name.as_ref(),
        ),
        description: changed_managed(current.description.as_ref(), desired.description.as_ref()),
    };
    Diff::from_parts(
        immutable(&[("is_managed", current.is_managed != desired.is_managed)]),
        patch,
    )
}

pub fn project(current: &Project, desired: &ProjectSpec) -> Diff<ProjectPatch> {
    let patch = ProjectPatch {
        name: changed(&current.name, &desired.name),
        description: changed_managed(current.description.as_ref(), desired.description.as_ref()),
        tags: changed(&current.tags, &desired.tags),
        metadata: changed(&current.metadata, &desired.metadata),
    };
    Diff::from_parts(
        immutable(&[("workspace_id", current.workspace_id != desired.workspace_id)]),
        patch,
    )
}

pub fn component(current: &StackComponent, desired: &ComponentSpec) -> Diff<ComponentPatch> {
    let patch = ComponentPatch {
        name: changed(&current.name, &desired.name),
        configuration: changed(&current.configuration, &desired.configuration),
        connector: changed_nullable(current.connector.as_ref(), desired.connector.as_ref()),
        connector_resource_id: changed_nullable(
            current.connector_resource_id.as_ref(),
            desired.connector_resource_id.as_ref(),
        ),
        labels: changed(&current.labels, &desired.labels),
    };
    let current_type: &str = current.component_type.into();
    Diff::from_parts(
        immutable(&[
            ("type", current_type != desired.component_type),
            ("flavor", current.flavor != desired.flavor),
        ]),
        patch,
    )
}

/// Secret values are never read back, so they are compared by name.
/// They are resent when the set of names differs or when forced.
pub fn connector(current: &ServiceConnector, desired: &ConnectorSpec) -> Diff<ConnectorPatch> {
    let desired_keys: BTreeSet<&String> = desired.secrets.keys().collect();
    let current_keys: BTreeSet<&String> = current.secret_keys.iter().collect();
    let secrets_differ = !desired.secrets.is_empty() && desired_keys != current_keys;

    let patch = ConnectorPatch {
        name: changed(&current.name, &desired.name),
        resource_types: changed(&current.resource_types, &desired.resource_types),
        resource_id: changed_nullable(current.resource_id.as_ref(), desired.resource_id.as_ref()),
        configuration: changed(&current.configuration, &desired.configuration),
        secrets: (desired.force_secrets || secrets_differ).then(|| desired.secrets.clone()),
        labels: changed(&current.labels, &desired.labels),
    };
    let current_type: &str = current.connector_type.into();
    Diff::from_parts(
        immutable(&[
            ("connector_type", current_type != desired.connector_type),
            ("auth_method", current.auth_method != desired.auth_method),
        ]),
        patch,
    )
}

pub fn stack(current: &Stack, desired: &StackSpec) -> Diff<StackPatch> {
    let wanted = desired.typed_components();
    let wanted_view: BTreeMap<_, Vec<EntityId>> = wanted
        .iter()
        .map(|(slot, id)| (*slot, vec![id.clone()]))
        .collect();

    // An empty slot and an absent slot mean the same thing.
    let current_view: BTreeMap<_, &Vec<EntityId>> = current
        .components
        .iter()
        .filter(|(_, ids)| !ids.is_empty())
        .map(|(slot, ids)| (*slot, ids))
        .collect();
    let slots_differ = current_view.len() != wanted_view.len()
        || wanted_view
            .iter()
            .any(|(slot, ids)| current_view.get(slot) != Some(&ids));

    let patch = StackPatch {
        name: changed(&current.name, &desired.name),
        components: slots_differ.then_some(wanted),
        labels: changed(&current.labels, &desired.labels),
    };
    Diff::from_parts(Vec::new(), patch)
}

pub fn team(current: &Team, desired: &TeamSpec) -> Diff<TeamPatch> {
    let patch = TeamPatch {
        name: changed(&current.name, &desired.name),
        description: changed_managed(current.description.as_ref(), desired.description.as_ref()),
    };
    Diff::from_parts(Vec::new(), patch)
}

pub fn role_assignment(
    current: &RoleAssignment,
    desired: &RoleAssignmentSpec,
) -> Diff<RoleAssignmentPatch> {
    let patch = RoleAssignmentPatch {
        role: changed(&current.role, &desired.role),
    };
    let current_type: &str = current.resource_type.into();
    Diff::from_parts(
        immutable(&[
            ("resource_id", current.resource_id != desired.resource_id),
            ("resource_type", current_type != desired.resource_type),
            (
                "subject",
                desired.subject().as_ref() != Some(&current.subject),
            ),
        ]),
        patch,
    )
}

/// Users to add and remove to turn `current` into `desired`.
pub fn membership(current: &BTreeSet<EntityId>, desired: &BTreeSet<EntityId>) -> MembershipPlan {
    MembershipPlan {
        add: desired.difference(current).cloned().collect(),
        remove: current.difference(desired).cloned().collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::model::{ComponentType, ConnectorType, ResourceKind, Subject, WorkspaceStatus};

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    fn store() -> StackComponent {
        StackComponent {
            id: id("c1"),
            name: "test-store".into(),
            component_type: ComponentType::ArtifactStore,
            flavor: "local".into(),
            configuration: BTreeMap::from([("path".into(), json!("/tmp/a"))]),
            connector: None,
            connector_resource_id: None,
            labels: BTreeMap::from([("env".into(), "dev".into())]),
            created: None,
        }
    }

    fn store_spec() -> ComponentSpec {
        ComponentSpec {
            name: "test-store".into(),
            component_type: "artifact_store".into(),
            flavor: "local".into(),
            configuration: BTreeMap::from([("path".into(), json!("/tmp/a"))]),
            connector: None,
            connector_resource_id: None,
            labels: BTreeMap::from([("env".into(), "dev".into())]),
        }
    }

    fn aws() -> ServiceConnector {
        ServiceConnector {
            id: id("k1"),
            name: "aws".into(),
            connector_type: ConnectorType::Aws,
            auth_method: "secret-key".into(),
            resource_types: BTreeSet::from(["s3-bucket".into()]),
            resource_id: None,
            configuration: BTreeMap::from([("region".into(), json!("eu-west-1"))]),
            secret_keys: BTreeSet::from(["aws_secret_access_key".into()]),
            labels: BTreeMap::new(),
            expires_at: None,
            created: None,
        }
    }

    fn aws_spec() -> ConnectorSpec {
        ConnectorSpec {
            name: "aws".into(),
            connector_type: "aws".into(),
            auth_method: "secret-key".into(),
            resource_types: BTreeSet::from(["s3-bucket".into()]),
            resource_id: None,
            configuration: BTreeMap::from([("region".into(), json!("eu-west-1"))]),
            secrets: BTreeMap::from([(
                "aws_secret_access_key".into(),
                SecretString::from("s3cr3t"),
            )]),
            labels: BTreeMap::new(),
            force_secrets: false,
        }
    }

    fn assignment() -> RoleAssignment {
        RoleAssignment {
            id: id("ra1"),
            resource_id: id("stack-1"),
            resource_type: ResourceKind::Stack,
            subject: Subject::User(id("u1")),
            role: "admin".into(),
        }
    }

    fn assignment_spec() -> RoleAssignmentSpec {
        RoleAssignmentSpec {
            resource_id: id("stack-1"),
            resource_type: "stack".into(),
            user_id: Some(id("u1")),
            team_id: None,
            role: "admin".into(),
        }
    }

    // ── Reflexivity ──

    #[test]
    fn identical_records_diff_to_nothing() {
        assert!(component(&store(), &store_spec()).is_unchanged());
        assert!(connector(&aws(), &aws_spec()).is_unchanged());
        assert!(role_assignment(&assignment(), &assignment_spec()).is_unchanged());

        let ws = Workspace {
            id: id("w1"),
            name: "ml".into(),
            display_name: Some("ML".into()),
            description: None,
            is_managed: true,
            status: WorkspaceStatus::Available,
            server_url: None,
            created: None,
        };
        let ws_spec = WorkspaceSpec {
            name: "ml".into(),
            display_name: Some("ML".into()),
            description: None,
            is_managed: true,
        };
        assert!(workspace(&ws, &ws_spec).is_unchanged());

        let proj = Project {
            id: id("p1"),
            name: "churn".into(),
            workspace_id: id("w1"),
            description: Some("d".into()),
            tags: BTreeSet::from(["a".into()]),
            metadata: BTreeMap::from([("k".into(), json!(1))]),
            created: None,
        };
        let proj_spec = ProjectSpec {
            name: "churn".into(),
            workspace_id: id("w1"),
            description: Some("d".into()),
            tags: BTreeSet::from(["a".into()]),
            metadata: BTreeMap::from([("k".into(), json!(1))]),
        };
        assert!(project(&proj, &proj_spec).is_unchanged());

        let st = Stack {
            id: id("s1"),
            name: "prod".into(),
            components: BTreeMap::from([(ComponentType::ArtifactStore, vec![id("c1")])]),
            labels: BTreeMap::new(),
            created: None,
        };
        let st_spec = StackSpec {
            name: "prod".into(),
            components: BTreeMap::from([("artifact_store".into(), id("c1"))]),
            labels: BTreeMap::new(),
        };
        assert!(stack(&st, &st_spec).is_unchanged());

        let tm = Team {
            id: id("t1"),
            name: "ops".into(),
            description: None,
            members: BTreeSet::from([id("u1")]),
            member_count: 1,
        };
        let tm_spec = TeamSpec {
            name: "ops".into(),
            description: None,
            members: BTreeSet::from([id("u1")]),
        };
        assert!(team(&tm, &tm_spec).is_unchanged());
        assert!(membership(&tm.members, &tm_spec.members).is_empty());
    }

    // ── Field-level behaviour ──

    #[test]
    fn labels_are_replaced_whole() {
        let mut spec = store_spec();
        spec.labels.insert("team".into(), "ml".into());
        let Diff::Update(patch) = component(&store(), &spec) else {
            panic!("expected update");
        };
        assert_eq!(patch.changed_fields(), vec!["labels"]);
        assert_eq!(patch.labels.unwrap().len(), 2);
    }

    #[test]
    fn flavor_change_requires_replacement() {
        let mut spec = store_spec();
        spec.flavor = "s3".into();
        spec.name = "renamed".into();
        assert_eq!(
            component(&store(), &spec),
            Diff::Replace {
                fields: vec!["flavor"]
            }
        );
    }

    #[test]
    fn dropping_connector_clears_it() {
        let mut current = store();
        current.connector = Some(id("k1"));
        let Diff::Update(patch) = component(&current, &store_spec()) else {
            panic!("expected update");
        };
        assert_eq!(patch.connector, Some(None));
    }

    #[test]
    fn unmanaged_description_is_left_alone() {
        let mut tm = Team {
            id: id("t1"),
            name: "ops".into(),
            description: Some("set elsewhere".into()),
            members: BTreeSet::new(),
            member_count: 0,
        };
        let spec = TeamSpec {
            name: "ops".into(),
            description: None,
            members: BTreeSet::new(),
        };
        assert!(team(&tm, &spec).is_unchanged());
        tm.description = None;
        let managed = TeamSpec {
            description: Some("ours".into()),
            ..spec
        };
        assert_eq!(team(&tm, &managed).fields(), vec!["description"]);
    }

    #[test]
    fn secrets_resent_only_when_names_change_or_forced() {
        let mut spec = aws_spec();
        spec.secrets.insert("aws_session_token".into(), SecretString::from("t"));
        assert_eq!(connector(&aws(), &spec).fields(), vec!["secrets"]);

        let mut forced = aws_spec();
        forced.force_secrets = true;
        assert_eq!(connector(&aws(), &forced).fields(), vec!["secrets"]);

        let mut unmanaged = aws_spec();
        unmanaged.secrets.clear();
        assert!(connector(&aws(), &unmanaged).is_unchanged());
    }

    #[test]
    fn connector_immutable_fields() {
        let mut spec = aws_spec();
        spec.auth_method = "iam-role".into();
        let diff = connector(&aws(), &spec);
        assert!(matches!(diff, Diff::Replace { .. }));
        assert_eq!(diff.fields(), vec!["auth_method"]);
    }

    #[test]
    fn role_is_the_only_mutable_assignment_field() {
        let mut spec = assignment_spec();
        spec.role = "viewer".into();
        assert_eq!(role_assignment(&assignment(), &spec).fields(), vec!["role"]);

        let mut moved = assignment_spec();
        moved.user_id = None;
        moved.team_id = Some(id("t1"));
        moved.resource_id = id("stack-2");
        assert_eq!(
            role_assignment(&assignment(), &moved),
            Diff::Replace {
                fields: vec!["resource_id", "subject"]
            }
        );
    }

    #[test]
    fn extra_component_in_slot_is_a_change() {
        let st = Stack {
            id: id("s1"),
            name: "prod".into(),
            components: BTreeMap::from([(
                ComponentType::Orchestrator,
                vec![id("o1"), id("o2")],
            )]),
            labels: BTreeMap::new(),
            created: None,
        };
        let spec = StackSpec {
            name: "prod".into(),
            components: BTreeMap::from([("orchestrator".into(), id("o1"))]),
            labels: BTreeMap::new(),
        };
        let Diff::Update(patch) = stack(&st, &spec) else {
            panic!("expected update");
        };
        assert_eq!(
            patch.components,
            Some(BTreeMap::from([(ComponentType::Orchestrator, id("o1"))]))
        );
    }

    #[test]
    fn empty_slot_is_not_a_change() {
        let st = Stack {
            id: id("s1"),
            name: "prod".into(),
            components: BTreeMap::from([
                (ComponentType::ArtifactStore, vec![id("a1")]),
                (ComponentType::Orchestrator, Vec::new()),
            ]),
            labels: BTreeMap::new(),
            created: None,
        };
        let spec = StackSpec {
            name: "prod".into(),
            components: BTreeMap::from([("artifact_store".into(), id("a1"))]),
            labels: BTreeMap::new(),
        };
        assert!(stack(&st, &spec).is_unchanged());
    }

    #[test]
    fn membership_plan_adds_and_removes() {
        let current = BTreeSet::from([id("u1"), id("u2")]);
        let desired = BTreeSet::from([id("u2"), id("u3")]);
        let plan = membership(&current, &desired);
        assert_eq!(plan.add, vec![id("u3")]);
        assert_eq!(plan.remove, vec![id("u1")]);
        assert_eq!(plan.len(), 2);
    }
}
