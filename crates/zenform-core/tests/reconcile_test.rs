#![allow(clippy::unwrap_used)]
// Reconciler scenarios against the in-memory store.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;

use zenform_core::model::{ConnectorSpec, Stack};
use zenform_core::{
    Action, ComponentSpec, ComponentType, CoreError, EntityId, EntityKind, MembershipOp,
    MemoryStore, Outcome, PlannedAction, Project, ProjectSpec, ReconcileContext, RoleAssignment,
    RoleAssignmentSpec, ServiceConnector, StackComponent, StackSpec, StoreError, Team, TeamSpec,
    ValidationError, Verb, Workspace, WorkspaceSpec, WorkspaceStatus,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn ctx(store: &MemoryStore) -> ReconcileContext<'_, MemoryStore> {
    ReconcileContext::with_timeout(store, Duration::from_secs(30))
}

fn artifact_store(name: &str) -> ComponentSpec {
    ComponentSpec {
        name: name.into(),
        component_type: "artifact_store".into(),
        flavor: "local".into(),
        configuration: BTreeMap::from([("path".into(), json!("/tmp/artifacts"))]),
        connector: None,
        connector_resource_id: None,
        labels: BTreeMap::new(),
    }
}

fn local_orchestrator(name: &str) -> ComponentSpec {
    ComponentSpec {
        name: name.into(),
        component_type: "orchestrator".into(),
        flavor: "local".into(),
        configuration: BTreeMap::new(),
        connector: None,
        connector_resource_id: None,
        labels: BTreeMap::new(),
    }
}

fn aws_connector(auth_method: &str) -> ConnectorSpec {
    ConnectorSpec {
        name: "aws-prod".into(),
        connector_type: "aws".into(),
        auth_method: auth_method.into(),
        resource_types: BTreeSet::from(["s3-bucket".into()]),
        resource_id: None,
        configuration: BTreeMap::from([("region".into(), json!("eu-west-1"))]),
        secrets: BTreeMap::from([
            ("aws_access_key_id".into(), SecretString::from("AKIA-test")),
            ("aws_secret_access_key".into(), SecretString::from("shh")),
        ]),
        labels: BTreeMap::new(),
        force_secrets: false,
    }
}

fn stack_spec(name: &str, components: &[(&str, &EntityId)]) -> StackSpec {
    StackSpec {
        name: name.into(),
        components: components
            .iter()
            .map(|(slot, id)| ((*slot).to_owned(), (*id).clone()))
            .collect(),
        labels: BTreeMap::new(),
    }
}

fn team_spec(members: &[&EntityId]) -> TeamSpec {
    TeamSpec {
        name: "ml-platform".into(),
        description: Some("Platform team".into()),
        members: members.iter().map(|id| (*id).clone()).collect(),
    }
}

fn seeded_stack(store: &MemoryStore, id: &str) -> EntityId {
    let id = EntityId::from(id);
    store.seed(Stack {
        id: id.clone(),
        name: format!("stack-{id}"),
        components: BTreeMap::new(),
        labels: BTreeMap::new(),
        created: None,
    });
    id
}

fn present<R>(outcome: Outcome<R>) -> (Action, R) {
    match outcome {
        Outcome::Present { action, entity } => (action, entity),
        Outcome::Missing { id } => panic!("expected a record, {id} is missing"),
        Outcome::Deleted { id } => panic!("expected a record, {id} was deleted"),
    }
}

// ── Stack components ────────────────────────────────────────────────

#[tokio::test]
async fn test_component_create_read_and_noop_update() {
    let store = MemoryStore::new();
    let components = ctx(&store).reconciler::<StackComponent>();
    let spec = artifact_store("test-store");

    let (action, created) = present(components.create(&spec).await.unwrap());
    assert_eq!(action, Action::Created);
    assert!(created.id.as_uuid().is_some());

    let (_, read) = present(components.read(&created.id).await.unwrap());
    assert_eq!(read.component_type, ComponentType::ArtifactStore);
    assert_eq!(read.flavor, "local");

    let (action, _) = present(components.update(&created.id, &spec).await.unwrap());
    assert_eq!(action, Action::Unchanged);
    assert_eq!(store.calls(Verb::Update, EntityKind::StackComponent), 0);
    assert_eq!(store.calls(Verb::Create, EntityKind::StackComponent), 1);
}

#[tokio::test]
async fn test_component_update_sends_only_changed_fields() {
    let store = MemoryStore::new();
    let components = ctx(&store).reconciler::<StackComponent>();
    let mut spec = artifact_store("test-store");
    let (_, created) = present(components.create(&spec).await.unwrap());

    spec.labels.insert("team".into(), "ml".into());
    let (action, updated) = present(components.update(&created.id, &spec).await.unwrap());

    assert_eq!(action, Action::Updated);
    assert_eq!(updated.labels["team"], "ml");
    assert_eq!(updated.configuration, spec.configuration);
    assert_eq!(store.calls(Verb::Update, EntityKind::StackComponent), 1);
}

#[tokio::test]
async fn test_component_flavor_change_requires_replacement() {
    let store = MemoryStore::new();
    let components = ctx(&store).reconciler::<StackComponent>();
    let (_, created) = present(components.create(&artifact_store("s")).await.unwrap());

    let mut spec = artifact_store("s");
    spec.flavor = "s3".into();
    spec.configuration.clear();
    let err = components.update(&created.id, &spec).await.unwrap_err();

    match err {
        CoreError::ImmutableFieldChanged { fields, .. } => assert_eq!(fields, vec!["flavor"]),
        other => panic!("expected ImmutableFieldChanged, got {other:?}"),
    }
    assert_eq!(store.calls(Verb::Update, EntityKind::StackComponent), 0);
}

#[tokio::test]
async fn test_invalid_component_never_reaches_the_store() {
    let store = MemoryStore::new();
    let mut spec = artifact_store("s");
    spec.configuration.insert("pth".into(), json!("/typo"));

    let err = ctx(&store)
        .reconciler::<StackComponent>()
        .create(&spec)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::Validation {
            source: ValidationError::UnknownConfigKey { .. },
            ..
        }
    ));
    assert_eq!(store.writes(), 0);
}

// ── Service connectors ──────────────────────────────────────────────

#[tokio::test]
async fn test_connector_with_valid_auth_method_is_created() {
    let store = MemoryStore::new();
    let connectors = ctx(&store).reconciler::<ServiceConnector>();

    let (_, created) = present(connectors.create(&aws_connector("secret-key")).await.unwrap());

    assert_eq!(created.auth_method, "secret-key");
    assert_eq!(
        created.secret_keys,
        BTreeSet::from(["aws_access_key_id".into(), "aws_secret_access_key".into()])
    );
}

#[tokio::test]
async fn test_connector_with_unknown_auth_method_is_rejected() {
    let store = MemoryStore::new();
    let err = ctx(&store)
        .reconciler::<ServiceConnector>()
        .create(&aws_connector("password"))
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("password"), "{message}");
    assert!(message.contains("aws"), "{message}");
    assert_eq!(store.calls(Verb::Create, EntityKind::ServiceConnector), 0);
}

#[tokio::test]
async fn test_connector_secrets_are_compared_by_name() {
    let store = MemoryStore::new();
    let connectors = ctx(&store).reconciler::<ServiceConnector>();
    let mut spec = aws_connector("secret-key");
    let (_, created) = present(connectors.create(&spec).await.unwrap());

    // Same names, new values: nothing to send unless forced.
    spec.secrets
        .insert("aws_secret_access_key".into(), SecretString::from("rotated"));
    assert_eq!(
        connectors.plan(&spec, Some(&created.id)).await.unwrap(),
        PlannedAction::Unchanged
    );

    spec.force_secrets = true;
    assert_eq!(
        connectors.plan(&spec, Some(&created.id)).await.unwrap(),
        PlannedAction::Update {
            fields: vec!["secrets"]
        }
    );
}

// ── Stacks ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stack_with_unknown_component_is_unresolved() {
    let store = MemoryStore::new();
    let missing = EntityId::from("nonexistent-id");

    let err = ctx(&store)
        .reconciler::<Stack>()
        .create(&stack_spec("prod", &[("artifact_store", &missing)]))
        .await
        .unwrap_err();

    match err {
        CoreError::UnresolvedReference { reference, .. } => {
            assert_eq!(reference.kind, EntityKind::StackComponent);
            assert_eq!(reference.id, Some(missing));
        }
        other => panic!("expected UnresolvedReference, got {other:?}"),
    }
    assert_eq!(store.calls(Verb::Create, EntityKind::Stack), 0);
}

#[tokio::test]
async fn test_stack_slot_must_match_component_type() {
    let store = MemoryStore::new();
    let ctx = ctx(&store);
    let (_, orchestrator) = present(
        ctx.reconciler::<StackComponent>()
            .create(&local_orchestrator("default"))
            .await
            .unwrap(),
    );

    let err = ctx
        .reconciler::<Stack>()
        .create(&stack_spec("prod", &[("artifact_store", &orchestrator.id)]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::Validation {
            source: ValidationError::ComponentSlotMismatch {
                slot: ComponentType::ArtifactStore,
                actual: ComponentType::Orchestrator,
                ..
            },
            ..
        }
    ));
}

#[tokio::test]
async fn test_stack_swaps_components_in_one_update() {
    let store = MemoryStore::new();
    let ctx = ctx(&store);
    let components = ctx.reconciler::<StackComponent>();
    let (_, first) = present(components.create(&artifact_store("a")).await.unwrap());
    let (_, second) = present(components.create(&artifact_store("b")).await.unwrap());
    let (_, orchestrator) = present(
        components
            .create(&local_orchestrator("default"))
            .await
            .unwrap(),
    );

    let stacks = ctx.reconciler::<Stack>();
    let spec = stack_spec(
        "prod",
        &[("artifact_store", &first.id), ("orchestrator", &orchestrator.id)],
    );
    let (_, stack) = present(stacks.create(&spec).await.unwrap());
    assert_eq!(stack.component(ComponentType::ArtifactStore), Some(&first.id));

    let swapped = stack_spec(
        "prod",
        &[("artifact_store", &second.id), ("orchestrator", &orchestrator.id)],
    );
    assert_eq!(
        stacks.plan(&swapped, Some(&stack.id)).await.unwrap(),
        PlannedAction::Update {
            fields: vec!["components"]
        }
    );
    let (action, stack) = present(stacks.update(&stack.id, &swapped).await.unwrap());
    assert_eq!(action, Action::Updated);
    assert_eq!(stack.component(ComponentType::ArtifactStore), Some(&second.id));
    assert_eq!(store.calls(Verb::Update, EntityKind::Stack), 1);
}

// ── Role assignments ────────────────────────────────────────────────

#[tokio::test]
async fn test_role_assignment_with_both_subjects_is_rejected() {
    let store = MemoryStore::new();
    let spec = RoleAssignmentSpec {
        resource_id: "stack-1".into(),
        resource_type: "stack".into(),
        user_id: Some("u1".into()),
        team_id: Some("t1".into()),
        role: "admin".into(),
    };

    let err = ctx(&store)
        .reconciler::<RoleAssignment>()
        .create(&spec)
        .await
        .unwrap_err();

    match err {
        CoreError::Validation {
            source: ValidationError::MutualExclusion { first, second, both_set },
            ..
        } => {
            assert_eq!((first, second, both_set), ("user_id", "team_id", true));
        }
        other => panic!("expected MutualExclusion, got {other:?}"),
    }
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_role_assignment_role_is_updated_in_place() {
    let store = MemoryStore::new();
    let stack = seeded_stack(&store, "stack-1");
    let user = store.add_user("alice");
    let assignments = ctx(&store).reconciler::<RoleAssignment>();

    let mut spec = RoleAssignmentSpec {
        resource_id: stack.clone(),
        resource_type: "stack".into(),
        user_id: Some(user),
        team_id: None,
        role: "viewer".into(),
    };
    let (_, created) = present(assignments.create(&spec).await.unwrap());

    spec.role = "admin".into();
    let (action, updated) = present(assignments.update(&created.id, &spec).await.unwrap());
    assert_eq!(action, Action::Updated);
    assert_eq!(updated.role, "admin");

    spec.resource_id = seeded_stack(&store, "stack-2");
    let err = assignments.update(&created.id, &spec).await.unwrap_err();
    assert!(matches!(err, CoreError::ImmutableFieldChanged { .. }));
}

#[tokio::test]
async fn test_role_assignment_for_unknown_user_is_unresolved() {
    let store = MemoryStore::new();
    let stack = seeded_stack(&store, "stack-1");
    let spec = RoleAssignmentSpec {
        resource_id: stack,
        resource_type: "stack".into(),
        user_id: Some("ghost".into()),
        team_id: None,
        role: "viewer".into(),
    };

    let err = ctx(&store)
        .reconciler::<RoleAssignment>()
        .create(&spec)
        .await
        .unwrap_err();

    match err {
        CoreError::UnresolvedReference { reference, .. } => {
            assert_eq!(reference.kind, EntityKind::User);
        }
        other => panic!("expected UnresolvedReference, got {other:?}"),
    }
}

// ── Teams ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_team_members_converge() {
    let store = MemoryStore::new();
    let alice = store.add_user("alice");
    let bob = store.add_user("bob");
    let carol = store.add_user("carol");
    let teams = ctx(&store).reconciler::<Team>();

    let (_, team) = present(teams.create(&team_spec(&[&alice, &bob])).await.unwrap());
    assert_eq!(team.members, BTreeSet::from([alice.clone(), bob.clone()]));
    assert_eq!(team.member_count, 2);

    let (action, team) = present(
        teams
            .update(&team.id, &team_spec(&[&bob, &carol]))
            .await
            .unwrap(),
    );
    assert_eq!(action, Action::Updated);
    assert_eq!(team.members, BTreeSet::from([bob, carol]));
    assert_eq!(team.member_count, 2);
    assert_eq!(store.calls(Verb::AddMember, EntityKind::Team), 3);
    assert_eq!(store.calls(Verb::RemoveMember, EntityKind::Team), 1);
    // Membership alone never triggers a field update.
    assert_eq!(store.calls(Verb::Update, EntityKind::Team), 0);
}

#[tokio::test]
async fn test_team_partial_membership_failure_is_reported() {
    let store = MemoryStore::new();
    let alice = store.add_user("alice");
    let bob = store.add_user("bob");
    let teams = ctx(&store).reconciler::<Team>();
    let spec = team_spec(&[&alice, &bob]);

    store.fail_next(
        Verb::AddMember,
        EntityKind::Team,
        StoreError::Unavailable {
            status: Some(503),
            message: "busy".into(),
        },
    );
    let err = teams.create(&spec).await.unwrap_err();

    let (team, failures) = match err {
        CoreError::PartialMembership { team, failures } => (team, failures),
        other => panic!("expected PartialMembership, got {other:?}"),
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].op, MembershipOp::Add);

    // The next pass converges the remainder.
    let id = team.id.unwrap();
    let (_, converged) = present(teams.update(&id, &spec).await.unwrap());
    assert_eq!(converged.members, BTreeSet::from([alice, bob]));
    assert_eq!(converged.member_count, 2);
}

#[tokio::test]
async fn test_team_with_unknown_member_is_never_created() {
    let store = MemoryStore::new();
    let ghost = EntityId::from("ghost");

    let err = ctx(&store)
        .reconciler::<Team>()
        .create(&team_spec(&[&ghost]))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::UnresolvedReference { .. }));
    assert_eq!(store.count::<Team>(), 0);
}

// ── Projects ────────────────────────────────────────────────────────

fn workspace_spec(name: &str) -> WorkspaceSpec {
    WorkspaceSpec {
        name: name.into(),
        display_name: None,
        description: None,
        is_managed: true,
    }
}

fn project_spec(name: &str, workspace_id: &EntityId) -> ProjectSpec {
    ProjectSpec {
        name: name.into(),
        workspace_id: workspace_id.clone(),
        description: Some("Churn prediction".into()),
        tags: BTreeSet::from(["ml".into()]),
        metadata: BTreeMap::from([("owner".into(), json!("data-team"))]),
    }
}

#[tokio::test]
async fn test_project_create_then_reapply_is_unchanged() {
    let store = MemoryStore::new();
    let ctx = ctx(&store);
    let (_, ws) = present(
        ctx.reconciler::<Workspace>()
            .create(&workspace_spec("research"))
            .await
            .unwrap(),
    );
    let projects = ctx.reconciler::<Project>();
    let spec = project_spec("churn", &ws.id);

    let (action, created) = present(projects.create(&spec).await.unwrap());
    assert_eq!(action, Action::Created);
    assert_eq!(created.workspace_id, ws.id);
    assert_eq!(created.tags, spec.tags);

    let (action, _) = present(projects.update(&created.id, &spec).await.unwrap());
    assert_eq!(action, Action::Unchanged);
    assert_eq!(store.calls(Verb::Update, EntityKind::Project), 0);
}

#[tokio::test]
async fn test_project_in_unknown_workspace_is_unresolved() {
    let store = MemoryStore::new();
    let missing = EntityId::generate();

    let err = ctx(&store)
        .reconciler::<Project>()
        .create(&project_spec("churn", &missing))
        .await
        .unwrap_err();

    match err {
        CoreError::UnresolvedReference { reference, .. } => {
            assert_eq!(reference.kind, EntityKind::Workspace);
            assert_eq!(reference.id, Some(missing));
        }
        other => panic!("expected UnresolvedReference, got {other:?}"),
    }
    assert_eq!(store.count::<Project>(), 0);
}

#[tokio::test]
async fn test_project_moving_workspace_requires_replacement() {
    let store = MemoryStore::new();
    let ctx = ctx(&store);
    let workspaces = ctx.reconciler::<Workspace>();
    let (_, first) = present(workspaces.create(&workspace_spec("a")).await.unwrap());
    let (_, second) = present(workspaces.create(&workspace_spec("b")).await.unwrap());
    let projects = ctx.reconciler::<Project>();
    let (_, created) = present(
        projects
            .create(&project_spec("churn", &first.id))
            .await
            .unwrap(),
    );

    let err = projects
        .update(&created.id, &project_spec("churn", &second.id))
        .await
        .unwrap_err();

    match err {
        CoreError::ImmutableFieldChanged { fields, .. } => {
            assert_eq!(fields, vec!["workspace_id"]);
        }
        other => panic!("expected ImmutableFieldChanged, got {other:?}"),
    }
    assert_eq!(store.calls(Verb::Update, EntityKind::Project), 0);
}

#[tokio::test]
async fn test_project_tag_change_patches_only_tags() {
    let store = MemoryStore::new();
    let ctx = ctx(&store);
    let (_, ws) = present(
        ctx.reconciler::<Workspace>()
            .create(&workspace_spec("research"))
            .await
            .unwrap(),
    );
    let projects = ctx.reconciler::<Project>();
    let mut spec = project_spec("churn", &ws.id);
    let (_, created) = present(projects.create(&spec).await.unwrap());

    spec.tags.insert("prod".into());
    let planned = projects.plan(&spec, Some(&created.id)).await.unwrap();
    assert_eq!(
        planned,
        PlannedAction::Update {
            fields: vec!["tags"]
        }
    );

    let (action, updated) = present(projects.update(&created.id, &spec).await.unwrap());
    assert_eq!(action, Action::Updated);
    assert_eq!(updated.tags, BTreeSet::from(["ml".into(), "prod".into()]));
    assert_eq!(updated.metadata, spec.metadata);
    assert_eq!(store.calls(Verb::Update, EntityKind::Project), 1);
}

// ── Delete and drift ────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_twice_is_not_an_error() {
    let store = MemoryStore::new();
    let components = ctx(&store).reconciler::<StackComponent>();
    let (_, created) = present(components.create(&artifact_store("s")).await.unwrap());

    let first = components.delete(&created.id).await.unwrap();
    let second = components.delete(&created.id).await.unwrap();

    assert_eq!(first, Outcome::Deleted { id: created.id.clone() });
    assert_eq!(second, Outcome::Deleted { id: created.id });
    assert_eq!(store.count::<StackComponent>(), 0);
}

#[tokio::test]
async fn test_externally_deleted_record_is_reported_missing() {
    let store = MemoryStore::new();
    let components = ctx(&store).reconciler::<StackComponent>();
    let spec = artifact_store("s");
    let (_, created) = present(components.create(&spec).await.unwrap());

    store.forget::<StackComponent>(&created.id);

    assert!(components.read(&created.id).await.unwrap().is_missing());
    assert!(components.update(&created.id, &spec).await.unwrap().is_missing());
    assert_eq!(
        components.plan(&spec, Some(&created.id)).await.unwrap(),
        PlannedAction::Missing
    );
    assert_eq!(store.calls(Verb::Update, EntityKind::StackComponent), 0);
}

#[tokio::test]
async fn test_torn_down_workspace_counts_as_drift() {
    let store = MemoryStore::new();
    let id = EntityId::from("ws-1");
    store.seed(Workspace {
        id: id.clone(),
        name: "research".into(),
        display_name: None,
        description: None,
        is_managed: true,
        status: WorkspaceStatus::Deleted,
        server_url: None,
        created: None,
    });

    let outcome = ctx(&store).reconciler::<Workspace>().import(&id).await.unwrap();
    assert_eq!(outcome, Outcome::Missing { id });
}

#[tokio::test]
async fn test_transient_read_failure_is_surfaced() {
    let store = MemoryStore::new();
    let stack = seeded_stack(&store, "stack-1");
    store.fail_next(
        Verb::Get,
        EntityKind::Stack,
        StoreError::Unavailable {
            status: Some(502),
            message: "bad gateway".into(),
        },
    );

    let err = ctx(&store).reconciler::<Stack>().read(&stack).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_duplicate_name_is_permanent() {
    let store = MemoryStore::new();
    let components = ctx(&store).reconciler::<StackComponent>();
    components.create(&artifact_store("s")).await.unwrap();

    let err = components.create(&artifact_store("s")).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Permanent {
            source: StoreError::Rejected {
                status: Some(409),
                ..
            },
            ..
        }
    ));
    assert!(!err.is_transient());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_expiry_is_transient_and_writes_nothing() {
    let store = MemoryStore::new().with_latency(Duration::from_secs(10));
    let ctx = ReconcileContext::with_timeout(&store, Duration::from_secs(1));

    let err = ctx
        .reconciler::<StackComponent>()
        .create(&artifact_store("slow"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::Transient {
            source: StoreError::Timeout,
            ..
        }
    ));
    assert_eq!(store.count::<StackComponent>(), 0);
}

// ── Reflexivity ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_reapplying_every_type_issues_no_writes() {
    let store = MemoryStore::new();
    let ctx = ctx(&store);
    let alice = store.add_user("alice");

    let workspace = WorkspaceSpec {
        name: "research".into(),
        display_name: Some("Research".into()),
        description: None,
        is_managed: true,
    };
    let (_, ws) = present(
        ctx.reconciler::<Workspace>()
            .create(&workspace)
            .await
            .unwrap(),
    );
    let project = project_spec("churn", &ws.id);
    let (_, proj) = present(ctx.reconciler::<Project>().create(&project).await.unwrap());

    let component = artifact_store("s");
    let (_, comp) = present(
        ctx.reconciler::<StackComponent>()
            .create(&component)
            .await
            .unwrap(),
    );
    let stack = stack_spec("prod", &[("artifact_store", &comp.id)]);
    let (_, st) = present(ctx.reconciler::<Stack>().create(&stack).await.unwrap());
    let connector = aws_connector("secret-key");
    let (_, conn) = present(
        ctx.reconciler::<ServiceConnector>()
            .create(&connector)
            .await
            .unwrap(),
    );
    let team = team_spec(&[&alice]);
    let (_, tm) = present(ctx.reconciler::<Team>().create(&team).await.unwrap());
    let assignment = RoleAssignmentSpec {
        resource_id: st.id.clone(),
        resource_type: "stack".into(),
        user_id: None,
        team_id: Some(tm.id.clone()),
        role: "admin".into(),
    };
    let (_, ra) = present(
        ctx.reconciler::<RoleAssignment>()
            .create(&assignment)
            .await
            .unwrap(),
    );

    store.reset_calls();

    let actions = [
        ctx.reconciler::<Workspace>()
            .apply(&workspace, Some(&ws.id))
            .await,
        ctx.reconciler::<Project>()
            .apply(&project, Some(&proj.id))
            .await
            .map(erase),
        ctx.reconciler::<StackComponent>()
            .apply(&component, Some(&comp.id))
            .await
            .map(erase),
        ctx.reconciler::<Stack>()
            .apply(&stack, Some(&st.id))
            .await
            .map(erase),
        ctx.reconciler::<ServiceConnector>()
            .apply(&connector, Some(&conn.id))
            .await
            .map(erase),
        ctx.reconciler::<Team>()
            .apply(&team, Some(&tm.id))
            .await
            .map(erase),
        ctx.reconciler::<RoleAssignment>()
            .apply(&assignment, Some(&ra.id))
            .await
            .map(erase),
    ];
    for action in actions {
        assert_eq!(action.unwrap().action(), Some(Action::Unchanged));
    }
    assert_eq!(store.writes(), 0);
}

/// Collapse outcomes of different entity types into one comparable shape.
fn erase<R: zenform_core::Entity>(outcome: Outcome<R>) -> Outcome<Workspace> {
    match outcome {
        Outcome::Present { action, entity } => Outcome::Present {
            action,
            entity: Workspace {
                id: entity.id().clone(),
                name: String::new(),
                display_name: None,
                description: None,
                is_managed: false,
                status: WorkspaceStatus::Available,
                server_url: None,
                created: None,
            },
        },
        Outcome::Missing { id } => Outcome::Missing { id },
        Outcome::Deleted { id } => Outcome::Deleted { id },
    }
}

// ── Name lookup ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_lookup_by_name_finds_exactly_one() {
    let store = MemoryStore::new();
    let components = ctx(&store).reconciler::<StackComponent>();
    let (_, created) = present(components.create(&artifact_store("store-a")).await.unwrap());
    components.create(&artifact_store("store-b")).await.unwrap();

    let found = components.lookup_by_name("store-a").await.unwrap();
    assert_eq!(found.id, created.id);

    let (action, imported) = present(components.import_by_name("store-a").await.unwrap());
    assert_eq!(action, Action::Imported);
    assert_eq!(imported.id, created.id);

    let err = components.lookup_by_name("store-c").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { kind: EntityKind::StackComponent, .. }));
}

#[tokio::test]
async fn test_lookup_by_name_rejects_duplicates() {
    let store = MemoryStore::new();
    for id in ["s1", "s2"] {
        store.seed(Stack {
            id: EntityId::from(id),
            name: "prod".into(),
            components: BTreeMap::new(),
            labels: BTreeMap::new(),
            created: None,
        });
    }

    let err = ctx(&store)
        .reconciler::<Stack>()
        .lookup_by_name("prod")
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Ambiguous { count: 2, .. }));
}

#[tokio::test]
async fn test_plan_reports_create_for_unknown_id() {
    let store = MemoryStore::new();
    let plan = ctx(&store)
        .reconciler::<StackComponent>()
        .plan(&artifact_store("s"), None)
        .await
        .unwrap();

    assert_eq!(plan, PlannedAction::Create);
    assert_eq!(store.calls(Verb::Get, EntityKind::StackComponent), 0);
}
