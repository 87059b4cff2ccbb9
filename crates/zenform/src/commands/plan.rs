//! `zenform plan`: show what apply would change. Reads only.

use std::path::Path;

use futures_util::future::join_all;

use zenform_core::{EntityId, EntityStore, PlannedAction, RemoteStore};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::manifest::{Bindings, Declarable, Declared, Manifest};
use crate::output;

use super::session::{Report, Session, Step, locate};

pub async fn handle<S: RemoteStore + ?Sized>(
    session: &Session<'_, S>,
    path: &Path,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let manifest = Manifest::load(path)?;
    let report = plan(session, &manifest).await;
    let rendered = output::render_changes(
        global.output,
        &report.records,
        output::should_color(global.color),
    );
    output::print_output(&rendered, global.quiet);
    report.finish(manifest.len())
}

/// Plan every entry. A reference to an entity that does not exist yet
/// stays a `name:` placeholder and shows up as a changed field.
pub async fn plan<S: RemoteStore + ?Sized>(
    session: &Session<'_, S>,
    manifest: &Manifest,
) -> Report {
    let mut bindings = Bindings::lenient();
    let mut report = Report::default();

    let (connectors, workspaces, teams) = tokio::join!(
        plan_all(session, &manifest.service_connectors, &bindings),
        plan_all(session, &manifest.workspaces, &bindings),
        plan_all(session, &manifest.teams, &bindings),
    );
    absorb(&mut report, &mut bindings, connectors);
    absorb(&mut report, &mut bindings, workspaces);
    absorb(&mut report, &mut bindings, teams);

    let (components, projects) = tokio::join!(
        plan_all(session, &manifest.components, &bindings),
        plan_all(session, &manifest.projects, &bindings),
    );
    absorb(&mut report, &mut bindings, components);
    absorb(&mut report, &mut bindings, projects);

    let stacks = plan_all(session, &manifest.stacks, &bindings).await;
    absorb(&mut report, &mut bindings, stacks);

    let assignments = plan_all(session, &manifest.role_assignments, &bindings).await;
    absorb(&mut report, &mut bindings, assignments);
    report
}

type Planned = Step<(Option<EntityId>, PlannedAction)>;

async fn plan_all<D, S>(
    session: &Session<'_, S>,
    entries: &[Declared<D>],
    bindings: &Bindings,
) -> Vec<Planned>
where
    D: Declarable,
    S: RemoteStore + EntityStore<D::Entity> + ?Sized,
{
    join_all(entries.iter().map(|entry| async move {
        let result: Result<_, CliError> = async {
            let spec = entry.spec.bind(bindings)?;
            let reconciler = session.reconciler::<D::Entity>();
            let id = locate(&reconciler, entry, &spec).await?;
            let action = reconciler.plan(&spec, id.as_ref()).await?;
            Ok((id, action))
        }
        .await;
        Step::new(entry, result)
    }))
    .await
}

fn describe(action: &PlannedAction) -> (&'static str, Vec<String>) {
    match action {
        PlannedAction::Create => ("create", Vec::new()),
        PlannedAction::Update { fields } => ("update", field_names(fields)),
        PlannedAction::Unchanged => ("no-op", Vec::new()),
        PlannedAction::Replace { fields } => ("replace", field_names(fields)),
        PlannedAction::Missing => ("recreate", Vec::new()),
    }
}

fn field_names(fields: &[&'static str]) -> Vec<String> {
    fields.iter().map(|f| (*f).to_owned()).collect()
}

fn absorb(report: &mut Report, bindings: &mut Bindings, steps: Vec<Planned>) {
    for step in steps {
        if step.result.is_err() {
            report.fail(step);
            continue;
        }
        if let Ok((id, action)) = &step.result {
            // Only a record that will survive apply can be referenced by id.
            if let (Some(name), Some(id), PlannedAction::Update { .. } | PlannedAction::Unchanged) =
                (&step.name, id, action)
            {
                bindings.insert(step.kind, name, id.clone());
            }
            let (verb, fields) = describe(action);
            let id = id.as_ref().filter(|_| !matches!(action, PlannedAction::Missing));
            let record = step.record(id, verb, fields);
            report.records.push(record);
        }
    }
}
