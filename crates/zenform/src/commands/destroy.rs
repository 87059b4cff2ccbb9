//! `zenform destroy`: delete every declared entity, dependents first.

use std::path::Path;

use futures_util::future::join_all;

use zenform_core::{EntityId, EntityStore, RemoteStore};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::manifest::{Bindings, Declarable, Declared, Manifest};
use crate::output;

use super::session::{Report, Session, Step, locate_all};

pub async fn handle<S: RemoteStore + ?Sized>(
    session: &Session<'_, S>,
    path: &Path,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let manifest = Manifest::load(path)?;
    let report = destroy(session, &manifest).await;
    let rendered = output::render_changes(
        global.output,
        &report.records,
        output::should_color(global.color),
    );
    output::print_output(&rendered, global.quiet);
    report.finish(manifest.len())
}

type Located = Vec<Step<Option<EntityId>>>;

/// Locate everything in apply order (so `name:` references bind), then
/// delete in reverse tier order. Entries that no longer exist are
/// reported as absent; deleting twice is harmless.
pub async fn destroy<S: RemoteStore + ?Sized>(
    session: &Session<'_, S>,
    manifest: &Manifest,
) -> Report {
    let mut bindings = Bindings::lenient();
    let mut report = Report::default();

    let connectors = locate_all(session, &manifest.service_connectors, &bindings).await;
    let workspaces = locate_all(session, &manifest.workspaces, &bindings).await;
    let teams = locate_all(session, &manifest.teams, &bindings).await;
    bind(&mut bindings, &[&connectors, &workspaces, &teams]);

    let components = locate_all(session, &manifest.components, &bindings).await;
    let projects = locate_all(session, &manifest.projects, &bindings).await;
    bind(&mut bindings, &[&components, &projects]);

    let stacks = locate_all(session, &manifest.stacks, &bindings).await;
    bind(&mut bindings, &[&stacks]);

    let assignments = locate_all(session, &manifest.role_assignments, &bindings).await;

    delete_all(session, &manifest.role_assignments, assignments, &mut report).await;
    if report.has_failures() {
        return report;
    }
    delete_all(session, &manifest.stacks, stacks, &mut report).await;
    if report.has_failures() {
        return report;
    }
    let (component_steps, project_steps) = tokio::join!(
        delete_steps(session, &manifest.components, components),
        delete_steps(session, &manifest.projects, projects),
    );
    absorb(&mut report, component_steps);
    absorb(&mut report, project_steps);
    if report.has_failures() {
        return report;
    }
    let (connector_steps, workspace_steps, team_steps) = tokio::join!(
        delete_steps(session, &manifest.service_connectors, connectors),
        delete_steps(session, &manifest.workspaces, workspaces),
        delete_steps(session, &manifest.teams, teams),
    );
    absorb(&mut report, connector_steps);
    absorb(&mut report, workspace_steps);
    absorb(&mut report, team_steps);
    report
}

fn bind(bindings: &mut Bindings, tiers: &[&Located]) {
    for step in tiers.iter().flat_map(|steps| steps.iter()) {
        if let (Some(name), Ok(Some(id))) = (&step.name, &step.result) {
            bindings.insert(step.kind, name, id.clone());
        }
    }
}

async fn delete_all<D, S>(
    session: &Session<'_, S>,
    entries: &[Declared<D>],
    located: Located,
    report: &mut Report,
) where
    D: Declarable,
    S: RemoteStore + EntityStore<D::Entity> + ?Sized,
{
    let steps = delete_steps(session, entries, located).await;
    absorb(report, steps);
}

/// `Ok(None)` means there was nothing to delete.
async fn delete_steps<D, S>(
    session: &Session<'_, S>,
    entries: &[Declared<D>],
    located: Located,
) -> Located
where
    D: Declarable,
    S: RemoteStore + EntityStore<D::Entity> + ?Sized,
{
    join_all(entries.iter().zip(located).map(|(entry, step)| async move {
        let result = match step.result {
            Ok(Some(id)) => session
                .reconciler::<D::Entity>()
                .delete(&id)
                .await
                .map(|outcome| Some(outcome.id().clone()))
                .map_err(CliError::from),
            other => other,
        };
        Step::new(entry, result)
    }))
    .await
}

fn absorb(report: &mut Report, steps: Located) {
    for step in steps {
        if step.result.is_err() {
            report.fail(step);
            continue;
        }
        let (id, action) = match &step.result {
            Ok(Some(id)) => (Some(id), "deleted"),
            _ => (None, "absent"),
        };
        let record = step.record(id, action, Vec::new());
        report.records.push(record);
    }
}
