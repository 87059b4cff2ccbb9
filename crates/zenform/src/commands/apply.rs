//! `zenform apply`: converge the server to the manifest, tier by tier.

use std::path::Path;

use futures_util::future::join_all;
use tracing::{info, warn};

use zenform_core::{Action, Entity, EntityStore, Outcome, RemoteStore};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::manifest::{Bindings, Declarable, Declared, Manifest};
use crate::output;

use super::session::{Report, Session, Step, locate, present};
use super::validate;

pub async fn handle<S: RemoteStore + ?Sized>(
    session: &Session<'_, S>,
    path: &Path,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let manifest = Manifest::load(path)?;
    if manifest.is_empty() {
        warn!(path = %path.display(), "manifest declares no entities");
    }
    // Nothing is written unless every entry is locally valid.
    validate::check(&manifest)?;

    let report = converge(session, &manifest).await;
    let rendered = output::render_changes(
        global.output,
        &report.records,
        output::should_color(global.color),
    );
    output::print_output(&rendered, global.quiet);
    report.finish(manifest.len())
}

/// Apply each dependency tier in order. Entries inside a tier run
/// concurrently; a failed tier stops the run because later tiers may
/// reference it.
pub async fn converge<S: RemoteStore + ?Sized>(
    session: &Session<'_, S>,
    manifest: &Manifest,
) -> Report {
    let mut bindings = Bindings::strict();
    let mut report = Report::default();

    // Connectors, workspaces and teams reference nothing declared.
    let (connectors, workspaces, teams) = tokio::join!(
        converge_all(session, &manifest.service_connectors, &bindings),
        converge_all(session, &manifest.workspaces, &bindings),
        converge_all(session, &manifest.teams, &bindings),
    );
    absorb(&mut report, &mut bindings, connectors);
    absorb(&mut report, &mut bindings, workspaces);
    absorb(&mut report, &mut bindings, teams);
    if report.has_failures() {
        return report;
    }

    let (components, projects) = tokio::join!(
        converge_all(session, &manifest.components, &bindings),
        converge_all(session, &manifest.projects, &bindings),
    );
    absorb(&mut report, &mut bindings, components);
    absorb(&mut report, &mut bindings, projects);
    if report.has_failures() {
        return report;
    }

    let stacks = converge_all(session, &manifest.stacks, &bindings).await;
    absorb(&mut report, &mut bindings, stacks);
    if report.has_failures() {
        return report;
    }

    let assignments = converge_all(session, &manifest.role_assignments, &bindings).await;
    absorb(&mut report, &mut bindings, assignments);
    report
}

type Converged<R> = Step<(Action, R)>;

async fn converge_all<D, S>(
    session: &Session<'_, S>,
    entries: &[Declared<D>],
    bindings: &Bindings,
) -> Vec<Converged<D::Entity>>
where
    D: Declarable,
    S: RemoteStore + EntityStore<D::Entity> + ?Sized,
{
    join_all(entries.iter().map(|entry| async move {
        let result = converge_one(session, entry, bindings).await;
        Step::new(entry, result)
    }))
    .await
}

async fn converge_one<D, S>(
    session: &Session<'_, S>,
    entry: &Declared<D>,
    bindings: &Bindings,
) -> Result<(Action, D::Entity), CliError>
where
    D: Declarable,
    S: RemoteStore + EntityStore<D::Entity> + ?Sized,
{
    let spec = entry.spec.bind(bindings)?;
    let reconciler = session.reconciler::<D::Entity>();
    let id = locate(&reconciler, entry, &spec).await?;

    match reconciler.apply(&spec, id.as_ref()).await? {
        Outcome::Missing { id } => {
            warn!(kind = %D::Entity::KIND, %id, "declared record is gone remotely; recreating");
            present(reconciler.create(&spec).await?)
        }
        outcome => present(outcome),
    }
}

fn absorb<R: Entity>(report: &mut Report, bindings: &mut Bindings, steps: Vec<Converged<R>>) {
    for step in steps {
        if step.result.is_err() {
            report.fail(step);
            continue;
        }
        if let Ok((action, entity)) = &step.result {
            info!(kind = %step.kind, name = %step.label, %action, "converged");
            if let Some(name) = &step.name {
                bindings.insert(step.kind, name, entity.id().clone());
            }
            let record = step.record(Some(entity.id()), &action.to_string(), Vec::new());
            report.records.push(record);
        }
    }
}
