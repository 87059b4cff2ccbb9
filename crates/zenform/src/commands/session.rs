//! Shared plumbing for manifest-driven commands.

use std::time::Duration;

use futures_util::future::join_all;

use zenform_core::{
    CoreError, Entity, EntityId, EntityKind, EntityStore, Outcome, ReconcileContext, Reconciler,
    RemoteStore,
};

use crate::error::CliError;
use crate::manifest::{Bindings, Declarable, Declared};
use crate::output::ChangeRecord;

/// A store handle plus the deadline budget each entity pass gets.
pub struct Session<'a, S: ?Sized> {
    store: &'a S,
    pass_timeout: Duration,
}

impl<'a, S: ?Sized> Session<'a, S> {
    pub fn new(store: &'a S, pass_timeout: Duration) -> Self {
        Self {
            store,
            pass_timeout,
        }
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    /// A reconciler with a fresh pass deadline.
    pub fn reconciler<R: Entity>(&self) -> Reconciler<'a, R, S> {
        ReconcileContext::with_timeout(self.store, self.pass_timeout).reconciler()
    }
}

/// The remote id behind a manifest entry: its pinned id, or the single
/// remote record it matches. `None` means it does not exist yet.
pub async fn locate<D, S>(
    reconciler: &Reconciler<'_, D::Entity, S>,
    entry: &Declared<D>,
    spec: &D,
) -> Result<Option<EntityId>, CoreError>
where
    D: Declarable,
    S: RemoteStore + EntityStore<D::Entity> + ?Sized,
{
    if let Some(id) = &entry.id {
        return Ok(Some(id.clone()));
    }
    let found: Vec<D::Entity> = reconciler
        .list_matching(spec.lookup_filter())
        .await?
        .into_iter()
        .filter(|entity| spec.matches(entity))
        .collect();
    match found.as_slice() {
        [] => Ok(None),
        [one] => Ok(Some(one.id().clone())),
        many => Err(CoreError::Ambiguous {
            kind: D::Entity::KIND,
            name: spec.label(),
            count: many.len(),
        }),
    }
}

/// Locate every entry of one kind concurrently, for commands that only
/// read before acting.
pub async fn locate_all<D, S>(
    session: &Session<'_, S>,
    entries: &[Declared<D>],
    bindings: &Bindings,
) -> Vec<Step<Option<EntityId>>>
where
    D: Declarable,
    S: RemoteStore + EntityStore<D::Entity> + ?Sized,
{
    join_all(entries.iter().map(|entry| async move {
        let result: Result<_, CliError> = async {
            let spec = entry.spec.bind(bindings)?;
            Ok(locate(&session.reconciler::<D::Entity>(), entry, &spec).await?)
        }
        .await;
        Step::new::<D>(entry, result)
    }))
    .await
}

/// One manifest entry's result inside a multi-entry command.
#[derive(Debug)]
pub struct Step<T> {
    pub kind: EntityKind,
    pub name: Option<String>,
    pub label: String,
    pub result: Result<T, CliError>,
}

impl<T> Step<T> {
    pub fn new<D: Declarable>(entry: &Declared<D>, result: Result<T, CliError>) -> Self {
        Self {
            kind: D::Entity::KIND,
            name: entry.spec.name().map(str::to_owned),
            label: entry.spec.label(),
            result,
        }
    }

    pub fn record(
        &self,
        id: Option<&EntityId>,
        action: &str,
        fields: Vec<String>,
    ) -> ChangeRecord {
        ChangeRecord {
            kind: self.kind.to_string(),
            name: self.label.clone(),
            id: id.map(ToString::to_string),
            action: action.to_owned(),
            fields,
        }
    }
}

/// Collects per-entry records and failures across tiers.
#[derive(Debug, Default)]
pub struct Report {
    pub records: Vec<ChangeRecord>,
    failures: usize,
}

impl Report {
    /// Record a failed step and print its diagnostic to stderr.
    pub fn fail<T>(&mut self, step: Step<T>) {
        self.records.push(step.record(None, "failed", Vec::new()));
        if let Err(err) = step.result {
            let report =
                miette::Report::new(err).wrap_err(format!("{} '{}'", step.kind, step.label));
            eprintln!("{report:?}");
        }
        self.failures += 1;
    }

    pub fn has_failures(&self) -> bool {
        self.failures > 0
    }

    pub fn finish(&self, total: usize) -> Result<(), CliError> {
        if self.has_failures() {
            return Err(CliError::NotConverged {
                failed: self.failures,
                total,
            });
        }
        Ok(())
    }
}

/// The entity from a pass that must leave it present.
pub fn present<R: Entity>(outcome: Outcome<R>) -> Result<(zenform_core::Action, R), CliError> {
    match outcome {
        Outcome::Present { action, entity } => Ok((action, entity)),
        Outcome::Missing { id } | Outcome::Deleted { id } => Err(CliError::NotFound {
            kind: R::KIND,
            identifier: id.to_string(),
        }),
    }
}
