// ── Entity reconciler ──
//
// One generic state machine drives every entity type. A reconciler call
// is one pass: validate locally, resolve references, issue at most one
// create/update/delete, then confirm with a read. A not-found answer on
// a read is drift, not an error: the caller is told to forget the id.

mod pass;
mod references;

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use pass::{CallBudget, Pass, PassState};

use crate::diff::Diff;
use crate::drift::{self, DriftClass};
use crate::error::{CoreError, MembershipFailure, MembershipOp};
use crate::model::{
    ChangeSet, Entity, EntityId, EntityRef, MembershipPlan, Named, Project, RoleAssignment,
    ServiceConnector, Stack, StackComponent, Team, Workspace,
};
use crate::store::{EntityStore, ListFilter, RemoteStore, StoreError, Verb};

// ── Context ──────────────────────────────────────────────────────────

/// Everything a reconciler call needs: the store and a hard deadline.
///
/// Every remote call made during a pass runs under the same deadline;
/// expiry surfaces as a transient failure and leaves the remote state as
/// the store last left it.
pub struct ReconcileContext<'a, S: ?Sized> {
    store: &'a S,
    deadline: Instant,
}

impl<S: ?Sized> Clone for ReconcileContext<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for ReconcileContext<'_, S> {}

impl<'a, S: ?Sized> ReconcileContext<'a, S> {
    pub fn new(store: &'a S, deadline: Instant) -> Self {
        Self { store, deadline }
    }

    pub fn with_timeout(store: &'a S, timeout: Duration) -> Self {
        Self::new(store, Instant::now() + timeout)
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// A reconciler for entity type `R` sharing this context.
    pub fn reconciler<R: Entity>(&self) -> Reconciler<'a, R, S> {
        Reconciler::new(*self)
    }

    pub(crate) async fn call<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout_at(self.deadline, fut)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }
}

// ── Results ──────────────────────────────────────────────────────────

/// What a pass did to a record that is still present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Created,
    Updated,
    Unchanged,
    Imported,
}

/// The caller-visible result of a reconciler call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R> {
    /// The canonical remote record, as read back at the end of the pass.
    Present { action: Action, entity: R },
    /// The store no longer knows this id; forget it.
    Missing { id: EntityId },
    Deleted { id: EntityId },
}

impl<R: Entity> Outcome<R> {
    pub fn entity(&self) -> Option<&R> {
        match self {
            Self::Present { entity, .. } => Some(entity),
            Self::Missing { .. } | Self::Deleted { .. } => None,
        }
    }

    pub fn into_entity(self) -> Option<R> {
        match self {
            Self::Present { entity, .. } => Some(entity),
            Self::Missing { .. } | Self::Deleted { .. } => None,
        }
    }

    pub fn action(&self) -> Option<Action> {
        match self {
            Self::Present { action, .. } => Some(*action),
            Self::Missing { .. } | Self::Deleted { .. } => None,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            Self::Present { entity, .. } => entity.id(),
            Self::Missing { id } | Self::Deleted { id } => id,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// What [`Reconciler::apply`] would do, computed without writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Create,
    Update { fields: Vec<&'static str> },
    Unchanged,
    Replace { fields: Vec<&'static str> },
    /// The known id is gone remotely; the next apply recreates it.
    Missing,
}

// ── Reconciler ───────────────────────────────────────────────────────

pub struct Reconciler<'a, R, S: ?Sized> {
    ctx: ReconcileContext<'a, S>,
    _entity: PhantomData<fn() -> R>,
}

pub type WorkspaceReconciler<'a, S> = Reconciler<'a, Workspace, S>;
pub type ProjectReconciler<'a, S> = Reconciler<'a, Project, S>;
pub type StackReconciler<'a, S> = Reconciler<'a, Stack, S>;
pub type ComponentReconciler<'a, S> = Reconciler<'a, StackComponent, S>;
pub type ConnectorReconciler<'a, S> = Reconciler<'a, ServiceConnector, S>;
pub type TeamReconciler<'a, S> = Reconciler<'a, Team, S>;
pub type RoleAssignmentReconciler<'a, S> = Reconciler<'a, RoleAssignment, S>;

impl<'a, R, S: ?Sized> Reconciler<'a, R, S> {
    pub fn new(ctx: ReconcileContext<'a, S>) -> Self {
        Self {
            ctx,
            _entity: PhantomData,
        }
    }

    pub fn context(&self) -> &ReconcileContext<'a, S> {
        &self.ctx
    }
}

impl<R, S> Reconciler<'_, R, S>
where
    R: Entity,
    S: RemoteStore + EntityStore<R> + ?Sized,
{
    // ── Operations ───────────────────────────────────────────────────

    /// Create a record that has no id yet.
    pub async fn create(&self, spec: &R::Spec) -> Result<Outcome<R>, CoreError> {
        let mut pass = Pass::new(EntityRef::new(R::KIND, None));
        validate::<R>(&pass, spec)?;
        self.resolve(&pass, spec).await?;

        pass.charge(Verb::Create)?;
        let created = self
            .ctx
            .call(<S as EntityStore<R>>::create(self.ctx.store(), spec))
            .await
            .map_err(|e| CoreError::from_store(pass.entity().clone(), e))?;
        pass.identify(created.entity_ref());
        pass.advance(PassState::Created, "create")?;
        info!(entity = %pass.entity(), "created");

        let failures = self
            .apply_membership(&pass, created.id(), &R::membership_plan(&created, spec))
            .await;
        self.confirm(&mut pass, created.id(), Action::Created, failures)
            .await
    }

    /// Fetch the canonical record for `id`.
    pub async fn read(&self, id: &EntityId) -> Result<Outcome<R>, CoreError> {
        self.adopt(id, Action::Unchanged).await
    }

    /// Converge the record behind `id` to `spec`.
    pub async fn update(&self, id: &EntityId, spec: &R::Spec) -> Result<Outcome<R>, CoreError> {
        let mut pass = Pass::new(EntityRef::known(R::KIND, id.clone()));
        validate::<R>(&pass, spec)?;

        let Some(current) = self.refresh(&mut pass, id).await? else {
            return Ok(Outcome::Missing { id: id.clone() });
        };
        pass.advance(PassState::Diffed, "diff")?;
        let diff = R::diff(&current, spec);
        let membership = R::membership_plan(&current, spec);
        debug!(entity = %pass.entity(), fields = ?diff.fields(), members = membership.len(), "diffed");

        let patch = match diff {
            Diff::Replace { fields } => {
                return Err(CoreError::ImmutableFieldChanged {
                    entity: pass.entity().clone(),
                    fields,
                });
            }
            Diff::Unchanged if membership.is_empty() => {
                return Ok(Outcome::Present {
                    action: Action::Unchanged,
                    entity: current,
                });
            }
            Diff::Unchanged => None,
            Diff::Update(patch) => Some(patch),
        };

        self.resolve(&pass, spec).await?;

        if let Some(patch) = patch {
            pass.charge(Verb::Update)?;
            self.ctx
                .call(<S as EntityStore<R>>::update(self.ctx.store(), id, &patch))
                .await
                .map_err(|e| CoreError::from_store(pass.entity().clone(), e))?;
            info!(entity = %pass.entity(), fields = ?patch.changed_fields(), "updated");
        }

        let failures = self.apply_membership(&pass, id, &membership).await;
        pass.advance(PassState::Updated, "update")?;
        self.confirm(&mut pass, id, Action::Updated, failures).await
    }

    /// Delete `id`. An id the store no longer knows counts as deleted.
    pub async fn delete(&self, id: &EntityId) -> Result<Outcome<R>, CoreError> {
        let mut pass = Pass::new(EntityRef::known(R::KIND, id.clone()));
        pass.charge(Verb::Delete)?;

        match self
            .ctx
            .call(<S as EntityStore<R>>::delete(self.ctx.store(), id))
            .await
        {
            Ok(()) => info!(entity = %pass.entity(), "deleted"),
            Err(e) if drift::classify(&e) == DriftClass::NotFound => {
                debug!(entity = %pass.entity(), "already gone");
            }
            Err(e) => return Err(CoreError::from_store(pass.entity().clone(), e)),
        }

        pass.advance(PassState::Deleted, "delete")?;
        Ok(Outcome::Deleted { id: id.clone() })
    }

    /// Adopt an existing remote record without writing anything.
    pub async fn import(&self, id: &EntityId) -> Result<Outcome<R>, CoreError> {
        self.adopt(id, Action::Imported).await
    }

    /// Create when no id is known, otherwise converge the known record.
    pub async fn apply(
        &self,
        spec: &R::Spec,
        id: Option<&EntityId>,
    ) -> Result<Outcome<R>, CoreError> {
        match id {
            Some(id) => self.update(id, spec).await,
            None => self.create(spec).await,
        }
    }

    /// Work out what [`apply`](Self::apply) would do. Reads only.
    pub async fn plan(
        &self,
        spec: &R::Spec,
        id: Option<&EntityId>,
    ) -> Result<PlannedAction, CoreError> {
        let mut pass = Pass::new(EntityRef::new(R::KIND, id.cloned()));
        validate::<R>(&pass, spec)?;

        let Some(id) = id else {
            return Ok(PlannedAction::Create);
        };
        let Some(current) = self.refresh(&mut pass, id).await? else {
            return Ok(PlannedAction::Missing);
        };
        pass.advance(PassState::Diffed, "diff")?;

        let membership = R::membership_plan(&current, spec);
        Ok(match R::diff(&current, spec) {
            Diff::Replace { fields } => PlannedAction::Replace { fields },
            Diff::Unchanged if membership.is_empty() => PlannedAction::Unchanged,
            diff => {
                let mut fields = diff.fields();
                if !membership.is_empty() {
                    fields.push("members");
                }
                PlannedAction::Update { fields }
            }
        })
    }

    /// Every record of this type, across all pages.
    pub async fn list_all(&self) -> Result<Vec<R>, CoreError> {
        self.collect(ListFilter::default()).await
    }

    /// Every record the store returns for `filter`, across all pages.
    /// Name filters may return near matches; callers check exactly.
    pub async fn list_matching(&self, filter: ListFilter) -> Result<Vec<R>, CoreError> {
        self.collect(filter).await
    }

    // ── Steps ────────────────────────────────────────────────────────

    async fn adopt(&self, id: &EntityId, action: Action) -> Result<Outcome<R>, CoreError> {
        let mut pass = Pass::new(EntityRef::known(R::KIND, id.clone()));
        Ok(match self.refresh(&mut pass, id).await? {
            Some(entity) => Outcome::Present { action, entity },
            None => Outcome::Missing { id: id.clone() },
        })
    }

    /// Read `id`. `None` means drift: the pass is now `Missing`.
    async fn refresh(&self, pass: &mut Pass, id: &EntityId) -> Result<Option<R>, CoreError> {
        match self
            .ctx
            .call(<S as EntityStore<R>>::get(self.ctx.store(), id))
            .await
        {
            Ok(entity) if entity.is_gone() => {
                warn!(entity = %pass.entity(), "torn down remotely; forgetting id");
                pass.advance(PassState::Missing, "refresh")?;
                Ok(None)
            }
            Ok(entity) => {
                pass.advance(PassState::Read, "refresh")?;
                Ok(Some(entity))
            }
            Err(e) if drift::classify(&e) == DriftClass::NotFound => {
                warn!(entity = %pass.entity(), "not found remotely; forgetting id");
                pass.advance(PassState::Missing, "refresh")?;
                Ok(None)
            }
            Err(e) => Err(CoreError::from_store(pass.entity().clone(), e)),
        }
    }

    /// Post-write read. Membership failures are reported only after the
    /// record itself has been confirmed.
    async fn confirm(
        &self,
        pass: &mut Pass,
        id: &EntityId,
        action: Action,
        failures: Vec<MembershipFailure>,
    ) -> Result<Outcome<R>, CoreError> {
        let Some(entity) = self.refresh(pass, id).await? else {
            return Ok(Outcome::Missing { id: id.clone() });
        };
        if !failures.is_empty() {
            return Err(CoreError::PartialMembership {
                team: pass.entity().clone(),
                failures,
            });
        }
        Ok(Outcome::Present { action, entity })
    }

    async fn resolve(&self, pass: &Pass, spec: &R::Spec) -> Result<(), CoreError> {
        references::resolve_all(&self.ctx, pass.entity(), &R::references(spec)).await
    }

    /// Best effort: every call is attempted and each failure is kept.
    async fn apply_membership(
        &self,
        pass: &Pass,
        team: &EntityId,
        plan: &MembershipPlan,
    ) -> Vec<MembershipFailure> {
        let store = self.ctx.store();
        let calls = plan
            .add
            .iter()
            .map(|user| (MembershipOp::Add, user))
            .chain(plan.remove.iter().map(|user| (MembershipOp::Remove, user)));

        let mut failures = Vec::new();
        for (op, user) in calls {
            let result = match op {
                MembershipOp::Add => self.ctx.call(store.add_member(team, user)).await,
                MembershipOp::Remove => self.ctx.call(store.remove_member(team, user)).await,
            };
            match result {
                Ok(()) => debug!(entity = %pass.entity(), %user, ?op, "membership changed"),
                Err(error) => {
                    warn!(entity = %pass.entity(), %user, ?op, %error, "membership change failed");
                    failures.push(MembershipFailure {
                        user: user.clone(),
                        op,
                        error,
                    });
                }
            }
        }
        failures
    }

    async fn collect(&self, mut filter: ListFilter) -> Result<Vec<R>, CoreError> {
        let mut items = Vec::new();
        loop {
            let page = self
                .ctx
                .call(<S as EntityStore<R>>::list(self.ctx.store(), &filter))
                .await
                .map_err(|e| CoreError::from_store(EntityRef::new(R::KIND, None), e))?;
            let last = page.is_last();
            items.extend(page.items);
            if last {
                return Ok(items);
            }
            filter = filter.next_page();
        }
    }
}

// ── Name lookup ──────────────────────────────────────────────────────

impl<R, S> Reconciler<'_, R, S>
where
    R: Named,
    S: RemoteStore + EntityStore<R> + ?Sized,
{
    /// The single record whose name is exactly `name`.
    pub async fn lookup_by_name(&self, name: &str) -> Result<R, CoreError> {
        let mut matches: Vec<R> = self
            .collect(ListFilter::by_name(name))
            .await?
            .into_iter()
            .filter(|r| r.name() == name)
            .collect();

        match matches.len() {
            0 => Err(CoreError::NotFound {
                kind: R::KIND,
                name: name.to_owned(),
            }),
            1 => Ok(matches.remove(0)),
            count => Err(CoreError::Ambiguous {
                kind: R::KIND,
                name: name.to_owned(),
                count,
            }),
        }
    }

    pub async fn import_by_name(&self, name: &str) -> Result<Outcome<R>, CoreError> {
        let found = self.lookup_by_name(name).await?;
        self.import(found.id()).await
    }
}

fn validate<R: Entity>(pass: &Pass, spec: &R::Spec) -> Result<(), CoreError> {
    R::validate(spec).map_err(|source| CoreError::Validation {
        entity: pass.entity().clone(),
        source,
    })
}
