// ── Reference resolution ──
//
// Dependent writes are gated on their targets already existing. The
// reconciler never creates a dependency itself; an unknown id fails the
// pass before any write is issued.

use tracing::debug;

use super::ReconcileContext;
use crate::drift::{self, DriftClass};
use crate::error::CoreError;
use crate::model::{
    Entity, EntityId, EntityRef, Project, Reference, ServiceConnector, Stack, StackComponent,
    Team, Workspace,
};
use crate::store::{EntityStore, RemoteStore, StoreError};
use crate::validate::ValidationError;

/// Check every reference of `entity`, in declaration order.
pub(crate) async fn resolve_all<S>(
    ctx: &ReconcileContext<'_, S>,
    entity: &EntityRef,
    references: &[Reference],
) -> Result<(), CoreError>
where
    S: RemoteStore + ?Sized,
{
    for reference in references {
        resolve(ctx, entity, reference).await?;
    }
    Ok(())
}

async fn resolve<S>(
    ctx: &ReconcileContext<'_, S>,
    entity: &EntityRef,
    reference: &Reference,
) -> Result<(), CoreError>
where
    S: RemoteStore + ?Sized,
{
    let present = match reference {
        Reference::Workspace(id) => fetch::<Workspace, S>(ctx, id)
            .await
            .map(|w| w.is_some_and(|w| !w.is_gone())),
        Reference::Project(id) => fetch::<Project, S>(ctx, id).await.map(|p| p.is_some()),
        Reference::Stack(id) => fetch::<Stack, S>(ctx, id).await.map(|s| s.is_some()),
        Reference::Component { id, slot } => match fetch::<StackComponent, S>(ctx, id).await {
            Ok(Some(component)) => {
                if let Some(slot) = slot {
                    if component.component_type != *slot {
                        return Err(CoreError::Validation {
                            entity: entity.clone(),
                            source: ValidationError::ComponentSlotMismatch {
                                slot: *slot,
                                component_id: id.clone(),
                                actual: component.component_type,
                            },
                        });
                    }
                }
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        },
        Reference::Connector(id) => fetch::<ServiceConnector, S>(ctx, id)
            .await
            .map(|c| c.is_some()),
        Reference::Team(id) => fetch::<Team, S>(ctx, id).await.map(|t| t.is_some()),
        Reference::User(id) => {
            not_found_as_none(ctx.call(ctx.store().get_user(id)).await).map(|u| u.is_some())
        }
    };

    let target = EntityRef::known(reference.kind(), reference.id().clone());
    match present {
        Ok(true) => {
            debug!(%entity, reference = %target, "reference resolved");
            Ok(())
        }
        Ok(false) => Err(CoreError::UnresolvedReference {
            entity: entity.clone(),
            reference: target,
        }),
        Err(e) => Err(CoreError::from_store(entity.clone(), e)),
    }
}

async fn fetch<R, S>(ctx: &ReconcileContext<'_, S>, id: &EntityId) -> Result<Option<R>, StoreError>
where
    R: Entity,
    S: EntityStore<R> + ?Sized,
{
    not_found_as_none(ctx.call(<S as EntityStore<R>>::get(ctx.store(), id)).await)
}

/// Fold a not-found answer into `None`.
fn not_found_as_none<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if drift::classify(&e) == DriftClass::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
