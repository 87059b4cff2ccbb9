//! `zenform get` and `zenform import`: single-entity lookups.

use serde::Serialize;
use tracing::debug;

use zenform_core::{
    CoreError, Entity, EntityId, EntityKind, EntityRef, EntityStore, HttpStore, MembershipStore,
    Named, Outcome, Project, RemoteStore, RoleAssignment, ServiceConnector, Stack,
    StackComponent, Team, Workspace,
};

use crate::cli::{GetArgs, GetKind, GlobalOpts, ImportArgs, KindArg};
use crate::error::CliError;
use crate::output;

use super::session::{Session, present};

pub async fn import<S: RemoteStore + ?Sized>(
    session: &Session<'_, S>,
    args: &ImportArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = EntityId::from(args.id.as_str());
    debug!(kind = %args.kind.entity_kind(), %id, "importing");
    match args.kind {
        KindArg::Workspace => import_one::<Workspace, S>(session, &id, global).await,
        KindArg::Project => import_one::<Project, S>(session, &id, global).await,
        KindArg::Stack => import_one::<Stack, S>(session, &id, global).await,
        KindArg::Component => import_one::<StackComponent, S>(session, &id, global).await,
        KindArg::Connector => import_one::<ServiceConnector, S>(session, &id, global).await,
        KindArg::Team => import_one::<Team, S>(session, &id, global).await,
        KindArg::RoleAssignment => import_one::<RoleAssignment, S>(session, &id, global).await,
    }
}

async fn import_one<R, S>(
    session: &Session<'_, S>,
    id: &EntityId,
    global: &GlobalOpts,
) -> Result<(), CliError>
where
    R: Entity + Serialize,
    S: RemoteStore + EntityStore<R> + ?Sized,
{
    let (_, entity) = present(session.reconciler::<R>().import(id).await?)?;
    print_entity(&entity, global);
    Ok(())
}

pub async fn handle(
    session: &Session<'_, HttpStore>,
    args: &GetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.kind == GetKind::Server {
        let info = session.store().client().get_server_info().await?;
        print_entity(&info, global);
        return Ok(());
    }

    let target = args.target.as_deref().ok_or_else(|| CliError::Validation {
        field: "target".into(),
        reason: "an id or name is required".into(),
    })?;

    match args.kind {
        GetKind::Workspace => get_named::<Workspace, _>(session, target, global).await,
        GetKind::Project => get_named::<Project, _>(session, target, global).await,
        GetKind::Stack => get_named::<Stack, _>(session, target, global).await,
        GetKind::Component => get_named::<StackComponent, _>(session, target, global).await,
        GetKind::Connector => get_named::<ServiceConnector, _>(session, target, global).await,
        GetKind::Team => get_named::<Team, _>(session, target, global).await,
        GetKind::RoleAssignment => {
            let id = uuid_target(EntityKind::RoleAssignment, target)?;
            let (_, assignment) = present(session.reconciler::<RoleAssignment>().read(&id).await?)?;
            print_entity(&assignment, global);
            Ok(())
        }
        GetKind::User => {
            let id = EntityId::from(target);
            let user = session
                .store()
                .get_user(&id)
                .await
                .map_err(|e| CoreError::from_store(EntityRef::known(EntityKind::User, id), e))?;
            print_entity(&user, global);
            Ok(())
        }
        GetKind::Server => Ok(()),
    }
}

/// Ids are UUIDs; anything else is looked up as a name.
async fn get_named<R, S>(
    session: &Session<'_, S>,
    target: &str,
    global: &GlobalOpts,
) -> Result<(), CliError>
where
    R: Named + Serialize,
    S: RemoteStore + EntityStore<R> + ?Sized,
{
    let reconciler = session.reconciler::<R>();
    let entity = match EntityId::from(target) {
        id @ EntityId::Uuid(_) => match reconciler.read(&id).await? {
            Outcome::Present { entity, .. } => entity,
            _ => {
                return Err(CliError::NotFound {
                    kind: R::KIND,
                    identifier: target.to_owned(),
                });
            }
        },
        EntityId::Opaque(_) => reconciler.lookup_by_name(target).await?,
    };
    print_entity(&entity, global);
    Ok(())
}

fn uuid_target(kind: EntityKind, target: &str) -> Result<EntityId, CliError> {
    match EntityId::from(target) {
        id @ EntityId::Uuid(_) => Ok(id),
        EntityId::Opaque(_) => Err(CliError::Validation {
            field: "target".into(),
            reason: format!("{kind} records have no name; pass the id"),
        }),
    }
}

fn print_entity<T: Serialize>(entity: &T, global: &GlobalOpts) {
    output::print_output(&output::render_single(global.output, entity), global.quiet);
}
