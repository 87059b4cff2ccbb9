// ── HTTP-backed store ──
//
// Adapts `ZenmlClient` to the store traits: desired records go out as
// request bodies, responses come back as canonical records, and every
// transport error is classified into a `StoreError`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::debug;

use zenform_api::{Credentials, TlsMode, TransportConfig, ZenmlClient};

use super::{EntityStore, ListFilter, MembershipStore, Page, StoreError};
use crate::config::{AuthCredentials, ServerConfig, TlsVerification};
use crate::convert::{decode, team_from_parts};
use crate::error::CoreError;
use crate::model::{
    Entity, EntityId, EntityKind, Project, RoleAssignment, ServiceConnector, Stack,
    StackComponent, Team, User, Workspace,
};

/// Page size used when the store walks every page itself.
const WALK_PAGE_SIZE: u32 = 100;

/// Store backed by the server REST API.
pub struct HttpStore {
    client: ZenmlClient,
}

impl HttpStore {
    pub fn new(client: ZenmlClient) -> Self {
        Self { client }
    }

    /// Authenticate against the configured server.
    pub async fn connect(config: &ServerConfig) -> Result<Self, CoreError> {
        let credentials = match &config.auth {
            AuthCredentials::ApiKey(key) => Credentials::ApiKey { key: key.clone() },
            AuthCredentials::ApiToken(token) => Credentials::ApiToken {
                token: token.clone(),
            },
        };
        let transport = TransportConfig {
            tls: match &config.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: config.timeout,
        };

        debug!(url = %config.url, auth = credentials.kind(), "connecting");
        let client = ZenmlClient::connect(config.url.as_str(), &credentials, &transport)
            .await
            .map_err(|e| CoreError::ConnectionFailed {
                url: config.url.to_string(),
                source: classify(e, None),
            })?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &ZenmlClient {
        &self.client
    }

    async fn members(&self, team: &str) -> Result<BTreeSet<EntityId>, StoreError> {
        let users = self
            .client
            .paginate_all(WALK_PAGE_SIZE, |index, size| {
                self.client.list_team_members(team, index, size)
            })
            .await
            .map_err(|e| classify(e, None))?;
        Ok(users.into_iter().map(|u| EntityId::from(u.id)).collect())
    }

    async fn team_with_members(
        &self,
        team: zenform_api::types::TeamResponse,
    ) -> Result<Team, StoreError> {
        let members = self.members(&team.id.to_string()).await?;
        Ok(team_from_parts(team, members))
    }
}

// ── Error classification ─────────────────────────────────────────────

/// Map a transport error onto a store failure class. A 404 only becomes
/// `NotFound` when the call was about one known entity.
fn classify(err: zenform_api::Error, target: Option<(EntityKind, &EntityId)>) -> StoreError {
    use zenform_api::Error as Api;

    if err.is_not_found() {
        if let Some((kind, id)) = target {
            return StoreError::NotFound {
                kind,
                id: id.clone(),
            };
        }
    }

    match err {
        Api::Authentication { .. } | Api::InvalidCredentials => StoreError::Unauthorized,
        Api::Timeout { .. } => StoreError::Timeout,
        Api::Transport(ref e) if e.is_timeout() => StoreError::Timeout,
        Api::Deserialization { message, .. } => StoreError::Decode(message),
        ref e if e.is_transient() => StoreError::Unavailable {
            status: e.status(),
            message: api_message(e),
        },
        e => StoreError::Rejected {
            status: e.status(),
            message: api_message(&e),
        },
    }
}

fn api_message(err: &zenform_api::Error) -> String {
    match err {
        zenform_api::Error::Api { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn page<W, T>(raw: zenform_api::types::Page<W>) -> Result<Page<T>, StoreError>
where
    T: TryFrom<W>,
    StoreError: From<T::Error>,
{
    Ok(Page {
        index: raw.index,
        total_pages: raw.total_pages,
        items: raw
            .items
            .into_iter()
            .map(decode)
            .collect::<Result<_, _>>()?,
    })
}

// ── Plain entities ───────────────────────────────────────────────────

macro_rules! http_entity_store {
    ($entity:ty, $kind:expr, $list:ident, $get:ident, $create:ident, $update:ident, $delete:ident) => {
        #[async_trait]
        impl EntityStore<$entity> for HttpStore {
            async fn create(
                &self,
                spec: &<$entity as Entity>::Spec,
            ) -> Result<$entity, StoreError> {
                debug!(kind = %$kind, "create");
                let resp = self
                    .client
                    .$create(&spec.into())
                    .await
                    .map_err(|e| classify(e, None))?;
                decode(resp)
            }

            async fn get(&self, id: &EntityId) -> Result<$entity, StoreError> {
                let resp = self
                    .client
                    .$get(&id.to_string())
                    .await
                    .map_err(|e| classify(e, Some(($kind, id))))?;
                decode(resp)
            }

            async fn update(
                &self,
                id: &EntityId,
                patch: &<$entity as Entity>::Patch,
            ) -> Result<$entity, StoreError> {
                debug!(kind = %$kind, %id, "update");
                let resp = self
                    .client
                    .$update(&id.to_string(), &patch.into())
                    .await
                    .map_err(|e| classify(e, Some(($kind, id))))?;
                decode(resp)
            }

            async fn delete(&self, id: &EntityId) -> Result<(), StoreError> {
                debug!(kind = %$kind, %id, "delete");
                self.client
                    .$delete(&id.to_string())
                    .await
                    .map_err(|e| classify(e, Some(($kind, id))))
            }

            async fn list(&self, filter: &ListFilter) -> Result<Page<$entity>, StoreError> {
                let raw = self
                    .client
                    .$list(filter.name.as_deref(), filter.page, filter.size)
                    .await
                    .map_err(|e| classify(e, None))?;
                page(raw)
            }
        }
    };
}

http_entity_store!(
    Workspace,
    EntityKind::Workspace,
    list_workspaces,
    get_workspace,
    create_workspace,
    update_workspace,
    delete_workspace
);
http_entity_store!(
    Project,
    EntityKind::Project,
    list_projects,
    get_project,
    create_project,
    update_project,
    delete_project
);
http_entity_store!(
    Stack,
    EntityKind::Stack,
    list_stacks,
    get_stack,
    create_stack,
    update_stack,
    delete_stack
);
http_entity_store!(
    StackComponent,
    EntityKind::StackComponent,
    list_components,
    get_component,
    create_component,
    update_component,
    delete_component
);
http_entity_store!(
    ServiceConnector,
    EntityKind::ServiceConnector,
    list_service_connectors,
    get_service_connector,
    create_service_connector,
    update_service_connector,
    delete_service_connector
);

// ── Teams ────────────────────────────────────────────────────────────

#[async_trait]
impl EntityStore<Team> for HttpStore {
    /// Members are not part of the create call; a fresh team is empty.
    async fn create(&self, spec: &<Team as Entity>::Spec) -> Result<Team, StoreError> {
        debug!(kind = %EntityKind::Team, "create");
        let resp = self
            .client
            .create_team(&spec.into())
            .await
            .map_err(|e| classify(e, None))?;
        Ok(team_from_parts(resp, BTreeSet::new()))
    }

    async fn get(&self, id: &EntityId) -> Result<Team, StoreError> {
        let resp = self
            .client
            .get_team(&id.to_string())
            .await
            .map_err(|e| classify(e, Some((EntityKind::Team, id))))?;
        self.team_with_members(resp).await
    }

    async fn update(
        &self,
        id: &EntityId,
        patch: &<Team as Entity>::Patch,
    ) -> Result<Team, StoreError> {
        debug!(kind = %EntityKind::Team, %id, "update");
        let resp = self
            .client
            .update_team(&id.to_string(), &patch.into())
            .await
            .map_err(|e| classify(e, Some((EntityKind::Team, id))))?;
        self.team_with_members(resp).await
    }

    async fn delete(&self, id: &EntityId) -> Result<(), StoreError> {
        debug!(kind = %EntityKind::Team, %id, "delete");
        self.client
            .delete_team(&id.to_string())
            .await
            .map_err(|e| classify(e, Some((EntityKind::Team, id))))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Page<Team>, StoreError> {
        let raw = self
            .client
            .list_teams(filter.name.as_deref(), filter.page, filter.size)
            .await
            .map_err(|e| classify(e, None))?;
        let mut items = Vec::with_capacity(raw.items.len());
        for team in raw.items {
            items.push(self.team_with_members(team).await?);
        }
        Ok(Page {
            index: raw.index,
            total_pages: raw.total_pages,
            items,
        })
    }
}

// ── Role assignments ─────────────────────────────────────────────────

#[async_trait]
impl EntityStore<RoleAssignment> for HttpStore {
    async fn create(
        &self,
        spec: &<RoleAssignment as Entity>::Spec,
    ) -> Result<RoleAssignment, StoreError> {
        debug!(kind = %EntityKind::RoleAssignment, "create");
        let resp = self
            .client
            .create_role_assignment(&spec.into())
            .await
            .map_err(|e| classify(e, None))?;
        decode(resp)
    }

    async fn get(&self, id: &EntityId) -> Result<RoleAssignment, StoreError> {
        let resp = self
            .client
            .get_role_assignment(&id.to_string())
            .await
            .map_err(|e| classify(e, Some((EntityKind::RoleAssignment, id))))?;
        decode(resp)
    }

    async fn update(
        &self,
        id: &EntityId,
        patch: &<RoleAssignment as Entity>::Patch,
    ) -> Result<RoleAssignment, StoreError> {
        debug!(kind = %EntityKind::RoleAssignment, %id, "update");
        let resp = self
            .client
            .update_role_assignment(&id.to_string(), &patch.into())
            .await
            .map_err(|e| classify(e, Some((EntityKind::RoleAssignment, id))))?;
        decode(resp)
    }

    async fn delete(&self, id: &EntityId) -> Result<(), StoreError> {
        debug!(kind = %EntityKind::RoleAssignment, %id, "delete");
        self.client
            .delete_role_assignment(&id.to_string())
            .await
            .map_err(|e| classify(e, Some((EntityKind::RoleAssignment, id))))
    }

    /// Role assignments have no name; the filter's name is ignored.
    async fn list(&self, filter: &ListFilter) -> Result<Page<RoleAssignment>, StoreError> {
        let raw = self
            .client
            .list_role_assignments(None, filter.page, filter.size)
            .await
            .map_err(|e| classify(e, None))?;
        page(raw)
    }
}

// ── Users and membership ─────────────────────────────────────────────

#[async_trait]
impl MembershipStore for HttpStore {
    async fn get_user(&self, id: &EntityId) -> Result<User, StoreError> {
        let resp = self
            .client
            .get_user(&id.to_string())
            .await
            .map_err(|e| classify(e, Some((EntityKind::User, id))))?;
        Ok(User::from(resp))
    }

    async fn list_members(&self, team: &EntityId) -> Result<BTreeSet<EntityId>, StoreError> {
        self.members(&team.to_string()).await.map_err(|e| match e {
            StoreError::Rejected {
                status: Some(404), ..
            } => StoreError::NotFound {
                kind: EntityKind::Team,
                id: team.clone(),
            },
            other => other,
        })
    }

    // A 404 here may name the team or the user, so it stays a rejection.
    async fn add_member(&self, team: &EntityId, user: &EntityId) -> Result<(), StoreError> {
        debug!(%team, %user, "add team member");
        self.client
            .add_team_member(&team.to_string(), &user.to_string())
            .await
            .map_err(|e| classify(e, None))
    }

    async fn remove_member(&self, team: &EntityId, user: &EntityId) -> Result<(), StoreError> {
        debug!(%team, %user, "remove team member");
        self.client
            .remove_team_member(&team.to_string(), &user.to_string())
            .await
            .map_err(|e| classify(e, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> zenform_api::Error {
        zenform_api::Error::Api {
            message: "boom".into(),
            code: None,
            status,
        }
    }

    #[test]
    fn not_found_needs_a_target() {
        let id = EntityId::from("s1");
        assert_eq!(
            classify(api(404), Some((EntityKind::Stack, &id))),
            StoreError::NotFound {
                kind: EntityKind::Stack,
                id: id.clone(),
            }
        );
        assert!(matches!(
            classify(api(404), None),
            StoreError::Rejected {
                status: Some(404),
                ..
            }
        ));
    }

    #[test]
    fn status_classes_map_to_store_errors() {
        assert!(matches!(
            classify(api(503), None),
            StoreError::Unavailable {
                status: Some(503),
                ..
            }
        ));
        assert!(matches!(
            classify(api(409), None),
            StoreError::Rejected {
                status: Some(409),
                ..
            }
        ));
        assert_eq!(
            classify(zenform_api::Error::InvalidCredentials, None),
            StoreError::Unauthorized
        );
        assert_eq!(
            classify(zenform_api::Error::Timeout { timeout_secs: 3 }, None),
            StoreError::Timeout
        );
    }
}
