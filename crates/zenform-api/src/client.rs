// Hand-crafted async HTTP client for the server REST API.
//
// Base path: /api/v1/
// Auth: Authorization: Bearer <token> (API keys are exchanged for a token first)

use std::future::Future;

use reqwest::header::RETRY_AFTER;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::{Credentials, bearer_headers};
use crate::transport::TransportConfig;
use crate::types;
use crate::Error;

// ── Error response shape ─────────────────────────────────────────────

/// The server reports failures as `{"detail": ...}` where `detail` is a
/// string, or a `[ExceptionName, message]` pair.
#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

impl ErrorResponse {
    fn split(self) -> (Option<String>, Option<String>) {
        match self.detail {
            Some(serde_json::Value::String(msg)) => (Some(msg), None),
            Some(serde_json::Value::Array(parts)) => {
                let mut strings = parts
                    .into_iter()
                    .filter_map(|p| p.as_str().map(str::to_owned));
                match (strings.next(), strings.next()) {
                    (Some(code), Some(msg)) => (Some(msg), Some(code)),
                    (Some(msg), None) => (Some(msg), None),
                    _ => (None, None),
                }
            }
            Some(other) => (Some(other.to_string()), None),
            None => (None, None),
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the server REST API.
///
/// Uses bearer-token authentication and communicates via JSON REST
/// endpoints under `/api/v1/`.
pub struct ZenmlClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ZenmlClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from whichever credential kind was configured.
    ///
    /// API tokens are used directly; API keys go through [`login`](Self::login).
    pub async fn connect(
        base_url: &str,
        credentials: &Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        match credentials {
            Credentials::ApiToken { token } => Self::from_token(base_url, token, transport),
            Credentials::ApiKey { key } => Self::login(base_url, key, transport).await,
        }
    }

    /// Build from a ready-to-use bearer token.
    ///
    /// Injects `Authorization: Bearer` as a default header on every request.
    pub fn from_token(
        base_url: &str,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client_with_headers(bearer_headers(token)?)?;
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Exchange an API key for an access token, then build an
    /// authenticated client from it.
    ///
    /// `POST /api/v1/login` with the key as the `password` form field.
    pub async fn login(
        base_url: &str,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let base = Self::normalize_base_url(base_url)?;
        let anonymous = transport.build_client()?;
        let url = base.join("v1/login")?;
        debug!("POST {url} (api key exchange)");

        let resp = anonymous
            .post(url)
            .form(&[("password", api_key.expose_secret())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&raw)
                .ok()
                .and_then(|e| e.split().0)
                .unwrap_or_else(|| status.to_string());
            return Err(Error::Authentication { message });
        }

        let login: types::LoginResponse = Self::decode(resp).await?;
        debug!(expires_in = ?login.expires_in, "api key exchanged for access token");
        let token = SecretString::from(login.access_token);
        let http = transport.build_client_with_headers(bearer_headers(&token)?)?;
        Ok(Self {
            http,
            base_url: base,
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Build the base URL ending in `/api/`.
    ///
    /// Accepts `https://host`, `https://host/`, `https://host/api` and
    /// `https://host/api/v1` alike.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;

        let mut path = url.path().trim_end_matches('/').to_owned();
        if let Some(stripped) = path.strip_suffix("/v1") {
            path = stripped.to_owned();
        }

        if path.ends_with("/api") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/api/"));
        }

        Ok(url)
    }

    /// The normalized `…/api/` base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a relative path (e.g. `"v1/stacks"`) onto the base URL.
    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        self.handle_response(resp).await
    }

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(params).send().await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        self.handle_response(resp).await
    }

    async fn post_no_response<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        self.handle_empty(resp).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("PUT {url}");

        let resp = self.http.put(url).json(body).send().await?;
        self.handle_response(resp).await
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("DELETE {url}");

        let resp = self.http.delete(url).send().await?;
        self.handle_empty(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            Self::decode(resp).await
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }

    async fn handle_empty(&self, resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn parse_error(&self, status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Error::InvalidCredentials;
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Error::RateLimited { retry_after_secs };
        }

        let raw = resp.text().await.unwrap_or_default();

        let (message, code) = serde_json::from_str::<ErrorResponse>(&raw)
            .map(ErrorResponse::split)
            .unwrap_or((None, None));

        Error::Api {
            status: status.as_u16(),
            message: message.unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                }
            }),
            code,
        }
    }

    // ── Pagination helper ────────────────────────────────────────────

    /// Collect all pages into a single `Vec<T>`.
    pub async fn paginate_all<T, F, Fut>(&self, size: u32, fetch: F) -> Result<Vec<T>, Error>
    where
        F: Fn(u32, u32) -> Fut,
        Fut: Future<Output = Result<types::Page<T>, Error>>,
    {
        let mut all = Vec::new();
        let mut index: u32 = 1;

        loop {
            let page = fetch(index, size).await?;
            let received = page.items.len();
            all.extend(page.items);

            if received == 0 || index >= page.total_pages {
                break;
            }

            index += 1;
        }

        Ok(all)
    }

    fn list_params(name: Option<&str>, page: u32, size: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![("page", page.to_string()), ("size", size.to_string())];
        if let Some(name) = name {
            params.push(("name", name.to_owned()));
        }
        params
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Server ───────────────────────────────────────────────────────

    pub async fn get_server_info(&self) -> Result<types::ServerInfoResponse, Error> {
        self.get("v1/info").await
    }

    // ── Users ────────────────────────────────────────────────────────

    pub async fn get_user(&self, user_id: &str) -> Result<types::UserResponse, Error> {
        self.get(&format!("v1/users/{user_id}")).await
    }

    // ── Workspaces ───────────────────────────────────────────────────

    pub async fn list_workspaces(
        &self,
        name: Option<&str>,
        page: u32,
        size: u32,
    ) -> Result<types::Page<types::WorkspaceResponse>, Error> {
        self.get_with_params("v1/workspaces", &Self::list_params(name, page, size))
            .await
    }

    pub async fn get_workspace(&self, id: &str) -> Result<types::WorkspaceResponse, Error> {
        self.get(&format!("v1/workspaces/{id}")).await
    }

    pub async fn create_workspace(
        &self,
        body: &types::WorkspaceRequest,
    ) -> Result<types::WorkspaceResponse, Error> {
        self.post("v1/workspaces", body).await
    }

    pub async fn update_workspace(
        &self,
        id: &str,
        body: &types::WorkspaceUpdate,
    ) -> Result<types::WorkspaceResponse, Error> {
        self.put(&format!("v1/workspaces/{id}"), body).await
    }

    pub async fn delete_workspace(&self, id: &str) -> Result<(), Error> {
        self.delete(&format!("v1/workspaces/{id}")).await
    }

    // ── Projects ─────────────────────────────────────────────────────

    pub async fn list_projects(
        &self,
        name: Option<&str>,
        page: u32,
        size: u32,
    ) -> Result<types::Page<types::ProjectResponse>, Error> {
        self.get_with_params("v1/projects", &Self::list_params(name, page, size))
            .await
    }

    pub async fn get_project(&self, id: &str) -> Result<types::ProjectResponse, Error> {
        self.get(&format!("v1/projects/{id}")).await
    }

    pub async fn create_project(
        &self,
        body: &types::ProjectRequest,
    ) -> Result<types::ProjectResponse, Error> {
        self.post("v1/projects", body).await
    }

    pub async fn update_project(
        &self,
        id: &str,
        body: &types::ProjectUpdate,
    ) -> Result<types::ProjectResponse, Error> {
        self.put(&format!("v1/projects/{id}"), body).await
    }

    pub async fn delete_project(&self, id: &str) -> Result<(), Error> {
        self.delete(&format!("v1/projects/{id}")).await
    }

    // ── Stacks ───────────────────────────────────────────────────────

    pub async fn list_stacks(
        &self,
        name: Option<&str>,
        page: u32,
        size: u32,
    ) -> Result<types::Page<types::StackResponse>, Error> {
        self.get_with_params("v1/stacks", &Self::list_params(name, page, size))
            .await
    }

    pub async fn get_stack(&self, id: &str) -> Result<types::StackResponse, Error> {
        self.get(&format!("v1/stacks/{id}")).await
    }

    pub async fn create_stack(
        &self,
        body: &types::StackRequest,
    ) -> Result<types::StackResponse, Error> {
        self.post("v1/stacks", body).await
    }

    pub async fn update_stack(
        &self,
        id: &str,
        body: &types::StackUpdate,
    ) -> Result<types::StackResponse, Error> {
        self.put(&format!("v1/stacks/{id}"), body).await
    }

    pub async fn delete_stack(&self, id: &str) -> Result<(), Error> {
        self.delete(&format!("v1/stacks/{id}")).await
    }

    // ── Stack components ─────────────────────────────────────────────

    pub async fn list_components(
        &self,
        name: Option<&str>,
        page: u32,
        size: u32,
    ) -> Result<types::Page<types::ComponentResponse>, Error> {
        self.get_with_params("v1/components", &Self::list_params(name, page, size))
            .await
    }

    pub async fn get_component(&self, id: &str) -> Result<types::ComponentResponse, Error> {
        self.get(&format!("v1/components/{id}")).await
    }

    pub async fn create_component(
        &self,
        body: &types::ComponentRequest,
    ) -> Result<types::ComponentResponse, Error> {
        self.post("v1/components", body).await
    }

    pub async fn update_component(
        &self,
        id: &str,
        body: &types::ComponentUpdate,
    ) -> Result<types::ComponentResponse, Error> {
        self.put(&format!("v1/components/{id}"), body).await
    }

    pub async fn delete_component(&self, id: &str) -> Result<(), Error> {
        self.delete(&format!("v1/components/{id}")).await
    }

    // ── Service connectors ───────────────────────────────────────────

    pub async fn list_service_connectors(
        &self,
        name: Option<&str>,
        page: u32,
        size: u32,
    ) -> Result<types::Page<types::ConnectorResponse>, Error> {
        self.get_with_params(
            "v1/service_connectors",
            &Self::list_params(name, page, size),
        )
        .await
    }

    pub async fn get_service_connector(
        &self,
        id: &str,
    ) -> Result<types::ConnectorResponse, Error> {
        self.get(&format!("v1/service_connectors/{id}")).await
    }

    pub async fn create_service_connector(
        &self,
        body: &types::ConnectorRequest,
    ) -> Result<types::ConnectorResponse, Error> {
        self.post("v1/service_connectors", body).await
    }

    pub async fn update_service_connector(
        &self,
        id: &str,
        body: &types::ConnectorUpdate,
    ) -> Result<types::ConnectorResponse, Error> {
        self.put(&format!("v1/service_connectors/{id}"), body).await
    }

    pub async fn delete_service_connector(&self, id: &str) -> Result<(), Error> {
        self.delete(&format!("v1/service_connectors/{id}")).await
    }

    // ── Teams ────────────────────────────────────────────────────────

    pub async fn list_teams(
        &self,
        name: Option<&str>,
        page: u32,
        size: u32,
    ) -> Result<types::Page<types::TeamResponse>, Error> {
        self.get_with_params("v1/teams", &Self::list_params(name, page, size))
            .await
    }

    pub async fn get_team(&self, id: &str) -> Result<types::TeamResponse, Error> {
        self.get(&format!("v1/teams/{id}")).await
    }

    pub async fn create_team(&self, body: &types::TeamRequest) -> Result<types::TeamResponse, Error> {
        self.post("v1/teams", body).await
    }

    pub async fn update_team(
        &self,
        id: &str,
        body: &types::TeamUpdate,
    ) -> Result<types::TeamResponse, Error> {
        self.put(&format!("v1/teams/{id}"), body).await
    }

    pub async fn delete_team(&self, id: &str) -> Result<(), Error> {
        self.delete(&format!("v1/teams/{id}")).await
    }

    pub async fn list_team_members(
        &self,
        team_id: &str,
        page: u32,
        size: u32,
    ) -> Result<types::Page<types::UserResponse>, Error> {
        self.get_with_params(
            &format!("v1/teams/{team_id}/members"),
            &Self::list_params(None, page, size),
        )
        .await
    }

    pub async fn add_team_member(&self, team_id: &str, user_id: &str) -> Result<(), Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            user_id: &'a str,
        }

        self.post_no_response(&format!("v1/teams/{team_id}/members"), &Body { user_id })
            .await
    }

    pub async fn remove_team_member(&self, team_id: &str, user_id: &str) -> Result<(), Error> {
        self.delete(&format!("v1/teams/{team_id}/members/{user_id}"))
            .await
    }

    // ── Role assignments ─────────────────────────────────────────────

    pub async fn list_role_assignments(
        &self,
        resource_id: Option<&str>,
        page: u32,
        size: u32,
    ) -> Result<types::Page<types::RoleAssignmentResponse>, Error> {
        let mut params = Self::list_params(None, page, size);
        if let Some(resource_id) = resource_id {
            params.push(("resource_id", resource_id.to_owned()));
        }
        self.get_with_params("v1/role_assignments", &params).await
    }

    pub async fn get_role_assignment(
        &self,
        id: &str,
    ) -> Result<types::RoleAssignmentResponse, Error> {
        self.get(&format!("v1/role_assignments/{id}")).await
    }

    pub async fn create_role_assignment(
        &self,
        body: &types::RoleAssignmentRequest,
    ) -> Result<types::RoleAssignmentResponse, Error> {
        self.post("v1/role_assignments", body).await
    }

    pub async fn update_role_assignment(
        &self,
        id: &str,
        body: &types::RoleAssignmentUpdate,
    ) -> Result<types::RoleAssignmentResponse, Error> {
        self.put(&format!("v1/role_assignments/{id}"), body).await
    }

    pub async fn delete_role_assignment(&self, id: &str) -> Result<(), Error> {
        self.delete(&format!("v1/role_assignments/{id}")).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::ZenmlClient;

    #[test]
    fn base_url_normalization_variants() {
        for raw in [
            "https://zen.example.com",
            "https://zen.example.com/",
            "https://zen.example.com/api",
            "https://zen.example.com/api/v1/",
        ] {
            let url = ZenmlClient::normalize_base_url(raw).unwrap();
            assert_eq!(url.as_str(), "https://zen.example.com/api/", "input {raw}");
        }
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let url = ZenmlClient::normalize_base_url("https://host/zenml").unwrap();
        assert_eq!(url.as_str(), "https://host/zenml/api/");
        assert_eq!(
            url.join("v1/stacks").unwrap().as_str(),
            "https://host/zenml/api/v1/stacks"
        );
    }
}
