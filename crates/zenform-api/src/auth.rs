use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Credentials for authenticating with the server.
///
/// Each variant carries the secret material needed for its auth flow.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Service-account API key. Exchanged for a short-lived access token
    /// through `POST /api/v1/login` before any entity call.
    ApiKey { key: SecretString },

    /// Pre-issued API token, sent as-is in the bearer header.
    ApiToken { token: SecretString },
}

impl Credentials {
    /// Human-readable name of the credential kind (never the secret).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiKey { .. } => "api-key",
            Self::ApiToken { .. } => "api-token",
        }
    }
}

/// Build the default header map carrying `Authorization: Bearer <token>`.
///
/// The header value is marked sensitive so it never shows up in
/// reqwest's debug output.
pub(crate) fn bearer_headers(token: &SecretString) -> Result<HeaderMap, Error> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret())).map_err(
        |e| Error::Authentication {
            message: format!("invalid token header value: {e}"),
        },
    )?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_is_sensitive() {
        let headers = bearer_headers(&SecretString::from("tok-123")).unwrap();
        let value = headers.get(AUTHORIZATION).unwrap();
        assert!(value.is_sensitive());
        assert_eq!(value.to_str().unwrap(), "Bearer tok-123");
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let creds = Credentials::ApiKey {
            key: SecretString::from("super-secret"),
        };
        assert!(!format!("{creds:?}").contains("super-secret"));
        assert_eq!(creds.kind(), "api-key");
    }
}
