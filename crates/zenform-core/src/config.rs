// ── Runtime connection configuration ──
//
// These types describe *how* to reach the server. They carry credential
// data and connection tuning, but never touch disk. The CLI builds a
// `ServerConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// How to authenticate with the server. Exactly one kind is ever set.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Service-account API key, exchanged for a token on connect.
    ApiKey(SecretString),
    /// Ready-to-use bearer token.
    ApiToken(SecretString),
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed test servers).
    DangerAcceptInvalid,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server URL (e.g., `https://zen.example.com`).
    pub url: Url,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// Per-request transport timeout. Pass deadlines are separate.
    pub timeout: Duration,
}

impl ServerConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(url: Url, auth: AuthCredentials) -> Self {
        Self {
            url,
            auth,
            tls: TlsVerification::default(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}
