use thiserror::Error;

/// Top-level error type for the `zenform-api` crate.
///
/// Covers every failure mode of the REST surface: authentication,
/// transport, structured API errors and response decoding.
/// `zenform-core` maps these into store-level failure classes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (bad API key, disabled service account, etc.)
    #[error("Login rejected: {message}")]
    Authentication { message: String },

    /// Credentials rejected by the server on a regular call (HTTP 401).
    #[error("Invalid or expired credentials")]
    InvalidCredentials,

    // ── Transport ───────────────────────────────────────────────────
    /// The request never produced a response: connect, DNS or body errors.
    #[error("Request to server failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("No response within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Building the TLS client or loading the CA bundle failed.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// Rate limited by the server. Includes retry-after in seconds.
    #[error("Server is throttling requests (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    // ── API ─────────────────────────────────────────────────────────
    /// Structured error returned by the server.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: u16,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// A response body did not match the expected shape; `body` keeps the raw text.
    #[error("Unexpected response body: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::InvalidCredentials => Some(401),
            Self::RateLimited { .. } => Some(429),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether re-sending the same request later could succeed: timeouts,
    /// refused connections, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// A 404 from the server.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
