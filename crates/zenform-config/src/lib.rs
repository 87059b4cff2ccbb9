//! Configuration for zenform.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `zenform_core::ServerConfig`. The CLI layers its
//! flag overrides on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use zenform_core::{AuthCredentials, ServerConfig, TlsVerification};

/// Keyring service name; entries are `<profile>/api-key` and
/// `<profile>/api-token`.
pub const KEYRING_SERVICE: &str = "zenform";

pub const ENV_API_KEY: &str = "ZENML_API_KEY";
pub const ENV_API_TOKEN: &str = "ZENML_API_TOKEN";
pub const ENV_SERVER_URL: &str = "ZENML_SERVER_URL";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    /// Per-request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Deadline for a whole reconciler pass, seconds.
    #[serde(default = "default_pass_timeout")]
    pub pass_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
            pass_timeout: default_pass_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_pass_timeout() -> u64 {
    120
}

/// A named server profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL (e.g., "https://zen.example.com").
    pub server_url: Option<String>,

    /// Service-account API key (plaintext; prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// Bearer API token (plaintext; prefer keyring or env var).
    pub api_token: Option<String>,

    /// Environment variable name containing the API token.
    pub api_token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "zenform", "zenform").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("zenform");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ZENFORM_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

impl Config {
    /// The named profile, or the default one. An unconfigured default
    /// profile resolves to an empty profile so env-only setups work.
    pub fn profile<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, Profile), ConfigError> {
        let default = self.default_profile.as_deref().unwrap_or("default");
        let name = name.unwrap_or(default);
        match self.profiles.get(name) {
            Some(profile) => Ok((name, profile.clone())),
            None if name == default => Ok((name, Profile::default())),
            None => Err(ConfigError::UnknownProfile { name: name.into() }),
        }
    }
}

// ── Credential sources ──────────────────────────────────────────────

/// Where secrets come from. The process environment and system keyring
/// in production; a fixed map in tests.
pub trait SecretSource {
    fn env(&self, name: &str) -> Option<String>;
    fn keyring(&self, entry: &str) -> Option<String>;
}

/// The process environment plus the system keyring.
pub struct SystemSecrets;

impl SecretSource for SystemSecrets {
    fn env(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }

    fn keyring(&self, entry: &str) -> Option<String> {
        keyring::Entry::new(KEYRING_SERVICE, entry)
            .ok()?
            .get_password()
            .ok()
    }
}

/// One credential kind and the places it may live.
struct CredentialChain<'a> {
    env_name: Option<&'a str>,
    well_known_env: &'static str,
    keyring_entry: String,
    plaintext: Option<&'a str>,
}

impl CredentialChain<'_> {
    /// Named env var → well-known env var → keyring → plaintext.
    fn resolve(&self, source: &dyn SecretSource) -> Option<SecretString> {
        self.env_name
            .and_then(|name| source.env(name))
            .or_else(|| source.env(self.well_known_env))
            .or_else(|| source.keyring(&self.keyring_entry))
            .or_else(|| self.plaintext.map(str::to_owned))
            .map(SecretString::from)
    }
}

/// Resolve exactly one of {API key, API token} for a profile.
pub fn resolve_auth(
    profile: &Profile,
    profile_name: &str,
    source: &dyn SecretSource,
) -> Result<AuthCredentials, ConfigError> {
    let api_key = CredentialChain {
        env_name: profile.api_key_env.as_deref(),
        well_known_env: ENV_API_KEY,
        keyring_entry: format!("{profile_name}/api-key"),
        plaintext: profile.api_key.as_deref(),
    }
    .resolve(source);
    let api_token = CredentialChain {
        env_name: profile.api_token_env.as_deref(),
        well_known_env: ENV_API_TOKEN,
        keyring_entry: format!("{profile_name}/api-token"),
        plaintext: profile.api_token.as_deref(),
    }
    .resolve(source);

    match (api_key, api_token) {
        (Some(key), None) => Ok(AuthCredentials::ApiKey(key)),
        (None, Some(token)) => Ok(AuthCredentials::ApiToken(token)),
        (Some(_), Some(_)) => Err(invalid(
            "api_key",
            "api_key and api_token are mutually exclusive; configure only one",
        )),
        (None, None) => Err(ConfigError::NoCredentials {
            profile: profile_name.into(),
        }),
    }
}

/// The profile's server URL, falling back to `ZENML_SERVER_URL`.
pub fn resolve_server_url(profile: &Profile, source: &dyn SecretSource) -> Result<Url, ConfigError> {
    let raw = profile
        .server_url
        .clone()
        .or_else(|| source.env(ENV_SERVER_URL))
        .ok_or_else(|| invalid("server_url", "not set"))?;
    parse_server_url(&raw)
}

/// An absolute http(s) URL.
pub fn parse_server_url(raw: &str) -> Result<Url, ConfigError> {
    let url: Url = raw
        .parse()
        .map_err(|_| invalid("server_url", format!("invalid URL: {raw}")))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(invalid(
            "server_url",
            format!("expected an http(s) URL, got '{raw}'"),
        )),
    }
}

/// Build a `ServerConfig` from a profile, no CLI flag overrides.
pub fn profile_to_server_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    source: &dyn SecretSource,
) -> Result<ServerConfig, ConfigError> {
    let url = resolve_server_url(profile, source)?;
    let auth = resolve_auth(profile, profile_name, source)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    Ok(ServerConfig {
        url,
        auth,
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    })
}
