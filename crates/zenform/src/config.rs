//! CLI configuration: a thin layer over `zenform_config` that applies
//! `GlobalOpts` flag overrides (--server, --api-key, --insecure, ...).

use std::time::Duration;

use secrecy::SecretString;

use zenform_config::{Config, Profile, SystemSecrets, config_path, load_config_from};
use zenform_core::{AuthCredentials, ServerConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything a server-bound command needs to connect and bound its passes.
#[derive(Debug)]
pub struct Resolved {
    pub profile: String,
    pub server: ServerConfig,
    pub pass_timeout: Duration,
}

/// Load the config file and resolve the active profile with flag overrides.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);
    let config = load_config_from(&path)?;
    resolve_with(&config, global)
}

fn resolve_with(config: &Config, global: &GlobalOpts) -> Result<Resolved, CliError> {
    let (name, mut profile) = config.profile(global.profile.as_deref())?;

    // 1. Server URL (flag > profile > ZENML_SERVER_URL)
    if let Some(ref url) = global.server {
        profile.server_url = Some(url.clone());
    }
    let url = zenform_config::resolve_server_url(&profile, &SystemSecrets)?;

    // 2. Credentials (flag > profile chain)
    let auth = match (&global.api_key, &global.api_token) {
        (Some(key), _) => AuthCredentials::ApiKey(SecretString::from(key.clone())),
        (None, Some(token)) => AuthCredentials::ApiToken(SecretString::from(token.clone())),
        (None, None) => zenform_config::resolve_auth(&profile, name, &SystemSecrets)?,
    };

    // 3. TLS verification
    let tls = tls_mode(&profile, global.insecure || config.defaults.insecure);

    // 4. Timeouts
    let timeout = global
        .timeout
        .or(profile.timeout)
        .unwrap_or(config.defaults.timeout);
    let pass_timeout = global.pass_timeout.unwrap_or(config.defaults.pass_timeout);

    Ok(Resolved {
        profile: name.to_owned(),
        server: ServerConfig {
            url,
            auth,
            tls,
            timeout: Duration::from_secs(timeout),
        },
        pass_timeout: Duration::from_secs(pass_timeout),
    })
}

fn tls_mode(profile: &Profile, insecure: bool) -> TlsVerification {
    if insecure || profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}

/// Pass deadline for commands that never contact the server.
pub fn offline_pass_timeout(global: &GlobalOpts) -> Duration {
    Duration::from_secs(global.pass_timeout.unwrap_or(120))
}
