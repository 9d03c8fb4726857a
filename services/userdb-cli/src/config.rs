//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The password is loaded from USERDB_PASSWORD or password_file, never
//! stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use session_auth::{AUTH_PREFIX, AuthEndpoints, LOGIN_PATH, REFRESH_BUFFER, REFRESH_PATH};
use session_client::SessionConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionSection,
    pub credentials: CredentialsConfig,
}

/// API server settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Token lifecycle settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub refresh_buffer_secs: u64,
    pub auth_prefix: String,
    pub login_path: String,
    pub refresh_path: String,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            refresh_buffer_secs: REFRESH_BUFFER.as_secs(),
            auth_prefix: AUTH_PREFIX.into(),
            login_path: LOGIN_PATH.into(),
            refresh_path: REFRESH_PATH.into(),
        }
    }
}

/// Login identity
#[derive(Debug, Deserialize)]
pub struct CredentialsConfig {
    pub username: String,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    /// Path to a file containing the password (alternative to USERDB_PASSWORD)
    #[serde(default)]
    pub password_file: Option<PathBuf>,
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Password resolution order:
    /// 1. USERDB_PASSWORD env var
    /// 2. password_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.api.base_url.starts_with("http://")
            && !config.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.api.base_url
            )));
        }

        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        for (name, path) in [
            ("auth_prefix", &config.session.auth_prefix),
            ("login_path", &config.session.login_path),
            ("refresh_path", &config.session.refresh_path),
        ] {
            if !path.starts_with('/') {
                return Err(common::Error::Config(format!(
                    "{name} must start with '/', got: {path}"
                )));
            }
        }

        if config.credentials.username.trim().is_empty() {
            return Err(common::Error::Config("username must not be empty".into()));
        }

        // Env var takes precedence over file
        if let Ok(password) = std::env::var("USERDB_PASSWORD") {
            config.credentials.password = Some(Secret::new(password));
        } else if let Some(ref password_file) = config.credentials.password_file {
            let password = std::fs::read_to_string(password_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read password_file {}: {e}",
                    password_file.display()
                ))
            })?;
            let password = password.trim().to_owned();
            if !password.is_empty() {
                config.credentials.password = Some(Secret::new(password));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("userdb.toml")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            endpoints: AuthEndpoints {
                prefix: self.session.auth_prefix.clone(),
                login: self.session.login_path.clone(),
                refresh: self.session.refresh_path.clone(),
            },
            refresh_buffer: Duration::from_secs(self.session.refresh_buffer_secs),
        }
    }
}
