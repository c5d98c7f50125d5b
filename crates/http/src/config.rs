//! Gateway configuration
//!
//! Layered the usual way: built-in defaults, then an optional file, then
//! `PORTAL_*` environment variables (`__` separates nested keys, e.g.
//! `PORTAL_SESSION__TTL_SECS=1800`).

use crate::client::PortalClientBuilder;
use crate::client::error::ClientError;
use ::config::{Config, Environment, File};
use portal_core::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Origin of the portal API, e.g. `https://portal.example.org`
    pub base_url: String,

    /// Endpoint exchanging the refresh cookie for a new bearer token
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Best-effort server-side logout
    #[serde(default = "default_logout_path")]
    pub logout_path: String,

    /// Credential login
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Page to send the user to when the session cannot be recovered
    #[serde(default = "default_login_redirect_path")]
    pub login_redirect_path: String,

    /// Client-wide request timeout in seconds; unset means no timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// User agent sent on native hosts
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub session: SessionConfig,
}

fn default_refresh_path() -> String {
    "/api/users/refresh".to_string()
}

fn default_logout_path() -> String {
    "/api/users/logout".to_string()
}

fn default_login_path() -> String {
    "/api/users/login".to_string()
}

fn default_login_redirect_path() -> String {
    "/login".to_string()
}

fn default_user_agent() -> String {
    concat!("portal-http/", env!("CARGO_PKG_VERSION")).to_string()
}

impl GatewayConfig {
    /// Configuration with defaults for everything but the base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            login_path: default_login_path(),
            login_redirect_path: default_login_redirect_path(),
            timeout_secs: None,
            user_agent: default_user_agent(),
            session: SessionConfig::default(),
        }
    }

    /// Load configuration from a file, with environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the result
    /// fails validation
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("PORTAL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `PORTAL_*` environment variables alone
    ///
    /// # Errors
    ///
    /// Returns an error if `PORTAL_BASE_URL` is missing or a value cannot be
    /// parsed
    pub fn from_env() -> Result<Self, ClientError> {
        let settings = Config::builder()
            .add_source(
                Environment::with_prefix("PORTAL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] describing the first problem
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Configuration("base_url is required".into()));
        }
        url::Url::parse(&self.base_url).map_err(|e| {
            ClientError::Configuration(format!("base_url {:?} is not a URL: {e}", self.base_url))
        })?;

        for (name, path) in [
            ("refresh_path", &self.refresh_path),
            ("logout_path", &self.logout_path),
            ("login_path", &self.login_path),
            ("login_redirect_path", &self.login_redirect_path),
        ] {
            if !path.starts_with('/') {
                return Err(ClientError::Configuration(format!(
                    "{name} must start with '/', got {path:?}"
                )));
            }
        }

        if self.timeout_secs == Some(0) {
            return Err(ClientError::Configuration(
                "timeout_secs must be positive when set".into(),
            ));
        }

        self.session
            .validate()
            .map_err(|e| ClientError::Configuration(e.to_string()))
    }

    /// Request timeout, if configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// A client builder preloaded with this configuration
    pub fn client_builder(&self) -> PortalClientBuilder {
        let builder = PortalClientBuilder::default()
            .base_url(&self.base_url)
            .refresh_path(&self.refresh_path)
            .logout_path(&self.logout_path)
            .login_path(&self.login_path)
            .login_redirect_path(&self.login_redirect_path)
            .user_agent(&self.user_agent)
            .session_config(self.session.clone());

        match self.timeout() {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }
}
