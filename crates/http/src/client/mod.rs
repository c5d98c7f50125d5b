//! Portal HTTP client

pub mod auth;
pub mod error;
pub mod navigate;
pub mod options;
pub mod refresh;

use error::ClientError;
use navigate::{LoginRedirect, Navigator};
use options::RequestOptions;
use portal_core::{Clock, KeyValueStorage, SessionConfig, SessionStore, SystemClock};
use refresh::RefreshCoordinator;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug)]
struct Endpoints {
    refresh_path: String,
    logout_path: String,
    login_path: String,
    redirect: LoginRedirect,
}

/// Portal API client
///
/// Clones share the session, the navigator and the refresh coordinator, so a
/// burst of expired requests from any clone triggers a single refresh.
#[derive(Clone)]
pub struct PortalClient {
    client: Client,
    base_url: String,
    endpoints: Arc<Endpoints>,
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
    refresh: Arc<RefreshCoordinator>,
}

impl std::fmt::Debug for PortalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalClient")
            .field("base_url", &self.base_url)
            .field("endpoints", &self.endpoints)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

impl PortalClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> PortalClientBuilder {
        PortalClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The session this client reads tokens from
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// The refresh coordinator shared by this client and its clones
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.refresh
    }

    /// Whether a non-expired session is stored
    pub fn is_authenticated(&self) -> bool {
        self.session.is_valid()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build_request(
        &self,
        path: &str,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> RequestBuilder {
        let mut request = self
            .client
            .request(options.method.clone(), self.url(path))
            .headers(options.headers.clone());

        if let Some(token) = token.filter(|_| !options.has_authorization()) {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }

        with_credentials(request)
    }

    /// Send a request, recovering once from an expired token
    ///
    /// The stored token is attached unless `options` already carries an
    /// `Authorization` header. A `401` triggers the shared token refresh and
    /// one retry; every other response is returned as received.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionExpired`] when the refresh fails or the
    /// retry is rejected again. The session has been cleared and the host sent
    /// to the login page by then. Transport failures are returned as
    /// [`ClientError::Request`].
    pub async fn request(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Response, ClientError> {
        let token = self.session.get_token();
        let response = self
            .build_request(path, &options, token.as_deref())
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(path, method = %options.method, "Request unauthorized, refreshing token");
        let refreshed = self
            .refresh
            .run(|| {
                refresh::boxed(refresh::perform_refresh(
                    self.refresh_request(),
                    Arc::clone(&self.session),
                ))
            })
            .await;

        let token = match refreshed {
            Ok(token) => token,
            Err(err) => return Err(self.force_logout(&err.to_string())),
        };

        let retry = self
            .build_request(path, &options, Some(&token))
            .send()
            .await?;

        if retry.status() == StatusCode::UNAUTHORIZED {
            return Err(self.force_logout("request rejected after token refresh"));
        }

        Ok(retry)
    }

    fn refresh_request(&self) -> RequestBuilder {
        with_credentials(self.client.post(self.url(&self.endpoints.refresh_path)))
    }

    /// Drop the session and send the host to the login page
    fn force_logout(&self, reason: &str) -> ClientError {
        if let Err(err) = self.session.clear_session() {
            warn!("Failed to clear session: {err}");
        }

        let location = self.navigator.current_location();
        let redirect = &self.endpoints.redirect;
        let redirect_to = if redirect.is_login_location(&location) {
            location
        } else {
            let target = redirect.target(&location);
            self.navigator.navigate(&target);
            target
        };

        warn!(redirect_to = %redirect_to, "Session expired: {reason}");
        ClientError::SessionExpired { redirect_to }
    }

    /// Send a request and decode a JSON response
    ///
    /// # Errors
    ///
    /// Returns the gateway errors of [`Self::request`], a status error for
    /// non-success responses, or a decode error
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let response = self.request(path, options).await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    /// `GET` a JSON resource
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute_json(path, RequestOptions::get()).await
    }

    /// `POST` a JSON body and decode the JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let options = RequestOptions::new(Method::POST).json(body)?;
        self.execute_json(path, options).await
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn with_credentials(request: RequestBuilder) -> RequestBuilder {
    // Cookies ride along through the client's cookie store
    request
}

#[cfg(target_arch = "wasm32")]
fn with_credentials(request: RequestBuilder) -> RequestBuilder {
    request.fetch_credentials_include()
}

/// Builder for PortalClient
#[derive(Default)]
pub struct PortalClientBuilder {
    base_url: Option<String>,
    refresh_path: Option<String>,
    logout_path: Option<String>,
    login_path: Option<String>,
    login_redirect_path: Option<String>,
    // Browsers own both of these
    #[cfg_attr(target_arch = "wasm32", allow(dead_code))]
    timeout: Option<Duration>,
    #[cfg_attr(target_arch = "wasm32", allow(dead_code))]
    user_agent: Option<String>,
    session: Option<Arc<SessionStore>>,
    storage: Option<Arc<dyn KeyValueStorage>>,
    clock: Option<Arc<dyn Clock>>,
    session_config: Option<SessionConfig>,
    navigator: Option<Arc<dyn Navigator>>,
    coordinator: Option<Arc<RefreshCoordinator>>,
}

impl PortalClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the token refresh endpoint
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    /// Set the logout endpoint
    pub fn logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = Some(path.into());
        self
    }

    /// Set the login endpoint
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    /// Set the page unrecoverable sessions are redirected to
    pub fn login_redirect_path(mut self, path: impl Into<String>) -> Self {
        self.login_redirect_path = Some(path.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Use an existing session store
    ///
    /// Takes precedence over [`Self::storage`], [`Self::clock`] and
    /// [`Self::session_config`].
    pub fn session(mut self, session: Arc<SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Persist the session in `storage`
    pub fn storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Stamp session expiry with `clock`
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the session lifetime settings
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = Some(config);
        self
    }

    /// Set the navigator used for login redirects
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Share a refresh coordinator with other clients
    pub fn coordinator(mut self, coordinator: Arc<RefreshCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<PortalClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let session = match self.session {
            Some(session) => session,
            None => {
                let storage = self.storage.unwrap_or_else(default_storage);
                let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
                let config = self.session_config.unwrap_or_default();
                Arc::new(SessionStore::with_config(storage, clock, &config)?)
            }
        };

        let endpoints = Endpoints {
            refresh_path: self
                .refresh_path
                .unwrap_or_else(|| "/api/users/refresh".to_string()),
            logout_path: self
                .logout_path
                .unwrap_or_else(|| "/api/users/logout".to_string()),
            login_path: self
                .login_path
                .unwrap_or_else(|| "/api/users/login".to_string()),
            redirect: self
                .login_redirect_path
                .map(LoginRedirect::new)
                .unwrap_or_default(),
        };

        let mut client_builder = ClientBuilder::new();

        #[cfg(not(target_arch = "wasm32"))]
        {
            client_builder = client_builder.cookie_store(true);

            if let Some(timeout) = self.timeout {
                client_builder = client_builder.timeout(timeout);
            }

            let user_agent = self
                .user_agent
                .unwrap_or_else(|| concat!("portal-http/", env!("CARGO_PKG_VERSION")).to_string());
            client_builder = client_builder.user_agent(user_agent);
        }

        let client = client_builder.build()?;

        Ok(PortalClient {
            client,
            base_url,
            endpoints: Arc::new(endpoints),
            session,
            navigator: self.navigator.unwrap_or_else(default_navigator),
            refresh: self.coordinator.unwrap_or_default(),
        })
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn default_storage() -> Arc<dyn KeyValueStorage> {
    Arc::new(portal_core::MemoryStorage::new())
}

#[cfg(target_arch = "wasm32")]
fn default_storage() -> Arc<dyn KeyValueStorage> {
    Arc::new(portal_core::BrowserStorage::new())
}

#[cfg(not(target_arch = "wasm32"))]
fn default_navigator() -> Arc<dyn Navigator> {
    Arc::new(navigate::HeadlessNavigator::new())
}

#[cfg(target_arch = "wasm32")]
fn default_navigator() -> Arc<dyn Navigator> {
    Arc::new(navigate::BrowserNavigator)
}
