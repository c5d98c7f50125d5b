//! Authentication API client methods

use super::{ClientError, PortalClient, with_credentials};
use crate::types::LoginResponse;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

impl PortalClient {
    /// Sign in and store the returned session
    ///
    /// The login call bypasses the refresh flow: a `401` here means the
    /// credentials were wrong, not that a token expired.
    ///
    /// # Errors
    ///
    /// Returns a status error if the server rejects the credentials, a decode
    /// error for an unexpected body, or a session error if the token cannot be
    /// stored
    pub async fn login<C>(&self, credentials: &C) -> Result<JsonValue, ClientError>
    where
        C: Serialize + ?Sized,
    {
        let request = self
            .client
            .post(self.url(&self.endpoints.login_path))
            .json(credentials);
        let response = with_credentials(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(ClientError::from_status(status, message));
        }

        let body: LoginResponse = response.json().await?;
        self.session.set_session(&body.token, &body.user)?;
        info!("Signed in");
        Ok(body.user)
    }

    /// Sign out locally, telling the server on a best-effort basis
    ///
    /// The local session is cleared whatever the server answers.
    ///
    /// # Errors
    ///
    /// Returns an error only if the local session cannot be cleared
    pub async fn logout(&self) -> Result<(), ClientError> {
        let mut request = self.client.post(self.url(&self.endpoints.logout_path));
        if let Some(token) = self.session.get_token() {
            request = request.bearer_auth(token);
        }

        match with_credentials(request).send().await {
            Ok(response) if !response.status().is_success() => {
                debug!(status = %response.status(), "Server-side logout rejected");
            }
            Ok(_) => {}
            Err(err) => debug!("Server-side logout failed: {err}"),
        }

        self.session.clear_session()?;
        info!("Signed out");
        Ok(())
    }
}
