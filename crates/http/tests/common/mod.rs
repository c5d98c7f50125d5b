//! Shared setup for gateway integration tests

use portal_core::MemoryStorage;
use portal_core::telemetry::{LogConfig, init_tracing};
use portal_http::{HeadlessNavigator, PortalClient, PortalClientBuilder};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

pub struct Harness {
    pub server: MockServer,
    pub client: PortalClient,
    pub navigator: Arc<HeadlessNavigator>,
}

/// Mock portal API plus a client that believes it is on `/profile`
pub async fn harness() -> Harness {
    // Several tests race to install the subscriber; only the first wins
    let _ = init_tracing(&LogConfig::dev());

    let server = MockServer::start().await;
    let navigator = Arc::new(HeadlessNavigator::at("/profile"));
    let client = client_for(&server, &navigator);

    Harness {
        server,
        client,
        navigator,
    }
}

pub fn client_for(server: &MockServer, navigator: &Arc<HeadlessNavigator>) -> PortalClient {
    builder_for(server, navigator).build().unwrap()
}

/// Client whose requests give up after `timeout`
pub fn timed_client(
    server: &MockServer,
    navigator: &Arc<HeadlessNavigator>,
    timeout: Duration,
) -> PortalClient {
    builder_for(server, navigator)
        .timeout(timeout)
        .build()
        .unwrap()
}

fn builder_for(server: &MockServer, navigator: &Arc<HeadlessNavigator>) -> PortalClientBuilder {
    PortalClient::builder()
        .base_url(server.uri())
        .storage(Arc::new(MemoryStorage::new()))
        .navigator(navigator.clone())
}

pub fn sign_in(client: &PortalClient, token: &str) {
    client
        .session()
        .set_session(token, &json!({"id": 7, "name": "Ada"}))
        .unwrap();
}
