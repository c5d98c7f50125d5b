//! Integration tests for the authenticated request gateway

mod common;

use common::{client_for, harness, sign_in, timed_client};
use portal_http::types::LoginRequest;
use portal_http::{ClientError, HeadlessNavigator, Navigator, PortalClient, RequestOptions};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REFRESH: &str = "/api/users/refresh";

async fn mount_refresh(server: &MockServer, response: ResponseTemplate, expected: u64) {
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(response)
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_records(server: &MockServer, token: &str, status: u16) {
    mount_get(server, "/api/records", token, status).await;
}

async fn mount_get(server: &MockServer, resource: &str, token: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(resource))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"records": []})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_stored_token_attached() {
    let h = harness().await;
    sign_in(&h.client, "old");
    mount_records(&h.server, "old", 200).await;

    let response = h
        .client
        .request("/api/records", RequestOptions::get())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_caller_authorization_kept() {
    let h = harness().await;
    sign_in(&h.client, "old");

    Mock::given(method("GET"))
        .and(path("/api/records"))
        .and(header("authorization", "Basic Zm9v"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    let options =
        RequestOptions::get().header(AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
    let response = h.client.request("/api/records", options).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_caller_authorization_kept_on_retry() {
    let h = harness().await;
    sign_in(&h.client, "old");
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200).set_body_json(json!({"token": "new"})),
        1,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/api/records"))
        .and(header("authorization", "Basic Zm9v"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/records"))
        .and(header("authorization", "Basic Zm9v"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/records"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let options =
        RequestOptions::get().header(AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
    let response = h.client.request("/api/records", options).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.client.session().get_token().as_deref(), Some("new"));
}

#[tokio::test]
async fn test_non_401_errors_pass_through() {
    let h = harness().await;
    sign_in(&h.client, "old");
    mount_refresh(&h.server, ResponseTemplate::new(200), 0).await;
    mount_records(&h.server, "old", 500).await;

    let response = h
        .client
        .request("/api/records", RequestOptions::get())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(h.client.session().get_token().as_deref(), Some("old"));
    assert!(h.navigator.history().is_empty());
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let h = harness().await;
    sign_in(&h.client, "old");
    for resource in ["/api/scores", "/api/users/stats"] {
        mount_get(&h.server, resource, "old", 401).await;
        mount_get(&h.server, resource, "new", 200).await;
    }
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"token": "new"}))
            .set_delay(Duration::from_millis(300)),
        1,
    )
    .await;

    let other = h.client.clone();
    let (a, b) = tokio::join!(
        h.client.request("/api/scores", RequestOptions::get()),
        other.request("/api/users/stats", RequestOptions::get()),
    );

    assert_eq!(a.unwrap().status(), StatusCode::OK);
    assert_eq!(b.unwrap().status(), StatusCode::OK);
    assert_eq!(h.client.coordinator().refresh_count(), 1);
    assert!(!h.client.coordinator().is_refreshing());
    assert_eq!(h.client.session().get_token().as_deref(), Some("new"));
    assert!(h.client.is_authenticated());

    // The user record survives a refresh
    assert_eq!(h.client.session().get_user().unwrap()["name"], "Ada");
}

#[tokio::test]
async fn test_refresh_retries_body_unchanged() {
    let h = harness().await;
    sign_in(&h.client, "old");
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200).set_body_json(json!({"token": "new"})),
        1,
    )
    .await;

    let message = json!({"to": "care-team", "text": "Refill please"});
    Mock::given(method("POST"))
        .and(path("/api/messages"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/messages"))
        .and(header("authorization", "Bearer new"))
        .and(body_json(&message))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&h.server)
        .await;

    let created: Value = h.client.post_json("/api/messages", &message).await.unwrap();
    assert_eq!(created["id"], 42);
}

#[tokio::test]
async fn test_second_401_forces_logout() {
    let h = harness().await;
    sign_in(&h.client, "old");
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200).set_body_json(json!({"token": "new"})),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/records"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&h.server)
        .await;

    let err = h
        .client
        .request("/api/records", RequestOptions::get())
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        ClientError::SessionExpired { redirect_to } if redirect_to == "/login?next=%2Fprofile"
    ));
    assert!(err.is_auth_expired());
    assert!(h.client.session().get_token().is_none());
    assert!(h.client.session().get_user().is_none());
    assert_eq!(h.navigator.history(), vec!["/login?next=%2Fprofile"]);
}

#[tokio::test]
async fn test_refresh_failure_clears_session_and_redirects() {
    let h = harness().await;
    sign_in(&h.client, "old");
    mount_records(&h.server, "old", 401).await;
    mount_refresh(&h.server, ResponseTemplate::new(500), 1).await;

    let err = h
        .client
        .request("/api/records", RequestOptions::get())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::SessionExpired { .. }));
    assert!(!h.client.is_authenticated());
    assert!(h.client.session().get_token().is_none());
    assert_eq!(h.navigator.current_location(), "/login?next=%2Fprofile");
}

#[tokio::test]
async fn test_refresh_without_token_is_failure() {
    let h = harness().await;
    sign_in(&h.client, "old");
    mount_records(&h.server, "old", 401).await;
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200).set_body_json(json!({"ok": true})),
        1,
    )
    .await;

    let err = h
        .client
        .request("/api/records", RequestOptions::get())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::SessionExpired { .. }));
    assert!(h.client.session().get_token().is_none());
}

#[tokio::test]
async fn test_anonymous_401_attempts_refresh() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/api/records"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    mount_refresh(&h.server, ResponseTemplate::new(401), 1).await;

    let err = h
        .client
        .request("/api/records", RequestOptions::get())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::SessionExpired { .. }));
}

#[tokio::test]
async fn test_no_redirect_loop_on_login_page() {
    let h = harness().await;
    h.navigator.set_location("/login?next=%2Fprofile");
    sign_in(&h.client, "old");
    mount_records(&h.server, "old", 401).await;
    mount_refresh(&h.server, ResponseTemplate::new(401), 1).await;

    let err = h
        .client
        .request("/api/records", RequestOptions::get())
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        ClientError::SessionExpired { redirect_to } if redirect_to == "/login?next=%2Fprofile"
    ));
    assert!(h.navigator.history().is_empty());
}

#[tokio::test]
async fn test_refresh_transport_failure_forces_logout() {
    let h = harness().await;
    let client = timed_client(&h.server, &h.navigator, Duration::from_millis(200));
    sign_in(&client, "old");
    mount_records(&h.server, "old", 401).await;
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"token": "new"}))
            .set_delay(Duration::from_secs(2)),
        1,
    )
    .await;

    let err = client
        .request("/api/records", RequestOptions::get())
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        ClientError::SessionExpired { redirect_to } if redirect_to == "/login?next=%2Fprofile"
    ));
    assert!(client.session().get_token().is_none());
    assert_eq!(h.navigator.history(), vec!["/login?next=%2Fprofile"]);
}

#[tokio::test]
async fn test_retry_transport_failure_propagates_and_keeps_session() {
    let h = harness().await;
    let client = timed_client(&h.server, &h.navigator, Duration::from_millis(200));
    sign_in(&client, "old");
    mount_records(&h.server, "old", 401).await;
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200).set_body_json(json!({"token": "new"})),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/records"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = client
        .request("/api/records", RequestOptions::get())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Request(_)));
    assert_eq!(client.session().get_token().as_deref(), Some("new"));
    assert!(client.is_authenticated());
    assert!(h.navigator.history().is_empty());
}

#[tokio::test]
async fn test_network_failure_propagates() {
    let client = PortalClient::builder()
        .base_url("http://127.0.0.1:1")
        .navigator(Arc::new(HeadlessNavigator::new()))
        .build()
        .unwrap();
    sign_in(&client, "old");

    let err = client
        .request("/api/records", RequestOptions::get())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Request(_)));
    assert_eq!(client.session().get_token().as_deref(), Some("old"));
}

#[tokio::test]
async fn test_execute_json_maps_status() {
    let h = harness().await;
    sign_in(&h.client, "old");
    Mock::given(method("GET"))
        .and(path("/api/appointments/9"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such appointment"))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .mount(&h.server)
        .await;

    let err = h
        .client
        .get_json::<Value>("/api/appointments/9")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound(message) if message == "no such appointment"));

    let me: Value = h.client.get_json("/api/users/me").await.unwrap();
    assert_eq!(me["id"], 7);
}

#[tokio::test]
async fn test_separate_clients_refresh_independently() {
    let h = harness().await;
    let other = client_for(&h.server, &h.navigator);
    assert!(!Arc::ptr_eq(h.client.coordinator(), other.coordinator()));

    sign_in(&h.client, "old");
    sign_in(&other, "old");
    mount_records(&h.server, "old", 401).await;
    mount_records(&h.server, "new", 200).await;
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"token": "new"}))
            .set_delay(Duration::from_millis(100)),
        2,
    )
    .await;

    let (a, b) = tokio::join!(
        h.client.request("/api/records", RequestOptions::get()),
        other.request("/api/records", RequestOptions::get()),
    );

    assert_eq!(a.unwrap().status(), StatusCode::OK);
    assert_eq!(b.unwrap().status(), StatusCode::OK);
    assert_eq!(h.client.coordinator().refresh_count(), 1);
    assert_eq!(other.coordinator().refresh_count(), 1);
}

#[tokio::test]
async fn test_login_stores_session() {
    let h = harness().await;
    let credentials = LoginRequest {
        username: "ada".into(),
        password: "hunter2".into(),
    };

    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .and(body_json(json!({"username": "ada", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "abc",
            "user": {"id": 7, "name": "Ada", "isAdmin": false}
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let user = h.client.login(&credentials).await.unwrap();
    assert_eq!(user["name"], "Ada");
    assert_eq!(h.client.session().get_token().as_deref(), Some("abc"));
    assert!(h.client.is_authenticated());
}

#[tokio::test]
async fn test_login_rejected() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&h.server)
        .await;
    mount_refresh(&h.server, ResponseTemplate::new(200), 0).await;

    let err = h
        .client
        .login(&json!({"username": "ada", "password": "nope"}))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::AuthenticationFailed(_)));
    assert!(!h.client.is_authenticated());
    assert!(h.navigator.history().is_empty());
}

#[tokio::test]
async fn test_logout_clears_even_when_server_fails() {
    let h = harness().await;
    sign_in(&h.client, "old");
    Mock::given(method("POST"))
        .and(path("/api/users/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client.logout().await.unwrap();
    assert!(h.client.session().get_token().is_none());
    assert!(!h.client.is_authenticated());
}
