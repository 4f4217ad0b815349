//! Integration tests for the reqwest transport against a local HTTP server

mod common;

use common::init_tracing;
use guess_tunes_client::feedback::{LOGIN_FAILED, error_message};
use guess_tunes_client::types::AccessToken;
use guess_tunes_client::{ApiClient, AuthSession, AuthStatus, ClientConfig};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> Arc<ApiClient> {
    init_tracing();
    let config = ClientConfig::builder().base_url(server.uri()).build();
    Arc::new(ApiClient::new(config).unwrap())
}

#[tokio::test]
async fn test_bearer_header_is_attached() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "john" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.token_store().set(Some(AccessToken::new("tok")));

    let profile: serde_json::Value = client.get_json("/api/users/profile/").await?;
    assert_eq!(profile["username"], "john");
    Ok(())
}

#[tokio::test]
async fn test_401_refresh_and_retry_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Token expired" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/refresh/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access": "fresh", "username": "john" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "john" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.token_store().set(Some(AccessToken::new("stale")));

    let response = client.get("/api/users/profile/").await.unwrap();
    assert!(response.is_success());
    assert_eq!(client.token_store().get(), Some(AccessToken::new("fresh")));
}

#[tokio::test]
async fn test_refresh_cookie_set_on_login_is_sent_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "refresh_token=r1; Path=/; HttpOnly")
                .set_body_json(json!({ "access": "a1", "username": "john" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/refresh/"))
        .and(header("cookie", "refresh_token=r1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access": "a2", "username": "john" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let session = AuthSession::new(Arc::clone(&client));
    session.login("john@42.fr", "secret").await.unwrap();

    let grant = client.refresh_access_token().await.unwrap();
    assert_eq!(grant.access, AccessToken::new("a2"));
}

#[tokio::test]
async fn test_login_error_payload_reaches_caller() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "Wrong email or password" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/refresh/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let session = AuthSession::start(Arc::clone(&client)).await;
    assert_eq!(session.status(), AuthStatus::Guest);

    let err = session.login("john@42.fr", "nope").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(error_message(&err, LOGIN_FAILED), "Wrong email or password");
}

#[tokio::test]
async fn test_incomplete_login_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "a1" })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let session = AuthSession::new(Arc::clone(&client));

    let err = session.login("john@42.fr", "secret").await.unwrap_err();
    assert_eq!(error_message(&err, "unused"), LOGIN_FAILED);
    assert_eq!(session.status(), AuthStatus::Loading);
    assert!(!client.token_store().is_present());
}

#[tokio::test]
async fn test_unreachable_server_is_a_network_error() {
    init_tracing();
    let config = ClientConfig::builder()
        .base_url("http://127.0.0.1:9")
        .build();
    let client = ApiClient::new(config).unwrap();

    let err = client.get("/api/users/profile/").await.unwrap_err();
    assert!(matches!(err, guess_tunes_client::ClientError::Network(_)));
    assert!(client.refresh_access_token().await.is_none());
}
