//! HTTP endpoint tests.

mod common;

use axum::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use axum_test::TestServer;
use base64::Engine;
use common::*;
use oauth2_authz_server::api::app;
use oauth2_authz_server::oauth2::OAuth2State;
use serde_json::{Value, json};
use time::Duration;

async fn create_test_server() -> (TestServer, OAuth2State) {
    let state = create_test_state().await;
    let server = TestServer::new(app(state.clone())).expect("create test server");
    (server, state)
}

fn basic(client_id: &str, secret: &str) -> HeaderValue {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{client_id}:{secret}"));
    HeaderValue::from_str(&format!("Basic {encoded}")).unwrap()
}

// =============================================================================
// Token Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_token_exchange_scenario() {
    let (server, state) = create_test_server().await;
    let code = authorize_code(&state).await;

    let response = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", CLIENT_REDIRECT_URI),
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
        ])
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], "604800");
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refresh_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body.get("scope").is_none());
}

#[tokio::test]
async fn test_token_with_basic_auth() {
    let (server, _state) = create_test_server().await;

    let response = server
        .post("/oauth2/token")
        .add_header(AUTHORIZATION, basic(CLIENT_ID, CLIENT_SECRET))
        .form(&[
            ("grant_type", "password"),
            ("username", USERNAME),
            ("password", PASSWORD),
        ])
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["expires_in"], "604800");
}

#[tokio::test]
async fn test_token_invalid_client_is_unauthorized() {
    let (server, _state) = create_test_server().await;

    let response = server
        .post("/oauth2/token")
        .add_header(AUTHORIZATION, basic(CLIENT_ID, "wrong"))
        .form(&[
            ("grant_type", "password"),
            ("username", USERNAME),
            ("password", PASSWORD),
        ])
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(
        body,
        json!({
            "error": "invalid_client",
            "error_description": "The client credentials are invalid",
        })
    );
}

#[tokio::test]
async fn test_token_unsupported_grant_type() {
    let (server, _state) = create_test_server().await;

    let response = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "implicit"),
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
        ])
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "unsupported_grant_type");
    assert_eq!(body["error_description"], "Grant type \"implicit\" not supported");
}

#[tokio::test]
async fn test_token_refresh_not_found() {
    let (server, _state) = create_test_server().await;

    let response = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", "nonexistent"),
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
        ])
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_grant");
    assert_eq!(body["error_description"], "Invalid refresh token");
}

// =============================================================================
// Revoke Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_revoke_known_token() {
    let (server, state) = create_test_server().await;
    insert_access_token(&state.db, "test_access_token", CLIENT_ID, Duration::hours(1)).await;

    let response = server
        .post("/oauth2/revoke")
        .form(&[("token", "test_access_token")])
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "revoked": true }));
    assert!(
        state
            .tokens
            .access_token("test_access_token")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_revoke_unknown_token() {
    let (server, _state) = create_test_server().await;

    let response = server
        .post("/oauth2/revoke")
        .form(&[("token", "nonexistent-token"), ("token_type_hint", "refresh_token")])
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "revoked": true }));
}

#[tokio::test]
async fn test_revoke_without_token() {
    let (server, _state) = create_test_server().await;

    let response = server.post("/oauth2/revoke").form(&[("token_type_hint", "access_token")]).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body.get("revoked").is_none());
    assert_eq!(body["error"], "invalid_request");
    assert_eq!(body["error_description"], "Missing token parameter to revoke");
}

#[tokio::test]
async fn test_revoke_with_unknown_token_type_hint() {
    let (server, _state) = create_test_server().await;

    let response = server
        .post("/oauth2/revoke")
        .form(&[("token", "some-token"), ("token_type_hint", "id_token")])
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body.get("revoked").is_none());
    assert_eq!(body["error"], "invalid_request");
}

// =============================================================================
// Introspection and Verification Tests
// =============================================================================

#[tokio::test]
async fn test_introspect_active_and_unknown_tokens() {
    let (server, state) = create_test_server().await;
    insert_access_token(&state.db, "test_access_token", CLIENT_ID, Duration::hours(1)).await;

    let response = server
        .post("/oauth2/introspect")
        .form(&[("token", "test_access_token")])
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["active"], true);
    assert_eq!(body["client_id"], CLIENT_ID);
    assert_eq!(body["sub"], USER_ID);
    assert_eq!(body["iss"], ISSUER);
    assert_eq!(body["token_type"], "Bearer");

    let response = server
        .post("/oauth2/introspect")
        .form(&[("token", "nonexistent")])
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "active": false }));
}

#[tokio::test]
async fn test_introspect_reads_bearer_header() {
    let (server, state) = create_test_server().await;
    insert_access_token(&state.db, "test_access_token", CLIENT_ID, Duration::hours(1)).await;

    let response = server
        .post("/oauth2/introspect")
        .add_header(
            AUTHORIZATION,
            HeaderValue::from_static("Bearer test_access_token"),
        )
        .form(&[("unused", "")])
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["active"], true);
}

#[tokio::test]
async fn test_verify_resource_request() {
    let (server, state) = create_test_server().await;
    insert_access_token(&state.db, "test_access_token", CLIENT_ID, Duration::hours(1)).await;
    insert_access_token(&state.db, "expired_token", CLIENT_ID, Duration::seconds(-10)).await;

    let response = server
        .get("/oauth2/verify")
        .add_header(
            AUTHORIZATION,
            HeaderValue::from_static("Bearer test_access_token"),
        )
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["sub"], USER_ID);

    let response = server
        .get("/oauth2/verify")
        .add_query_param("access_token", "test_access_token")
        .await;
    response.assert_status_ok();

    let response = server
        .get("/oauth2/verify")
        .add_query_param("access_token", "expired_token")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_token");
    assert_eq!(body["error_description"], "The access token provided is invalid");

    let response = server
        .get("/oauth2/verify")
        .add_header(
            AUTHORIZATION,
            HeaderValue::from_static("Bearer test_access_token"),
        )
        .add_query_param("access_token", "test_access_token")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "invalid_request");

    let response = server.get("/oauth2/verify").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_accepts_form_token() {
    let (server, state) = create_test_server().await;
    insert_access_token(&state.db, "test_access_token", CLIENT_ID, Duration::hours(1)).await;

    let response = server
        .post("/oauth2/verify")
        .form(&[("access_token", "test_access_token")])
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["client_id"], CLIENT_ID);

    let response = server
        .post("/oauth2/verify")
        .add_header(
            AUTHORIZATION,
            HeaderValue::from_static("Bearer test_access_token"),
        )
        .form(&[("access_token", "test_access_token")])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error_description"],
        "Only one method may be used to authenticate at a time (Auth header, GET or POST)"
    );
}

// =============================================================================
// Miscellaneous
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (server, _state) = create_test_server().await;

    let response = server.get("/healthz").await;
    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn test_api_docs_are_served() {
    let (server, _state) = create_test_server().await;

    let response = server.get("/api-docs").await;
    response.assert_status_ok();
}
