//! Database-backed resource owner credentials with the password grant.

mod common;

use common::*;
use oauth2_authz_server::error::ErrorKind;
use oauth2_authz_server::oauth2::{
    DbUserCredentials, OAuth2State, TokenRequest, UserCredentials,
};
use std::sync::Arc;

#[tokio::test]
async fn test_registered_user_verifies() {
    let db = create_test_db().await;
    let credentials = DbUserCredentials::new(db);

    let user_id = credentials.register("alice", "correct horse").await.unwrap();

    assert_eq!(
        credentials.verify("alice", "correct horse").await.unwrap(),
        Some(user_id)
    );
    assert_eq!(credentials.verify("alice", "battery staple").await.unwrap(), None);
    assert_eq!(credentials.verify("bob", "correct horse").await.unwrap(), None);
}

#[tokio::test]
async fn test_duplicate_username_is_rejected() {
    let db = create_test_db().await;
    let credentials = DbUserCredentials::new(db);

    credentials.register("alice", "one").await.unwrap();
    let err = credentials
        .register("alice", "two")
        .await
        .expect_err("username is unique");
    assert!(err.is_internal());
}

#[tokio::test]
async fn test_password_grant_against_database_users() {
    let db = create_test_db().await;
    let credentials = Arc::new(DbUserCredentials::new(db.clone()));
    let user_id = credentials.register("alice", "s3cret").await.unwrap();
    let state = OAuth2State::new(db, test_config(), credentials);

    let request = TokenRequest {
        username: Some("alice".into()),
        password: Some("s3cret".into()),
        ..token_request("password")
    };
    let response = state
        .token_endpoint
        .handle(&request, &client_credentials())
        .await
        .expect("tokens");
    let access = state
        .tokens
        .access_token(&response.access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(access.user_id, user_id);

    let wrong = TokenRequest {
        password: Some("guess".into()),
        ..request
    };
    let err = state
        .token_endpoint
        .handle(&wrong, &client_credentials())
        .await
        .expect_err("wrong password");
    assert_eq!(err.as_protocol().map(|p| p.error), Some(ErrorKind::InvalidGrant));
}
