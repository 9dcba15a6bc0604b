//! Error types for the authorization server.
//!
//! Two classes of failure exist and are kept apart:
//!
//! - [`ProtocolError`]: an expected OAuth2 outcome (`invalid_grant`, ...) that
//!   is reported to the client as an `error` / `error_description` pair.
//! - Everything else in [`OAuth2Error`]: infrastructure failures that must
//!   reach the caller as an internal error and are never rewritten into one of
//!   the protocol codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;
use utoipa::ToSchema;

/// OAuth2 error codes produced by this server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    InvalidToken,
    RedirectUriMismatch,
    AccessDenied,
    UnsupportedGrantType,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::InvalidClient => "invalid_client",
            ErrorKind::InvalidGrant => "invalid_grant",
            ErrorKind::InvalidToken => "invalid_token",
            ErrorKind::RedirectUriMismatch => "redirect_uri_mismatch",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::UnsupportedGrantType => "unsupported_grant_type",
        }
    }

    /// HTTP status used when the error is returned as a JSON body.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidClient | ErrorKind::InvalidToken => StatusCode::UNAUTHORIZED,
            ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An expected protocol-level failure, serialized as
/// `{"error": ..., "error_description": ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize, ToSchema)]
#[error("{error}: {error_description}")]
pub struct ProtocolError {
    pub error: ErrorKind,
    #[schema(value_type = String)]
    pub error_description: Cow<'static, str>,
}

impl ProtocolError {
    pub fn new(error: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            error,
            error_description: description.into(),
        }
    }

    pub fn invalid_request(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidRequest, description)
    }

    pub fn invalid_client(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidClient, description)
    }

    pub fn invalid_grant(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidGrant, description)
    }
}

impl IntoResponse for ProtocolError {
    fn into_response(self) -> Response {
        (self.error.status(), Json(self)).into_response()
    }
}

/// Every failure an authorization server operation can end with.
#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Invalid key material for client {client_id}: {reason}")]
    KeyMaterial { client_id: String, reason: String },
    #[error("Client {0} is misconfigured: no redirect URI registered")]
    MissingRedirectUri(String),
    #[error("Redirect URI {uri} cannot be parsed: {reason}")]
    InvalidRedirectUri { uri: String, reason: String },
    #[error("Credential verification failed: {0}")]
    CredentialVerifier(String),
    #[error("Random number generator failure: {0}")]
    Random(String),
}

impl OAuth2Error {
    /// True for infrastructure failures, false for protocol outcomes.
    pub fn is_internal(&self) -> bool {
        !matches!(self, OAuth2Error::Protocol(_))
    }

    /// The protocol error, if this is one.
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            OAuth2Error::Protocol(p) => Some(p),
            _ => None,
        }
    }
}

/// Body returned for internal errors. Details stay in the logs.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServerErrorBody {
    pub error: &'static str,
}

impl IntoResponse for OAuth2Error {
    fn into_response(self) -> Response {
        match self {
            OAuth2Error::Protocol(p) => p.into_response(),
            other => {
                tracing::error!(error = %other, "Internal error while handling OAuth2 request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ServerErrorBody {
                        error: "server_error",
                    }),
                )
                    .into_response()
            }
        }
    }
}

pub type OAuth2Result<T> = Result<T, OAuth2Error>;
