//! Bearer token extraction and resource request verification.

use crate::error::{ErrorKind, OAuth2Result, ProtocolError};
use crate::oauth2::introspection::{IntrospectionResult, IntrospectionService};
use crate::oauth2::registrar::non_empty;
use axum::http::{HeaderMap, header::AUTHORIZATION};

/// Read the access token from `Authorization: Bearer` or from an
/// `access_token` query/form parameter. Exactly one source may be used.
pub fn token_param(
    headers: &HeaderMap,
    access_token: Option<&str>,
) -> Result<Option<String>, ProtocolError> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty());
    let from_param = non_empty(access_token);

    match (from_header, from_param) {
        (Some(_), Some(_)) => Err(ProtocolError::invalid_request(
            "Only one method may be used to authenticate at a time (Auth header, GET or POST)",
        )),
        (Some(token), None) | (None, Some(token)) => Ok(Some(token.to_string())),
        (None, None) => Ok(None),
    }
}

/// Check that a resource request carries an active access token.
#[tracing::instrument(skip_all)]
pub async fn verify_resource_request(
    introspection: &dyn IntrospectionService,
    headers: &HeaderMap,
    access_token: Option<&str>,
) -> OAuth2Result<IntrospectionResult> {
    let Some(token) = token_param(headers, access_token)? else {
        return Err(ProtocolError::invalid_request(
            "The request is missing a required parameter: access_token",
        )
        .into());
    };

    let result = introspection.introspect(&token).await?;
    if !result.active {
        return Err(ProtocolError::new(
            ErrorKind::InvalidToken,
            "The access token provided is invalid",
        )
        .into());
    }
    Ok(result)
}
