//! OAuth2 HTTP endpoints.
//!
//! - `POST /token` - Token endpoint
//! - `POST /revoke` - Token revocation
//! - `POST /introspect` - Token introspection (RFC 7662)
//! - `GET|POST /verify` - Bearer token check for resource servers

use crate::error::{OAuth2Error, ProtocolError, ServerErrorBody};
use crate::oauth2::bearer;
use crate::oauth2::grants::{TokenRequest, TokenResponse};
use crate::oauth2::introspection::{IntrospectionResult, IntrospectionService};
use crate::oauth2::registrar::ClientCredentials;
use crate::oauth2::revocation::RevokeResponse;
use crate::oauth2::{OAUTH2_TAG, state::OAuth2State};
use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use base64::Engine;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Creates the OAuth2 router.
pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(token))
        .routes(routes!(revoke))
        .routes(routes!(introspect))
        .routes(routes!(verify, verify_form))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RevokeRequest {
    pub token: Option<String>,
    /// "access_token" or "refresh_token"
    pub token_type_hint: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct IntrospectRequest {
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccessTokenQuery {
    /// Alternative to the `Authorization: Bearer` header
    pub access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AccessTokenForm {
    /// Alternative to the `Authorization: Bearer` header
    pub access_token: Option<String>,
}

/// OAuth2 Token endpoint.
#[tracing::instrument(skip(state, headers, params))]
#[utoipa::path(
    post,
    path = "/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Issue an access/refresh token pair",
    description = "Issues tokens for the `authorization_code`, `password` and `refresh_token` grants.\n\n\
                   **Client authentication:** HTTP Basic, or `client_id` and `client_secret` in the body. \
                   Every client must present its secret.\n\n\
                   **Refresh:** the presented refresh token is invalidated and a new pair is returned.",
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Tokens issued successfully", body = TokenResponse),
        (status = 400, description = "Invalid request or grant", body = ProtocolError),
        (status = 401, description = "Invalid client credentials", body = ProtocolError),
        (status = 500, description = "Internal error", body = ServerErrorBody),
    )
)]
pub async fn token(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Form(params): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, OAuth2Error> {
    let credentials = extract_client_credentials(&headers, &params);
    let response = state.token_endpoint.handle(&params, &credentials).await?;
    Ok(Json(response))
}

/// Token revocation endpoint.
#[tracing::instrument(skip(state, params))]
#[utoipa::path(
    post,
    path = "/revoke",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Revoke Token",
    summary = "Revoke an access or refresh token",
    description = "Deletes an access or refresh token. The store named by `token_type_hint` is \
                   searched first, then the other one. Unknown tokens are reported as revoked.",
    request_body(
        content = RevokeRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token revocation request"
    ),
    responses(
        (status = 200, description = "Token revoked (or was unknown)", body = RevokeResponse),
        (status = 400, description = "Missing token or unsupported hint", body = RevokeResponse),
        (status = 500, description = "Internal error", body = ServerErrorBody),
    )
)]
pub async fn revoke(
    State(state): State<OAuth2State>,
    Form(params): Form<RevokeRequest>,
) -> Result<Response, OAuth2Error> {
    let response = state
        .revocation
        .revoke(params.token.as_deref(), params.token_type_hint.as_deref())
        .await?;
    let status = if response.is_revoked() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(response)).into_response())
}

/// Token introspection endpoint.
#[tracing::instrument(skip(state, headers, params))]
#[utoipa::path(
    post,
    path = "/introspect",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Introspect Token",
    summary = "Describe an access token",
    description = "Returns RFC 7662 metadata for an access token. The token is read from the `token` \
                   form field, or from the bearer header when the field is absent. Unknown, expired \
                   and revoked tokens yield `{\"active\": false}`.",
    request_body(
        content = IntrospectRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token introspection request"
    ),
    responses(
        (status = 200, description = "Introspection result", body = IntrospectionResult),
        (status = 400, description = "Token supplied more than once", body = ProtocolError),
        (status = 500, description = "Internal error", body = ServerErrorBody),
    )
)]
pub async fn introspect(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Form(params): Form<IntrospectRequest>,
) -> Result<Json<IntrospectionResult>, OAuth2Error> {
    let token = match params.token.filter(|t| !t.is_empty()) {
        Some(token) => Some(token),
        None => bearer::token_param(&headers, None)?,
    };
    let Some(token) = token else {
        return Ok(Json(IntrospectionResult::inactive()));
    };
    Ok(Json(state.introspection.introspect(&token).await?))
}

/// Bearer token verification for resource servers.
#[tracing::instrument(skip(state, headers, query))]
#[utoipa::path(
    get,
    path = "/verify",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Verify Bearer Token",
    summary = "Verify the bearer token of a resource request",
    params(AccessTokenQuery),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Token is active", body = IntrospectionResult),
        (status = 400, description = "No token, or more than one", body = ProtocolError),
        (status = 401, description = "Token is not active", body = ProtocolError),
        (status = 500, description = "Internal error", body = ServerErrorBody),
    )
)]
pub async fn verify(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Query(query): Query<AccessTokenQuery>,
) -> Result<Json<IntrospectionResult>, OAuth2Error> {
    let result = bearer::verify_resource_request(
        &state.introspection,
        &headers,
        query.access_token.as_deref(),
    )
    .await?;
    Ok(Json(result))
}

/// Bearer token verification with the token in a form body.
#[tracing::instrument(skip(state, headers, params))]
#[utoipa::path(
    post,
    path = "/verify",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Verify Bearer Token (form)",
    summary = "Verify a bearer token sent as a form field",
    request_body(
        content = AccessTokenForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Access token, unless sent in the `Authorization` header"
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Token is active", body = IntrospectionResult),
        (status = 400, description = "No token, or more than one", body = ProtocolError),
        (status = 401, description = "Token is not active", body = ProtocolError),
        (status = 500, description = "Internal error", body = ServerErrorBody),
    )
)]
pub async fn verify_form(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Form(params): Form<AccessTokenForm>,
) -> Result<Json<IntrospectionResult>, OAuth2Error> {
    let result = bearer::verify_resource_request(
        &state.introspection,
        &headers,
        params.access_token.as_deref(),
    )
    .await?;
    Ok(Json(result))
}

/// HTTP Basic credentials win over the form body.
fn extract_client_credentials(headers: &HeaderMap, params: &TokenRequest) -> ClientCredentials {
    if let Some(auth) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        && let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(auth.trim())
        && let Ok(creds) = String::from_utf8(decoded)
        && let Some((id, secret)) = creds.split_once(':')
    {
        return ClientCredentials::new(Some(id.to_string()), Some(secret.to_string()));
    }

    ClientCredentials::new(params.client_id.clone(), params.client_secret.clone())
}
