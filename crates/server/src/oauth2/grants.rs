//! Token issuance, one processor per grant type.
//!
//! [`TokenEndpoint`] parses the grant type, authenticates the client and then
//! hands the request to the matching [`GrantProcessor`]. Dispatch is a fixed
//! `match` over [`GrantType`].

use crate::entity::oauth2_client;
use crate::error::{OAuth2Error, OAuth2Result, ProtocolError};
use crate::oauth2::codes::CodeStore;
use crate::oauth2::password::UserCredentials;
use crate::oauth2::registrar::{ClientCredentials, ClientRegistry, non_empty};
use crate::oauth2::tokens::{TokenPair, TokenStore};
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Form parameters accepted by the token endpoint.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// authorization_code grant
    pub code: Option<String>,
    /// authorization_code grant; must equal the URI the code was issued for
    pub redirect_uri: Option<String>,
    /// password grant
    pub username: Option<String>,
    /// password grant
    pub password: Option<String>,
    /// refresh_token grant
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// Successful token response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Access token lifetime in seconds, as a decimal string
    pub expires_in: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub refresh_token: String,
}

impl TokenResponse {
    fn from_pair(pair: TokenPair, expires_in: i64) -> Self {
        Self {
            access_token: pair.access_token,
            expires_in: expires_in.to_string(),
            token_type: "Bearer".to_string(),
            scope: pair.scope,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode,
    Password,
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::Password => "password",
            GrantType::RefreshToken => "refresh_token",
        }
    }
}

impl FromStr for GrantType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            "password" => Ok(GrantType::Password),
            "refresh_token" => Ok(GrantType::RefreshToken),
            other => Err(ProtocolError::new(
                crate::error::ErrorKind::UnsupportedGrantType,
                format!("Grant type \"{other}\" not supported"),
            )),
        }
    }
}

/// One token-issuing state machine.
#[async_trait]
pub trait GrantProcessor: Send + Sync {
    fn grant_type(&self) -> GrantType;

    /// Issue a token pair for an already authenticated client.
    async fn issue(
        &self,
        client: &oauth2_client::Model,
        request: &TokenRequest,
    ) -> OAuth2Result<TokenResponse>;
}

/// Redeems authorization codes.
#[derive(Clone)]
pub struct AuthorizationCodeGrant {
    db: Arc<DatabaseConnection>,
    tokens: TokenStore,
}

impl AuthorizationCodeGrant {
    pub fn new(db: Arc<DatabaseConnection>, tokens: TokenStore) -> Self {
        Self { db, tokens }
    }
}

#[async_trait]
impl GrantProcessor for AuthorizationCodeGrant {
    fn grant_type(&self) -> GrantType {
        GrantType::AuthorizationCode
    }

    #[tracing::instrument(skip_all, fields(client_id = %client.id))]
    async fn issue(
        &self,
        client: &oauth2_client::Model,
        request: &TokenRequest,
    ) -> OAuth2Result<TokenResponse> {
        let Some(code) = non_empty(request.code.as_deref()) else {
            return Err(
                ProtocolError::invalid_request("Missing parameter: \"code\" is required").into(),
            );
        };

        let not_found = || -> OAuth2Error {
            ProtocolError::invalid_grant(
                "Authorization code doesn't exist or is invalid for the client",
            )
            .into()
        };

        // Lookup, checks, delete and issuance share one transaction so the
        // code can be redeemed once and a concurrent consent withdrawal
        // cannot interleave.
        let txn = self.db.begin().await?;

        let stored = match CodeStore::find_in(&txn, code).await? {
            Some(stored) if stored.client_id == client.id => stored,
            _ => return Err(not_found()),
        };

        if stored.is_expired_at(OffsetDateTime::now_utc()) {
            return Err(ProtocolError::invalid_grant("The authorization code has expired").into());
        }

        // Only a URI presented at the authorize step has to be presented again
        if !stored.redirect_uri.is_empty()
            && request.redirect_uri.as_deref() != Some(stored.redirect_uri.as_str())
        {
            return Err(ProtocolError::new(
                crate::error::ErrorKind::RedirectUriMismatch,
                "The redirect URI is missing or do not match",
            )
            .into());
        }

        if !CodeStore::consume_in(&txn, code).await? {
            tracing::warn!("Authorization code was consumed concurrently");
            return Err(not_found());
        }

        let pair = self
            .tokens
            .issue_pair_in(&txn, &stored.client_id, &stored.user_id, stored.scope.as_deref())
            .await?;

        txn.commit().await?;

        Ok(TokenResponse::from_pair(
            pair,
            self.tokens.access_lifetime_secs(),
        ))
    }
}

/// Resource-owner password credentials.
#[derive(Clone)]
pub struct PasswordGrant {
    credentials: Arc<dyn UserCredentials>,
    tokens: TokenStore,
}

impl PasswordGrant {
    pub fn new(credentials: Arc<dyn UserCredentials>, tokens: TokenStore) -> Self {
        Self {
            credentials,
            tokens,
        }
    }
}

#[async_trait]
impl GrantProcessor for PasswordGrant {
    fn grant_type(&self) -> GrantType {
        GrantType::Password
    }

    #[tracing::instrument(skip_all, fields(client_id = %client.id))]
    async fn issue(
        &self,
        client: &oauth2_client::Model,
        request: &TokenRequest,
    ) -> OAuth2Result<TokenResponse> {
        let (Some(username), Some(password)) = (
            non_empty(request.username.as_deref()),
            non_empty(request.password.as_deref()),
        ) else {
            return Err(ProtocolError::invalid_request(
                "Missing parameters: \"username\" and \"password\" required",
            )
            .into());
        };

        let Some(user_id) = self.credentials.verify(username, password).await? else {
            return Err(
                ProtocolError::invalid_grant("Invalid username and password combination").into(),
            );
        };

        let pair = self
            .tokens
            .issue_pair(&client.id, &user_id, non_empty(request.scope.as_deref()))
            .await?;

        Ok(TokenResponse::from_pair(
            pair,
            self.tokens.access_lifetime_secs(),
        ))
    }
}

/// Refresh-token redemption with unconditional rotation.
#[derive(Clone)]
pub struct RefreshTokenGrant {
    db: Arc<DatabaseConnection>,
    tokens: TokenStore,
}

impl RefreshTokenGrant {
    pub fn new(db: Arc<DatabaseConnection>, tokens: TokenStore) -> Self {
        Self { db, tokens }
    }
}

#[async_trait]
impl GrantProcessor for RefreshTokenGrant {
    fn grant_type(&self) -> GrantType {
        GrantType::RefreshToken
    }

    #[tracing::instrument(skip_all, fields(client_id = %client.id))]
    async fn issue(
        &self,
        client: &oauth2_client::Model,
        request: &TokenRequest,
    ) -> OAuth2Result<TokenResponse> {
        let Some(presented) = non_empty(request.refresh_token.as_deref()) else {
            return Err(ProtocolError::invalid_request(
                "Missing parameter: \"refresh_token\" is required",
            )
            .into());
        };

        let invalid =
            || -> OAuth2Error { ProtocolError::invalid_grant("Invalid refresh token").into() };

        let txn = self.db.begin().await?;

        let existing = match TokenStore::find_refresh_in(&txn, presented).await? {
            Some(existing) if existing.client_id == client.id => existing,
            _ => return Err(invalid()),
        };

        if existing.is_expired_at(OffsetDateTime::now_utc()) {
            return Err(ProtocolError::invalid_grant("Refresh token has expired").into());
        }

        if !TokenStore::delete_refresh_in(&txn, presented).await? {
            tracing::warn!("Refresh token was rotated concurrently");
            return Err(invalid());
        }

        let pair = self
            .tokens
            .issue_pair_in(
                &txn,
                &existing.client_id,
                &existing.user_id,
                existing.scope.as_deref(),
            )
            .await?;

        txn.commit().await?;

        Ok(TokenResponse::from_pair(
            pair,
            self.tokens.access_lifetime_secs(),
        ))
    }
}

/// The token endpoint: grant-type parsing, client authentication, dispatch.
#[derive(Clone)]
pub struct TokenEndpoint {
    clients: ClientRegistry,
    authorization_code: AuthorizationCodeGrant,
    password: PasswordGrant,
    refresh_token: RefreshTokenGrant,
}

impl TokenEndpoint {
    pub fn new(
        db: Arc<DatabaseConnection>,
        clients: ClientRegistry,
        tokens: TokenStore,
        credentials: Arc<dyn UserCredentials>,
    ) -> Self {
        Self {
            clients,
            authorization_code: AuthorizationCodeGrant::new(db.clone(), tokens.clone()),
            password: PasswordGrant::new(credentials, tokens.clone()),
            refresh_token: RefreshTokenGrant::new(db, tokens),
        }
    }

    pub fn processor(&self, grant_type: GrantType) -> &dyn GrantProcessor {
        match grant_type {
            GrantType::AuthorizationCode => &self.authorization_code,
            GrantType::Password => &self.password,
            GrantType::RefreshToken => &self.refresh_token,
        }
    }

    /// Handle a token request. Credentials may come from the form body or
    /// HTTP Basic; the caller resolves which.
    #[tracing::instrument(skip_all, fields(grant_type = ?request.grant_type))]
    pub async fn handle(
        &self,
        request: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> OAuth2Result<TokenResponse> {
        let Some(grant_type) = non_empty(request.grant_type.as_deref()) else {
            return Err(ProtocolError::invalid_request(
                "The grant type was not specified in the request",
            )
            .into());
        };
        let grant_type: GrantType = grant_type.parse()?;

        let client = self.clients.authenticate(credentials).await?;

        let result = self.processor(grant_type).issue(&client, request).await;
        if let Err(OAuth2Error::Protocol(err)) = &result {
            tracing::info!(
                client_id = %client.id,
                grant_type = grant_type.as_str(),
                error = %err.error,
                "Token request rejected"
            );
        }
        result
    }
}
