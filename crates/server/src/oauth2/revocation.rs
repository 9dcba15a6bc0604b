//! Token revocation and consent withdrawal.

use crate::error::{ErrorKind, OAuth2Result, ProtocolError};
use crate::oauth2::consent::{ConsentStore, DenySummary};
use crate::oauth2::registrar::non_empty;
use crate::oauth2::tokens::TokenStore;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which store to search first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenTypeHint {
    AccessToken,
    RefreshToken,
}

impl TokenTypeHint {
    fn parse(hint: &str) -> Result<Self, ProtocolError> {
        match hint {
            "access_token" => Ok(TokenTypeHint::AccessToken),
            "refresh_token" => Ok(TokenTypeHint::RefreshToken),
            _ => Err(ProtocolError::invalid_request(
                "Token type hint must be either 'access_token' or 'refresh_token'",
            )),
        }
    }
}

/// Body of a revocation response.
///
/// Either `{"revoked": true}` or an error pair without `revoked`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RevokeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl RevokeResponse {
    fn revoked() -> Self {
        Self {
            revoked: Some(true),
            error: None,
            error_description: None,
        }
    }

    fn rejected(error: ProtocolError) -> Self {
        Self {
            revoked: None,
            error: Some(error.error),
            error_description: Some(error.error_description.into_owned()),
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked == Some(true)
    }
}

#[derive(Clone)]
pub struct RevocationService {
    tokens: TokenStore,
    consent: ConsentStore,
}

impl RevocationService {
    pub fn new(tokens: TokenStore, consent: ConsentStore) -> Self {
        Self { tokens, consent }
    }

    /// Revoke an access or refresh token.
    ///
    /// The hinted store is searched first, then the other one. A token found
    /// in neither still counts as revoked.
    #[tracing::instrument(skip(self, token))]
    pub async fn revoke(
        &self,
        token: Option<&str>,
        token_type_hint: Option<&str>,
    ) -> OAuth2Result<RevokeResponse> {
        let Some(token) = non_empty(token) else {
            return Ok(RevokeResponse::rejected(ProtocolError::invalid_request(
                "Missing token parameter to revoke",
            )));
        };

        let hint = match non_empty(token_type_hint).map(TokenTypeHint::parse) {
            None => TokenTypeHint::AccessToken,
            Some(Ok(hint)) => hint,
            Some(Err(error)) => return Ok(RevokeResponse::rejected(error)),
        };

        let found = match hint {
            TokenTypeHint::AccessToken => {
                self.tokens.delete_access_token(token).await?
                    || self.tokens.delete_refresh_token(token).await?
            }
            TokenTypeHint::RefreshToken => {
                self.tokens.delete_refresh_token(token).await?
                    || self.tokens.delete_access_token(token).await?
            }
        };

        if found {
            tracing::info!(?hint, "Token revoked");
        } else {
            tracing::debug!(?hint, "Revocation of unknown token");
        }
        Ok(RevokeResponse::revoked())
    }

    /// Withdraw a user's consent for a client, revoking everything issued
    /// under it.
    pub async fn revoke_consent(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> OAuth2Result<DenySummary> {
        Ok(self.consent.deny(user_id, client_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoked_response_has_no_error_fields() {
        let json = serde_json::to_value(RevokeResponse::revoked()).unwrap();
        assert_eq!(json, serde_json::json!({ "revoked": true }));
    }

    #[test]
    fn rejected_response_has_no_revoked_field() {
        let response = RevokeResponse::rejected(ProtocolError::invalid_request(
            "Missing token parameter to revoke",
        ));
        let json = serde_json::to_value(response).unwrap();
        assert!(json.get("revoked").is_none());
        assert_eq!(json["error"], "invalid_request");
    }

    #[test]
    fn unknown_hint_is_rejected() {
        assert!(TokenTypeHint::parse("id_token").is_err());
        assert_eq!(
            TokenTypeHint::parse("refresh_token").unwrap(),
            TokenTypeHint::RefreshToken
        );
    }
}
