//! Database-backed OAuth2 client registry.
//!
//! Clients are registered by an external admin process; this module only reads
//! them. Secrets and redirect URIs are compared byte for byte.

use crate::entity::oauth2_client;
use crate::error::{OAuth2Result, ProtocolError};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use std::sync::Arc;

/// Client credentials as presented at the token endpoint.
#[derive(Clone, Debug, Default)]
pub struct ClientCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl ClientCredentials {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id,
            client_secret,
        }
    }
}

/// Treats an empty parameter the same as an absent one.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct ClientRegistry {
    db: Arc<DatabaseConnection>,
}

impl ClientRegistry {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a registered client.
    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, client_id: &str) -> Result<Option<oauth2_client::Model>, DbErr> {
        oauth2_client::Entity::find_by_id(client_id)
            .one(self.db.as_ref())
            .await
    }

    /// Exact comparison of a presented secret. Unknown clients never match.
    #[tracing::instrument(skip(self, secret))]
    pub async fn validate_secret(&self, client_id: &str, secret: &str) -> Result<bool, DbErr> {
        Ok(self
            .lookup(client_id)
            .await?
            .is_some_and(|client| client.secret_matches(secret)))
    }

    /// An empty URI is accepted as "use the registered default".
    #[tracing::instrument(skip(self))]
    pub async fn validate_redirect_uri(
        &self,
        client_id: &str,
        presented_uri: &str,
    ) -> Result<bool, DbErr> {
        Ok(self
            .lookup(client_id)
            .await?
            .is_some_and(|client| client.is_redirect_uri_allowed(presented_uri)))
    }

    /// Authenticate a confidential client at the token endpoint.
    ///
    /// Check order: missing id, missing secret, then unknown id or wrong secret.
    #[tracing::instrument(skip(self, credentials), fields(client_id = ?credentials.client_id))]
    pub async fn authenticate(
        &self,
        credentials: &ClientCredentials,
    ) -> OAuth2Result<oauth2_client::Model> {
        let Some(client_id) = non_empty(credentials.client_id.as_deref()) else {
            return Err(ProtocolError::invalid_client(
                "Client credentials were not found in the headers or body",
            )
            .into());
        };

        let Some(secret) = non_empty(credentials.client_secret.as_deref()) else {
            return Err(ProtocolError::invalid_client(
                "This client is invalid or must authenticate using a client secret",
            )
            .into());
        };

        match self.lookup(client_id).await? {
            Some(client) if client.secret_matches(secret) => Ok(client),
            _ => {
                tracing::debug!(client_id, "Client authentication failed");
                Err(ProtocolError::invalid_client("The client credentials are invalid").into())
            }
        }
    }
}
