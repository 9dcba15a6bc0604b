//! OAuth2 state management.
//!
//! Wires every component of the authorization server to one database
//! connection and one configuration object.

use crate::config::OAuth2Config;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::oauth2::authorize::AuthorizationFlow;
use crate::oauth2::codes::CodeStore;
use crate::oauth2::consent::ConsentStore;
use crate::oauth2::grants::TokenEndpoint;
use crate::oauth2::introspection::{JwtIntrospection, PlainIntrospection, PublicKeyRegistry};
use crate::oauth2::password::UserCredentials;
use crate::oauth2::registrar::ClientRegistry;
use crate::oauth2::revocation::RevocationService;
use crate::oauth2::tokens::TokenStore;
use sea_orm::{DatabaseConnection, DbErr};
use std::sync::Arc;

/// OAuth2 state containing all components needed for the authorization server.
#[derive(Clone)]
pub struct OAuth2State {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<OAuth2Config>,
    pub clients: ClientRegistry,
    pub codes: CodeStore,
    pub tokens: TokenStore,
    pub consent: ConsentStore,
    pub authorization: AuthorizationFlow,
    pub token_endpoint: TokenEndpoint,
    pub revocation: RevocationService,
    pub introspection: PlainIntrospection,
    pub jwt_introspection: JwtIntrospection,
}

impl OAuth2State {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: OAuth2Config,
        credentials: Arc<dyn UserCredentials>,
    ) -> Self {
        let config = Arc::new(config);
        let clients = ClientRegistry::new(db.clone());
        let codes = CodeStore::new(db.clone(), config.auth_code_lifetime);
        let tokens = TokenStore::new(
            db.clone(),
            config.access_token_lifetime,
            config.refresh_token_lifetime,
        );
        let consent = ConsentStore::new(db.clone());

        Self {
            authorization: AuthorizationFlow::new(clients.clone(), codes.clone(), consent.clone()),
            token_endpoint: TokenEndpoint::new(
                db.clone(),
                clients.clone(),
                tokens.clone(),
                credentials,
            ),
            revocation: RevocationService::new(tokens.clone(), consent.clone()),
            introspection: PlainIntrospection::new(tokens.clone(), config.issuer_identity.clone()),
            jwt_introspection: JwtIntrospection::new(PublicKeyRegistry::new(db.clone())),
            db,
            config,
            clients,
            codes,
            tokens,
            consent,
        }
    }

    /// Remove expired codes and tokens. Returns `(codes, tokens)` removed.
    pub async fn purge_expired(&self) -> Result<(u64, u64), DbErr> {
        let codes = self.codes.purge_expired().await?;
        let tokens = self.tokens.purge_expired().await?;
        Ok((codes, tokens))
    }

    /// Generate a secure random token
    pub fn generate_token() -> OAuth2Result<String> {
        use base64::Engine;
        let mut bytes = [0u8; 32];
        getrandom::fill(&mut bytes).map_err(|e| OAuth2Error::Random(e.to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }
}
