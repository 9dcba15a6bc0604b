//! Resource-owner credential verification for the password grant.
//!
//! The grant only depends on the [`UserCredentials`] trait. [`DbUserCredentials`]
//! is the bundled implementation, checking Argon2id hashes stored in
//! `oauth2_user`.

use crate::entity::oauth2_user;
use crate::error::{OAuth2Error, OAuth2Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Verifies a username/password pair and resolves it to a user id.
#[async_trait]
pub trait UserCredentials: Send + Sync {
    /// `Ok(None)` means the combination is wrong. `Err` is reserved for the
    /// verifier itself failing.
    async fn verify(&self, username: &str, password: &str) -> OAuth2Result<Option<String>>;
}

/// Hash a password using Argon2id.
///
/// Returns the PHC-formatted hash string suitable for storage.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[derive(Clone)]
pub struct DbUserCredentials {
    db: Arc<DatabaseConnection>,
}

impl DbUserCredentials {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Store a new user with an Argon2id hash of `password` and return its id.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> OAuth2Result<String> {
        let password_hash = hash_password(password)
            .map_err(|e| OAuth2Error::CredentialVerifier(e.to_string()))?;
        let user = oauth2_user::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            username: Set(username.to_string()),
            password_hash: Set(password_hash),
            created_at: Set(OffsetDateTime::now_utc()),
        }
        .insert(self.db.as_ref())
        .await?;
        tracing::info!(user_id = %user.id, "Registered user");
        Ok(user.id)
    }
}

#[async_trait]
impl UserCredentials for DbUserCredentials {
    #[tracing::instrument(skip(self, password))]
    async fn verify(&self, username: &str, password: &str) -> OAuth2Result<Option<String>> {
        let user = oauth2_user::Entity::find()
            .filter(oauth2_user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await?;

        // Argon2 verification is CPU bound
        let matched = match user {
            Some(user) => {
                let password = password.to_string();
                let hash = user.password_hash.clone();
                let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
                    .await
                    .map_err(|e| OAuth2Error::CredentialVerifier(e.to_string()))?;
                ok.then_some(user.id)
            }
            None => None,
        };

        if matched.is_none() {
            tracing::debug!(username, "Password grant rejected");
        }
        Ok(matched)
    }
}
