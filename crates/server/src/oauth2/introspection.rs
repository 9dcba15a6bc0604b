//! Token introspection (RFC 7662).
//!
//! Two variants share the [`IntrospectionService`] trait:
//!
//! - [`PlainIntrospection`] looks opaque access tokens up in the token store.
//! - [`JwtIntrospection`] verifies self-contained JWTs against the public key
//!   registered for the token's audience.
//!
//! Neither variant reports an error for a bad token; anything that cannot be
//! vouched for is `{"active": false}`.

use crate::entity::oauth2_public_key;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::oauth2::tokens::TokenStore;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;
use utoipa::ToSchema;

type Claims = Map<String, Value>;

/// RFC 7662 introspection response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IntrospectionResult {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Remaining verified JWT claims
    #[serde(flatten)]
    #[schema(ignore)]
    pub extra: Claims,
}

impl IntrospectionResult {
    pub fn inactive() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait IntrospectionService: Send + Sync {
    async fn introspect(&self, token: &str) -> OAuth2Result<IntrospectionResult>;
}

/// Introspection of opaque access tokens.
#[derive(Clone)]
pub struct PlainIntrospection {
    tokens: TokenStore,
    issuer: String,
}

impl PlainIntrospection {
    pub fn new(tokens: TokenStore, issuer: String) -> Self {
        Self { tokens, issuer }
    }
}

#[async_trait]
impl IntrospectionService for PlainIntrospection {
    #[tracing::instrument(skip_all)]
    async fn introspect(&self, token: &str) -> OAuth2Result<IntrospectionResult> {
        let Some(record) = self.tokens.access_token(token).await? else {
            return Ok(IntrospectionResult::inactive());
        };
        if record.is_expired_at(OffsetDateTime::now_utc()) {
            return Ok(IntrospectionResult::inactive());
        }

        Ok(IntrospectionResult {
            active: true,
            client_id: Some(record.client_id.clone()),
            token_type: Some("Bearer".to_string()),
            exp: Some(record.expires_at.unix_timestamp()),
            iat: Some(record.created_at.unix_timestamp()),
            sub: Some(record.user_id),
            aud: Some(record.client_id),
            iss: Some(self.issuer.clone()),
            scope: record.scope,
            extra: Claims::new(),
        })
    }
}

/// Read access to per-client verification keys.
#[derive(Clone)]
pub struct PublicKeyRegistry {
    db: Arc<DatabaseConnection>,
}

impl PublicKeyRegistry {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self))]
    pub async fn public_key(
        &self,
        client_id: &str,
    ) -> Result<Option<oauth2_public_key::Model>, DbErr> {
        oauth2_public_key::Entity::find_by_id(client_id)
            .one(self.db.as_ref())
            .await
    }
}

/// Introspection of JWT access tokens signed by the audience's key.
#[derive(Clone)]
pub struct JwtIntrospection {
    keys: PublicKeyRegistry,
}

impl JwtIntrospection {
    pub fn new(keys: PublicKeyRegistry) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl IntrospectionService for JwtIntrospection {
    #[tracing::instrument(skip_all)]
    async fn introspect(&self, token: &str) -> OAuth2Result<IntrospectionResult> {
        // Unverified read, only to find out whose key to use
        let Some(unverified) = decode_unverified(token) else {
            return Ok(IntrospectionResult::inactive());
        };
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if !within_lifetime(&unverified, now) {
            return Ok(IntrospectionResult::inactive());
        }
        let Some(unverified_aud) = audience(&unverified) else {
            return Ok(IntrospectionResult::inactive());
        };

        let Some(record) = self.keys.public_key(&unverified_aud).await? else {
            tracing::debug!(client_id = %unverified_aud, "No public key registered for audience");
            return Ok(IntrospectionResult::inactive());
        };
        let (algorithm, key) = verification_key(&record)?;

        let claims = match decode_verified(token, algorithm, &key) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(
                    client_id = %unverified_aud,
                    error = %e,
                    "JWT verification failed"
                );
                return Ok(IntrospectionResult::inactive());
            }
        };
        if !within_lifetime(&claims, OffsetDateTime::now_utc().unix_timestamp()) {
            return Ok(IntrospectionResult::inactive());
        }
        // The verified audience is authoritative
        let Some(client_id) = audience(&claims) else {
            return Ok(IntrospectionResult::inactive());
        };

        Ok(from_claims(claims, client_id))
    }
}

fn decode_unverified(token: &str) -> Option<Claims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}

/// Signature check restricted to the registered algorithm. Time claims are
/// checked separately.
fn decode_verified(
    token: &str,
    algorithm: Algorithm,
    key: &DecodingKey,
) -> jsonwebtoken::errors::Result<Claims> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation.leeway = 0;
    jsonwebtoken::decode::<Claims>(token, key, &validation).map(|data| data.claims)
}

/// Parse the stored algorithm and key. A record that cannot be used is a
/// configuration problem, not an inactive token.
fn verification_key(record: &oauth2_public_key::Model) -> OAuth2Result<(Algorithm, DecodingKey)> {
    let key_error = |reason: String| OAuth2Error::KeyMaterial {
        client_id: record.client_id.clone(),
        reason,
    };

    let algorithm = Algorithm::from_str(&record.encryption_algorithm)
        .map_err(|e| key_error(format!("{}: {e}", record.encryption_algorithm)))?;
    let pem = record.public_key.as_bytes();
    let key = match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(DecodingKey::from_secret(pem)),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem),
    }
    .map_err(|e| key_error(e.to_string()))?;

    Ok((algorithm, key))
}

/// `exp` is required; `iat`, when present, must not lie in the future.
fn within_lifetime(claims: &Claims, now: i64) -> bool {
    let Some(exp) = claims.get("exp").and_then(Value::as_i64) else {
        return false;
    };
    let issued_in_future = match claims.get("iat") {
        None => false,
        Some(iat) => iat.as_i64().is_none_or(|iat| now < iat),
    };
    !issued_in_future && exp >= now
}

/// The single audience of a token.
fn audience(claims: &Claims) -> Option<String> {
    match claims.get("aud")? {
        Value::String(aud) => Some(aud.clone()),
        Value::Array(values) if values.len() == 1 => values[0].as_str().map(String::from),
        _ => None,
    }
}

fn from_claims(mut claims: Claims, client_id: String) -> IntrospectionResult {
    fn take_string(claims: &mut Claims, key: &str) -> Option<String> {
        match claims.remove(key) {
            Some(Value::String(value)) => Some(value),
            Some(other) => {
                claims.insert(key.to_string(), other);
                None
            }
            None => None,
        }
    }
    fn take_i64(claims: &mut Claims, key: &str) -> Option<i64> {
        let value = claims.get(key)?.as_i64()?;
        claims.remove(key);
        Some(value)
    }

    claims.remove("active");
    claims.remove("client_id");
    claims.remove("aud");

    IntrospectionResult {
        active: true,
        token_type: take_string(&mut claims, "token_type"),
        exp: take_i64(&mut claims, "exp"),
        iat: take_i64(&mut claims, "iat"),
        sub: take_string(&mut claims, "sub"),
        iss: take_string(&mut claims, "iss"),
        scope: take_string(&mut claims, "scope"),
        aud: Some(client_id.clone()),
        client_id: Some(client_id),
        extra: claims,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Claims {
        match value {
            Value::Object(map) => map,
            _ => panic!("claims must be an object"),
        }
    }

    #[test]
    fn inactive_serializes_to_active_false_only() {
        let json = serde_json::to_value(IntrospectionResult::inactive()).unwrap();
        assert_eq!(json, json!({ "active": false }));
    }

    #[test]
    fn lifetime_checks() {
        let now = 1_700_000_000;
        assert!(within_lifetime(&claims(json!({"iat": now - 10, "exp": now + 10})), now));
        assert!(within_lifetime(&claims(json!({"exp": now})), now));
        assert!(!within_lifetime(&claims(json!({"iat": now + 1, "exp": now + 10})), now));
        assert!(!within_lifetime(&claims(json!({"iat": now - 10, "exp": now - 1})), now));
        assert!(!within_lifetime(&claims(json!({"iat": now})), now));
    }

    #[test]
    fn audience_accepts_single_value_arrays() {
        assert_eq!(audience(&claims(json!({"aud": "democlient"}))), Some("democlient".into()));
        assert_eq!(audience(&claims(json!({"aud": ["democlient"]}))), Some("democlient".into()));
        assert_eq!(audience(&claims(json!({"aud": ["a", "b"]}))), None);
        assert_eq!(audience(&claims(json!({}))), None);
    }

    #[test]
    fn claims_are_merged_into_result() {
        let result = from_claims(
            claims(json!({
                "aud": "democlient",
                "sub": "42",
                "exp": 2,
                "iat": 1,
                "jti": "abc",
                "active": false,
            })),
            "democlient".into(),
        );
        assert!(result.active);
        assert_eq!(result.client_id.as_deref(), Some("democlient"));
        assert_eq!(result.sub.as_deref(), Some("42"));
        assert_eq!(result.exp, Some(2));
        assert_eq!(result.extra.get("jti"), Some(&json!("abc")));
        assert!(!result.extra.contains_key("active"));
    }

    #[test]
    fn unparseable_token_reads_as_nothing() {
        assert!(decode_unverified("not.a.jwt").is_none());
        assert!(decode_unverified("").is_none());
    }
}
