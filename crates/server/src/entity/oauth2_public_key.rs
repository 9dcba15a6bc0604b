//! Per-client key material used to verify JWT-format access tokens.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_public_key")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub client_id: String,
    /// PEM-encoded RSA public key
    pub public_key: String,
    /// PEM-encoded RSA private key. Only the signing side uses it.
    #[serde(skip_serializing)]
    pub private_key: String,
    /// JWS algorithm name, e.g. "RS256"
    pub encryption_algorithm: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
