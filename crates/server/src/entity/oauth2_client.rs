//! OAuth2 Client entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_client")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Shared secret, compared byte for byte
    #[serde(skip_serializing)]
    pub secret: String,
    /// The single registered redirect URI, stored exactly as registered
    pub redirect_uri: String,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Exact comparison against the registered secret.
    pub fn secret_matches(&self, presented: &str) -> bool {
        self.secret == presented
    }

    /// Check a presented redirect URI against the registered one.
    ///
    /// An empty URI means "use the registered default". Anything else must be
    /// byte-identical; no normalization and no extra query parameters.
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        uri.is_empty() || self.redirect_uri == uri
    }
}
