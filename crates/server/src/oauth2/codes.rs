//! Authorization code storage.
//!
//! Codes are redeemed with a conditional delete: the request whose delete
//! removed the row owns the code, every concurrent redemption sees zero rows.

use crate::entity::oauth2_authorization;
use crate::error::OAuth2Result;
use crate::oauth2::state::OAuth2State;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter,
};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

#[derive(Clone)]
pub struct CodeStore {
    db: Arc<DatabaseConnection>,
    lifetime: Duration,
}

impl CodeStore {
    pub fn new(db: Arc<DatabaseConnection>, lifetime_secs: i64) -> Self {
        Self {
            db,
            lifetime: Duration::seconds(lifetime_secs),
        }
    }

    /// Create a code bound to `(client_id, user_id, redirect_uri)`.
    #[tracing::instrument(skip(self))]
    pub async fn issue(
        &self,
        client_id: &str,
        user_id: &str,
        redirect_uri: &str,
        scope: Option<&str>,
    ) -> OAuth2Result<oauth2_authorization::Model> {
        let now = OffsetDateTime::now_utc();
        let code = oauth2_authorization::ActiveModel {
            code: Set(OAuth2State::generate_token()?),
            client_id: Set(client_id.to_string()),
            user_id: Set(user_id.to_string()),
            redirect_uri: Set(redirect_uri.to_string()),
            scope: Set(scope.map(String::from)),
            expires_at: Set(now + self.lifetime),
            created_at: Set(now),
        };
        let code = code.insert(self.db.as_ref()).await?;
        tracing::debug!(client_id, user_id, "Issued authorization code");
        Ok(code)
    }

    #[tracing::instrument(skip(self, code))]
    pub async fn get(&self, code: &str) -> Result<Option<oauth2_authorization::Model>, DbErr> {
        Self::find_in(self.db.as_ref(), code).await
    }

    pub(crate) async fn find_in<C: ConnectionTrait>(
        conn: &C,
        code: &str,
    ) -> Result<Option<oauth2_authorization::Model>, DbErr> {
        oauth2_authorization::Entity::find_by_id(code).one(conn).await
    }

    /// Delete a code, returning whether this call removed it.
    pub(crate) async fn consume_in<C: ConnectionTrait>(
        conn: &C,
        code: &str,
    ) -> Result<bool, DbErr> {
        let result = oauth2_authorization::Entity::delete_many()
            .filter(oauth2_authorization::Column::Code.eq(code))
            .exec(conn)
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub(crate) async fn delete_for_pair_in<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
        client_id: &str,
    ) -> Result<u64, DbErr> {
        let result = oauth2_authorization::Entity::delete_many()
            .filter(oauth2_authorization::Column::UserId.eq(user_id))
            .filter(oauth2_authorization::Column::ClientId.eq(client_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Count the codes of a `(user, client)` pair.
    pub async fn count_for_pair(&self, user_id: &str, client_id: &str) -> Result<u64, DbErr> {
        use sea_orm::PaginatorTrait;
        oauth2_authorization::Entity::find()
            .filter(oauth2_authorization::Column::UserId.eq(user_id))
            .filter(oauth2_authorization::Column::ClientId.eq(client_id))
            .count(self.db.as_ref())
            .await
    }

    /// Remove codes whose lifetime has passed.
    #[tracing::instrument(skip(self))]
    pub async fn purge_expired(&self) -> Result<u64, DbErr> {
        let result = oauth2_authorization::Entity::delete_many()
            .filter(oauth2_authorization::Column::ExpiresAt.lt(OffsetDateTime::now_utc()))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected > 0 {
            tracing::info!(count = result.rows_affected, "Purged expired authorization codes");
        }
        Ok(result.rows_affected)
    }
}
