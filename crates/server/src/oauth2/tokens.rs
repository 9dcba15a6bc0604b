//! Access and refresh token storage.
//!
//! Tokens are always created in pairs. The two halves live in separate tables
//! and expire independently.

use crate::entity::{oauth2_access_token, oauth2_refresh_token};
use crate::error::OAuth2Result;
use crate::oauth2::state::OAuth2State;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter,
};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// A freshly issued access/refresh token pair.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: Option<String>,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct TokenStore {
    db: Arc<DatabaseConnection>,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenStore {
    pub fn new(db: Arc<DatabaseConnection>, access_secs: i64, refresh_secs: i64) -> Self {
        Self {
            db,
            access_lifetime: Duration::seconds(access_secs),
            refresh_lifetime: Duration::seconds(refresh_secs),
        }
    }

    /// Access token lifetime in whole seconds, as reported in `expires_in`.
    pub fn access_lifetime_secs(&self) -> i64 {
        self.access_lifetime.whole_seconds()
    }

    /// Issue a new pair outside of any transaction.
    #[tracing::instrument(skip(self))]
    pub async fn issue_pair(
        &self,
        client_id: &str,
        user_id: &str,
        scope: Option<&str>,
    ) -> OAuth2Result<TokenPair> {
        self.issue_pair_in(self.db.as_ref(), client_id, user_id, scope)
            .await
    }

    pub(crate) async fn issue_pair_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        client_id: &str,
        user_id: &str,
        scope: Option<&str>,
    ) -> OAuth2Result<TokenPair> {
        let now = OffsetDateTime::now_utc();
        let pair = TokenPair {
            access_token: OAuth2State::generate_token()?,
            refresh_token: OAuth2State::generate_token()?,
            scope: scope.map(String::from),
            access_expires_at: now + self.access_lifetime,
            refresh_expires_at: now + self.refresh_lifetime,
        };

        oauth2_access_token::ActiveModel {
            access_token: Set(pair.access_token.clone()),
            client_id: Set(client_id.to_string()),
            user_id: Set(user_id.to_string()),
            scope: Set(pair.scope.clone()),
            expires_at: Set(pair.access_expires_at),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;

        oauth2_refresh_token::ActiveModel {
            refresh_token: Set(pair.refresh_token.clone()),
            client_id: Set(client_id.to_string()),
            user_id: Set(user_id.to_string()),
            scope: Set(pair.scope.clone()),
            expires_at: Set(pair.refresh_expires_at),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;

        tracing::info!(client_id, user_id, "Issued token pair");
        Ok(pair)
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn access_token(
        &self,
        token: &str,
    ) -> Result<Option<oauth2_access_token::Model>, DbErr> {
        oauth2_access_token::Entity::find_by_id(token)
            .one(self.db.as_ref())
            .await
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<oauth2_refresh_token::Model>, DbErr> {
        Self::find_refresh_in(self.db.as_ref(), token).await
    }

    pub(crate) async fn find_refresh_in<C: ConnectionTrait>(
        conn: &C,
        token: &str,
    ) -> Result<Option<oauth2_refresh_token::Model>, DbErr> {
        oauth2_refresh_token::Entity::find_by_id(token).one(conn).await
    }

    /// Delete an access token, returning whether it existed.
    #[tracing::instrument(skip(self, token))]
    pub async fn delete_access_token(&self, token: &str) -> Result<bool, DbErr> {
        let result = oauth2_access_token::Entity::delete_many()
            .filter(oauth2_access_token::Column::AccessToken.eq(token))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Delete a refresh token, returning whether it existed.
    #[tracing::instrument(skip(self, token))]
    pub async fn delete_refresh_token(&self, token: &str) -> Result<bool, DbErr> {
        Self::delete_refresh_in(self.db.as_ref(), token).await
    }

    pub(crate) async fn delete_refresh_in<C: ConnectionTrait>(
        conn: &C,
        token: &str,
    ) -> Result<bool, DbErr> {
        let result = oauth2_refresh_token::Entity::delete_many()
            .filter(oauth2_refresh_token::Column::RefreshToken.eq(token))
            .exec(conn)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Delete both token kinds of a `(user, client)` pair.
    pub(crate) async fn delete_for_pair_in<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
        client_id: &str,
    ) -> Result<u64, DbErr> {
        let access = oauth2_access_token::Entity::delete_many()
            .filter(oauth2_access_token::Column::UserId.eq(user_id))
            .filter(oauth2_access_token::Column::ClientId.eq(client_id))
            .exec(conn)
            .await?;
        let refresh = oauth2_refresh_token::Entity::delete_many()
            .filter(oauth2_refresh_token::Column::UserId.eq(user_id))
            .filter(oauth2_refresh_token::Column::ClientId.eq(client_id))
            .exec(conn)
            .await?;
        Ok(access.rows_affected + refresh.rows_affected)
    }

    /// Count `(access, refresh)` tokens of a `(user, client)` pair.
    pub async fn count_for_pair(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<(u64, u64), DbErr> {
        let access = oauth2_access_token::Entity::find()
            .filter(oauth2_access_token::Column::UserId.eq(user_id))
            .filter(oauth2_access_token::Column::ClientId.eq(client_id))
            .count(self.db.as_ref())
            .await?;
        let refresh = oauth2_refresh_token::Entity::find()
            .filter(oauth2_refresh_token::Column::UserId.eq(user_id))
            .filter(oauth2_refresh_token::Column::ClientId.eq(client_id))
            .count(self.db.as_ref())
            .await?;
        Ok((access, refresh))
    }

    /// Remove tokens whose lifetime has passed.
    #[tracing::instrument(skip(self))]
    pub async fn purge_expired(&self) -> Result<u64, DbErr> {
        let now = OffsetDateTime::now_utc();
        let access = oauth2_access_token::Entity::delete_many()
            .filter(oauth2_access_token::Column::ExpiresAt.lt(now))
            .exec(self.db.as_ref())
            .await?;
        let refresh = oauth2_refresh_token::Entity::delete_many()
            .filter(oauth2_refresh_token::Column::ExpiresAt.lt(now))
            .exec(self.db.as_ref())
            .await?;
        let total = access.rows_affected + refresh.rows_affected;
        if total > 0 {
            tracing::info!(
                access = access.rows_affected,
                refresh = refresh.rows_affected,
                "Purged expired tokens"
            );
        }
        Ok(total)
    }
}
