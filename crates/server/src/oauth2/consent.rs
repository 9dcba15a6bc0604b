//! Per-(user, client) consent records.
//!
//! Consent is binary: a row exists or it does not. Withdrawing consent also
//! removes every authorization code and token of the pair, in the same
//! transaction as the consent row itself.

use crate::entity::oauth2_client_grant;
use crate::oauth2::codes::CodeStore;
use crate::oauth2::tokens::TokenStore;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, TransactionTrait, sea_query::OnConflict,
};
use std::sync::Arc;
use time::OffsetDateTime;

/// Rows removed by a consent withdrawal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DenySummary {
    pub consents: u64,
    pub codes: u64,
    pub tokens: u64,
}

#[derive(Clone)]
pub struct ConsentStore {
    db: Arc<DatabaseConnection>,
}

impl ConsentStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self))]
    pub async fn is_granted_client(&self, user_id: &str, client_id: &str) -> Result<bool, DbErr> {
        Ok(self.count(user_id, client_id).await? > 0)
    }

    /// Record consent. Granting an already granted pair changes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn grant(&self, user_id: &str, client_id: &str) -> Result<(), DbErr> {
        let record = oauth2_client_grant::ActiveModel {
            user_id: Set(user_id.to_string()),
            client_id: Set(client_id.to_string()),
            created_at: Set(OffsetDateTime::now_utc()),
        };
        let inserted = oauth2_client_grant::Entity::insert(record)
            .on_conflict(
                OnConflict::columns([
                    oauth2_client_grant::Column::UserId,
                    oauth2_client_grant::Column::ClientId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;
        if inserted > 0 {
            tracing::info!(user_id, client_id, "User granted consent");
        }
        Ok(())
    }

    /// Withdraw consent and cascade to the pair's codes and tokens.
    ///
    /// Succeeds as a no-op when nothing was granted.
    #[tracing::instrument(skip(self))]
    pub async fn deny(&self, user_id: &str, client_id: &str) -> Result<DenySummary, DbErr> {
        let txn = self.db.begin().await?;

        let consents = oauth2_client_grant::Entity::delete_many()
            .filter(oauth2_client_grant::Column::UserId.eq(user_id))
            .filter(oauth2_client_grant::Column::ClientId.eq(client_id))
            .exec(&txn)
            .await?
            .rows_affected;
        let codes = CodeStore::delete_for_pair_in(&txn, user_id, client_id).await?;
        let tokens = TokenStore::delete_for_pair_in(&txn, user_id, client_id).await?;

        txn.commit().await?;

        let summary = DenySummary {
            consents,
            codes,
            tokens,
        };
        tracing::info!(user_id, client_id, ?summary, "User withdrew consent");
        Ok(summary)
    }

    /// Number of consent rows for a pair (0 or 1).
    pub async fn count(&self, user_id: &str, client_id: &str) -> Result<u64, DbErr> {
        oauth2_client_grant::Entity::find()
            .filter(oauth2_client_grant::Column::UserId.eq(user_id))
            .filter(oauth2_client_grant::Column::ClientId.eq(client_id))
            .count(self.db.as_ref())
            .await
    }
}
