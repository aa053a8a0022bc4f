//! Account approval token repository.

use chrono::{DateTime, Utc};
use domain::models::{ApprovalToken, NewApprovalToken};
use serde_json::json;
use uuid::Uuid;

use crate::entities::ApprovalTokenEntity;
use crate::store::{
    decode_row, timestamp_value, Filter, Row, Select, SharedStore, StoreError, StoreErrorKind,
    Table,
};

/// Repository for approval token rows. Only token hashes are stored.
#[derive(Clone)]
pub struct ApprovalTokenRepository {
    store: SharedStore,
}

impl ApprovalTokenRepository {
    /// Creates a new ApprovalTokenRepository over the given store.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Mark every unconsumed token of `user_id` as consumed. Returns how many were touched.
    pub async fn invalidate_active(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let filter = Filter::new()
            .eq_ser("user_id", user_id)
            .is_null("consumed_at");
        let mut changes = Row::new();
        changes.insert("consumed_at".into(), timestamp_value(now));

        let rows = self
            .store
            .update(Table::AccountApprovalTokens, &filter, changes)
            .await?;
        Ok(rows.len())
    }

    /// Persist a new token.
    pub async fn insert(&self, token: &NewApprovalToken) -> Result<ApprovalToken, StoreError> {
        let mut row = Row::new();
        row.insert("user_id".into(), json!(token.user_id));
        row.insert("email".into(), json!(token.email));
        row.insert("full_name".into(), json!(token.full_name));
        row.insert("token_hash".into(), json!(token.token_hash));
        row.insert("expires_at".into(), timestamp_value(token.expires_at));

        let rows = self
            .store
            .insert(Table::AccountApprovalTokens, vec![row])
            .await?;
        match rows.into_iter().next() {
            Some(row) => decode(row),
            None => Err(StoreError::new(
                StoreErrorKind::Other,
                "insert returned no rows",
            )),
        }
    }

    /// Find a token by the hash of its bearer value.
    pub async fn find_by_hash(&self, token_hash: &str) -> Result<Option<ApprovalToken>, StoreError> {
        self.store
            .select_one(
                Table::AccountApprovalTokens,
                Filter::new().eq("token_hash", token_hash),
            )
            .await?
            .map(decode)
            .transpose()
    }

    /// Stamp `consumed_at` on a token that is still unconsumed.
    ///
    /// Returns false when the token was already consumed or does not exist.
    pub async fn mark_consumed(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let filter = Filter::new().eq_ser("id", id).is_null("consumed_at");
        let mut changes = Row::new();
        changes.insert("consumed_at".into(), timestamp_value(now));

        let rows = self
            .store
            .update(Table::AccountApprovalTokens, &filter, changes)
            .await?;
        Ok(!rows.is_empty())
    }

    /// Number of unconsumed tokens held by `user_id`.
    pub async fn count_active(&self, user_id: Uuid) -> Result<usize, StoreError> {
        let filter = Filter::new()
            .eq_ser("user_id", user_id)
            .is_null("consumed_at");
        let rows = self
            .store
            .select(Table::AccountApprovalTokens, &Select::new(filter))
            .await?;
        Ok(rows.len())
    }
}

fn decode(row: Row) -> Result<ApprovalToken, StoreError> {
    decode_row::<ApprovalTokenEntity>(Table::AccountApprovalTokens, row).map(ApprovalToken::from)
}
