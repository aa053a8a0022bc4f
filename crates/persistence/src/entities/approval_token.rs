//! Account approval token entity (store row mapping).

use chrono::{DateTime, Utc};
use domain::models::ApprovalToken;
use serde::Deserialize;
use uuid::Uuid;

/// Row mapping for the account_approval_tokens table.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalTokenEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApprovalTokenEntity> for ApprovalToken {
    fn from(entity: ApprovalTokenEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            email: entity.email,
            full_name: entity.full_name,
            token_hash: entity.token_hash,
            expires_at: entity.expires_at,
            consumed_at: entity.consumed_at,
            created_at: entity.created_at,
        }
    }
}
