//! Account approval token domain model.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Lifetime of an approval token.
pub const APPROVAL_TOKEN_TTL_DAYS: i64 = 7;

/// Stored approval token. Only the SHA-256 hash of the bearer value is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Validation-time state of a token. `Expired` is computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Consumed,
    Expired,
}

impl ApprovalToken {
    /// Consumption wins over expiry so a used link keeps reporting success.
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.consumed_at.is_some() {
            TokenState::Consumed
        } else if self.expires_at < now {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }
}

/// Expiry for a token issued at `issued_at`.
pub fn expiry_from(issued_at: DateTime<Utc>, ttl_days: i64) -> DateTime<Utc> {
    issued_at + Duration::days(ttl_days)
}

/// Fields persisted when issuing a token.
#[derive(Debug, Clone)]
pub struct NewApprovalToken {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}
