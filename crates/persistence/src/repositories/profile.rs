//! Profile repository.

use chrono::{DateTime, Utc};
use domain::models::{ApprovalStatus, Profile, Role};
use serde_json::json;
use uuid::Uuid;

use crate::entities::ProfileEntity;
use crate::store::{decode_row, timestamp_value, Filter, Row, SharedStore, StoreError, StoreErrorKind, Table};

/// Fields written when creating a profile.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Repository for profile rows.
#[derive(Clone)]
pub struct ProfileRepository {
    store: SharedStore,
}

impl ProfileRepository {
    /// Creates a new ProfileRepository over the given store.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Find a profile by user ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        self.store
            .select_one(Table::Profiles, Filter::new().eq_ser("id", id))
            .await?
            .map(decode)
            .transpose()
    }

    /// Insert a profile.
    pub async fn insert(&self, profile: &NewProfile) -> Result<Profile, StoreError> {
        let mut row = Row::new();
        row.insert("id".into(), json!(profile.id));
        row.insert("email".into(), json!(profile.email));
        row.insert("full_name".into(), json!(profile.full_name));
        row.insert("role".into(), json!(profile.role.as_str()));
        row.insert(
            "approval_status".into(),
            json!(profile.approval_status.as_str()),
        );
        if let Some(approved_at) = profile.approved_at {
            row.insert("approved_at".into(), timestamp_value(approved_at));
        }

        let rows = self.store.insert(Table::Profiles, vec![row]).await?;
        match rows.into_iter().next() {
            Some(row) => decode(row),
            None => Err(StoreError::new(
                StoreErrorKind::Other,
                "insert returned no rows",
            )),
        }
    }

    /// Set role and approval status. Returns `None` when no profile matched.
    pub async fn set_role_status(
        &self,
        id: Uuid,
        role: Role,
        approval_status: ApprovalStatus,
        approved_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Profile>, StoreError> {
        let mut changes = Row::new();
        changes.insert("role".into(), json!(role.as_str()));
        changes.insert("approval_status".into(), json!(approval_status.as_str()));
        changes.insert(
            "approved_at".into(),
            approved_at.map(timestamp_value).unwrap_or_default(),
        );
        changes.insert("updated_at".into(), timestamp_value(Utc::now()));

        let rows = self
            .store
            .update(Table::Profiles, &Filter::new().eq_ser("id", id), changes)
            .await?;
        rows.into_iter().next().map(decode).transpose()
    }
}

fn decode(row: Row) -> Result<Profile, StoreError> {
    decode_row::<ProfileEntity>(Table::Profiles, row).map(Profile::from)
}
