//! Retreat repository.

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::Retreat;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::entities::RetreatEntity;
use crate::store::{
    decode_row, timestamp_value, Filter, Row, Select, SharedStore, StoreError, Table,
};

/// Fields written when creating a retreat.
#[derive(Debug, Clone)]
pub struct NewRetreat {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub location: String,
    pub what_to_bring: Option<String>,
    pub payment_instructions: Option<String>,
    pub shirt_sizes: Vec<String>,
    pub instagram_handle: Option<String>,
    pub whatsapp_group_link: Option<String>,
    pub share_link: String,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
}

/// Partial update of a retreat. `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct RetreatChanges {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
    pub location: Option<String>,
    pub what_to_bring: Option<Option<String>>,
    pub payment_instructions: Option<Option<String>>,
    pub shirt_sizes: Option<Vec<String>>,
    pub instagram_handle: Option<Option<String>>,
    pub whatsapp_group_link: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl RetreatChanges {
    fn into_row(self, now: DateTime<Utc>) -> Row {
        let mut row = Row::new();
        if let Some(v) = self.name {
            row.insert("name".into(), json!(v));
        }
        if let Some(v) = self.start_date {
            row.insert("date".into(), json!(v));
        }
        if let Some(v) = self.end_date {
            row.insert("end_date".into(), json!(v));
        }
        if let Some(v) = self.location {
            row.insert("location".into(), json!(v));
        }
        if let Some(v) = self.what_to_bring {
            row.insert("what_to_bring".into(), json!(v));
        }
        if let Some(v) = self.payment_instructions {
            row.insert("payment_instructions".into(), json!(v));
        }
        if let Some(v) = self.shirt_sizes {
            row.insert("shirt_sizes".into(), json!(v));
        }
        if let Some(v) = self.instagram_handle {
            row.insert("instagram_handle".into(), json!(v));
        }
        if let Some(v) = self.whatsapp_group_link {
            row.insert("whatsapp_group_link".into(), json!(v));
        }
        if let Some(v) = self.is_active {
            row.insert("is_active".into(), json!(v));
        }
        row.insert("updated_at".into(), timestamp_value(now));
        row
    }
}

/// Repository for retreat rows.
#[derive(Clone)]
pub struct RetreatRepository {
    store: SharedStore,
}

impl RetreatRepository {
    /// Creates a new RetreatRepository over the given store.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Create a retreat.
    ///
    /// Stores without an `end_date` column are retried without it.
    pub async fn create(&self, retreat: &NewRetreat) -> Result<Retreat, StoreError> {
        let mut row = Row::new();
        row.insert("name".into(), json!(retreat.name));
        row.insert("date".into(), json!(retreat.start_date));
        row.insert("end_date".into(), json!(retreat.end_date));
        row.insert("location".into(), json!(retreat.location));
        row.insert("what_to_bring".into(), json!(retreat.what_to_bring));
        row.insert("payment_instructions".into(), json!(retreat.payment_instructions));
        row.insert("shirt_sizes".into(), json!(retreat.shirt_sizes));
        row.insert("instagram_handle".into(), json!(retreat.instagram_handle));
        row.insert("whatsapp_group_link".into(), json!(retreat.whatsapp_group_link));
        row.insert("share_link".into(), json!(retreat.share_link));
        row.insert("is_active".into(), json!(retreat.is_active));
        row.insert("created_by".into(), json!(retreat.created_by));

        let inserted = match self.store.insert(Table::Retreats, vec![row.clone()]).await {
            Err(e) if e.is_schema_mismatch() && e.mentions_column("end_date") => {
                tracing::warn!(error = %e, "Store has no end_date column, retrying without it");
                row.remove("end_date");
                self.store.insert(Table::Retreats, vec![row]).await?
            }
            other => other?,
        };

        single(inserted)
    }

    /// Find a retreat by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Retreat>, StoreError> {
        self.store
            .select_one(Table::Retreats, Filter::new().eq_ser("id", id))
            .await?
            .map(decode)
            .transpose()
    }

    /// Find an active retreat by its public share link.
    pub async fn find_active_by_share_link(
        &self,
        share_link: &str,
    ) -> Result<Option<Retreat>, StoreError> {
        let filter = Filter::new()
            .eq("share_link", share_link)
            .eq("is_active", true);
        self.store
            .select_one(Table::Retreats, filter)
            .await?
            .map(decode)
            .transpose()
    }

    /// List all retreats, most recent start date first.
    pub async fn list(&self) -> Result<Vec<Retreat>, StoreError> {
        self.store
            .select(Table::Retreats, &Select::default().order_by("date", true))
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Apply a partial update. Returns `None` when no row matched.
    pub async fn update(
        &self,
        id: Uuid,
        changes: RetreatChanges,
    ) -> Result<Option<Retreat>, StoreError> {
        let rows = self
            .store
            .update(
                Table::Retreats,
                &Filter::new().eq_ser("id", id),
                changes.into_row(Utc::now()),
            )
            .await?;
        rows.into_iter().next().map(decode).transpose()
    }

    /// Store the WhatsApp group link on a retreat. Returns whether a row matched.
    pub async fn set_whatsapp_group_link(&self, id: Uuid, link: &str) -> Result<bool, StoreError> {
        let mut row = Row::new();
        row.insert("whatsapp_group_link".into(), Value::String(link.to_string()));
        row.insert("updated_at".into(), timestamp_value(Utc::now()));

        let rows = self
            .store
            .update(Table::Retreats, &Filter::new().eq_ser("id", id), row)
            .await?;
        Ok(!rows.is_empty())
    }

    /// Delete a retreat and, through the cascade, its registrations.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let rows = self
            .store
            .delete(Table::Retreats, &Filter::new().eq_ser("id", id))
            .await?;
        Ok(!rows.is_empty())
    }
}

fn decode(row: Row) -> Result<Retreat, StoreError> {
    decode_row::<RetreatEntity>(Table::Retreats, row).map(Retreat::from)
}

fn single(rows: Vec<Row>) -> Result<Retreat, StoreError> {
    match rows.into_iter().next() {
        Some(row) => decode(row),
        None => Err(StoreError::new(
            crate::store::StoreErrorKind::Other,
            "insert returned no rows",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTableStore;
    use std::sync::Arc;

    fn new_retreat(share: &str, start: NaiveDate) -> NewRetreat {
        NewRetreat {
            name: "Retiro de Quaresma".to_string(),
            start_date: start,
            end_date: Some(start + chrono::Duration::days(2)),
            location: "Mosteiro".to_string(),
            what_to_bring: Some("Bíblia".to_string()),
            payment_instructions: Some("PIX: 123".to_string()),
            shirt_sizes: vec!["M".to_string(), "G".to_string()],
            instagram_handle: None,
            whatsapp_group_link: None,
            share_link: share.to_string(),
            is_active: true,
            created_by: None,
        }
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = RetreatRepository::new(Arc::new(MemoryTableStore::new()));
        let created = repo.create(&new_retreat("abc", date(3, 6))).await.unwrap();

        assert_eq!(created.end_date, Some(date(3, 8)));
        assert_eq!(created.shirt_sizes, vec!["M", "G"]);

        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found, created);

        let by_link = repo.find_active_by_share_link("abc").await.unwrap();
        assert_eq!(by_link.map(|r| r.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_create_without_end_date_column() {
        let store = Arc::new(MemoryTableStore::new());
        store.drop_columns(Table::Retreats, &["end_date"]).await;
        let repo = RetreatRepository::new(store);

        let created = repo.create(&new_retreat("abc", date(3, 6))).await.unwrap();
        assert_eq!(created.end_date, None);
    }

    #[tokio::test]
    async fn test_inactive_not_found_by_share_link() {
        let repo = RetreatRepository::new(Arc::new(MemoryTableStore::new()));
        let mut retreat = new_retreat("hidden", date(3, 6));
        retreat.is_active = false;
        repo.create(&retreat).await.unwrap();

        assert!(repo.find_active_by_share_link("hidden").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_start_date_desc() {
        let repo = RetreatRepository::new(Arc::new(MemoryTableStore::new()));
        repo.create(&new_retreat("a", date(1, 10))).await.unwrap();
        repo.create(&new_retreat("b", date(5, 10))).await.unwrap();
        repo.create(&new_retreat("c", date(3, 10))).await.unwrap();

        let shares: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.share_link)
            .collect();
        assert_eq!(shares, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_update_and_clear() {
        let repo = RetreatRepository::new(Arc::new(MemoryTableStore::new()));
        let created = repo.create(&new_retreat("abc", date(3, 6))).await.unwrap();

        let updated = repo
            .update(
                created.id,
                RetreatChanges {
                    name: Some("Novo nome".to_string()),
                    payment_instructions: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Novo nome");
        assert_eq!(updated.payment_instructions, None);
        assert_eq!(updated.what_to_bring.as_deref(), Some("Bíblia"));

        assert!(repo
            .update(Uuid::new_v4(), RetreatChanges::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_set_group_link_and_delete() {
        let repo = RetreatRepository::new(Arc::new(MemoryTableStore::new()));
        let created = repo.create(&new_retreat("abc", date(3, 6))).await.unwrap();

        assert!(repo
            .set_whatsapp_group_link(created.id, "https://chat.whatsapp.com/g")
            .await
            .unwrap());
        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.group_link(), Some("https://chat.whatsapp.com/g"));

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }
}
