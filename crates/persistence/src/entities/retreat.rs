//! Retreat entity (store row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::retreat::normalize_shirt_sizes;
use domain::models::Retreat;
use serde::Deserialize;
use uuid::Uuid;

/// Row mapping for the retreats table.
///
/// `date` is the start date column.
#[derive(Debug, Clone, Deserialize)]
pub struct RetreatEntity {
    pub id: Uuid,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub what_to_bring: Option<String>,
    #[serde(default)]
    pub payment_instructions: Option<String>,
    #[serde(default)]
    pub shirt_sizes: Option<Vec<String>>,
    #[serde(default)]
    pub instagram_handle: Option<String>,
    #[serde(default)]
    pub whatsapp_group_link: Option<String>,
    pub share_link: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl From<RetreatEntity> for Retreat {
    fn from(entity: RetreatEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            start_date: entity.date,
            end_date: entity.end_date,
            location: entity.location.unwrap_or_default(),
            what_to_bring: entity.what_to_bring,
            payment_instructions: entity.payment_instructions,
            shirt_sizes: normalize_shirt_sizes(&entity.shirt_sizes.unwrap_or_default()),
            instagram_handle: entity.instagram_handle,
            whatsapp_group_link: entity.whatsapp_group_link,
            share_link: entity.share_link,
            is_active: entity.is_active,
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at.unwrap_or(entity.created_at),
        }
    }
}
