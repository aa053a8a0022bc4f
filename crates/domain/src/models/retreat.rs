//! Retreat domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Shirt sizes offered when an organizer does not configure any.
pub const DEFAULT_SHIRT_SIZES: [&str; 5] = ["P", "M", "G", "GG", "XG"];

/// An organized event that participants register for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retreat {
    pub id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub location: String,
    pub what_to_bring: Option<String>,
    /// Organizer-wide default payment text offered when sending payment links.
    pub payment_instructions: Option<String>,
    pub shirt_sizes: Vec<String>,
    pub instagram_handle: Option<String>,
    pub whatsapp_group_link: Option<String>,
    pub share_link: String,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Retreat {
    /// Returns the stored WhatsApp group link when it is non-blank.
    pub fn group_link(&self) -> Option<&str> {
        self.whatsapp_group_link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
    }

    pub fn offers_shirt_size(&self, size: &str) -> bool {
        self.shirt_sizes.iter().any(|s| s == size)
    }
}

/// Formats a retreat's dates as `dd/mm/yyyy`, joining a multi-day range with `joiner`.
///
/// A missing start renders as `-`; an end equal to the start is omitted.
pub fn format_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>, joiner: &str) -> String {
    let Some(start) = start else {
        return "-".to_string();
    };
    let start_str = start.format("%d/%m/%Y").to_string();

    match end {
        Some(end) if end != start => {
            format!("{} {} {}", start_str, joiner, end.format("%d/%m/%Y"))
        }
        _ => start_str,
    }
}

/// Public view of a retreat, exposed through its share link.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRetreat {
    pub id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub location: String,
    pub what_to_bring: Option<String>,
    pub shirt_sizes: Vec<String>,
    pub instagram_handle: Option<String>,
    pub share_link: String,
}

impl From<Retreat> for PublicRetreat {
    fn from(retreat: Retreat) -> Self {
        Self {
            id: retreat.id,
            name: retreat.name,
            start_date: retreat.start_date,
            end_date: retreat.end_date,
            location: retreat.location,
            what_to_bring: retreat.what_to_bring,
            shirt_sizes: retreat.shirt_sizes,
            instagram_handle: retreat.instagram_handle,
            share_link: retreat.share_link,
        }
    }
}

/// Request payload for creating a retreat.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_create_dates", skip_on_field_errors = false))]
pub struct CreateRetreatRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub name: String,

    pub start_date: NaiveDate,

    pub end_date: Option<NaiveDate>,

    #[validate(length(min = 1, max = 300, message = "Location must be between 1 and 300 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub location: String,

    pub what_to_bring: Option<String>,

    pub payment_instructions: Option<String>,

    #[serde(default)]
    pub shirt_sizes: Vec<String>,

    pub instagram_handle: Option<String>,

    pub whatsapp_group_link: Option<String>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Request payload for updating a retreat. Absent fields are left untouched;
/// an empty string clears an optional text field.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRetreatRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub name: Option<String>,

    pub start_date: Option<NaiveDate>,

    pub end_date: Option<NaiveDate>,

    #[validate(length(min = 1, max = 300, message = "Location must be between 1 and 300 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub location: Option<String>,

    pub what_to_bring: Option<String>,

    pub payment_instructions: Option<String>,

    pub shirt_sizes: Option<Vec<String>>,

    pub instagram_handle: Option<String>,

    pub whatsapp_group_link: Option<String>,

    pub is_active: Option<bool>,
}

fn default_active() -> bool {
    true
}

fn validate_create_dates(req: &CreateRetreatRequest) -> Result<(), validator::ValidationError> {
    shared::validation::validate_date_range(req.start_date, req.end_date)
}

/// Trims, drops blanks and de-duplicates shirt sizes, keeping first-seen order.
///
/// An empty result falls back to [`DEFAULT_SHIRT_SIZES`].
pub fn normalize_shirt_sizes(sizes: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(sizes.len());
    for size in sizes {
        let trimmed = size.trim();
        if !trimmed.is_empty() && !out.iter().any(|s| s == trimmed) {
            out.push(trimmed.to_string());
        }
    }

    if out.is_empty() {
        DEFAULT_SHIRT_SIZES.iter().map(|s| s.to_string()).collect()
    } else {
        out
    }
}

/// Converts optional free text into a stored value: trimmed, `None` when blank.
pub fn clean_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
