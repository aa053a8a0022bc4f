//! Registration entity (store row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{PaymentStatus, Registration};
use serde::Deserialize;
use uuid::Uuid;

/// Row mapping for the registrations table.
///
/// Rows written by older schemas carry `uses_controlled_medication` and
/// `medication_details` instead of the health-issue columns.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationEntity {
    pub id: Uuid,
    pub retreat_id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub email: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub parish: Option<String>,
    #[serde(default)]
    pub has_health_issue: Option<bool>,
    #[serde(default)]
    pub health_issue_details: Option<String>,
    #[serde(default)]
    pub uses_controlled_medication: Option<bool>,
    #[serde(default)]
    pub medication_details: Option<String>,
    #[serde(default)]
    pub shirt_size: Option<String>,
    #[serde(default)]
    pub emergency_contact_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_phone: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_link: Option<String>,
    #[serde(default)]
    pub whatsapp_group_link: Option<String>,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub terms_accepted: Option<bool>,
    #[serde(default)]
    pub terms_accepted_at: Option<DateTime<Utc>>,
}

impl From<RegistrationEntity> for Registration {
    fn from(entity: RegistrationEntity) -> Self {
        let payment_status = match entity.payment_status.as_deref() {
            None => PaymentStatus::Pending,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    registration_id = %entity.id,
                    payment_status = %raw,
                    "Unknown payment status in store, treating as pending"
                );
                PaymentStatus::Pending
            }),
        };

        Self {
            id: entity.id,
            retreat_id: entity.retreat_id,
            full_name: entity.full_name,
            phone: entity.phone.unwrap_or_default(),
            email: entity.email,
            date_of_birth: entity.date_of_birth,
            parish: entity.parish,
            has_health_issue: entity
                .has_health_issue
                .or(entity.uses_controlled_medication)
                .unwrap_or(false),
            health_issue_details: entity.health_issue_details.or(entity.medication_details),
            shirt_size: entity.shirt_size,
            emergency_contact_name: entity.emergency_contact_name,
            emergency_contact_phone: entity.emergency_contact_phone,
            payment_status,
            payment_link: entity.payment_link,
            whatsapp_group_link: entity.whatsapp_group_link,
            registered_at: entity.registered_at,
            payment_confirmed_at: entity.payment_confirmed_at,
            terms_accepted: entity.terms_accepted.unwrap_or(false),
            terms_accepted_at: entity.terms_accepted_at,
        }
    }
}
