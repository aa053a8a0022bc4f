//! Profile entity (store row mapping).

use chrono::{DateTime, Utc};
use domain::models::{ApprovalStatus, Profile, Role};
use serde::Deserialize;
use uuid::Uuid;

/// Row mapping for the profiles table.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileEntity {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub approval_status: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ProfileEntity> for Profile {
    fn from(entity: ProfileEntity) -> Self {
        let role = match entity.role.as_deref() {
            Some("admin") => Role::Admin,
            _ => Role::Participant,
        };
        let approval_status = match entity.approval_status.as_deref() {
            Some("approved") => ApprovalStatus::Approved,
            _ => ApprovalStatus::Pending,
        };

        Self {
            id: entity.id,
            email: entity.email,
            full_name: entity.full_name,
            role,
            approval_status,
            approved_at: entity.approved_at,
            created_at: entity.created_at,
        }
    }
}
