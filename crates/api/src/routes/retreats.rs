//! Admin retreat management routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::retreat::{clean_optional_text, normalize_shirt_sizes};
use domain::models::{CreateRetreatRequest, Registration, Retreat, UpdateRetreatRequest};
use persistence::repositories::{NewRetreat, RegistrationRepository, RetreatChanges, RetreatRepository};
use shared::crypto::generate_share_link;
use shared::validation::validate_date_range;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AdminUser;

/// Create a retreat with a freshly generated share link.
///
/// POST /api/v1/retreats
pub async fn create_retreat(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(request): Json<CreateRetreatRequest>,
) -> Result<(StatusCode, Json<Retreat>), ApiError> {
    request.validate()?;

    let repo = RetreatRepository::new(state.store.clone());
    let retreat = repo
        .create(&NewRetreat {
            name: request.name.trim().to_string(),
            start_date: request.start_date,
            end_date: request.end_date,
            location: request.location.trim().to_string(),
            what_to_bring: clean_optional_text(request.what_to_bring.as_deref()),
            payment_instructions: clean_optional_text(request.payment_instructions.as_deref()),
            shirt_sizes: normalize_shirt_sizes(&request.shirt_sizes),
            instagram_handle: clean_optional_text(request.instagram_handle.as_deref()),
            whatsapp_group_link: clean_optional_text(request.whatsapp_group_link.as_deref()),
            share_link: generate_share_link(),
            is_active: request.is_active,
            created_by: Some(admin.user_id),
        })
        .await?;

    info!(
        retreat_id = %retreat.id,
        created_by = %admin.user_id,
        "Retreat created"
    );

    Ok((StatusCode::CREATED, Json(retreat)))
}

/// List retreats, latest start date first.
///
/// GET /api/v1/retreats
pub async fn list_retreats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<Retreat>>, ApiError> {
    let retreats = RetreatRepository::new(state.store.clone()).list().await?;
    Ok(Json(retreats))
}

/// GET /api/v1/retreats/:id
pub async fn get_retreat(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(retreat_id): Path<Uuid>,
) -> Result<Json<Retreat>, ApiError> {
    let retreat = RetreatRepository::new(state.store.clone())
        .find_by_id(retreat_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Retreat not found".into()))?;
    Ok(Json(retreat))
}

/// Partially update a retreat.
///
/// PUT /api/v1/retreats/:id
///
/// Absent fields are untouched. An empty string clears optional text.
pub async fn update_retreat(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(retreat_id): Path<Uuid>,
    Json(request): Json<UpdateRetreatRequest>,
) -> Result<Json<Retreat>, ApiError> {
    request.validate()?;

    let repo = RetreatRepository::new(state.store.clone());
    let existing = repo
        .find_by_id(retreat_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Retreat not found".into()))?;

    let changes = changes_from_request(&existing, &request)?;
    let retreat = repo
        .update(retreat_id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("Retreat not found".into()))?;

    info!(retreat_id = %retreat.id, updated_by = %admin.user_id, "Retreat updated");
    Ok(Json(retreat))
}

/// Delete a retreat and its registrations.
///
/// DELETE /api/v1/retreats/:id
pub async fn delete_retreat(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(retreat_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = RetreatRepository::new(state.store.clone())
        .delete(retreat_id)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("Retreat not found".into()));
    }

    info!(retreat_id = %retreat_id, deleted_by = %admin.user_id, "Retreat deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Registrations of a retreat, newest first.
///
/// GET /api/v1/retreats/:id/registrations
pub async fn list_registrations(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(retreat_id): Path<Uuid>,
) -> Result<Json<Vec<Registration>>, ApiError> {
    RetreatRepository::new(state.store.clone())
        .find_by_id(retreat_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Retreat not found".into()))?;

    let registrations = RegistrationRepository::new(state.store.clone())
        .list_by_retreat(retreat_id)
        .await?;
    Ok(Json(registrations))
}

fn changes_from_request(
    existing: &Retreat,
    request: &UpdateRetreatRequest,
) -> Result<RetreatChanges, ApiError> {
    let start = request.start_date.unwrap_or(existing.start_date);
    let end = request.end_date.or(existing.end_date);
    validate_date_range(start, end).map_err(|e| {
        ApiError::validation(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Invalid date range".to_string()),
        )
    })?;

    let clear_or_set = |value: &Option<String>| {
        value
            .as_deref()
            .map(|v| clean_optional_text(Some(v)))
    };

    Ok(RetreatChanges {
        name: request.name.as_deref().map(|n| n.trim().to_string()),
        start_date: request.start_date,
        end_date: request.end_date.map(Some),
        location: request.location.as_deref().map(|l| l.trim().to_string()),
        what_to_bring: clear_or_set(&request.what_to_bring),
        payment_instructions: clear_or_set(&request.payment_instructions),
        shirt_sizes: request.shirt_sizes.as_deref().map(normalize_shirt_sizes),
        instagram_handle: clear_or_set(&request.instagram_handle),
        whatsapp_group_link: clear_or_set(&request.whatsapp_group_link),
        is_active: request.is_active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn retreat() -> Retreat {
        Retreat {
            id: Uuid::new_v4(),
            name: "Retiro de Carnaval".to_string(),
            start_date: date(2026, 2, 14),
            end_date: Some(date(2026, 2, 17)),
            location: "Casa de Retiros".to_string(),
            what_to_bring: Some("Bíblia".to_string()),
            payment_instructions: None,
            shirt_sizes: vec!["P".to_string(), "M".to_string()],
            instagram_handle: None,
            whatsapp_group_link: None,
            share_link: "abc123".to_string(),
            is_active: true,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_text_clears_and_absent_keeps() {
        let request = UpdateRetreatRequest {
            what_to_bring: Some("  ".to_string()),
            payment_instructions: Some(" PIX: chave@exemplo.com ".to_string()),
            ..Default::default()
        };

        let changes = changes_from_request(&retreat(), &request).unwrap();
        assert_eq!(changes.what_to_bring, Some(None));
        assert_eq!(
            changes.payment_instructions,
            Some(Some("PIX: chave@exemplo.com".to_string()))
        );
        assert_eq!(changes.instagram_handle, None);
        assert_eq!(changes.name, None);
    }

    #[test]
    fn test_start_after_existing_end_is_rejected() {
        let request = UpdateRetreatRequest {
            start_date: Some(date(2026, 3, 1)),
            ..Default::default()
        };
        assert!(matches!(
            changes_from_request(&retreat(), &request),
            Err(ApiError::Validation { .. })
        ));
    }

    #[test]
    fn test_shirt_sizes_normalized() {
        let request = UpdateRetreatRequest {
            shirt_sizes: Some(vec![" G ".to_string(), "G".to_string(), "P".to_string()]),
            ..Default::default()
        };
        let changes = changes_from_request(&retreat(), &request).unwrap();
        assert_eq!(
            changes.shirt_sizes,
            Some(vec!["G".to_string(), "P".to_string()])
        );
    }
}
