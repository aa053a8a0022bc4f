//! Profile handling on sign-in and sign-up.

use chrono::{DateTime, Utc};
use domain::models::retreat::clean_optional_text;
use domain::models::{ApprovalStatus, PrimaryAdmins, Profile, Role};
use persistence::repositories::{NewProfile, ProfileRepository};
use persistence::{SharedStore, StoreError};
use serde::Serialize;
use shared::validation::normalize_email;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::approval::{ApprovalError, ApprovalTokenService, IssueOutcome};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Access token carries no email address")]
    MissingEmail,

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::MissingEmail => ApiError::Unauthorized(err.to_string()),
            AccountError::Approval(e) => e.into(),
            AccountError::Store(e) => e.into(),
        }
    }
}

/// Result of a sign-up.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpOutcome {
    pub profile: Profile,
    pub approval_requested: bool,
}

#[derive(Clone)]
pub struct AccountService {
    store: SharedStore,
    approvals: ApprovalTokenService,
    primary_admins: PrimaryAdmins,
}

impl AccountService {
    pub fn new(
        store: SharedStore,
        approvals: ApprovalTokenService,
        primary_admins: PrimaryAdmins,
    ) -> Self {
        Self {
            store,
            approvals,
            primary_admins,
        }
    }

    /// Loads the caller's profile, creating it when missing.
    ///
    /// Primary admins are re-asserted as approved admins on every call.
    pub async fn sign_in(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Profile, AccountError> {
        let profile = self.ensure_profile(user_id, email, None, now).await?;
        self.reassert_primary_admin(profile, now).await
    }

    /// Creates the caller's profile and asks the approver to grant admin access.
    pub async fn sign_up(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        full_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SignUpOutcome, AccountError> {
        let profile = self.ensure_profile(user_id, email, full_name, now).await?;
        let profile = self.reassert_primary_admin(profile, now).await?;

        if profile.is_approved_admin() {
            return Ok(SignUpOutcome {
                profile,
                approval_requested: false,
            });
        }

        let full_name = clean_optional_text(full_name).or_else(|| profile.full_name.clone());
        let outcome = self
            .approvals
            .request_approval(profile.id, &profile.email, full_name.as_deref(), now)
            .await?;

        Ok(SignUpOutcome {
            profile,
            approval_requested: outcome == IssueOutcome::Issued,
        })
    }

    async fn ensure_profile(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        full_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Profile, AccountError> {
        let repo = ProfileRepository::new(self.store.clone());
        if let Some(profile) = repo.find_by_id(user_id).await? {
            return Ok(profile);
        }

        let email = email
            .map(normalize_email)
            .filter(|e| !e.is_empty())
            .ok_or(AccountError::MissingEmail)?;
        let primary = self.primary_admins.contains(&email);

        let (role, approval_status, approved_at) = if primary {
            (Role::Admin, ApprovalStatus::Approved, Some(now))
        } else {
            (Role::Participant, ApprovalStatus::Pending, None)
        };

        let profile = repo
            .insert(&NewProfile {
                id: user_id,
                email,
                full_name: clean_optional_text(full_name),
                role,
                approval_status,
                approved_at,
            })
            .await?;

        info!(user_id = %user_id, role = %profile.role, "Profile created");
        Ok(profile)
    }

    async fn reassert_primary_admin(
        &self,
        profile: Profile,
        now: DateTime<Utc>,
    ) -> Result<Profile, AccountError> {
        if !self.primary_admins.contains(&profile.email) || profile.is_approved_admin() {
            return Ok(profile);
        }

        let approved_at = profile.approved_at.or(Some(now));
        let updated = ProfileRepository::new(self.store.clone())
            .set_role_status(profile.id, Role::Admin, ApprovalStatus::Approved, approved_at)
            .await?;

        info!(user_id = %profile.id, "Primary admin re-asserted");
        Ok(updated.unwrap_or(profile))
    }
}
