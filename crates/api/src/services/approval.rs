//! Admin account approval tokens.
//!
//! Issuing stores only the SHA-256 hash of a random bearer token and emails the
//! raw value to the approver inside a link. Consuming the link elevates the
//! profile and then marks the token used, so a failed profile write leaves the
//! link usable.

use chrono::{DateTime, Utc};
use domain::models::approval_token::expiry_from;
use domain::models::retreat::clean_optional_text;
use domain::models::{
    ApprovalStatus, NewApprovalToken, PrimaryAdmins, Role, TokenState,
};
use domain::services::EmailMessage;
use persistence::repositories::{ApprovalTokenRepository, ProfileRepository};
use persistence::{SharedStore, StoreError};
use reqwest::Url;
use serde::Serialize;
use shared::crypto::{fingerprint, generate_bearer_token, sha256_hex};
use shared::validation::{is_plausible_email, normalize_email};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ApprovalConfig;
use crate::error::ApiError;
use crate::middleware::metrics::record_approval;
use crate::services::dispatcher::NotificationDispatcher;
use crate::services::templates::render_approval_email;

/// Path of the approval page on the public site.
const APPROVAL_PATH: &str = "aprovar-conta";

/// Action tag for the approver email.
pub const APPROVAL_EMAIL_ACTION: &str = "admin_account_approval";

const APPROVAL_EMAIL_CONTEXT: &str = "Painel administrativo";

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid approval link")]
    InvalidLink,

    #[error("Approval link has expired")]
    Expired,

    #[error("Profile not found for this approval link")]
    ProfileNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Approval is not configured: {0}")]
    Configuration(String),

    #[error("Failed to send approval email")]
    EmailFailed { details: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ApprovalError> for ApiError {
    fn from(err: ApprovalError) -> Self {
        match err {
            ApprovalError::MissingToken
            | ApprovalError::InvalidLink
            | ApprovalError::Expired
            | ApprovalError::Validation(_) => ApiError::validation(err.to_string()),
            ApprovalError::ProfileNotFound => ApiError::NotFound(err.to_string()),
            ApprovalError::Configuration(_) => ApiError::Internal(err.to_string()),
            ApprovalError::EmailFailed { ref details } => {
                ApiError::upstream(err.to_string(), Some(details.clone()))
            }
            ApprovalError::Store(e) => e.into(),
        }
    }
}

/// Result of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    /// A token was stored and the approver emailed.
    Issued,
    /// The identity is a primary admin; nothing was issued.
    PrimaryAdmin,
}

/// Result of visiting an approval link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalOutcome {
    Approved,
    AlreadyApproved,
}

impl ApprovalOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ApprovalOutcome::Approved => "Account approved",
            ApprovalOutcome::AlreadyApproved => "Account already approved",
        }
    }
}

#[derive(Clone)]
pub struct ApprovalTokenService {
    store: SharedStore,
    dispatcher: NotificationDispatcher,
    primary_admins: PrimaryAdmins,
    approver_email: String,
    link_base_url: String,
    ttl_days: i64,
}

impl ApprovalTokenService {
    pub fn new(
        store: SharedStore,
        dispatcher: NotificationDispatcher,
        primary_admins: PrimaryAdmins,
        config: &ApprovalConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            primary_admins,
            approver_email: config.approver_email.trim().to_string(),
            link_base_url: config.link_base_url.trim().trim_end_matches('/').to_string(),
            ttl_days: config.token_ttl_days,
        }
    }

    /// Issues a token for `user_id` and emails the approval link.
    ///
    /// Prior unconsumed tokens of the user are consumed first, so at most one
    /// link is live per user. A failed token write is returned as an error.
    pub async fn request_approval(
        &self,
        user_id: Uuid,
        email: &str,
        full_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<IssueOutcome, ApprovalError> {
        let email = normalize_email(email);
        if !is_plausible_email(&email) {
            return Err(ApprovalError::Validation("Invalid email".to_string()));
        }
        let full_name = clean_optional_text(full_name);

        if self.primary_admins.contains(&email) {
            info!(user_id = %user_id, "Primary admin, approval not required");
            return Ok(IssueOutcome::PrimaryAdmin);
        }

        if self.approver_email.is_empty() {
            return Err(ApprovalError::Configuration(
                "approver email is empty".to_string(),
            ));
        }

        let repo = ApprovalTokenRepository::new(self.store.clone());
        let invalidated = repo.invalidate_active(user_id, now).await?;

        let token = generate_bearer_token();
        let stored = repo
            .insert(&NewApprovalToken {
                user_id,
                email: email.clone(),
                full_name: full_name.clone(),
                token_hash: sha256_hex(&token),
                expires_at: expiry_from(now, self.ttl_days),
            })
            .await?;

        info!(
            user_id = %user_id,
            token_id = %stored.id,
            token_fingerprint = %fingerprint(&token),
            invalidated,
            "Approval token issued"
        );

        let link = self.approval_link(&token)?;
        let content = render_approval_email(full_name.as_deref(), &email, &link, self.ttl_days);
        let message = EmailMessage {
            to: self.approver_email.clone(),
            participant_name: full_name.clone().unwrap_or_else(|| email.clone()),
            subject: content.subject,
            html: content.html,
            action: APPROVAL_EMAIL_ACTION.to_string(),
            retreat_name: APPROVAL_EMAIL_CONTEXT.to_string(),
        };

        self.dispatcher
            .send_admin_email(&message)
            .await
            .map_err(|e| {
                warn!(user_id = %user_id, error = %e, "Approval email failed");
                ApprovalError::EmailFailed {
                    details: e.details(),
                }
            })?;

        Ok(IssueOutcome::Issued)
    }

    /// Consumes an approval link.
    ///
    /// A link that was already used reports success again.
    pub async fn approve(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ApprovalError::MissingToken);
        }

        let repo = ApprovalTokenRepository::new(self.store.clone());
        let stored = repo
            .find_by_hash(&sha256_hex(token))
            .await?
            .ok_or(ApprovalError::InvalidLink)?;

        match stored.state_at(now) {
            TokenState::Consumed => {
                info!(token_id = %stored.id, "Approval link reused");
                record_approval("already_approved");
                return Ok(ApprovalOutcome::AlreadyApproved);
            }
            TokenState::Expired => {
                info!(token_id = %stored.id, "Approval link expired");
                record_approval("expired");
                return Err(ApprovalError::Expired);
            }
            TokenState::Active => {}
        }

        ProfileRepository::new(self.store.clone())
            .set_role_status(stored.user_id, Role::Admin, ApprovalStatus::Approved, Some(now))
            .await?
            .ok_or(ApprovalError::ProfileNotFound)?;

        if !repo.mark_consumed(stored.id, now).await? {
            info!(token_id = %stored.id, "Approval link consumed concurrently");
            record_approval("already_approved");
            return Ok(ApprovalOutcome::AlreadyApproved);
        }

        info!(user_id = %stored.user_id, token_id = %stored.id, "Account approved");
        record_approval("approved");
        Ok(ApprovalOutcome::Approved)
    }

    fn approval_link(&self, token: &str) -> Result<String, ApprovalError> {
        let mut url = Url::parse(&format!("{}/{}", self.link_base_url, APPROVAL_PATH))
            .map_err(|e| ApprovalError::Configuration(format!("approval link base url: {}", e)))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url.to_string())
    }
}
