//! Account profile domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use shared::validation::canonicalize_identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Participant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Participant => "participant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account profile keyed by the auth provider's user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Whether this profile may use the admin surface.
    pub fn is_approved_admin(&self) -> bool {
        self.role == Role::Admin && self.approval_status == ApprovalStatus::Approved
    }
}

/// Allow-list of identities that bypass account approval.
///
/// Entries are canonicalized on construction so lookups match dotted and
/// plus-aliased Gmail variants of the same mailbox.
#[derive(Debug, Clone, Default)]
pub struct PrimaryAdmins {
    identities: HashSet<String>,
}

impl PrimaryAdmins {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let identities = emails
            .into_iter()
            .map(|e| canonicalize_identity(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { identities }
    }

    pub fn contains(&self, email: &str) -> bool {
        self.identities.contains(&canonicalize_identity(email))
    }
}

/// Body of the approval-request endpoint called on sign-up.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub user_id: Uuid,

    #[validate(custom(function = "shared::validation::validate_email"))]
    pub email: String,

    #[validate(length(max = 200, message = "Full name must be at most 200 characters"))]
    pub full_name: Option<String>,
}

/// Longest bearer value accepted by the approval endpoint.
const MAX_APPROVAL_TOKEN_LEN: usize = 512;

/// Body of the approval endpoint visited from the emailed link.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ApproveAccountRequest {
    #[serde(default)]
    #[validate(
        length(min = 1, message = "Missing token"),
        custom(function = "validate_token_length")
    )]
    pub token: String,
}

fn validate_token_length(token: &str) -> Result<(), ValidationError> {
    if token.len() > MAX_APPROVAL_TOKEN_LEN {
        let mut error = ValidationError::new("token_too_long");
        error.message = Some("Invalid approval link".into());
        return Err(error);
    }
    Ok(())
}

/// Body of the authenticated sign-up endpoint.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[validate(length(max = 200, message = "Full name must be at most 200 characters"))]
    pub full_name: Option<String>,
}
