//! Registration domain model and the payment-status state machine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Payment lifecycle of a registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    LinkSent,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::LinkSent => "link_sent",
            PaymentStatus::Paid => "paid",
        }
    }

    /// Allowed transitions.
    ///
    /// `link_sent -> link_sent` re-issues payment instructions. `paid` is terminal.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::LinkSent)
                | (PaymentStatus::LinkSent, PaymentStatus::LinkSent)
                | (PaymentStatus::LinkSent, PaymentStatus::Paid)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown payment status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown payment status: {0}")]
pub struct UnknownPaymentStatus(pub String);

impl FromStr for PaymentStatus {
    type Err = UnknownPaymentStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "link_sent" => Ok(PaymentStatus::LinkSent),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(UnknownPaymentStatus(other.to_string())),
        }
    }
}

/// One participant's sign-up for a retreat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: Uuid,
    pub retreat_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub parish: Option<String>,
    pub has_health_issue: bool,
    pub health_issue_details: Option<String>,
    pub shirt_size: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_link: Option<String>,
    pub whatsapp_group_link: Option<String>,
    pub registered_at: DateTime<Utc>,
    /// Set only when `payment_status` is `paid`.
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub terms_accepted: bool,
    pub terms_accepted_at: Option<DateTime<Utc>>,
}

impl Registration {
    /// `payment_confirmed_at` is present exactly when the status is `paid`.
    pub fn confirmation_consistent(&self) -> bool {
        (self.payment_status == PaymentStatus::Paid) == self.payment_confirmed_at.is_some()
    }
}

/// Public registration form submission.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegistrationRequest {
    #[validate(length(min = 2, max = 120, message = "Full name must be between 2 and 120 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub full_name: String,

    #[validate(length(min = 8, max = 30, message = "Phone must be between 8 and 30 characters"))]
    pub phone: String,

    #[validate(custom(function = "shared::validation::validate_email"))]
    pub email: String,

    pub date_of_birth: Option<NaiveDate>,

    #[validate(length(max = 120, message = "Parish must be at most 120 characters"))]
    pub parish: Option<String>,

    #[serde(default)]
    pub has_health_issue: bool,

    #[validate(length(max = 2000, message = "Health details must be at most 2000 characters"))]
    pub health_issue_details: Option<String>,

    pub shirt_size: Option<String>,

    pub emergency_contact_name: Option<String>,

    pub emergency_contact_phone: Option<String>,

    #[serde(default)]
    #[validate(custom(function = "validate_terms_accepted"))]
    pub terms_accepted: bool,
}

fn validate_terms_accepted(accepted: &bool) -> Result<(), validator::ValidationError> {
    if *accepted {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("terms_not_accepted");
        err.message = Some("Terms must be accepted".into());
        Err(err)
    }
}

/// Normalized registration ready to be written to the store.
///
/// The status always starts as `pending`; callers cannot choose it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRegistration {
    pub retreat_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub parish: Option<String>,
    pub has_health_issue: bool,
    pub health_issue_details: Option<String>,
    pub shirt_size: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub terms_accepted_at: DateTime<Utc>,
}

impl NewRegistration {
    /// Builds a store-ready registration from a validated form.
    pub fn from_request(retreat_id: Uuid, req: &CreateRegistrationRequest, now: DateTime<Utc>) -> Self {
        use super::retreat::clean_optional_text;

        Self {
            retreat_id,
            full_name: req.full_name.trim().to_string(),
            phone: req.phone.trim().to_string(),
            email: shared::validation::normalize_email(&req.email),
            date_of_birth: req.date_of_birth,
            parish: clean_optional_text(req.parish.as_deref()),
            has_health_issue: req.has_health_issue,
            health_issue_details: if req.has_health_issue {
                clean_optional_text(req.health_issue_details.as_deref())
            } else {
                None
            },
            shirt_size: clean_optional_text(req.shirt_size.as_deref()),
            emergency_contact_name: clean_optional_text(req.emergency_contact_name.as_deref()),
            emergency_contact_phone: clean_optional_text(req.emergency_contact_phone.as_deref()),
            terms_accepted_at: now,
        }
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::Pending
    }
}

/// Admin request to send payment instructions.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendPaymentLinkRequest {
    /// Falls back to the retreat's default instructions when omitted.
    #[validate(length(max = 4000, message = "Payment instructions must be at most 4000 characters"))]
    pub payment_instructions: Option<String>,
}

/// Admin request to confirm a payment.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    /// Falls back to the link stored on the retreat when omitted.
    #[validate(length(max = 500, message = "WhatsApp group link must be at most 500 characters"))]
    pub whatsapp_group_link: Option<String>,
}
