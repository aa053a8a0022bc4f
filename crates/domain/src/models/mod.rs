//! Domain models for the retreat portal.

pub mod approval_token;
pub mod notification;
pub mod profile;
pub mod registration;
pub mod retreat;

pub use approval_token::{ApprovalToken, NewApprovalToken, TokenState, APPROVAL_TOKEN_TTL_DAYS};
pub use notification::{
    NotificationAction, NotificationRequest, NotificationResult, WhatsAppReason, WhatsAppResult,
};
pub use profile::{
    ApprovalRequest, ApprovalStatus, ApproveAccountRequest, PrimaryAdmins, Profile, Role,
    SignUpRequest,
};
pub use registration::{
    ConfirmPaymentRequest, CreateRegistrationRequest, NewRegistration, PaymentStatus,
    Registration, SendPaymentLinkRequest,
};
pub use retreat::{CreateRetreatRequest, PublicRetreat, Retreat, UpdateRetreatRequest};
