//! Notification delivery and the registration and account workflows.

pub mod accounts;
pub mod approval;
pub mod dispatcher;
pub mod email;
pub mod registration_lifecycle;
pub mod templates;
pub mod whatsapp;

pub use accounts::AccountService;
pub use approval::ApprovalTokenService;
pub use dispatcher::NotificationDispatcher;
pub use registration_lifecycle::RegistrationLifecycle;
