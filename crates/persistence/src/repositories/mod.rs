//! Repository implementations over the table store.

pub mod approval_token;
pub mod profile;
pub mod registration;
pub mod retreat;

pub use approval_token::ApprovalTokenRepository;
pub use profile::{NewProfile, ProfileRepository};
pub use registration::{RegistrationRepository, RegistrationShape};
pub use retreat::{NewRetreat, RetreatChanges, RetreatRepository};
