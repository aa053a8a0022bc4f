//! Entity definitions (store row mappings).

pub mod approval_token;
pub mod profile;
pub mod registration;
pub mod retreat;

pub use approval_token::ApprovalTokenEntity;
pub use profile::ProfileEntity;
pub use registration::RegistrationEntity;
pub use retreat::RetreatEntity;
