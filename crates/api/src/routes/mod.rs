//! HTTP route handlers.

pub mod accounts;
pub mod health;
pub mod public;
pub mod registrations;
pub mod retreats;
