//! Domain layer for the retreat portal backend.
//!
//! This crate contains:
//! - Domain models (Retreat, Registration, Profile, ApprovalToken)
//! - The payment-status state machine
//! - Notification contracts and transport traits

pub mod models;
pub mod services;
