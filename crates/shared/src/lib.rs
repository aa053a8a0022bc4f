//! Shared utilities and common types for the retreat portal backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Cryptographic utilities (token generation, one-way hashing)
//! - Access token verification for the external auth provider
//! - Email, phone and date-range validation
//! - HTML escaping for outbound message templates

pub mod crypto;
pub mod html;
pub mod jwt;
pub mod validation;
