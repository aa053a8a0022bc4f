//! Request extractors for the authenticated caller.
//!
//! Both types live in `middleware::user_auth`; route layers insert them into
//! request extensions and these impls read them back, falling back to
//! verifying the request themselves.

mod admin;
mod user_auth;

pub use crate::middleware::user_auth::{AdminUser, UserAuth};
