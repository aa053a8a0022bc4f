//! Approved admin extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::{resolve_admin, AdminUser, UserAuth};

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(admin) = parts.extensions.get::<AdminUser>() {
            return Ok(admin.clone());
        }

        let auth = UserAuth::from_request_parts(parts, state).await?;
        resolve_admin(state, &auth).await
    }
}
