use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{AppState, error::ApiError};

// Axum extractor for callers holding a live session
#[derive(Debug, Clone)]
pub struct SessionUser(pub String);

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Extract the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        // The bearer token is the session's username
        let username = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                ApiError::Unauthorized("Invalid Authorization header format".to_string())
            })?;

        if !state.exchange.sessions().is_user_logged_in(username) {
            return Err(ApiError::Unauthorized("User not logged in".to_string()));
        }

        Ok(SessionUser(username.to_string()))
    }
}
