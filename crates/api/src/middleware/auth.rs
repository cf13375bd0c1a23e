//! JWT-based authentication extractor for Axum handlers.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use recap_core::error::CoreError;
use recap_core::quota::{Caller, UserTier};
use recap_core::types::UserId;
use serde::Deserialize;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a JWT.
///
/// The token is read from the `Authorization: Bearer` header, or from an
/// `access_token` query parameter for clients (such as `EventSource`) that
/// cannot set headers.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: UserId,
    pub tier: UserTier,
}

impl AuthUser {
    pub fn caller(&self) -> Caller {
        Caller::new(self.user_id, self.tier)
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

fn unauthorized(message: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.into()))
}

fn bearer_token(parts: &Parts) -> Result<Option<String>, AppError> {
    let Some(header) = parts.headers.get("authorization") else {
        return Ok(None);
    };
    let header = header
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header"))?;
    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        unauthorized("Invalid Authorization format. Expected: Bearer <token>")
    })?;
    Ok(Some(token.to_string()))
}

fn query_token(parts: &Parts) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(query)| query.access_token)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(parts)? {
            Some(token) => token,
            None => query_token(parts).ok_or_else(|| unauthorized("Missing access token"))?,
        };

        let claims = validate_token(&token, &state.config.jwt)
            .map_err(|_| unauthorized("Invalid or expired token"))?;

        Ok(AuthUser {
            user_id: claims.sub,
            tier: claims.tier,
        })
    }
}
