use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use thiserror::Error;

use crate::domain::user::models::UserId;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Caller identity established from a validated bearer token.
///
/// Lives in the request extensions of a single request only.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    claims: auth::ValidatedClaims,
}

impl AuthenticatedUser {
    pub fn claims(&self) -> &auth::ValidatedClaims {
        &self.claims
    }

    pub fn email(&self) -> &str {
        self.claims.email()
    }

    pub fn username(&self) -> &str {
        self.claims.username()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("Authorization token required")]
    MissingToken,

    /// Deliberately says nothing about why validation failed.
    #[error("Invalid or expired token")]
    Unauthorized,
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        ApiError::Unauthorized(self.to_string()).into_response()
    }
}

/// Middleware that validates the bearer token and adds the caller to request extensions
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, GuardError> {
    let token = bearer_token(req.headers()).map_err(|e| {
        tracing::warn!(uri = %req.uri(), "Request without bearer token");
        e
    })?;

    let claims = state.tokens.validate(token).map_err(|e| {
        tracing::warn!(error = %e, "Token validation failed");
        GuardError::Unauthorized
    })?;

    let user_id = UserId::from_string(claims.user_id()).map_err(|e| {
        tracing::warn!(error = %e, "Token carries a malformed user ID");
        GuardError::Unauthorized
    })?;

    req.extensions_mut()
        .insert(AuthenticatedUser { user_id, claims });

    Ok(next.run(req).await)
}

/// Extract the credential from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, GuardError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .filter(|token| !token.is_empty())
        .ok_or(GuardError::MissingToken)
}
