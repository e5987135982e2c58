use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::issue_token;
use super::ApiError;
use super::ApiSuccess;
use super::SessionData;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::ExternalId;
use crate::domain::user::models::ExternalLoginCommand;
use crate::domain::user::models::Username;
use crate::inbound::http::router::AppState;
use crate::user::errors::UserError;

/// Sign in (or sign up) with an identity already verified by the provider.
pub async fn external_login(
    State(state): State<AppState>,
    Json(body): Json<ExternalLoginRequest>,
) -> Result<ApiSuccess<SessionData>, ApiError> {
    if !body.has_identity_token() {
        return Err(ApiError::UnprocessableEntity(
            "Identity token required".to_string(),
        ));
    }

    let user = state
        .user_service
        .resolve_external_identity(body.try_into_command()?)
        .await?;

    let token = issue_token(&state.tokens, &user)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        SessionData {
            user: (&user).into(),
            token,
        },
    ))
}

/// HTTP request body for external login. `user_id` is the provider's subject.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalLoginRequest {
    user_id: String,
    /// Provider-signed token. Must be present, but its signature is checked
    /// upstream and not here.
    identity_token: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl ExternalLoginRequest {
    fn has_identity_token(&self) -> bool {
        !self.identity_token.trim().is_empty()
    }

    fn try_into_command(self) -> Result<ExternalLoginCommand, UserError> {
        let external_id = ExternalId::new(self.user_id)?;
        // Blank optional fields count as not provided
        let email = self
            .email
            .filter(|e| !e.is_empty())
            .map(EmailAddress::new)
            .transpose()?;
        let username = self
            .username
            .filter(|u| !u.is_empty())
            .map(Username::new)
            .transpose()?;
        Ok(ExternalLoginCommand::new(external_id, email, username))
    }
}
