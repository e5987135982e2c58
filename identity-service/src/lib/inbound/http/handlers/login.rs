use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::issue_token;
use super::ApiError;
use super::ApiSuccess;
use super::SessionData;
use crate::inbound::http::router::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<ApiSuccess<SessionData>, ApiError> {
    // Unknown email and wrong password collapse into the same 401
    let user = state
        .user_service
        .verify_local_credentials(&body.email, &body.password)
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

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}
