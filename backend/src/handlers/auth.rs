//! Session routes. All of them are reachable without a session.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use taskdeck_shared::{
    AuthPayload, ForgotPasswordRequest, LoginRequest, MessagePayload, RegisterRequest,
    ResetPasswordRequest,
};

use super::envelope;
use crate::auth::{session, AuthError};
use crate::error::{AppError, AppResult};
use crate::extract::ValidJson;
use crate::state::AppState;

pub const REGISTERED_MESSAGE: &str = "Registration successful! Please check your email.";
pub const LOGGED_OUT_MESSAGE: &str = "Logged out successfully";
pub const RESET_SENT_MESSAGE: &str =
    "If an account exists with this email, you will receive a password reset link.";
pub const PASSWORD_UPDATED_MESSAGE: &str = "Password updated successfully";

fn with_cookies(response: impl IntoResponse, cookies: &[cookie::Cookie<'_>]) -> Response {
    let mut response = response.into_response();
    session::append_cookies(response.headers_mut(), cookies);
    response
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> AppResult<Response> {
    let signed_in = state
        .auth
        .sign_in(&request.email, &request.password)
        .await
        .map_err(|e| AppError::auth(StatusCode::UNAUTHORIZED, e))?;
    tracing::info!(user_id = %signed_in.user.id, "Signed in");

    let payload = AuthPayload {
        user: Some(signed_in.user),
        message: None,
    };
    Ok(with_cookies(
        envelope(payload),
        &session::session_cookies(&signed_in.session, state.config.cookie_secure),
    ))
}

pub async fn register(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RegisterRequest>,
) -> AppResult<Response> {
    let redirect_to = format!("{}/login", state.config.public_origin);
    let signed_up = state
        .auth
        .sign_up(&request.email, &request.password, &redirect_to)
        .await
        .map_err(|e| AppError::auth(StatusCode::BAD_REQUEST, e))?;

    let cookies = signed_up
        .session
        .as_ref()
        .map(|s| session::session_cookies(s, state.config.cookie_secure))
        .unwrap_or_default();
    let payload = AuthPayload {
        user: signed_up.user,
        message: Some(REGISTERED_MESSAGE.to_string()),
    };
    Ok(with_cookies((StatusCode::CREATED, envelope(payload)), &cookies))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = session::access_token(&headers) {
        state
            .auth
            .sign_out(&token)
            .await
            .map_err(|e| AppError::auth(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    }

    let payload = MessagePayload {
        message: LOGGED_OUT_MESSAGE.to_string(),
    };
    Ok(with_cookies(
        envelope(payload),
        &session::cleared_cookies(state.config.cookie_secure),
    ))
}

/// Answers the same way whether or not the address has an account.
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<ForgotPasswordRequest>,
) -> AppResult<Response> {
    let redirect_to = format!("{}/reset-password", state.config.public_origin);
    state
        .auth
        .send_password_reset(&request.email, &redirect_to)
        .await
        .map_err(|e| AppError::auth(StatusCode::BAD_REQUEST, e))?;

    let payload = MessagePayload {
        message: RESET_SENT_MESSAGE.to_string(),
    };
    Ok(envelope(payload).into_response())
}

/// Sets a new password using the recovery token from the e-mailed link, or
/// the current session when no token is supplied.
pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(request): ValidJson<ResetPasswordRequest>,
) -> AppResult<Response> {
    let token = request
        .access_token
        .or_else(|| session::access_token(&headers))
        .ok_or_else(|| {
            AppError::auth(
                StatusCode::BAD_REQUEST,
                AuthError::Rejected("Auth session missing!".to_string()),
            )
        })?;

    let user = state
        .auth
        .update_password(&token, &request.password)
        .await
        .map_err(|e| AppError::auth(StatusCode::BAD_REQUEST, e))?;
    tracing::info!(user_id = %user.id, "Password updated");

    let payload = AuthPayload {
        user: Some(user),
        message: Some(PASSWORD_UPDATED_MESSAGE.to_string()),
    };
    Ok(envelope(payload).into_response())
}
