//! Caller identity and the managed auth provider seam.
//!
//! Identity is resolved once per request by [`gate::gate`] and handed to
//! handlers as an explicit [`Caller`] argument. Handlers never look at
//! request headers themselves; in particular the legacy `x-user-id` header
//! carries no meaning anywhere.

pub mod gate;
pub mod session;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use taskdeck_shared::SessionUser;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;

/// The authenticated user a request acts for. Every repository call is
/// filtered by `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub email: Option<String>,
    /// The session token, forwarded to the managed service so its row-level
    /// policies apply as well.
    pub access_token: String,
}

impl Caller {
    pub fn new(user: SessionUser, access_token: impl Into<String>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            access_token: access_token.into(),
        }
    }

    pub fn user(&self) -> SessionUser {
        SessionUser {
            id: self.id,
            email: self.email.clone(),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignIn {
    pub user: SessionUser,
    pub session: Session,
}

/// Registration outcome. Projects with e-mail confirmation return a user
/// without a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub user: Option<SessionUser>,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The provider refused the request; the message is shown to the user.
    #[error("{0}")]
    Rejected(String),

    #[error("Auth service unavailable: {0}")]
    Unavailable(String),
}

/// User and session management, always delegated to the managed service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolves a session token. `Ok(None)` means the token is expired or
    /// unknown.
    async fn user_for_token(&self, access_token: &str) -> Result<Option<SessionUser>, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> Result<SignUp, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<SessionUser, AuthError>;
}
