//! [`AuthProvider`] over the GoTrue REST API.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use taskdeck_shared::SessionUser;
use uuid::Uuid;

use super::{ServiceError, SupabaseClient};
use crate::auth::{AuthError, AuthProvider, Session, SignIn, SignUp};

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl From<GoTrueUser> for SessionUser {
    fn from(user: GoTrueUser) -> Self {
        SessionUser {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: GoTrueUser,
}

impl GoTrueSession {
    fn split(self) -> (SessionUser, Session) {
        (
            self.user.into(),
            Session {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
                expires_in: self.expires_in,
            },
        )
    }
}

/// Signup answers with a session when confirmation is off, otherwise with
/// the bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(GoTrueSession),
    User(GoTrueUser),
}

fn unavailable(error: reqwest::Error) -> AuthError {
    AuthError::Unavailable(error.to_string())
}

async fn rejection(response: reqwest::Response, fallback: &str) -> AuthError {
    let (status, body) = ServiceError::read(response).await;
    let message = body.message().unwrap_or(fallback).to_string();
    if status.is_server_error() {
        AuthError::Unavailable(message)
    } else {
        AuthError::Rejected(message)
    }
}

#[derive(Debug, Clone)]
pub struct SupabaseAuth {
    client: SupabaseClient,
}

impl SupabaseAuth {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn user_for_token(&self, access_token: &str) -> Result<Option<SessionUser>, AuthError> {
        let response = self
            .client
            .request(Method::GET, "/auth/v1/user", Some(access_token))
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if status.is_success() {
            let user: GoTrueUser = response.json().await.map_err(unavailable)?;
            Ok(Some(user.into()))
        } else if status.is_client_error() {
            Ok(None)
        } else {
            Err(rejection(response, "Could not verify session").await)
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn, AuthError> {
        let response = self
            .client
            .request(Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(rejection(response, "Invalid login credentials").await);
        }
        let (user, session) = response
            .json::<GoTrueSession>()
            .await
            .map_err(unavailable)?
            .split();
        Ok(SignIn { user, session })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> Result<SignUp, AuthError> {
        let response = self
            .client
            .request(Method::POST, "/auth/v1/signup", None)
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(rejection(response, "Registration failed").await);
        }
        match response.json::<SignUpResponse>().await.map_err(unavailable)? {
            SignUpResponse::Session(session) => {
                let (user, session) = session.split();
                Ok(SignUp {
                    user: Some(user),
                    session: Some(session),
                })
            }
            SignUpResponse::User(user) => Ok(SignUp {
                user: Some(user.into()),
                session: None,
            }),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .request(Method::POST, "/auth/v1/logout", Some(access_token))
            .send()
            .await
            .map_err(unavailable)?;

        match response.status() {
            status if status.is_success() => Ok(()),
            // The session is already gone.
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(()),
            _ => Err(rejection(response, "Logout failed").await),
        }
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .request(Method::POST, "/auth/v1/recover", None)
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(rejection(response, "Could not send reset email").await);
        }
        Ok(())
    }

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<SessionUser, AuthError> {
        let response = self
            .client
            .request(Method::PUT, "/auth/v1/user", Some(access_token))
            .json(&json!({ "password": password }))
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            return Err(rejection(response, "Could not update password").await);
        }
        let user: GoTrueUser = response.json().await.map_err(unavailable)?;
        Ok(user.into())
    }
}
