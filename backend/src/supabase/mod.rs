//! Client for the managed backend: GoTrue for sessions, PostgREST for rows.

mod auth;
mod rest;

pub use self::auth::SupabaseAuth;
pub use self::rest::SupabaseStore;

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::config::SupabaseConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    /// A request carrying the project key and, when given, the user's token.
    /// Without a token the anon key doubles as the bearer.
    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        access_token: Option<&str>,
    ) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
    }
}

/// Error body of either service. GoTrue answers with `msg` or
/// `error_description`, PostgREST with `code` and `message`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServiceError {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

impl ServiceError {
    pub(crate) async fn read(response: Response) -> (StatusCode, Self) {
        let status = response.status();
        let body = response.json::<ServiceError>().await.unwrap_or_default();
        (status, body)
    }

    /// The Postgres / PostgREST error code, e.g. `23505`.
    pub(crate) fn code(&self) -> Option<&str> {
        self.code.as_ref().and_then(Value::as_str)
    }

    pub(crate) fn message(&self) -> Option<&str> {
        self.msg
            .as_deref()
            .or(self.error_description.as_deref())
            .or(self.message.as_deref())
            .or_else(|| self.error.as_ref().and_then(Value::as_str))
    }
}
