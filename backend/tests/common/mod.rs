#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use taskdeck_backend::ai::{AiError, ChatBackend, ChatMessage, ChatOptions};
use taskdeck_backend::auth::{AuthError, AuthProvider, Session, SignIn, SignUp};
use taskdeck_backend::store::MemoryStore;
use taskdeck_backend::{router, AppState, Config};
use taskdeck_shared::SessionUser;
use tower::ServiceExt;
use uuid::Uuid;

pub const ALICE_TOKEN: &str = "alice-token";
pub const BOB_TOKEN: &str = "bob-token";
pub const PASSWORD: &str = "secret123";

/// Accepts two fixed accounts and the tokens issued to them.
pub struct FakeAuth {
    users: HashMap<String, (String, SessionUser)>,
    signed_out: Mutex<Vec<String>>,
}

impl FakeAuth {
    pub fn new() -> Self {
        let mut users = HashMap::new();
        for (token, email) in [(ALICE_TOKEN, "alice@example.com"), (BOB_TOKEN, "bob@example.com")] {
            let user = SessionUser {
                id: Uuid::new_v4(),
                email: Some(email.to_string()),
            };
            users.insert(token.to_string(), (email.to_string(), user));
        }
        Self {
            users,
            signed_out: Mutex::new(Vec::new()),
        }
    }

    pub fn user(&self, token: &str) -> SessionUser {
        self.users[token].1.clone()
    }

    pub fn signed_out(&self) -> Vec<String> {
        self.signed_out.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn user_for_token(&self, access_token: &str) -> Result<Option<SessionUser>, AuthError> {
        Ok(self.users.get(access_token).map(|(_, user)| user.clone()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn, AuthError> {
        self.users
            .iter()
            .find(|(_, (known, _))| known == email && password == PASSWORD)
            .map(|(token, (_, user))| SignIn {
                user: user.clone(),
                session: Session {
                    access_token: token.clone(),
                    refresh_token: Some(format!("{token}-refresh")),
                    expires_in: Some(3600),
                },
            })
            .ok_or_else(|| AuthError::Rejected("Invalid login credentials".into()))
    }

    async fn sign_up(&self, email: &str, _password: &str, _redirect_to: &str) -> Result<SignUp, AuthError> {
        if self.users.values().any(|(known, _)| known == email) {
            return Err(AuthError::Rejected("User already registered".into()));
        }
        Ok(SignUp {
            user: Some(SessionUser {
                id: Uuid::new_v4(),
                email: Some(email.to_string()),
            }),
            session: None,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.signed_out.lock().unwrap().push(access_token.to_string());
        Ok(())
    }

    async fn send_password_reset(&self, _email: &str, _redirect_to: &str) -> Result<(), AuthError> {
        Ok(())
    }

    async fn update_password(&self, access_token: &str, _password: &str) -> Result<SessionUser, AuthError> {
        self.users
            .get(access_token)
            .map(|(_, user)| user.clone())
            .ok_or_else(|| AuthError::Rejected("Invalid token".into()))
    }
}

/// Replies with a fixed text, or a fixed upstream error, and counts calls.
pub struct ScriptedChat {
    reply: Result<String, String>,
    calls: Mutex<usize>,
}

impl ScriptedChat {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: Mutex::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ChatBackend for ScriptedChat {
    async fn chat(&self, _messages: Vec<ChatMessage>, _options: ChatOptions) -> Result<String, AiError> {
        *self.calls.lock().unwrap() += 1;
        self.reply.clone().map_err(AiError::Upstream)
    }
}

pub struct TestApp {
    pub router: Router,
    pub auth: Arc<FakeAuth>,
}

fn config(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("SUPABASE_URL", "http://supabase.invalid"),
        ("SUPABASE_KEY", "anon"),
        ("STORE_BACKEND", "memory"),
        ("APP_ENV", "test"),
        ("PUBLIC_ORIGIN", "http://localhost:3000"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }
    Config::from_vars(vars).unwrap()
}

pub fn app_with(extra: &[(&str, &str)], chat: Option<Arc<ScriptedChat>>) -> TestApp {
    let store = MemoryStore::new();
    let auth = Arc::new(FakeAuth::new());
    let chat = chat.map(|c| c as Arc<dyn ChatBackend>);
    let state = AppState::new(
        config(extra),
        Arc::new(store.clone()),
        Arc::new(store),
        auth.clone(),
        chat,
    );
    TestApp {
        router: router(state),
        auth,
    }
}

pub fn app() -> TestApp {
    app_with(&[], None)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }

    pub fn error_message(&self) -> &str {
        self.body["error"]["message"].as_str().unwrap_or_default()
    }

    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap())
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.call("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.call("POST", uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.call("PUT", uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.call("DELETE", uri, Some(token), None).await
    }
}
