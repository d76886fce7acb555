//! Process configuration, read once from the environment at startup.
//!
//! # Environment Variables
//!
//! - `HOST` / `PORT`: bind address (default `0.0.0.0:3000`)
//! - `APP_ENV`: `development` (default) | `production` | `test`
//! - `STORE_BACKEND`: `supabase` (default) | `redis` | `memory`
//! - `SUPABASE_URL` / `SUPABASE_KEY`: managed auth (and row storage when
//!   `STORE_BACKEND=supabase`)
//! - `REDIS_URL`: row storage when `STORE_BACKEND=redis`
//! - `OPENROUTER_API_KEY`: enables the AI routes
//! - `OPENROUTER_MODEL` / `OPENROUTER_URL`: chat-completion model and endpoint
//! - `STATIC_DIR`: directory holding the built UI (default `frontend/dist`)
//! - `PUBLIC_ORIGIN`: origin used in password-reset links
//! - `COOKIE_SECURE`: mark session cookies `Secure`
//! - `FF_*`: feature flag overrides, see [`crate::features`]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use taskdeck_shared::FeatureFlags;
use thiserror::Error;

use crate::features;

pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_OPENROUTER_MODEL: &str = "google/gemini-2.0-flash-exp:free";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Supabase,
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "supabase" => Ok(StoreBackend::Supabase),
            "redis" => Ok(StoreBackend::Redis),
            "memory" | "in_memory" => Ok(StoreBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub store: StoreBackend,
    pub supabase: SupabaseConfig,
    pub redis_url: String,
    pub ai: Option<AiConfig>,
    pub static_dir: PathBuf,
    pub public_origin: String,
    pub cookie_secure: bool,
    pub features: FeatureFlags,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Builds the configuration from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            None => 3000,
        };
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: "HOST",
                value: host,
            })?;

        let environment = match get("APP_ENV") {
            Some(raw) => raw.parse().map_err(|()| ConfigError::Invalid {
                name: "APP_ENV",
                value: raw,
            })?,
            None => Environment::Development,
        };

        let store = match get("STORE_BACKEND") {
            Some(raw) => raw.parse().map_err(|()| ConfigError::Invalid {
                name: "STORE_BACKEND",
                value: raw,
            })?,
            None => StoreBackend::Supabase,
        };

        // Sessions always come from the managed service, whatever stores rows.
        let supabase = SupabaseConfig {
            url: get("SUPABASE_URL")
                .ok_or(ConfigError::Missing("SUPABASE_URL"))?
                .trim_end_matches('/')
                .to_string(),
            anon_key: get("SUPABASE_KEY").ok_or(ConfigError::Missing("SUPABASE_KEY"))?,
        };

        let ai = get("OPENROUTER_API_KEY").map(|api_key| AiConfig {
            api_key,
            model: get("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
            endpoint: get("OPENROUTER_URL").unwrap_or_else(|| DEFAULT_OPENROUTER_URL.to_string()),
        });

        let cookie_secure = match get("COOKIE_SECURE") {
            Some(raw) => parse_bool("COOKIE_SECURE", &raw)?,
            None => environment == Environment::Production,
        };

        let features = features::resolve(environment, |name| get(name))?;

        Ok(Self {
            bind_addr,
            environment,
            store,
            supabase,
            redis_url: get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            ai,
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("frontend/dist")),
            public_origin: get("PUBLIC_ORIGIN")
                .map(|origin| origin.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            cookie_secure,
            features,
        })
    }

    /// AI routes are usable only with a key and the feature enabled.
    pub fn ai_enabled(&self) -> bool {
        self.ai.is_some() && self.features.ai_suggestions
    }
}

pub(crate) fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
        }),
    }
}
