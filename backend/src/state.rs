use std::sync::Arc;

use crate::ai::{Assistant, ChatBackend, OpenRouterClient};
use crate::auth::AuthProvider;
use crate::config::{Config, StoreBackend};
use crate::store::{CategoryRepository, MemoryStore, RedisStore, StoreError, TaskRepository};
use crate::supabase::{SupabaseAuth, SupabaseClient, SupabaseStore};

/// Shared handles every handler can reach. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tasks: Arc<dyn TaskRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub auth: Arc<dyn AuthProvider>,
    /// `None` when no AI key is configured or the feature is off.
    pub assistant: Option<Arc<Assistant>>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl AppState {
    /// Wires the configured backends together.
    pub async fn from_config(config: Config) -> Result<Self, StartupError> {
        let supabase = SupabaseClient::new(&config.supabase)?;
        let auth: Arc<dyn AuthProvider> = Arc::new(SupabaseAuth::new(supabase.clone()));

        let (tasks, categories): (Arc<dyn TaskRepository>, Arc<dyn CategoryRepository>) =
            match config.store {
                StoreBackend::Supabase => {
                    let store = SupabaseStore::new(supabase);
                    (Arc::new(store.clone()), Arc::new(store))
                }
                StoreBackend::Redis => {
                    let store = RedisStore::connect(&config.redis_url).await?;
                    (Arc::new(store.clone()), Arc::new(store))
                }
                StoreBackend::Memory => {
                    let store = MemoryStore::new();
                    (Arc::new(store.clone()), Arc::new(store))
                }
            };

        let backend: Option<Arc<dyn ChatBackend>> = match (&config.ai, config.ai_enabled()) {
            (Some(ai), true) => {
                let client = OpenRouterClient::new(ai.clone())?;
                Some(Arc::new(client) as Arc<dyn ChatBackend>)
            }
            _ => None,
        };

        Ok(Self::new(config, tasks, categories, auth, backend))
    }

    pub fn new(
        config: Config,
        tasks: Arc<dyn TaskRepository>,
        categories: Arc<dyn CategoryRepository>,
        auth: Arc<dyn AuthProvider>,
        chat: Option<Arc<dyn ChatBackend>>,
    ) -> Self {
        let assistant = chat
            .filter(|_| config.features.ai_suggestions)
            .map(|backend| Arc::new(Assistant::new(backend)));
        Self {
            config: Arc::new(config),
            tasks,
            categories,
            auth,
            assistant,
        }
    }
}
