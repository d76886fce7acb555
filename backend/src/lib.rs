//! Task planner server: session-gated JSON API over user-owned tasks and
//! categories, with optional AI suggestions, serving the wasm UI.

pub mod ai;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod features;
pub mod handlers;
pub mod logging;
pub mod router;
pub mod state;
pub mod store;
pub mod supabase;

pub use config::Config;
pub use router::router;
pub use state::AppState;
