//! Route handlers. Each one validates input, calls a repository or service
//! scoped to the [`Caller`](crate::auth::Caller), and wraps the result in the
//! response envelope.

pub mod ai;
pub mod auth;
pub mod categories;
pub mod health;
pub mod tasks;

use axum::Json;
use taskdeck_shared::ApiResponse;

pub(crate) fn envelope<T>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::new(data))
}
