use axum::{
    extract::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::auth::gate::gate;
use crate::config::Environment;
use crate::error::AppError;
use crate::handlers::{ai, auth, categories, health, tasks};
use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/:id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/ai/suggest", post(ai::suggest))
        .route("/ai/summarize-week", get(ai::summarize_week))
        .route("/features", get(health::features))
        .fallback(|| async { AppError::NotFound("Route") })
}

/// The full application: API, gate, and the single-page UI for every other
/// path.
pub fn router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    let spa = ServeDir::new(&static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let router = Router::new()
        .nest("/api", api_routes())
        .route("/health", get(health::health))
        .fallback_service(spa)
        .layer(middleware::from_fn_with_state(state.clone(), gate))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    user_id = tracing::field::Empty,
                )
            }),
        );

    let router = if state.config.environment == Environment::Development {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(state)
}
