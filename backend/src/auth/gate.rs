//! Request gate: resolves the caller once per request and applies the
//! route policy before any handler runs.
//!
//! | Route class     | Anonymous          | Authenticated                   |
//! |-----------------|--------------------|---------------------------------|
//! | public page     | allow              | allow (`/login`, `/register` → `/`) |
//! | public API      | allow              | allow                           |
//! | asset           | allow              | allow                           |
//! | protected API   | 401 `UNAUTHORIZED` | allow                           |
//! | protected page  | redirect `/login`  | allow                           |

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::{session, Caller};
use crate::error::AppError;
use crate::state::AppState;

const PUBLIC_PAGES: [&str; 4] = ["/login", "/register", "/forgot-password", "/reset-password"];
const PUBLIC_API: [&str; 2] = ["/api/auth", "/health"];
const ASSET_EXTENSIONS: [&str; 12] = [
    "js", "wasm", "css", "map", "ico", "png", "svg", "jpg", "jpeg", "webp", "woff", "woff2",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    PublicPage,
    PublicApi,
    Asset,
    ProtectedApi,
    ProtectedPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Unauthorized,
    Redirect(&'static str),
}

/// A route matches itself and everything below it.
fn matches_route(path: &str, route: &str) -> bool {
    path == route
        || path
            .strip_prefix(route)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn classify(path: &str) -> RouteClass {
    if PUBLIC_API.iter().any(|route| matches_route(path, route)) {
        RouteClass::PublicApi
    } else if matches_route(path, "/api") {
        RouteClass::ProtectedApi
    } else if PUBLIC_PAGES.iter().any(|route| matches_route(path, route)) {
        RouteClass::PublicPage
    } else if matches_route(path, "/pkg") || has_asset_extension(path) {
        RouteClass::Asset
    } else {
        RouteClass::ProtectedPage
    }
}

fn has_asset_extension(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .is_some_and(|(_, extension)| {
            ASSET_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
}

pub fn decide(path: &str, authenticated: bool) -> Decision {
    match (classify(path), authenticated) {
        (RouteClass::ProtectedApi, false) => Decision::Unauthorized,
        (RouteClass::ProtectedPage, false) => Decision::Redirect("/login"),
        (RouteClass::PublicPage, true) if path == "/login" || path == "/register" => {
            Decision::Redirect("/")
        }
        _ => Decision::Allow,
    }
}

/// Resolves the session token, if any. The flag is set when a token was
/// presented but the provider no longer accepts it.
async fn resolve(state: &AppState, headers: &HeaderMap) -> (Option<Caller>, bool) {
    let Some(token) = session::access_token(headers) else {
        return (None, false);
    };
    match state.auth.user_for_token(&token).await {
        Ok(Some(user)) => (Some(Caller::new(user, token)), false),
        Ok(None) => (None, true),
        Err(error) => {
            tracing::warn!(%error, "Could not resolve session");
            (None, false)
        }
    }
}

pub async fn gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if classify(&path) == RouteClass::Asset {
        return next.run(request).await;
    }

    let (caller, stale) = resolve(&state, request.headers()).await;
    let mut response = match decide(&path, caller.is_some()) {
        Decision::Allow => {
            if let Some(caller) = caller {
                tracing::Span::current().record("user_id", tracing::field::display(caller.id));
                request.extensions_mut().insert(caller);
            }
            next.run(request).await
        }
        Decision::Unauthorized => AppError::Unauthorized.into_response(),
        Decision::Redirect(to) => Redirect::to(to).into_response(),
    };

    // A handler that issued or cleared the session owns the cookies.
    if stale && !session::sets_session(response.headers()) {
        session::append_cookies(
            response.headers_mut(),
            &session::cleared_cookies(state.config.cookie_secure),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/login", RouteClass::PublicPage)]
    #[case("/reset-password", RouteClass::PublicPage)]
    #[case("/register/confirm", RouteClass::PublicPage)]
    #[case("/api/auth/login", RouteClass::PublicApi)]
    #[case("/api/auth/logout", RouteClass::PublicApi)]
    #[case("/health", RouteClass::PublicApi)]
    #[case("/api/tasks", RouteClass::ProtectedApi)]
    #[case("/api/categories/123", RouteClass::ProtectedApi)]
    #[case("/api/authx", RouteClass::ProtectedApi)]
    #[case("/pkg/taskdeck_frontend_bg.wasm", RouteClass::Asset)]
    #[case("/favicon.ico", RouteClass::Asset)]
    #[case("/", RouteClass::ProtectedPage)]
    #[case("/loginx", RouteClass::ProtectedPage)]
    #[case("/tasks", RouteClass::ProtectedPage)]
    #[case("/tasks.old", RouteClass::ProtectedPage)]
    #[case("/x.y", RouteClass::ProtectedPage)]
    #[case("/index.html", RouteClass::ProtectedPage)]
    #[case("/styles/app.CSS", RouteClass::Asset)]
    fn classifies_routes(#[case] path: &str, #[case] class: RouteClass) {
        assert_eq!(classify(path), class);
    }

    #[rstest]
    #[case("/api/tasks", false, Decision::Unauthorized)]
    #[case("/api/tasks", true, Decision::Allow)]
    #[case("/", false, Decision::Redirect("/login"))]
    #[case("/", true, Decision::Allow)]
    #[case("/login", false, Decision::Allow)]
    #[case("/login", true, Decision::Redirect("/"))]
    #[case("/register", true, Decision::Redirect("/"))]
    #[case("/forgot-password", true, Decision::Allow)]
    #[case("/reset-password", true, Decision::Allow)]
    #[case("/api/auth/logout", false, Decision::Allow)]
    #[case("/pkg/app.js", false, Decision::Allow)]
    #[case("/tasks.old", false, Decision::Redirect("/login"))]
    fn applies_policy(#[case] path: &str, #[case] authenticated: bool, #[case] decision: Decision) {
        assert_eq!(decide(path, authenticated), decision);
    }
}
