//! Session cookies: `sb-access-token` and `sb-refresh-token`.

use axum::http::{
    header::{AUTHORIZATION, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use cookie::{time::Duration, Cookie, SameSite};

use super::Session;

pub const ACCESS_COOKIE: &str = "sb-access-token";
pub const REFRESH_COOKIE: &str = "sb-refresh-token";

const DEFAULT_ACCESS_TTL: i64 = 60 * 60;
const REFRESH_TTL: i64 = 60 * 60 * 24 * 30;

fn session_cookie(name: &'static str, value: String, max_age: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::seconds(max_age))
        .build()
}

/// Cookies persisting a freshly issued session.
pub fn session_cookies(session: &Session, secure: bool) -> Vec<Cookie<'static>> {
    let mut cookies = vec![session_cookie(
        ACCESS_COOKIE,
        session.access_token.clone(),
        session.expires_in.unwrap_or(DEFAULT_ACCESS_TTL),
        secure,
    )];
    if let Some(refresh) = &session.refresh_token {
        cookies.push(session_cookie(REFRESH_COOKIE, refresh.clone(), REFRESH_TTL, secure));
    }
    cookies
}

/// Removal cookies for both session cookies.
pub fn cleared_cookies(secure: bool) -> Vec<Cookie<'static>> {
    [ACCESS_COOKIE, REFRESH_COOKIE]
        .into_iter()
        .map(|name| {
            let mut cookie = session_cookie(name, String::new(), 0, secure);
            cookie.make_removal();
            cookie
        })
        .collect()
}

pub fn append_cookies(headers: &mut HeaderMap, cookies: &[Cookie<'_>]) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(error) => tracing::warn!(name = cookie.name(), %error, "Unencodable cookie"),
        }
    }
}

/// Whether a response already carries a `Set-Cookie` for the access token.
pub fn sets_session(headers: &HeaderMap) -> bool {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value).ok())
        .any(|cookie| cookie.name() == ACCESS_COOKIE)
}

pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// The request's session token: the access cookie, or a bearer token for
/// non-browser clients.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, ACCESS_COOKIE).or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            access_token: "access".into(),
            refresh_token: Some("refresh".into()),
            expires_in: Some(120),
        }
    }

    #[test]
    fn session_cookies_are_http_only_and_lax() {
        let cookies = session_cookies(&session(), false);
        assert_eq!(cookies.len(), 2);

        let access = cookies[0].to_string();
        assert!(access.starts_with("sb-access-token=access"));
        assert!(access.contains("HttpOnly"));
        assert!(access.contains("SameSite=Lax"));
        assert!(access.contains("Path=/"));
        assert!(access.contains("Max-Age=120"));
        assert!(!access.contains("Secure"));
    }

    #[test]
    fn secure_flag_follows_config() {
        let cookies = session_cookies(&session(), true);
        assert!(cookies[0].to_string().contains("Secure"));
    }

    #[test]
    fn cleared_cookies_expire_immediately() {
        let cookies = cleared_cookies(false);
        assert_eq!(cookies.len(), 2);
        for cookie in &cookies {
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        }
    }

    #[test]
    fn detects_session_set_by_a_response() {
        let mut headers = HeaderMap::new();
        append_cookies(&mut headers, &session_cookies(&session(), false));
        assert!(sets_session(&headers));

        let mut other = HeaderMap::new();
        other.insert(SET_COOKIE, HeaderValue::from_static("theme=dark; Path=/"));
        assert!(!sets_session(&other));
    }

    #[test]
    fn reads_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; sb-access-token=abc123; other=1"),
        );
        assert_eq!(access_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn falls_back_to_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(access_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn empty_cookie_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sb-access-token="));
        assert_eq!(access_token(&headers), None);
    }

    #[test]
    fn append_writes_one_header_per_cookie() {
        let mut headers = HeaderMap::new();
        append_cookies(&mut headers, &session_cookies(&session(), false));
        assert_eq!(headers.get_all(SET_COOKIE).iter().count(), 2);
    }
}
