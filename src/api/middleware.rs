use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::api::state::AppState;
use crate::db::SessionRepository;
use crate::error::AppError;

pub const AUTH_COOKIE: &str = "auth-token";

/// Session gate - resolves the caller before any chat or exchange handler runs.
///
/// Inserts the caller's `SessionUser` into request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(request.headers())?
        .ok_or(AppError::Unauthenticated)?
        .to_string();

    let user = SessionRepository::resolve_user(&state.db, &token)
        .await?
        .ok_or(AppError::InvalidToken)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Token from `Authorization: Bearer <token>`, else from the auth cookie.
///
/// An Authorization header that is present but not a bearer token is rejected
/// rather than ignored.
pub fn session_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::InvalidToken)?;
        return Ok(Some(token));
    }

    Ok(cookie_value(headers, AUTH_COOKIE))
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        AUTH_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn bearer_header_wins() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer abc"),
            (header::COOKIE, "auth-token=cookie"),
        ]);
        assert_eq!(session_token(&map).unwrap(), Some("abc"));
    }

    #[test]
    fn falls_back_to_cookie() {
        let map = headers(&[(header::COOKIE, "theme=dark; auth-token=xyz; other=1")]);
        assert_eq!(session_token(&map).unwrap(), Some("xyz"));
    }

    #[test]
    fn missing_token_is_none() {
        assert_eq!(session_token(&HeaderMap::new()).unwrap(), None);
        let map = headers(&[(header::COOKIE, "auth-token=")]);
        assert_eq!(session_token(&map).unwrap(), None);
    }

    #[test]
    fn malformed_authorization_is_invalid() {
        let map = headers(&[(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")]);
        assert!(matches!(session_token(&map), Err(AppError::InvalidToken)));
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie("tok", 3600, true);
        assert!(cookie.starts_with("auth-token=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.ends_with("; Secure"));
        assert!(expired_cookie(false).contains("Max-Age=0"));
    }
}
