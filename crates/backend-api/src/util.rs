use axum::http::header::{HeaderMap, AUTHORIZATION, COOKIE};

use crate::ApiError;

pub const REFRESH_COOKIE: &str = "refresh_token";

pub fn require_bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(ApiError::unauthorized("invalid authorization scheme"));
    }

    let token = parts.next().unwrap_or("");
    if token.is_empty() {
        return Err(ApiError::unauthorized("missing bearer token"));
    }

    Ok(token.to_string())
}

/// The refresh token travels in an http-only cookie, never in a body.
pub fn refresh_cookie(headers: &HeaderMap) -> Result<String, ApiError> {
    let cookies = headers
        .get(COOKIE)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing refresh token cookie"))?;

    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == REFRESH_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::unauthorized("missing refresh token cookie"))
}

pub fn set_refresh_cookie(token: &str, max_age_seconds: i64) -> String {
    format!("{REFRESH_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_seconds}")
}

pub fn clear_refresh_cookie() -> String {
    format!("{REFRESH_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn require_bearer_extracts_token_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer TOKEN123"));

        let token = require_bearer(&headers).expect("token should be extracted");
        assert_eq!(token, "TOKEN123");
    }

    #[test]
    fn require_bearer_rejects_missing_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer"));

        let error = require_bearer(&headers).expect_err("should reject missing token");
        assert_eq!(error.status, axum::http::StatusCode::UNAUTHORIZED);
        assert!(error.message.contains("missing bearer token"));
    }

    #[test]
    fn refresh_cookie_is_parsed_from_the_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; refresh_token=abc123; lang=en"),
        );

        assert_eq!(refresh_cookie(&headers).unwrap(), "abc123");
    }

    #[test]
    fn refresh_cookie_missing_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));

        let error = refresh_cookie(&headers).expect_err("should reject missing cookie");
        assert_eq!(error.status, axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn set_and_clear_cookie_shapes() {
        let set = set_refresh_cookie("tok", 60);
        assert!(set.contains("refresh_token=tok"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("Max-Age=60"));

        let clear = clear_refresh_cookie();
        assert!(clear.contains("Max-Age=0"));
    }
}
