//! `Set-Cookie` values for the session token, and reading it back.

use anyhow::Context;
use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime, UtcOffset};

pub const SESSION_COOKIE_NAME: &str = "token";

const COOKIE_DATE: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Cookie carrying a session token until `expires_at`.
pub fn session_cookie(token: &str, expires_at: OffsetDateTime) -> anyhow::Result<HeaderValue> {
    build(token, expires_at)
}

/// Overwrites the session cookie with an empty value that has already expired.
pub fn cleared_session_cookie() -> anyhow::Result<HeaderValue> {
    build("", OffsetDateTime::UNIX_EPOCH)
}

fn build(value: &str, expires_at: OffsetDateTime) -> anyhow::Result<HeaderValue> {
    let expires = expires_at
        .to_offset(UtcOffset::UTC)
        .format(COOKIE_DATE)
        .context("format cookie expiry")?;
    let cookie = format!(
        "{SESSION_COOKIE_NAME}={value}; Path=/; Expires={expires}; HttpOnly; Secure; SameSite=None"
    );
    HeaderValue::from_str(&cookie).context("session cookie header")
}

/// Session token from the request's `Cookie` headers, if any.
pub fn read_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == SESSION_COOKIE_NAME)
        .map(|(_, val)| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
