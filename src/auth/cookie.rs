//! `Set-Cookie` composition for the session cookie.
//!
//! Transport attributes are derived from the request origin: an `https://`
//! origin gets `SameSite=None; Secure` so cross-site frontends keep working,
//! anything else gets `SameSite=Strict` without `Secure`.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub const ACCESS_TOKEN_COOKIE_NAME: &str = "sigil.access-token";

const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CookieError {
    #[error("Request carries no origin metadata to derive cookie attributes from")]
    MissingOrigin,
}

/// Build the session cookie header value.
///
/// `expires_at = None` clears the cookie (epoch `Expires`). `origin = None`
/// means the request had no transport metadata at all, which is refused rather
/// than guessed.
pub fn build_cookie(
    token: &str,
    expires_at: Option<DateTime<Utc>>,
    origin: Option<&str>,
) -> Result<String, CookieError> {
    let origin = origin.ok_or(CookieError::MissingOrigin)?;

    let mut attrs = vec![
        format!("{ACCESS_TOKEN_COOKIE_NAME}={token}"),
        "Path=/".to_string(),
        "HttpOnly".to_string(),
    ];

    match expires_at {
        Some(at) => attrs.push(format!(
            "Expires={}",
            at.format("%a, %d %b %Y %H:%M:%S GMT")
        )),
        None => attrs.push(format!("Expires={EPOCH_EXPIRES}")),
    }

    if is_secure_origin(origin) {
        attrs.push("SameSite=None".to_string());
        attrs.push("Secure".to_string());
    } else {
        attrs.push("SameSite=Strict".to_string());
    }

    Ok(attrs.join("; "))
}

/// Expired, empty session cookie.
pub fn clear_cookie(origin: Option<&str>) -> Result<String, CookieError> {
    build_cookie("", None, origin)
}

fn is_secure_origin(origin: &str) -> bool {
    origin
        .get(..8)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
}

/// Pull the session token out of a `Cookie` request header.
#[must_use]
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE_NAME)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
