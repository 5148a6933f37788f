use std::str::FromStr;

use axum::http::{header, HeaderMap, HeaderValue};

use crate::error::{AppError, AppResult};

pub const SESSION_COOKIE: &str = "session_token";

/// Return the value of cookie `name`, looking across every `Cookie` header.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(header::COOKIE) {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            let p = part.trim();
            if let Some(eq) = p.find('=') {
                let (k, v) = p.split_at(eq);
                if k == name { return Some(v[1..].to_string()); }
            }
        }
    }
    None
}

/// When the `Secure` attribute goes on the session cookie.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CookieSecurity {
    /// Secure when the request reached us over https (as reported by a fronting proxy).
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for CookieSecurity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" | "true" | "on" => Ok(Self::Always),
            "never" | "false" | "off" => Ok(Self::Never),
            other => Err(AppError::user("invalid_cookie_secure", format!("expected auto|always|never, got '{other}'"))),
        }
    }
}

impl CookieSecurity {
    pub fn is_secure(self, headers: &HeaderMap) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => forwarded_https(headers),
        }
    }
}

fn forwarded_https(headers: &HeaderMap) -> bool {
    let xfp = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().eq_ignore_ascii_case("https"))
        .unwrap_or(false);
    if xfp { return true; }
    // RFC 7239: Forwarded: for=1.2.3.4;proto=https
    headers
        .get(header::FORWARDED)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split([';', ','])
                .filter_map(|kv| kv.trim().split_once('='))
                .any(|(k, val)| k.eq_ignore_ascii_case("proto") && val.trim_matches('"').eq_ignore_ascii_case("https"))
        })
        .unwrap_or(false)
}

pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> AppResult<HeaderValue> {
    let mut s = format!("{SESSION_COOKIE}={token}; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax; Path=/");
    if secure { s.push_str("; Secure"); }
    HeaderValue::from_str(&s).map_err(|e| AppError::internal("bad_cookie", e.to_string()))
}

pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("session_token=; Max-Age=0; HttpOnly; SameSite=Lax; Path=/; Secure")
    } else {
        HeaderValue::from_static("session_token=; Max-Age=0; HttpOnly; SameSite=Lax; Path=/")
    }
}
