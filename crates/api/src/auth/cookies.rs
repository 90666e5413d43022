//! `session` cookie construction and extraction

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use mercado_shared::SessionToken;
use time::OffsetDateTime;

pub const SESSION_COOKIE: &str = "session";

/// Attributes applied to every `session` cookie we set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieSettings {
    pub secure: bool,
    pub http_only: bool,
    /// Client-side lifetime; also the expiry reported in a session grant
    pub max_age: time::Duration,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            secure: false,
            http_only: true,
            max_age: time::Duration::hours(24),
        }
    }
}

impl CookieSettings {
    pub fn session_cookie(&self, token: &SessionToken, expires_at: OffsetDateTime) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token.as_str().to_owned()))
            .path("/")
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .expires(expires_at)
            .build()
    }

    /// An already-expired `session` cookie that makes the browser drop it
    pub fn expired_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH)
            .build()
    }
}

/// Token from the request's `session` cookie, if present and non-empty
pub fn session_token(jar: &CookieJar) -> Option<SessionToken> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
        .map(SessionToken::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

    #[test]
    fn test_session_cookie_attributes() {
        let settings = CookieSettings::default();
        let token = SessionToken::from("tok123");
        let expires = OffsetDateTime::now_utc() + time::Duration::hours(24);

        let rendered = settings.session_cookie(&token, expires).to_string();
        assert!(rendered.starts_with("session=tok123"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Expires="));
        assert!(!rendered.contains("Secure"));
    }

    #[test]
    fn test_secure_flag_follows_settings() {
        let settings = CookieSettings {
            secure: true,
            http_only: false,
            ..CookieSettings::default()
        };
        let rendered = settings
            .session_cookie(&SessionToken::from("t"), OffsetDateTime::now_utc())
            .to_string();
        assert!(rendered.contains("Secure"));
        assert!(!rendered.contains("HttpOnly"));
    }

    #[test]
    fn test_expired_cookie_clears_value() {
        let rendered = CookieSettings::default().expired_cookie().to_string();
        assert!(rendered.starts_with("session=;"));
        assert!(rendered.contains("Max-Age=0"));
        assert!(rendered.contains("1970"));
    }

    #[test]
    fn test_session_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123; other=1"),
        );
        let jar = CookieJar::from_headers(&headers);
        assert_eq!(session_token(&jar), Some(SessionToken::from("abc123")));

        let mut empty = HeaderMap::new();
        empty.insert(COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_token(&CookieJar::from_headers(&empty)), None);
        assert_eq!(session_token(&CookieJar::new()), None);
    }
}
