//! Session gate for Axum
//!
//! Resolves the `session` cookie before any protected handler runs. API
//! paths (`/api/...`) are answered with a JSON 401; browser paths are
//! redirected to the login page.

use axum::{
    extract::{Request, State},
    http::{header::LOCATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use mercado_shared::{SessionToken, UserId};
use serde_json::json;

use super::cookies::{session_token, CookieSettings};
use super::sessions::SessionManager;

pub const LOGIN_PATH: &str = "/auth/login";

/// Authenticated caller, inserted into request extensions by [`require_auth`]
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub token: SessionToken,
}

/// State needed by the gate
#[derive(Clone)]
pub struct AuthState {
    pub sessions: SessionManager,
    pub cookie: CookieSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid or expired session")]
    InvalidSession,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidSession => (StatusCode::UNAUTHORIZED, "Invalid or expired session"),
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// True for paths served to htmx/API clients rather than full page loads
pub fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

/// Middleware that requires a valid session
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let Some(token) = session_token(&jar) else {
        tracing::debug!(path = %path, "require_auth: no session cookie");
        return reject(&path, AuthError::MissingAuth, jar);
    };

    match auth_state.sessions.resolve(&token).await {
        Ok(user_id) => {
            tracing::debug!(path = %path, user_id = %user_id, "require_auth: authenticated");
            request
                .extensions_mut()
                .insert(AuthUser { user_id, token });
            next.run(request).await
        }
        Err(reason) => {
            tracing::info!(
                path = %path,
                token_prefix = %token.log_prefix(),
                reason = %reason,
                "require_auth: session rejected"
            );
            // A store outage says nothing about the cookie; keep it for the retry
            let jar = if reason.session_is_gone() {
                jar.add(auth_state.cookie.expired_cookie())
            } else {
                jar
            };
            reject(&path, AuthError::InvalidSession, jar)
        }
    }
}

fn reject(path: &str, err: AuthError, jar: CookieJar) -> Response {
    if is_api_path(path) {
        (jar, err).into_response()
    } else {
        (StatusCode::FOUND, jar, [(LOCATION, LOGIN_PATH)]).into_response()
    }
}
