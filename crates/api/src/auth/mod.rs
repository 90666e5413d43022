//! Authentication module for Mercado

pub mod cookies;
pub mod middleware;
#[cfg(test)]
mod middleware_tests;
pub mod password;
pub mod service;
pub mod sessions;

pub use cookies::{session_token, CookieSettings, SESSION_COOKIE};
pub use middleware::{is_api_path, require_auth, AuthError, AuthState, AuthUser, LOGIN_PATH};
pub use password::{Argon2Settings, PasswordError, PasswordHasher};
pub use service::{
    AuthOutcome, AuthService, Rejection, ServerFault, SessionGrant, SignInForm, SignUpForm,
};
pub use sessions::{SessionManager, Unauthenticated};
