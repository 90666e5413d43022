//! Application state

use std::future::Future;
use std::sync::Arc;

use mercado_shared::{with_timeout, MarketStore, StoreResult};

use crate::{
    auth::{AuthService, AuthState, PasswordError, PasswordHasher, SessionManager},
    config::Config,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn MarketStore>,
    pub auth: AuthService,
    /// State handed to the session gate
    pub auth_state: AuthState,
}

impl AppState {
    /// Wire the auth core around `store`. Fails only on invalid argon2
    /// settings.
    pub fn new(store: Arc<dyn MarketStore>, config: Config) -> Result<Self, PasswordError> {
        let sessions =
            SessionManager::new(store.clone(), config.store_timeout, config.session_ttl);
        let passwords = PasswordHasher::new(config.argon2)?;
        let auth = AuthService::new(
            store.clone(),
            sessions.clone(),
            passwords,
            config.store_timeout,
            config.cookie.max_age,
        );
        let auth_state = AuthState {
            sessions,
            cookie: config.cookie,
        };

        match config.session_ttl {
            Some(ttl) => tracing::info!(ttl_hours = ttl.whole_hours(), "Server-side session TTL enabled"),
            None => tracing::info!("Sessions stay valid until sign-out"),
        }

        Ok(Self {
            config,
            store,
            auth,
            auth_state,
        })
    }

    /// Run a store call under the configured timeout.
    pub async fn bounded<T, F>(&self, operation: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        with_timeout(self.config.store_timeout, operation).await
    }
}
