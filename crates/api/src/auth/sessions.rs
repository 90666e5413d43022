//! Session issuance, resolution and revocation
//!
//! Wraps the session store with the token policy: every call is bounded by
//! the store timeout, resolution fails closed, and revocation never fails
//! from the caller's point of view.

use std::sync::Arc;
use std::time::Duration;

use mercado_shared::{with_timeout, MarketStore, SessionToken, StoreError, StoreResult, UserId};
use time::OffsetDateTime;

/// Returned by [`SessionManager::resolve`] for any token that does not map to
/// a live session, including when the store could not be reached. Every
/// variant denies access; the variant only tells the gate whether the cookie
/// is worth keeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Unauthenticated {
    #[error("unknown session")]
    UnknownSession,
    #[error("session expired")]
    Expired,
    #[error("session store unavailable")]
    StoreUnavailable,
}

impl Unauthenticated {
    /// False when the session may still exist and the cookie should be kept
    pub fn session_is_gone(&self) -> bool {
        !matches!(self, Unauthenticated::StoreUnavailable)
    }
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn MarketStore>,
    timeout: Duration,
    ttl: Option<time::Duration>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn MarketStore>, timeout: Duration, ttl: Option<time::Duration>) -> Self {
        Self {
            store,
            timeout,
            ttl,
        }
    }

    /// Create a session for `user_id` and return its token.
    pub async fn issue(&self, user_id: UserId) -> StoreResult<SessionToken> {
        let token = with_timeout(self.timeout, self.store.sessions().create(user_id)).await?;
        tracing::info!(user_id = %user_id, token_prefix = %token.log_prefix(), "session issued");
        Ok(token)
    }

    pub async fn resolve(&self, token: &SessionToken) -> Result<UserId, Unauthenticated> {
        let session = match with_timeout(self.timeout, self.store.sessions().lookup(token)).await {
            Ok(session) => session,
            Err(StoreError::NotFound) => {
                tracing::debug!(token_prefix = %token.log_prefix(), "unknown session token");
                return Err(Unauthenticated::UnknownSession);
            }
            Err(err) => {
                tracing::error!(
                    token_prefix = %token.log_prefix(),
                    error = %err,
                    "session lookup failed, treating as unauthenticated"
                );
                return Err(Unauthenticated::StoreUnavailable);
            }
        };

        if let Some(ttl) = self.ttl {
            if OffsetDateTime::now_utc() - session.created_at > ttl {
                tracing::info!(
                    user_id = %session.user_id,
                    token_prefix = %token.log_prefix(),
                    "session expired"
                );
                self.revoke(token).await;
                return Err(Unauthenticated::Expired);
            }
        }

        Ok(session.user_id)
    }

    /// Delete the session behind `token`. Failures are logged only.
    pub async fn revoke(&self, token: &SessionToken) {
        match with_timeout(self.timeout, self.store.sessions().delete(token)).await {
            Ok(true) => {
                tracing::info!(token_prefix = %token.log_prefix(), "session revoked");
            }
            Ok(false) => {
                tracing::debug!(token_prefix = %token.log_prefix(), "session already gone");
            }
            Err(err) => {
                tracing::warn!(
                    token_prefix = %token.log_prefix(),
                    error = %err,
                    "failed to revoke session"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{seed_student, SlowStore};
    use mercado_shared::MemoryStore;

    fn manager(store: Arc<dyn MarketStore>) -> SessionManager {
        SessionManager::new(store, Duration::from_secs(1), None)
    }

    #[tokio::test]
    async fn test_issue_then_resolve() {
        let store = MemoryStore::new();
        let user = seed_student(&store, "A0000001").await;
        let sessions = manager(Arc::new(store));

        let token = sessions.issue(user.id).await.unwrap();
        assert_eq!(sessions.resolve(&token).await, Ok(user.id));
        // Stable until revoked
        assert_eq!(sessions.resolve(&token).await, Ok(user.id));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = MemoryStore::new();
        let user = seed_student(&store, "A0000002").await;
        let sessions = manager(Arc::new(store));

        let token = sessions.issue(user.id).await.unwrap();
        sessions.revoke(&token).await;
        sessions.revoke(&token).await;
        assert_eq!(
            sessions.resolve(&token).await,
            Err(Unauthenticated::UnknownSession)
        );
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthenticated() {
        let sessions = manager(Arc::new(MemoryStore::new()));
        let result = sessions.resolve(&SessionToken::generate()).await;
        assert_eq!(result, Err(Unauthenticated::UnknownSession));
        assert!(Unauthenticated::UnknownSession.session_is_gone());
    }

    #[tokio::test]
    async fn test_store_timeout_fails_closed() {
        let store = MemoryStore::new();
        let user = seed_student(&store, "A0000003").await;
        let token = store.sessions().create(user.id).await.unwrap();

        let slow = SlowStore::new(store, Duration::from_millis(200));
        let sessions = SessionManager::new(Arc::new(slow), Duration::from_millis(20), None);
        let err = sessions.resolve(&token).await.unwrap_err();
        assert_eq!(err, Unauthenticated::StoreUnavailable);
        assert!(!err.session_is_gone());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_deleted() {
        let store = MemoryStore::new();
        let user = seed_student(&store, "A0000004").await;
        let sessions = SessionManager::new(
            Arc::new(store.clone()),
            Duration::from_secs(1),
            Some(time::Duration::ZERO),
        );

        let token = sessions.issue(user.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(sessions.resolve(&token).await, Err(Unauthenticated::Expired));
        assert!(matches!(
            store.sessions().lookup(&token).await,
            Err(StoreError::NotFound)
        ));
    }
}
