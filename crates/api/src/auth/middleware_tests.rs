//! Unit tests for the session gate
//!
//! Tests cover:
//! - Missing and unknown session cookies on API and browser paths
//! - Stale cookie clearing, and keeping the cookie on store outages
//! - AuthUser propagation to handlers

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{
            header::{COOKIE, LOCATION, SET_COOKIE},
            Request, StatusCode,
        },
        middleware,
        routing::get,
        Extension, Router,
    };
    use mercado_shared::{MarketStore, MemoryStore};
    use tower::ServiceExt;

    use super::super::cookies::CookieSettings;
    use super::super::middleware::*;
    use super::super::sessions::SessionManager;
    use super::super::test_support::{seed_student, SlowStore};

    fn app(store: MemoryStore) -> Router {
        app_with(Arc::new(store), Duration::from_secs(1))
    }

    fn app_with(store: Arc<dyn MarketStore>, timeout: Duration) -> Router {
        let auth_state = AuthState {
            sessions: SessionManager::new(store, timeout, None),
            cookie: CookieSettings::default(),
        };

        Router::new()
            .route("/profile", get(whoami))
            .route("/api/products", get(whoami))
            .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
    }

    async fn whoami(Extension(user): Extension<AuthUser>) -> String {
        user.user_id.to_string()
    }

    fn request(path: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // =========================================================================
    // Missing cookie
    // =========================================================================

    #[tokio::test]
    async fn test_api_path_without_cookie_is_401() {
        let response = app(MemoryStore::new())
            .oneshot(request("/api/products", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["code"], 401);
        assert_eq!(body["error"], "Authentication required");
    }

    #[tokio::test]
    async fn test_browser_path_without_cookie_redirects() {
        let response = app(MemoryStore::new())
            .oneshot(request("/profile", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/auth/login");
        // Nothing to clear
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    // =========================================================================
    // Unknown token
    // =========================================================================

    #[tokio::test]
    async fn test_unknown_token_redirects_and_clears_cookie() {
        let response = app(MemoryStore::new())
            .oneshot(request("/profile", Some("session=not-a-real-token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/auth/login");
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("session=;"));
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_unknown_token_on_api_path_is_401() {
        let response = app(MemoryStore::new())
            .oneshot(request("/api/products", Some("session=not-a-real-token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_string(response).await;
        assert!(body.contains("Invalid or expired session"));
    }

    #[tokio::test]
    async fn test_empty_cookie_is_missing_auth() {
        let response = app(MemoryStore::new())
            .oneshot(request("/api/products", Some("session=")))
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(body.contains("Authentication required"));
    }

    // =========================================================================
    // Valid session
    // =========================================================================

    #[tokio::test]
    async fn test_valid_session_reaches_handler() {
        let store = MemoryStore::new();
        let user = seed_student(&store, "A0100000").await;
        let token = store.sessions().create(user.id).await.unwrap();
        let cookie = format!("theme=dark; session={}", token.as_str());

        for path in ["/profile", "/api/products"] {
            let response = app(store.clone())
                .oneshot(request(path, Some(&cookie)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "path {path}");
            assert_eq!(body_string(response).await, user.id.to_string());
        }
    }

    #[tokio::test]
    async fn test_revoked_session_is_rejected() {
        let store = MemoryStore::new();
        let user = seed_student(&store, "A0100001").await;
        let token = store.sessions().create(user.id).await.unwrap();
        store.sessions().delete(&token).await.unwrap();

        let response = app(store)
            .oneshot(request(
                "/api/products",
                Some(&format!("session={}", token.as_str())),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // =========================================================================
    // Store outage
    // =========================================================================

    #[tokio::test]
    async fn test_store_timeout_keeps_valid_cookie() {
        let store = MemoryStore::new();
        let user = seed_student(&store, "A0100002").await;
        let token = store.sessions().create(user.id).await.unwrap();
        let cookie = format!("session={}", token.as_str());
        let slow = SlowStore::new(store.clone(), Duration::from_millis(200));

        let response = app_with(Arc::new(slow), Duration::from_millis(20))
            .oneshot(request("/api/products", Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());

        // Once the store answers again the same cookie still works
        let response = app(store)
            .oneshot(request("/api/products", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_api_path_detection() {
        assert!(is_api_path("/api/products"));
        assert!(is_api_path("/api"));
        assert!(!is_api_path("/apiary"));
        assert!(!is_api_path("/profile"));
    }
}
