//! HTTP routes

pub mod auth;
pub mod collaborators;
pub mod fragments;
pub mod products;
pub mod profile;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use mercado_shared::{Business, StoreError, Student};

use crate::auth::{require_auth, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Build the application router. Layers that apply to every route
/// (tracing, security headers) are added by the caller.
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/signin", post(auth::sign_in))
        .route("/auth/signup", post(auth::sign_up))
        .route("/auth/logout", get(auth::sign_out).post(auth::sign_out));

    let protected = Router::new()
        .route("/profile", get(profile::summary))
        .route("/api/profile/config", post(profile::save_business))
        .route(
            "/api/products",
            get(products::list)
                .post(products::create)
                .patch(products::update)
                .delete(products::delete),
        )
        .route("/api/products/edit/{id}", get(products::edit_row))
        .route("/api/products/cancel/{id}", get(products::cancel_edit))
        .route(
            "/api/collaborators",
            get(collaborators::list)
                .post(collaborators::create)
                .patch(collaborators::update)
                .delete(collaborators::delete),
        )
        .route("/api/collaborators/form", get(collaborators::form_fields))
        .route_layer(middleware::from_fn_with_state(
            state.auth_state.clone(),
            require_auth,
        ));

    public.merge(protected).with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Student record of the signed-in user
pub(crate) async fn current_student(state: &AppState, user: &AuthUser) -> ApiResult<Student> {
    match state
        .bounded(state.store.students().find_by_user(user.user_id))
        .await
    {
        Ok(student) => Ok(student),
        Err(StoreError::NotFound) => Err(ApiError::not_found("Student not found")),
        Err(err) => Err(err.into()),
    }
}

/// Business owned by the signed-in student
pub(crate) async fn current_business(state: &AppState, user: &AuthUser) -> ApiResult<Business> {
    let student = current_student(state, user).await?;
    match state
        .bounded(state.store.businesses().find_by_owner(&student.id))
        .await
    {
        Ok(business) => Ok(business),
        Err(StoreError::NotFound) => Err(ApiError::not_found("Business not found")),
        Err(err) => Err(err.into()),
    }
}
