//! Sign-in, sign-up and sign-out handlers
//!
//! Rejections are rendered with status 200 so htmx swaps the message into
//! the form.

use axum::{
    extract::State,
    http::{header::LOCATION, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;

use super::fragments;
use crate::auth::{session_token, AuthOutcome, SignInForm, SignUpForm, LOGIN_PATH};
use crate::state::AppState;

/// Tells htmx to perform a client-side redirect
pub const HX_REDIRECT: HeaderName = HeaderName::from_static("hx-redirect");

pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignInForm>,
) -> Response {
    let outcome = state.auth.sign_in(&form).await;
    respond(&state, jar, outcome)
}

pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignUpForm>,
) -> Response {
    let outcome = state.auth.sign_up(&form).await;
    respond(&state, jar, outcome)
}

/// Revoke the current session (if any), expire the cookie and send the
/// browser to the login page.
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> Response {
    let token = session_token(&jar);
    state.auth.sign_out(token.as_ref()).await;

    let jar = jar.add(state.config.cookie.expired_cookie());
    (
        StatusCode::FOUND,
        jar,
        [(LOCATION, LOGIN_PATH), (HX_REDIRECT, LOGIN_PATH)],
    )
        .into_response()
}

fn respond(state: &AppState, jar: CookieJar, outcome: AuthOutcome) -> Response {
    match outcome {
        AuthOutcome::Authenticated(grant) => {
            let jar = jar.add(
                state
                    .config
                    .cookie
                    .session_cookie(&grant.token, grant.expires_at),
            );
            (
                jar,
                [(HX_REDIRECT, "/")],
                fragments::auth_response(true, "Welcome!"),
            )
                .into_response()
        }
        AuthOutcome::Rejected(rejection) => {
            fragments::auth_response(false, rejection.message()).into_response()
        }
        AuthOutcome::ServerError(fault) => {
            fragments::auth_response(false, fault.message()).into_response()
        }
    }
}
