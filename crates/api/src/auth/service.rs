//! Sign-in, sign-up and sign-out
//!
//! Every call ends in exactly one [`AuthOutcome`]. Rejections carry a
//! user-facing message; server errors never expose internal detail.

use std::sync::Arc;
use std::time::Duration;

use mercado_shared::{
    limits, with_timeout, MarketStore, NewStudent, NewUser, SessionToken, StoreError, User, UserId,
};
use serde::Deserialize;
use time::OffsetDateTime;

use super::password::PasswordHasher;
use super::sessions::SessionManager;

/// Sign-in form. `student_id` also accepts an email address.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct SignInForm {
    pub student_id: String,
    pub password: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct SignUpForm {
    pub student_id: String,
    pub email: String,
    pub middle_names: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub password: String,
    pub confirm_password: String,
}

/// A freshly issued session
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub user_id: UserId,
    pub token: SessionToken,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingCredentials,
    /// Unknown identifier and wrong password alike
    InvalidCredentials,
    MissingFields,
    /// A field is wider than its column
    FieldTooLong,
    PasswordMismatch,
    UserExists,
}

impl Rejection {
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::MissingCredentials => "Student ID and password are required",
            Rejection::InvalidCredentials => "Invalid credentials",
            Rejection::MissingFields => "All fields are required",
            Rejection::FieldTooLong => "One or more fields are too long",
            Rejection::PasswordMismatch => "Passwords don't match",
            Rejection::UserExists => "User already exists",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerFault {
    Unavailable,
    /// The account was created but no session could be issued for it
    SignInAfterSignUp,
}

impl ServerFault {
    pub fn message(&self) -> &'static str {
        match self {
            ServerFault::Unavailable => "Something went wrong. Please try again.",
            ServerFault::SignInAfterSignUp => {
                "Account created, but we could not sign you in. Please sign in."
            }
        }
    }
}

#[derive(Debug)]
pub enum AuthOutcome {
    Authenticated(SessionGrant),
    Rejected(Rejection),
    ServerError(ServerFault),
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn MarketStore>,
    sessions: SessionManager,
    passwords: PasswordHasher,
    timeout: Duration,
    session_lifetime: time::Duration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn MarketStore>,
        sessions: SessionManager,
        passwords: PasswordHasher,
        timeout: Duration,
        session_lifetime: time::Duration,
    ) -> Self {
        Self {
            store,
            sessions,
            passwords,
            timeout,
            session_lifetime,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub async fn sign_in(&self, form: &SignInForm) -> AuthOutcome {
        let identifier = form.student_id.trim();
        if identifier.is_empty() || form.password.is_empty() {
            return AuthOutcome::Rejected(Rejection::MissingCredentials);
        }

        let user = match self.find_user(identifier).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                self.passwords.verify_dummy(&form.password).await;
                tracing::info!("sign-in rejected: unknown identifier");
                return AuthOutcome::Rejected(Rejection::InvalidCredentials);
            }
            Err(err) => {
                tracing::error!(error = %err, "sign-in lookup failed");
                return AuthOutcome::ServerError(ServerFault::Unavailable);
            }
        };

        let Some(stored) = user.password_hash.as_ref() else {
            // Collaborator accounts have no password and can never sign in
            self.passwords.verify_dummy(&form.password).await;
            tracing::info!(user_id = %user.id, "sign-in rejected: account has no password");
            return AuthOutcome::Rejected(Rejection::InvalidCredentials);
        };

        match self.passwords.verify(stored, &form.password).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(user_id = %user.id, "sign-in rejected: wrong password");
                return AuthOutcome::Rejected(Rejection::InvalidCredentials);
            }
            Err(err) => {
                tracing::error!(user_id = %user.id, error = %err, "password verification failed");
                return AuthOutcome::ServerError(ServerFault::Unavailable);
            }
        }

        match self.grant(user.id).await {
            Ok(grant) => {
                tracing::info!(user_id = %user.id, "sign-in succeeded");
                AuthOutcome::Authenticated(grant)
            }
            Err(err) => {
                tracing::error!(user_id = %user.id, error = %err, "could not issue session");
                AuthOutcome::ServerError(ServerFault::Unavailable)
            }
        }
    }

    pub async fn sign_up(&self, form: &SignUpForm) -> AuthOutcome {
        let required = [
            form.student_id.trim(),
            form.email.trim(),
            form.middle_names.trim(),
            form.paternal_surname.trim(),
            form.maternal_surname.trim(),
            form.password.as_str(),
            form.confirm_password.as_str(),
        ];
        if required.iter().any(|value| value.is_empty()) {
            return AuthOutcome::Rejected(Rejection::MissingFields);
        }
        let widths = [
            (form.student_id.trim(), limits::STUDENT_ID),
            (form.email.trim(), limits::TEXT),
            (form.middle_names.trim(), limits::TEXT),
            (form.paternal_surname.trim(), limits::TEXT),
            (form.maternal_surname.trim(), limits::TEXT),
        ];
        if widths
            .iter()
            .any(|(value, max)| limits::exceeds(value, *max))
        {
            return AuthOutcome::Rejected(Rejection::FieldTooLong);
        }
        if form.password != form.confirm_password {
            return AuthOutcome::Rejected(Rejection::PasswordMismatch);
        }

        let password_hash = match self.passwords.hash(&form.password).await {
            Ok(hash) => hash,
            Err(err) => {
                tracing::error!(error = %err, "password hashing failed");
                return AuthOutcome::ServerError(ServerFault::Unavailable);
            }
        };

        let new_user = NewUser {
            email: form.email.trim().to_string(),
            given_names: form.middle_names.trim().to_string(),
            paternal_surname: form.paternal_surname.trim().to_string(),
            maternal_surname: form.maternal_surname.trim().to_string(),
            personal_id: None,
            password_hash: Some(password_hash),
            student: Some(NewStudent {
                id: form.student_id.trim().to_string(),
                grade: String::new(),
                class_group: String::new(),
            }),
        };

        let user = match with_timeout(self.timeout, self.store.users().create(new_user)).await {
            Ok(user) => user,
            Err(StoreError::AlreadyExists) => {
                tracing::info!("sign-up rejected: user already exists");
                return AuthOutcome::Rejected(Rejection::UserExists);
            }
            Err(err) => {
                tracing::error!(error = %err, "sign-up failed to create user");
                return AuthOutcome::ServerError(ServerFault::Unavailable);
            }
        };
        tracing::info!(user_id = %user.id, "account created");

        match self.grant(user.id).await {
            Ok(grant) => AuthOutcome::Authenticated(grant),
            Err(err) => {
                // The account stays; the user can sign in normally
                tracing::warn!(user_id = %user.id, error = %err, "account created but session issue failed");
                AuthOutcome::ServerError(ServerFault::SignInAfterSignUp)
            }
        }
    }

    /// Revoke the session behind `token`, if any. Never fails.
    pub async fn sign_out(&self, token: Option<&SessionToken>) {
        match token {
            Some(token) => self.sessions.revoke(token).await,
            None => tracing::debug!("sign-out without a session cookie"),
        }
    }

    async fn find_user(&self, identifier: &str) -> Result<User, StoreError> {
        let users = self.store.users();
        if identifier.contains('@') {
            with_timeout(self.timeout, users.find_by_email(identifier)).await
        } else {
            with_timeout(self.timeout, users.find_by_student_id(identifier)).await
        }
    }

    async fn grant(&self, user_id: UserId) -> Result<SessionGrant, StoreError> {
        let token = self.sessions.issue(user_id).await?;
        Ok(SessionGrant {
            user_id,
            token,
            expires_at: OffsetDateTime::now_utc() + self.session_lifetime,
        })
    }
}
