// API crate clippy configuration
#![allow(clippy::declare_interior_mutable_const)] // HeaderName constants
// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Mercado API Library
//!
//! Cookie-session authentication and the htmx handlers for the student
//! marketplace: business profile, products and collaborators.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod security;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
