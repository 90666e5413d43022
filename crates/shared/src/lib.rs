// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Mercado Shared Library
//!
//! Domain models, persistence traits and the storage backends used by the
//! Mercado API server.
//!
//! ## Backends
//!
//! - **PostgreSQL** ([`PgStore`]): production backend, uniqueness enforced by
//!   table constraints
//! - **In-memory** ([`MemoryStore`]): single-lock backend used by tests and
//!   local development

pub mod db;
pub mod error;
pub mod models;
pub mod store;

pub use db::{create_pool, run_migrations};
pub use error::{with_timeout, StoreError, StoreResult};
pub use models::{
    limits, Business, Collaborator, NewBusiness, NewProduct, NewStudent, NewUser, ParsePriceError,
    Price, Product, Session, SessionToken, StoredHash, Student, User, UserId,
};
pub use store::{
    BusinessStore, CollaboratorStore, Entity, MarketStore, MemoryStore, PgStore, ProductStore,
    Repository, SessionStore, StudentStore, UserStore,
};
