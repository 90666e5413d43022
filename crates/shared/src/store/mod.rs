//! Persistence interface
//!
//! Every entity gets the same [`Repository`] capability (create/get/update/
//! delete) plus a small entity-specific trait for the finders the handlers
//! need. Backends implement all of them; [`MarketStore`] hands out trait
//! objects so callers never depend on a concrete backend.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{
    Business, Collaborator, NewBusiness, NewProduct, NewUser, Product, Session, SessionToken,
    Student, User, UserId,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A persisted entity with an immutable key
pub trait Entity: Send + Sync + 'static {
    type Id: Send + Sync + 'static;
    type New: Send + 'static;
}

impl Entity for User {
    type Id = UserId;
    type New = NewUser;
}

impl Entity for Student {
    type Id = String;
    type New = Student;
}

impl Entity for Business {
    type Id = Uuid;
    type New = NewBusiness;
}

impl Entity for Product {
    type Id = Uuid;
    type New = NewProduct;
}

/// Generic create/get/update/delete capability.
///
/// `create` is atomic with respect to the entity's uniqueness constraints and
/// fails with `AlreadyExists` on collision. `delete` is idempotent and
/// reports whether a row was removed.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn create(&self, new: T::New) -> StoreResult<T>;
    async fn get(&self, id: &T::Id) -> StoreResult<T>;
    async fn update(&self, entity: &T) -> StoreResult<()>;
    async fn delete(&self, id: &T::Id) -> StoreResult<bool>;
}

/// Credential store
#[async_trait]
pub trait UserStore: Repository<User> {
    async fn find_by_email(&self, email: &str) -> StoreResult<User>;
    async fn find_by_student_id(&self, student_id: &str) -> StoreResult<User>;
}

#[async_trait]
pub trait StudentStore: Repository<Student> {
    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Student>;
}

#[async_trait]
pub trait BusinessStore: Repository<Business> {
    async fn find_by_owner(&self, owner_student_id: &str) -> StoreResult<Business>;
}

#[async_trait]
pub trait ProductStore: Repository<Product> {
    async fn list_by_business(&self, business_id: Uuid) -> StoreResult<Vec<Product>>;
}

#[async_trait]
pub trait CollaboratorStore: Send + Sync {
    /// Create a collaborator account (with its student row, if any) and link
    /// it to `business_id` in one step. Nothing is kept when any part fails.
    async fn create_and_link(&self, business_id: Uuid, new: NewUser) -> StoreResult<User>;
    /// Write a collaborator's user row and, for interns, their student row
    /// together. `student` must belong to `user`.
    async fn update_collaborator(&self, user: &User, student: Option<&Student>)
        -> StoreResult<()>;
    /// Link a user to a business. `AlreadyExists` if already linked.
    async fn link(&self, business_id: Uuid, user_id: UserId) -> StoreResult<()>;
    async fn unlink(&self, business_id: Uuid, user_id: UserId) -> StoreResult<bool>;
    async fn is_linked(&self, business_id: Uuid, user_id: UserId) -> StoreResult<bool>;
    async fn list_collaborators(&self, business_id: Uuid) -> StoreResult<Vec<Collaborator>>;
}

/// Session store: opaque token ↔ user id
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session for `user_id` under a freshly generated token.
    async fn create(&self, user_id: UserId) -> StoreResult<SessionToken>;
    async fn lookup(&self, token: &SessionToken) -> StoreResult<Session>;
    /// Idempotent; returns whether a session was removed.
    async fn delete(&self, token: &SessionToken) -> StoreResult<bool>;
}

/// Handle to a complete backend
pub trait MarketStore: Send + Sync {
    fn users(&self) -> &dyn UserStore;
    fn students(&self) -> &dyn StudentStore;
    fn businesses(&self) -> &dyn BusinessStore;
    fn products(&self) -> &dyn ProductStore;
    fn collaborators(&self) -> &dyn CollaboratorStore;
    fn sessions(&self) -> &dyn SessionStore;
}
