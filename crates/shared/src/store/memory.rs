//! In-memory backend
//!
//! All state sits behind one `RwLock`, so every write (including the
//! uniqueness checks in `create`) is serialised exactly like a transaction
//! would be.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    BusinessStore, CollaboratorStore, MarketStore, ProductStore, Repository, SessionStore,
    StudentStore, UserStore,
};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Business, Collaborator, NewBusiness, NewProduct, NewUser, Product, Session, SessionToken,
    Student, User, UserId,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    students: HashMap<String, Student>,
    sessions: HashMap<SessionToken, Session>,
    businesses: HashMap<Uuid, Business>,
    products: HashMap<Uuid, Product>,
    collaborators: BTreeSet<(Uuid, UserId)>,
}

impl MemoryState {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    /// Uniqueness checks first, then the user and optional student rows
    fn insert_user(&mut self, new: NewUser) -> StoreResult<User> {
        if self.email_taken(&new.email, None) {
            return Err(StoreError::AlreadyExists);
        }
        if let Some(student) = &new.student {
            if self.students.contains_key(&student.id) {
                return Err(StoreError::AlreadyExists);
            }
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            given_names: new.given_names,
            paternal_surname: new.paternal_surname,
            maternal_surname: new.maternal_surname,
            personal_id: new.personal_id,
            password_hash: new.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };

        if let Some(student) = new.student {
            self.students.insert(
                student.id.clone(),
                Student {
                    id: student.id,
                    grade: student.grade,
                    class_group: student.class_group,
                    user_id: user.id,
                },
            );
        }
        self.users.insert(user.id, user.clone());

        Ok(user)
    }

    fn check_user_update(&self, user: &User) -> StoreResult<()> {
        if !self.users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        if self.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::AlreadyExists);
        }
        Ok(())
    }

    fn student_of(&self, user_id: UserId) -> Option<&Student> {
        self.students.values().find(|s| s.user_id == user_id)
    }

    fn remove_business(&mut self, business_id: Uuid) -> bool {
        if self.businesses.remove(&business_id).is_none() {
            return false;
        }
        self.products.retain(|_, p| p.business_id != business_id);
        self.collaborators.retain(|(b, _)| *b != business_id);
        true
    }

    fn remove_student(&mut self, student_id: &str) -> bool {
        if self.students.remove(student_id).is_none() {
            return false;
        }
        let owned: Vec<Uuid> = self
            .businesses
            .values()
            .filter(|b| b.owner_student_id == student_id)
            .map(|b| b.id)
            .collect();
        for business_id in owned {
            self.remove_business(business_id);
        }
        true
    }
}

/// Store backed by process memory. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarketStore for MemoryStore {
    fn users(&self) -> &dyn UserStore {
        self
    }

    fn students(&self) -> &dyn StudentStore {
        self
    }

    fn businesses(&self) -> &dyn BusinessStore {
        self
    }

    fn products(&self) -> &dyn ProductStore {
        self
    }

    fn collaborators(&self) -> &dyn CollaboratorStore {
        self
    }

    fn sessions(&self) -> &dyn SessionStore {
        self
    }
}

// =============================================================================
// Users
// =============================================================================

#[async_trait]
impl Repository<User> for MemoryStore {
    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        state.insert_user(new)
    }

    async fn get(&self, id: &UserId) -> StoreResult<User> {
        let state = self.state.read().await;
        state.users.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check_user_update(user)?;
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: &UserId) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if state.users.remove(id).is_none() {
            return Ok(false);
        }
        state.sessions.retain(|_, s| s.user_id != *id);
        state.collaborators.retain(|(_, u)| u != id);
        let student_id = state.student_of(*id).map(|s| s.id.clone());
        if let Some(student_id) = student_id {
            state.remove_student(&student_id);
        }
        Ok(true)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<User> {
        let state = self.state.read().await;
        state
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_student_id(&self, student_id: &str) -> StoreResult<User> {
        let state = self.state.read().await;
        state
            .students
            .get(student_id)
            .and_then(|s| state.users.get(&s.user_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

// =============================================================================
// Students
// =============================================================================

#[async_trait]
impl Repository<Student> for MemoryStore {
    async fn create(&self, student: Student) -> StoreResult<Student> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&student.user_id) {
            return Err(StoreError::NotFound);
        }
        if state.students.contains_key(&student.id) || state.student_of(student.user_id).is_some()
        {
            return Err(StoreError::AlreadyExists);
        }
        state.students.insert(student.id.clone(), student.clone());
        Ok(student)
    }

    async fn get(&self, id: &String) -> StoreResult<Student> {
        let state = self.state.read().await;
        state.students.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update(&self, student: &Student) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.students.get_mut(&student.id) {
            Some(existing) => {
                existing.grade = student.grade.clone();
                existing.class_group = student.class_group.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: &String) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.remove_student(id))
    }
}

#[async_trait]
impl StudentStore for MemoryStore {
    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Student> {
        let state = self.state.read().await;
        state
            .student_of(user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

// =============================================================================
// Businesses
// =============================================================================

#[async_trait]
impl Repository<Business> for MemoryStore {
    async fn create(&self, new: NewBusiness) -> StoreResult<Business> {
        let mut state = self.state.write().await;
        if !state.students.contains_key(&new.owner_student_id) {
            return Err(StoreError::NotFound);
        }
        if state
            .businesses
            .values()
            .any(|b| b.owner_student_id == new.owner_student_id)
        {
            return Err(StoreError::AlreadyExists);
        }
        let business = Business {
            id: Uuid::new_v4(),
            owner_student_id: new.owner_student_id,
            name: new.name,
            kind: new.kind,
            description: new.description,
        };
        state.businesses.insert(business.id, business.clone());
        Ok(business)
    }

    async fn get(&self, id: &Uuid) -> StoreResult<Business> {
        let state = self.state.read().await;
        state.businesses.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update(&self, business: &Business) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.businesses.get_mut(&business.id) {
            Some(existing) => {
                existing.name = business.name.clone();
                existing.kind = business.kind.clone();
                existing.description = business.description.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: &Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.remove_business(*id))
    }
}

#[async_trait]
impl BusinessStore for MemoryStore {
    async fn find_by_owner(&self, owner_student_id: &str) -> StoreResult<Business> {
        let state = self.state.read().await;
        state
            .businesses
            .values()
            .find(|b| b.owner_student_id == owner_student_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

// =============================================================================
// Products
// =============================================================================

#[async_trait]
impl Repository<Product> for MemoryStore {
    async fn create(&self, new: NewProduct) -> StoreResult<Product> {
        let mut state = self.state.write().await;
        if !state.businesses.contains_key(&new.business_id) {
            return Err(StoreError::NotFound);
        }
        let product = Product {
            id: Uuid::new_v4(),
            business_id: new.business_id,
            title: new.title,
            price: new.price,
            stock: new.stock,
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get(&self, id: &Uuid) -> StoreResult<Product> {
        let state = self.state.read().await;
        state.products.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.products.get_mut(&product.id) {
            Some(existing) => {
                existing.title = product.title.clone();
                existing.price = product.price;
                existing.stock = product.stock;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: &Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.products.remove(id).is_some())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list_by_business(&self, business_id: Uuid) -> StoreResult<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.business_id == business_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(products)
    }
}

// =============================================================================
// Collaborators
// =============================================================================

#[async_trait]
impl CollaboratorStore for MemoryStore {
    async fn create_and_link(&self, business_id: Uuid, new: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if !state.businesses.contains_key(&business_id) {
            return Err(StoreError::NotFound);
        }
        let user = state.insert_user(new)?;
        state.collaborators.insert((business_id, user.id));
        Ok(user)
    }

    async fn update_collaborator(
        &self,
        user: &User,
        student: Option<&Student>,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check_user_update(user)?;
        if let Some(student) = student {
            match state.students.get(&student.id) {
                Some(existing) if existing.user_id == user.id => {}
                _ => return Err(StoreError::NotFound),
            }
        }

        state.users.insert(user.id, user.clone());
        if let Some(student) = student {
            if let Some(existing) = state.students.get_mut(&student.id) {
                existing.grade = student.grade.clone();
                existing.class_group = student.class_group.clone();
            }
        }
        Ok(())
    }

    async fn link(&self, business_id: Uuid, user_id: UserId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.businesses.contains_key(&business_id) || !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        if !state.collaborators.insert((business_id, user_id)) {
            return Err(StoreError::AlreadyExists);
        }
        Ok(())
    }

    async fn unlink(&self, business_id: Uuid, user_id: UserId) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.collaborators.remove(&(business_id, user_id)))
    }

    async fn is_linked(&self, business_id: Uuid, user_id: UserId) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state.collaborators.contains(&(business_id, user_id)))
    }

    async fn list_collaborators(&self, business_id: Uuid) -> StoreResult<Vec<Collaborator>> {
        let state = self.state.read().await;
        let mut collaborators: Vec<Collaborator> = state
            .collaborators
            .iter()
            .filter(|(b, _)| *b == business_id)
            .filter_map(|(_, user_id)| state.users.get(user_id))
            .map(|user| Collaborator {
                user: user.clone(),
                student: state.student_of(user.id).cloned(),
            })
            .collect();
        collaborators.sort_by(|a, b| {
            (&a.user.paternal_surname, &a.user.given_names, a.user.id).cmp(&(
                &b.user.paternal_surname,
                &b.user.given_names,
                b.user.id,
            ))
        });
        Ok(collaborators)
    }
}

// =============================================================================
// Sessions
// =============================================================================

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, user_id: UserId) -> StoreResult<SessionToken> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        let token = SessionToken::generate();
        state.sessions.insert(
            token.clone(),
            Session {
                token: token.clone(),
                user_id,
                created_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(token)
    }

    async fn lookup(&self, token: &SessionToken) -> StoreResult<Session> {
        let state = self.state.read().await;
        state.sessions.get(token).cloned().ok_or(StoreError::NotFound)
    }

    async fn delete(&self, token: &SessionToken) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.sessions.remove(token).is_some())
    }
}
