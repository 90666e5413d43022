//! PostgreSQL backend
//!
//! Uniqueness (email, student id, one business per owner, one link per
//! collaborator) is enforced by table constraints; unique violations surface
//! as `StoreError::AlreadyExists` through `From<sqlx::Error>`.

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    BusinessStore, CollaboratorStore, MarketStore, ProductStore, Repository, SessionStore,
    StudentStore, UserStore,
};
use crate::error::StoreResult;
use crate::models::{
    Business, Collaborator, NewBusiness, NewProduct, NewUser, Product, Session, SessionToken,
    StoredHash, Student, User, UserId,
};

const USER_COLUMNS: &str = "u.id, u.email, u.given_names, u.paternal_surname, u.maternal_surname, \
     u.personal_id, u.password_hash, u.created_at";

/// Store backed by a PostgreSQL pool. Cloning shares the pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl MarketStore for PgStore {
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

async fn insert_user(conn: &mut PgConnection, new: &NewUser) -> StoreResult<User> {
    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (
            id,
            email,
            given_names,
            paternal_surname,
            maternal_surname,
            personal_id,
            password_hash
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, email, given_names, paternal_surname, maternal_surname,
                  personal_id, password_hash, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new.email)
    .bind(&new.given_names)
    .bind(&new.paternal_surname)
    .bind(&new.maternal_surname)
    .bind(&new.personal_id)
    .bind(new.password_hash.as_ref().map(StoredHash::as_str))
    .fetch_one(&mut *conn)
    .await?;

    if let Some(student) = &new.student {
        sqlx::query(
            r#"
            INSERT INTO students (id, grade, class_group, user_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&student.id)
        .bind(&student.grade)
        .bind(&student.class_group)
        .bind(user.id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(user)
}

async fn update_user(conn: &mut PgConnection, user: &User) -> StoreResult<()> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE users
        SET email = $2,
            given_names = $3,
            paternal_surname = $4,
            maternal_surname = $5,
            personal_id = $6,
            password_hash = $7,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.given_names)
    .bind(&user.paternal_surname)
    .bind(&user.maternal_surname)
    .bind(&user.personal_id)
    .bind(user.password_hash.as_ref().map(StoredHash::as_str))
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        return Err(sqlx::Error::RowNotFound.into());
    }
    Ok(())
}

#[async_trait]
impl Repository<User> for PgStore {
    async fn create(&self, new: NewUser) -> StoreResult<User> {
        // User and student rows commit together or not at all
        let mut tx = self.pool.begin().await?;
        let user = insert_user(&mut tx, &new).await?;
        tx.commit().await?;

        tracing::debug!(user_id = %user.id, "user created");
        Ok(user)
    }

    async fn get(&self, id: &UserId) -> StoreResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        update_user(&mut conn, user).await
    }

    async fn delete(&self, id: &UserId) -> StoreResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows_affected > 0)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_student_id(&self, student_id: &str) -> StoreResult<User> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN students s ON s.user_id = u.id WHERE s.id = $1"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(student_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }
}

// =============================================================================
// Students
// =============================================================================

#[async_trait]
impl Repository<Student> for PgStore {
    async fn create(&self, student: Student) -> StoreResult<Student> {
        let created = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (id, grade, class_group, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, grade, class_group, user_id
            "#,
        )
        .bind(&student.id)
        .bind(&student.grade)
        .bind(&student.class_group)
        .bind(student.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get(&self, id: &String) -> StoreResult<Student> {
        let student = sqlx::query_as::<_, Student>(
            "SELECT id, grade, class_group, user_id FROM students WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(student)
    }

    async fn update(&self, student: &Student) -> StoreResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE students
            SET grade = $2,
                class_group = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(&student.id)
        .bind(&student.grade)
        .bind(&student.class_group)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(sqlx::Error::RowNotFound.into());
        }
        Ok(())
    }

    async fn delete(&self, id: &String) -> StoreResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows_affected > 0)
    }
}

#[async_trait]
impl StudentStore for PgStore {
    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Student> {
        let student = sqlx::query_as::<_, Student>(
            "SELECT id, grade, class_group, user_id FROM students WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(student)
    }
}

// =============================================================================
// Businesses
// =============================================================================

#[async_trait]
impl Repository<Business> for PgStore {
    async fn create(&self, new: NewBusiness) -> StoreResult<Business> {
        let business = sqlx::query_as::<_, Business>(
            r#"
            INSERT INTO businesses (id, owner_student_id, name, kind, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, owner_student_id, name, kind, description
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.owner_student_id)
        .bind(&new.name)
        .bind(&new.kind)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(business)
    }

    async fn get(&self, id: &Uuid) -> StoreResult<Business> {
        let business = sqlx::query_as::<_, Business>(
            "SELECT id, owner_student_id, name, kind, description FROM businesses WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(business)
    }

    async fn update(&self, business: &Business) -> StoreResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE businesses
            SET name = $2,
                kind = $3,
                description = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(business.id)
        .bind(&business.name)
        .bind(&business.kind)
        .bind(&business.description)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(sqlx::Error::RowNotFound.into());
        }
        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> StoreResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM businesses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows_affected > 0)
    }
}

#[async_trait]
impl BusinessStore for PgStore {
    async fn find_by_owner(&self, owner_student_id: &str) -> StoreResult<Business> {
        let business = sqlx::query_as::<_, Business>(
            r#"
            SELECT id, owner_student_id, name, kind, description
            FROM businesses
            WHERE owner_student_id = $1
            "#,
        )
        .bind(owner_student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(business)
    }
}

// =============================================================================
// Products
// =============================================================================

#[async_trait]
impl Repository<Product> for PgStore {
    async fn create(&self, new: NewProduct) -> StoreResult<Product> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, business_id, title, price_cents, stock)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, business_id, title, price_cents, stock
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.business_id)
        .bind(&new.title)
        .bind(new.price)
        .bind(new.stock)
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    async fn get(&self, id: &Uuid) -> StoreResult<Product> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, business_id, title, price_cents, stock FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    async fn update(&self, product: &Product) -> StoreResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE products
            SET title = $2,
                price_cents = $3,
                stock = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.title)
        .bind(product.price)
        .bind(product.stock)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(sqlx::Error::RowNotFound.into());
        }
        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> StoreResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows_affected > 0)
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn list_by_business(&self, business_id: Uuid) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, business_id, title, price_cents, stock
            FROM products
            WHERE business_id = $1
            ORDER BY title ASC, id ASC
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }
}

// =============================================================================
// Collaborators
// =============================================================================

/// Flat row for the collaborator listing join
#[derive(Debug, FromRow)]
struct CollaboratorRow {
    #[sqlx(flatten)]
    user: User,
    student_id: Option<String>,
    grade: Option<String>,
    class_group: Option<String>,
}

impl From<CollaboratorRow> for Collaborator {
    fn from(row: CollaboratorRow) -> Self {
        let student = row.student_id.map(|id| Student {
            id,
            grade: row.grade.unwrap_or_default(),
            class_group: row.class_group.unwrap_or_default(),
            user_id: row.user.id,
        });
        Collaborator {
            user: row.user,
            student,
        }
    }
}

#[async_trait]
impl CollaboratorStore for PgStore {
    async fn create_and_link(&self, business_id: Uuid, new: NewUser) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;
        let user = insert_user(&mut tx, &new).await?;
        sqlx::query(
            r#"
            INSERT INTO business_collaborators (business_id, collaborator_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(business_id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(business_id = %business_id, user_id = %user.id, "collaborator created");
        Ok(user)
    }

    async fn update_collaborator(
        &self,
        user: &User,
        student: Option<&Student>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        update_user(&mut tx, user).await?;

        if let Some(student) = student {
            let rows_affected = sqlx::query(
                r#"
                UPDATE students
                SET grade = $3,
                    class_group = $4,
                    updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                "#,
            )
            .bind(&student.id)
            .bind(user.id)
            .bind(&student.grade)
            .bind(&student.class_group)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if rows_affected == 0 {
                return Err(sqlx::Error::RowNotFound.into());
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn link(&self, business_id: Uuid, user_id: UserId) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO business_collaborators (business_id, collaborator_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(business_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unlink(&self, business_id: Uuid, user_id: UserId) -> StoreResult<bool> {
        let rows_affected = sqlx::query(
            "DELETE FROM business_collaborators WHERE business_id = $1 AND collaborator_id = $2",
        )
        .bind(business_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows_affected > 0)
    }

    async fn is_linked(&self, business_id: Uuid, user_id: UserId) -> StoreResult<bool> {
        let linked: Option<(bool,)> = sqlx::query_as(
            r#"
            SELECT TRUE
            FROM business_collaborators
            WHERE business_id = $1 AND collaborator_id = $2
            "#,
        )
        .bind(business_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(linked.is_some())
    }

    async fn list_collaborators(&self, business_id: Uuid) -> StoreResult<Vec<Collaborator>> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS},
                   s.id AS student_id,
                   s.grade,
                   s.class_group
            FROM business_collaborators bc
            JOIN users u ON u.id = bc.collaborator_id
            LEFT JOIN students s ON s.user_id = u.id
            WHERE bc.business_id = $1
            ORDER BY u.paternal_surname ASC, u.given_names ASC, u.id ASC
            "#
        );
        let rows = sqlx::query_as::<_, CollaboratorRow>(&sql)
            .bind(business_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Collaborator::from).collect())
    }
}

// =============================================================================
// Sessions
// =============================================================================

#[async_trait]
impl SessionStore for PgStore {
    async fn create(&self, user_id: UserId) -> StoreResult<SessionToken> {
        let token = SessionToken::generate();
        sqlx::query(
            r#"
            INSERT INTO sessions (token, user_id, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&token)
        .bind(user_id)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await?;
        Ok(token)
    }

    async fn lookup(&self, token: &SessionToken) -> StoreResult<Session> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT token, user_id, created_at FROM sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete(&self, token: &SessionToken) -> StoreResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows_affected > 0)
    }
}
