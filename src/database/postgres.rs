use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::manager::DatabaseManager;
use super::models::{
    Classroom, ClassroomChanges, NewClassroom, NewSchool, NewStudent, NewUser, ProfileChanges,
    School, SchoolChanges, Session, Student, StudentChanges, User,
};
use super::store::{
    Store, StoreError, StoreResult, CLASSROOM_IN_USE, CLASSROOM_NAME_TAKEN, EMAIL_TAKEN,
    SCHOOL_IN_USE, SCHOOL_NAME_TAKEN, UNKNOWN_CLASSROOM, UNKNOWN_SCHOOL, USERNAME_TAKEN,
};
use crate::types::Role;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, school_id, created_at, updated_at";
const SCHOOL_COLUMNS: &str = "id, name, location, created_at, updated_at";
const CLASSROOM_COLUMNS: &str = "id, name, vacancy, school_id, created_at, updated_at";
const STUDENT_COLUMNS: &str = "id, username, classroom_id, created_at, updated_at";

/// Row type for user queries; the role column is plain text
#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    school_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> StoreResult<User> {
        let role: Role = self
            .role
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("user {}: {}", self.id, e)))?;
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            role,
            school_id: self.school_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Translate constraint violations into domain errors; anything else stays a sqlx error
fn classify(err: sqlx::Error, conflict: &str, missing: Option<(&str, &str)>) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(conflict.to_string());
        }
        if db_err.is_foreign_key_violation() {
            if let Some((field, message)) = missing {
                return StoreError::invalid(field, message);
            }
        }
    }
    StoreError::Sqlx(err)
}

fn in_use(err: sqlx::Error, message: &str) -> StoreError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_foreign_key_violation() => StoreError::InUse(message.to_string()),
        _ => StoreError::Sqlx(err),
    }
}

/// PostgreSQL-backed store
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

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        DatabaseManager::ping(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Closed database pool");
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(UserRow::try_into_user).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        row.map(UserRow::try_into_user).transpose()
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, school_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(new.school_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, EMAIL_TAKEN, Some(("school", UNKNOWN_SCHOOL))))?;
        row.try_into_user()
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users SET name = $2, email = $3, updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, EMAIL_TAKEN, None))?;
        row.map(UserRow::try_into_user).transpose()
    }

    async fn list_admins(&self, school: Option<Uuid>) -> StoreResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM users
            WHERE role = 'admin' AND ($1::uuid IS NULL OR school_id = $1)
            ORDER BY created_at, id
            "#,
            USER_COLUMNS
        ))
        .bind(school)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(UserRow::try_into_user).collect()
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let session: Session = sqlx::query_as(
            r#"
            INSERT INTO sessions (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, created_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<Session>> {
        let session: Option<Session> =
            sqlx::query_as("SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(session)
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_schools(&self) -> StoreResult<Vec<School>> {
        let schools: Vec<School> =
            sqlx::query_as(&format!("SELECT {} FROM schools ORDER BY name", SCHOOL_COLUMNS))
                .fetch_all(&self.pool)
                .await?;
        Ok(schools)
    }

    async fn find_school(&self, id: Uuid) -> StoreResult<Option<School>> {
        let school: Option<School> =
            sqlx::query_as(&format!("SELECT {} FROM schools WHERE id = $1", SCHOOL_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(school)
    }

    async fn find_school_by_name(&self, name: &str) -> StoreResult<Option<School>> {
        let school: Option<School> =
            sqlx::query_as(&format!("SELECT {} FROM schools WHERE name = $1", SCHOOL_COLUMNS))
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(school)
    }

    async fn create_school(&self, new: NewSchool) -> StoreResult<School> {
        let school: School = sqlx::query_as(&format!(
            "INSERT INTO schools (id, name, location) VALUES ($1, $2, $3) RETURNING {}",
            SCHOOL_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.location)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, SCHOOL_NAME_TAKEN, None))?;
        Ok(school)
    }

    async fn update_school(&self, id: Uuid, changes: SchoolChanges) -> StoreResult<Option<School>> {
        let school: Option<School> = sqlx::query_as(&format!(
            r#"
            UPDATE schools SET name = $2, location = $3, updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            SCHOOL_COLUMNS
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.location)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, SCHOOL_NAME_TAKEN, None))?;
        Ok(school)
    }

    async fn delete_school(&self, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM schools WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let (dependents,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (SELECT 1 FROM classrooms WHERE school_id = $1)
                OR EXISTS (SELECT 1 FROM users WHERE school_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if dependents {
            return Err(StoreError::InUse(SCHOOL_IN_USE.to_string()));
        }

        sqlx::query("DELETE FROM schools WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| in_use(e, SCHOOL_IN_USE))?;
        tx.commit().await?;
        Ok(true)
    }

    async fn list_classrooms(&self, school: Option<Uuid>) -> StoreResult<Vec<Classroom>> {
        let classrooms: Vec<Classroom> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM classrooms
            WHERE $1::uuid IS NULL OR school_id = $1
            ORDER BY name, id
            "#,
            CLASSROOM_COLUMNS
        ))
        .bind(school)
        .fetch_all(&self.pool)
        .await?;
        Ok(classrooms)
    }

    async fn find_classroom(&self, id: Uuid) -> StoreResult<Option<Classroom>> {
        let classroom: Option<Classroom> =
            sqlx::query_as(&format!("SELECT {} FROM classrooms WHERE id = $1", CLASSROOM_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(classroom)
    }

    async fn create_classroom(&self, new: NewClassroom) -> StoreResult<Classroom> {
        let classroom: Classroom = sqlx::query_as(&format!(
            r#"
            INSERT INTO classrooms (id, name, vacancy, school_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            CLASSROOM_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(new.vacancy)
        .bind(new.school_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, CLASSROOM_NAME_TAKEN, Some(("school", UNKNOWN_SCHOOL))))?;
        Ok(classroom)
    }

    async fn update_classroom(
        &self,
        id: Uuid,
        within: Option<Uuid>,
        changes: ClassroomChanges,
    ) -> StoreResult<Option<Classroom>> {
        let classroom: Option<Classroom> = sqlx::query_as(&format!(
            r#"
            UPDATE classrooms SET name = $3, vacancy = $4, updated_at = now()
            WHERE id = $1 AND ($2::uuid IS NULL OR school_id = $2)
            RETURNING {}
            "#,
            CLASSROOM_COLUMNS
        ))
        .bind(id)
        .bind(within)
        .bind(&changes.name)
        .bind(changes.vacancy)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, CLASSROOM_NAME_TAKEN, None))?;
        Ok(classroom)
    }

    async fn delete_classroom(&self, id: Uuid, within: Option<Uuid>) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM classrooms WHERE id = $1 AND ($2::uuid IS NULL OR school_id = $2) FOR UPDATE",
        )
        .bind(id)
        .bind(within)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let (enrolled,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM students WHERE classroom_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if enrolled {
            return Err(StoreError::InUse(CLASSROOM_IN_USE.to_string()));
        }

        sqlx::query("DELETE FROM classrooms WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| in_use(e, CLASSROOM_IN_USE))?;
        tx.commit().await?;
        Ok(true)
    }

    async fn list_students(&self, school: Option<Uuid>) -> StoreResult<Vec<Student>> {
        let students: Vec<Student> = sqlx::query_as(
            r#"
            SELECT s.id, s.username, s.classroom_id, s.created_at, s.updated_at
            FROM students s
            JOIN classrooms c ON c.id = s.classroom_id
            WHERE $1::uuid IS NULL OR c.school_id = $1
            ORDER BY s.username
            "#,
        )
        .bind(school)
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    async fn find_student(&self, id: Uuid) -> StoreResult<Option<Student>> {
        let student: Option<Student> =
            sqlx::query_as(&format!("SELECT {} FROM students WHERE id = $1", STUDENT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(student)
    }

    async fn create_student(&self, new: NewStudent, within: Option<Uuid>) -> StoreResult<Student> {
        let mut tx = self.pool.begin().await?;

        let classroom: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM classrooms WHERE id = $1 AND ($2::uuid IS NULL OR school_id = $2) FOR SHARE",
        )
        .bind(new.classroom_id)
        .bind(within)
        .fetch_optional(&mut *tx)
        .await?;
        if classroom.is_none() {
            return Err(StoreError::invalid("classroom", UNKNOWN_CLASSROOM));
        }

        let student: Student = sqlx::query_as(&format!(
            "INSERT INTO students (id, username, classroom_id) VALUES ($1, $2, $3) RETURNING {}",
            STUDENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(new.classroom_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify(e, USERNAME_TAKEN, Some(("classroom", UNKNOWN_CLASSROOM))))?;

        tx.commit().await?;
        Ok(student)
    }

    async fn update_student(
        &self,
        id: Uuid,
        within: Option<Uuid>,
        changes: StudentChanges,
    ) -> StoreResult<Option<Student>> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT s.id FROM students s
            JOIN classrooms c ON c.id = s.classroom_id
            WHERE s.id = $1 AND ($2::uuid IS NULL OR c.school_id = $2)
            FOR UPDATE OF s
            "#,
        )
        .bind(id)
        .bind(within)
        .fetch_optional(&mut *tx)
        .await?;
        if current.is_none() {
            return Ok(None);
        }

        let target: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM classrooms WHERE id = $1 AND ($2::uuid IS NULL OR school_id = $2) FOR SHARE",
        )
        .bind(changes.classroom_id)
        .bind(within)
        .fetch_optional(&mut *tx)
        .await?;
        if target.is_none() {
            return Err(StoreError::invalid("classroom", UNKNOWN_CLASSROOM));
        }

        let student: Student = sqlx::query_as(&format!(
            r#"
            UPDATE students SET username = $2, classroom_id = $3, updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            STUDENT_COLUMNS
        ))
        .bind(id)
        .bind(&changes.username)
        .bind(changes.classroom_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify(e, USERNAME_TAKEN, Some(("classroom", UNKNOWN_CLASSROOM))))?;

        tx.commit().await?;
        Ok(Some(student))
    }

    async fn delete_student(&self, id: Uuid, within: Option<Uuid>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM students s
            USING classrooms c
            WHERE s.id = $1 AND c.id = s.classroom_id AND ($2::uuid IS NULL OR c.school_id = $2)
            "#,
        )
        .bind(id)
        .bind(within)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
