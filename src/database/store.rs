//! Persistence seam shared by the PostgreSQL and in-memory backends.
//!
//! Every composite write is one call here, so the backend can run it inside a
//! single transaction (or a single lock scope). Parent/child links live only on
//! the child (`classroom.school_id`, `student.classroom_id`,
//! `user.school_id`); the sets a parent exposes are derived by listing.
//!
//! Scoped mutations take `within: Option<Uuid>`, a school id. A record outside
//! that school behaves exactly like a missing record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::models::{
    Classroom, ClassroomChanges, NewClassroom, NewSchool, NewStudent, NewUser, ProfileChanges,
    School, SchoolChanges, Session, Student, StudentChanges, User,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint would be violated
    #[error("{0}")]
    Conflict(String),

    /// Dependents still reference the record
    #[error("{0}")]
    InUse(String),

    /// A referenced record is missing or out of scope
    #[error("{field}: {message}")]
    Invalid { field: String, message: String },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        StoreError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// Messages shared by both backends so clients see identical errors
pub(crate) const EMAIL_TAKEN: &str = "User with this email already exists";
pub(crate) const SCHOOL_NAME_TAKEN: &str = "School with this name already exists";
pub(crate) const CLASSROOM_NAME_TAKEN: &str =
    "Classroom with this name already exists in the school";
pub(crate) const USERNAME_TAKEN: &str = "Student with this username already exists";
pub(crate) const SCHOOL_IN_USE: &str = "School still has classrooms or administrators";
pub(crate) const CLASSROOM_IN_USE: &str = "Classroom still has students";
pub(crate) const UNKNOWN_SCHOOL: &str = "School does not exist";
pub(crate) const UNKNOWN_CLASSROOM: &str = "Classroom does not exist in your school";

#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round trip proving the backend is reachable
    async fn health_check(&self) -> StoreResult<()>;

    /// Release backend resources on shutdown
    async fn close(&self);

    // Users

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Conflict on a taken email, Invalid when the school does not exist
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<Option<User>>;

    /// Admin accounts, optionally restricted to one school
    async fn list_admins(&self, school: Option<Uuid>) -> StoreResult<Vec<User>>;

    // Sessions

    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session>;

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<Session>>;

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool>;

    /// Remove every session expired at `now`; returns how many went
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    // Schools

    async fn list_schools(&self) -> StoreResult<Vec<School>>;

    async fn find_school(&self, id: Uuid) -> StoreResult<Option<School>>;

    async fn find_school_by_name(&self, name: &str) -> StoreResult<Option<School>>;

    async fn create_school(&self, new: NewSchool) -> StoreResult<School>;

    async fn update_school(&self, id: Uuid, changes: SchoolChanges) -> StoreResult<Option<School>>;

    /// InUse while classrooms or users still belong to the school
    async fn delete_school(&self, id: Uuid) -> StoreResult<bool>;

    // Classrooms

    async fn list_classrooms(&self, school: Option<Uuid>) -> StoreResult<Vec<Classroom>>;

    async fn find_classroom(&self, id: Uuid) -> StoreResult<Option<Classroom>>;

    /// Conflict on a duplicate name within the school, Invalid when the school does not exist
    async fn create_classroom(&self, new: NewClassroom) -> StoreResult<Classroom>;

    async fn update_classroom(
        &self,
        id: Uuid,
        within: Option<Uuid>,
        changes: ClassroomChanges,
    ) -> StoreResult<Option<Classroom>>;

    /// InUse while students are still enrolled
    async fn delete_classroom(&self, id: Uuid, within: Option<Uuid>) -> StoreResult<bool>;

    // Students

    /// Students whose classroom belongs to `school`, or all of them
    async fn list_students(&self, school: Option<Uuid>) -> StoreResult<Vec<Student>>;

    async fn find_student(&self, id: Uuid) -> StoreResult<Option<Student>>;

    /// The classroom must exist and sit inside `within`, else Invalid on `classroom`
    async fn create_student(&self, new: NewStudent, within: Option<Uuid>) -> StoreResult<Student>;

    async fn update_student(
        &self,
        id: Uuid,
        within: Option<Uuid>,
        changes: StudentChanges,
    ) -> StoreResult<Option<Student>>;

    async fn delete_student(&self, id: Uuid, within: Option<Uuid>) -> StoreResult<bool>;
}
