//! In-process store with the same constraints as the PostgreSQL schema.
//!
//! All tables sit behind one lock, so each trait call is atomic the way a
//! transaction is in the database backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{
    Classroom, ClassroomChanges, NewClassroom, NewSchool, NewStudent, NewUser, ProfileChanges,
    School, SchoolChanges, Session, Student, StudentChanges, User,
};
use super::store::{
    Store, StoreError, StoreResult, CLASSROOM_IN_USE, CLASSROOM_NAME_TAKEN, EMAIL_TAKEN,
    SCHOOL_IN_USE, SCHOOL_NAME_TAKEN, UNKNOWN_CLASSROOM, UNKNOWN_SCHOOL, USERNAME_TAKEN,
};
use crate::types::Role;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
    schools: HashMap<Uuid, School>,
    classrooms: HashMap<Uuid, Classroom>,
    students: HashMap<Uuid, Student>,
}

impl Tables {
    fn classroom_within(&self, id: Uuid, within: Option<Uuid>) -> Option<&Classroom> {
        self.classrooms
            .get(&id)
            .filter(|c| within.map_or(true, |school| c.school_id == school))
    }

    fn student_school(&self, student: &Student) -> Option<Uuid> {
        self.classrooms.get(&student.classroom_id).map(|c| c.school_id)
    }

    fn student_within(&self, id: Uuid, within: Option<Uuid>) -> bool {
        match (self.students.get(&id), within) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(student), Some(school)) => self.student_school(student) == Some(school),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn close(&self) {}

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict(EMAIL_TAKEN.to_string()));
        }
        match new.school_id {
            Some(school) if !tables.schools.contains_key(&school) => {
                return Err(StoreError::invalid("school", UNKNOWN_SCHOOL));
            }
            None if new.role.requires_school() => {
                return Err(StoreError::invalid("school", "Required for this role"));
            }
            _ => {}
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            school_id: new.school_id,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Ok(None);
        }
        if tables.users.values().any(|u| u.id != id && u.email == changes.email) {
            return Err(StoreError::Conflict(EMAIL_TAKEN.to_string()));
        }

        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("user {} vanished", id)))?;
        user.name = changes.name;
        user.email = changes.email;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn list_admins(&self, school: Option<Uuid>) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut admins: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.role == Role::Admin)
            .filter(|u| school.map_or(true, |s| u.school_id == Some(s)))
            .cloned()
            .collect();
        admins.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(admins)
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::invalid("user", "User does not exist"));
        }
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
            expires_at,
        };
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.sessions.remove(&id).is_some())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn list_schools(&self) -> StoreResult<Vec<School>> {
        let tables = self.tables.read().await;
        let mut schools: Vec<School> = tables.schools.values().cloned().collect();
        schools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(schools)
    }

    async fn find_school(&self, id: Uuid) -> StoreResult<Option<School>> {
        Ok(self.tables.read().await.schools.get(&id).cloned())
    }

    async fn find_school_by_name(&self, name: &str) -> StoreResult<Option<School>> {
        let tables = self.tables.read().await;
        Ok(tables.schools.values().find(|s| s.name == name).cloned())
    }

    async fn create_school(&self, new: NewSchool) -> StoreResult<School> {
        let mut tables = self.tables.write().await;
        if tables.schools.values().any(|s| s.name == new.name) {
            return Err(StoreError::Conflict(SCHOOL_NAME_TAKEN.to_string()));
        }

        let now = Utc::now();
        let school = School {
            id: Uuid::new_v4(),
            name: new.name,
            location: new.location,
            created_at: now,
            updated_at: now,
        };
        tables.schools.insert(school.id, school.clone());
        Ok(school)
    }

    async fn update_school(&self, id: Uuid, changes: SchoolChanges) -> StoreResult<Option<School>> {
        let mut tables = self.tables.write().await;
        if !tables.schools.contains_key(&id) {
            return Ok(None);
        }
        if tables.schools.values().any(|s| s.id != id && s.name == changes.name) {
            return Err(StoreError::Conflict(SCHOOL_NAME_TAKEN.to_string()));
        }

        let school = tables
            .schools
            .get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("school {} vanished", id)))?;
        school.name = changes.name;
        school.location = changes.location;
        school.updated_at = Utc::now();
        Ok(Some(school.clone()))
    }

    async fn delete_school(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.schools.contains_key(&id) {
            return Ok(false);
        }
        let dependents = tables.classrooms.values().any(|c| c.school_id == id)
            || tables.users.values().any(|u| u.school_id == Some(id));
        if dependents {
            return Err(StoreError::InUse(SCHOOL_IN_USE.to_string()));
        }
        tables.schools.remove(&id);
        Ok(true)
    }

    async fn list_classrooms(&self, school: Option<Uuid>) -> StoreResult<Vec<Classroom>> {
        let tables = self.tables.read().await;
        let mut classrooms: Vec<Classroom> = tables
            .classrooms
            .values()
            .filter(|c| school.map_or(true, |s| c.school_id == s))
            .cloned()
            .collect();
        classrooms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(classrooms)
    }

    async fn find_classroom(&self, id: Uuid) -> StoreResult<Option<Classroom>> {
        Ok(self.tables.read().await.classrooms.get(&id).cloned())
    }

    async fn create_classroom(&self, new: NewClassroom) -> StoreResult<Classroom> {
        let mut tables = self.tables.write().await;
        if !tables.schools.contains_key(&new.school_id) {
            return Err(StoreError::invalid("school", UNKNOWN_SCHOOL));
        }
        if tables
            .classrooms
            .values()
            .any(|c| c.school_id == new.school_id && c.name == new.name)
        {
            return Err(StoreError::Conflict(CLASSROOM_NAME_TAKEN.to_string()));
        }

        let now = Utc::now();
        let classroom = Classroom {
            id: Uuid::new_v4(),
            name: new.name,
            vacancy: new.vacancy,
            school_id: new.school_id,
            created_at: now,
            updated_at: now,
        };
        tables.classrooms.insert(classroom.id, classroom.clone());
        Ok(classroom)
    }

    async fn update_classroom(
        &self,
        id: Uuid,
        within: Option<Uuid>,
        changes: ClassroomChanges,
    ) -> StoreResult<Option<Classroom>> {
        let mut tables = self.tables.write().await;
        let Some(school_id) = tables.classroom_within(id, within).map(|c| c.school_id) else {
            return Ok(None);
        };
        if tables
            .classrooms
            .values()
            .any(|c| c.id != id && c.school_id == school_id && c.name == changes.name)
        {
            return Err(StoreError::Conflict(CLASSROOM_NAME_TAKEN.to_string()));
        }

        let classroom = tables
            .classrooms
            .get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("classroom {} vanished", id)))?;
        classroom.name = changes.name;
        classroom.vacancy = changes.vacancy;
        classroom.updated_at = Utc::now();
        Ok(Some(classroom.clone()))
    }

    async fn delete_classroom(&self, id: Uuid, within: Option<Uuid>) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.classroom_within(id, within).is_none() {
            return Ok(false);
        }
        if tables.students.values().any(|s| s.classroom_id == id) {
            return Err(StoreError::InUse(CLASSROOM_IN_USE.to_string()));
        }
        tables.classrooms.remove(&id);
        Ok(true)
    }

    async fn list_students(&self, school: Option<Uuid>) -> StoreResult<Vec<Student>> {
        let tables = self.tables.read().await;
        let mut students: Vec<Student> = tables
            .students
            .values()
            .filter(|s| school.map_or(true, |school| tables.student_school(s) == Some(school)))
            .cloned()
            .collect();
        students.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(students)
    }

    async fn find_student(&self, id: Uuid) -> StoreResult<Option<Student>> {
        Ok(self.tables.read().await.students.get(&id).cloned())
    }

    async fn create_student(&self, new: NewStudent, within: Option<Uuid>) -> StoreResult<Student> {
        let mut tables = self.tables.write().await;
        if tables.classroom_within(new.classroom_id, within).is_none() {
            return Err(StoreError::invalid("classroom", UNKNOWN_CLASSROOM));
        }
        if tables.students.values().any(|s| s.username == new.username) {
            return Err(StoreError::Conflict(USERNAME_TAKEN.to_string()));
        }

        let now = Utc::now();
        let student = Student {
            id: Uuid::new_v4(),
            username: new.username,
            classroom_id: new.classroom_id,
            created_at: now,
            updated_at: now,
        };
        tables.students.insert(student.id, student.clone());
        Ok(student)
    }

    async fn update_student(
        &self,
        id: Uuid,
        within: Option<Uuid>,
        changes: StudentChanges,
    ) -> StoreResult<Option<Student>> {
        let mut tables = self.tables.write().await;
        if !tables.student_within(id, within) {
            return Ok(None);
        }
        if tables.classroom_within(changes.classroom_id, within).is_none() {
            return Err(StoreError::invalid("classroom", UNKNOWN_CLASSROOM));
        }
        if tables
            .students
            .values()
            .any(|s| s.id != id && s.username == changes.username)
        {
            return Err(StoreError::Conflict(USERNAME_TAKEN.to_string()));
        }

        let student = tables
            .students
            .get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("student {} vanished", id)))?;
        student.username = changes.username;
        student.classroom_id = changes.classroom_id;
        student.updated_at = Utc::now();
        Ok(Some(student.clone()))
    }

    async fn delete_student(&self, id: Uuid, within: Option<Uuid>) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.student_within(id, within) {
            return Ok(false);
        }
        Ok(tables.students.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn school(store: &MemoryStore, name: &str) -> School {
        store
            .create_school(NewSchool {
                name: name.to_string(),
                location: "Springfield".to_string(),
            })
            .await
            .unwrap()
    }

    async fn classroom(store: &MemoryStore, school: Uuid, name: &str) -> Classroom {
        store
            .create_classroom(NewClassroom {
                name: name.to_string(),
                vacancy: 30,
                school_id: school,
            })
            .await
            .unwrap()
    }

    async fn student(store: &MemoryStore, classroom: Uuid, username: &str) -> Student {
        store
            .create_student(
                NewStudent {
                    username: username.to_string(),
                    classroom_id: classroom,
                },
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn school_names_are_unique() {
        let store = MemoryStore::new();
        school(&store, "North High").await;
        let err = store
            .create_school(NewSchool {
                name: "North High".to_string(),
                location: "Elsewhere".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.list_schools().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn classroom_names_are_unique_per_school() {
        let store = MemoryStore::new();
        let north = school(&store, "North High").await;
        let south = school(&store, "South High").await;
        classroom(&store, north.id, "7A").await;
        classroom(&store, south.id, "7A").await;

        let err = store
            .create_classroom(NewClassroom {
                name: "7A".to_string(),
                vacancy: 10,
                school_id: north.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.list_classrooms(Some(north.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn classroom_requires_existing_school() {
        let store = MemoryStore::new();
        let err = store
            .create_classroom(NewClassroom {
                name: "7A".to_string(),
                vacancy: 10,
                school_id: Uuid::new_v4(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid { ref field, .. } if field == "school"));
    }

    #[tokio::test]
    async fn student_outside_scope_is_rejected() {
        let store = MemoryStore::new();
        let north = school(&store, "North High").await;
        let south = school(&store, "South High").await;
        let room = classroom(&store, south.id, "7A").await;

        let err = store
            .create_student(
                NewStudent {
                    username: "ada".to_string(),
                    classroom_id: room.id,
                },
                Some(north.id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid { ref field, .. } if field == "classroom"));
        assert!(store.list_students(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn students_are_listed_by_school() {
        let store = MemoryStore::new();
        let north = school(&store, "North High").await;
        let south = school(&store, "South High").await;
        let north_room = classroom(&store, north.id, "7A").await;
        let south_room = classroom(&store, south.id, "7B").await;
        student(&store, north_room.id, "ada").await;
        student(&store, south_room.id, "grace").await;

        let scoped = store.list_students(Some(north.id)).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].username, "ada");
        assert_eq!(store.list_students(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn scoped_mutations_ignore_foreign_records() {
        let store = MemoryStore::new();
        let north = school(&store, "North High").await;
        let south = school(&store, "South High").await;
        let room = classroom(&store, south.id, "7A").await;
        let pupil = student(&store, room.id, "ada").await;

        assert!(!store.delete_student(pupil.id, Some(north.id)).await.unwrap());
        assert!(!store.delete_classroom(room.id, Some(north.id)).await.unwrap());
        let renamed = store
            .update_classroom(
                room.id,
                Some(north.id),
                ClassroomChanges {
                    name: "8A".to_string(),
                    vacancy: 1,
                },
            )
            .await
            .unwrap();
        assert!(renamed.is_none());
        assert!(store.find_student(pupil.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn parents_with_dependents_cannot_be_deleted() {
        let store = MemoryStore::new();
        let north = school(&store, "North High").await;
        let room = classroom(&store, north.id, "7A").await;
        let pupil = student(&store, room.id, "ada").await;

        assert!(matches!(store.delete_school(north.id).await, Err(StoreError::InUse(_))));
        assert!(matches!(store.delete_classroom(room.id, None).await, Err(StoreError::InUse(_))));

        assert!(store.delete_student(pupil.id, None).await.unwrap());
        assert!(store.delete_classroom(room.id, None).await.unwrap());
        assert!(store.delete_school(north.id).await.unwrap());
    }

    #[tokio::test]
    async fn reassignment_checks_target_classroom() {
        let store = MemoryStore::new();
        let north = school(&store, "North High").await;
        let south = school(&store, "South High").await;
        let home = classroom(&store, north.id, "7A").await;
        let away = classroom(&store, south.id, "7B").await;
        let pupil = student(&store, home.id, "ada").await;

        let err = store
            .update_student(
                pupil.id,
                Some(north.id),
                StudentChanges {
                    username: "ada".to_string(),
                    classroom_id: away.id,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));
        assert_eq!(store.find_student(pupil.id).await.unwrap().unwrap().classroom_id, home.id);
    }

    #[tokio::test]
    async fn expired_sessions_are_purged() {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                name: "Root".to_string(),
                email: "root@sms.local".to_string(),
                password_hash: "x".to_string(),
                role: Role::Superadmin,
                school_id: None,
            })
            .await
            .unwrap();
        let now = Utc::now();
        let stale = store.create_session(user.id, now - chrono::Duration::hours(1)).await.unwrap();
        let fresh = store.create_session(user.id, now + chrono::Duration::days(30)).await.unwrap();

        assert_eq!(store.purge_expired_sessions(now).await.unwrap(), 1);
        assert!(store.find_session(stale.id).await.unwrap().is_none());
        assert!(store.find_session(fresh.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn admins_need_a_school() {
        let store = MemoryStore::new();
        let err = store
            .create_user(NewUser {
                name: "Ann".to_string(),
                email: "ann@north.edu".to_string(),
                password_hash: "x".to_string(),
                role: Role::Admin,
                school_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));
    }
}
