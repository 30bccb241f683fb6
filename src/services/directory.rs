//! Read models with references resolved for list endpoints.
//!
//! Parents never store child ids; these views rebuild the nested sets from the
//! child records at read time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::models::{Classroom, School, Student, User};
use crate::database::{Store, StoreResult};

#[derive(Debug, Clone, Serialize)]
pub struct ClassroomWithStudents {
    #[serde(flatten)]
    pub classroom: Classroom,
    pub students: Vec<Student>,
}

/// `GET /api/schools` item
#[derive(Debug, Clone, Serialize)]
pub struct SchoolView {
    #[serde(flatten)]
    pub school: School,
    pub classrooms: Vec<ClassroomWithStudents>,
    pub admins: Vec<User>,
}

/// `GET /api/classrooms` item
#[derive(Debug, Clone, Serialize)]
pub struct ClassroomView {
    pub id: Uuid,
    pub name: String,
    pub vacancy: i32,
    pub school: Option<School>,
    pub students: Vec<Student>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassroomSummary {
    pub id: Uuid,
    pub name: String,
    pub vacancy: i32,
    pub school: Option<School>,
}

/// `GET /api/students` item
#[derive(Debug, Clone, Serialize)]
pub struct StudentView {
    pub id: Uuid,
    pub username: String,
    pub classroom: Option<ClassroomSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn students_by_classroom(students: Vec<Student>) -> HashMap<Uuid, Vec<Student>> {
    let mut grouped: HashMap<Uuid, Vec<Student>> = HashMap::new();
    for student in students {
        grouped.entry(student.classroom_id).or_default().push(student);
    }
    grouped
}

/// Every school with its classrooms (and their students) and admins
pub async fn schools(store: &dyn Store) -> StoreResult<Vec<SchoolView>> {
    let (schools, classrooms, students, admins) = futures::try_join!(
        store.list_schools(),
        store.list_classrooms(None),
        store.list_students(None),
        store.list_admins(None)
    )?;

    let mut enrolled = students_by_classroom(students);
    let mut rooms: HashMap<Uuid, Vec<ClassroomWithStudents>> = HashMap::new();
    for classroom in classrooms {
        let students = enrolled.remove(&classroom.id).unwrap_or_default();
        rooms
            .entry(classroom.school_id)
            .or_default()
            .push(ClassroomWithStudents { classroom, students });
    }
    let mut staff: HashMap<Uuid, Vec<User>> = HashMap::new();
    for admin in admins {
        if let Some(school) = admin.school_id {
            staff.entry(school).or_default().push(admin);
        }
    }

    Ok(schools
        .into_iter()
        .map(|school| SchoolView {
            classrooms: rooms.remove(&school.id).unwrap_or_default(),
            admins: staff.remove(&school.id).unwrap_or_default(),
            school,
        })
        .collect())
}

/// Classrooms in `school` (or all) with owning school and students resolved
pub async fn classrooms(
    store: &dyn Store,
    school: Option<Uuid>,
) -> StoreResult<Vec<ClassroomView>> {
    let (classrooms, students, schools) = futures::try_join!(
        store.list_classrooms(school),
        store.list_students(school),
        store.list_schools()
    )?;

    let mut enrolled = students_by_classroom(students);
    let schools: HashMap<Uuid, School> = schools.into_iter().map(|s| (s.id, s)).collect();

    Ok(classrooms
        .into_iter()
        .map(|c| ClassroomView {
            students: enrolled.remove(&c.id).unwrap_or_default(),
            school: schools.get(&c.school_id).cloned(),
            id: c.id,
            name: c.name,
            vacancy: c.vacancy,
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect())
}

/// Students in `school` (or all) with classroom and its school resolved
pub async fn students(store: &dyn Store, school: Option<Uuid>) -> StoreResult<Vec<StudentView>> {
    let (students, classrooms, schools) = futures::try_join!(
        store.list_students(school),
        store.list_classrooms(school),
        store.list_schools()
    )?;

    let schools: HashMap<Uuid, School> = schools.into_iter().map(|s| (s.id, s)).collect();
    let classrooms: HashMap<Uuid, ClassroomSummary> = classrooms
        .into_iter()
        .map(|c| {
            let summary = ClassroomSummary {
                id: c.id,
                name: c.name,
                vacancy: c.vacancy,
                school: schools.get(&c.school_id).cloned(),
            };
            (c.id, summary)
        })
        .collect();

    Ok(students
        .into_iter()
        .map(|s| StudentView {
            classroom: classrooms.get(&s.classroom_id).cloned(),
            id: s.id,
            username: s.username,
            created_at: s.created_at,
            updated_at: s.updated_at,
        })
        .collect())
}
