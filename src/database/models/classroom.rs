use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Classroom {
    pub id: Uuid,
    pub name: String,
    pub vacancy: i32,
    /// Fixed at creation
    #[serde(rename = "school")]
    pub school_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewClassroom {
    pub name: String,
    pub vacancy: i32,
    pub school_id: Uuid,
}

/// Mutable classroom fields; the owning school is not among them
#[derive(Debug, Clone)]
pub struct ClassroomChanges {
    pub name: String,
    pub vacancy: i32,
}
