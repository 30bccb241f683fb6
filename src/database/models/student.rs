use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Student {
    pub id: Uuid,
    pub username: String,
    #[serde(rename = "classroom")]
    pub classroom_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub username: String,
    pub classroom_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct StudentChanges {
    pub username: String,
    pub classroom_id: Uuid,
}
