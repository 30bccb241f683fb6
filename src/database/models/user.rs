use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::Role;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    #[serde(rename = "school", skip_serializing_if = "Option::is_none")]
    pub school_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub school_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ProfileChanges {
    pub name: String,
    pub email: String,
}
