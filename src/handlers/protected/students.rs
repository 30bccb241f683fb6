use axum::extract::{Extension, State};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::within_school;
use crate::app::AppState;
use crate::auth::Scope;
use crate::database::models::{NewStudent, StudentChanges};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Payload};
use crate::services::directory;
use crate::validation::{Validate, ValidationErrors};

fn check_username(errors: &mut ValidationErrors, username: &str) {
    errors.require_text("username", username);
    errors.max_length("username", username, 100);
}

#[derive(Debug, Deserialize)]
pub struct CreateStudent {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub classroom: Option<Uuid>,
}

impl Validate for CreateStudent {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_username(&mut errors, &self.username);
        errors.require_some("classroom", &self.classroom);
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStudent {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub classroom: Option<Uuid>,
}

impl Validate for UpdateStudent {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_some("id", &self.id);
        check_username(&mut errors, &self.username);
        errors.require_some("classroom", &self.classroom);
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteStudent {
    #[serde(default)]
    pub id: Option<Uuid>,
}

impl Validate for DeleteStudent {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_some("id", &self.id);
        errors.finish()
    }
}

fn not_found() -> ApiError {
    ApiError::not_found("Student not found")
}

fn required(field: &'static str, value: Option<Uuid>) -> Result<Uuid, ApiError> {
    value.ok_or_else(|| ApiError::field_error(field, "Required"))
}

/// POST /api/students - Enrol a student in one of the caller's classrooms
pub async fn post(
    State(state): State<AppState>,
    Extension(scope): Extension<Scope>,
    Payload(body): Payload<CreateStudent>,
) -> ApiResult<Value> {
    let student = state
        .store
        .create_student(
            NewStudent {
                username: body.username.trim().to_string(),
                classroom_id: required("classroom", body.classroom)?,
            },
            within_school(scope)?,
        )
        .await?;

    tracing::info!(
        student_id = %student.id,
        classroom_id = %student.classroom_id,
        "Created student"
    );
    Ok(ApiResponse::created(json!({
        "student": student,
        "message": "Student created successfully",
    })))
}

/// GET /api/students - Students whose classroom belongs to the caller's school (all for superadmin)
pub async fn get(
    State(state): State<AppState>,
    Extension(scope): Extension<Scope>,
) -> ApiResult<Value> {
    let students = directory::students(state.store.as_ref(), within_school(scope)?).await?;
    Ok(ApiResponse::success(json!({ "students": students })))
}

/// PUT /api/students - Rename or reassign a student
pub async fn put(
    State(state): State<AppState>,
    Extension(scope): Extension<Scope>,
    Payload(body): Payload<UpdateStudent>,
) -> ApiResult<Value> {
    let student = state
        .store
        .update_student(
            required("id", body.id)?,
            within_school(scope)?,
            StudentChanges {
                username: body.username.trim().to_string(),
                classroom_id: required("classroom", body.classroom)?,
            },
        )
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::success(json!({
        "student": student,
        "message": "Student updated successfully",
    })))
}

/// DELETE /api/students - Remove a student
pub async fn delete(
    State(state): State<AppState>,
    Extension(scope): Extension<Scope>,
    Payload(body): Payload<DeleteStudent>,
) -> ApiResult<Value> {
    let id = required("id", body.id)?;
    if !state.store.delete_student(id, within_school(scope)?).await? {
        return Err(not_found());
    }

    tracing::info!(student_id = %id, "Deleted student");
    Ok(ApiResponse::success(json!({ "message": "Student deleted successfully" })))
}
