use axum::extract::{Extension, State};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::within_school;
use crate::app::AppState;
use crate::auth::Scope;
use crate::database::models::{ClassroomChanges, NewClassroom};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Payload};
use crate::services::directory;
use crate::validation::{Validate, ValidationErrors};

fn check_name(errors: &mut ValidationErrors, name: &str) {
    errors.require_text("name", name);
    errors.max_length("name", name, 100);
}

fn check_vacancy(errors: &mut ValidationErrors, vacancy: Option<i64>) {
    match vacancy {
        None => errors.add("vacancy", "Required"),
        Some(v) if v < 0 => errors.add("vacancy", "Must be greater than or equal to 0"),
        Some(v) if v > i32::MAX as i64 => errors.add("vacancy", "Too large"),
        Some(_) => {}
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateClassroom {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vacancy: Option<i64>,
    /// Defaults to the caller's school
    #[serde(default)]
    pub school: Option<Uuid>,
}

impl Validate for CreateClassroom {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &self.name);
        check_vacancy(&mut errors, self.vacancy);
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateClassroom {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vacancy: Option<i64>,
}

impl Validate for UpdateClassroom {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_some("id", &self.id);
        check_name(&mut errors, &self.name);
        check_vacancy(&mut errors, self.vacancy);
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteClassroom {
    #[serde(default)]
    pub id: Option<Uuid>,
}

impl Validate for DeleteClassroom {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_some("id", &self.id);
        errors.finish()
    }
}

fn not_found() -> ApiError {
    ApiError::not_found("Classroom not found")
}

// Validation guarantees presence and range before these are called
fn required_id(id: Option<Uuid>) -> Result<Uuid, ApiError> {
    id.ok_or_else(|| ApiError::field_error("id", "Required"))
}

fn vacancy(value: Option<i64>) -> Result<i32, ApiError> {
    value
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| ApiError::field_error("vacancy", "Required"))
}

/// POST /api/classrooms - Create a classroom in the caller's school
pub async fn post(
    State(state): State<AppState>,
    Extension(scope): Extension<Scope>,
    Payload(body): Payload<CreateClassroom>,
) -> ApiResult<Value> {
    let school_id = match (scope, body.school) {
        (_, Some(requested)) if scope.covers_school(requested) => requested,
        (Scope::School(own), None) => own,
        (Scope::All, None) => return Err(ApiError::field_error("school", "Required")),
        _ => return Err(ApiError::forbidden("Access denied")),
    };

    let classroom = state
        .store
        .create_classroom(NewClassroom {
            name: body.name.trim().to_string(),
            vacancy: vacancy(body.vacancy)?,
            school_id,
        })
        .await?;

    tracing::info!(
        classroom_id = %classroom.id,
        school_id = %school_id,
        "Created classroom {}",
        classroom.name
    );
    Ok(ApiResponse::created(json!({
        "classroom": classroom,
        "message": "Classroom created successfully",
    })))
}

/// GET /api/classrooms - Classrooms visible to the caller, with school and students
pub async fn get(
    State(state): State<AppState>,
    Extension(scope): Extension<Scope>,
) -> ApiResult<Value> {
    let classrooms = directory::classrooms(state.store.as_ref(), within_school(scope)?).await?;
    Ok(ApiResponse::success(json!({ "classrooms": classrooms })))
}

/// PUT /api/classrooms - Rename a classroom or change its vacancy
pub async fn put(
    State(state): State<AppState>,
    Extension(scope): Extension<Scope>,
    Payload(body): Payload<UpdateClassroom>,
) -> ApiResult<Value> {
    let classroom = state
        .store
        .update_classroom(
            required_id(body.id)?,
            within_school(scope)?,
            ClassroomChanges {
                name: body.name.trim().to_string(),
                vacancy: vacancy(body.vacancy)?,
            },
        )
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::success(json!({
        "classroom": classroom,
        "message": "Classroom updated successfully",
    })))
}

/// DELETE /api/classrooms - Delete an empty classroom
pub async fn delete(
    State(state): State<AppState>,
    Extension(scope): Extension<Scope>,
    Payload(body): Payload<DeleteClassroom>,
) -> ApiResult<Value> {
    let id = required_id(body.id)?;
    if !state.store.delete_classroom(id, within_school(scope)?).await? {
        return Err(not_found());
    }

    tracing::info!(classroom_id = %id, "Deleted classroom");
    Ok(ApiResponse::success(json!({ "message": "Classroom deleted successfully" })))
}
