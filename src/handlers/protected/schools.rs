use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{NewSchool, School, SchoolChanges};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Payload};
use crate::services::directory;
use crate::validation::{Validate, ValidationErrors};

const NAME_MAX: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CreateSchool {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
}

impl Validate for CreateSchool {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("name", &self.name);
        errors.max_length("name", &self.name, NAME_MAX);
        errors.require_text("location", &self.location);
        errors.max_length("location", &self.location, NAME_MAX);
        errors.finish()
    }
}

/// Without `id` the school is looked up by `name` and only its location
/// changes; with `id` the name may change too.
#[derive(Debug, Deserialize)]
pub struct UpdateSchool {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
}

impl Validate for UpdateSchool {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("name", &self.name);
        errors.max_length("name", &self.name, NAME_MAX);
        errors.require_text("location", &self.location);
        errors.max_length("location", &self.location, NAME_MAX);
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteSchool {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Validate for DeleteSchool {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let named = self.name.as_deref().map_or(false, |n| !n.trim().is_empty());
        if self.id.is_none() && !named {
            errors.add("name", "Provide either id or name");
        }
        errors.finish()
    }
}

fn not_found() -> ApiError {
    ApiError::not_found("School not found")
}

async fn locate(state: &AppState, id: Option<Uuid>, name: &str) -> Result<School, ApiError> {
    let found = match id {
        Some(id) => state.store.find_school(id).await?,
        None => state.store.find_school_by_name(name.trim()).await?,
    };
    found.ok_or_else(not_found)
}

/// POST /api/schools - Create a school
pub async fn post(
    State(state): State<AppState>,
    Payload(body): Payload<CreateSchool>,
) -> ApiResult<Value> {
    let school = state
        .store
        .create_school(NewSchool {
            name: body.name.trim().to_string(),
            location: body.location.trim().to_string(),
        })
        .await?;

    tracing::info!(school_id = %school.id, "Created school {}", school.name);
    Ok(ApiResponse::created(json!({
        "school": school,
        "message": "School created successfully",
    })))
}

/// GET /api/schools - All schools with classrooms, students and admins resolved
pub async fn get(State(state): State<AppState>) -> ApiResult<Value> {
    let schools = directory::schools(state.store.as_ref()).await?;
    Ok(ApiResponse::success(json!({ "schools": schools })))
}

/// PUT /api/schools - Update a school by id, or its location by name
pub async fn put(
    State(state): State<AppState>,
    Payload(body): Payload<UpdateSchool>,
) -> ApiResult<Value> {
    let target = locate(&state, body.id, &body.name).await?;
    let name = match body.id {
        Some(_) => body.name.trim().to_string(),
        None => target.name,
    };

    let school = state
        .store
        .update_school(
            target.id,
            SchoolChanges {
                name,
                location: body.location.trim().to_string(),
            },
        )
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::success(json!({
        "school": school,
        "message": "School updated successfully",
    })))
}

/// DELETE /api/schools - Delete a school that no longer has classrooms or admins
pub async fn delete(
    State(state): State<AppState>,
    Payload(body): Payload<DeleteSchool>,
) -> ApiResult<Value> {
    let target = locate(&state, body.id, body.name.as_deref().unwrap_or_default()).await?;
    if !state.store.delete_school(target.id).await? {
        return Err(not_found());
    }

    tracing::info!(school_id = %target.id, "Deleted school {}", target.name);
    Ok(ApiResponse::success(json!({ "message": "School deleted successfully" })))
}
