use axum::extract::{Extension, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::Scope;
use crate::database::models::ProfileChanges;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Payload};
use crate::services::NewAdmin;
use crate::validation::{Validate, ValidationErrors};

#[derive(Debug, Deserialize)]
pub struct UpdateProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl Validate for UpdateProfile {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("name", &self.name);
        errors.max_length("name", &self.name, 200);
        errors.require_text("email", &self.email);
        errors.email("email", &self.email);
        errors.finish()
    }
}

/// POST /api/user/create-admin - Provision an administrator
///
/// Superadmins may create either role for any school. Admins may only
/// create admins for their own school.
pub async fn create_admin(
    State(state): State<AppState>,
    Extension(scope): Extension<Scope>,
    Payload(body): Payload<NewAdmin>,
) -> ApiResult<Value> {
    let user = state.accounts.provision_admin(scope, body).await?;
    Ok(ApiResponse::created(json!({
        "user": user,
        "message": "Administrator created successfully",
    })))
}

/// PUT /api/user/update-profile - Change the caller's own name and email
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(scope): Extension<Scope>,
    Payload(body): Payload<UpdateProfile>,
) -> ApiResult<Value> {
    let Scope::Own(user_id) = scope else {
        return Err(ApiError::forbidden("Access denied"));
    };

    let user = state
        .store
        .update_profile(
            user_id,
            ProfileChanges {
                name: body.name.trim().to_string(),
                email: body.email.trim().to_lowercase(),
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(user_id = %user.id, "Updated profile");
    Ok(ApiResponse::success(json!({
        "user": user,
        "message": "Profile updated successfully",
    })))
}
