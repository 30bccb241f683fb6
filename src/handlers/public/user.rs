use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, Payload};
use crate::services::NewMember;

/// POST /api/user/create-user - Register a plain user account
///
/// Input: `{"email", "username", "password", "school"}` where `school` is the
/// id of an existing school. The account always gets the `user` role.
pub async fn create_user(
    State(state): State<AppState>,
    Payload(body): Payload<NewMember>,
) -> ApiResult<Value> {
    let user = state.accounts.register_user(body).await?;
    Ok(ApiResponse::created(json!({
        "user": user,
        "message": "User created successfully",
    })))
}
