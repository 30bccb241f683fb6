use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;
use crate::error::ApiError;

/// GET / - Service description
pub async fn index() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "School management admin API",
        "endpoints": {
            "public": [
                "GET /",
                "GET /health",
                "POST /api/auth/login",
                "POST /api/user/create-user"
            ],
            "session": ["GET /api/auth/session", "POST /api/auth/logout"],
            "schools": "POST|GET|PUT|DELETE /api/schools",
            "classrooms": "POST|GET|PUT|DELETE /api/classrooms",
            "students": "POST|GET|PUT|DELETE /api/students",
            "users": ["POST /api/user/create-admin", "PUT /api/user/update-profile"]
        }
    }))
}

/// GET /health - Store connectivity probe
pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::service_unavailable("Store unavailable")
    })?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "status": "ok",
            "store": format!("{:?}", state.config.database.backend).to_lowercase(),
        })),
    ))
}
