// handlers/public/auth/login.rs - POST /api/auth/login

use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, Payload};
use crate::validation::{Validate, ValidationErrors};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("email", &self.email);
        errors.email("email", &self.email);
        errors.require_text("password", &self.password);
        errors.finish()
    }
}

/**
 * POST /api/auth/login - Exchange credentials for a session and a bearer token
 *
 * Input: `{"email": "...", "password": "..."}`
 *
 * Output: `{"success": true, "user": {...}, "accessToken": "...", "expires": "..."}`
 * plus a `Set-Cookie` for the session. `expires` is the session expiry.
 */
pub async fn post(
    State(state): State<AppState>,
    jar: CookieJar,
    Payload(body): Payload<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    let email = body.email.trim().to_lowercase();
    let signed = state.sessions.sign_in(&email, &body.password).await?;

    let jar = jar.add(state.sessions.cookie(&signed.session));
    let data = json!({
        "user": signed.user,
        "accessToken": signed.access_token,
        "expires": signed.session.expires_at,
    });
    Ok((jar, ApiResponse::success(data)))
}
