use axum::extract::{Extension, State};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::{authorize, Principal, Resource, SessionProvider};
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::types::Action;

/// POST /api/auth/logout - Drop the server-side session and clear the cookie
///
/// Only a session owned by the authenticated caller is deleted. Bearer
/// tokens stay valid until they expire.
pub async fn post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    authorize(&principal, Resource::Session, Action::Delete)
        .ok_or_else(|| ApiError::forbidden("Access denied"))?;

    let session = match SessionProvider::session_id(&jar) {
        Some(id) => state.sessions.resolve(id).await?,
        None => None,
    };
    match session {
        Some((session, _)) if session.user_id == principal.id => {
            if state.sessions.sign_out(session.id).await? {
                tracing::info!(user_id = %principal.id, "Signed out");
            }
        }
        Some((session, _)) => {
            tracing::warn!(
                user_id = %principal.id,
                session_user_id = %session.user_id,
                "Logout cookie belongs to another user; session kept"
            );
        }
        None => {}
    }

    let jar = jar.add(state.sessions.removal_cookie());
    Ok((jar, ApiResponse::success(json!({ "message": "Signed out" }))))
}
