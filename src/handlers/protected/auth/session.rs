use axum::extract::{Extension, State};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::{authorize, Principal, Resource, SessionProvider};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::types::Action;

/// GET /api/auth/session - Current user with a freshly minted bearer token
///
/// Claims come from the stored user, so a renamed or re-scoped account gets
/// an up-to-date token. `expires` is the session expiry when the request
/// carries a session cookie, otherwise the new token's expiry.
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    jar: CookieJar,
) -> ApiResult<Value> {
    authorize(&principal, Resource::Session, Action::Read)
        .ok_or_else(|| ApiError::forbidden("Access denied"))?;

    let user = state
        .store
        .find_user(principal.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
    let access_token = state.sessions.issue_token(&Principal::from(&user))?;

    let session = match SessionProvider::session_id(&jar) {
        Some(id) => state.sessions.resolve(id).await?,
        None => None,
    };
    let expires = match session {
        Some((session, _)) if session.user_id == user.id => session.expires_at,
        _ => Utc::now() + state.tokens.default_ttl(),
    };

    Ok(ApiResponse::success(json!({
        "user": user,
        "accessToken": access_token,
        "expires": expires,
    })))
}
