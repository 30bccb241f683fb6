use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::app::AppState;
use crate::auth::{Principal, SessionProvider};
use crate::error::ApiError;

/// Authenticates every `/api` request.
///
/// A valid bearer token wins; otherwise the session cookie is resolved
/// against the store. The resulting [`Principal`] is injected into request
/// extensions for the guard and the handlers.
pub async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = match bearer_principal(&state, request.headers()) {
        Some(principal) => principal,
        None => cookie_principal(&state, &jar).await?.ok_or_else(|| {
            tracing::warn!("Unauthenticated request to {}", request.uri().path());
            ApiError::unauthorized("Unauthorized")
        })?,
    };

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

fn bearer_principal(state: &AppState, headers: &HeaderMap) -> Option<Principal> {
    let token = extract_bearer(headers)?;
    state.tokens.verify(token).map(Principal::from)
}

async fn cookie_principal(
    state: &AppState,
    jar: &CookieJar,
) -> Result<Option<Principal>, ApiError> {
    let Some(session_id) = SessionProvider::session_id(jar) else {
        return Ok(None);
    };
    let resolved = state.sessions.resolve(session_id).await?;
    Ok(resolved.map(|(_, user)| Principal::from(&user)))
}

/// Token from an `Authorization: Bearer <token>` header
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
