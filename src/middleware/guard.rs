use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use crate::auth::{authorize, Principal, Resource};
use crate::error::ApiError;
use crate::types::Action;

/// CRUD action implied by an HTTP method
pub fn action_for(method: &Method) -> Option<Action> {
    match *method {
        Method::GET | Method::HEAD => Some(Action::Read),
        Method::POST => Some(Action::Create),
        Method::PUT | Method::PATCH => Some(Action::Update),
        Method::DELETE => Some(Action::Delete),
        _ => None,
    }
}

/// Route middleware consulting the policy table for `resource`.
///
/// Runs before the body is read, so a denied caller gets 403 whatever the
/// payload looks like. On success the granted [`Scope`](crate::auth::Scope)
/// is placed in request extensions.
pub async fn enforce(
    State(resource): State<Resource>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

    let scope = action_for(request.method())
        .and_then(|action| authorize(&principal, resource, action))
        .ok_or_else(|| {
            tracing::warn!(
                user_id = %principal.id,
                role = %principal.role,
                "Access denied: {} {:?}",
                request.method(),
                resource
            );
            ApiError::forbidden("Access denied")
        })?;

    tracing::debug!(user_id = %principal.id, ?scope, "Access granted to {:?}", resource);
    request.extensions_mut().insert(scope);
    Ok(next.run(request).await)
}
