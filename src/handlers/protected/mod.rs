// handlers/protected/mod.rs - endpoints behind `authenticate`
//
// Entity routes additionally pass through `enforce(resource)`, which places
// the granted Scope in request extensions before the body is read.
pub mod auth;
pub mod classrooms;
pub mod schools;
pub mod students;
pub mod user;

use uuid::Uuid;

use crate::auth::Scope;
use crate::error::ApiError;

/// School restriction to hand to the store for a school-level grant
pub(crate) fn within_school(scope: Scope) -> Result<Option<Uuid>, ApiError> {
    scope
        .school_bound()
        .ok_or_else(|| ApiError::forbidden("Access denied"))
}
