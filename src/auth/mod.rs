pub mod password;
pub mod policy;
pub mod session;
pub mod token;

use uuid::Uuid;

use crate::database::models::User;
use crate::types::Role;

pub use password::{hash_password, verify_password, PasswordError};
pub use policy::{authorize, Resource, Scope};
pub use session::{SessionProvider, SignIn, SESSION_COOKIE};
pub use token::{Claims, TokenError, TokenService};

/// Authenticated identity attached to every `/api` request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub school: Option<Uuid>,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            role: claims.role,
            school: claims.school,
        }
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            school: user.school_id,
        }
    }
}
