pub mod auth;
pub mod guard;
pub mod payload;
pub mod response;

pub use auth::{authenticate, extract_bearer};
pub use guard::{action_for, enforce};
pub use payload::Payload;
pub use response::{envelope, ApiResponse, ApiResult};
