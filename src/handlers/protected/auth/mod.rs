pub mod logout;
pub mod session;

pub use logout::post as logout_post;
pub use session::get as session_get;
