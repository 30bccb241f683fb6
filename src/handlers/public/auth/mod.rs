pub mod login;

pub use login::post as login_post;
