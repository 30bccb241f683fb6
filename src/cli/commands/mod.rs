pub mod admin;
pub mod server;
pub mod token;
