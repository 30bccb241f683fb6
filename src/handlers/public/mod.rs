// handlers/public/mod.rs - endpoints reachable without authentication
pub mod auth;
pub mod root;
pub mod user;
