// handlers/mod.rs - two security tiers
//
// Public (no auth): service info, health, login
// Protected (bearer token or session cookie): everything under /api
pub mod protected;
pub mod public;
