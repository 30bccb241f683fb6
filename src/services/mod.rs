pub mod accounts;
pub mod directory;

pub use accounts::{AccountError, Accounts, NewAdmin, NewMember};
