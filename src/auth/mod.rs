//! Accounts, sessions and role-based access.

pub mod db;
pub mod handlers;
pub mod middleware;
pub mod password;

pub use handlers::*;
pub use middleware::AuthContext;
