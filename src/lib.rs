pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod filters;
pub mod handlers;
pub mod paths;
pub mod reports;
pub mod session;
pub mod state;
pub mod uploads;
pub mod validation;

#[cfg(test)]
pub mod testing;
