//! SQLite persistence layer.

pub mod db;
pub mod rules;
pub mod subscriptions;

pub use db::{init_database, Database};
