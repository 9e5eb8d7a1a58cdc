//! Shared library surface for flywatch server utilities and tests.

pub mod api;
pub mod cache;
pub mod checker;
pub mod config;
pub mod forecast;
pub mod persistence;
pub mod push;
pub mod state;
