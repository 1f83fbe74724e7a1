//! Command implementations.

pub mod config;
pub mod once;
pub mod serve;
