//! MongoDB backup/restore orchestration
//!
//! Drives `mongodump`/`mongorestore`, packages dumps into `.tar.gz` archives,
//! classifies diagnostics in the tools' output and prunes old archives.

pub mod backup;
pub mod config;
pub mod errors;
pub mod models;
pub mod restore;
pub mod retention;
pub mod runner;
pub mod utils;
pub mod worker;

#[cfg(test)]
mod test_support;
