//! Worklog - Daily work report composer
//!
//! Structured daily reports with a canonical plain-text rendering,
//! local SQLite persistence, and folder-based drive sync.

pub mod auth;
pub mod backup;
pub mod codec;
pub mod config;
pub mod error;
pub mod remote;
pub mod store;
pub mod sync;
pub mod types;

pub use config::{Config, Profile};
pub use error::{Result, WorklogError};
pub use store::{LocalStore, SqliteStore};
pub use sync::SyncEngine;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
