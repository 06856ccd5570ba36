//! Remote report mirror
//!
//! [`RemoteStore`] is the file-per-report seam the sync engine pushes to
//! and pulls from: one folder, one text file per report. Every operation
//! requires a valid credential and surfaces an auth error without one.

mod drive;

pub use drive::DriveFolderStore;

use async_trait::async_trait;

use crate::error::Result;

/// One file in the remote reports folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub filename: String,
    /// Identifier accepted by [`RemoteStore::delete`]
    pub remote_id: String,
    pub url: Option<String>,
}

/// File-per-report remote seam. Implementations authenticate every call
/// and never retry internally.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create the reports folder if missing. Idempotent.
    async fn ensure_folder(&self) -> Result<()>;

    /// Create or replace `filename` with `content`
    async fn put(&self, filename: &str, content: &str) -> Result<RemoteEntry>;

    /// Full text of `filename`
    async fn get(&self, filename: &str) -> Result<String>;

    /// Every regular file in the folder, canonical or not
    async fn list(&self) -> Result<Vec<RemoteEntry>>;

    /// Delete by remote id. Deleting something already gone succeeds.
    async fn delete(&self, remote_id: &str) -> Result<()>;
}
