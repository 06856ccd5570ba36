//! Drive-folder backend for the remote store

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{RemoteEntry, RemoteStore};
use crate::auth::CredentialProvider;
use crate::error::{Result, WorklogError};

/// Remote store over a reports folder on a mounted drive (OneDrive,
/// Dropbox, a synced network share). The drive client owns transport;
/// this adapter owns layout and credential gating.
pub struct DriveFolderStore {
    folder: PathBuf,
    credentials: Arc<dyn CredentialProvider>,
}

impl DriveFolderStore {
    pub fn new(
        drive_root: impl Into<PathBuf>,
        folder_name: &str,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            folder: drive_root.into().join(folder_name),
            credentials,
        }
    }

    /// The folder this store mirrors into
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Filenames must stay inside the reports folder
    fn entry_path(&self, filename: &str) -> Result<PathBuf> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return Err(WorklogError::Remote(format!(
                "invalid remote filename: {:?}",
                filename
            )));
        }
        Ok(self.folder.join(filename))
    }

    fn entry(&self, filename: String) -> RemoteEntry {
        let url = format!("file://{}", self.folder.join(&filename).display());
        RemoteEntry {
            remote_id: filename.clone(),
            filename,
            url: Some(url),
        }
    }
}

#[async_trait]
impl RemoteStore for DriveFolderStore {
    async fn ensure_folder(&self) -> Result<()> {
        self.credentials.current_token()?;
        tokio::fs::create_dir_all(&self.folder).await.map_err(|e| {
            WorklogError::Remote(format!("creating {}: {}", self.folder.display(), e))
        })?;
        Ok(())
    }

    async fn put(&self, filename: &str, content: &str) -> Result<RemoteEntry> {
        self.credentials.current_token()?;
        let path = self.entry_path(filename)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| WorklogError::Remote(format!("writing {}: {}", path.display(), e)))?;
        debug!("uploaded {} ({} bytes)", filename, content.len());
        Ok(self.entry(filename.to_string()))
    }

    async fn get(&self, filename: &str) -> Result<String> {
        self.credentials.current_token()?;
        let path = self.entry_path(filename)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| WorklogError::Remote(format!("reading {}: {}", path.display(), e)))
    }

    async fn list(&self) -> Result<Vec<RemoteEntry>> {
        self.credentials.current_token()?;
        let mut dir = match tokio::fs::read_dir(&self.folder).await {
            Ok(dir) => dir,
            // a folder nobody has pushed to yet lists as empty
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(WorklogError::Remote(format!(
                    "listing {}: {}",
                    self.folder.display(),
                    e
                )))
            }
        };

        let mut entries = Vec::new();
        loop {
            let item = dir.next_entry().await.map_err(|e| {
                WorklogError::Remote(format!("listing {}: {}", self.folder.display(), e))
            })?;
            let Some(item) = item else { break };
            let is_file = item
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            entries.push(self.entry(item.file_name().to_string_lossy().into_owned()));
        }
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(entries)
    }

    async fn delete(&self, remote_id: &str) -> Result<()> {
        self.credentials.current_token()?;
        let path = self.entry_path(remote_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // already gone counts as deleted
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WorklogError::Remote(format!(
                "deleting {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
