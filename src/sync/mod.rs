//! Bidirectional report sync
//!
//! One cycle pulls remote files the local store has no date for, then
//! pushes every local report back out. All I/O is awaited sequentially.
//! One bad file never aborts a phase, but a failed pull phase
//! short-circuits the push.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::auth::CredentialProvider;
use crate::codec;
use crate::config::Profile;
use crate::error::Result;
use crate::remote::{RemoteEntry, RemoteStore};
use crate::store::LocalStore;
use crate::types::{RemoteRef, Report};

/// Download-phase counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullSummary {
    pub downloaded: usize,
    /// Date collisions and files without a canonical name
    pub skipped: usize,
    pub failed: usize,
}

/// Upload-phase counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushSummary {
    pub uploaded: usize,
    pub failed: usize,
}

/// Result of a full sync cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub pull: PullSummary,
    pub push: PushSummary,
}

/// Orchestrates the local store, the remote mirror and the credential
/// provider for one profile.
pub struct SyncEngine {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    credentials: Arc<dyn CredentialProvider>,
    profile: Profile,
}

impl SyncEngine {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        credentials: Arc<dyn CredentialProvider>,
        profile: Profile,
    ) -> Self {
        Self {
            local,
            remote,
            credentials,
            profile,
        }
    }

    /// Pull, then push. A pull-phase error (auth included) short-circuits
    /// the push.
    pub async fn sync_cycle(&self) -> Result<SyncOutcome> {
        let pull = self.pull_from_remote().await?;
        let push = self.push_to_remote().await?;
        Ok(SyncOutcome { pull, push })
    }

    /// Download remote reports the local store has no date for.
    ///
    /// Local wins on collision: a remote file whose date key matches an
    /// existing local report is skipped, as are files without a canonical
    /// filename. Per-file failures are counted and the loop continues.
    pub async fn pull_from_remote(&self) -> Result<PullSummary> {
        self.credentials.current_token()?;
        self.remote.ensure_folder().await?;

        let entries = self.remote.list().await?;
        let local_dates: HashSet<NaiveDate> = self
            .local
            .list_all()
            .await?
            .iter()
            .map(|r| r.date)
            .collect();

        let mut summary = PullSummary::default();
        for entry in &entries {
            let Some(date) = self.profile.parse_filename(&entry.filename) else {
                summary.skipped += 1;
                continue;
            };
            if local_dates.contains(&date) {
                summary.skipped += 1;
                continue;
            }
            match self.download_entry(entry).await {
                Ok(report) => {
                    info!("downloaded {} as report {}", entry.filename, report.id);
                    summary.downloaded += 1;
                }
                Err(e) => {
                    warn!("failed to download {}: {}", entry.filename, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "pull done: {} downloaded, {} skipped, {} failed",
            summary.downloaded, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    /// Serialize and upload every local report, overwriting whatever the
    /// remote holds, and stamp the remote ref locally. Per-report
    /// failures are counted and the loop continues.
    pub async fn push_to_remote(&self) -> Result<PushSummary> {
        self.credentials.current_token()?;
        self.remote.ensure_folder().await?;

        let mut summary = PushSummary::default();
        for report in self.local.list_all().await? {
            let date = report.date;
            match self.upload_report(report).await {
                Ok(_) => summary.uploaded += 1,
                Err(e) => {
                    warn!("failed to upload report for {}: {}", date, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "push done: {} uploaded, {} failed",
            summary.uploaded, summary.failed
        );
        Ok(summary)
    }

    /// Upload a single report outside a push phase: credential check,
    /// folder check, then the upload. The first error propagates.
    pub async fn upload_one(&self, report: &Report) -> Result<RemoteRef> {
        self.credentials.current_token()?;
        self.remote.ensure_folder().await?;
        self.upload_report(report.clone()).await
    }

    /// Delete a report locally and, when asked, its remote mirror.
    /// Returns whether a local row existed.
    pub async fn delete_report(&self, id: &str, purge_remote: bool) -> Result<bool> {
        if purge_remote {
            if let Some(report) = self.local.get(id).await? {
                if let Some(remote) = &report.remote {
                    self.credentials.current_token()?;
                    self.remote.delete(&remote.remote_id).await?;
                    info!("deleted remote mirror {}", remote.remote_id);
                }
            }
        }
        self.local.delete(id).await
    }

    async fn upload_report(&self, mut report: Report) -> Result<RemoteRef> {
        // derived fields are never trusted across the wire
        report.refresh(&self.profile);
        let filename = self.profile.canonical_filename(report.date);
        let entry = self.remote.put(&filename, &report.full_text()).await?;
        let remote_ref = RemoteRef {
            remote_id: entry.remote_id,
            url: entry.url,
            synced_at: Utc::now(),
        };
        self.local.set_remote_ref(&report.id, &remote_ref).await?;
        Ok(remote_ref)
    }

    async fn download_entry(&self, entry: &RemoteEntry) -> Result<Report> {
        let text = self.remote.get(&entry.filename).await?;
        let draft = codec::parse_report(&text, &entry.filename, &self.profile);
        let mut report = draft.generate(&self.profile)?;
        report.remote = Some(RemoteRef {
            remote_id: entry.remote_id.clone(),
            url: entry.url.clone(),
            synced_at: Utc::now(),
        });
        self.local.put(report).await
    }
}
