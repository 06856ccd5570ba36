//! Bulk JSON export and import

use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::store::LocalStore;
use crate::types::Report;

/// Import counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Serialize every stored report to a pretty-printed JSON array, newest
/// first.
pub async fn export_json(store: &dyn LocalStore) -> Result<String> {
    let reports = store.list_all().await?;
    Ok(serde_json::to_string_pretty(&reports)?)
}

/// Import reports from a JSON array produced by [`export_json`].
///
/// Entries that do not decode as a report are skipped with a warning;
/// decoded reports upsert by id, so importing the same dump twice leaves
/// one copy of each report.
pub async fn import_json(store: &dyn LocalStore, json: &str) -> Result<ImportSummary> {
    let entries: Vec<Value> = serde_json::from_str(json)?;
    let mut summary = ImportSummary::default();
    for entry in entries {
        match serde_json::from_value::<Report>(entry) {
            Ok(report) => {
                store.put(report).await?;
                summary.imported += 1;
            }
            Err(e) => {
                warn!("skipping malformed report entry: {}", e);
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}
