//! Local report storage
//!
//! [`LocalStore`] is the seam the sync engine and CLI work against.
//! [`SqliteStore`] is the shipped implementation; queries run synchronously
//! under its connection lock, the async signatures exist for the seam.

mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{Result, WorklogError};
use crate::types::{compute_total_hours, RemoteRef, Report};

/// Aggregate numbers over stored reports
#[derive(Debug, Clone, Default)]
pub struct ReportStats {
    pub report_count: usize,
    pub total_hours: f64,
    /// Hours per project name
    pub project_hours: HashMap<String, f64>,
    /// Reports per location
    pub location_counts: HashMap<String, i64>,
}

/// Persistence seam for reports
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Upsert by id. An empty id gets a fresh one minted; `created_at`
    /// survives re-saves; `updated_at` is stamped. Returns the stored row.
    async fn put(&self, report: Report) -> Result<Report>;

    async fn get(&self, id: &str) -> Result<Option<Report>>;

    /// Every report, newest date first
    async fn list_all(&self) -> Result<Vec<Report>>;

    /// Reports with `from <= date <= to`, ascending
    async fn date_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Report>>;

    /// Remove a report; `true` when a row existed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Stamp the remote mirror pointer on an existing report
    async fn set_remote_ref(&self, id: &str, remote: &RemoteRef) -> Result<()>;

    /// Remove everything; returns the number of rows dropped
    async fn clear(&self) -> Result<usize>;

    /// Case-insensitive keyword scan over subject, body, location and tasks
    async fn search(&self, keyword: &str) -> Result<Vec<Report>> {
        let mut reports = self.list_all().await?;
        reports.retain(|r| r.matches_keyword(keyword));
        Ok(reports)
    }

    /// Reports within one calendar month, ascending
    async fn month(&self, year: i32, month: u32) -> Result<Vec<Report>> {
        let (from, to) = month_bounds(year, month)?;
        self.date_range(from, to).await
    }

    async fn stats(&self) -> Result<ReportStats> {
        Ok(collect_stats(&self.list_all().await?))
    }
}

/// First and last day of a calendar month
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || WorklogError::Validation(format!("invalid month: {}-{:02}", year, month));
    let from = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let to = next_first.and_then(|d| d.pred_opt()).ok_or_else(invalid)?;
    Ok((from, to))
}

/// Build stats from a report slice. Totals are recomputed from the tasks,
/// not read from the stored `total_hours`.
pub fn collect_stats(reports: &[Report]) -> ReportStats {
    let mut stats = ReportStats {
        report_count: reports.len(),
        ..ReportStats::default()
    };
    let mut total = 0.0;
    for report in reports {
        total += compute_total_hours(&report.projects, &report.general_tasks);
        for project in &report.projects {
            let name = project.name.trim();
            if name.is_empty() {
                continue;
            }
            *stats.project_hours.entry(name.to_string()).or_insert(0.0) +=
                project.total_hours();
        }
        let hours: f64 = report
            .general_tasks
            .iter()
            .map(|t| crate::types::sanitize_hours(t.hours))
            .sum();
        if hours > 0.0 {
            *stats.project_hours.entry("General".to_string()).or_insert(0.0) += hours;
        }
        if !report.location.trim().is_empty() {
            *stats.location_counts.entry(report.location.clone()).or_insert(0) += 1;
        }
    }
    stats.total_hours = (total * 100.0).round() / 100.0;
    stats
}
