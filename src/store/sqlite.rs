//! SQLite-backed report store

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::LocalStore;
use crate::error::{Result, WorklogError};
use crate::types::{new_id, RemoteRef, Report};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS reports (
    id            TEXT PRIMARY KEY,
    date          TEXT NOT NULL,
    location      TEXT NOT NULL DEFAULT '',
    time_from     TEXT NOT NULL DEFAULT '',
    time_to       TEXT NOT NULL DEFAULT '',
    projects      TEXT NOT NULL DEFAULT '[]',
    general_tasks TEXT NOT NULL DEFAULT '[]',
    total_hours   REAL NOT NULL DEFAULT 0,
    subject       TEXT NOT NULL DEFAULT '',
    body          TEXT NOT NULL DEFAULT '',
    remote_id     TEXT,
    remote_url    TEXT,
    synced_at     TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_date ON reports(date);
"#;

/// Report store over a single SQLite connection. Nested task lists are
/// stored as JSON columns; dates as `YYYY-MM-DD` text so range queries
/// order correctly; timestamps as RFC3339 text.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at `path`, creating parent directories
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn put(&self, mut report: Report) -> Result<Report> {
        if report.id.trim().is_empty() {
            report.id = new_id();
        }
        let conn = self.conn.lock();
        let existing_created: Option<String> = conn
            .prepare_cached("SELECT created_at FROM reports WHERE id = ?")?
            .query_row(params![report.id], |row| row.get(0))
            .optional()?;
        if let Some(created) = existing_created.as_deref().and_then(parse_timestamp) {
            report.created_at = created;
        }
        report.updated_at = Utc::now();

        let projects = serde_json::to_string(&report.projects)?;
        let general_tasks = serde_json::to_string(&report.general_tasks)?;
        let (remote_id, remote_url, synced_at) = match &report.remote {
            Some(r) => (
                Some(r.remote_id.clone()),
                r.url.clone(),
                Some(r.synced_at.to_rfc3339()),
            ),
            None => (None, None, None),
        };

        conn.prepare_cached(
            "INSERT INTO reports (id, date, location, time_from, time_to,
                                  projects, general_tasks, total_hours, subject, body,
                                  remote_id, remote_url, synced_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(id) DO UPDATE SET
                 date = excluded.date,
                 location = excluded.location,
                 time_from = excluded.time_from,
                 time_to = excluded.time_to,
                 projects = excluded.projects,
                 general_tasks = excluded.general_tasks,
                 total_hours = excluded.total_hours,
                 subject = excluded.subject,
                 body = excluded.body,
                 remote_id = excluded.remote_id,
                 remote_url = excluded.remote_url,
                 synced_at = excluded.synced_at,
                 updated_at = excluded.updated_at",
        )?
        .execute(params![
            report.id,
            report.date.format("%Y-%m-%d").to_string(),
            report.location,
            report.time_from,
            report.time_to,
            projects,
            general_tasks,
            report.total_hours,
            report.subject,
            report.body,
            remote_id,
            remote_url,
            synced_at,
            report.created_at.to_rfc3339(),
            report.updated_at.to_rfc3339(),
        ])?;

        Ok(report)
    }

    async fn get(&self, id: &str) -> Result<Option<Report>> {
        let conn = self.conn.lock();
        let report = conn
            .prepare_cached(
                "SELECT id, date, location, time_from, time_to,
                        projects, general_tasks, total_hours, subject, body,
                        remote_id, remote_url, synced_at, created_at, updated_at
                 FROM reports WHERE id = ?",
            )?
            .query_row(params![id], report_from_row)
            .optional()?;
        Ok(report)
    }

    async fn list_all(&self) -> Result<Vec<Report>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, date, location, time_from, time_to,
                    projects, general_tasks, total_hours, subject, body,
                    remote_id, remote_url, synced_at, created_at, updated_at
             FROM reports ORDER BY date DESC, created_at DESC",
        )?;
        let rows = stmt.query_map([], report_from_row)?;
        let mut reports = Vec::new();
        for row in rows {
            reports.push(row?);
        }
        Ok(reports)
    }

    async fn date_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Report>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, date, location, time_from, time_to,
                    projects, general_tasks, total_hours, subject, body,
                    remote_id, remote_url, synced_at, created_at, updated_at
             FROM reports WHERE date >= ? AND date <= ? ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(
            params![
                from.format("%Y-%m-%d").to_string(),
                to.format("%Y-%m-%d").to_string()
            ],
            report_from_row,
        )?;
        let mut reports = Vec::new();
        for row in rows {
            reports.push(row?);
        }
        Ok(reports)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM reports WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }

    async fn set_remote_ref(&self, id: &str, remote: &RemoteRef) -> Result<()> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE reports
             SET remote_id = ?, remote_url = ?, synced_at = ?, updated_at = ?
             WHERE id = ?",
            params![
                remote.remote_id,
                remote.url,
                remote.synced_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
                id
            ],
        )?;
        if rows == 0 {
            return Err(WorklogError::Storage(format!("report not found: {}", id)));
        }
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM reports", [])?;
        Ok(rows)
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn report_from_row(row: &Row) -> rusqlite::Result<Report> {
    let date_str: String = row.get("date")?;
    let projects_str: String = row.get("projects")?;
    let general_str: String = row.get("general_tasks")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let remote_id: Option<String> = row.get("remote_id")?;
    let remote_url: Option<String> = row.get("remote_url")?;
    let synced_at: Option<String> = row.get("synced_at")?;

    // The date keys sync collision checks; a corrupt one must not be papered over
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let remote = remote_id.map(|rid| RemoteRef {
        remote_id: rid,
        url: remote_url,
        synced_at: synced_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now),
    });

    Ok(Report {
        id: row.get("id")?,
        date,
        location: row.get("location")?,
        time_from: row.get("time_from")?,
        time_to: row.get("time_to")?,
        projects: serde_json::from_str(&projects_str).unwrap_or_default(),
        general_tasks: serde_json::from_str(&general_str).unwrap_or_default(),
        total_hours: row.get("total_hours")?,
        subject: row.get("subject")?,
        body: row.get("body")?,
        remote,
        created_at: parse_timestamp(&created_at).unwrap_or_else(Utc::now),
        updated_at: parse_timestamp(&updated_at).unwrap_or_else(Utc::now),
    })
}
