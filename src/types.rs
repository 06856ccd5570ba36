//! Core types for worklog: reports, projects, tasks and drafts

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Profile;
use crate::error::{Result, WorklogError};

/// Unique identifier for a report (UUID v4 string)
pub type ReportId = String;

/// Mint a fresh id for reports, projects and tasks
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Clamp user-supplied hours: negative or non-finite input counts as zero
pub fn sanitize_hours(hours: f64) -> f64 {
    if hours.is_finite() && hours > 0.0 {
        hours
    } else {
        0.0
    }
}

/// Hours as they appear in report text: `2` not `2.0`, `2.5` as-is
pub fn format_hours(hours: f64) -> String {
    format!("{}", hours)
}

/// Total hours across project and general tasks. Always derived from the
/// tasks themselves, never taken from input. At most two decimals.
pub fn compute_total_hours(projects: &[Project], general_tasks: &[Task]) -> f64 {
    // fold from +0.0: an empty `Sum` yields -0.0, which renders as "-0"
    let sum: f64 = projects
        .iter()
        .flat_map(|p| &p.tasks)
        .chain(general_tasks)
        .map(|t| sanitize_hours(t.hours))
        .fold(0.0, |acc, h| acc + h);
    (sum * 100.0).round() / 100.0
}

/// DD/MM/YYYY, as shown in subject lines and report text
pub fn format_display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// DD-MM-YYYY, as embedded in canonical filenames
pub fn format_filename_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Human label for a worked window, e.g. "8h" or "7h 30min".
/// Returns `None` for unparseable times or a non-positive window.
pub fn work_window_label(time_from: &str, time_to: &str) -> Option<String> {
    let from = NaiveTime::parse_from_str(time_from, "%H:%M").ok()?;
    let to = NaiveTime::parse_from_str(time_to, "%H:%M").ok()?;
    let minutes = (to - from).num_minutes();
    if minutes <= 0 {
        return None;
    }
    let (hours, rest) = (minutes / 60, minutes % 60);
    if rest == 0 {
        Some(format!("{}h", hours))
    } else {
        Some(format!("{}h {}min", hours, rest))
    }
}

/// A single work item inside a project or the general list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Non-negative decimal; zero means "not timed"
    #[serde(default)]
    pub hours: f64,
}

impl Task {
    pub fn new(description: impl Into<String>, hours: f64) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            hours: sanitize_hours(hours),
        }
    }
}

/// A named group of tasks inside a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Sum of this project's task hours, invalid entries counting as zero
    pub fn total_hours(&self) -> f64 {
        self.tasks
            .iter()
            .map(|t| sanitize_hours(t.hours))
            .fold(0.0, |acc, h| acc + h)
    }

    /// True when the project earns a block in the rendered body:
    /// non-empty name and at least one task
    pub fn is_reportable(&self) -> bool {
        !self.name.trim().is_empty() && !self.tasks.is_empty()
    }
}

/// Pointer to the mirrored copy of a report in the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRef {
    /// Identifier the remote store answers `delete` with
    pub remote_id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub synced_at: DateTime<Utc>,
}

/// A generated daily report. `total_hours`, `subject` and `body` are
/// derived fields; [`Report::refresh`] recomputes them from the tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: ReportId,
    pub date: NaiveDate,
    #[serde(default)]
    pub location: String,
    /// Start of the work window, HH:MM
    #[serde(default)]
    pub time_from: String,
    /// End of the work window, HH:MM
    #[serde(default)]
    pub time_to: String,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub general_tasks: Vec<Task>,
    #[serde(default)]
    pub total_hours: f64,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    /// Set once the report has been uploaded
    #[serde(default)]
    pub remote: Option<RemoteRef>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Report {
    /// Recompute the derived fields from the current tasks and profile
    pub fn refresh(&mut self, profile: &Profile) {
        self.total_hours = compute_total_hours(&self.projects, &self.general_tasks);
        self.subject = profile.subject(self.date);
        let body = crate::codec::render_body(self, profile);
        self.body = body;
    }

    /// The text mirrored to the remote store and shown by `worklog show`:
    /// subject header, blank line, body
    pub fn full_text(&self) -> String {
        format!("Subject: {}\n\n{}", self.subject, self.body)
    }

    /// Case-insensitive keyword match across subject, body, location,
    /// project names and task descriptions
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        if self.body.to_lowercase().contains(&needle)
            || self.subject.to_lowercase().contains(&needle)
            || self.location.to_lowercase().contains(&needle)
        {
            return true;
        }
        let task_hit = |t: &Task| t.description.to_lowercase().contains(&needle);
        self.projects
            .iter()
            .any(|p| p.name.to_lowercase().contains(&needle) || p.tasks.iter().any(task_hit))
            || self.general_tasks.iter().any(task_hit)
    }
}

/// Mutable composition state for a report being edited.
///
/// Drafts are plain values passed to whoever needs them; generating a
/// report does not consume the draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDraft {
    /// Present when editing an already-saved report, so re-saving
    /// upserts instead of duplicating
    #[serde(default)]
    pub id: Option<ReportId>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub time_from: String,
    #[serde(default)]
    pub time_to: String,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub general_tasks: Vec<Task>,
    /// Total echoed from a parsed `Tasks Hours:` line. Display echo only;
    /// generation recomputes from the tasks.
    #[serde(default)]
    pub reported_hours: Option<f64>,
}

impl ReportDraft {
    /// Fresh draft carrying the profile's default location and work window
    pub fn with_defaults(profile: &Profile) -> Self {
        Self {
            location: profile.default_location.clone(),
            time_from: profile.default_time_from.clone(),
            time_to: profile.default_time_to.clone(),
            ..Self::default()
        }
    }

    /// Reopen a saved report for editing
    pub fn from_report(report: &Report) -> Self {
        Self {
            id: Some(report.id.clone()),
            date: Some(report.date),
            location: report.location.clone(),
            time_from: report.time_from.clone(),
            time_to: report.time_to.clone(),
            projects: report.projects.clone(),
            general_tasks: report.general_tasks.clone(),
            reported_hours: None,
        }
    }

    /// Add an empty project, returning its id
    pub fn add_project(&mut self, name: impl Into<String>) -> String {
        let project = Project::new(name);
        let id = project.id.clone();
        self.projects.push(project);
        id
    }

    pub fn remove_project(&mut self, project_id: &str) -> bool {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != project_id);
        self.projects.len() != before
    }

    pub fn rename_project(&mut self, project_id: &str, name: &str) -> bool {
        match self.project_mut(project_id) {
            Some(project) => {
                project.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Add a task to a project; returns the task id, or `None` if the
    /// project does not exist
    pub fn add_task(&mut self, project_id: &str, description: &str, hours: f64) -> Option<String> {
        let project = self.project_mut(project_id)?;
        let task = Task::new(description, hours);
        let id = task.id.clone();
        project.tasks.push(task);
        Some(id)
    }

    pub fn remove_task(&mut self, project_id: &str, task_id: &str) -> bool {
        match self.project_mut(project_id) {
            Some(project) => {
                let before = project.tasks.len();
                project.tasks.retain(|t| t.id != task_id);
                project.tasks.len() != before
            }
            None => false,
        }
    }

    pub fn set_task_description(
        &mut self,
        project_id: &str,
        task_id: &str,
        description: &str,
    ) -> bool {
        match self.task_mut(project_id, task_id) {
            Some(task) => {
                task.description = description.to_string();
                true
            }
            None => false,
        }
    }

    pub fn set_task_hours(&mut self, project_id: &str, task_id: &str, hours: f64) -> bool {
        match self.task_mut(project_id, task_id) {
            Some(task) => {
                task.hours = sanitize_hours(hours);
                true
            }
            None => false,
        }
    }

    /// Add a task outside any project, returning its id
    pub fn add_general_task(&mut self, description: &str, hours: f64) -> String {
        let task = Task::new(description, hours);
        let id = task.id.clone();
        self.general_tasks.push(task);
        id
    }

    pub fn remove_general_task(&mut self, task_id: &str) -> bool {
        let before = self.general_tasks.len();
        self.general_tasks.retain(|t| t.id != task_id);
        self.general_tasks.len() != before
    }

    /// Running total over the draft's tasks
    pub fn total_hours(&self) -> f64 {
        compute_total_hours(&self.projects, &self.general_tasks)
    }

    /// Build the immutable report. Fails with a validation error when the
    /// draft has no date; empty location or times fall back to the
    /// profile defaults.
    pub fn generate(&self, profile: &Profile) -> Result<Report> {
        let date = self.date.ok_or_else(|| {
            WorklogError::Validation("a report needs a date before it can be generated".into())
        })?;
        let now = Utc::now();
        let mut report = Report {
            id: self.id.clone().unwrap_or_else(new_id),
            date,
            location: or_default(&self.location, &profile.default_location),
            time_from: or_default(&self.time_from, &profile.default_time_from),
            time_to: or_default(&self.time_to, &profile.default_time_to),
            projects: self.projects.clone(),
            general_tasks: self.general_tasks.clone(),
            total_hours: 0.0,
            subject: String::new(),
            body: String::new(),
            remote: None,
            created_at: now,
            updated_at: now,
        };
        report.refresh(profile);
        Ok(report)
    }

    fn project_mut(&mut self, project_id: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == project_id)
    }

    fn task_mut(&mut self, project_id: &str, task_id: &str) -> Option<&mut Task> {
        self.project_mut(project_id)?
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
    }
}

fn or_default(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
