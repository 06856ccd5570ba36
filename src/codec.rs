//! Canonical plain-text codec for reports
//!
//! [`render_body`] produces the email-style body text; [`parse_report`] is
//! the best-effort inverse used when files come back from the remote store.
//! Parsing never fails: unrecognized structure degrades to profile defaults
//! and the degradation is logged at debug level.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::Profile;
use crate::types::{format_hours, sanitize_hours, Project, Report, ReportDraft, Task};

/// `Today, I worked from <location> from <HH:MM> to <HH:MM>.`
static WORK_LINE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"worked from (\w+) from (\d{2}:\d{2}) to (\d{2}:\d{2})").unwrap());

/// `Tasks Hours: <N>h` summary line
static TOTAL_LINE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Tasks Hours: (\d+(?:\.\d+)?)h").unwrap());

/// Trailing ` [<N>h]` on a bullet
static HOUR_SUFFIX_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[(\d+(?:\.\d+)?)h\]$").unwrap());

/// Marker line separating project blocks from the general-task block
const GENERAL_TASKS_HEADER: &str = "General Tasks:";

/// Render the canonical body: greeting, work summary, total line, one block
/// per reportable project, the general block, closing signature.
pub fn render_body(report: &Report, profile: &Profile) -> String {
    let mut body = String::new();
    body.push_str(&profile.greeting());
    body.push_str("\n\n");
    body.push_str(&format!(
        "Today, I worked from {} from {} to {}.\n\n",
        report.location, report.time_from, report.time_to
    ));
    body.push_str(&format!(
        "Tasks Hours: {}h\n\n",
        format_hours(report.total_hours)
    ));

    for project in report.projects.iter().filter(|p| p.is_reportable()) {
        body.push_str(&format!("{}:\n", project.name));
        for task in named_tasks(&project.tasks) {
            body.push_str(&bullet_line(task));
        }
        body.push('\n');
    }

    let general: Vec<&Task> = named_tasks(&report.general_tasks).collect();
    if !general.is_empty() {
        body.push_str(GENERAL_TASKS_HEADER);
        body.push('\n');
        for task in general {
            body.push_str(&bullet_line(task));
        }
        body.push('\n');
    }

    body.push_str(&profile.signature());
    body
}

fn named_tasks(tasks: &[Task]) -> impl Iterator<Item = &Task> {
    tasks.iter().filter(|t| !t.description.trim().is_empty())
}

fn bullet_line(task: &Task) -> String {
    let hours = sanitize_hours(task.hours);
    if hours > 0.0 {
        format!("   • {} [{}h]\n", task.description, format_hours(hours))
    } else {
        format!("   • {}\n", task.description)
    }
}

/// Best-effort parse of report text (typically a remote blob with a
/// `Subject:` header) back into a draft.
///
/// The date comes from the filename; the work window from the summary
/// sentence, falling back to the profile defaults; structure from project
/// header lines (trimmed line ending in `:`), bullets and the
/// `General Tasks:` marker. Bullets appearing before any project header
/// degrade to general tasks. The `Tasks Hours:` line is only echoed into
/// `reported_hours`; generation recomputes the real total.
pub fn parse_report(text: &str, filename: &str, profile: &Profile) -> ReportDraft {
    let mut draft = ReportDraft::with_defaults(profile);

    draft.date = profile.parse_filename(filename);
    if draft.date.is_none() {
        debug!("no canonical date in filename {}", filename);
    }

    match WORK_LINE_PATTERN.captures(text) {
        Some(caps) => {
            draft.location = caps[1].to_string();
            draft.time_from = caps[2].to_string();
            draft.time_to = caps[3].to_string();
        }
        None => debug!(
            "work summary line missing in {}, keeping profile defaults",
            filename
        ),
    }

    draft.reported_hours = TOTAL_LINE_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok());

    let mut in_general = false;
    let mut current: Option<usize> = None;
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if line == GENERAL_TASKS_HEADER {
            in_general = true;
            current = None;
            continue;
        }
        if let Some(rest) = line.strip_prefix('•') {
            let content = rest.trim();
            if content.is_empty() {
                continue;
            }
            let (description, hours) = split_hour_suffix(content);
            let task = Task::new(description, hours);
            match current {
                Some(index) if !in_general => draft.projects[index].tasks.push(task),
                _ => {
                    if !in_general {
                        debug!(
                            "bullet before any project header in {}, treating as general task",
                            filename
                        );
                    }
                    draft.general_tasks.push(task);
                }
            }
            continue;
        }
        if let Some(name) = project_header(line) {
            draft.projects.push(Project::new(name));
            current = Some(draft.projects.len() - 1);
            in_general = false;
            continue;
        }
        // Anything else is prose: greeting, work summary, totals, signature.
    }

    if let Some(reported) = draft.reported_hours {
        let computed = draft.total_hours();
        if (computed - reported).abs() > 1e-9 {
            debug!(
                "summary line in {} says {}h but tasks add up to {}h",
                filename, reported, computed
            );
        }
    }

    draft
}

/// A trimmed non-bullet line ending in `:` opens a project block
fn project_header(line: &str) -> Option<&str> {
    let name = line.strip_suffix(':')?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn split_hour_suffix(content: &str) -> (String, f64) {
    match HOUR_SUFFIX_PATTERN.captures(content) {
        Some(caps) => {
            let hours = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .map(sanitize_hours)
                .unwrap_or(0.0);
            let description = match caps.get(0) {
                Some(m) => content[..m.start()].trim_end(),
                None => content,
            };
            (description.to_string(), hours)
        }
        None => (content.to_string(), 0.0),
    }
}
