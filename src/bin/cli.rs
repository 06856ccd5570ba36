//! Worklog CLI
//!
//! Command-line interface for composing, storing and syncing daily
//! work reports.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use worklog::auth::{AccessToken, StaticTokenProvider};
use worklog::backup;
use worklog::config::Config;
use worklog::error::{Result, WorklogError};
use worklog::remote::DriveFolderStore;
use worklog::store::{LocalStore, ReportStats, SqliteStore};
use worklog::sync::{PullSummary, PushSummary, SyncEngine};
use worklog::types::{
    format_display_date, format_hours, work_window_label, Report, ReportDraft,
};

#[derive(Parser)]
#[command(name = "worklog")]
#[command(about = "Daily work report composer")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, env = "WORKLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Database path (overrides the config)
    #[arg(long, env = "WORKLOG_DB_PATH")]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Compose and save a report
    New {
        /// Report date (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Work location
        #[arg(short, long)]
        location: Option<String>,
        /// Start of the work window (HH:MM)
        #[arg(long)]
        from: Option<String>,
        /// End of the work window (HH:MM)
        #[arg(long)]
        to: Option<String>,
        /// Project task as PROJECT/DESCRIPTION[/HOURS], repeatable
        #[arg(short, long)]
        task: Vec<String>,
        /// General task as DESCRIPTION[/HOURS], repeatable
        #[arg(short, long)]
        general: Vec<String>,
        /// Replace an existing report for the same date
        #[arg(long)]
        replace: bool,
        /// Upload the saved report right away
        #[arg(long)]
        sync: bool,
        /// Print the rendered text after saving
        #[arg(short, long)]
        print: bool,
    },
    /// Print a report's rendered text
    Show {
        /// Report date (YYYY-MM-DD)
        date: NaiveDate,
        /// Print the stored JSON instead
        #[arg(long)]
        json: bool,
    },
    /// List stored reports
    List {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Calendar month (YYYY-MM)
        #[arg(short, long, conflicts_with_all = ["from", "to"])]
        month: Option<String>,
    },
    /// Search reports by keyword
    Search {
        /// Case-insensitive keyword
        keyword: String,
    },
    /// Show aggregate statistics
    Stats,
    /// Delete a report
    Delete {
        /// Report date (YYYY-MM-DD)
        date: NaiveDate,
        /// Also delete the remote mirror
        #[arg(long)]
        remote: bool,
    },
    /// Pull missing reports, then push everything
    Sync,
    /// Download remote reports missing locally
    Pull,
    /// Upload every local report
    Push,
    /// Dump all reports as JSON
    Export {
        /// Output file (- for stdout)
        #[arg(short, long, default_value = "-")]
        output: String,
    },
    /// Load reports from a JSON dump
    Import {
        /// Input file
        file: PathBuf,
    },
    /// Delete every local report
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone();
    let config = Config::load(config_path.as_deref())?;

    if let Commands::Init { force } = &cli.command {
        let path = match config_path {
            Some(p) => p,
            None => Config::default_path()?,
        };
        if path.exists() && !*force {
            return Err(WorklogError::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        Config::default().save(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let db_path = match &cli.db_path {
        Some(p) => PathBuf::from(shellexpand::tilde(p).into_owned()),
        None => config.expanded_database_path(),
    };
    let store = Arc::new(SqliteStore::open(&db_path)?);

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),

        Commands::New {
            date,
            location,
            from,
            to,
            task,
            general,
            replace,
            sync,
            print,
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let mut draft = ReportDraft::with_defaults(&config.profile);
            draft.date = Some(date);
            if let Some(location) = location {
                draft.location = location;
            }
            if let Some(from) = from {
                draft.time_from = from;
            }
            if let Some(to) = to {
                draft.time_to = to;
            }

            if let Some(existing) = find_by_date(store.as_ref(), date).await? {
                if !replace {
                    return Err(WorklogError::Validation(format!(
                        "a report for {} already exists (use --replace to overwrite it)",
                        format_display_date(date)
                    )));
                }
                draft.id = Some(existing.id);
            }

            for raw in &task {
                let (project, description, hours) = parse_task_arg(raw)?;
                let project_id = match draft.projects.iter().find(|p| p.name == project) {
                    Some(p) => p.id.clone(),
                    None => draft.add_project(project),
                };
                draft.add_task(&project_id, &description, hours);
            }
            for raw in &general {
                let (description, hours) = parse_general_arg(raw)?;
                draft.add_general_task(&description, hours);
            }

            let report = draft.generate(&config.profile)?;
            let saved = store.put(report).await?;
            println!(
                "Saved report for {} ({}h, {})",
                format_display_date(saved.date),
                format_hours(saved.total_hours),
                format_window(&saved)
            );
            if print {
                println!("\n{}", saved.full_text());
            }
            if sync {
                let engine = build_engine(&config, store.clone());
                let remote_ref = with_auth_hint(engine.upload_one(&saved).await)?;
                println!(
                    "Uploaded {}",
                    config.profile.canonical_filename(saved.date)
                );
                if let Some(url) = remote_ref.url {
                    println!("  {}", url);
                }
            }
        }

        Commands::Show { date, json } => {
            let report = require_by_date(store.as_ref(), date).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.full_text());
            }
        }

        Commands::List { from, to, month } => {
            let reports = if let Some(month) = month {
                let (year, month) = parse_month_arg(&month)?;
                store.month(year, month).await?
            } else if from.is_some() || to.is_some() {
                // sentinels must stay four-digit years: dates compare as
                // YYYY-MM-DD text in the store
                let from = from
                    .or_else(|| NaiveDate::from_ymd_opt(1000, 1, 1))
                    .unwrap_or(NaiveDate::MIN);
                let to = to
                    .or_else(|| NaiveDate::from_ymd_opt(9999, 12, 31))
                    .unwrap_or(NaiveDate::MAX);
                store.date_range(from, to).await?
            } else {
                store.list_all().await?
            };
            print_report_lines(&reports);
        }

        Commands::Search { keyword } => {
            let reports = store.search(&keyword).await?;
            print_report_lines(&reports);
        }

        Commands::Stats => {
            let stats = store.stats().await?;
            print_stats(&stats);
        }

        Commands::Delete { date, remote } => {
            let report = require_by_date(store.as_ref(), date).await?;
            let engine = build_engine(&config, store.clone());
            with_auth_hint(engine.delete_report(&report.id, remote).await)?;
            println!("Deleted report for {}", format_display_date(date));
        }

        Commands::Sync => {
            let engine = build_engine(&config, store.clone());
            let outcome = with_auth_hint(engine.sync_cycle().await)?;
            print_pull(&outcome.pull);
            print_push(&outcome.push);
        }

        Commands::Pull => {
            let engine = build_engine(&config, store.clone());
            let summary = with_auth_hint(engine.pull_from_remote().await)?;
            print_pull(&summary);
        }

        Commands::Push => {
            let engine = build_engine(&config, store.clone());
            let summary = with_auth_hint(engine.push_to_remote().await)?;
            print_push(&summary);
        }

        Commands::Export { output } => {
            let dump = backup::export_json(store.as_ref()).await?;
            if output == "-" {
                println!("{}", dump);
            } else {
                std::fs::write(&output, dump)?;
                println!("Exported to {}", output);
            }
        }

        Commands::Import { file } => {
            let json = std::fs::read_to_string(&file)?;
            let summary = backup::import_json(store.as_ref(), &json).await?;
            println!(
                "Imported {} report(s), skipped {}",
                summary.imported, summary.skipped
            );
        }

        Commands::Clear { yes } => {
            if !yes {
                println!("This deletes every local report. Re-run with --yes to confirm.");
                return Ok(());
            }
            let removed = store.clear().await?;
            println!("Deleted {} report(s)", removed);
        }
    }

    Ok(())
}

/// Wire the sync engine from the config: token from `WORKLOG_DRIVE_TOKEN`
/// or the config file, remote folder under the drive root.
fn build_engine(config: &Config, store: Arc<SqliteStore>) -> SyncEngine {
    let secret = std::env::var("WORKLOG_DRIVE_TOKEN")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| config.drive_token.clone());
    let credentials = Arc::new(match secret {
        Some(secret) => StaticTokenProvider::new(AccessToken::with_ttl(
            secret,
            Duration::minutes(config.drive_token_ttl_minutes),
        )),
        None => StaticTokenProvider::unauthenticated(),
    });
    let remote = Arc::new(DriveFolderStore::new(
        config.expanded_drive_root(),
        &config.profile.folder_name(),
        credentials.clone(),
    ));
    SyncEngine::new(store, remote, credentials, config.profile.clone())
}

async fn find_by_date(store: &SqliteStore, date: NaiveDate) -> Result<Option<Report>> {
    Ok(store.date_range(date, date).await?.into_iter().next())
}

async fn require_by_date(store: &SqliteStore, date: NaiveDate) -> Result<Report> {
    find_by_date(store, date).await?.ok_or_else(|| {
        WorklogError::Storage(format!("no report for {}", format_display_date(date)))
    })
}

fn with_auth_hint<T>(result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.is_auth() {
            eprintln!("hint: set drive_token in the config or export WORKLOG_DRIVE_TOKEN");
        }
    }
    result
}

/// `PROJECT/DESCRIPTION[/HOURS]`; the last segment is hours only when
/// it parses as a number, so descriptions may contain slashes.
fn parse_task_arg(raw: &str) -> Result<(String, String, f64)> {
    let (project, rest) = raw
        .split_once('/')
        .ok_or_else(|| bad_task_arg(raw))?;
    let (description, hours) = split_hours(rest);
    let project = project.trim();
    let description = description.trim();
    if project.is_empty() || description.is_empty() {
        return Err(bad_task_arg(raw));
    }
    Ok((project.to_string(), description.to_string(), hours))
}

fn parse_general_arg(raw: &str) -> Result<(String, f64)> {
    let (description, hours) = split_hours(raw);
    let description = description.trim();
    if description.is_empty() {
        return Err(WorklogError::Validation(format!(
            "expected DESCRIPTION[/HOURS], got {:?}",
            raw
        )));
    }
    Ok((description.to_string(), hours))
}

fn split_hours(raw: &str) -> (&str, f64) {
    match raw.rsplit_once('/') {
        Some((head, tail)) => match tail.trim().parse::<f64>() {
            Ok(hours) => (head, hours),
            Err(_) => (raw, 0.0),
        },
        None => (raw, 0.0),
    }
}

fn bad_task_arg(raw: &str) -> WorklogError {
    WorklogError::Validation(format!(
        "expected PROJECT/DESCRIPTION[/HOURS], got {:?}",
        raw
    ))
}

fn parse_month_arg(raw: &str) -> Result<(i32, u32)> {
    let parsed = raw.split_once('-').and_then(|(y, m)| {
        Some((y.parse::<i32>().ok()?, m.parse::<u32>().ok()?))
    });
    parsed.ok_or_else(|| {
        WorklogError::Validation(format!("expected YYYY-MM, got {:?}", raw))
    })
}

/// Work window with its duration label when the times parse,
/// e.g. `09:00-17:00 (8h)`; the bare times otherwise
fn format_window(report: &Report) -> String {
    let times = format!("{}-{}", report.time_from, report.time_to);
    match work_window_label(&report.time_from, &report.time_to) {
        Some(label) => format!("{} ({})", times, label),
        None => times,
    }
}

fn print_report_lines(reports: &[Report]) {
    if reports.is_empty() {
        println!("No reports.");
        return;
    }
    for report in reports {
        let projects = report.projects.iter().filter(|p| p.is_reportable()).count();
        println!(
            "{}  {:<12} {:>5}h  {:<18} {} project(s){}",
            report.date,
            report.location,
            format_hours(report.total_hours),
            format_window(report),
            projects,
            if report.remote.is_some() { "  [synced]" } else { "" }
        );
    }
}

fn print_stats(stats: &ReportStats) {
    println!("Reports: {}", stats.report_count);
    println!("Total hours: {}", format_hours(stats.total_hours));
    if !stats.project_hours.is_empty() {
        println!("By project:");
        let mut rows: Vec<_> = stats.project_hours.iter().collect();
        rows.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (name, hours) in rows {
            println!("  {}: {}h", name, format_hours(*hours));
        }
    }
    if !stats.location_counts.is_empty() {
        println!("By location:");
        let mut rows: Vec<_> = stats.location_counts.iter().collect();
        rows.sort_by(|a, b| b.1.cmp(a.1));
        for (location, count) in rows {
            println!("  {}: {} report(s)", location, count);
        }
    }
}

fn print_pull(summary: &PullSummary) {
    println!(
        "Pulled: {} downloaded, {} skipped, {} failed",
        summary.downloaded, summary.skipped, summary.failed
    );
}

fn print_push(summary: &PushSummary) {
    println!(
        "Pushed: {} uploaded, {} failed",
        summary.uploaded, summary.failed
    );
}
