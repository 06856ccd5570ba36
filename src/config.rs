//! Configuration: file locations, drive settings and the report profile

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorklogError};
use crate::types::{format_display_date, format_filename_date};

/// Top-level configuration, loaded from `config.toml` under the platform
/// config dir. Every field has a default so a partial (or absent) file works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database holding the local reports
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Root of the mounted drive the reports folder lives under
    #[serde(default = "default_drive_root")]
    pub drive_root: String,
    /// Drive access token supplied out-of-band (also reachable via
    /// `WORKLOG_DRIVE_TOKEN`)
    #[serde(default)]
    pub drive_token: Option<String>,
    /// How long a supplied token is considered fresh
    #[serde(default = "default_token_ttl")]
    pub drive_token_ttl_minutes: i64,
    #[serde(default)]
    pub profile: Profile,
}

/// Names and defaults that shape every rendered report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Prefixes subjects, filenames and the remote folder
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Who the report greets
    #[serde(default = "default_recipient")]
    pub recipient: String,
    /// Who signs the report
    #[serde(default = "default_sender")]
    pub sender: String,
    /// Location used when a draft leaves it empty, and the parser fallback
    #[serde(default = "default_location")]
    pub default_location: String,
    #[serde(default = "default_time_from")]
    pub default_time_from: String,
    #[serde(default = "default_time_to")]
    pub default_time_to: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            drive_root: default_drive_root(),
            drive_token: None,
            drive_token_ttl_minutes: default_token_ttl(),
            profile: Profile::default(),
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            recipient: default_recipient(),
            sender: default_sender(),
            default_location: default_location(),
            default_time_from: default_time_from(),
            default_time_to: default_time_to(),
        }
    }
}

// Default value functions

fn default_database_path() -> String {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir
            .join("worklog")
            .join("reports.db")
            .to_string_lossy()
            .to_string()
    } else {
        "~/.local/share/worklog/reports.db".to_string()
    }
}

fn default_drive_root() -> String {
    "~/Drive".to_string()
}

fn default_token_ttl() -> i64 {
    60
}

fn default_app_name() -> String {
    "Worklog".to_string()
}

fn default_recipient() -> String {
    "Team".to_string()
}

fn default_sender() -> String {
    std::env::var("USER").unwrap_or_else(|_| "me".to_string())
}

fn default_location() -> String {
    "office".to_string()
}

fn default_time_from() -> String {
    "09:00".to_string()
}

fn default_time_to() -> String {
    "17:00".to_string()
}

impl Config {
    /// Load from the given path, or the platform default when `None`.
    /// A missing file yields the default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        toml::from_str(&contents).map_err(|e| {
            WorklogError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Write this configuration as pretty TOML, creating parent dirs
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| WorklogError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// `<config dir>/worklog/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| WorklogError::Config("could not determine config directory".into()))?;
        Ok(base.join("worklog").join("config.toml"))
    }

    /// Database path with `~` expanded
    pub fn expanded_database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database_path).into_owned())
    }

    /// Drive root with `~` expanded
    pub fn expanded_drive_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.drive_root).into_owned())
    }
}

impl Profile {
    /// Subject line for a given date: `<App>: Daily report (DD/MM/YYYY)`
    pub fn subject(&self, date: NaiveDate) -> String {
        format!(
            "{}: Daily report ({})",
            self.app_name,
            format_display_date(date)
        )
    }

    pub fn greeting(&self) -> String {
        format!("Dear {},", self.recipient)
    }

    pub fn signature(&self) -> String {
        format!("Best regards,\n{}", self.sender)
    }

    /// Remote folder all reports are mirrored into
    pub fn folder_name(&self) -> String {
        format!("{}_Reports", self.app_name)
    }

    fn filename_prefix(&self) -> String {
        format!("{}_Daily_Report", self.app_name)
    }

    /// Canonical per-report filename: `<App>_Daily_Report_DD-MM-YYYY.txt`
    pub fn canonical_filename(&self, date: NaiveDate) -> String {
        format!(
            "{}_{}.txt",
            self.filename_prefix(),
            format_filename_date(date)
        )
    }

    /// Date of a canonical filename, `None` when the name does not match
    pub fn parse_filename(&self, filename: &str) -> Option<NaiveDate> {
        let stem = filename.strip_suffix(".txt")?;
        let date_part = stem.strip_prefix(&self.filename_prefix())?;
        let date_part = date_part.strip_prefix('_')?;
        NaiveDate::parse_from_str(date_part, "%d-%m-%Y").ok()
    }
}
