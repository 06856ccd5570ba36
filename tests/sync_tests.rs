//! Sync engine integration tests
//!
//! Exercises the full pull/push cycle against a real SQLite store and a
//! drive folder in a temp directory, plus a flaky in-memory remote for
//! failure-isolation cases.
//!
//! Run with: cargo test --test sync_tests

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use parking_lot::Mutex;

use worklog::auth::{AccessToken, CredentialProvider, StaticTokenProvider};
use worklog::config::Profile;
use worklog::error::{Result, WorklogError};
use worklog::remote::{DriveFolderStore, RemoteEntry, RemoteStore};
use worklog::store::{LocalStore, SqliteStore};
use worklog::sync::SyncEngine;
use worklog::types::{Report, ReportDraft};

fn test_profile() -> Profile {
    Profile {
        app_name: "Worklog".to_string(),
        recipient: "Maria".to_string(),
        sender: "Alexis".to_string(),
        default_location: "office".to_string(),
        default_time_from: "09:00".to_string(),
        default_time_to: "17:00".to_string(),
    }
}

fn valid_credentials() -> Arc<StaticTokenProvider> {
    Arc::new(StaticTokenProvider::new(AccessToken::with_ttl(
        "secret",
        Duration::minutes(30),
    )))
}

struct Harness {
    _tmp: tempfile::TempDir,
    store: Arc<SqliteStore>,
    engine: SyncEngine,
    folder: PathBuf,
    profile: Profile,
}

fn harness() -> Harness {
    harness_with(valid_credentials())
}

fn harness_with(credentials: Arc<dyn CredentialProvider>) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let profile = test_profile();
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let folder = tmp.path().join(profile.folder_name());
    let remote = Arc::new(DriveFolderStore::new(
        tmp.path(),
        &profile.folder_name(),
        credentials.clone(),
    ));
    let engine = SyncEngine::new(store.clone(), remote, credentials, profile.clone());
    Harness {
        _tmp: tmp,
        store,
        engine,
        folder,
        profile,
    }
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn build_report(profile: &Profile, day: &str, project: &str, task: &str, hours: f64) -> Report {
    let mut draft = ReportDraft::with_defaults(profile);
    draft.date = Some(date(day));
    let id = draft.add_project(project);
    draft.add_task(&id, task, hours);
    draft.generate(profile).unwrap()
}

fn seed_remote_file(harness: &Harness, filename: &str, content: &str) {
    std::fs::create_dir_all(&harness.folder).unwrap();
    std::fs::write(harness.folder.join(filename), content).unwrap();
}

fn remote_filenames(harness: &Harness) -> Vec<String> {
    if !harness.folder.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = std::fs::read_dir(&harness.folder)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn cycle_pulls_missing_files_then_pushes_everything() {
    let h = harness();
    let local = build_report(&h.profile, "2024-03-05", "Atlas", "Ship it", 2.0);
    h.store.put(local).await.unwrap();

    let remote_only = build_report(&h.profile, "2024-03-06", "Phoenix", "Remote work", 1.5);
    seed_remote_file(
        &h,
        &h.profile.canonical_filename(remote_only.date),
        &remote_only.full_text(),
    );
    seed_remote_file(&h, "notes.txt", "not a report");

    let outcome = h.engine.sync_cycle().await.unwrap();
    assert_eq!(outcome.pull.downloaded, 1);
    assert_eq!(outcome.pull.skipped, 1);
    assert_eq!(outcome.pull.failed, 0);
    assert_eq!(outcome.push.uploaded, 2);
    assert_eq!(outcome.push.failed, 0);

    let reports = h.store.list_all().await.unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.remote.is_some()));

    let downloaded = reports.iter().find(|r| r.date == date("2024-03-06")).unwrap();
    assert_eq!(downloaded.projects[0].name, "Phoenix");
    assert_eq!(downloaded.total_hours, 1.5);

    assert_eq!(
        remote_filenames(&h),
        vec![
            "Worklog_Daily_Report_05-03-2024.txt".to_string(),
            "Worklog_Daily_Report_06-03-2024.txt".to_string(),
            "notes.txt".to_string(),
        ]
    );
}

#[tokio::test]
async fn pull_skips_dates_that_already_exist_locally() {
    let h = harness();
    let local = build_report(&h.profile, "2024-03-05", "Atlas", "Local truth", 2.0);
    let local_id = h.store.put(local).await.unwrap().id;

    let imposter = build_report(&h.profile, "2024-03-05", "Shadow", "Remote imposter", 8.0);
    seed_remote_file(
        &h,
        &h.profile.canonical_filename(imposter.date),
        &imposter.full_text(),
    );

    let summary = h.engine.pull_from_remote().await.unwrap();
    assert_eq!(summary.downloaded, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    let reports = h.store.list_all().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].id, local_id);
    assert_eq!(reports[0].projects[0].name, "Atlas");
}

#[tokio::test]
async fn pull_downloads_and_stamps_remote_refs() {
    let h = harness();
    let source = build_report(&h.profile, "2024-03-06", "Phoenix", "Remote work", 1.5);
    let filename = h.profile.canonical_filename(source.date);
    seed_remote_file(&h, &filename, &source.full_text());

    let summary = h.engine.pull_from_remote().await.unwrap();
    assert_eq!(summary.downloaded, 1);

    let reports = h.store.list_all().await.unwrap();
    assert_eq!(reports.len(), 1);
    let restored = &reports[0];
    assert_eq!(restored.date, date("2024-03-06"));
    assert_eq!(restored.location, "office");
    assert_eq!(restored.projects[0].tasks[0].description, "Remote work");
    let remote_ref = restored.remote.as_ref().unwrap();
    assert_eq!(remote_ref.remote_id, filename);
}

#[tokio::test]
async fn push_uploads_every_report_every_time() {
    let h = harness();
    h.store
        .put(build_report(&h.profile, "2024-03-05", "Atlas", "Day one", 2.0))
        .await
        .unwrap();
    h.store
        .put(build_report(&h.profile, "2024-03-06", "Atlas", "Day two", 3.0))
        .await
        .unwrap();

    let first = h.engine.push_to_remote().await.unwrap();
    assert_eq!(first.uploaded, 2);
    assert_eq!(first.failed, 0);

    // a second push re-uploads rather than skipping
    let second = h.engine.push_to_remote().await.unwrap();
    assert_eq!(second.uploaded, 2);
    assert_eq!(remote_filenames(&h).len(), 2);

    // edits overwrite the mirrored file
    let reports = h.store.list_all().await.unwrap();
    let target = reports.iter().find(|r| r.date == date("2024-03-05")).unwrap();
    let mut draft = ReportDraft::from_report(target);
    let pid = draft.projects[0].id.clone();
    draft.add_task(&pid, "Late addition", 1.0);
    h.store
        .put(draft.generate(&h.profile).unwrap())
        .await
        .unwrap();

    h.engine.push_to_remote().await.unwrap();
    let mirrored = std::fs::read_to_string(
        h.folder.join("Worklog_Daily_Report_05-03-2024.txt"),
    )
    .unwrap();
    assert!(mirrored.contains("Late addition"));
}

#[tokio::test]
async fn push_stamps_remote_refs_locally() {
    let h = harness();
    let saved = h
        .store
        .put(build_report(&h.profile, "2024-03-05", "Atlas", "Ship it", 2.0))
        .await
        .unwrap();
    assert!(saved.remote.is_none());

    h.engine.push_to_remote().await.unwrap();

    let reloaded = h.store.get(&saved.id).await.unwrap().unwrap();
    let remote_ref = reloaded.remote.unwrap();
    assert_eq!(remote_ref.remote_id, "Worklog_Daily_Report_05-03-2024.txt");
}

#[tokio::test]
async fn upload_one_pushes_a_single_report() {
    let h = harness();
    let first = h
        .store
        .put(build_report(&h.profile, "2024-03-05", "Atlas", "Ship it", 2.0))
        .await
        .unwrap();
    let second = h
        .store
        .put(build_report(&h.profile, "2024-03-06", "Atlas", "Other day", 1.0))
        .await
        .unwrap();

    h.engine.upload_one(&first).await.unwrap();

    assert_eq!(
        remote_filenames(&h),
        vec!["Worklog_Daily_Report_05-03-2024.txt".to_string()]
    );
    assert!(h.store.get(&first.id).await.unwrap().unwrap().remote.is_some());
    assert!(h.store.get(&second.id).await.unwrap().unwrap().remote.is_none());
}

#[tokio::test]
async fn delete_report_can_purge_the_remote_mirror() {
    let h = harness();
    let keep = h
        .store
        .put(build_report(&h.profile, "2024-03-05", "Atlas", "Keep me", 2.0))
        .await
        .unwrap();
    let gone = h
        .store
        .put(build_report(&h.profile, "2024-03-06", "Atlas", "Purge me", 1.0))
        .await
        .unwrap();
    h.engine.push_to_remote().await.unwrap();
    assert_eq!(remote_filenames(&h).len(), 2);

    assert!(h.engine.delete_report(&gone.id, true).await.unwrap());
    assert_eq!(
        remote_filenames(&h),
        vec!["Worklog_Daily_Report_05-03-2024.txt".to_string()]
    );
    assert!(h.store.get(&gone.id).await.unwrap().is_none());

    // absent rows report false
    assert!(!h.engine.delete_report(&gone.id, true).await.unwrap());

    // without purge the mirror stays
    assert!(h.engine.delete_report(&keep.id, false).await.unwrap());
    assert_eq!(remote_filenames(&h).len(), 1);
}

#[tokio::test]
async fn auth_failure_short_circuits_and_transfers_nothing() {
    for credentials in [
        Arc::new(StaticTokenProvider::unauthenticated()) as Arc<dyn CredentialProvider>,
        Arc::new(StaticTokenProvider::new(AccessToken::with_ttl(
            "stale",
            Duration::seconds(-10),
        ))),
    ] {
        let h = harness_with(credentials);
        h.store
            .put(build_report(&h.profile, "2024-03-05", "Atlas", "Stranded", 2.0))
            .await
            .unwrap();
        let remote_only = build_report(&h.profile, "2024-03-06", "Phoenix", "Unreached", 1.0);
        seed_remote_file(
            &h,
            &h.profile.canonical_filename(remote_only.date),
            &remote_only.full_text(),
        );

        let err = h.engine.sync_cycle().await.unwrap_err();
        assert!(err.is_auth(), "expected auth error, got {:?}", err);
        assert!(h.engine.pull_from_remote().await.unwrap_err().is_auth());
        assert!(h.engine.push_to_remote().await.unwrap_err().is_auth());

        // nothing moved in either direction
        let reports = h.store.list_all().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].remote.is_none());
        assert_eq!(remote_filenames(&h).len(), 1);
    }
}

#[tokio::test]
async fn push_then_pull_round_trips_report_content() {
    let h = harness();
    let mut draft = ReportDraft::with_defaults(&h.profile);
    draft.date = Some(date("2024-03-05"));
    draft.location = "remote".to_string();
    draft.time_from = "08:30".to_string();
    draft.time_to = "16:45".to_string();
    let atlas = draft.add_project("Atlas");
    draft.add_task(&atlas, "Ship migration tool", 3.0);
    draft.add_task(&atlas, "Code review", 1.25);
    let phoenix = draft.add_project("Phoenix");
    draft.add_task(&phoenix, "Incident follow-up", 0.0);
    draft.add_general_task("Weekly planning", 0.75);
    let original = h.store.put(draft.generate(&h.profile).unwrap()).await.unwrap();

    h.engine.push_to_remote().await.unwrap();
    h.store.clear().await.unwrap();

    let summary = h.engine.pull_from_remote().await.unwrap();
    assert_eq!(summary.downloaded, 1);

    let restored = &h.store.list_all().await.unwrap()[0];
    assert_eq!(restored.date, original.date);
    assert_eq!(restored.location, original.location);
    assert_eq!(restored.time_from, original.time_from);
    assert_eq!(restored.time_to, original.time_to);
    assert_eq!(restored.total_hours, original.total_hours);
    assert_eq!(restored.subject, original.subject);
    assert_eq!(restored.body, original.body);
    let names: Vec<&str> = restored.projects.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Atlas", "Phoenix"]);
    assert_eq!(restored.general_tasks[0].description, "Weekly planning");
    // restored reports get a fresh identity
    assert_ne!(restored.id, original.id);
}

// ============================================================================
// FAILURE ISOLATION (flaky in-memory remote)
// ============================================================================

#[derive(Default)]
struct FlakyRemote {
    files: Mutex<BTreeMap<String, String>>,
    fail_get: HashSet<String>,
    fail_put: HashSet<String>,
}

#[async_trait]
impl RemoteStore for FlakyRemote {
    async fn ensure_folder(&self) -> Result<()> {
        Ok(())
    }

    async fn put(&self, filename: &str, content: &str) -> Result<RemoteEntry> {
        if self.fail_put.contains(filename) {
            return Err(WorklogError::Remote(format!(
                "simulated outage writing {}",
                filename
            )));
        }
        self.files
            .lock()
            .insert(filename.to_string(), content.to_string());
        Ok(entry(filename))
    }

    async fn get(&self, filename: &str) -> Result<String> {
        if self.fail_get.contains(filename) {
            return Err(WorklogError::Remote(format!(
                "simulated outage reading {}",
                filename
            )));
        }
        self.files
            .lock()
            .get(filename)
            .cloned()
            .ok_or_else(|| WorklogError::Remote(format!("{} not found", filename)))
    }

    async fn list(&self) -> Result<Vec<RemoteEntry>> {
        Ok(self.files.lock().keys().map(|f| entry(f)).collect())
    }

    async fn delete(&self, remote_id: &str) -> Result<()> {
        self.files.lock().remove(remote_id);
        Ok(())
    }
}

fn entry(filename: &str) -> RemoteEntry {
    RemoteEntry {
        filename: filename.to_string(),
        remote_id: filename.to_string(),
        url: None,
    }
}

#[tokio::test]
async fn pull_isolates_per_file_failures() {
    let profile = test_profile();
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());

    let poisoned = profile.canonical_filename(date("2024-03-06"));
    let mut remote = FlakyRemote::default();
    remote.fail_get.insert(poisoned.clone());
    for day in ["2024-03-05", "2024-03-06", "2024-03-07"] {
        let report = build_report(&profile, day, "Atlas", "Work", 1.0);
        remote.files.lock().insert(
            profile.canonical_filename(report.date),
            report.full_text(),
        );
    }

    let engine = SyncEngine::new(
        store.clone(),
        Arc::new(remote),
        valid_credentials(),
        profile.clone(),
    );

    let summary = engine.pull_from_remote().await.unwrap();
    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 1);

    let dates: Vec<NaiveDate> = store
        .list_all()
        .await
        .unwrap()
        .iter()
        .map(|r| r.date)
        .collect();
    assert!(!dates.contains(&date("2024-03-06")));
    assert_eq!(dates.len(), 2);
}

#[tokio::test]
async fn push_isolates_per_report_failures() {
    let profile = test_profile();
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    for day in ["2024-03-05", "2024-03-06", "2024-03-07"] {
        store
            .put(build_report(&profile, day, "Atlas", "Work", 1.0))
            .await
            .unwrap();
    }

    let mut remote = FlakyRemote::default();
    remote
        .fail_put
        .insert(profile.canonical_filename(date("2024-03-06")));

    let engine = SyncEngine::new(
        store.clone(),
        Arc::new(remote),
        valid_credentials(),
        profile.clone(),
    );

    let summary = engine.push_to_remote().await.unwrap();
    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.failed, 1);

    for report in store.list_all().await.unwrap() {
        if report.date == date("2024-03-06") {
            assert!(report.remote.is_none());
        } else {
            assert!(report.remote.is_some());
        }
    }
}
