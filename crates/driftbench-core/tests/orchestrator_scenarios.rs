//! End-to-end orchestrator scenarios driven by stub engine binaries
//! (shell scripts) and injected version sources. No network anywhere:
//! binaries are pre-seeded into the engine cache so every acquisition
//! is a cache hit, and the download endpoint is unreachable on
//! purpose.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};

use driftbench_core::{
    BenchError, BenchResult, BenchmarkOrchestrator, Settings, TickOutcome, VersionSource,
};
use tempfile::TempDir;

const LATEST: &str = "9.9.9";
const BASELINE_ENGINE: &str = "4.0.0";

/// Stub engine: scan copies the config to the output path; compare
/// writes a report and fails (exit 1, partial report) for any project
/// whose current-scan path mentions "projb".
const ENGINE_SCRIPT: &str = r#"#!/bin/sh
mode="$1"; shift
cfg=""; out=""; cur=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --config) cfg="$2"; shift 2 ;;
    --output) out="$2"; shift 2 ;;
    --current) cur="$2"; shift 2 ;;
    --baseline|--tolerance) shift 2 ;;
    *) shift ;;
  esac
done
case "$mode" in
  scan)
    cp "$cfg" "$out"
    echo "scanned $cfg"
    ;;
  compare)
    printf '{"diff":0.0}' > "$out"
    case "$cur" in
      *projb*)
        printf '{"diff":9.9,"verdict":"mismatch"}' > "$out"
        echo "drift above tolerance" >&2
        exit 1
        ;;
    esac
    ;;
esac
"#;

/// Stub engine that claims success but writes an empty scan artifact.
const EMPTY_SCAN_SCRIPT: &str = r#"#!/bin/sh
mode="$1"; shift
out=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
: > "$out"
"#;

struct FixedVersion(String);

#[async_trait::async_trait]
impl VersionSource for FixedVersion {
    async fn fetch_latest(&self) -> BenchResult<String> {
        Ok(self.0.clone())
    }
}

struct FailingVersion;

#[async_trait::async_trait]
impl VersionSource for FailingVersion {
    async fn fetch_latest(&self) -> BenchResult<String> {
        Err(BenchError::Network {
            message: "connection refused".to_string(),
        })
    }
}

struct Harness {
    _root: TempDir,
    settings: Settings,
}

impl Harness {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let settings = Settings {
            download_url_template: "http://127.0.0.1:1/engine-{version}".to_string(),
            baseline_version: BASELINE_ENGINE.to_string(),
            ..Settings::default()
        }
        .rooted_at(root.path());
        fs::create_dir_all(&settings.configs_dir).unwrap();
        Self {
            _root: root,
            settings,
        }
    }

    fn seed_engine(&self, version: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let dir = self.settings.engines_dir();
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("engine-{version}"));
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn seed_engines(&self) {
        self.seed_engine(LATEST, ENGINE_SCRIPT);
        self.seed_engine(BASELINE_ENGINE, ENGINE_SCRIPT);
    }

    fn add_project(&self, name: &str) {
        let dir = self.settings.configs_dir.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.json"),
            format!(r#"{{"target":"{name}"}}"#),
        )
        .unwrap();
    }

    fn orchestrator(&self, versions: Box<dyn VersionSource>) -> BenchmarkOrchestrator {
        BenchmarkOrchestrator::new(self.settings.clone(), versions).unwrap()
    }

    fn scan_count(&self, project: &str) -> usize {
        dir_count(&self.settings.reports_dir.join(project).join("scan"))
    }

    fn comparison_count(&self, project: &str) -> usize {
        dir_count(&self.settings.reports_dir.join(project).join("comparison"))
    }

    fn failure_files(&self) -> Vec<PathBuf> {
        match fs::read_dir(self.settings.failures_dir()) {
            Ok(entries) => entries.filter_map(Result::ok).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn dir_count(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn up_to_date_tick_touches_only_last_check_time() {
    let harness = Harness::new();
    harness.add_project("proja");
    let orchestrator = harness.orchestrator(Box::new(FixedVersion(LATEST.to_string())));

    let mut state = orchestrator.store().load();
    state.current_version = Some(LATEST.to_string());
    state.total_runs = 7;
    orchestrator.store().save(&state).unwrap();

    let outcome = orchestrator.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::UpToDate { .. }));

    let after = orchestrator.store().load();
    assert!(after.last_check_time.is_some());
    assert_eq!(after.current_version.as_deref(), Some(LATEST));
    assert_eq!(after.total_runs, 7);
    assert_eq!(after.last_run_error, None);
    assert_eq!(after.engine_path, None);

    // Nothing ran: no reports, no failure logs.
    assert_eq!(harness.scan_count("proja"), 0);
    assert!(harness.failure_files().is_empty());
}

#[tokio::test]
async fn version_fetch_failure_records_error_without_running() {
    let harness = Harness::new();
    harness.add_project("proja");
    let orchestrator = harness.orchestrator(Box::new(FailingVersion));

    let outcome = orchestrator.tick().await.unwrap();
    let TickOutcome::CheckFailed { error } = outcome else {
        panic!("expected CheckFailed");
    };
    assert!(error.contains("connection refused"));

    let state = orchestrator.store().load();
    assert!(state
        .last_run_error
        .as_deref()
        .unwrap()
        .contains("version check failed"));
    assert_eq!(state.last_run_success, Some(false));
    assert_eq!(state.current_version, None);
    assert_eq!(harness.scan_count("proja"), 0);
}

#[tokio::test]
async fn check_failure_after_a_success_flips_last_run_success() {
    let harness = Harness::new();
    harness.seed_engines();
    harness.add_project("proja");

    let orchestrator = harness.orchestrator(Box::new(FixedVersion(LATEST.to_string())));
    let outcome = orchestrator.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::AllPassed { .. }));
    assert_eq!(orchestrator.store().load().last_run_success, Some(true));

    // The endpoint going away must not leave a stale success marker
    // next to a fresh error text.
    let orchestrator = harness.orchestrator(Box::new(FailingVersion));
    let outcome = orchestrator.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::CheckFailed { .. }));

    let state = orchestrator.store().load();
    assert_eq!(state.last_run_success, Some(false));
    assert!(state
        .last_run_error
        .as_deref()
        .unwrap()
        .contains("version check failed"));
    assert_eq!(
        state.current_version.as_deref(),
        Some(LATEST),
        "a failed check never demotes the promoted version"
    );
}

#[tokio::test]
async fn engine_acquisition_failure_records_error() {
    let harness = Harness::new();
    harness.add_project("proja");
    // No binary seeded and the download endpoint refuses connections.
    let orchestrator = harness.orchestrator(Box::new(FixedVersion(LATEST.to_string())));

    let outcome = orchestrator.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::CheckFailed { .. }));

    let state = orchestrator.store().load();
    assert!(state
        .last_run_error
        .as_deref()
        .unwrap()
        .contains("engine acquisition failed"));
    assert_eq!(state.last_run_success, Some(false));
    assert_eq!(state.current_version, None);
    assert_eq!(state.engine_path, None);
}

#[tokio::test]
async fn all_passed_promotes_version_and_applies_side_effects() {
    let harness = Harness::new();
    harness.seed_engines();
    harness.add_project("proja");
    let orchestrator = harness.orchestrator(Box::new(FixedVersion(LATEST.to_string())));

    let outcome = orchestrator.tick().await.unwrap();
    let TickOutcome::AllPassed { version, outcomes } = outcome else {
        panic!("expected AllPassed");
    };
    assert_eq!(version, LATEST);
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].passed());

    let state = orchestrator.store().load();
    assert_eq!(state.current_version.as_deref(), Some(LATEST));
    assert_eq!(state.total_runs, 1);
    assert_eq!(state.last_run_success, Some(true));
    assert_eq!(state.last_run_error, None);
    assert!(state.last_run_time.is_some());
    assert!(state.engine_path.is_some());

    // One real scan in history (the baseline seed was removed), one
    // comparison report, a baseline, no failure logs.
    assert_eq!(harness.scan_count("proja"), 1);
    assert_eq!(harness.comparison_count("proja"), 1);
    assert!(harness
        .settings
        .configs_dir
        .join("proja/baseline.json")
        .exists());
    assert!(harness.failure_files().is_empty());

    // Next tick is the silent no-op.
    let outcome = orchestrator.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::UpToDate { .. }));
    assert_eq!(harness.scan_count("proja"), 1);
}

#[tokio::test]
async fn comparison_failure_blocks_promotion_and_writes_report() {
    let harness = Harness::new();
    harness.seed_engines();
    harness.add_project("proja");
    harness.add_project("projb");
    let orchestrator = harness.orchestrator(Box::new(FixedVersion(LATEST.to_string())));

    let outcome = orchestrator.tick().await.unwrap();
    let TickOutcome::SomeFailed { outcomes, .. } = outcome else {
        panic!("expected SomeFailed");
    };
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().find(|o| o.name == "proja").unwrap().passed());
    assert!(!outcomes.iter().find(|o| o.name == "projb").unwrap().passed());

    let state = orchestrator.store().load();
    assert_eq!(state.current_version, None, "failed run must not promote");
    assert_eq!(state.total_runs, 0);
    assert_eq!(state.last_run_success, Some(false));
    assert_eq!(state.last_run_error.as_deref(), Some("1/2 projects failed"));

    // The passing project's artifacts are retained.
    assert_eq!(harness.scan_count("proja"), 1);
    assert_eq!(harness.comparison_count("proja"), 1);

    // The failure report carries the comparison report body.
    let failures = harness.failure_files();
    assert_eq!(failures.len(), 1);
    let name = failures[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("comparison-failure-projb-"));
    let body = fs::read_to_string(&failures[0]).unwrap();
    assert!(body.contains("drift above tolerance"));
    assert!(body.contains(r#""verdict":"mismatch""#));

    // Same version is re-attempted end-to-end on the next tick.
    let outcome = orchestrator.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::SomeFailed { .. }));
    assert_eq!(orchestrator.store().load().current_version, None);
}

#[tokio::test]
async fn empty_scan_output_is_a_failure_and_leaves_no_artifact() {
    let harness = Harness::new();
    harness.seed_engine(LATEST, EMPTY_SCAN_SCRIPT);
    harness.seed_engine(BASELINE_ENGINE, ENGINE_SCRIPT);
    harness.add_project("proja");
    let orchestrator = harness.orchestrator(Box::new(FixedVersion(LATEST.to_string())));

    let outcome = orchestrator.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::SomeFailed { .. }));

    assert_eq!(harness.scan_count("proja"), 0, "empty artifact must be removed");
    let failures = harness.failure_files();
    assert_eq!(failures.len(), 1);
    assert!(failures[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("scan-failure-proja-"));
}

#[tokio::test]
async fn project_without_config_is_skipped_not_failed() {
    let harness = Harness::new();
    harness.seed_engines();
    harness.add_project("proja");
    fs::create_dir_all(harness.settings.configs_dir.join("no-config")).unwrap();
    let orchestrator = harness.orchestrator(Box::new(FixedVersion(LATEST.to_string())));

    let outcome = orchestrator.tick().await.unwrap();
    let TickOutcome::AllPassed { outcomes, .. } = outcome else {
        panic!("a config-less project must not count as failed");
    };
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].name, "proja");
}

#[tokio::test]
async fn successful_run_retires_engines_and_purges_old_failure_logs() {
    let harness = Harness::new();
    harness.add_project("proja");

    // Five spare binaries, then the two live ones, with distinct
    // mtimes so retirement order is well-defined.
    for version in ["1.0", "1.1", "1.2", "1.3", "1.4"] {
        harness.seed_engine(version, ENGINE_SCRIPT);
        std::thread::sleep(std::time::Duration::from_millis(20));
    }
    harness.seed_engine(BASELINE_ENGINE, ENGINE_SCRIPT);
    std::thread::sleep(std::time::Duration::from_millis(20));
    harness.seed_engine(LATEST, ENGINE_SCRIPT);

    // One expired and one fresh failure report, stamped in the name.
    let failures_dir = harness.settings.failures_dir();
    fs::create_dir_all(&failures_dir).unwrap();
    let stamp_at = |days: i64| {
        (chrono::Utc::now() - chrono::Duration::days(days))
            .format("%Y%m%d-%H%M%S%3f")
            .to_string()
    };
    let expired = failures_dir.join(format!("scan-failure-proja-{}.log", stamp_at(31)));
    let fresh = failures_dir.join(format!("scan-failure-proja-{}.log", stamp_at(29)));
    fs::write(&expired, "old").unwrap();
    fs::write(&fresh, "recent").unwrap();

    let orchestrator = harness.orchestrator(Box::new(FixedVersion(LATEST.to_string())));
    let outcome = orchestrator.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::AllPassed { .. }));

    let engines_dir = harness.settings.engines_dir();
    let mut remaining: Vec<String> = fs::read_dir(&engines_dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    remaining.sort();
    assert_eq!(
        remaining,
        ["engine-1.4", "engine-4.0.0", "engine-9.9.9"],
        "only the three most recently modified binaries survive"
    );

    assert!(!expired.exists(), "expired failure log must be purged");
    assert!(fresh.exists(), "29-day-old failure log is retained");
}
