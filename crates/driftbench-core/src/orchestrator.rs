//! The tick state machine.
//!
//! `Idle → CheckingVersion → (UpToDate | Downloading) → Running →
//! (AllPassed | SomeFailed)`. One pass per external invocation; the
//! common path on every tick is the silent `UpToDate` no-op.
//!
//! The one invariant everything else hangs off: the stored
//! `current_version` is promoted only after a run in which every
//! registered project passed, so an interrupted or partially-failed
//! run is re-attempted in full on the next tick.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::baseline::BaselineManager;
use crate::compare::ComparisonRunner;
use crate::errors::BenchResult;
use crate::failure_log::{FailureLogger, RETENTION_DAYS};
use crate::project::{self, Project, ReportDirs};
use crate::repo::EngineRepository;
use crate::scan::ProjectRunner;
use crate::settings::Settings;
use crate::state::ConfigStore;
use crate::version::{HttpVersionResolver, VersionSource};

/// Engine binaries kept after a successful run.
const KEEP_ENGINES: usize = 3;

/// Per-project result, accumulated instead of aborting the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectStatus {
    Passed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOutcome {
    pub name: String,
    pub status: ProjectStatus,
}

impl ProjectOutcome {
    pub fn passed(&self) -> bool {
        self.status == ProjectStatus::Passed
    }
}

/// Terminal state of one tick. Every variant is a process-level
/// success; failures are conveyed through state and failure logs.
#[derive(Debug)]
pub enum TickOutcome {
    /// Fetched version equals the stored one; nothing ran.
    UpToDate { version: String },
    /// Version fetch or engine acquisition failed; error recorded.
    CheckFailed { error: String },
    /// Every project passed; version promoted, retention applied.
    AllPassed {
        version: String,
        outcomes: Vec<ProjectOutcome>,
    },
    /// At least one project failed; version deliberately unchanged.
    SomeFailed {
        version: String,
        outcomes: Vec<ProjectOutcome>,
    },
}

/// Top-level control loop. Owns the shared resources (state store,
/// engine cache, failure-log area) and passes them to collaborators.
pub struct BenchmarkOrchestrator {
    settings: Settings,
    store: ConfigStore,
    versions: Box<dyn VersionSource>,
    repo: EngineRepository,
    failures: FailureLogger,
}

impl BenchmarkOrchestrator {
    /// Build with an injected version source (tests use fakes).
    pub fn new(settings: Settings, versions: Box<dyn VersionSource>) -> BenchResult<Self> {
        let store = ConfigStore::new(settings.state_file());
        let repo = EngineRepository::new(&settings)?;
        let failures = FailureLogger::new(settings.failures_dir());
        Ok(Self {
            settings,
            store,
            versions,
            repo,
            failures,
        })
    }

    /// Build with the HTTP resolver against the release endpoint.
    pub fn with_http_source(settings: Settings) -> BenchResult<Self> {
        let resolver = HttpVersionResolver::new(&settings)?;
        Self::new(settings, Box::new(resolver))
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Run one orchestration pass. Callers must hold the instance
    /// lock. Returns `Err` only for faults outside the benchmark
    /// domain (missing configs root, unwritable state file); even
    /// those are not process-fatal to the CLI.
    pub async fn tick(&self) -> BenchResult<TickOutcome> {
        let mut state = self.store.load();
        state.last_check_time = Some(Utc::now());

        let latest = match self.versions.fetch_latest().await {
            Ok(latest) => latest,
            Err(err) => {
                warn!(error = %err, "version check failed");
                state.last_run_success = Some(false);
                state.last_run_error = Some(format!("version check failed: {err}"));
                self.store.save(&state)?;
                return Ok(TickOutcome::CheckFailed {
                    error: err.to_string(),
                });
            }
        };

        if state.current_version.as_deref() == Some(latest.as_str()) {
            // The common, silent path: only last_check_time moves.
            self.store.save(&state)?;
            return Ok(TickOutcome::UpToDate { version: latest });
        }

        info!(
            latest = %latest,
            current = state.current_version.as_deref().unwrap_or("<none>"),
            "new engine version, running benchmark"
        );

        let engine = match self.repo.ensure(&latest).await {
            Ok(engine) => engine,
            Err(err) => {
                warn!(error = %err, version = %latest, "engine acquisition failed");
                state.last_run_success = Some(false);
                state.last_run_error = Some(format!("engine acquisition failed: {err}"));
                self.store.save(&state)?;
                return Ok(TickOutcome::CheckFailed {
                    error: err.to_string(),
                });
            }
        };

        // Record the binary path, but NOT the version: the version is
        // promoted only by a fully-successful run.
        state.engine_path = Some(engine.clone());
        self.store.save(&state)?;

        let projects = project::discover(&self.settings.configs_dir)?;
        let reports = ReportDirs::new(self.settings.reports_dir.clone());
        let runner = ProjectRunner::new(
            reports.clone(),
            self.settings.run_log(),
            self.settings.scan_timeout(),
        );
        let comparer = ComparisonRunner::new(
            reports,
            self.settings.run_log(),
            self.settings.tolerance_pct,
            self.settings.compare_timeout(),
        );
        let baselines = BaselineManager::new(&self.repo, &runner, &self.settings.baseline_version);

        let mut outcomes = Vec::new();
        for project in &projects {
            if !project.has_readable_config() {
                warn!(project = %project.name, "no readable config, skipping");
                continue;
            }
            let status = self
                .run_project(project, &engine, &latest, &baselines, &runner, &comparer)
                .await;
            if let ProjectStatus::Failed(reason) = &status {
                warn!(project = %project.name, reason = %reason, "project failed");
            }
            outcomes.push(ProjectOutcome {
                name: project.name.clone(),
                status,
            });
        }

        let failed = outcomes.iter().filter(|o| !o.passed()).count();
        let now = Utc::now();
        state.last_run_time = Some(now);

        if failed == 0 {
            state.current_version = Some(latest.clone());
            state.total_runs += 1;
            state.last_run_success = Some(true);
            state.last_run_error = None;
            self.store.save(&state)?;

            if let Err(err) = self.repo.retire_old(KEEP_ENGINES) {
                warn!(error = %err, "engine retirement failed");
            }
            if let Err(err) = self.failures.purge_older_than(RETENTION_DAYS) {
                warn!(error = %err, "failure-log purge failed");
            }

            info!(
                version = %latest,
                projects = outcomes.len(),
                "benchmark passed for all projects"
            );
            Ok(TickOutcome::AllPassed {
                version: latest,
                outcomes,
            })
        } else {
            let summary = format!("{failed}/{} projects failed", outcomes.len());
            state.last_run_success = Some(false);
            state.last_run_error = Some(summary.clone());
            self.store.save(&state)?;

            error!(
                version = %latest,
                summary = %summary,
                failures_dir = %self.failures.dir().display(),
                "benchmark failed"
            );
            Ok(TickOutcome::SomeFailed {
                version: latest,
                outcomes,
            })
        }
    }

    /// Baseline, scan, compare for one project. Every failure is
    /// captured and reported; the batch continues regardless.
    async fn run_project(
        &self,
        project: &Project,
        engine: &std::path::Path,
        version: &str,
        baselines: &BaselineManager<'_>,
        runner: &ProjectRunner,
        comparer: &ComparisonRunner,
    ) -> ProjectStatus {
        if let Err(failure) = baselines.ensure(project).await {
            if let Err(err) = self.failures.record_scan_failure(
                &project.name,
                &self.settings.baseline_version,
                failure.log.as_deref().unwrap_or(""),
                None,
            ) {
                warn!(error = %err, "failed to write failure report");
            }
            return ProjectStatus::Failed(format!("baseline: {failure}"));
        }

        let scan = match runner.scan(engine, version, project) {
            Ok(scan) => scan,
            Err(failure) => {
                if let Err(err) = self.failures.record_scan_failure(
                    &project.name,
                    version,
                    &failure.log,
                    failure.artifact.as_deref(),
                ) {
                    warn!(error = %err, "failed to write failure report");
                }
                return ProjectStatus::Failed(format!("scan: {failure}"));
            }
        };

        let baseline = project.baseline_file();
        match comparer.compare(engine, version, project, &baseline, &scan.artifact) {
            Ok(_outcome) => ProjectStatus::Passed,
            Err(failure) => {
                if let Err(err) = self.failures.record_comparison_failure(
                    &project.name,
                    version,
                    &failure.log,
                    &baseline,
                    &scan.artifact,
                    &failure.report,
                ) {
                    warn!(error = %err, "failed to write failure report");
                }
                ProjectStatus::Failed(format!("comparison: {failure}"))
            }
        }
    }
}
