//! Baseline lifecycle: seed each project's ground truth once, with a
//! pinned engine version.
//!
//! The baseline is a copy of a scan result taken at seeding time and
//! is never overwritten automatically. The scan that seeds it is
//! removed from ordinary scan history: history holds only real
//! benchmark runs.

use std::fs;

use tracing::{debug, info};

use crate::project::Project;
use crate::repo::EngineRepository;
use crate::scan::ProjectRunner;

/// A failed baseline seeding, project-scoped.
#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct BaselineFailure {
    pub reason: String,
    /// Captured engine output, when seeding got as far as a scan.
    pub log: Option<String>,
}

/// Ensures a baseline artifact exists for each project.
#[derive(Debug)]
pub struct BaselineManager<'a> {
    repo: &'a EngineRepository,
    runner: &'a ProjectRunner,
    baseline_version: &'a str,
}

impl<'a> BaselineManager<'a> {
    pub fn new(
        repo: &'a EngineRepository,
        runner: &'a ProjectRunner,
        baseline_version: &'a str,
    ) -> Self {
        Self {
            repo,
            runner,
            baseline_version,
        }
    }

    /// Idempotent: an existing baseline is a no-op success; otherwise
    /// scan with the pinned baseline engine and keep only the copy.
    pub async fn ensure(&self, project: &Project) -> Result<(), BaselineFailure> {
        let baseline = project.baseline_file();
        if baseline.exists() {
            debug!(project = %project.name, "baseline already present");
            return Ok(());
        }

        info!(
            project = %project.name,
            version = self.baseline_version,
            "generating baseline"
        );

        let engine = self
            .repo
            .ensure(self.baseline_version)
            .await
            .map_err(|e| BaselineFailure {
                reason: format!("acquiring baseline engine: {e}"),
                log: None,
            })?;

        let scan = self
            .runner
            .scan(&engine, self.baseline_version, project)
            .map_err(|f| BaselineFailure {
                reason: format!("baseline scan: {f}"),
                log: Some(f.log),
            })?;

        let copied = fs::copy(&scan.artifact, &baseline).map_err(|e| BaselineFailure {
            reason: format!("copying baseline to {}: {e}", baseline.display()),
            log: Some(scan.log.clone()),
        });

        // Seeding scans are not benchmark history, success or not.
        let _ = fs::remove_file(&scan.artifact);
        copied?;

        info!(project = %project.name, path = %baseline.display(), "baseline created");
        Ok(())
    }
}
