//! Scan execution: run the engine against one project config and
//! validate the produced artifact.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::project::{Project, ReportDirs};
use crate::subprocess::{append_run_log, run_subprocess};

/// File-name timestamp, millisecond resolution so a baseline-seeding
/// scan and the run's real scan never collide within one second.
pub(crate) fn file_stamp() -> String {
    Utc::now().format("%Y%m%d-%H%M%S%3f").to_string()
}

/// A completed scan: the artifact path plus the captured engine log.
#[derive(Debug)]
pub struct ScanOutcome {
    pub artifact: PathBuf,
    pub log: String,
}

/// A failed scan, with everything the failure logger needs.
#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct ScanFailure {
    pub reason: String,
    pub log: String,
    /// The output path the engine was asked to write (already deleted
    /// if it existed; recorded for the failure report).
    pub artifact: Option<PathBuf>,
}

/// Executes `engine scan` invocations for projects.
#[derive(Debug, Clone)]
pub struct ProjectRunner {
    reports: ReportDirs,
    run_log: PathBuf,
    timeout: Duration,
}

impl ProjectRunner {
    pub fn new(reports: ReportDirs, run_log: PathBuf, timeout: Duration) -> Self {
        Self {
            reports,
            run_log,
            timeout,
        }
    }

    /// Run one scan. The artifact lands in the project's scan-history
    /// directory; a failed or empty-output scan never leaves an
    /// artifact behind.
    pub fn scan(
        &self,
        engine: &Path,
        version: &str,
        project: &Project,
    ) -> Result<ScanOutcome, ScanFailure> {
        let out_dir = self.reports.scan_dir(&project.name);
        if let Err(err) = fs::create_dir_all(&out_dir) {
            return Err(ScanFailure {
                reason: format!("creating {}: {err}", out_dir.display()),
                log: String::new(),
                artifact: None,
            });
        }
        let artifact = out_dir.join(format!("scan-{}.json", file_stamp()));
        let config = project.config_file();

        debug!(project = %project.name, version, artifact = %artifact.display(), "running scan");
        let result = run_subprocess(
            engine,
            &[
                "scan",
                "--config",
                &config.to_string_lossy(),
                "--output",
                &artifact.to_string_lossy(),
            ],
            self.timeout,
        );

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                remove_partial(&artifact);
                return Err(ScanFailure {
                    reason: err.to_string(),
                    log: String::new(),
                    artifact: Some(artifact),
                });
            }
        };

        append_run_log(
            &self.run_log,
            &format!(
                "scan {} engine={} ({})",
                project.name,
                version,
                output.describe()
            ),
            &output.output,
        );

        if !output.success() {
            remove_partial(&artifact);
            return Err(ScanFailure {
                reason: format!("engine scan {}", output.describe()),
                log: output.output,
                artifact: Some(artifact),
            });
        }

        // Exit 0 with no usable output is a failure, not a pass.
        let usable = fs::metadata(&artifact).map(|m| m.len() > 0).unwrap_or(false);
        if !usable {
            remove_partial(&artifact);
            return Err(ScanFailure {
                reason: "engine exited 0 but wrote no usable output".to_string(),
                log: output.output,
                artifact: Some(artifact),
            });
        }

        Ok(ScanOutcome {
            artifact,
            log: output.output,
        })
    }
}

fn remove_partial(artifact: &Path) {
    match fs::remove_file(artifact) {
        Ok(()) => debug!(path = %artifact.display(), "removed partial scan artifact"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %artifact.display(), error = %err, "failed to remove partial artifact"),
    }
}
