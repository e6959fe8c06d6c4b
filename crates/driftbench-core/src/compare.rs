//! Comparison execution: diff the current scan against the project
//! baseline via the engine's compare mode.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::project::{Project, ReportDirs};
use crate::scan::file_stamp;
use crate::subprocess::{append_run_log, run_subprocess};

/// Comparison verdict. Exit code 0 from the engine means the current
/// scan is within tolerance of the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
}

/// A completed comparison.
#[derive(Debug)]
pub struct CompareOutcome {
    pub verdict: Verdict,
    pub report: PathBuf,
    pub log: String,
}

/// A failed comparison. Diagnosing a mismatch needs the report body,
/// not just the engine log, so the (possibly partial) report path is
/// always carried.
#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct CompareFailure {
    pub reason: String,
    pub log: String,
    pub report: PathBuf,
}

/// Executes `engine compare` invocations for projects.
#[derive(Debug, Clone)]
pub struct ComparisonRunner {
    reports: ReportDirs,
    run_log: PathBuf,
    tolerance_pct: f64,
    timeout: Duration,
}

impl ComparisonRunner {
    pub fn new(
        reports: ReportDirs,
        run_log: PathBuf,
        tolerance_pct: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            reports,
            run_log,
            tolerance_pct,
            timeout,
        }
    }

    /// Compare `current` against `baseline`, writing the report into
    /// the project's comparison directory.
    pub fn compare(
        &self,
        engine: &Path,
        version: &str,
        project: &Project,
        baseline: &Path,
        current: &Path,
    ) -> Result<CompareOutcome, CompareFailure> {
        let out_dir = self.reports.comparison_dir(&project.name);
        if let Err(err) = fs::create_dir_all(&out_dir) {
            return Err(CompareFailure {
                reason: format!("creating {}: {err}", out_dir.display()),
                log: String::new(),
                report: out_dir,
            });
        }
        // The "comparison-" prefix is how the downstream viewer
        // enumerates reports.
        let report = out_dir.join(format!("comparison-{}.json", file_stamp()));
        let tolerance = format!("{}", self.tolerance_pct);

        debug!(project = %project.name, version, report = %report.display(), "running comparison");
        let result = run_subprocess(
            engine,
            &[
                "compare",
                "--baseline",
                &baseline.to_string_lossy(),
                "--current",
                &current.to_string_lossy(),
                "--output",
                &report.to_string_lossy(),
                "--tolerance",
                &tolerance,
            ],
            self.timeout,
        );

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                return Err(CompareFailure {
                    reason: err.to_string(),
                    log: String::new(),
                    report,
                })
            }
        };

        append_run_log(
            &self.run_log,
            &format!(
                "compare {} engine={} ({})",
                project.name,
                version,
                output.describe()
            ),
            &output.output,
        );

        if !output.success() {
            return Err(CompareFailure {
                reason: format!("engine compare {}", output.describe()),
                log: output.output,
                report,
            });
        }

        Ok(CompareOutcome {
            verdict: Verdict::Match,
            report,
            log: output.output,
        })
    }
}
