//! Structured failure reports, one file per failure occurrence.
//!
//! Reports are human-readable: a fixed header block followed by the
//! captured engine output and, for comparison failures, the report
//! body — a mismatch cannot be diagnosed from the log alone.
//!
//! Retention is a rolling 30-day window. Age is derived from the
//! timestamp embedded in the file name, not the mtime, so the purge
//! is deterministic under backup/restore and testable.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{info, warn};

use crate::errors::{BenchError, BenchResult};
use crate::scan::file_stamp;

/// Rolling retention window for failure reports.
pub const RETENTION_DAYS: i64 = 30;

const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S%3f";

/// What failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Scan,
    Comparison,
}

impl FailureKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Scan => "scan-failure",
            Self::Comparison => "comparison-failure",
        }
    }
}

/// Writes and purges per-failure report files.
#[derive(Debug, Clone)]
pub struct FailureLogger {
    dir: PathBuf,
}

impl FailureLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record a scan failure: header + captured engine output.
    pub fn record_scan_failure(
        &self,
        project: &str,
        version: &str,
        log: &str,
        artifact: Option<&Path>,
    ) -> BenchResult<PathBuf> {
        let mut body = header(FailureKind::Scan, project, version);
        if let Some(artifact) = artifact {
            body.push_str(&format!("result: {}\n", artifact.display()));
        }
        body.push_str("---- engine output ----\n");
        body.push_str(log);
        ensure_trailing_newline(&mut body);
        self.write(FailureKind::Scan, project, &body)
    }

    /// Record a comparison failure: header + engine output + the
    /// (possibly partial) comparison report body.
    pub fn record_comparison_failure(
        &self,
        project: &str,
        version: &str,
        log: &str,
        baseline: &Path,
        current: &Path,
        report: &Path,
    ) -> BenchResult<PathBuf> {
        let mut body = header(FailureKind::Comparison, project, version);
        body.push_str(&format!("baseline: {}\n", baseline.display()));
        body.push_str(&format!("current: {}\n", current.display()));
        body.push_str(&format!("report: {}\n", report.display()));
        body.push_str("---- engine output ----\n");
        body.push_str(log);
        ensure_trailing_newline(&mut body);
        body.push_str("---- comparison report ----\n");
        match fs::read_to_string(report) {
            Ok(report_body) => body.push_str(&report_body),
            Err(_) => body.push_str("(report not written)\n"),
        }
        ensure_trailing_newline(&mut body);
        self.write(FailureKind::Comparison, project, &body)
    }

    /// Delete reports older than `max_age_days`, judged by the stamp
    /// in the file name. Files without a parseable stamp are left
    /// alone. Returns the number of files removed.
    pub fn purge_older_than(&self, max_age_days: i64) -> BenchResult<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(BenchError::io(format!("listing {}", self.dir.display()), err))
            }
        };

        let cutoff = Utc::now() - chrono::Duration::days(max_age_days);
        let mut removed = 0;
        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stamp) = parse_stamp(&name) else {
                continue;
            };
            if stamp >= cutoff {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    info!(file = %name, "purged expired failure report");
                    removed += 1;
                }
                Err(err) => warn!(file = %name, error = %err, "failed to purge failure report"),
            }
        }
        Ok(removed)
    }

    fn write(&self, kind: FailureKind, project: &str, body: &str) -> BenchResult<PathBuf> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| BenchError::io(format!("creating {}", self.dir.display()), e))?;
        let path = self
            .dir
            .join(format!("{}-{}-{}.log", kind.as_str(), project, file_stamp()));
        fs::write(&path, body)
            .map_err(|e| BenchError::io(format!("writing {}", path.display()), e))?;
        Ok(path)
    }
}

fn header(kind: FailureKind, project: &str, version: &str) -> String {
    format!(
        "project: {project}\nengine-version: {version}\ntimestamp: {}\nfailure: {}\n",
        Utc::now().to_rfc3339(),
        kind.as_str()
    )
}

fn ensure_trailing_newline(body: &mut String) {
    if !body.ends_with('\n') {
        body.push('\n');
    }
}

/// Extract `YYYYmmdd-HHMMSSmmm` from `<kind>-<project>-<stamp>.log`.
/// The project name may itself contain dashes, so the stamp is the
/// last two dash-separated segments.
fn parse_stamp(file_name: &str) -> Option<DateTime<Utc>> {
    let stem = file_name.strip_suffix(".log")?;
    let mut parts = stem.rsplitn(3, '-');
    let time_part = parts.next()?;
    let date_part = parts.next()?;
    let stamp = format!("{date_part}-{time_part}");
    NaiveDateTime::parse_from_str(&stamp, STAMP_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}
