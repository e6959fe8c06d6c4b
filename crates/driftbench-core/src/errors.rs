//! Error types for the orchestration engine.

use std::path::PathBuf;

/// Orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Version fetch or binary download failed at the transport level.
    #[error("network error: {message}")]
    Network { message: String },

    /// Downloaded engine artifact failed validation.
    #[error("invalid engine download for {version}: {reason}")]
    DownloadValidation { version: String, reason: String },

    /// Another orchestrator instance holds the lock. Benign: callers
    /// skip the tick and exit successfully.
    #[error("another instance is running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    /// Engine scan failed for one project.
    #[error("scan failed for {project}: {reason}")]
    Scan { project: String, reason: String },

    /// Baseline seeding failed for one project.
    #[error("baseline generation failed for {project}: {reason}")]
    Baseline { project: String, reason: String },

    /// Engine comparison failed for one project.
    #[error("comparison failed for {project}: {reason}")]
    Compare { project: String, reason: String },

    /// Run-state file could not be written.
    #[error("state io error at {}: {source}", .path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem failure outside the state file.
    #[error("io error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BenchError {
    /// Whether the error is scoped to a single project. Project-scoped
    /// failures are counted and logged; the batch continues.
    pub fn is_project_scoped(&self) -> bool {
        matches!(
            self,
            Self::Scan { .. } | Self::Baseline { .. } | Self::Compare { .. }
        )
    }

    /// Whether the error is a benign skip rather than a fault.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::AlreadyRunning { .. })
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for orchestration operations.
pub type BenchResult<T> = Result<T, BenchError>;
