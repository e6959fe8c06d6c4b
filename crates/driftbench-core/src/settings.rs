//! Runtime settings for the orchestrator.
//!
//! Resolution order is defaults < environment < CLI flags; the CLI
//! layer applies flag overrides on top of [`Settings::from_env`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Orchestrator settings: endpoints, directories, and tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root data directory; run state, lock file, engine cache, the
    /// rolling run log, and failure reports live under it.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory containing one subdirectory per registered project.
    #[serde(default = "default_configs_dir")]
    pub configs_dir: PathBuf,

    /// Directory receiving per-project scan and comparison artifacts.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Endpoint returning the latest engine version as plain text.
    #[serde(default = "default_version_url")]
    pub version_url: String,

    /// Download URL template; `{version}` is substituted per release.
    #[serde(default = "default_download_url")]
    pub download_url_template: String,

    /// Pinned engine version used to seed project baselines.
    #[serde(default = "default_baseline_version")]
    pub baseline_version: String,

    /// Comparison tolerance in percent.
    #[serde(default = "default_tolerance_pct")]
    pub tolerance_pct: f64,

    /// Connect timeout for the version fetch, seconds.
    #[serde(default = "default_fetch_connect_secs")]
    pub fetch_connect_secs: u64,

    /// Total timeout for the version fetch, seconds.
    #[serde(default = "default_fetch_total_secs")]
    pub fetch_total_secs: u64,

    /// Connect timeout for the binary download, seconds.
    #[serde(default = "default_download_connect_secs")]
    pub download_connect_secs: u64,

    /// Total timeout for the binary download, seconds.
    #[serde(default = "default_download_total_secs")]
    pub download_total_secs: u64,

    /// Timeout for one engine scan, seconds.
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    /// Timeout for one engine comparison, seconds.
    #[serde(default = "default_compare_timeout_secs")]
    pub compare_timeout_secs: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".driftbench")
}

fn default_configs_dir() -> PathBuf {
    PathBuf::from("projects")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_version_url() -> String {
    "https://downloads.driftengine.io/latest-version.txt".to_string()
}

fn default_download_url() -> String {
    "https://downloads.driftengine.io/engine-{version}".to_string()
}

fn default_baseline_version() -> String {
    "4.0.0".to_string()
}

fn default_tolerance_pct() -> f64 {
    5.0
}

fn default_fetch_connect_secs() -> u64 {
    5
}

fn default_fetch_total_secs() -> u64 {
    15
}

fn default_download_connect_secs() -> u64 {
    10
}

fn default_download_total_secs() -> u64 {
    120
}

fn default_scan_timeout_secs() -> u64 {
    600
}

fn default_compare_timeout_secs() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            configs_dir: default_configs_dir(),
            reports_dir: default_reports_dir(),
            version_url: default_version_url(),
            download_url_template: default_download_url(),
            baseline_version: default_baseline_version(),
            tolerance_pct: default_tolerance_pct(),
            fetch_connect_secs: default_fetch_connect_secs(),
            fetch_total_secs: default_fetch_total_secs(),
            download_connect_secs: default_download_connect_secs(),
            download_total_secs: default_download_total_secs(),
            scan_timeout_secs: default_scan_timeout_secs(),
            compare_timeout_secs: default_compare_timeout_secs(),
        }
    }
}

impl Settings {
    /// Create settings from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `DRIFTBENCH_DATA_DIR` | Root data directory |
    /// | `DRIFTBENCH_CONFIGS_DIR` | Registered-projects directory |
    /// | `DRIFTBENCH_REPORTS_DIR` | Report output directory |
    /// | `DRIFTBENCH_VERSION_URL` | Latest-version endpoint |
    /// | `DRIFTBENCH_DOWNLOAD_URL` | Binary download URL template |
    /// | `DRIFTBENCH_BASELINE_VERSION` | Pinned baseline engine version |
    /// | `DRIFTBENCH_TOLERANCE_PCT` | Comparison tolerance (percent) |
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(v) = std::env::var("DRIFTBENCH_DATA_DIR") {
            settings.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DRIFTBENCH_CONFIGS_DIR") {
            settings.configs_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DRIFTBENCH_REPORTS_DIR") {
            settings.reports_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DRIFTBENCH_VERSION_URL") {
            settings.version_url = v;
        }
        if let Ok(v) = std::env::var("DRIFTBENCH_DOWNLOAD_URL") {
            settings.download_url_template = v;
        }
        if let Ok(v) = std::env::var("DRIFTBENCH_BASELINE_VERSION") {
            settings.baseline_version = v;
        }
        if let Ok(v) = std::env::var("DRIFTBENCH_TOLERANCE_PCT") {
            if let Ok(parsed) = v.parse() {
                settings.tolerance_pct = parsed;
            }
        }
        settings
    }

    /// Path of the flat key=value run-state file.
    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("driftbench.state")
    }

    /// Path of the single-instance lock file.
    pub fn lock_file(&self) -> PathBuf {
        self.data_dir.join("driftbench.lock")
    }

    /// Cache directory for versioned engine binaries.
    pub fn engines_dir(&self) -> PathBuf {
        self.data_dir.join("engines")
    }

    /// Directory receiving per-failure report files.
    pub fn failures_dir(&self) -> PathBuf {
        self.data_dir.join("failures")
    }

    /// The rolling operator log all subprocess output is appended to.
    pub fn run_log(&self) -> PathBuf {
        self.data_dir.join("driftbench.log")
    }

    pub fn fetch_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_connect_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_total_secs)
    }

    pub fn download_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.download_connect_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_total_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn compare_timeout(&self) -> Duration {
        Duration::from_secs(self.compare_timeout_secs)
    }

    /// Rebase the three configurable roots under `root`. Used by tests
    /// and by deployments that keep everything under one directory.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        self.data_dir = root.join(self.data_dir);
        self.configs_dir = root.join(self.configs_dir);
        self.reports_dir = root.join(self.reports_dir);
        self
    }
}
