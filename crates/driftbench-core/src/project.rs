//! Registered projects and the report directory layout.
//!
//! A project is one subdirectory under the configs root:
//!
//! ```text
//! <configs-dir>/<name>/
//!   config.json     # scan parameters, opaque to the orchestrator
//!   baseline.json   # generated on first encounter
//! ```
//!
//! Reports land under `<reports-dir>/<name>/scan/` and
//! `<reports-dir>/<name>/comparison/`, enumerated by an external
//! viewer.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{BenchError, BenchResult};

/// One registered benchmark target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub dir: PathBuf,
}

impl Project {
    pub fn config_file(&self) -> PathBuf {
        self.dir.join("config.json")
    }

    pub fn baseline_file(&self) -> PathBuf {
        self.dir.join("baseline.json")
    }

    /// A project without a readable config is skipped entirely, not
    /// counted as failed.
    pub fn has_readable_config(&self) -> bool {
        fs::File::open(self.config_file()).is_ok()
    }
}

/// Per-project report namespaces under the reports root.
#[derive(Debug, Clone)]
pub struct ReportDirs {
    root: PathBuf,
}

impl ReportDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn scan_dir(&self, project: &str) -> PathBuf {
        self.root.join(project).join("scan")
    }

    pub fn comparison_dir(&self, project: &str) -> PathBuf {
        self.root.join(project).join("comparison")
    }
}

/// List registered projects in deterministic (lexicographic) order.
///
/// A missing configs root is a deployment fault, not a benchmark
/// outcome, and propagates as an error.
pub fn discover(configs_dir: &Path) -> BenchResult<Vec<Project>> {
    let entries = fs::read_dir(configs_dir)
        .map_err(|e| BenchError::io(format!("listing projects in {}", configs_dir.display()), e))?;

    let mut projects: Vec<Project> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| Project {
            name: e.file_name().to_string_lossy().into_owned(),
            dir: e.path(),
        })
        .collect();
    projects.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discover_lists_directories_sorted_and_ignores_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("zeta")).unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        fs::write(dir.path().join("README.md"), "not a project").unwrap();

        let projects = discover(dir.path()).unwrap();
        let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }

    #[test]
    fn missing_configs_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = discover(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, BenchError::Io { .. }));
    }

    #[test]
    fn config_readability_gate() {
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join("alpha");
        fs::create_dir(&project_dir).unwrap();
        let project = Project {
            name: "alpha".into(),
            dir: project_dir.clone(),
        };

        assert!(!project.has_readable_config());
        fs::write(project.config_file(), "{}").unwrap();
        assert!(project.has_readable_config());
    }

    #[test]
    fn report_dirs_are_namespaced_per_project() {
        let dirs = ReportDirs::new("/reports");
        assert_eq!(dirs.scan_dir("alpha"), Path::new("/reports/alpha/scan"));
        assert_eq!(
            dirs.comparison_dir("alpha"),
            Path::new("/reports/alpha/comparison")
        );
    }
}
