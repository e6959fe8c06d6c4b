//! Orchestration engine for the driftbench regression-benchmark runner.
//!
//! An external timer invokes one orchestration pass ("tick") at a time.
//! Each tick:
//!
//! - Fetches the latest engine version from the release endpoint
//! - No-ops silently when the stored version is already current
//! - Downloads and validates the new engine binary otherwise
//! - Runs scan + baseline comparison for every registered project
//! - Promotes the stored version only when every project passed
//! - Writes failure reports and applies retention sweeps
//!
//! The scan and comparison algorithms belong to the external engine
//! binary; this crate owns version gating, binary lifecycle, baseline
//! lifecycle, per-project sequencing, and durable run state.
//!
//! # Quick Start
//!
//! ```no_run
//! use driftbench_core::{BenchmarkOrchestrator, Settings};
//!
//! # async fn example() -> driftbench_core::BenchResult<()> {
//! let settings = Settings::from_env();
//! let orchestrator = BenchmarkOrchestrator::with_http_source(settings)?;
//! let outcome = orchestrator.tick().await?;
//! println!("tick finished: {outcome:?}");
//! # Ok(())
//! # }
//! ```
//!
//! A benchmark failure is a reported result, never a process-level
//! error: callers are expected to exit successfully regardless of the
//! tick outcome and let operators read the persisted state and the
//! failure-log directory.

pub mod baseline;
pub mod compare;
pub mod errors;
pub mod failure_log;
pub mod lock;
pub mod orchestrator;
pub mod project;
pub mod repo;
pub mod scan;
pub mod settings;
pub mod state;
pub mod subprocess;
pub mod version;

pub use errors::{BenchError, BenchResult};
pub use lock::InstanceLock;
pub use orchestrator::{BenchmarkOrchestrator, ProjectOutcome, ProjectStatus, TickOutcome};
pub use settings::Settings;
pub use state::{ConfigStore, RunState};
pub use version::{HttpVersionResolver, VersionSource};
