use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "driftbench",
    version,
    about = "Scheduled regression-benchmark runner — detects new engine releases and benchmarks them against per-project baselines"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one orchestration pass (invoked by an external timer)
    Tick(TickArgs),
    /// Print the persisted run state as JSON
    Status(StatusArgs),
}

#[derive(Parser, Debug)]
pub struct TickArgs {
    /// Root data directory (state, lock, engine cache, logs)
    #[arg(long, env = "DRIFTBENCH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory with one subdirectory per registered project
    #[arg(long, env = "DRIFTBENCH_CONFIGS_DIR")]
    pub configs_dir: Option<PathBuf>,

    /// Directory receiving scan and comparison artifacts
    #[arg(long, env = "DRIFTBENCH_REPORTS_DIR")]
    pub reports_dir: Option<PathBuf>,

    /// Endpoint returning the latest engine version as plain text
    #[arg(long, env = "DRIFTBENCH_VERSION_URL")]
    pub version_url: Option<String>,

    /// Binary download URL template; {version} is substituted
    #[arg(long, env = "DRIFTBENCH_DOWNLOAD_URL")]
    pub download_url: Option<String>,

    /// Pinned engine version used to seed baselines
    #[arg(long, env = "DRIFTBENCH_BASELINE_VERSION")]
    pub baseline_version: Option<String>,

    /// Comparison tolerance in percent
    #[arg(long, env = "DRIFTBENCH_TOLERANCE_PCT")]
    pub tolerance: Option<f64>,
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Root data directory holding the state file
    #[arg(long, env = "DRIFTBENCH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}
