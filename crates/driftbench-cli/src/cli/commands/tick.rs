//! One orchestration pass.
//!
//! Exit behavior is deliberate: every outcome — up to date, benchmark
//! failure, network error, another instance already running — exits
//! with success. The scheduler only ever sees "the tick ran"; the
//! result lives in the state file and the failure-log directory.

use tracing::{error, info, warn};

use driftbench_core::{BenchError, BenchmarkOrchestrator, InstanceLock, Settings, TickOutcome};

use crate::cli::args::TickArgs;
use crate::exit_codes::EXIT_SUCCESS;

pub async fn run(args: TickArgs) -> anyhow::Result<i32> {
    let settings = apply_overrides(Settings::from_env(), args);

    let _lock = match InstanceLock::acquire(settings.lock_file()) {
        Ok(lock) => lock,
        Err(BenchError::AlreadyRunning { pid }) => {
            info!(pid, "another instance is running, skipping this tick");
            return Ok(EXIT_SUCCESS);
        }
        Err(err) => {
            error!(error = %err, "could not acquire instance lock");
            return Ok(EXIT_SUCCESS);
        }
    };

    let orchestrator = match BenchmarkOrchestrator::with_http_source(settings) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            error!(error = %err, "could not initialize orchestrator");
            return Ok(EXIT_SUCCESS);
        }
    };

    match orchestrator.tick().await {
        Ok(TickOutcome::UpToDate { version }) => {
            info!(version = %version, "engine is up to date, nothing to do");
        }
        Ok(TickOutcome::CheckFailed { error }) => {
            warn!(error = %error, "tick aborted before running projects");
        }
        Ok(TickOutcome::AllPassed { version, outcomes }) => {
            info!(version = %version, projects = outcomes.len(), "all projects passed");
        }
        Ok(TickOutcome::SomeFailed { version, outcomes }) => {
            let failed = outcomes.iter().filter(|o| !o.passed()).count();
            warn!(
                version = %version,
                failed,
                total = outcomes.len(),
                "benchmark run had failures; see the failure-log directory"
            );
        }
        Err(err) => {
            // Unexpected fault (missing configs root, unwritable
            // state). Reported, never fatal to the scheduler.
            error!(error = %err, "tick failed");
        }
    }

    Ok(EXIT_SUCCESS)
}

fn apply_overrides(mut settings: Settings, args: TickArgs) -> Settings {
    if let Some(v) = args.data_dir {
        settings.data_dir = v;
    }
    if let Some(v) = args.configs_dir {
        settings.configs_dir = v;
    }
    if let Some(v) = args.reports_dir {
        settings.reports_dir = v;
    }
    if let Some(v) = args.version_url {
        settings.version_url = v;
    }
    if let Some(v) = args.download_url {
        settings.download_url_template = v;
    }
    if let Some(v) = args.baseline_version {
        settings.baseline_version = v;
    }
    if let Some(v) = args.tolerance {
        settings.tolerance_pct = v;
    }
    settings
}
