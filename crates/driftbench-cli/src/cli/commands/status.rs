//! Read-only view of the persisted run state.
//!
//! Does not take the instance lock: reading a torn state file is
//! impossible (writes are atomic), and status must work while a tick
//! is in flight.

use driftbench_core::{ConfigStore, Settings};

use crate::cli::args::StatusArgs;
use crate::exit_codes::EXIT_SUCCESS;

pub fn run(args: StatusArgs) -> anyhow::Result<i32> {
    let mut settings = Settings::from_env();
    if let Some(data_dir) = args.data_dir {
        settings.data_dir = data_dir;
    }

    let state = ConfigStore::new(settings.state_file()).load();
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(EXIT_SUCCESS)
}
