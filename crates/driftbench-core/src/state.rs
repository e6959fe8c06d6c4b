//! Durable run state, persisted as a flat `key=value` text file.
//!
//! The file is the single record an external viewer or operator reads
//! to learn what the last tick did. Writes are atomic (temp file in
//! the same directory, then rename) so a crash mid-write never leaves
//! a torn state file. An absent or unreadable file is equivalent to
//! all keys being empty; the store lazily re-initializes on the next
//! save.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{BenchError, BenchResult};

const KEY_CURRENT_VERSION: &str = "current_version";
const KEY_LAST_RUN_TIME: &str = "last_run_time";
const KEY_LAST_CHECK_TIME: &str = "last_check_time";
const KEY_ENGINE_PATH: &str = "engine_path";
const KEY_TOTAL_RUNS: &str = "total_runs";
const KEY_LAST_RUN_SUCCESS: &str = "last_run_success";
const KEY_LAST_RUN_ERROR: &str = "last_run_error";

const HEADER: &str = "# driftbench run state\n\
                      # maintained by the orchestrator; one key=value per line\n";

/// Typed view of the persisted run state.
///
/// `current_version` is the last engine version for which every
/// registered project passed; it is deliberately NOT the last version
/// downloaded, so an interrupted or partially-failed run is retried
/// in full on the next tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub current_version: Option<String>,
    pub last_run_time: Option<DateTime<Utc>>,
    pub last_check_time: Option<DateTime<Utc>>,
    pub engine_path: Option<PathBuf>,
    /// Count of fully-successful benchmark runs.
    pub total_runs: u64,
    pub last_run_success: Option<bool>,
    pub last_run_error: Option<String>,
}

/// Reader/writer for the run-state file.
///
/// No internal locking: callers must hold the instance lock before
/// mutating.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state file. Absent, unreadable, or partially garbled
    /// files degrade to default values rather than failing the tick.
    pub fn load(&self) -> RunState {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return RunState::default(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "state file unreadable, re-initializing");
                return RunState::default();
            }
        };
        parse_state(&text)
    }

    /// Atomically rewrite the whole state file.
    pub fn save(&self, state: &RunState) -> BenchResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| BenchError::ConfigIo {
                path: self.path.clone(),
                source,
            })?;
        }

        let tmp = self.path.with_extension("state.tmp");
        fs::write(&tmp, render_state(state)).map_err(|source| BenchError::ConfigIo {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| BenchError::ConfigIo {
            path: self.path.clone(),
            source,
        })
    }
}

fn parse_state(text: &str) -> RunState {
    let mut state = RunState::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            KEY_CURRENT_VERSION => state.current_version = non_empty(value),
            KEY_LAST_RUN_TIME => state.last_run_time = parse_time(value),
            KEY_LAST_CHECK_TIME => state.last_check_time = parse_time(value),
            KEY_ENGINE_PATH => state.engine_path = non_empty(value).map(PathBuf::from),
            // Unset or non-numeric counters read as 0.
            KEY_TOTAL_RUNS => state.total_runs = value.parse().unwrap_or(0),
            KEY_LAST_RUN_SUCCESS => {
                state.last_run_success = match value {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                }
            }
            KEY_LAST_RUN_ERROR => state.last_run_error = non_empty(value),
            _ => {}
        }
    }
    state
}

fn render_state(state: &RunState) -> String {
    let mut out = String::from(HEADER);
    push_kv(
        &mut out,
        KEY_CURRENT_VERSION,
        state.current_version.as_deref().unwrap_or(""),
    );
    push_kv(&mut out, KEY_LAST_RUN_TIME, &render_time(state.last_run_time));
    push_kv(
        &mut out,
        KEY_LAST_CHECK_TIME,
        &render_time(state.last_check_time),
    );
    push_kv(
        &mut out,
        KEY_ENGINE_PATH,
        &state
            .engine_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
    );
    push_kv(&mut out, KEY_TOTAL_RUNS, &state.total_runs.to_string());
    push_kv(
        &mut out,
        KEY_LAST_RUN_SUCCESS,
        match state.last_run_success {
            Some(true) => "true",
            Some(false) => "false",
            None => "",
        },
    );
    push_kv(
        &mut out,
        KEY_LAST_RUN_ERROR,
        // The value must stay a single line.
        &state
            .last_run_error
            .as_deref()
            .unwrap_or("")
            .replace('\n', " "),
    );
    out
}

fn push_kv(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push('=');
    out.push_str(value);
    out.push('\n');
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn render_time(value: Option<DateTime<Utc>>) -> String {
    value.map(|t| t.to_rfc3339()).unwrap_or_default()
}
