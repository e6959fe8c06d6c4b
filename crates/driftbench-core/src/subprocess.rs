//! Blocking subprocess execution with captured output and a hard
//! timeout.
//!
//! The engine binary is an opaque dependency: it may hang, crash, or
//! spew unbounded output. Every invocation therefore gets a kill-on-
//! timeout deadline and capped, combined stdout/stderr capture. Both
//! the scanner and the comparison runner go through this one utility
//! so orchestration code never touches process-spawning mechanics.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::warn;

use crate::errors::{BenchError, BenchResult};

/// Keep captured output bounded; a misbehaving engine must not eat
/// the orchestrator's memory.
const MAX_CAPTURE_BYTES: usize = 64 * 1024;

/// Outcome of one subprocess invocation.
#[derive(Debug)]
pub struct SubprocessOutput {
    /// Exit code, if the process completed before the deadline.
    pub exit_code: Option<i32>,
    /// Combined stdout + stderr, capped at 64 KiB.
    pub output: String,
    /// Whether the process was killed at the deadline.
    pub timed_out: bool,
}

impl SubprocessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    /// Short human-readable classification for error messages.
    pub fn describe(&self) -> String {
        if self.timed_out {
            "timed out".to_string()
        } else {
            match self.exit_code {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            }
        }
    }
}

/// Run `cmd args..`, capture combined output, kill at the deadline.
pub fn run_subprocess(cmd: &Path, args: &[&str], timeout: Duration) -> BenchResult<SubprocessOutput> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BenchError::io(format!("spawning {}", cmd.display()), e))?;

    // Drain both pipes off-thread so a chatty child never deadlocks
    // against a full pipe buffer while we poll for exit.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_handle = std::thread::spawn(move || drain(stdout));
    let err_handle = std::thread::spawn(move || drain(stderr));

    let (exit_code, timed_out) = match wait_timeout(&mut child, timeout) {
        Ok(Some(status)) => (status.code(), false),
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait(); // reap
            (None, true)
        }
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BenchError::io(
                format!("waiting for {}", cmd.display()),
                err,
            ));
        }
    };

    let mut output = out_handle.join().unwrap_or_default();
    let errout = err_handle.join().unwrap_or_default();
    if !errout.is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&errout);
    }
    cap_output(&mut output);

    Ok(SubprocessOutput {
        exit_code,
        output,
        timed_out,
    })
}

/// Append one invocation's captured output to the rolling run log.
/// Logging must never fail the run; errors are reported and dropped.
pub(crate) fn append_run_log(log_path: &Path, header: &str, body: &str) {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(log_path)?;
        writeln!(file, "=== {header}")?;
        writeln!(file, "{}", body.trim_end())?;
        Ok(())
    };
    if let Err(err) = write() {
        warn!(path = %log_path.display(), error = %err, "failed to append run log");
    }
}

/// Cap captured output without splitting a multi-byte character; the
/// lossy decode above can place one right at the byte limit.
fn cap_output(output: &mut String) {
    if output.len() <= MAX_CAPTURE_BYTES {
        return;
    }
    let mut cut = MAX_CAPTURE_BYTES;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }
    output.truncate(cut);
}

fn drain(pipe: Option<impl Read>) -> String {
    let mut buf = String::new();
    if let Some(mut pipe) = pipe {
        // Lossy handling is fine: engine output is diagnostic text.
        let mut bytes = Vec::new();
        let _ = pipe.read_to_end(&mut bytes);
        buf = String::from_utf8_lossy(&bytes).into_owned();
    }
    buf
}

fn wait_timeout(
    child: &mut std::process::Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let start = std::time::Instant::now();
    let poll_interval = Duration::from_millis(50);

    loop {
        match child.try_wait()? {
            Some(status) => return Ok(Some(status)),
            None => {
                if start.elapsed() >= timeout {
                    return Ok(None);
                }
                std::thread::sleep(poll_interval);
            }
        }
    }
}
