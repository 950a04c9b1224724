//! Bounded subprocess execution for the fetch fallback tiers.
//!
//! Goals:
//! - **Bounded**: timeouts + stdout caps so a stuck tool cannot hang a request.
//! - **Quiet**: stderr is discarded; callers surface failures as warnings.
//! - **No secrets**: nothing from the environment is dumped into output.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

pub fn which(bin: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let cand = dir.join(bin);
        if cand.is_file() {
            return Some(cand);
        }
    }
    None
}

pub fn has(bin: &str) -> bool {
    which(bin).is_some()
}

/// Run a command and capture stdout (bounded) with a coarse timeout.
///
/// Stdout is drained on a separate thread so a chatty child cannot deadlock
/// on a full pipe while we poll for exit.
pub fn run_stdout_bounded(
    mut cmd: Command,
    timeout: Duration,
    max_stdout_bytes: usize,
) -> Result<Vec<u8>, &'static str> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            "shellout_tool_not_found"
        } else {
            "shellout_spawn_failed"
        }
    })?;

    let Some(stdout) = child.stdout.take() else {
        let _ = child.kill();
        return Err("shellout_no_stdout");
    };
    let reader = std::thread::spawn(move || {
        use std::io::Read;
        let mut buf = Vec::new();
        let _ = stdout
            .take(max_stdout_bytes as u64)
            .read_to_end(&mut buf);
        buf
    });

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().map_err(|_| "shellout_wait_failed")? {
            break status;
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            let _ = reader.join();
            return Err("shellout_timeout");
        }
        std::thread::sleep(Duration::from_millis(25));
    };

    let out = reader.join().map_err(|_| "shellout_read_failed")?;
    if !status.success() {
        return Err("shellout_nonzero_exit");
    }
    Ok(out)
}
