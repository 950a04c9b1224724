//! Challenge-solving fetch via the python `cloudscraper` package.
//!
//! This is the last fetch tier: it only runs when a body already looks like
//! a bot-challenge page and the runtime allows subprocesses. Provisioning is
//! lazy and idempotent (check-then-create, tolerant of redundant creation),
//! so concurrent requests may race it safely.

use crate::shellout;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

const VENV_CREATE_TIMEOUT: Duration = Duration::from_secs(120);
const IMPORT_PROBE_TIMEOUT: Duration = Duration::from_secs(15);
const PIP_INSTALL_TIMEOUT: Duration = Duration::from_secs(180);
const FETCH_TIMEOUT: Duration = Duration::from_secs(90);
const MAX_FETCH_BYTES: usize = 15 * 1024 * 1024;

/// The fetch script shipped into the interpreter environment. It prints the
/// page body to stdout and uses exit codes for the two failure classes
/// (missing dependency vs fetch failure).
const FETCH_SCRIPT: &str = r#"#!/usr/bin/env python3
import sys

try:
    import cloudscraper
except Exception as exc:
    sys.stderr.write(f"cloudscraper_import_failed:{exc}\n")
    sys.exit(2)


def main() -> int:
    if len(sys.argv) < 2:
        sys.stderr.write("missing_url\n")
        return 2

    url = str(sys.argv[1] or "").strip()
    if not url:
        sys.stderr.write("missing_url\n")
        return 2

    try:
        scraper = cloudscraper.create_scraper(
            browser={"browser": "chrome", "platform": "darwin", "mobile": False}
        )
        resp = scraper.get(url, timeout=45)
        sys.stdout.write(resp.text or "")
        return 0
    except Exception as exc:
        sys.stderr.write(f"cloudscraper_fetch_failed:{exc}\n")
        return 1


if __name__ == "__main__":
    raise SystemExit(main())
"#;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
pub struct Cloudscrape {
    venv_dir: PathBuf,
}

impl Cloudscrape {
    pub fn new(venv_dir: PathBuf) -> Self {
        Self { venv_dir }
    }

    /// Default location: `READRANK_CF_VENV_DIR` or `.venv_cf` under the
    /// working directory.
    pub fn from_env() -> Self {
        let dir = env("READRANK_CF_VENV_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".venv_cf"));
        Self::new(dir)
    }

    fn python_bin(&self) -> PathBuf {
        self.venv_dir.join("bin").join("python")
    }

    fn script_path(&self) -> PathBuf {
        self.venv_dir.join("cf_fetch.py")
    }

    /// Provision the interpreter environment if missing. Each step is
    /// individually time-bounded; a redundant run is a cheap no-op.
    fn ensure_env(&self) -> Result<(), &'static str> {
        if !self.python_bin().is_file() {
            if !shellout::has("python3") {
                return Err("cloudscrape_python_missing");
            }
            let mut cmd = Command::new("python3");
            cmd.arg("-m").arg("venv").arg(&self.venv_dir);
            shellout::run_stdout_bounded(cmd, VENV_CREATE_TIMEOUT, 64 * 1024)
                .map_err(|_| "cloudscrape_venv_create_failed")?;
        }

        let mut probe = Command::new(self.python_bin());
        probe.args(["-c", "import cloudscraper"]);
        if shellout::run_stdout_bounded(probe, IMPORT_PROBE_TIMEOUT, 64 * 1024).is_err() {
            let mut install = Command::new(self.python_bin());
            install.args(["-m", "pip", "install", "-q", "cloudscraper"]);
            shellout::run_stdout_bounded(install, PIP_INSTALL_TIMEOUT, 1024 * 1024)
                .map_err(|_| "cloudscrape_install_failed")?;
        }

        std::fs::write(self.script_path(), FETCH_SCRIPT)
            .map_err(|_| "cloudscrape_script_write_failed")?;
        Ok(())
    }

    /// Fetch a URL through the challenge solver. Blocking; callers run it on
    /// a blocking task.
    pub fn fetch(&self, url: &str) -> Result<String, &'static str> {
        self.ensure_env()?;
        let mut cmd = Command::new(self.python_bin());
        cmd.arg(self.script_path()).arg(url);
        let out = shellout::run_stdout_bounded(cmd, FETCH_TIMEOUT, MAX_FETCH_BYTES)
            .map_err(|_| "cloudscrape_fetch_failed")?;
        Ok(String::from_utf8_lossy(&out).to_string())
    }

    pub fn venv_dir(&self) -> &Path {
        &self.venv_dir
    }
}
