//! Shared test infrastructure for integration tests.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A plan written into its own temporary directory, ready for `skit`.
pub struct PlanFixture {
    pub dir: TempDir,
    pub plan_path: PathBuf,
}

/// Parsed result of one `skit` invocation.
#[derive(Debug)]
pub struct SkitRun {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl SkitRun {
    fn from_output(output: Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

pub fn skit_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_skit"))
}

/// Run `skit` with `args`, with logging pinned so stderr stays predictable.
pub fn run_skit<I, S>(args: I) -> SkitRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let output = Command::new(skit_binary())
        .args(args)
        .env("SKIT_LOG", "warn")
        .output()
        .expect("spawn skit");
    SkitRun::from_output(output)
}

/// Skip helper for tests that need a POSIX shell.
pub fn shell_available() -> bool {
    let available = Path::new("/bin/sh").is_file();
    if !available {
        eprintln!("Skipping: /bin/sh not available");
    }
    available
}

impl PlanFixture {
    pub fn new(plan: &Value) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let plan_path = dir.path().join("plan.json");
        std::fs::write(
            &plan_path,
            serde_json::to_string_pretty(plan).expect("encode plan"),
        )
        .expect("write plan");
        Self { dir, plan_path }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn read_json(&self, rel: &str) -> Value {
        let path = self.path(rel);
        let text = std::fs::read_to_string(&path)
            .unwrap_or_else(|err| panic!("read {}: {err}", path.display()));
        serde_json::from_str(&text).expect("parse json")
    }
}
