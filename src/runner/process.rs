//! Process-backed runner: launches a build tool inside the workspace.
use super::{InvocationHandle, InvocationRequest, InvocationResult, RunnerFactory, StepContext};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Observed process facts, attached to every `InvocationResult` as detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDetail {
    pub program: PathBuf,
    pub exit_code: Option<i32>,
    pub exit_signal: Option<i32>,
    pub timed_out: bool,
    pub duration_ms: u128,
}

/// Hands out a fresh `ProcessRunner` per step, all sharing one program.
#[derive(Debug, Clone)]
pub struct ProcessRunnerFactory {
    program: PathBuf,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl ProcessRunnerFactory {
    /// Resolve `program` on `PATH` unless it already looks like a path.
    pub fn new(program: &str) -> Result<Self> {
        let program = resolve_program(program)?;
        Ok(Self {
            program,
            env: BTreeMap::new(),
            timeout: None,
        })
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl RunnerFactory for ProcessRunnerFactory {
    fn new_handle(&mut self, step: &StepContext<'_>) -> Result<Box<dyn InvocationHandle>> {
        tracing::debug!(
            step_id = step.step_id,
            index = step.index,
            program = %self.program.display(),
            "create process runner"
        );
        Ok(Box::new(ProcessRunner {
            program: self.program.clone(),
            env: self.env.clone(),
            timeout: self.timeout,
        }))
    }
}

/// Runs the program once per invocation with the request's arguments.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl InvocationHandle for ProcessRunner {
    fn invoke(&mut self, request: &InvocationRequest) -> Result<InvocationResult> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&request.args)
            .current_dir(&request.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in self.env.iter().chain(request.env.iter()) {
            cmd.env(key, value);
        }
        // Own group, so a timeout also reaches grandchildren holding the pipes.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn {}", self.program.display()))?;
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let (status, timed_out) = wait_with_timeout(&mut child, self.timeout)
            .with_context(|| format!("wait for {}", self.program.display()))?;
        let duration_ms = started.elapsed().as_millis();

        let stdout = join_reader(stdout_reader).context("read stdout")?;
        let stderr = join_reader(stderr_reader).context("read stderr")?;

        let detail = ProcessDetail {
            program: self.program.clone(),
            exit_code: status.code(),
            exit_signal: exit_signal(&status),
            timed_out,
            duration_ms,
        };
        tracing::info!(
            step_id = %request.step_id,
            exit_code = ?detail.exit_code,
            timed_out,
            duration_ms,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "process invoke complete"
        );

        Ok(InvocationResult {
            success: status.success() && !timed_out,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            detail: None,
        }
        .with_detail(detail))
    }
}

fn resolve_program(program: &str) -> Result<PathBuf> {
    let trimmed = program.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("program must not be empty"));
    }
    let path = Path::new(trimmed);
    if path.components().count() > 1 || path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    which::which(trimmed).with_context(|| format!("resolve program {trimmed:?} on PATH"))
}

type ReaderHandle = thread::JoinHandle<std::io::Result<Vec<u8>>>;

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> Option<ReaderHandle> {
    source.map(|mut source| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            source.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_reader(handle: Option<ReaderHandle>) -> Result<Vec<u8>> {
    let Some(handle) = handle else {
        return Ok(Vec::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| anyhow!("output reader panicked"))??;
    Ok(bytes)
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> Result<(ExitStatus, bool)> {
    let Some(timeout) = timeout else {
        return Ok((child.wait()?, false));
    };
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        if Instant::now() >= deadline {
            // The child may exit between try_wait and kill.
            if let Err(err) = kill_process_group(child) {
                tracing::debug!(error = %err, "kill after timeout failed");
            }
            let status = child.wait()?;
            return Ok((status, true));
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(child.id())
        .map_err(|_| std::io::Error::other("child pid out of range"))?;
    // SAFETY: killpg takes plain integers; the group was created at spawn.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
