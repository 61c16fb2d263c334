//! Runner factory binding.
//!
//! The engine never launches a build itself: for every step it asks a
//! `RunnerFactory` for an `InvocationHandle` and calls it once. Whether the
//! factory hands out fresh handles or reuses one is its own business.
mod process;

pub use process::{ProcessDetail, ProcessRunner, ProcessRunnerFactory};

use anyhow::Result;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Step being prepared, handed to the factory when a handle is requested.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub step_id: &'a str,
    pub index: usize,
    pub workspace: &'a Path,
}

/// Arguments and environment for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub step_id: String,
    pub workspace: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// Raw result reported by an invocation handle.
#[derive(Clone, Default)]
pub struct InvocationResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub detail: Option<Arc<dyn Any + Send + Sync>>,
}

impl InvocationResult {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// Attach the build tool's own result object for later inspection.
    pub fn with_detail<T: Any + Send + Sync>(mut self, detail: T) -> Self {
        self.detail = Some(Arc::new(detail));
        self
    }
}

impl fmt::Debug for InvocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationResult")
            .field("success", &self.success)
            .field("stdout_bytes", &self.stdout.len())
            .field("stderr_bytes", &self.stderr.len())
            .field("has_detail", &self.detail.is_some())
            .finish()
    }
}

/// Something able to run one build and report pass/fail plus output.
pub trait InvocationHandle {
    fn invoke(&mut self, request: &InvocationRequest) -> Result<InvocationResult>;
}

impl<F> InvocationHandle for F
where
    F: FnMut(&InvocationRequest) -> Result<InvocationResult>,
{
    fn invoke(&mut self, request: &InvocationRequest) -> Result<InvocationResult> {
        self(request)
    }
}

/// Supplier of invocation handles, asked once per step.
pub trait RunnerFactory {
    fn new_handle(&mut self, step: &StepContext<'_>) -> Result<Box<dyn InvocationHandle>>;
}

/// Any `FnMut() -> H` closure supplies handles, one call per step.
impl<F, H> RunnerFactory for F
where
    F: FnMut() -> H,
    H: InvocationHandle + 'static,
{
    fn new_handle(&mut self, _step: &StepContext<'_>) -> Result<Box<dyn InvocationHandle>> {
        Ok(Box::new(self()))
    }
}
