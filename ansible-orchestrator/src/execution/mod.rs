//! Process execution for built command specs
//!
//! Handles:
//! - Spawning the engine binary with the `CommandSpec` environment and cwd, nothing inherited
//! - Separate stdout / stderr capture (never interleaved)
//! - Mandatory timeout, killing the whole process group on expiry
//! - Keeping whatever output was captured before a timeout

use crate::commands::CommandSpec;
use crate::error::{OrchestratorError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command as AsyncCommand};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// How long output readers may lag behind process exit
pub const READER_GRACE: Duration = Duration::from_secs(2);

/// Outcome of one external invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// None when the process was killed by a signal (including our timeout)
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Seam between operations and the side effect of spawning processes
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: CommandSpec) -> Result<ExecutionResult>;
}

/// Spawns real child processes
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    grace: Duration,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self { grace: READER_GRACE }
    }
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a spec to completion or timeout. Fails only when the program
    /// cannot be started; a non-zero exit is a normal result.
    pub async fn execute(&self, spec: CommandSpec) -> Result<ExecutionResult> {
        let span = info_span!("command", invocation = %Uuid::new_v4(), program = %spec.program);
        self.execute_inner(spec).instrument(span).await
    }

    async fn execute_inner(&self, spec: CommandSpec) -> Result<ExecutionResult> {
        let start_time = Instant::now();
        info!("Executing: {} (timeout: {}s)", spec.display(), spec.timeout.as_secs());

        let mut command = AsyncCommand::new(&spec.program);
        command
            .args(&spec.args)
            .env_clear()
            .envs(&spec.environment)
            .current_dir(&spec.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| OrchestratorError::Execution {
            program: spec.program.clone(),
            source,
        })?;

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let stdout_task = tokio::spawn(drain(child.stdout.take(), stdout_buf.clone()));
        let stderr_task = tokio::spawn(drain(child.stderr.take(), stderr_buf.clone()));

        let (exit_code, timed_out) = match tokio::time::timeout(spec.timeout, child.wait()).await {
            Ok(status) => (status?.code(), false),
            Err(_) => {
                warn!("Command timed out after {}s, killing process group", spec.timeout.as_secs());
                self.terminate(&mut child).await;
                (None, true)
            }
        };

        // Readers finish once the pipes close; bounded in case a detached
        // grandchild keeps them open
        let readers = async {
            let _ = stdout_task.await;
            let _ = stderr_task.await;
        };
        if tokio::time::timeout(self.grace, readers).await.is_err() {
            debug!("Output readers still open after grace period, keeping partial capture");
        }

        let stdout = String::from_utf8_lossy(&stdout_buf.lock()).into_owned();
        let mut stderr = String::from_utf8_lossy(&stderr_buf.lock()).into_owned();
        if timed_out {
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&format!("Command timed out after {} seconds", spec.timeout.as_secs()));
        }

        let duration = start_time.elapsed();
        debug!(
            "Finished in {}ms (exit: {:?}, timed out: {})",
            duration.as_millis(),
            exit_code,
            timed_out
        );

        Ok(ExecutionResult {
            exit_code,
            stdout,
            stderr,
            duration,
            timed_out,
        })
    }

    async fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                debug!("killpg({}) failed: {}", pid, e);
            }
        }

        let _ = child.start_kill();
        if tokio::time::timeout(self.grace, child.wait()).await.is_err() {
            warn!("Child did not exit after kill");
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessExecutor {
    async fn run(&self, spec: CommandSpec) -> Result<ExecutionResult> {
        self.execute(spec).await
    }
}

async fn drain<R>(reader: Option<R>, sink: Arc<Mutex<Vec<u8>>>)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
        }
    }
}
