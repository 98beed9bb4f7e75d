/// Process Engine - Isolated Interpreter Execution
///
/// **Core Responsibility:**
/// Run one script in a fresh interpreter process under a hard wall-clock
/// deadline and capture its raw stdout/stderr.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (scratch file, interpreter, deadline, kill)
/// - Engine does NOT know about framing markers or test harnesses
/// - Engine does NOT judge correctness
/// - Engine returns raw outputs for the executor/evaluator to interpret
///
/// **Execution Rules:**
/// 1. Script is written to a uniquely named scratch file (`academy-<uuid>.py`)
/// 2. A fresh interpreter runs it with the scratch directory as working dir
/// 3. stdout and stderr are drained concurrently as separate streams
/// 4. Deadline = min(requested, configured maximum), at least one second
/// 5. The interpreter leads its own process group; the group is killed when
///    the interpreter exits, at the deadline, and if the call is dropped
/// 6. On deadline no output is trusted
/// 7. The scratch file is removed on every path (drop guard)

use crate::evaluator::ProcessOutput;
use academy_common::config::EngineSettings;
use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

pub const SCRATCH_PREFIX: &str = "academy-";
pub const SCRATCH_SUFFIX: &str = ".py";

/// How long pipes may stay open once the interpreter has exited
const PIPE_GRACE: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 8192;

/// Scratch file cleanup guard - guarantees removal on drop.
/// Covers early returns, panics and cancellation of the calling future.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Create a new, uniquely named file in `dir` holding `contents`
    fn create(dir: &Path, contents: &str) -> Result<Self> {
        let path = dir.join(format!("{}{}{}", SCRATCH_PREFIX, uuid::Uuid::new_v4(), SCRATCH_SUFFIX));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("Failed to create scratch file {}", path.display()))?;

        // From here on the guard owns the path, even if the write fails
        let guard = ScratchFile { path };
        file.write_all(contents.as_bytes())
            .and_then(|_| file.flush())
            .with_context(|| format!("Failed to write scratch file {}", guard.path.display()))?;
        Ok(guard)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }
}

/// Bytes read so far from one child pipe. Shared with the reader task so
/// partial output survives an aborted reader.
type PipeBuffer = Arc<Mutex<Vec<u8>>>;

struct PipeReader {
    task: JoinHandle<()>,
    buffer: PipeBuffer,
}

impl PipeReader {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = PipeBuffer::default();
        let sink = buffer.clone();
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return;
            };
            let mut chunk = [0u8; READ_CHUNK];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        debug!(error = %e, "Error reading child output");
                        break;
                    }
                }
            }
        });
        Self { task, buffer }
    }

    /// Wait for EOF until `deadline`, then return everything read so far.
    /// A pipe still held open (by a process outside the group) is abandoned.
    async fn collect(mut self, deadline: Instant) -> String {
        match tokio::time::timeout_at(deadline, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Output reader task failed"),
            Err(_) => {
                self.task.abort();
                warn!("Output pipe still open after exit; keeping partial output");
            }
        }
        let bytes = std::mem::take(&mut *self.buffer.lock().await);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn abort(&self) {
        self.task.abort();
    }
}

/// Kills the interpreter's whole process group when dropped, so processes
/// started by the script never outlive the call.
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn kill(&self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => warn!(pgid, error = %e, "Failed to kill process group"),
            }
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Runs scripts in isolated interpreter processes.
///
/// Stateless apart from its settings: concurrent calls share nothing but the
/// scratch directory, and every call uses its own scratch file.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    python_bin: String,
    scratch_dir: PathBuf,
    max_timeout_secs: u64,
    max_source_bytes: usize,
}

impl ProcessEngine {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            python_bin: settings.python_bin.clone(),
            scratch_dir: settings.scratch_dir.clone(),
            max_timeout_secs: settings.max_timeout_secs.max(1),
            max_source_bytes: settings.max_source_bytes,
        }
    }

    /// Timeout actually applied for a requested one
    pub fn effective_timeout_secs(&self, requested_secs: u64) -> u64 {
        requested_secs.clamp(1, self.max_timeout_secs)
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Reject learner code above the configured size before anything is spawned
    pub fn check_source_size(&self, code: &str) -> Result<()> {
        if code.len() > self.max_source_bytes {
            bail!(
                "Source code exceeds maximum size of {} bytes",
                self.max_source_bytes
            );
        }
        Ok(())
    }

    /// Run `script` under a deadline of `min(timeout_secs, max)` seconds.
    ///
    /// Errors are host-level failures only (scratch file I/O, interpreter
    /// launch). A non-zero exit or a timeout is a normal `ProcessOutput`.
    #[instrument(skip(self, script), fields(script_bytes = script.len()))]
    pub async fn run_script(&self, script: &str, timeout_secs: u64) -> Result<ProcessOutput> {
        let timeout_secs = self.effective_timeout_secs(timeout_secs);
        let timeout = Duration::from_secs(timeout_secs);

        let scratch = ScratchFile::create(&self.scratch_dir, script)?;
        debug!(path = %scratch.path().display(), timeout_secs, "Scratch file written");

        let start = Instant::now();
        let deadline = start + timeout;

        let mut command = Command::new(&self.python_bin);
        command
            .arg(scratch.path())
            .current_dir(&self.scratch_dir)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to launch interpreter '{}'", self.python_bin))?;
        let group = ProcessGroupGuard { pgid: child.id() };

        let stdout_reader = PipeReader::spawn(child.stdout.take());
        let stderr_reader = PipeReader::spawn(child.stderr.take());

        let output = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(status) => {
                let status = status.context("Failed to wait for interpreter process")?;
                let execution_time_ms = start.elapsed().as_millis() as u64;

                // Background processes left by the script would hold the pipes open
                group.kill();
                let pipe_deadline = Instant::now() + PIPE_GRACE;
                let stdout = stdout_reader.collect(pipe_deadline).await;
                let stderr = stderr_reader.collect(pipe_deadline).await;

                debug!(
                    exit_code = ?status.code(),
                    execution_time_ms,
                    stdout_bytes = stdout.len(),
                    stderr_bytes = stderr.len(),
                    "Interpreter exited"
                );

                ProcessOutput {
                    exit_code: status.code(),
                    stdout,
                    stderr,
                    execution_time_ms,
                    timed_out: false,
                }
            }
            Err(_) => {
                warn!(timeout_secs, "Execution timed out - killing process group");

                group.kill();
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill timed-out interpreter");
                }
                stdout_reader.abort();
                stderr_reader.abort();

                ProcessOutput {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    execution_time_ms: timeout.as_millis() as u64,
                    timed_out: true,
                }
            }
        };

        // Scratch file removed here by the guard
        drop(scratch);
        Ok(output)
    }
}
