/// Snippet Executor
///
/// **Responsibility:**
/// Run arbitrary learner code and hand back its stdout/stderr, timing and
/// success flag as an `ExecutionResult`.
///
/// **Architecture:**
/// 1. `script::execution_wrapper` buffers learner output inside the child
/// 2. `ProcessEngine` runs the wrapper under the deadline
/// 3. `framing::unframe` recovers the two streams from the child's stdout
///
/// Every failure mode ends up in the returned result; `execute` never errors.

use crate::engine::ProcessEngine;
use crate::framing;
use crate::script;
use academy_common::types::{ExecutionRequest, ExecutionResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct Executor {
    engine: Arc<ProcessEngine>,
    preamble: Vec<String>,
}

impl Executor {
    pub fn new(engine: Arc<ProcessEngine>, preamble: Vec<String>) -> Self {
        Self { engine, preamble }
    }

    /// Run `request.code` with the preamble pre-imported
    #[instrument(skip(self, request), fields(timeout_secs = request.timeout_seconds, code_bytes = request.code.len()))]
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let start = Instant::now();
        let timeout_secs = self.engine.effective_timeout_secs(request.timeout_seconds);

        if let Err(e) = self.engine.check_source_size(&request.code) {
            warn!(error = %e, "Rejected oversized snippet");
            return ExecutionResult::failure(e.to_string(), 0.0);
        }

        let wrapper = script::execution_wrapper(&self.preamble, &request.code);

        let output = match self.engine.run_script(&wrapper, timeout_secs).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Snippet execution failed to start");
                return ExecutionResult::failure(
                    format!("Execution error: {:#}", e),
                    start.elapsed().as_secs_f64(),
                );
            }
        };

        if output.timed_out {
            info!(timeout_secs, "Snippet timed out");
            return ExecutionResult::timed_out(timeout_secs);
        }

        let framed = framing::unframe(&output.stdout);

        // Raw interpreter stderr (e.g. a failing preamble import) comes first
        let mut stderr = output.stderr.clone();
        stderr.push_str(&framed.stderr);

        let has_stderr = !stderr.trim().is_empty();
        let succeeded = output.exit_code == Some(0) && !has_stderr;
        let error_message = if has_stderr {
            Some(stderr.clone())
        } else if output.exit_code != Some(0) {
            Some(output.exit_description())
        } else {
            None
        };

        info!(
            succeeded,
            exit_code = ?output.exit_code,
            framed = framed.complete,
            execution_ms = output.execution_time_ms,
            "Snippet executed"
        );

        ExecutionResult {
            succeeded,
            stdout: framed.stdout,
            stderr,
            elapsed_seconds: start.elapsed().as_secs_f64(),
            error_message,
        }
    }
}
