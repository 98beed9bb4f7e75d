/// Verdict Evaluator - Output Interpretation
///
/// **Core Responsibility:**
/// Turn the raw output of one validation run into a `ValidationVerdict`.
///
/// **Critical Properties:**
/// - Knows nothing about processes, scratch files or timeouts enforcement
/// - Knows nothing about where exercises come from
/// - Pure functions: (process output, exercise expectations) → verdict
///
/// **Classification order (highest priority first):**
/// 1. Deadline exceeded → TIMEOUT (counts not trusted)
/// 2. Non-zero exit → ERROR carrying stderr
/// 3. ASSERT: `PASSED:<p>/<t>` summary line → PASSED / FAILED
///    OUTPUT: trimmed stdout == trimmed expected → PASSED / FAILED
///
/// **Normalization Rules (OUTPUT exercises):**
/// - Trim leading and trailing whitespace: YES
/// - Internal whitespace and case: compared exactly

use crate::script::{FAILURES_HEADER, SUMMARY_PREFIX};
use academy_common::types::{ValidationOutcome, ValidationVerdict};
use tracing::debug;

pub const ALL_PASSED_FEEDBACK: &str = "All tests passed!";
pub const GENERIC_FAILURE_FEEDBACK: &str = "Some tests failed";
pub const OUTPUT_MATCH_FEEDBACK: &str = "Output matches expected result!";

/// Raw result of running one script in the interpreter.
/// Produced by `ProcessEngine`, consumed by the executor and the evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed (deadline) or ended by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub execution_time_ms: u64,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn exited_cleanly(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Human-readable exit status for error messages
    pub fn exit_description(&self) -> String {
        match self.exit_code {
            Some(code) => format!("Process exited with status {}", code),
            None => "Process was terminated by a signal".to_string(),
        }
    }
}

/// Normalize output string for comparison.
///
/// Removes leading/trailing whitespace (including trailing newlines and
/// `\r\n` line ends); internal whitespace and case are preserved.
fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Recover `(passed, total)` from the last `PASSED:` summary line
pub fn parse_summary(stdout: &str) -> Option<(u32, u32)> {
    let summary = stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(SUMMARY_PREFIX))?;
    let (passed, total) = summary.trim().split_once('/')?;
    Some((passed.trim().parse().ok()?, total.trim().parse().ok()?))
}

/// Everything from the `FAILURES:` header onward, plus any earlier line
/// starting with two spaces
pub fn collect_feedback(stdout: &str) -> String {
    let mut feedback = String::new();
    let mut in_failures = false;

    for line in stdout.lines() {
        if line.starts_with(FAILURES_HEADER) {
            in_failures = true;
        }
        if in_failures || line.starts_with("  ") {
            feedback.push_str(line);
            feedback.push('\n');
        }
    }

    feedback.trim().to_string()
}

/// ERROR verdict for a run that exited non-zero
fn execution_error(output: &ProcessOutput, total: u32) -> ValidationVerdict {
    let message = if output.stderr.trim().is_empty() {
        "Execution failed".to_string()
    } else {
        output.stderr.clone()
    };
    ValidationVerdict {
        stdout: output.stdout.clone(),
        stderr: output.stderr.clone(),
        ..ValidationVerdict::error(message, total)
    }
}

/// Interpret the output of an assertion harness run with `total` tests
pub fn interpret_assert(output: &ProcessOutput, total: u32, timeout_secs: u64) -> ValidationVerdict {
    if output.timed_out {
        return ValidationVerdict::timeout(timeout_secs, total);
    }
    if !output.exited_cleanly() {
        return execution_error(output, total);
    }

    let passed = match parse_summary(&output.stdout) {
        Some((passed, _)) => passed.min(total),
        None => {
            debug!("No summary line in harness output; counting 0 passed");
            0
        }
    };

    let (outcome, feedback) = if passed == total {
        (ValidationOutcome::Passed, ALL_PASSED_FEEDBACK.to_string())
    } else {
        let feedback = collect_feedback(&output.stdout);
        let feedback = if feedback.is_empty() {
            GENERIC_FAILURE_FEEDBACK.to_string()
        } else {
            feedback
        };
        (ValidationOutcome::Failed, feedback)
    };

    ValidationVerdict {
        outcome,
        passed_count: passed,
        total_count: total,
        feedback,
        error_message: None,
        stdout: output.stdout.clone(),
        stderr: output.stderr.clone(),
    }
}

/// Interpret the output of learner code run verbatim against `expected`
pub fn interpret_output(output: &ProcessOutput, expected: &str, timeout_secs: u64) -> ValidationVerdict {
    if output.timed_out {
        return ValidationVerdict::timeout(timeout_secs, 1);
    }
    if !output.exited_cleanly() {
        return execution_error(output, 1);
    }

    let actual = normalize_output(&output.stdout);
    let expected = normalize_output(expected);

    let (outcome, passed, feedback) = if actual == expected {
        (ValidationOutcome::Passed, 1, OUTPUT_MATCH_FEEDBACK.to_string())
    } else {
        (
            ValidationOutcome::Failed,
            0,
            format!(
                "Output doesn't match.\nExpected:\n{}\n\nGot:\n{}",
                expected, actual
            ),
        )
    };

    ValidationVerdict {
        outcome,
        passed_count: passed,
        total_count: 1,
        feedback,
        error_message: None,
        stdout: output.stdout.clone(),
        stderr: output.stderr.clone(),
    }
}
