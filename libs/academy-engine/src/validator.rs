/// Exercise Validator
///
/// **Core Responsibility:**
/// Resolve an exercise, compose the script that checks it, run that script
/// once under the validation timeout and classify the result.
///
/// **Call flow:**
/// 1. Lookup module then exercise (missing → ERROR, nothing spawned)
/// 2. Dispatch on the validation kind
///    - ASSERT: preamble + learner code + independent test blocks
///    - OUTPUT: learner code verbatim, stdout compared after trimming
///    - CUSTOM: not runnable → ERROR
/// 3. Run via `ProcessEngine`
/// 4. Interpret via `evaluator`
///
/// The harness is run without the framing wrapper: its summary lines are
/// read straight from the child's stdout.

use crate::engine::ProcessEngine;
use crate::evaluator;
use crate::script;
use academy_common::content::ContentStore;
use academy_common::types::{ExerciseSpec, Validation, ValidationKind, ValidationVerdict};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct Validator {
    engine: Arc<ProcessEngine>,
    content: Arc<dyn ContentStore>,
    preamble: Vec<String>,
    timeout_secs: u64,
}

impl Validator {
    pub fn new(
        engine: Arc<ProcessEngine>,
        content: Arc<dyn ContentStore>,
        preamble: Vec<String>,
        timeout_secs: u64,
    ) -> Self {
        let timeout_secs = engine.effective_timeout_secs(timeout_secs);
        Self {
            engine,
            content,
            preamble,
            timeout_secs,
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Validate learner `code` against exercise `exercise_id` of `module_id`
    #[instrument(skip(self, code), fields(code_bytes = code.len()))]
    pub async fn validate(&self, module_id: &str, exercise_id: &str, code: &str) -> ValidationVerdict {
        let Some(module) = self.content.get_module(module_id) else {
            info!("Validation requested for unknown module");
            return ValidationVerdict::error(format!("Module '{}' not found", module_id), 0);
        };
        let Some(exercise) = module.exercises.get(exercise_id) else {
            info!("Validation requested for unknown exercise");
            return ValidationVerdict::error(
                format!("Exercise '{}' not found in module '{}'", exercise_id, module_id),
                0,
            );
        };

        let verdict = self.validate_exercise(exercise, code).await;
        info!(
            outcome = %verdict.outcome,
            passed = verdict.passed_count,
            total = verdict.total_count,
            "Validation finished"
        );
        verdict
    }

    /// Validate against an already-resolved exercise
    pub async fn validate_exercise(&self, exercise: &ExerciseSpec, code: &str) -> ValidationVerdict {
        let total = exercise.validation.test_count();

        if let Err(e) = self.engine.check_source_size(code) {
            return ValidationVerdict::error(e.to_string(), total);
        }

        match &exercise.validation {
            Validation::Assert { tests } => {
                let harness = script::assert_harness(&self.preamble, code, tests);
                match self.engine.run_script(&harness, self.timeout_secs).await {
                    Ok(output) => evaluator::interpret_assert(&output, total, self.timeout_secs),
                    Err(e) => launch_failure(e, total),
                }
            }
            Validation::Output { expected_output } => {
                match self.engine.run_script(code, self.timeout_secs).await {
                    Ok(output) => {
                        evaluator::interpret_output(&output, expected_output, self.timeout_secs)
                    }
                    Err(e) => launch_failure(e, total),
                }
            }
            Validation::Custom => ValidationVerdict::error(
                format!("Unknown validation type: {}", ValidationKind::Custom),
                total,
            ),
        }
    }
}

fn launch_failure(e: anyhow::Error, total: u32) -> ValidationVerdict {
    warn!(error = %e, "Validation run failed to start");
    ValidationVerdict::error(format!("Execution error: {:#}", e), total)
}
