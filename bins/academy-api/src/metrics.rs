// Prometheus metrics for execution and validation traffic

use academy_common::types::{ExecutionResult, ValidationVerdict};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};

lazy_static! {
    pub static ref VALIDATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "academy_validations_total",
        "Validation requests by verdict outcome",
        &["outcome"]
    )
    .expect("validation counter registers once");

    pub static ref EXECUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "academy_executions_total",
        "Snippet executions by status",
        &["status"]
    )
    .expect("execution counter registers once");

    pub static ref EXECUTION_DURATION: Histogram = register_histogram!(
        "academy_execution_duration_seconds",
        "Wall-clock time of snippet executions",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("execution histogram registers once");
}

pub fn record_execution(result: &ExecutionResult) {
    let status = if result.succeeded { "success" } else { "failure" };
    EXECUTIONS_TOTAL.with_label_values(&[status]).inc();
    EXECUTION_DURATION.observe(result.elapsed_seconds);
}

pub fn record_validation(verdict: &ValidationVerdict) {
    let outcome = verdict.outcome.to_string();
    VALIDATIONS_TOTAL.with_label_values(&[outcome.as_str()]).inc();
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
