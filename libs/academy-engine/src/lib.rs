//! Code execution and validation engine.
//!
//! - [`engine::ProcessEngine`] runs a script in a fresh interpreter process under a deadline
//! - [`executor::Executor`] wraps learner code so stdout/stderr come back framed on one pipe
//! - [`validator::Validator`] composes exercise checks with learner code and produces a verdict
//! - [`evaluator`] turns captured process output into verdicts (pure functions)

pub mod engine;
pub mod evaluator;
pub mod executor;
pub mod framing;
pub mod script;
pub mod validator;

pub use engine::ProcessEngine;
pub use evaluator::ProcessOutput;
pub use executor::Executor;
pub use validator::Validator;
