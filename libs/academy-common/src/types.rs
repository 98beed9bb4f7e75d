use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A snippet to run in an isolated interpreter process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub code: String,
    pub timeout_seconds: u64,
}

impl ExecutionRequest {
    /// Timeouts below one second are raised to one second
    pub fn new(code: impl Into<String>, timeout_seconds: u64) -> Self {
        Self {
            code: code.into(),
            timeout_seconds: timeout_seconds.max(1),
        }
    }
}

/// Outcome of a single `execute` call.
///
/// Field names on the wire follow the public API (`success`, `execution_time`, `error`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(rename = "success")]
    pub succeeded: bool,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(rename = "execution_time")]
    pub elapsed_seconds: f64,
    #[serde(rename = "error")]
    pub error_message: Option<String>,
}

impl ExecutionResult {
    /// Result for a run that never produced output (launch or I/O failure)
    pub fn failure(error_message: impl Into<String>, elapsed_seconds: f64) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: String::new(),
            elapsed_seconds,
            error_message: Some(error_message.into()),
        }
    }

    /// Result for a run killed at its deadline; elapsed time is the deadline itself
    pub fn timed_out(timeout_seconds: u64) -> Self {
        Self::failure(
            format!("Code execution timed out after {} seconds", timeout_seconds),
            timeout_seconds as f64,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationKind {
    Assert,
    Output,
    Custom,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationKind::Assert => write!(f, "assert"),
            ValidationKind::Output => write!(f, "output"),
            ValidationKind::Custom => write!(f, "custom"),
        }
    }
}

impl ValidationKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "assert" => Some(ValidationKind::Assert),
            "output" => Some(ValidationKind::Output),
            "custom" => Some(ValidationKind::Custom),
            _ => None,
        }
    }
}

/// How an exercise is checked, with the fields each kind needs.
///
/// Deserialized through [`RawValidation`] so that unknown kinds and missing
/// kind-specific fields are rejected when content is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawValidation", into = "RawValidation")]
pub enum Validation {
    Assert { tests: Vec<String> },
    Output { expected_output: String },
    Custom,
}

impl Validation {
    pub fn kind(&self) -> ValidationKind {
        match self {
            Validation::Assert { .. } => ValidationKind::Assert,
            Validation::Output { .. } => ValidationKind::Output,
            Validation::Custom => ValidationKind::Custom,
        }
    }

    /// Number of checks a validation run is expected to report
    pub fn test_count(&self) -> u32 {
        match self {
            Validation::Assert { tests } => tests.len() as u32,
            Validation::Output { .. } => 1,
            Validation::Custom => 0,
        }
    }
}

/// Loosely-typed shape of `validation` as written in `exercises.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawValidation {
    #[serde(rename = "type", default = "default_validation_type")]
    pub kind: String,
    #[serde(default)]
    pub tests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

fn default_validation_type() -> String {
    "assert".to_string()
}

impl TryFrom<RawValidation> for Validation {
    type Error = String;

    fn try_from(raw: RawValidation) -> Result<Self, Self::Error> {
        match ValidationKind::from_str(&raw.kind) {
            Some(ValidationKind::Assert) => Ok(Validation::Assert { tests: raw.tests }),
            Some(ValidationKind::Output) => match raw.expected_output {
                Some(expected_output) => Ok(Validation::Output { expected_output }),
                None => Err("output validation requires 'expected_output'".to_string()),
            },
            Some(ValidationKind::Custom) => Ok(Validation::Custom),
            None => Err(format!("Unknown validation type: {}", raw.kind)),
        }
    }
}

impl From<Validation> for RawValidation {
    fn from(validation: Validation) -> Self {
        let kind = validation.kind().to_string();
        match validation {
            Validation::Assert { tests } => RawValidation {
                kind,
                tests,
                expected_output: None,
            },
            Validation::Output { expected_output } => RawValidation {
                kind,
                tests: Vec::new(),
                expected_output: Some(expected_output),
            },
            Validation::Custom => RawValidation {
                kind,
                tests: Vec::new(),
                expected_output: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseSpec {
    /// Filled from the `exercises.json` key when omitted
    #[serde(default)]
    pub id: String,
    pub starter_code: String,
    #[serde(default)]
    pub hints: Vec<String>,
    pub validation: Validation,
    pub solution: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationOutcome {
    Passed,
    Failed,
    Error,
    Timeout,
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::Passed => write!(f, "passed"),
            ValidationOutcome::Failed => write!(f, "failed"),
            ValidationOutcome::Error => write!(f, "error"),
            ValidationOutcome::Timeout => write!(f, "timeout"),
        }
    }
}

/// Final classification of one validation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    #[serde(rename = "result")]
    pub outcome: ValidationOutcome,
    #[serde(rename = "passed_tests")]
    pub passed_count: u32,
    #[serde(rename = "total_tests")]
    pub total_count: u32,
    #[serde(default)]
    pub feedback: String,
    pub error_message: Option<String>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl ValidationVerdict {
    /// Terminal ERROR verdict; no counts are trusted
    pub fn error(message: impl Into<String>, total_count: u32) -> Self {
        Self {
            outcome: ValidationOutcome::Error,
            passed_count: 0,
            total_count,
            feedback: String::new(),
            error_message: Some(message.into()),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn timeout(timeout_seconds: u64, total_count: u32) -> Self {
        Self {
            outcome: ValidationOutcome::Timeout,
            error_message: Some(format!(
                "Code execution timed out after {} seconds",
                timeout_seconds
            )),
            ..Self::error("", total_count)
        }
    }

    pub fn is_passed(&self) -> bool {
        self.outcome == ValidationOutcome::Passed
    }
}

/// Lesson metadata taken from the frontmatter of `lesson.mdx`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub id: String,
    pub title: String,
    pub order: u32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    pub estimated_minutes: u32,
    pub pytorch_version: String,
    #[serde(default)]
    pub section: String,
    pub section_order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub metadata: ModuleMetadata,
    /// Lesson body without frontmatter
    pub content: String,
    pub exercises: BTreeMap<String, ExerciseSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub order: u32,
    pub modules: Vec<ModuleMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Curriculum {
    pub sections: Vec<Section>,
    pub total_modules: u32,
    pub total_estimated_minutes: u32,
}
