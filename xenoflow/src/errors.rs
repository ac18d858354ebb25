//! Error types for xenoflow.
//!
//! The taxonomy separates failures an operator must fix before anything runs
//! (configuration, input labeling) from failures of a single input pair
//! (external process, output consistency, filesystem).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The main error type for xenoflow operations.
#[derive(Debug, Error)]
pub enum XenoflowError {
    /// The pipeline configuration is missing or malformed.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// An input file could not be assigned to a branch.
    #[error("{0}")]
    Labeling(#[from] LabelingError),

    /// The set of input files is inconsistent.
    #[error("{0}")]
    Input(#[from] InputError),

    /// The external program could not be run or did not succeed.
    #[error("{0}")]
    Process(#[from] ProcessError),

    /// The external program reported success but broke its output contract.
    #[error("{0}")]
    Consistency(#[from] ConsistencyError),

    /// A filesystem operation failed.
    #[error("Failed to {action} {}: {source}", path.display())]
    Io {
        /// What was being attempted.
        action: &'static str,
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A worker task panicked or was aborted.
    #[error("Worker task failed: {0}")]
    Task(String),
}

impl XenoflowError {
    /// Wraps an I/O error with the action and path it concerns.
    #[must_use]
    pub fn io(action: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns a stable name for the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Labeling(_) => ErrorKind::Labeling,
            Self::Input(_) => ErrorKind::Input,
            Self::Process(_) => ErrorKind::Process,
            Self::Consistency(_) => ErrorKind::Consistency,
            Self::Io { .. } => ErrorKind::Io,
            Self::Task(_) => ErrorKind::Task,
        }
    }
}

/// Coarse error categories used in summaries and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Configuration error.
    Config,
    /// Input labeling error.
    Labeling,
    /// Input set error.
    Input,
    /// External process failure.
    Process,
    /// Post-success consistency error.
    Consistency,
    /// Filesystem error.
    Io,
    /// Worker task failure.
    Task,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Labeling => "labeling",
            Self::Input => "input",
            Self::Process => "process",
            Self::Consistency => "consistency",
            Self::Io => "io",
            Self::Task => "task",
        };
        write!(f, "{name}")
    }
}

/// Error raised when the configuration cannot be used.
#[derive(Debug, Clone, Error)]
#[error("Configuration error: {message}")]
pub struct ConfigError {
    /// The error message.
    pub message: String,
    /// The dotted configuration key involved, if any.
    pub key: Option<String>,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            key: None,
        }
    }

    /// Sets the configuration key involved.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// A required key is absent.
    #[must_use]
    pub fn missing_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(format!("missing required key '{key}'")).with_key(key)
    }

    /// A run-list stage has no `stage.<name>` entry.
    #[must_use]
    pub fn missing_stage(stage: &str) -> Self {
        Self::new(format!(
            "stage '{stage}' is in the run list but has no 'stage.{stage}' entry"
        ))
        .with_key(format!("stage.{stage}"))
    }

    /// A run-list stage has no registered implementation.
    #[must_use]
    pub fn unknown_stage(stage: &str, known: &[String]) -> Self {
        Self::new(format!(
            "no implementation registered for stage '{stage}' (known: {})",
            known.join(", ")
        ))
        .with_key(format!("run.{stage}"))
    }
}

/// Error raised when an input file name carries no usable branch marker.
#[derive(Debug, Clone, Error)]
#[error("Cannot label {}: {reason}", file.display())]
pub struct LabelingError {
    /// The offending file.
    pub file: PathBuf,
    /// Why labeling failed.
    pub reason: String,
}

impl LabelingError {
    /// The file name contains none of the markers.
    #[must_use]
    pub fn no_marker(file: impl AsRef<Path>, markers: &[&str]) -> Self {
        Self {
            file: file.as_ref().to_path_buf(),
            reason: format!("file name contains none of the markers {markers:?}"),
        }
    }

    /// Both files of a pair carry the same marker.
    #[must_use]
    pub fn duplicate_branch(file: impl AsRef<Path>, marker: &str, other: impl AsRef<Path>) -> Self {
        Self {
            file: file.as_ref().to_path_buf(),
            reason: format!(
                "marker '{marker}' is also claimed by {}",
                other.as_ref().display()
            ),
        }
    }
}

/// Error raised when the set of input files cannot be paired.
#[derive(Debug, Clone, Error)]
#[error("Input error: {message}")]
pub struct InputError {
    /// The error message.
    pub message: String,
    /// Files involved.
    pub files: Vec<PathBuf>,
}

impl InputError {
    /// Creates a new input error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            files: Vec::new(),
        }
    }

    /// Sets the files involved.
    #[must_use]
    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }
}

/// Errors from invoking an external program.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("Stage '{stage}': failed to start '{program}': {reason}. Make sure it is in your $PATH and executable.")]
    Spawn {
        /// The stage name.
        stage: String,
        /// The program that failed to start.
        program: String,
        /// The OS error.
        reason: String,
    },

    /// The program exited with a non-zero status or was killed.
    #[error("Stage '{stage}': '{command}' {status}{}", format_detail(stderr_tail))]
    Failed {
        /// The stage name.
        stage: String,
        /// The full command line.
        command: String,
        /// Exit status description.
        status: String,
        /// Exit code, if the program exited normally.
        code: Option<i32>,
        /// Last lines of the program's stderr.
        stderr_tail: Option<String>,
    },
}

impl ProcessError {
    /// Creates a spawn error.
    #[must_use]
    pub fn spawn(stage: impl Into<String>, program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Spawn {
            stage: stage.into(),
            program: program.into(),
            reason: reason.into(),
        }
    }

    /// Creates an exit-status failure.
    #[must_use]
    pub fn failed(
        stage: impl Into<String>,
        command: impl Into<String>,
        code: Option<i32>,
        stderr_tail: Option<String>,
    ) -> Self {
        let status = match code {
            Some(code) => format!("exited with status {code}"),
            None => "was terminated by a signal".to_string(),
        };
        Self::Failed {
            stage: stage.into(),
            command: command.into(),
            status,
            code,
            stderr_tail,
        }
    }

    /// Returns the exit code, if there was one.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { code, .. } => *code,
            Self::Spawn { .. } => None,
        }
    }
}

fn format_detail(detail: &Option<String>) -> String {
    match detail {
        Some(d) if !d.is_empty() => format!(" (stderr: {d})"),
        _ => String::new(),
    }
}

/// Error raised when outputs do not match what the stage declared.
#[derive(Debug, Clone, Error)]
pub enum ConsistencyError {
    /// A declared output is missing or empty after a successful run.
    #[error("Stage '{stage}': expected output {} is missing or empty after a successful run", path.display())]
    MissingOutput {
        /// The stage name.
        stage: String,
        /// The missing path.
        path: PathBuf,
    },

    /// Temporary and final path lists do not line up.
    #[error("Stage '{stage}': {temp} temporary paths but {fin} final paths")]
    LengthMismatch {
        /// The stage name.
        stage: String,
        /// Number of temporary paths.
        temp: usize,
        /// Number of final paths.
        fin: usize,
    },
}

impl ConsistencyError {
    /// Creates a missing-output error.
    #[must_use]
    pub fn missing_output(stage: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::MissingOutput {
            stage: stage.into(),
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Converts an error into a flat map for event payloads.
#[must_use]
pub fn error_to_dict(err: &XenoflowError) -> HashMap<String, serde_json::Value> {
    let mut map = HashMap::new();
    map.insert("kind".to_string(), serde_json::json!(err.kind().to_string()));
    map.insert("message".to_string(), serde_json::json!(err.to_string()));

    match err {
        XenoflowError::Labeling(e) => {
            map.insert("file".to_string(), serde_json::json!(e.file));
        }
        XenoflowError::Process(ProcessError::Failed { code, .. }) => {
            map.insert("exit_code".to_string(), serde_json::json!(code));
        }
        XenoflowError::Consistency(ConsistencyError::MissingOutput { path, .. }) => {
            map.insert("path".to_string(), serde_json::json!(path));
        }
        XenoflowError::Io { path, .. } => {
            map.insert("path".to_string(), serde_json::json!(path));
        }
        _ => {}
    }

    map
}

/// Convenience alias.
pub type Result<T, E = XenoflowError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_missing_stage() {
        let err = ConfigError::missing_stage("disambiguate");
        assert_eq!(err.key.as_deref(), Some("stage.disambiguate"));
        assert!(err.to_string().contains("stage.disambiguate"));
    }

    #[test]
    fn test_labeling_error_names_file() {
        let err = LabelingError::no_marker("/data/sample1.sorted.bam", &["Human", "Mouse"]);
        let msg = err.to_string();
        assert!(msg.contains("sample1.sorted.bam"));
        assert!(msg.contains("Human"));
    }

    #[test]
    fn test_process_error_status() {
        let err = ProcessError::failed("disambiguate", "perl x.pl a b out", Some(2), None);
        assert_eq!(err.exit_code(), Some(2));
        assert!(err.to_string().contains("exited with status 2"));

        let killed = ProcessError::failed("disambiguate", "x", None, Some("boom".into()));
        assert!(killed.to_string().contains("terminated by a signal"));
        assert!(killed.to_string().contains("boom"));
    }

    #[test]
    fn test_error_kinds_are_distinct() {
        let process: XenoflowError = ProcessError::failed("s", "c", Some(1), None).into();
        let consistency: XenoflowError = ConsistencyError::missing_output("s", "/tmp/x.sam").into();

        assert_eq!(process.kind(), ErrorKind::Process);
        assert_eq!(consistency.kind(), ErrorKind::Consistency);
        assert_ne!(process.kind(), consistency.kind());

        let config: XenoflowError = ConfigError::missing_key("dir.results").into();
        assert_eq!(config.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_error_to_dict() {
        let err: XenoflowError = ConsistencyError::missing_output("s", "/tmp/x.sam").into();
        let dict = error_to_dict(&err);

        assert_eq!(dict.get("kind").unwrap(), "consistency");
        assert_eq!(dict.get("path").unwrap(), "/tmp/x.sam");
    }
}
