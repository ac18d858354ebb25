//! Invocation descriptions and the `tokio::process` backed invoker.

use crate::errors::ProcessError;
use crate::observability::SpanTimer;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// A fully resolved command to run for one stage and one input pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// Stage name, for error context.
    pub stage: String,
    /// Program path or command name.
    pub program: String,
    /// Optional interpreter the program is passed to.
    pub interpreter: Option<String>,
    /// Positional arguments after the program.
    pub args: Vec<PathBuf>,
}

impl Invocation {
    /// Creates an invocation with no arguments.
    #[must_use]
    pub fn new(stage: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            program: program.into(),
            interpreter: None,
            args: Vec::new(),
        }
    }

    /// Sets the interpreter.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: Option<String>) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<PathBuf>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The executable actually started.
    #[must_use]
    pub fn executable(&self) -> &str {
        self.interpreter.as_deref().unwrap_or(&self.program)
    }

    /// Arguments passed to [`Self::executable`].
    #[must_use]
    pub fn argv(&self) -> Vec<PathBuf> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        if self.interpreter.is_some() {
            argv.push(PathBuf::from(&self.program));
        }
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Space-joined command line for logs and errors.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.executable().to_string())
            .chain(self.argv().iter().map(|a| a.display().to_string()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What a successful invocation reports back.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvocationOutput {
    /// Last lines of stderr, if anything was written.
    pub stderr_tail: Option<String>,
    /// Wall-clock time in milliseconds.
    pub duration_ms: f64,
}

/// Runs external programs on behalf of stages.
#[async_trait]
pub trait ProgramInvoker: Send + Sync + Debug {
    /// Runs the invocation to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] if the program cannot be started and
    /// [`ProcessError::Failed`] if it exits non-zero or is killed.
    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationOutput, ProcessError>;
}

/// Invoker that starts real child processes.
///
/// stdout is discarded; stderr is captured and its tail attached to errors.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    stderr_tail_lines: usize,
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        Self {
            stderr_tail_lines: 20,
        }
    }
}

impl ProcessInvoker {
    /// Creates an invoker keeping the default number of stderr lines.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many trailing stderr lines are kept.
    #[must_use]
    pub fn with_stderr_tail_lines(mut self, lines: usize) -> Self {
        self.stderr_tail_lines = lines;
        self
    }

    fn tail(&self, stderr: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(stderr);
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() || self.stderr_tail_lines == 0 {
            return None;
        }
        let start = lines.len().saturating_sub(self.stderr_tail_lines);
        Some(lines[start..].join("\n"))
    }
}

#[async_trait]
impl ProgramInvoker for ProcessInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationOutput, ProcessError> {
        let command_line = invocation.command_line();
        debug!(stage = %invocation.stage, command = %command_line, "Starting external program");

        let timer = SpanTimer::start(&invocation.stage);
        let output = Command::new(invocation.executable())
            .args(invocation.argv())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProcessError::spawn(&invocation.stage, invocation.executable(), e.to_string()))?;
        let duration_ms = timer.finish();

        let stderr_tail = self.tail(&output.stderr);

        if output.status.success() {
            debug!(
                stage = %invocation.stage,
                duration_ms,
                "External program finished"
            );
            return Ok(InvocationOutput {
                stderr_tail,
                duration_ms,
            });
        }

        warn!(
            stage = %invocation.stage,
            command = %command_line,
            code = ?output.status.code(),
            "External program failed"
        );
        Err(ProcessError::failed(
            &invocation.stage,
            command_line,
            output.status.code(),
            stderr_tail,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_line_with_interpreter() {
        let inv = Invocation::new("disambiguate", "/opt/disamb.pl")
            .with_interpreter(Some("perl".into()))
            .arg("a.Human.bam")
            .arg("a.Mouse.bam")
            .arg("results/disambiguate");

        assert_eq!(inv.executable(), "perl");
        assert_eq!(inv.argv().len(), 4);
        assert_eq!(
            inv.command_line(),
            "perl /opt/disamb.pl a.Human.bam a.Mouse.bam results/disambiguate"
        );
    }

    #[test]
    fn test_command_line_without_interpreter() {
        let inv = Invocation::new("s", "disamb").arg("x");
        assert_eq!(inv.executable(), "disamb");
        assert_eq!(inv.command_line(), "disamb x");
    }

    #[test]
    fn test_stderr_tail() {
        let invoker = ProcessInvoker::new().with_stderr_tail_lines(2);
        assert_eq!(invoker.tail(b"one\ntwo\n\nthree\n"), Some("two\nthree".to_string()));
        assert_eq!(invoker.tail(b"\n  \n"), None);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let invoker = ProcessInvoker::new();
        let inv = Invocation::new("disambiguate", "/nonexistent/xenoflow-test-program");

        let err = invoker.invoke(&inv).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_reported() {
        let invoker = ProcessInvoker::new();
        let ok = Invocation::new("s", "-c")
            .with_interpreter(Some("sh".into()))
            .arg("exit 0");
        invoker.invoke(&ok).await.unwrap();

        let failing = Invocation::new("s", "-c")
            .with_interpreter(Some("sh".into()))
            .arg("echo broken input >&2; exit 3");
        let err = invoker.invoke(&failing).await.unwrap_err();

        assert_eq!(err.exit_code(), Some(3));
        assert!(err.to_string().contains("broken input"));
    }
}
