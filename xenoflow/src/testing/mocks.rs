//! Fake invokers and stages for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::branch::{Branch, BranchMarkers, BranchPair};
use crate::errors::ProcessError;
use crate::executor::Executor;
use crate::layout::{output_file_name, sample_name, OutputKind, DEFAULT_EXTENSION};
use crate::process::{Invocation, InvocationOutput, ProgramInvoker};
use crate::stages::{PairOutcome, PairResult, PairStatus, Stage, StageReport};

/// Content written into every fake output file.
pub const FAKE_OUTPUT: &[u8] = b"@HD\tVN:1.6\tSO:unsorted\n";

/// An in-process stand-in for the disambiguation program.
///
/// Expects the arguments `<A-input> <B-input> <out-dir>` and writes the four
/// outputs the real program would, unless configured to fail or to leave
/// some of them out. Every call is recorded.
#[derive(Debug)]
pub struct FakeDisambiguator {
    markers: BranchMarkers,
    extension: String,
    fail_all: Option<i32>,
    fail_samples: HashMap<String, i32>,
    write_before_failing: bool,
    omit: Vec<(Branch, OutputKind)>,
    calls: Mutex<Vec<Invocation>>,
}

impl Default for FakeDisambiguator {
    fn default() -> Self {
        Self {
            markers: BranchMarkers::default(),
            extension: DEFAULT_EXTENSION.to_string(),
            fail_all: None,
            fail_samples: HashMap::new(),
            write_before_failing: false,
            omit: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeDisambiguator {
    /// Creates a fake that always succeeds with the default markers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses different branch markers.
    #[must_use]
    pub fn with_markers(mut self, markers: BranchMarkers) -> Self {
        self.markers = markers;
        self
    }

    /// Uses a different output extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Makes every call exit with `code`. Nothing is written unless
    /// [`Self::writing_before_failure`] is set.
    #[must_use]
    pub fn failing(mut self, code: i32) -> Self {
        self.fail_all = Some(code);
        self
    }

    /// Makes calls for one sample exit with `code`.
    #[must_use]
    pub fn failing_for(mut self, sample: impl Into<String>, code: i32) -> Self {
        self.fail_samples.insert(sample.into(), code);
        self
    }

    /// Makes failing calls write every output first, like a program that
    /// crashes during cleanup.
    #[must_use]
    pub fn writing_before_failure(mut self) -> Self {
        self.write_before_failing = true;
        self
    }

    /// Succeeds but does not write the given output.
    #[must_use]
    pub fn omitting(mut self, branch: Branch, kind: OutputKind) -> Self {
        self.omit.push((branch, kind));
        self
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// All recorded invocations.
    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    fn failure(&self, invocation: &Invocation, code: i32) -> ProcessError {
        ProcessError::failed(
            &invocation.stage,
            invocation.command_line(),
            Some(code),
            Some("fake disambiguation failure".to_string()),
        )
    }
}

#[async_trait]
impl ProgramInvoker for FakeDisambiguator {
    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationOutput, ProcessError> {
        self.calls.lock().push(invocation.clone());

        let [a_input, b_input, out_dir] = match invocation.args.as_slice() {
            [a, b, out] => [a.clone(), b.clone(), out.clone()],
            _ => {
                return Err(ProcessError::failed(
                    &invocation.stage,
                    invocation.command_line(),
                    Some(2),
                    Some("usage: <A-input> <B-input> <out-dir>".to_string()),
                ))
            }
        };

        let sample = sample_name(&a_input, self.markers.marker(Branch::A));
        let fail_code = self
            .fail_all
            .or_else(|| self.fail_samples.get(&sample).copied());
        if let Some(code) = fail_code.filter(|_| !self.write_before_failing) {
            return Err(self.failure(invocation, code));
        }

        for (branch, input) in [(Branch::A, &a_input), (Branch::B, &b_input)] {
            let marker = self.markers.marker(branch);
            let sample = sample_name(input, marker);
            for kind in OutputKind::ALL {
                if self.omit.contains(&(branch, kind)) {
                    continue;
                }
                let path: PathBuf =
                    out_dir.join(output_file_name(&sample, kind, marker, &self.extension));
                tokio::fs::write(&path, FAKE_OUTPUT).await.map_err(|e| {
                    ProcessError::failed(
                        &invocation.stage,
                        invocation.command_line(),
                        Some(1),
                        Some(format!("{}: {e}", path.display())),
                    )
                })?;
            }
        }
        if let Some(code) = fail_code {
            return Err(self.failure(invocation, code));
        }
        Ok(InvocationOutput::default())
    }
}

/// A stage that touches no files and records the pairs it was given.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    runs: Mutex<Vec<Vec<BranchPair>>>,
}

impl RecordingStage {
    /// Creates a recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runs: Mutex::new(Vec::new()),
        }
    }

    /// Number of times the stage ran.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.lock().len()
    }

    /// Inputs of every run.
    #[must_use]
    pub fn recorded_inputs(&self) -> Vec<Vec<BranchPair>> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, inputs: &[BranchPair], _executor: &Executor) -> StageReport {
        self.runs.lock().push(inputs.to_vec());

        let mut report = StageReport::new(&self.name);
        report.pairs = inputs
            .iter()
            .map(|pair| {
                let sample = sample_name(pair.file(Branch::A), "");
                PairResult {
                    pair: pair.clone(),
                    sample: sample.clone(),
                    result: Ok(PairOutcome {
                        sample,
                        status: PairStatus::Executed,
                        outputs: Vec::new(),
                    }),
                }
            })
            .collect();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(out: &std::path::Path) -> Invocation {
        Invocation::new("disambiguate", "fake")
            .arg("in/s1.Human.sorted.bam")
            .arg("in/s1.Mouse.sorted.bam")
            .arg(out)
    }

    #[tokio::test]
    async fn test_fake_writes_four_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let fake = FakeDisambiguator::new();

        fake.invoke(&invocation(tmp.path())).await.unwrap();

        assert_eq!(fake.call_count(), 1);
        assert!(tmp.path().join("s1.disambiguousHuman.sam").is_file());
        assert!(tmp.path().join("s1.ambiguousMouse.sam").is_file());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 4);
    }

    #[tokio::test]
    async fn test_fake_failures() {
        let tmp = tempfile::tempdir().unwrap();

        let fake = FakeDisambiguator::new().failing_for("s1", 4);
        let err = fake.invoke(&invocation(tmp.path())).await.unwrap_err();
        assert_eq!(err.exit_code(), Some(4));

        let fake = FakeDisambiguator::new().omitting(Branch::B, OutputKind::Ambiguous);
        fake.invoke(&invocation(tmp.path())).await.unwrap();
        assert!(!tmp.path().join("s1.ambiguousMouse.sam").exists());
    }
}
