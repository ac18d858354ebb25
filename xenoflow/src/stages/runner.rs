//! Plan, execute and finalize one stage for one input pair.
//!
//! A pair goes through three steps, strictly in order:
//!
//! 1. [`StageRunner::compute_output_paths`] derives the four temporary
//!    outputs from the input file names.
//! 2. [`StageRunner::run_stage`] runs the external program unless those
//!    outputs already exist. Whatever a failed run leaves behind is moved to
//!    `<stage>/failed/<sample>/` so a later run never reuses it.
//! 3. [`StageRunner::finalize_outputs`] checks the outputs and moves them
//!    into the per-branch layout, then releases the stage directory.
//!
//! [`StageRunner::process`] chains the three and reports the outcome.

use super::report::{PairOutcome, PairStatus};
use super::workspace::{Cleanup, StageLease, StageWorkspace};
use crate::branch::{Branch, BranchPair};
use crate::config::PipelineConfig;
use crate::errors::{ConfigError, ConsistencyError, InputError, Result, XenoflowError};
use crate::events::{
    EventSink, NoOpEventSink, PAIR_ALREADY_COMPLETE, PAIR_FAILED, PAIR_FINALIZED, PAIR_INVOKED,
    PAIR_SKIPPED, WORKSPACE_KEPT, WORKSPACE_REMOVED,
};
use crate::layout::{render_template, OutputNaming, StageLayout};
use crate::process::{Invocation, ProcessInvoker, ProgramInvoker};
use crate::utils::{all_exist_nonempty, exists_nonempty, move_file};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Program used by the `disambiguate` stage when none is configured.
pub const DEFAULT_PROGRAM: &str = "disamb_byMapping2.pl";

/// Interpreter used for `.pl` programs when none is configured.
pub const PERL: &str = "perl";

/// Arguments of a per-file stage when none are configured.
pub const DEFAULT_ARGS: [&str; 2] = ["{input}", "{out_dir}"];

/// Temporary outputs of a pair, still holding the stage directory.
#[derive(Debug)]
pub struct StagedOutputs {
    sample: String,
    paths: Vec<PathBuf>,
    invoked: bool,
    lease: StageLease,
}

impl StagedOutputs {
    /// Temporary output paths.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// True if the program ran; false if existing outputs were reused.
    #[must_use]
    pub fn invoked(&self) -> bool {
        self.invoked
    }

    /// Sample name of the pair.
    #[must_use]
    pub fn sample(&self) -> &str {
        &self.sample
    }
}

/// Runs one external-program stage over input pairs.
#[derive(Debug)]
pub struct StageRunner {
    layout: StageLayout,
    program: String,
    interpreter: Option<String>,
    args: Vec<String>,
    invoker: Arc<dyn ProgramInvoker>,
    events: Arc<dyn EventSink>,
    workspace: Arc<StageWorkspace>,
}

impl StageRunner {
    /// Creates a runner that starts real processes and emits no events.
    #[must_use]
    pub fn new(layout: StageLayout, program: impl Into<String>) -> Self {
        let workspace = StageWorkspace::new(layout.stage_dir());
        Self {
            layout,
            program: program.into(),
            interpreter: None,
            args: DEFAULT_ARGS.map(String::from).to_vec(),
            invoker: Arc::new(ProcessInvoker::new()),
            events: Arc::new(NoOpEventSink),
            workspace,
        }
    }

    /// Builds a runner from the `stage.<name>` entry of a configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `dir.results` or the stage entry is
    /// missing, or if a per-file stage names no program.
    pub fn from_config(config: &PipelineConfig, stage: &str) -> Result<Self, ConfigError> {
        let results = config.results_dir()?;
        let stage_config = config.stage_config(stage)?;

        let mut layout = StageLayout::new(results, stage, config.markers());
        if let Some(ext) = &stage_config.extension {
            layout = layout.with_extension(ext.clone());
        }

        let program = match &stage_config.outputs {
            Some(outputs) => {
                layout = layout.with_naming(OutputNaming::PerFile(outputs.clone()));
                stage_config
                    .program
                    .as_deref()
                    .ok_or_else(|| ConfigError::missing_key(format!("stage.{stage}.program")))?
            }
            None => stage_config.program_or(DEFAULT_PROGRAM),
        };
        let interpreter = stage_config.interpreter.clone().or_else(|| {
            Path::new(program)
                .extension()
                .is_some_and(|ext| ext == "pl")
                .then(|| PERL.to_string())
        });

        let mut runner = Self::new(layout, program).with_interpreter(interpreter);
        if let Some(args) = &stage_config.args {
            runner.args.clone_from(args);
        }
        Ok(runner)
    }

    /// Sets the interpreter the program is passed to.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: Option<String>) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Sets the program invoker.
    #[must_use]
    pub fn with_invoker(mut self, invoker: Arc<dyn ProgramInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Stage name.
    #[must_use]
    pub fn stage(&self) -> &str {
        self.layout.stage()
    }

    /// Output layout of this stage.
    #[must_use]
    pub fn layout(&self) -> &StageLayout {
        &self.layout
    }

    /// Configured program.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Interpreter the program is run with, if any.
    #[must_use]
    pub fn interpreter(&self) -> Option<&str> {
        self.interpreter.as_deref()
    }

    /// Shared temporary directory of this stage.
    #[must_use]
    pub fn workspace(&self) -> &Arc<StageWorkspace> {
        &self.workspace
    }

    /// Sample name used to identify a pair in logs and reports.
    #[must_use]
    pub fn sample(&self, pair: &BranchPair) -> String {
        self.layout.sample(pair, Branch::A)
    }

    /// Temporary outputs: A resolved, A ambiguous, B resolved, B ambiguous,
    /// or each output template for A then for B in a per-file stage.
    #[must_use]
    pub fn compute_output_paths(&self, pair: &BranchPair) -> Vec<PathBuf> {
        self.layout.temp_paths(pair)
    }

    /// Final outputs, positionally matching [`Self::compute_output_paths`].
    #[must_use]
    pub fn final_output_paths(&self, pair: &BranchPair) -> Vec<PathBuf> {
        self.layout.final_paths(pair)
    }

    /// The commands that [`Self::run_stage`] would run for a pair, in order.
    ///
    /// A disambiguation stage runs once with both files. A per-file stage
    /// runs once per file with its argument templates expanded.
    #[must_use]
    pub fn invocations(&self, pair: &BranchPair) -> Vec<Invocation> {
        let out_dir = self.layout.stage_dir();
        let command = Invocation::new(self.stage(), &self.program)
            .with_interpreter(self.interpreter.clone());

        match self.layout.naming() {
            OutputNaming::Disambiguation => vec![command
                .arg(pair.file(Branch::A))
                .arg(pair.file(Branch::B))
                .arg(out_dir)],
            OutputNaming::PerFile(_) => Branch::ALL
                .iter()
                .map(|&branch| {
                    let input = pair.file(branch);
                    let marker = self.layout.markers().marker(branch);
                    self.args.iter().fold(command.clone(), |invocation, template| {
                        invocation.arg(render_template(template, input, marker, &out_dir))
                    })
                })
                .collect(),
        }
    }

    /// Produces the temporary outputs of a pair.
    ///
    /// If all of them already exist and are non-empty the program is not
    /// run.
    ///
    /// # Errors
    ///
    /// Returns a process error if the program fails, an input error if an
    /// input file is missing, or an I/O error if the stage directory cannot
    /// be created. On error the stage directory is kept, and outputs of a
    /// failed program are moved to [`StageLayout::failed_dir`].
    pub async fn run_stage(&self, pair: &BranchPair) -> Result<StagedOutputs> {
        let sample = self.sample(pair);
        let lease = self.workspace.enter()?;
        let paths = self.compute_output_paths(pair);

        if all_exist_nonempty(&paths) {
            info!(stage = %self.stage(), sample = %sample, "Outputs exist, skipping program");
            self.events.emit(
                PAIR_SKIPPED,
                Some(json!({"stage": self.stage(), "sample": sample})),
            );
            return Ok(StagedOutputs {
                sample,
                paths,
                invoked: false,
                lease,
            });
        }

        let missing: Vec<PathBuf> = pair
            .iter()
            .filter(|f| !f.path.is_file())
            .map(|f| f.path.clone())
            .collect();
        if !missing.is_empty() {
            return Err(InputError::new(format!(
                "stage '{}': input file not found for sample '{sample}'",
                self.stage()
            ))
            .with_files(missing)
            .into());
        }

        for invocation in self.invocations(pair) {
            info!(
                stage = %self.stage(),
                sample = %sample,
                command = %invocation.command_line(),
                "Running external program"
            );
            self.events.emit(
                PAIR_INVOKED,
                Some(json!({
                    "stage": self.stage(),
                    "sample": sample,
                    "command": invocation.command_line(),
                })),
            );

            let output = match self.invoker.invoke(&invocation).await {
                Ok(output) => output,
                Err(e) => {
                    self.set_aside(&sample, &paths);
                    return Err(e.into());
                }
            };
            debug!(
                stage = %self.stage(),
                sample = %sample,
                duration_ms = output.duration_ms,
                "External program succeeded"
            );
        }

        Ok(StagedOutputs {
            sample,
            paths,
            invoked: true,
            lease,
        })
    }

    /// Moves whatever a failed program wrote at the temporary paths into the
    /// pair's failed directory, out of reach of the skip check.
    ///
    /// A file that cannot be moved is deleted instead.
    fn set_aside(&self, sample: &str, paths: &[PathBuf]) {
        let failed_dir = self.layout.failed_dir(sample);
        for path in paths.iter().filter(|p| p.exists()) {
            let Some(name) = path.file_name() else {
                continue;
            };
            if let Err(e) = move_file(path, failed_dir.join(name)) {
                warn!(
                    stage = %self.stage(),
                    sample,
                    error = %e,
                    "Could not set aside partial output, removing it"
                );
                if let Err(e) = fs::remove_file(path) {
                    warn!(
                        stage = %self.stage(),
                        sample,
                        path = %path.display(),
                        error = %e,
                        "Could not remove partial output"
                    );
                }
            }
        }
        if failed_dir.is_dir() {
            warn!(
                stage = %self.stage(),
                sample,
                dir = %failed_dir.display(),
                "Outputs of failed run kept for inspection"
            );
        }
    }

    /// Moves temporary outputs to their final locations.
    ///
    /// Every temporary path is checked before anything is moved. The stage
    /// directory is released only after all moves succeeded.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if the path lists differ in length or an
    /// output is missing or empty, and an I/O error if a move fails.
    pub fn finalize_outputs(
        &self,
        staged: StagedOutputs,
        final_paths: &[PathBuf],
    ) -> Result<Vec<PathBuf>> {
        let StagedOutputs {
            sample,
            paths,
            lease,
            ..
        } = staged;

        if paths.len() != final_paths.len() {
            return Err(ConsistencyError::LengthMismatch {
                stage: self.stage().to_string(),
                temp: paths.len(),
                fin: final_paths.len(),
            }
            .into());
        }

        if let Some(missing) = paths.iter().find(|p| !exists_nonempty(p)) {
            return Err(ConsistencyError::missing_output(self.stage(), missing).into());
        }

        for (temp, fin) in paths.iter().zip(final_paths) {
            move_file(temp, fin)?;
        }

        match lease.complete() {
            Cleanup::Removed => {
                debug!(stage = %self.stage(), dir = %self.workspace.dir().display(), "Removed stage directory");
                self.events.emit(
                    WORKSPACE_REMOVED,
                    Some(json!({"stage": self.stage(), "dir": self.workspace.dir().display().to_string()})),
                );
            }
            Cleanup::Kept => {
                warn!(
                    stage = %self.stage(),
                    dir = %self.workspace.dir().display(),
                    "Keeping stage directory"
                );
                self.events.emit(
                    WORKSPACE_KEPT,
                    Some(json!({"stage": self.stage(), "dir": self.workspace.dir().display().to_string()})),
                );
            }
            Cleanup::Occupied => {
                debug!(
                    stage = %self.stage(),
                    dir = %self.workspace.dir().display(),
                    "Stage directory still holds other outputs"
                );
            }
            Cleanup::InUse { .. } => {}
        }

        info!(stage = %self.stage(), sample = %sample, "Outputs finalized");
        let outputs: Vec<String> = final_paths.iter().map(|p| p.display().to_string()).collect();
        self.events.emit(
            PAIR_FINALIZED,
            Some(json!({"stage": self.stage(), "sample": sample, "outputs": outputs})),
        );
        Ok(final_paths.to_vec())
    }

    /// Takes a pair from inputs to final outputs.
    ///
    /// A pair whose final outputs are all present is left untouched.
    pub async fn process(&self, pair: &BranchPair) -> Result<PairOutcome> {
        let sample = self.sample(pair);
        let final_paths = self.final_output_paths(pair);

        if all_exist_nonempty(&final_paths) {
            info!(stage = %self.stage(), sample = %sample, "Final outputs exist, nothing to do");
            self.events.emit(
                PAIR_ALREADY_COMPLETE,
                Some(json!({"stage": self.stage(), "sample": sample})),
            );
            return Ok(PairOutcome {
                sample,
                status: PairStatus::AlreadyComplete,
                outputs: final_paths,
            });
        }

        match self.execute(pair, &final_paths).await {
            Ok((invoked, outputs)) => Ok(PairOutcome {
                sample,
                status: if invoked {
                    PairStatus::Executed
                } else {
                    PairStatus::Skipped
                },
                outputs,
            }),
            Err(e) => {
                warn!(stage = %self.stage(), sample = %sample, error = %e, "Pair failed");
                self.events.emit(
                    PAIR_FAILED,
                    Some(json!({
                        "stage": self.stage(),
                        "sample": sample,
                        "error": crate::errors::error_to_dict(&e),
                    })),
                );
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        pair: &BranchPair,
        final_paths: &[PathBuf],
    ) -> Result<(bool, Vec<PathBuf>), XenoflowError> {
        let staged = self.run_stage(pair).await?;
        let invoked = staged.invoked();
        let outputs = self.finalize_outputs(staged, final_paths)?;
        Ok((invoked, outputs))
    }
}
