//! Runs the configured stages over all input pairs.

use super::discovery::{check_unique_samples, discover, DiscoveredPairs};
use super::failure::{FailureCollector, FailureRecord};
use super::summary::{RunSummary, StageSummary};
use crate::branch::BranchPair;
use crate::config::PipelineConfig;
use crate::errors::{ConfigError, Result, XenoflowError};
use crate::events::{
    EventSink, INPUT_REJECTED, RUN_COMPLETED, RUN_STARTED, STAGE_COMPLETED, STAGE_STARTED,
};
use crate::executor::Executor;
use crate::process::ProgramInvoker;
use crate::stages::{Stage, StageContext, StageRegistry};
use crate::utils::ensure_dir;
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Stage name used in failure records for pairs rejected during labeling.
pub const INPUTS_STAGE: &str = "inputs";

/// One stage's planned outputs for one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPair {
    /// Stage name.
    pub stage: String,
    /// The input pair.
    pub pair: BranchPair,
    /// Temporary and final path of each output.
    pub outputs: Vec<(PathBuf, PathBuf)>,
}

/// A configured pipeline ready to run.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    registry: StageRegistry,
    context: StageContext,
    executor: Executor,
}

impl Pipeline {
    /// Creates a pipeline with the built-in stages, real processes and the
    /// configured concurrency.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let executor = Executor::from_config(&config.cluster);
        Self {
            config,
            registry: StageRegistry::builtin(),
            context: StageContext::default(),
            executor,
        }
    }

    /// Replaces the stage registry.
    #[must_use]
    pub fn with_registry(mut self, registry: StageRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the program invoker handed to stages.
    #[must_use]
    pub fn with_invoker(mut self, invoker: Arc<dyn ProgramInvoker>) -> Self {
        self.context = self.context.with_invoker(invoker);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.context = self.context.with_events(events);
        self
    }

    /// Replaces the executor.
    #[must_use]
    pub fn with_executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Checks the configuration and that every run-list stage can be built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()?;
        for name in &self.config.run {
            self.registry.check(name, &self.config)?;
        }
        Ok(())
    }

    /// Constructs every stage of the run list, in order.
    pub fn build_stages(&self) -> Result<Vec<Arc<dyn Stage>>> {
        self.validate()?;
        self.config
            .run
            .iter()
            .map(|name| self.registry.build(name, &self.config, &self.context))
            .collect()
    }

    /// Discovers input pairs from the configured directories.
    pub fn discover(&self) -> Result<DiscoveredPairs> {
        discover(&self.config)
    }

    /// Lists the outputs every stage would produce, without touching disk.
    pub fn plan(&self, pairs: &[BranchPair]) -> Result<Vec<PlannedPair>> {
        let stages = self.build_stages()?;
        Ok(stages
            .iter()
            .flat_map(|stage| {
                pairs.iter().map(move |pair| PlannedPair {
                    stage: stage.name().to_string(),
                    pair: pair.clone(),
                    outputs: stage.plan(pair),
                })
            })
            .collect())
    }

    /// Discovers inputs and runs every stage.
    ///
    /// # Errors
    ///
    /// Returns an error only for problems that stop the whole run:
    /// configuration, input discovery, duplicate samples, or failing to
    /// create the configured directories. Pair failures are reported in
    /// the [`RunSummary`].
    pub async fn run(&self) -> Result<RunSummary> {
        let stages = self.build_stages()?;
        let discovered = self.discover()?;
        self.execute(&stages, discovered).await
    }

    /// Runs every stage over explicitly given pairs.
    pub async fn run_pairs(&self, pairs: Vec<BranchPair>) -> Result<RunSummary> {
        let stages = self.build_stages()?;
        self.execute(&stages, pairs.into_iter().map(Ok).collect()).await
    }

    async fn execute(
        &self,
        stages: &[Arc<dyn Stage>],
        discovered: DiscoveredPairs,
    ) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let events = &self.context.events;
        let mut collector = FailureCollector::new(self.config.failure_mode);

        let mut pairs = Vec::with_capacity(discovered.len());
        for entry in discovered {
            match entry {
                Ok(pair) => pairs.push(pair),
                Err(e) => {
                    warn!(file = %e.file.display(), reason = %e.reason, "Rejected input");
                    events.emit(
                        INPUT_REJECTED,
                        Some(json!({"file": e.file.display().to_string(), "reason": e.reason})),
                    );
                    let files = vec![e.file.clone()];
                    collector.record(
                        FailureRecord::new(INPUTS_STAGE, &XenoflowError::from(e)).with_files(files),
                    );
                }
            }
        }

        check_unique_samples(&pairs, &self.config.markers())?;
        for dir in self.config.dir.values() {
            ensure_dir(dir)?;
        }

        info!(run_id = %run_id, pairs = pairs.len(), stages = stages.len(), "Starting run");
        events.emit(
            RUN_STARTED,
            Some(json!({"run_id": run_id.to_string(), "pairs": pairs.len()})),
        );

        let total_pairs = pairs.len();
        let mut summaries = Vec::with_capacity(stages.len());
        let mut not_run = Vec::new();

        for (index, stage) in stages.iter().enumerate() {
            if collector.should_stop() {
                not_run = stages[index..]
                    .iter()
                    .map(|s| s.name().to_string())
                    .collect();
                warn!(stages = ?not_run, "Stopping after failures");
                break;
            }

            let name = stage.name().to_string();
            info!(stage = %name, pairs = pairs.len(), "Running stage");
            events.emit(
                STAGE_STARTED,
                Some(json!({"run_id": run_id.to_string(), "stage": name, "pairs": pairs.len()})),
            );

            let report = stage
                .run(&pairs, &self.executor)
                .instrument(info_span!("stage", stage = %name, run_id = %run_id))
                .await;

            for failed in report.failures() {
                if let Err(e) = &failed.result {
                    collector.record(
                        FailureRecord::new(&name, e)
                            .with_sample(&failed.sample)
                            .with_files(failed.pair.iter().map(|f| f.path.clone()).collect()),
                    );
                }
            }

            let summary = StageSummary::from_report(&report);
            info!(
                stage = %name,
                executed = summary.executed,
                skipped = summary.skipped,
                already_complete = summary.already_complete,
                failed = summary.failed,
                duration_ms = summary.duration_ms,
                "Stage finished"
            );
            events.emit(
                STAGE_COMPLETED,
                Some(json!({
                    "run_id": run_id.to_string(),
                    "stage": name,
                    "completed": summary.completed(),
                    "failed": summary.failed,
                })),
            );

            pairs = report.succeeded_pairs();
            summaries.push(summary);
        }

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            pairs: total_pairs,
            stages: summaries,
            not_run,
            failures: collector.into_failures(),
        };

        info!(
            run_id = %run_id,
            success = summary.is_success(),
            failures = summary.failures.len(),
            duration_ms = summary.duration_ms(),
            "Run finished"
        );
        events.emit(
            RUN_COMPLETED,
            Some(json!({
                "run_id": run_id.to_string(),
                "success": summary.is_success(),
                "failures": summary.failures.len(),
            })),
        );

        Ok(summary)
    }
}
