//! The built-in `disambiguate` stage and configured per-file program stages.

use super::{PairResult, Stage, StageReport, StageRunner};
use crate::branch::BranchPair;
use crate::executor::Executor;
use crate::observability::SpanTimer;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Runs a stage program over every pair through a [`StageRunner`].
///
/// Under [`Self::NAME`] this is the disambiguation stage. A stage entry with
/// `outputs` gets the same type with per-file naming.
#[derive(Debug, Clone)]
pub struct DisambiguateStage {
    runner: Arc<StageRunner>,
}

impl DisambiguateStage {
    /// Registry name of the stage.
    pub const NAME: &'static str = "disambiguate";

    /// Wraps a runner.
    #[must_use]
    pub fn new(runner: StageRunner) -> Self {
        Self {
            runner: Arc::new(runner),
        }
    }

    /// The underlying runner.
    #[must_use]
    pub fn runner(&self) -> &StageRunner {
        &self.runner
    }
}

#[async_trait]
impl Stage for DisambiguateStage {
    fn name(&self) -> &str {
        self.runner.stage()
    }

    fn plan(&self, pair: &BranchPair) -> Vec<(PathBuf, PathBuf)> {
        self.runner
            .compute_output_paths(pair)
            .into_iter()
            .zip(self.runner.final_output_paths(pair))
            .collect()
    }

    async fn run(&self, inputs: &[BranchPair], executor: &Executor) -> StageReport {
        let timer = SpanTimer::start(self.name());
        let runner = Arc::clone(&self.runner);

        let results = executor
            .map(inputs.to_vec(), move |pair| {
                let runner = Arc::clone(&runner);
                async move { runner.process(&pair).await }
            })
            .await;

        let mut report = StageReport::new(self.name());
        report.pairs = inputs
            .iter()
            .zip(results)
            .map(|(pair, result)| PairResult {
                pair: pair.clone(),
                sample: self.runner.sample(pair),
                result: result.and_then(|r| r),
            })
            .collect();
        report.duration_ms = timer.finish();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;
    use crate::stages::PairStatus;
    use crate::testing::{
        assert_outputs_present, assert_pair_failed, assert_pair_status, FakeDisambiguator,
        TestProject,
    };

    #[tokio::test]
    async fn test_concurrent_pairs_share_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let project = TestProject::new(tmp.path());
        let pairs: Vec<BranchPair> = (1..=6)
            .map(|i| project.write_pair(&format!("s{i}")).unwrap())
            .collect();
        let fake = Arc::new(FakeDisambiguator::new());
        let runner = StageRunner::from_config(&project.config(), "disambiguate")
            .unwrap()
            .with_invoker(fake.clone());
        let stage = DisambiguateStage::new(runner);

        let executor = Executor::from_config(&ClusterConfig {
            cores: Some(3),
            local: false,
        });
        let report = stage.run(&pairs, &executor).await;

        assert!(report.is_success());
        assert_eq!(report.count(PairStatus::Executed), 6);
        assert_eq!(fake.call_count(), 6);
        for (pair, result) in pairs.iter().zip(&report.pairs) {
            assert_eq!(&result.pair, pair);
            assert_outputs_present(&result.result.as_ref().unwrap().outputs);
        }
        assert!(!project.results_dir().join("disambiguate").exists());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_others() {
        let tmp = tempfile::tempdir().unwrap();
        let project = TestProject::new(tmp.path());
        let pairs: Vec<BranchPair> = ["s1", "s2", "s3"]
            .iter()
            .map(|s| project.write_pair(s).unwrap())
            .collect();
        let fake = Arc::new(FakeDisambiguator::new().failing_for("s2", 1));
        let runner = StageRunner::from_config(&project.config(), "disambiguate")
            .unwrap()
            .with_invoker(fake);
        let stage = DisambiguateStage::new(runner);

        let report = stage.run(&pairs, &Executor::serial()).await;

        assert_pair_status(&report.pairs[0], PairStatus::Executed);
        assert_pair_failed(&report.pairs[1]);
        assert_pair_status(&report.pairs[2], PairStatus::Executed);
        assert_eq!(report.pairs[1].sample, "s2");
        assert!(project.results_dir().join("disambiguate").is_dir());
    }

    #[test]
    fn test_plan_pairs_temp_and_final() {
        let tmp = tempfile::tempdir().unwrap();
        let project = TestProject::new(tmp.path());
        let pair = project.write_pair("s1").unwrap();
        let stage =
            DisambiguateStage::new(StageRunner::from_config(&project.config(), "disambiguate").unwrap());

        let plan = stage.plan(&pair);

        assert_eq!(plan.len(), 4);
        assert!(plan[0].0.starts_with(project.results_dir().join("disambiguate")));
        assert!(plan[3].1.starts_with(project.results_dir().join("mouse_mapping/disambiguate")));
    }
}
