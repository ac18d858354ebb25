//! Registry mapping stage names to constructors.

use super::{DisambiguateStage, Stage, StageRunner};
use crate::config::{PipelineConfig, StageConfig};
use crate::errors::{ConfigError, Result};
use crate::events::{EventSink, NoOpEventSink};
use crate::process::{ProcessInvoker, ProgramInvoker};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared handles passed to every stage constructor.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Runs external programs.
    pub invoker: Arc<dyn ProgramInvoker>,
    /// Receives lifecycle events.
    pub events: Arc<dyn EventSink>,
}

impl Default for StageContext {
    fn default() -> Self {
        Self {
            invoker: Arc::new(ProcessInvoker::new()),
            events: Arc::new(NoOpEventSink),
        }
    }
}

impl StageContext {
    /// Sets the invoker.
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
}

/// Builds a program stage from the stage entry named `name`.
fn program_stage(config: &PipelineConfig, name: &str, ctx: &StageContext) -> Result<Arc<dyn Stage>> {
    let runner = StageRunner::from_config(config, name)?
        .with_invoker(Arc::clone(&ctx.invoker))
        .with_events(Arc::clone(&ctx.events));
    Ok(Arc::new(DisambiguateStage::new(runner)) as Arc<dyn Stage>)
}

fn is_per_file_stage(config: &PipelineConfig, name: &str) -> bool {
    config.stage.get(name).is_some_and(StageConfig::is_per_file)
}

/// Factory function type for creating stages.
///
/// Receives the whole configuration and the name the stage is listed under.
pub type StageFactory =
    Box<dyn Fn(&PipelineConfig, &str, &StageContext) -> Result<Arc<dyn Stage>> + Send + Sync>;

/// Registry of stage factories.
pub struct StageRegistry {
    factories: BTreeMap<String, StageFactory>,
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Creates a registry with the built-in stages.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(
            DisambiguateStage::NAME,
            Box::new(|config: &PipelineConfig, name: &str, ctx: &StageContext| {
                program_stage(config, name, ctx)
            }),
        );
        registry
    }

    /// Registers a factory, replacing any previous one under the same name.
    pub fn register(&mut self, name: impl Into<String>, factory: StageFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Registers an already constructed stage under its own name.
    pub fn register_stage(&mut self, stage: Arc<dyn Stage>) {
        let name = stage.name().to_string();
        self.register(
            name,
            Box::new(move |_: &PipelineConfig, _: &str, _: &StageContext| {
                Ok(Arc::clone(&stage))
            }),
        );
    }

    /// Checks if a stage is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered stage names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Fails with a [`ConfigError`] if `name` is neither registered nor a
    /// per-file stage entry of `config`.
    pub fn check(&self, name: &str, config: &PipelineConfig) -> Result<(), ConfigError> {
        if self.contains(name) || is_per_file_stage(config, name) {
            Ok(())
        } else {
            Err(ConfigError::unknown_stage(name, &self.names()))
        }
    }

    /// Constructs the stage registered under `name`, falling back to a
    /// program stage for a per-file stage entry.
    pub fn build(
        &self,
        name: &str,
        config: &PipelineConfig,
        ctx: &StageContext,
    ) -> Result<Arc<dyn Stage>> {
        match self.factories.get(name) {
            Some(factory) => factory(config, name, ctx),
            None if is_per_file_stage(config, name) => program_stage(config, name, ctx),
            None => Err(ConfigError::unknown_stage(name, &self.names()).into()),
        }
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::RecordingStage;

    #[test]
    fn test_builtin_has_disambiguate() {
        let registry = StageRegistry::default();
        assert!(registry.contains("disambiguate"));
        assert_eq!(registry.names(), vec!["disambiguate".to_string()]);
    }

    #[test]
    fn test_build_disambiguate() {
        let config = PipelineConfig::new("results").with_stage("disambiguate", StageConfig::default());
        let stage = StageRegistry::builtin()
            .build("disambiguate", &config, &StageContext::default())
            .unwrap();
        assert_eq!(stage.name(), "disambiguate");
    }

    #[test]
    fn test_build_unknown_stage() {
        let config = PipelineConfig::new("results");
        let err = StageRegistry::builtin()
            .build("align", &config, &StageContext::default())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("align"));
    }

    #[test]
    fn test_check_empty_registry() {
        let config = PipelineConfig::new("results");
        let err = StageRegistry::empty().check("disambiguate", &config).unwrap_err();
        assert_eq!(err.key.as_deref(), Some("run.disambiguate"));
    }

    #[test]
    fn test_per_file_stage_entry_builds_without_registration() {
        let config = PipelineConfig::new("results")
            .with_stage("fastqc", StageConfig::new("fastqc").with_outputs(["{stem}_fastqc.zip"]))
            .with_stage("htseq", StageConfig::new("htseq-count"));
        let registry = StageRegistry::builtin();

        registry.check("fastqc", &config).unwrap();
        let stage = registry
            .build("fastqc", &config, &StageContext::default())
            .unwrap();
        assert_eq!(stage.name(), "fastqc");

        let err = registry.check("htseq", &config).unwrap_err();
        assert_eq!(err.key.as_deref(), Some("run.htseq"));
        assert!(registry
            .build("htseq", &config, &StageContext::default())
            .is_err());
    }

    #[test]
    fn test_register_stage_instance() {
        let mut registry = StageRegistry::empty();
        registry.register_stage(Arc::new(RecordingStage::new("count")));

        let config = PipelineConfig::new("results");
        let stage = registry.build("count", &config, &StageContext::default()).unwrap();
        assert_eq!(stage.name(), "count");
    }
}
