//! Top-level pipeline configuration.

use super::LogConfig;
use crate::branch::BranchMarkers;
use crate::errors::ConfigError;
use crate::pipeline::FailureMode;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Key under `dir` naming the base results directory.
pub const RESULTS_KEY: &str = "results";

/// Configuration of a single stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Path or command name of the external program.
    #[serde(default)]
    pub program: Option<String>,
    /// Interpreter to run the program with, e.g. `perl`.
    #[serde(default)]
    pub interpreter: Option<String>,
    /// Extension of the produced files, without the dot.
    #[serde(default)]
    pub extension: Option<String>,
    /// Argument templates for stages run once per input file. Defaults to
    /// `["{input}", "{out_dir}"]`.
    #[serde(default)]
    pub args: Option<Vec<String>>,
    /// Output file name templates, one set per input file. Declaring them
    /// turns any run-list entry into a per-file command stage.
    #[serde(default)]
    pub outputs: Option<Vec<String>>,
    /// Any other stage options.
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_yaml::Value>,
}

impl StageConfig {
    /// Creates a stage configuration for a program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: Some(program.into()),
            ..Self::default()
        }
    }

    /// Sets the interpreter.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    /// Sets the output extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Sets per-file output templates.
    #[must_use]
    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.outputs = Some(outputs.into_iter().map(Into::into).collect());
        self
    }

    /// Sets per-file argument templates.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// True if the stage declares per-file outputs.
    #[must_use]
    pub fn is_per_file(&self) -> bool {
        self.outputs.is_some()
    }

    /// Returns the program, or `default` if none is configured.
    #[must_use]
    pub fn program_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.program.as_deref().unwrap_or(default)
    }
}

/// One upstream branch: its file-name marker and where its files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchConfig {
    /// Substring identifying the branch in file names.
    pub marker: String,
    /// Directory searched for this branch's input files.
    #[serde(default)]
    pub input_dir: Option<PathBuf>,
}

impl BranchConfig {
    /// Creates a branch with a marker and no input directory.
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            input_dir: None,
        }
    }

    /// Sets the input directory.
    #[must_use]
    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = Some(dir.into());
        self
    }
}

fn default_branch_a() -> BranchConfig {
    BranchConfig::new("Human")
}

fn default_branch_b() -> BranchConfig {
    BranchConfig::new("Mouse")
}

/// Both branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchesConfig {
    /// Branch A (checked first during labeling).
    #[serde(default = "default_branch_a")]
    pub a: BranchConfig,
    /// Branch B.
    #[serde(default = "default_branch_b")]
    pub b: BranchConfig,
}

impl Default for BranchesConfig {
    fn default() -> Self {
        Self {
            a: default_branch_a(),
            b: default_branch_b(),
        }
    }
}

/// Parallel execution settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Maximum number of pairs processed at once. Defaults to the CPU count.
    #[serde(default)]
    pub cores: Option<usize>,
    /// Run everything in-process, one pair at a time.
    #[serde(default)]
    pub local: bool,
}

impl ClusterConfig {
    /// Returns the effective concurrency bound, never zero.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        if self.local {
            return 1;
        }
        self.cores.unwrap_or_else(num_cpus::get).max(1)
    }
}

fn default_input_suffix() -> String {
    ".sorted.bam".to_string()
}

fn deserialize_stages<'de, D>(deserializer: D) -> Result<BTreeMap<String, StageConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    // `disambiguate:` with no body is a valid entry using all defaults.
    let raw: BTreeMap<String, Option<StageConfig>> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, config)| (name, config.unwrap_or_default()))
        .collect())
}

/// The complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Named directories; `results` is required.
    #[serde(default)]
    pub dir: BTreeMap<String, PathBuf>,
    /// Branch markers and input directories.
    #[serde(default)]
    pub branches: BranchesConfig,
    /// Suffix identifying input files during discovery.
    #[serde(default = "default_input_suffix")]
    pub input_suffix: String,
    /// Stage names to run, in order.
    #[serde(default)]
    pub run: Vec<String>,
    /// Per-stage configuration.
    #[serde(default, deserialize_with = "deserialize_stages")]
    pub stage: BTreeMap<String, StageConfig>,
    /// Parallel execution settings.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// How per-pair failures affect later stages.
    #[serde(default)]
    pub failure_mode: FailureMode,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dir: BTreeMap::new(),
            branches: BranchesConfig::default(),
            input_suffix: default_input_suffix(),
            run: Vec::new(),
            stage: BTreeMap::new(),
            cluster: ClusterConfig::default(),
            failure_mode: FailureMode::default(),
            log: LogConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with a results directory and nothing else.
    #[must_use]
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.dir.insert(RESULTS_KEY.to_string(), results_dir.into());
        config
    }

    /// Parses a configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::new(format!("invalid YAML: {e}")))
    }

    /// Reads and parses a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::new(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
            .map_err(|e| ConfigError::new(format!("{}: {}", path.display(), e.message)))
    }

    /// Adds a stage configuration.
    #[must_use]
    pub fn with_stage(mut self, name: impl Into<String>, stage: StageConfig) -> Self {
        self.stage.insert(name.into(), stage);
        self
    }

    /// Sets the run list.
    #[must_use]
    pub fn with_run(mut self, stages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.run = stages.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the branch markers.
    #[must_use]
    pub fn with_markers(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.branches.a.marker = a.into();
        self.branches.b.marker = b.into();
        self
    }

    /// Sets the input directories for discovery.
    #[must_use]
    pub fn with_input_dirs(mut self, a: impl Into<PathBuf>, b: impl Into<PathBuf>) -> Self {
        self.branches.a.input_dir = Some(a.into());
        self.branches.b.input_dir = Some(b.into());
        self
    }

    /// Sets the cluster settings.
    #[must_use]
    pub fn with_cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = cluster;
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Returns the base results directory.
    pub fn results_dir(&self) -> Result<&Path, ConfigError> {
        self.dir
            .get(RESULTS_KEY)
            .map(PathBuf::as_path)
            .ok_or_else(|| ConfigError::missing_key(format!("dir.{RESULTS_KEY}")))
    }

    /// Returns the configuration of a stage.
    pub fn stage_config(&self, name: &str) -> Result<&StageConfig, ConfigError> {
        self.stage.get(name).ok_or_else(|| ConfigError::missing_stage(name))
    }

    /// Returns the branch markers.
    #[must_use]
    pub fn markers(&self) -> BranchMarkers {
        BranchMarkers::new(self.branches.a.marker.clone(), self.branches.b.marker.clone())
    }

    /// Checks key presence and basic shape.
    ///
    /// Stage implementations are checked separately against the registry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.results_dir()?;

        if self.run.is_empty() {
            return Err(ConfigError::new("run list is empty").with_key("run"));
        }

        for name in &self.run {
            let stage = self.stage_config(name)?;
            if stage.is_per_file() {
                if stage.program.is_none() {
                    return Err(ConfigError::missing_key(format!("stage.{name}.program")));
                }
                if stage.outputs.as_ref().is_some_and(Vec::is_empty) {
                    return Err(ConfigError::new(format!("stage '{name}' declares no outputs"))
                        .with_key(format!("stage.{name}.outputs")));
                }
            }
        }

        if !self.markers().is_valid() {
            return Err(ConfigError::new(format!(
                "branch markers {:?} must be non-empty and must not contain each other",
                self.markers().markers()
            ))
            .with_key("branches"));
        }

        if self.input_suffix.is_empty() {
            return Err(ConfigError::new("input_suffix must not be empty").with_key("input_suffix"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL: &str = r"
dir:
  results: out/results
  data: data
branches:
  a: { marker: Human, input_dir: data/human }
  b: { marker: Mouse, input_dir: data/mouse }
run:
  - disambiguate
stage:
  disambiguate:
    program: /opt/bin/disamb_byMapping2.pl
    interpreter: perl
    min_mapq: 10
cluster:
  cores: 4
failure_mode: continue_on_failure
log:
  level: debug
  format: json
";

    #[test]
    fn test_parse_full_config() {
        let config = PipelineConfig::from_yaml_str(FULL).unwrap();

        assert_eq!(config.results_dir().unwrap(), Path::new("out/results"));
        assert_eq!(config.run, vec!["disambiguate".to_string()]);
        assert_eq!(config.branches.b.input_dir, Some(PathBuf::from("data/mouse")));
        assert_eq!(config.cluster.max_concurrent(), 4);
        assert_eq!(config.failure_mode, FailureMode::ContinueOnFailure);
        assert_eq!(config.log.format, crate::config::LogFormat::Json);

        let stage = config.stage_config("disambiguate").unwrap();
        assert_eq!(stage.interpreter.as_deref(), Some("perl"));
        assert_eq!(stage.options.get("min_mapq").and_then(serde_yaml::Value::as_i64), Some(10));
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_yaml_str("dir: {results: r}\nrun: [disambiguate]\nstage:\n  disambiguate:\n").unwrap();

        assert_eq!(config.markers(), BranchMarkers::default());
        assert_eq!(config.input_suffix, ".sorted.bam");
        assert_eq!(config.stage_config("disambiguate").unwrap(), &StageConfig::default());
        assert_eq!(config.failure_mode, FailureMode::FailFast);
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_results_dir() {
        let config = PipelineConfig::from_yaml_str("run: [disambiguate]\nstage: {disambiguate: {}}").unwrap();
        let err = config.validate().unwrap_err();

        assert_eq!(err.key.as_deref(), Some("dir.results"));
    }

    #[test]
    fn test_run_list_stage_without_entry() {
        let config = PipelineConfig::new("r").with_run(["disambiguate", "count"]).with_stage(
            "disambiguate",
            StageConfig::new("disamb.pl"),
        );
        let err = config.validate().unwrap_err();

        assert_eq!(err.key.as_deref(), Some("stage.count"));
    }

    #[test]
    fn test_per_file_stage_entry() {
        let config = PipelineConfig::from_yaml_str(
            r#"
dir: {results: r}
run: [fastqc, disambiguate]
stage:
  fastqc:
    program: fastqc
    args: ["-o", "{out_dir}", "{input}"]
    outputs: ["{stem}_fastqc.zip"]
  disambiguate:
"#,
        )
        .unwrap();

        let fastqc = config.stage_config("fastqc").unwrap();
        assert!(fastqc.is_per_file());
        assert_eq!(fastqc.args.as_ref().map(Vec::len), Some(3));
        assert!(!config.stage_config("disambiguate").unwrap().is_per_file());
        config.validate().unwrap();
    }

    #[test]
    fn test_per_file_stage_needs_program_and_outputs() {
        let no_program = PipelineConfig::new("r")
            .with_run(["fastqc"])
            .with_stage("fastqc", StageConfig::default().with_outputs(["{stem}_fastqc.zip"]));
        assert_eq!(
            no_program.validate().unwrap_err().key.as_deref(),
            Some("stage.fastqc.program")
        );

        let no_outputs = PipelineConfig::new("r")
            .with_run(["fastqc"])
            .with_stage("fastqc", StageConfig::new("fastqc").with_outputs(Vec::<String>::new()));
        assert_eq!(
            no_outputs.validate().unwrap_err().key.as_deref(),
            Some("stage.fastqc.outputs")
        );
    }

    #[test]
    fn test_empty_run_list() {
        let config = PipelineConfig::new("r");
        assert_eq!(config.validate().unwrap_err().key.as_deref(), Some("run"));
    }

    #[test]
    fn test_nested_markers_rejected() {
        let config = PipelineConfig::new("r")
            .with_run(["disambiguate"])
            .with_stage("disambiguate", StageConfig::default())
            .with_markers("Mouse", "Mouse2");

        assert_eq!(config.validate().unwrap_err().key.as_deref(), Some("branches"));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = PipelineConfig::from_yaml_str("run: [unterminated").unwrap_err();
        assert!(err.message.contains("invalid YAML"));
    }

    #[test]
    fn test_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pipeline.yaml");
        std::fs::write(&path, FULL).unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.dir.len(), 2);

        let missing = PipelineConfig::from_file(tmp.path().join("nope.yaml")).unwrap_err();
        assert!(missing.message.contains("nope.yaml"));
    }

    #[test]
    fn test_cluster_local_is_serial() {
        let cluster = ClusterConfig {
            cores: Some(16),
            local: true,
        };
        assert_eq!(cluster.max_concurrent(), 1);
        assert_eq!(ClusterConfig { cores: Some(0), local: false }.max_concurrent(), 1);
    }
}
