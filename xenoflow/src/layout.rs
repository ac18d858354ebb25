//! Output path derivation for paired stages.
//!
//! Paths are pure functions of the input file names, the branch markers,
//! the stage name and the results directory. Nothing here touches the disk.

use crate::branch::{Branch, BranchMarkers, BranchPair};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default extension of disambiguation outputs.
pub const DEFAULT_EXTENSION: &str = "sam";

/// Subdirectory of the stage directory holding outputs of failed runs.
pub const FAILED_DIR: &str = "failed";

/// The two kinds of output produced per branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Reads unambiguously assigned to the branch.
    Resolved,
    /// Reads that could not be assigned.
    Ambiguous,
}

impl OutputKind {
    /// Both kinds in output order.
    pub const ALL: [Self; 2] = [Self::Resolved, Self::Ambiguous];

    /// The token the disambiguation program puts in file names.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Resolved => "disambiguous",
            Self::Ambiguous => "ambiguous",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved => write!(f, "resolved"),
            Self::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

/// The two derived outputs for one branch of a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFileSet {
    /// The branch these outputs belong to.
    pub branch: Branch,
    /// Resolved output path.
    pub resolved: PathBuf,
    /// Ambiguous output path.
    pub ambiguous: PathBuf,
}

impl OutputFileSet {
    /// Returns the path for an output kind.
    #[must_use]
    pub fn path(&self, kind: OutputKind) -> &Path {
        match kind {
            OutputKind::Resolved => &self.resolved,
            OutputKind::Ambiguous => &self.ambiguous,
        }
    }

    /// Returns `[resolved, ambiguous]`.
    #[must_use]
    pub fn paths(&self) -> [&Path; 2] {
        [&self.resolved, &self.ambiguous]
    }
}

/// Flattens output sets into `[A-resolved, A-ambiguous, B-resolved, B-ambiguous]`.
#[must_use]
pub fn flatten(sets: &[OutputFileSet; 2]) -> Vec<PathBuf> {
    sets.iter()
        .flat_map(|set| set.paths().map(Path::to_path_buf))
        .collect()
}

/// Derives the sample name from an input file name.
///
/// The last extension is dropped, then everything from the first occurrence
/// of the marker onward, then trailing `.`, `_` and `-`. If that leaves
/// nothing, the extension-less stem is used as is.
#[must_use]
pub fn sample_name(path: &Path, marker: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if marker.is_empty() {
        return stem;
    }

    match stem.find(marker) {
        Some(pos) => {
            let prefix = stem[..pos].trim_end_matches(['.', '_', '-']);
            if prefix.is_empty() {
                stem
            } else {
                prefix.to_string()
            }
        }
        None => stem,
    }
}

/// Output file name for a sample, kind and marker.
#[must_use]
pub fn output_file_name(sample: &str, kind: OutputKind, marker: &str, extension: &str) -> String {
    format!("{sample}.{}{marker}.{extension}", kind.token())
}

/// Expands `{input}`, `{out_dir}`, `{name}`, `{stem}`, `{sample}` and
/// `{marker}` in a per-file template. Other text is kept as is.
#[must_use]
pub fn render_template(template: &str, input: &Path, marker: &str, out_dir: &Path) -> String {
    let name = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    template
        .replace("{input}", &input.display().to_string())
        .replace("{out_dir}", &out_dir.display().to_string())
        .replace("{name}", &name)
        .replace("{stem}", &stem)
        .replace("{sample}", &sample_name(input, marker))
        .replace("{marker}", marker)
}

/// How a stage names its outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputNaming {
    /// Resolved and ambiguous outputs for each branch of a pair.
    #[default]
    Disambiguation,
    /// File name templates expanded once per input file.
    PerFile(Vec<String>),
}

/// Directory layout for one stage under a results directory.
///
/// Temporary outputs live in `<results>/<stage>/`; final outputs in
/// `<results>/<marker-lowercase>_mapping/<stage>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLayout {
    results_dir: PathBuf,
    stage: String,
    extension: String,
    markers: BranchMarkers,
    naming: OutputNaming,
}

impl StageLayout {
    /// Creates a layout with the default extension.
    #[must_use]
    pub fn new(results_dir: impl Into<PathBuf>, stage: impl Into<String>, markers: BranchMarkers) -> Self {
        Self {
            results_dir: results_dir.into(),
            stage: stage.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            markers,
            naming: OutputNaming::default(),
        }
    }

    /// Sets how outputs are named.
    #[must_use]
    pub fn with_naming(mut self, naming: OutputNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Returns how outputs are named.
    #[must_use]
    pub fn naming(&self) -> &OutputNaming {
        &self.naming
    }

    /// Sets the output extension (without the leading dot).
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Returns the branch markers.
    #[must_use]
    pub fn markers(&self) -> &BranchMarkers {
        &self.markers
    }

    /// Returns the results directory.
    #[must_use]
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// The temporary per-stage output directory.
    #[must_use]
    pub fn stage_dir(&self) -> PathBuf {
        self.results_dir.join(&self.stage)
    }

    /// Where a failed run's leftovers for `sample` are kept:
    /// `<results>/<stage>/failed/<sample>/`.
    #[must_use]
    pub fn failed_dir(&self, sample: &str) -> PathBuf {
        self.stage_dir().join(FAILED_DIR).join(sample)
    }

    /// The final output directory for a branch.
    #[must_use]
    pub fn final_dir(&self, branch: Branch) -> PathBuf {
        self.results_dir
            .join(self.markers.mapping_dir(branch))
            .join(&self.stage)
    }

    /// Returns the sample name of a pair's file for a branch.
    #[must_use]
    pub fn sample(&self, pair: &BranchPair, branch: Branch) -> String {
        sample_name(pair.file(branch), self.markers.marker(branch))
    }

    fn sets_under(&self, pair: &BranchPair, dir_for: impl Fn(Branch) -> PathBuf) -> [OutputFileSet; 2] {
        Branch::ALL.map(|branch| {
            let marker = self.markers.marker(branch);
            let sample = sample_name(pair.file(branch), marker);
            let dir = dir_for(branch);
            let [resolved, ambiguous] = OutputKind::ALL
                .map(|kind| dir.join(output_file_name(&sample, kind, marker, &self.extension)));
            OutputFileSet {
                branch,
                resolved,
                ambiguous,
            }
        })
    }

    /// Output sets in the temporary stage directory.
    #[must_use]
    pub fn temp_sets(&self, pair: &BranchPair) -> [OutputFileSet; 2] {
        let dir = self.stage_dir();
        self.sets_under(pair, |_| dir.clone())
    }

    /// Output sets in the final per-branch layout.
    #[must_use]
    pub fn final_sets(&self, pair: &BranchPair) -> [OutputFileSet; 2] {
        self.sets_under(pair, |branch| self.final_dir(branch))
    }

    fn per_file_paths(
        &self,
        pair: &BranchPair,
        templates: &[String],
        dir_for: impl Fn(Branch) -> PathBuf,
    ) -> Vec<PathBuf> {
        let out_dir = self.stage_dir();
        let mut paths = Vec::with_capacity(templates.len() * 2);
        for branch in Branch::ALL {
            let input = pair.file(branch);
            let marker = self.markers.marker(branch);
            let dir = dir_for(branch);
            for template in templates {
                paths.push(dir.join(render_template(template, input, marker, &out_dir)));
            }
        }
        paths
    }

    /// Flattened temporary paths, branch A's before branch B's.
    #[must_use]
    pub fn temp_paths(&self, pair: &BranchPair) -> Vec<PathBuf> {
        match &self.naming {
            OutputNaming::Disambiguation => flatten(&self.temp_sets(pair)),
            OutputNaming::PerFile(templates) => {
                let dir = self.stage_dir();
                self.per_file_paths(pair, templates, |_| dir.clone())
            }
        }
    }

    /// Flattened final paths, positionally matching [`Self::temp_paths`].
    #[must_use]
    pub fn final_paths(&self, pair: &BranchPair) -> Vec<PathBuf> {
        match &self.naming {
            OutputNaming::Disambiguation => flatten(&self.final_sets(pair)),
            OutputNaming::PerFile(templates) => {
                self.per_file_paths(pair, templates, |branch| self.final_dir(branch))
            }
        }
    }
}
