//! On-disk fixtures for runner and pipeline tests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::branch::{Branch, BranchMarkers, BranchPair};
use crate::config::{PipelineConfig, StageConfig};

/// Stand-in content for an input alignment file.
pub const FAKE_INPUT: &[u8] = b"BAM\x01";

/// A project layout rooted in a caller-owned directory.
///
/// Inputs go to `<root>/data/<marker-lowercase>/<sample>.<Marker>.sorted.bam`
/// and results to `<root>/results`.
#[derive(Debug, Clone)]
pub struct TestProject {
    root: PathBuf,
    markers: BranchMarkers,
}

impl TestProject {
    /// Creates a project under `root` with the default markers.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            markers: BranchMarkers::default(),
        }
    }

    /// Uses different markers.
    #[must_use]
    pub fn with_markers(mut self, markers: BranchMarkers) -> Self {
        self.markers = markers;
        self
    }

    /// The project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The markers in use.
    #[must_use]
    pub fn markers(&self) -> &BranchMarkers {
        &self.markers
    }

    /// `<root>/results`.
    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    /// Input directory of a branch.
    #[must_use]
    pub fn input_dir(&self, branch: Branch) -> PathBuf {
        self.root
            .join("data")
            .join(self.markers.marker(branch).to_lowercase())
    }

    /// Writes the input path for one branch of a sample.
    pub fn write_input(&self, sample: &str, branch: Branch) -> io::Result<PathBuf> {
        let dir = self.input_dir(branch);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{sample}.{}.sorted.bam", self.markers.marker(branch)));
        fs::write(&path, FAKE_INPUT)?;
        Ok(path)
    }

    /// Writes both inputs of a sample and returns the labeled pair.
    pub fn write_pair(&self, sample: &str) -> io::Result<BranchPair> {
        let a = self.write_input(sample, Branch::A)?;
        let b = self.write_input(sample, Branch::B)?;
        BranchPair::from_files(a, b, &self.markers)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))
    }

    /// A configuration running `disambiguate` over this project's inputs.
    #[must_use]
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig::new(self.results_dir())
            .with_markers(self.markers.marker(Branch::A), self.markers.marker(Branch::B))
            .with_input_dirs(self.input_dir(Branch::A), self.input_dir(Branch::B))
            .with_run(["disambiguate"])
            .with_stage("disambiguate", StageConfig::default())
    }
}
