//! Branch tags and marker-based detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One of the two upstream processing branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    /// The first branch (by default, the human alignment).
    A,
    /// The second branch (by default, the mouse alignment).
    B,
}

impl Branch {
    /// Both branches in their fixed order.
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    /// Returns the position of the branch in a pair.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "a"),
            Self::B => write!(f, "b"),
        }
    }
}

/// A substring that tags a file with a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MarkerRule {
    marker: String,
    branch: Branch,
}

/// Marker strings for both branches, evaluated in priority order.
///
/// Rules are checked A first, then B. A file whose name contains both
/// markers is assigned to A; a file containing neither gets no label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchMarkers {
    rules: [MarkerRule; 2],
}

impl Default for BranchMarkers {
    fn default() -> Self {
        Self::new("Human", "Mouse")
    }
}

impl BranchMarkers {
    /// Creates markers for branch A and branch B.
    #[must_use]
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            rules: [
                MarkerRule {
                    marker: a.into(),
                    branch: Branch::A,
                },
                MarkerRule {
                    marker: b.into(),
                    branch: Branch::B,
                },
            ],
        }
    }

    /// Returns the marker for a branch.
    #[must_use]
    pub fn marker(&self, branch: Branch) -> &str {
        &self.rules[branch.index()].marker
    }

    /// Returns both markers in branch order.
    #[must_use]
    pub fn markers(&self) -> [&str; 2] {
        [self.marker(Branch::A), self.marker(Branch::B)]
    }

    /// Returns the directory name for a branch's final outputs, e.g. `human_mapping`.
    #[must_use]
    pub fn mapping_dir(&self, branch: Branch) -> String {
        format!("{}_mapping", self.marker(branch).to_lowercase())
    }

    /// Detects the branch of a file from its base name.
    ///
    /// Only the final path component is inspected, so markers appearing in
    /// parent directory names are ignored.
    #[must_use]
    pub fn detect(&self, path: &Path) -> Option<Branch> {
        let name = path.file_name()?.to_string_lossy();
        self.rules
            .iter()
            .find(|rule| !rule.marker.is_empty() && name.contains(rule.marker.as_str()))
            .map(|rule| rule.branch)
    }

    /// Returns true if both markers are non-empty and neither contains the other.
    ///
    /// Nested markers would make detection depend on priority alone.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let [a, b] = self.markers();
        !a.is_empty() && !b.is_empty() && !a.contains(b) && !b.contains(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_default_markers() {
        let markers = BranchMarkers::default();

        assert_eq!(markers.detect(Path::new("sample1.Human.sorted.bam")), Some(Branch::A));
        assert_eq!(markers.detect(Path::new("/x/sample1.Mouse.sorted.bam")), Some(Branch::B));
        assert_eq!(markers.detect(Path::new("sample1.sorted.bam")), None);
    }

    #[test]
    fn test_detect_uses_base_name_only() {
        let markers = BranchMarkers::default();
        let path = PathBuf::from("/runs/Human/sample1.sorted.bam");

        assert_eq!(markers.detect(&path), None);
    }

    #[test]
    fn test_detect_priority_order() {
        let markers = BranchMarkers::default();
        assert_eq!(markers.detect(Path::new("Human_vs_Mouse.bam")), Some(Branch::A));
        assert_eq!(markers.detect(Path::new("Mouse_vs_Human.bam")), Some(Branch::A));
    }

    #[test]
    fn test_detect_is_case_sensitive() {
        let markers = BranchMarkers::default();
        assert_eq!(markers.detect(Path::new("sample1.human.bam")), None);
    }

    #[test]
    fn test_mapping_dir() {
        let markers = BranchMarkers::new("GRCh38", "GRCm39");
        assert_eq!(markers.mapping_dir(Branch::A), "grch38_mapping");
        assert_eq!(markers.mapping_dir(Branch::B), "grcm39_mapping");
    }

    #[test]
    fn test_marker_validity() {
        assert!(BranchMarkers::default().is_valid());
        assert!(!BranchMarkers::new("", "Mouse").is_valid());
        assert!(!BranchMarkers::new("Hum", "Human").is_valid());
    }

    #[test]
    fn test_branch_index() {
        assert_eq!(Branch::ALL.map(Branch::index), [0, 1]);
    }
}
