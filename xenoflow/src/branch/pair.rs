//! Validated two-branch input pairs.

use super::{Branch, BranchMarkers};
use crate::errors::LabelingError;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// An input file tagged with the branch that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledFile {
    /// The branch.
    pub branch: Branch,
    /// The input file.
    pub path: PathBuf,
}

/// Exactly one input file per branch, stored in fixed A, B order.
///
/// Construction is the only place labels are checked, so every
/// `BranchPair` in circulation is known to be well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchPair {
    files: [LabeledFile; 2],
}

impl BranchPair {
    /// Labels two files and orders them A, B.
    ///
    /// The files may be given in either order.
    ///
    /// # Errors
    ///
    /// Returns a [`LabelingError`] if either file name carries no marker or
    /// both carry the same one.
    pub fn from_files(
        first: impl Into<PathBuf>,
        second: impl Into<PathBuf>,
        markers: &BranchMarkers,
    ) -> Result<Self, LabelingError> {
        let first = first.into();
        let second = second.into();

        let first_branch = markers
            .detect(&first)
            .ok_or_else(|| LabelingError::no_marker(&first, &markers.markers()))?;
        let second_branch = markers
            .detect(&second)
            .ok_or_else(|| LabelingError::no_marker(&second, &markers.markers()))?;

        if first_branch == second_branch {
            return Err(LabelingError::duplicate_branch(
                &second,
                markers.marker(second_branch),
                &first,
            ));
        }

        let (a, b) = match first_branch {
            Branch::A => (first, second),
            Branch::B => (second, first),
        };

        Ok(Self {
            files: [
                LabeledFile {
                    branch: Branch::A,
                    path: a,
                },
                LabeledFile {
                    branch: Branch::B,
                    path: b,
                },
            ],
        })
    }

    /// Returns the file for a branch.
    #[must_use]
    pub fn file(&self, branch: Branch) -> &Path {
        &self.files[branch.index()].path
    }

    /// Returns both labeled files in A, B order.
    #[must_use]
    pub fn files(&self) -> &[LabeledFile; 2] {
        &self.files
    }

    /// Iterates over the labeled files in A, B order.
    pub fn iter(&self) -> impl Iterator<Item = &LabeledFile> {
        self.files.iter()
    }
}

impl fmt::Display for BranchPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {})",
            self.file(Branch::A).display(),
            self.file(Branch::B).display()
        )
    }
}
