//! Branch labels and validated input pairs.
//!
//! Every input file belongs to one of two upstream branches (alignments
//! against two reference genomes). The branch is recovered from the file
//! name through an ordered list of marker rules.

mod label;
mod pair;

pub use label::{Branch, BranchMarkers};
pub use pair::{BranchPair, LabeledFile};
