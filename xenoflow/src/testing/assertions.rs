//! Test assertions for stage outputs on disk.

use crate::stages::{PairResult, PairStatus};
use crate::utils::exists_nonempty;
use std::path::Path;

/// Asserts that every path is a non-empty file.
pub fn assert_outputs_present<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        let path = path.as_ref();
        assert!(
            exists_nonempty(path),
            "Expected non-empty output at {}",
            path.display()
        );
    }
}

/// Asserts that no path exists.
pub fn assert_outputs_absent<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        let path = path.as_ref();
        assert!(!path.exists(), "Expected no file at {}", path.display());
    }
}

/// Asserts that a pair succeeded with the expected status.
pub fn assert_pair_status(result: &PairResult, expected: PairStatus) {
    match &result.result {
        Ok(outcome) => assert_eq!(
            outcome.status, expected,
            "Expected status {expected} for sample '{}', got {}",
            result.sample, outcome.status
        ),
        Err(e) => panic!(
            "Expected status {expected} for sample '{}', got error: {e}",
            result.sample
        ),
    }
}

/// Asserts that a pair failed.
pub fn assert_pair_failed(result: &PairResult) {
    assert!(
        result.result.is_err(),
        "Expected sample '{}' to fail, got {:?}",
        result.sample,
        result.status()
    );
}
