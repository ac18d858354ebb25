//! Shared temporary directory of a stage.
//!
//! Every pair processed by a stage writes into the same `<results>/<stage>/`
//! directory. A [`StageWorkspace`] counts the pairs currently using it so
//! that the directory is removed only by the last pair to finish, only once
//! nothing is left in it, and never after any pair failed inside it.

use crate::errors::Result;
use crate::utils::{ensure_dir, remove_dir_if_empty};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct WorkspaceState {
    active: usize,
    poisoned: bool,
}

/// What happened to the directory when a lease completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    /// This was the last lease; the directory was removed.
    Removed,
    /// Other pairs still hold leases.
    InUse {
        /// Leases still active.
        active: usize,
    },
    /// Files of other pairs remain, e.g. outputs of an earlier run that
    /// have not been finalized yet.
    Occupied,
    /// A pair failed in this workspace, or the directory could not be
    /// removed; it is kept.
    Kept,
}

/// Reference-counted owner of a stage directory.
#[derive(Debug)]
pub struct StageWorkspace {
    dir: PathBuf,
    state: Mutex<WorkspaceState>,
}

impl StageWorkspace {
    /// Creates a workspace for `dir`. Nothing is created on disk yet.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.into(),
            state: Mutex::new(WorkspaceState::default()),
        })
    }

    /// The directory this workspace manages.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the directory if needed and takes a lease on it.
    pub fn enter(self: &Arc<Self>) -> Result<StageLease> {
        let mut state = self.state.lock();
        ensure_dir(&self.dir)?;
        state.active += 1;
        debug!(dir = %self.dir.display(), active = state.active, "Entered stage workspace");

        Ok(StageLease {
            workspace: Arc::clone(self),
            released: false,
        })
    }

    /// Number of leases currently held.
    #[must_use]
    pub fn active(&self) -> usize {
        self.state.lock().active
    }

    /// True once any lease was dropped without completing.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.state.lock().poisoned
    }
}

/// One pair's hold on a [`StageWorkspace`].
///
/// Call [`StageLease::complete`] after the pair's outputs have been moved
/// out. Dropping the lease instead marks the workspace as failed.
#[derive(Debug)]
pub struct StageLease {
    workspace: Arc<StageWorkspace>,
    released: bool,
}

impl StageLease {
    /// The leased directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.workspace.dir()
    }

    /// Releases the lease after a successful finalize.
    ///
    /// The last lease out removes the directory if it is empty and the
    /// workspace is not poisoned. A failed removal is logged and reported as
    /// [`Cleanup::Kept`]; the pair's outputs are already in place by then.
    pub fn complete(mut self) -> Cleanup {
        self.released = true;
        let mut state = self.workspace.state.lock();
        state.active = state.active.saturating_sub(1);

        if state.poisoned {
            return Cleanup::Kept;
        }
        if state.active > 0 {
            return Cleanup::InUse {
                active: state.active,
            };
        }

        // Held under the lock so a concurrent `enter` cannot race the removal.
        match remove_dir_if_empty(&self.workspace.dir) {
            Ok(true) => Cleanup::Removed,
            Ok(false) => Cleanup::Occupied,
            Err(e) => {
                warn!(
                    dir = %self.workspace.dir.display(),
                    error = %e,
                    "Could not remove stage workspace; keeping it"
                );
                Cleanup::Kept
            }
        }
    }
}

impl Drop for StageLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut state = self.workspace.state.lock();
        state.active = state.active.saturating_sub(1);
        if !state.poisoned {
            warn!(
                dir = %self.workspace.dir.display(),
                "Pair failed in stage workspace; keeping directory for inspection"
            );
        }
        state.poisoned = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_lease_removes_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = StageWorkspace::new(tmp.path().join("disambiguate"));

        let first = ws.enter().unwrap();
        let second = ws.enter().unwrap();
        assert!(ws.dir().is_dir());
        assert_eq!(ws.active(), 2);

        assert_eq!(first.complete(), Cleanup::InUse { active: 1 });
        assert!(ws.dir().is_dir());

        assert_eq!(second.complete(), Cleanup::Removed);
        assert!(!ws.dir().exists());
        assert_eq!(ws.active(), 0);
    }

    #[test]
    fn test_dropped_lease_poisons() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = StageWorkspace::new(tmp.path().join("disambiguate"));

        let ok = ws.enter().unwrap();
        let failed = ws.enter().unwrap();
        drop(failed);

        assert!(ws.is_poisoned());
        assert_eq!(ok.complete(), Cleanup::Kept);
        assert!(ws.dir().is_dir());
    }

    #[test]
    fn test_reenter_after_removal_recreates() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = StageWorkspace::new(tmp.path().join("stage"));

        ws.enter().unwrap().complete();
        assert!(!ws.dir().exists());

        let lease = ws.enter().unwrap();
        assert!(lease.dir().is_dir());
        assert_eq!(lease.complete(), Cleanup::Removed);
    }

    #[test]
    fn test_leftover_files_keep_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = StageWorkspace::new(tmp.path().join("disambiguate"));

        let lease = ws.enter().unwrap();
        std::fs::write(ws.dir().join("s2.disambiguousHuman.sam"), b"@HD\n").unwrap();

        assert_eq!(lease.complete(), Cleanup::Occupied);
        assert!(ws.dir().join("s2.disambiguousHuman.sam").is_file());
        assert!(!ws.is_poisoned());
    }

    #[test]
    fn test_failed_removal_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = StageWorkspace::new(tmp.path().join("disambiguate"));

        let lease = ws.enter().unwrap();
        std::fs::remove_dir(ws.dir()).unwrap();
        std::fs::write(ws.dir(), b"not a directory").unwrap();

        assert_eq!(lease.complete(), Cleanup::Kept);
        assert!(ws.dir().is_file());
    }
}
