//! Blocking filesystem operations with path-carrying errors.

use crate::errors::{Result, XenoflowError};
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// Creates a directory and its parents if absent.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path).map_err(|e| XenoflowError::io("create directory", path, e))
}

/// Returns true if `path` is a regular file with at least one byte.
///
/// Any error while reading metadata counts as "does not exist".
#[must_use]
pub fn exists_nonempty(path: impl AsRef<Path>) -> bool {
    fs::metadata(path.as_ref())
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Returns true if the slice is non-empty and every path exists and is non-empty.
#[must_use]
pub fn all_exist_nonempty<P: AsRef<Path>>(paths: &[P]) -> bool {
    !paths.is_empty() && paths.iter().all(|p| exists_nonempty(p))
}

/// Renames `from` to `to`, creating the destination directory first.
pub fn move_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    let from = from.as_ref();
    let to = to.as_ref();

    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    trace!(from = %from.display(), to = %to.display(), "Moving file");
    fs::rename(from, to).map_err(|e| XenoflowError::io("move file", from, e))
}

/// Removes a directory if it holds no entries.
///
/// Returns `Ok(false)` and leaves the directory alone if anything is left in
/// it. A directory that is already gone counts as removed.
pub fn remove_dir_if_empty(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    let mut entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(XenoflowError::io("read directory", path, e)),
    };
    if entries.next().is_some() {
        trace!(path = %path.display(), "Directory not empty, keeping it");
        return Ok(false);
    }

    match fs::remove_dir(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed directory");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(XenoflowError::io("remove directory", path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_ensure_dir_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");

        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();

        assert!(nested.is_dir());
    }

    #[test]
    fn test_exists_nonempty() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty.sam");
        let full = tmp.path().join("full.sam");
        fs::write(&empty, b"").unwrap();
        fs::write(&full, b"@HD\n").unwrap();

        assert!(!exists_nonempty(&empty));
        assert!(exists_nonempty(&full));
        assert!(!exists_nonempty(tmp.path().join("missing.sam")));
        assert!(!exists_nonempty(tmp.path()));
    }

    #[test]
    fn test_all_exist_nonempty() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::write(&a, b"x").unwrap();

        assert!(!all_exist_nonempty::<PathBuf>(&[]));
        assert!(all_exist_nonempty(&[a.clone()]));
        assert!(!all_exist_nonempty(&[a, b]));
    }

    #[test]
    fn test_move_file_creates_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("x.sam");
        let to = tmp.path().join("out/deep/x.sam");
        fs::write(&from, b"data").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"data");
    }

    #[test]
    fn test_move_missing_file_names_source() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("gone.sam");
        let err = move_file(&from, tmp.path().join("dst.sam")).unwrap_err();

        assert!(err.to_string().contains("gone.sam"));
    }

    #[test]
    fn test_remove_dir_if_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("stage");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("s2.ambiguousMouse.sam"), b"x").unwrap();

        assert!(!remove_dir_if_empty(&dir).unwrap());
        assert!(dir.is_dir());

        fs::remove_file(dir.join("s2.ambiguousMouse.sam")).unwrap();
        assert!(remove_dir_if_empty(&dir).unwrap());
        assert!(!dir.exists());
        assert!(remove_dir_if_empty(&dir).unwrap());
    }

    #[test]
    fn test_remove_dir_if_empty_on_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("stage");
        fs::write(&file, b"x").unwrap();

        let err = remove_dir_if_empty(&file).unwrap_err();
        assert!(err.to_string().contains("stage"));
    }
}
