//! Input discovery and pairing.
//!
//! Each branch has its own input directory. Files ending in the configured
//! suffix are collected recursively, sorted by path, and zipped into pairs.

use crate::branch::{Branch, BranchMarkers, BranchPair};
use crate::config::PipelineConfig;
use crate::errors::{ConfigError, InputError, LabelingError, Result, XenoflowError};
use crate::layout::sample_name;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Pairs produced by discovery; mislabeled pairs are kept as errors so the
/// caller can report them.
pub type DiscoveredPairs = Vec<std::result::Result<BranchPair, LabelingError>>;

/// Finds all files under `dir` whose name ends in `suffix`, sorted.
///
/// Symbolic links to files are included.
pub fn find_inputs(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(InputError::new(format!(
            "input directory {} does not exist",
            dir.display()
        ))
        .into());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            XenoflowError::io("walk input directory", path, source)
        })?;

        let path = entry.path();
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(suffix));
        if matches && path.is_file() {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    debug!(dir = %dir.display(), count = files.len(), "Found input files");
    Ok(files)
}

/// Zips two sorted file lists into labeled pairs.
///
/// # Errors
///
/// Returns an [`InputError`] if the lists differ in length. Labeling
/// problems are returned per pair.
pub fn pair_inputs(
    a_files: Vec<PathBuf>,
    b_files: Vec<PathBuf>,
    markers: &BranchMarkers,
) -> std::result::Result<DiscoveredPairs, InputError> {
    if a_files.len() != b_files.len() {
        let message = format!(
            "found {} {} inputs but {} {} inputs",
            a_files.len(),
            markers.marker(Branch::A),
            b_files.len(),
            markers.marker(Branch::B)
        );
        let mut files = a_files;
        files.extend(b_files);
        return Err(InputError::new(message).with_files(files));
    }

    Ok(a_files
        .into_iter()
        .zip(b_files)
        .map(|(a, b)| BranchPair::from_files(a, b, markers))
        .collect())
}

/// Discovers input pairs from the configured branch directories.
pub fn discover(config: &PipelineConfig) -> Result<DiscoveredPairs> {
    let a_dir = config
        .branches
        .a
        .input_dir
        .as_deref()
        .ok_or_else(|| ConfigError::missing_key("branches.a.input_dir"))?;
    let b_dir = config
        .branches
        .b
        .input_dir
        .as_deref()
        .ok_or_else(|| ConfigError::missing_key("branches.b.input_dir"))?;

    let a_files = find_inputs(a_dir, &config.input_suffix)?;
    let b_files = find_inputs(b_dir, &config.input_suffix)?;
    info!(
        a = a_files.len(),
        b = b_files.len(),
        suffix = %config.input_suffix,
        "Discovered inputs"
    );

    Ok(pair_inputs(a_files, b_files, &config.markers())?)
}

/// Rejects pairs whose outputs would overwrite each other.
///
/// # Errors
///
/// Returns an [`InputError`] naming the files that share a sample name
/// within a branch.
pub fn check_unique_samples(
    pairs: &[BranchPair],
    markers: &BranchMarkers,
) -> std::result::Result<(), InputError> {
    for branch in Branch::ALL {
        let mut seen: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for pair in pairs {
            let file = pair.file(branch);
            seen.entry(sample_name(file, markers.marker(branch)))
                .or_default()
                .push(file.to_path_buf());
        }

        if let Some((sample, files)) = seen.into_iter().find(|(_, files)| files.len() > 1) {
            return Err(InputError::new(format!(
                "{} inputs share the sample name '{sample}'; their outputs would collide",
                files.len()
            ))
            .with_files(files));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::TestProject;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn test_find_inputs_recursive_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::create_dir_all(dir.join("run2")).unwrap();
        fs::write(dir.join("run2/b.Human.sorted.bam"), b"x").unwrap();
        fs::write(dir.join("a.Human.sorted.bam"), b"x").unwrap();
        fs::write(dir.join("a.Human.bam"), b"x").unwrap();

        let files = find_inputs(dir, ".sorted.bam").unwrap();

        assert_eq!(
            files,
            vec![dir.join("a.Human.sorted.bam"), dir.join("run2/b.Human.sorted.bam")]
        );
    }

    #[test]
    fn test_find_inputs_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let err = find_inputs(&tmp.path().join("nope"), ".bam").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_discover_pairs_by_sorted_order() {
        let tmp = tempfile::tempdir().unwrap();
        let project = TestProject::new(tmp.path());
        project.write_pair("s2").unwrap();
        project.write_pair("s1").unwrap();

        let pairs: Vec<BranchPair> = discover(&project.config())
            .unwrap()
            .into_iter()
            .map(|p| p.unwrap())
            .collect();

        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].file(Branch::A).ends_with("s1.Human.sorted.bam"));
        assert!(pairs[0].file(Branch::B).ends_with("s1.Mouse.sorted.bam"));
        assert!(pairs[1].file(Branch::B).ends_with("s2.Mouse.sorted.bam"));
    }

    #[test]
    fn test_discover_unequal_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let project = TestProject::new(tmp.path());
        project.write_pair("s1").unwrap();
        project.write_input("s2", Branch::A).unwrap();

        let err = discover(&project.config()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(err.to_string().contains("2 Human inputs but 1 Mouse"));
    }

    #[test]
    fn test_discover_requires_input_dirs() {
        let config = crate::config::PipelineConfig::new("results");
        let err = discover(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_mislabeled_pair_kept_as_error() {
        let markers = BranchMarkers::default();
        let pairs = pair_inputs(
            vec!["x/s1.Human.bam".into(), "x/s2.Human.bam".into()],
            vec!["y/s1.Mouse.bam".into(), "y/s2.Rat.bam".into()],
            &markers,
        )
        .unwrap();

        assert!(pairs[0].is_ok());
        let err = pairs[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("s2.Rat.bam"));
    }

    #[test]
    fn test_duplicate_samples_rejected() {
        let markers = BranchMarkers::default();
        let pairs = vec![
            BranchPair::from_files("r1/s1.Human.bam", "r1/s1.Mouse.bam", &markers).unwrap(),
            BranchPair::from_files("r2/s1.Human.bam", "r2/s1.Mouse.bam", &markers).unwrap(),
        ];

        let err = check_unique_samples(&pairs, &markers).unwrap_err();
        assert!(err.message.contains("'s1'"));
        assert_eq!(err.files.len(), 2);
        check_unique_samples(&pairs[..1], &markers).unwrap();
    }
}
