//! Filesystem helpers shared by the runner and the pipeline.

mod fs;

pub use fs::{all_exist_nonempty, ensure_dir, exists_nonempty, move_file, remove_dir_if_empty};
