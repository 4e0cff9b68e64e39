//! Input discovery.
//!
//! Command-line paths are either JPEG files or directories. Directories are
//! expanded to the JPEG files they contain (one level by default, the whole
//! tree with `--recursive`):
//!
//! ```text
//! captures/
//! ├── .microscale-a1b2.jpg    # hidden: skipped (staging leftovers, dotfiles)
//! ├── 2555v1_vi_s_N4_..._39_.jpg
//! ├── 2555v1_vi_s_N4_..._40_.JPG
//! ├── notes.txt               # not a JPEG: skipped
//! └── day2/                   # only with --recursive
//!     └── ...
//! ```
//!
//! Results are sorted per directory and de-duplicated, so a file named both
//! explicitly and through its directory is processed once.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("No such file or directory: {0}")]
    NotFound(PathBuf),
}

const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Whether `path` has a JPEG extension (case-insensitive).
pub fn is_jpeg(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    JPEG_EXTENSIONS.contains(&ext.as_str())
}

/// Expand command-line paths into the list of JPEG files to process.
///
/// Explicit files are taken as given (any extension; the executor reports
/// non-JPEG input). Directories contribute their visible JPEG files.
pub fn collect_inputs(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>, ScanError> {
    let mut seen = BTreeSet::new();
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            if seen.insert(path.clone()) {
                files.push(path.clone());
            }
            continue;
        }
        if !path.is_dir() {
            return Err(ScanError::NotFound(path.clone()));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(path)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));
        for entry in walker {
            let entry = entry?;
            let p = entry.path();
            if entry.file_type().is_file() && is_jpeg(p) && seen.insert(p.to_path_buf()) {
                files.push(p.to_path_buf());
            }
        }
    }

    Ok(files)
}
