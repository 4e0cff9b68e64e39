//! Production metadata executor backed by `exiftool`.
//!
//! Tag copy: `exiftool -m -overwrite_original -TagsFromFile SRC -EXIF:all
//! -IPTC:all -XMP:all --TAG... DST`. Excluded tags use exiftool's `--TAG`
//! syntax. Thumbnail: `exiftool -m -overwrite_original -ThumbnailImage<=THUMB DST`.

use super::backend::{BackendError, MetadataBackend, run_tool};
use super::params::TagCopyParams;
use std::ffi::OsString;
use std::path::Path;

pub struct ExiftoolBackend {
    program: String,
}

impl ExiftoolBackend {
    pub fn new() -> Self {
        Self::with_program("exiftool")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ExiftoolBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_tags_args(params: &TagCopyParams) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-m".into(),
        "-overwrite_original".into(),
        "-TagsFromFile".into(),
        params.source.clone().into(),
    ];
    args.extend(
        params
            .groups
            .iter()
            .map(|g| OsString::from(format!("-{}:all", g.as_arg()))),
    );
    args.extend(
        params
            .exclude
            .iter()
            .map(|tag| OsString::from(format!("--{tag}"))),
    );
    args.push(params.destination.clone().into());
    args
}

fn thumbnail_args(destination: &Path, thumbnail: &Path) -> Vec<OsString> {
    let mut assign = OsString::from("-ThumbnailImage<=");
    assign.push(thumbnail);
    vec![
        "-m".into(),
        "-overwrite_original".into(),
        assign,
        destination.into(),
    ]
}

impl MetadataBackend for ExiftoolBackend {
    fn copy_tags(&self, params: &TagCopyParams) -> Result<(), BackendError> {
        run_tool(&self.program, copy_tags_args(params))
    }

    fn embed_thumbnail(&self, destination: &Path, thumbnail: &Path) -> Result<(), BackendError> {
        run_tool(&self.program, thumbnail_args(destination, thumbnail))
    }
}
