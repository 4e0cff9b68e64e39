//! Executor traits and shared types.
//!
//! The [`ImageBackend`] trait covers everything the pipeline asks of the
//! lossless transform executor: identify, crop, rotate and drop-in. The
//! [`MetadataBackend`] trait covers the metadata executor: copy tag groups
//! and embed a thumbnail.
//!
//! Production implementations shell out to `jpegtran`
//! ([`JpegtranBackend`](super::jpegtran::JpegtranBackend)) and `exiftool`
//! ([`ExiftoolBackend`](super::exiftool::ExiftoolBackend)). Both go through
//! [`run_tool`], which turns a non-zero exit into [`BackendError::Transform`]
//! carrying the tool's own diagnostic text.

use super::params::{CropParams, DropParams, RotateParams, TagCopyParams};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The external executor exited non-zero or could not be started.
    #[error("{tool} failed: {diagnostic}")]
    Transform { tool: String, diagnostic: String },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Lossless transform executor.
///
/// Implementations must be `Sync`: one backend is shared by every worker.
pub trait ImageBackend: Sync {
    /// Read pixel dimensions without decoding image data.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Crop (or enlarge) to `params.rect`.
    fn crop(&self, params: &CropParams) -> Result<(), BackendError>;

    /// Rotate 180°.
    fn rotate(&self, params: &RotateParams) -> Result<(), BackendError>;

    /// Overwrite a block region of the target with another image.
    fn drop_in(&self, params: &DropParams) -> Result<(), BackendError>;
}

/// Metadata executor.
pub trait MetadataBackend: Sync {
    /// Copy tag groups from one file into another, in place.
    fn copy_tags(&self, params: &TagCopyParams) -> Result<(), BackendError>;

    /// Replace the embedded EXIF thumbnail of `destination` with `thumbnail`.
    fn embed_thumbnail(&self, destination: &Path, thumbnail: &Path) -> Result<(), BackendError>;
}

/// Run an external tool to completion.
///
/// Spawn failures (tool not installed) and non-zero exits both become
/// [`BackendError::Transform`]; the diagnostic is the trimmed stderr, or the
/// exit status when the tool printed nothing.
pub(crate) fn run_tool<I, S>(program: &str, args: I) -> Result<(), BackendError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    debug!(
        "{} {}",
        program,
        args.iter()
            .map(|a| a.as_ref().to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let output = Command::new(program)
        .args(&args)
        .output()
        .map_err(|e| BackendError::Transform {
            tool: program.to_string(),
            diagnostic: format!("failed to run: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let diagnostic = match stderr.trim() {
            "" => output.status.to_string(),
            text => text.to_string(),
        };
        return Err(BackendError::Transform {
            tool: program.to_string(),
            diagnostic,
        });
    }
    Ok(())
}
