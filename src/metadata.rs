//! Metadata merging between an original capture and its transformed output.
//!
//! Lossless transforms keep pixel data intact, but the scale-bar stage
//! concatenates with `-copy none` and jpegtran never rewrites the embedded
//! EXIF thumbnail. So after the pixel work is done the final file gets:
//!
//! 1. **Tags**: every EXIF, IPTC and XMP tag of the original, except the
//!    thumbnail pointer pair (`ThumbnailOffset`, `ThumbnailLength`), which
//!    would point into the original's byte layout.
//! 2. **Thumbnail**: a fresh one rendered from the output's own pixels
//!    (fits a 256×256 box by default), so viewers show the cropped,
//!    scale-barred image instead of the camera's preview.
//!
//! Merging is best effort. A failure is logged and reported as
//! [`MetadataOutcome::Failed`]; the image itself is still a valid result.

use crate::config::ThumbnailConfig;
use crate::imaging::{BackendError, MetadataBackend, Quality, TagCopyParams, TagGroup, write_thumbnail};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Tags never copied from the original: they locate the old thumbnail.
pub const THUMBNAIL_TAGS: [&str; 2] = ["ThumbnailOffset", "ThumbnailLength"];

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("tag copy failed: {0}")]
    CopyTags(#[source] BackendError),
    #[error("thumbnail rebuild failed: {0}")]
    Thumbnail(#[source] BackendError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the metadata step ended for one file.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataOutcome {
    Merged,
    /// Non-fatal; carries the error text.
    Failed(String),
    /// Disabled, or nothing was written.
    Skipped,
}

/// Copy tags from `source` into `destination` and rebuild its thumbnail.
pub fn merge(
    backend: &impl MetadataBackend,
    source: &Path,
    destination: &Path,
    thumbnail: &ThumbnailConfig,
) -> Result<(), MetadataError> {
    backend
        .copy_tags(&TagCopyParams {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            groups: vec![TagGroup::Exif, TagGroup::Iptc, TagGroup::Xmp],
            exclude: THUMBNAIL_TAGS.to_vec(),
        })
        .map_err(MetadataError::CopyTags)?;
    rebuild_thumbnail(backend, destination, thumbnail)
}

/// Render a thumbnail from `destination`'s pixels and embed it.
pub fn rebuild_thumbnail(
    backend: &impl MetadataBackend,
    destination: &Path,
    thumbnail: &ThumbnailConfig,
) -> Result<(), MetadataError> {
    let thumb = tempfile::Builder::new()
        .prefix("microscale-thumb-")
        .suffix(".jpg")
        .tempfile()?
        .into_temp_path();
    write_thumbnail(
        destination,
        &thumb,
        thumbnail.max_edge,
        Quality::new(thumbnail.quality),
    )
    .map_err(MetadataError::Thumbnail)?;
    backend
        .embed_thumbnail(destination, &thumb)
        .map_err(MetadataError::Thumbnail)
}

/// [`merge`], downgrading failure to a warning.
pub fn merge_best_effort(
    backend: &impl MetadataBackend,
    source: &Path,
    destination: &Path,
    thumbnail: &ThumbnailConfig,
) -> MetadataOutcome {
    match merge(backend, source, destination, thumbnail) {
        Ok(()) => {
            info!(
                "metadata + thumbnail copied {} → {}",
                source.display(),
                destination.display()
            );
            MetadataOutcome::Merged
        }
        Err(e) => {
            warn!("failed to copy metadata to {}: {}", destination.display(), e);
            MetadataOutcome::Failed(e.to_string())
        }
    }
}
