//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides which lossless transforms to run) and the
//! [`backend`](super::backend) (which shells out to the executor). Keeping the
//! two apart lets tests swap in a recording mock without touching operation
//! logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Rect`]: Block-aligned crop rectangle, rendered in executor `WxH+L+T` syntax.
//! - [`CopyMode`]: Which metadata markers the executor carries into its output.
//! - [`CropParams`], [`RotateParams`], [`DropParams`]: one per lossless transform.
//! - [`TagCopyParams`]: metadata copy between two files, with exclusions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Quality as the `u8` the JPEG encoder expects.
    pub fn as_u8(self) -> u8 {
        self.0 as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// A crop rectangle in pixels. `left`/`top` are offsets from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub width: u32,
    pub height: u32,
    pub left: u32,
    pub top: u32,
}

impl Rect {
    /// Rectangle of the given size anchored at the top-left corner.
    pub fn anchored(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            left: 0,
            top: 0,
        }
    }
}

impl fmt::Display for Rect {
    /// Executor geometry syntax, e.g. `1160x1000+20+0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Which metadata markers a lossless transform copies from its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyMode {
    #[default]
    All,
    Exif,
    Iptc,
    None,
}

impl CopyMode {
    pub fn as_arg(self) -> &'static str {
        match self {
            CopyMode::All => "all",
            CopyMode::Exif => "exif",
            CopyMode::Iptc => "iptc",
            CopyMode::None => "none",
        }
    }
}

/// Lossless crop. A rectangle larger than the source enlarges the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub rect: Rect,
    pub copy: CopyMode,
    /// Fail instead of trimming partial edge blocks.
    pub perfect: bool,
}

/// Lossless 180° rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct RotateParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub copy: CopyMode,
}

/// Lossless drop-in: replace the block region of `target` at (`left`, `top`)
/// with the pixel data of `insert`.
#[derive(Debug, Clone, PartialEq)]
pub struct DropParams {
    pub target: PathBuf,
    pub insert: PathBuf,
    pub output: PathBuf,
    pub left: u32,
    pub top: u32,
    pub copy: CopyMode,
}

/// Metadata tag families the merger copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagGroup {
    Exif,
    Iptc,
    Xmp,
}

impl TagGroup {
    pub fn as_arg(self) -> &'static str {
        match self {
            TagGroup::Exif => "EXIF",
            TagGroup::Iptc => "IPTC",
            TagGroup::Xmp => "XMP",
        }
    }
}

/// Copy tag groups from `source` into `destination`, skipping `exclude`.
#[derive(Debug, Clone, PartialEq)]
pub struct TagCopyParams {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub groups: Vec<TagGroup>,
    pub exclude: Vec<&'static str>,
}
