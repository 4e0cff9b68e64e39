//! Image operations: lossless JPEG geometry plus the two small bitmaps this
//! crate renders itself.
//!
//! | Operation | Executor |
//! |---|---|
//! | **Identify** | `image::image_dimensions` (header only) |
//! | **Crop / descale / enlarge** | `jpegtran -crop` |
//! | **Rotate 180°** | `jpegtran -rotate 180` |
//! | **Concatenate** | `jpegtran -crop` (enlarge) + `jpegtran -drop` |
//! | **Scale-bar strip** | `imageproc` + `ab_glyph`, JPEG via `jpeg-encoder` at the capture's sampling |
//! | **Tag copy / thumbnail** | `exiftool` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for block-aligned geometry and scale bars (unit testable)
//! - **Parameters**: Data structures describing executor calls
//! - **Backend**: [`ImageBackend`] / [`MetadataBackend`] traits, [`JpegtranBackend`], [`ExiftoolBackend`]
//! - **Render**: the scale-bar strip and thumbnail bitmaps
//! - **Sampling**: chroma subsampling read from a JPEG frame header
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod exiftool;
pub mod jpegtran;
pub mod operations;
mod params;
pub mod render;
pub mod sampling;

pub use backend::{BackendError, Dimensions, ImageBackend, MetadataBackend};
pub use calculations::{
    BLOCK_SIZE, GeometryError, ScaleBar, calculate_scale_length, crop_geometry, descale_geometry,
    round_down_to_block,
};
pub use exiftool::ExiftoolBackend;
pub use jpegtran::JpegtranBackend;
pub use operations::{
    ImagingError, add_scale_bar, concatenate, crop, descale, enlarge, get_dimensions, rotate,
};
pub use params::{CopyMode, CropParams, DropParams, Quality, Rect, RotateParams, TagCopyParams, TagGroup};
pub use render::{StripStyle, write_thumbnail};
pub use sampling::{Sampling, read_sampling};
