//! # Microscale
//!
//! Batch tool for microscope JPEG captures. It crops them to a target aspect
//! ratio, strips old scale-bar strips, rotates 180°, and appends a new scale
//! bar sized for the lens encoded in each file name. The image data is never
//! re-encoded: every pixel transform runs through `jpegtran`, and the scale
//! bar is a separately rendered strip joined on at an MCU boundary.
//!
//! # Architecture: Staged Per-File Pipeline
//!
//! Each file passes through up to four stages, always in this order:
//!
//! ```text
//! descale   abc_.jpg → abc#.jpg   drop the bottom strip
//! crop      abc.jpg  → abc#.jpg   centred crop to width/height ratio
//! rotate    in place              180°
//! scale     abc#.jpg → abc_.jpg   render strip, enlarge canvas, drop strip in
//! ```
//!
//! A stage whose output name equals the name of the file it reads writes to a
//! hidden staging file next to it. The original stays untouched until the
//! last stage has succeeded and its metadata has been merged; only then is the
//! staging file renamed over it. Intermediates are deleted as soon as the next
//! stage has read them, so a successful run leaves one output per input.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Expands command-line paths into the JPEG files to process |
//! | [`naming`] | Lens-code extraction and the `_`/`#` suffix convention |
//! | [`imaging`] | Geometry math, the `jpegtran`/`exiftool` backends, strip rendering, lossless operations |
//! | [`metadata`] | EXIF/IPTC/XMP merge from the original plus thumbnail rebuild |
//! | [`process`] | Per-file stage executor and the parallel batch runner |
//! | [`config`] | `microscale.toml` loading, stock defaults, lens table, validation |
//! | [`output`] | CLI output formatting for progress events and dry runs |
//!
//! # Design Decisions
//!
//! ## External Tools for Lossless Work
//!
//! Decoding and re-encoding a capture costs quality every time it is touched.
//! `jpegtran` crops, rotates and pastes at the DCT-coefficient level, so an
//! image can go through descale → scale any number of times without loss.
//! The strip is the only thing the crate encodes itself.
//!
//! ## Backend Traits
//!
//! Both tools sit behind traits ([`imaging::ImageBackend`],
//! [`imaging::MetadataBackend`]). The pipeline is tested against recording
//! mocks that never spawn a process; a separate integration test runs the
//! real `jpegtran` when it is installed.
//!
//! ## Metadata Is Best-Effort
//!
//! A failed metadata merge is reported on the image's result line but does
//! not fail the image: the pixels are already correct, and the original tags
//! can be copied again later.

pub mod config;
pub mod imaging;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod process;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
