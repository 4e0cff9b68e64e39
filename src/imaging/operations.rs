//! High-level image operations.
//!
//! These functions combine calculations with backend execution: read the
//! current dimensions, compute block-aligned geometry, hand the transform to
//! the executor. Nothing here decodes the main image.
//!
//! ## Lossless vertical concatenation
//!
//! JPEG has no lossless "append rows" transform, so [`concatenate`] builds one
//! from two primitives:
//!
//! ```text
//! 1. copy top → work                         (work: w × h1)
//! 2. crop work to w × (h1+h2) at +0+0        (canvas grows, new rows are filler)
//! 3. drop bottom into work at +0+h1          (filler rows replaced block-for-block)
//! 4. rename work → output                    (atomic; output never sees partial data)
//! ```
//!
//! The top `h1` rows stay bit-identical to the source and the bottom `h2`
//! rows are bit-identical to the inserted image.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{GeometryError, ScaleBar, crop_geometry, descale_geometry};
use super::params::{CopyMode, CropParams, DropParams, Rect, RotateParams};
use super::render::{StripStyle, write_scale_strip};
use super::sampling::read_sampling;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("image widths do not match: {top} vs {bottom}")]
    WidthMismatch { top: u32, bottom: u32 },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<std::io::Error> for ImagingError {
    fn from(e: std::io::Error) -> Self {
        ImagingError::Backend(BackendError::Io(e))
    }
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Display name for log lines.
fn name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Crop a too-wide image to `target_ratio`, trimming left and right equally.
pub fn crop(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    target_ratio: f64,
) -> Result<Rect> {
    let (w, h) = get_dimensions(backend, source)?;
    let rect = crop_geometry(w, h, target_ratio)?;
    debug!("{}: crop {}x{} → {}", name(source), w, h, rect);
    backend.crop(&CropParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        rect,
        copy: CopyMode::All,
        perfect: false,
    })?;
    info!("{}: crop done → {}", name(source), name(output));
    Ok(rect)
}

/// Remove a `strip_height` band (typically a burned-in scale bar) from the bottom.
pub fn descale(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    strip_height: u32,
) -> Result<Rect> {
    let (w, h) = get_dimensions(backend, source)?;
    let rect = descale_geometry(w, h, strip_height)?;
    debug!("{}: descale {}x{} → {}", name(source), w, h, rect);
    backend.crop(&CropParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        rect,
        copy: CopyMode::All,
        perfect: false,
    })?;
    info!("{}: descale done → {}", name(source), name(output));
    Ok(rect)
}

/// Rotate 180° in place.
pub fn rotate(backend: &impl ImageBackend, path: &Path) -> Result<()> {
    backend.rotate(&RotateParams {
        source: path.to_path_buf(),
        output: path.to_path_buf(),
        copy: CopyMode::All,
    })?;
    info!("{}: rotation done", name(path));
    Ok(())
}

/// Grow the canvas of `path` in place to `new_size`, top-left aligned.
///
/// No executor call when the size is unchanged.
pub fn enlarge(
    backend: &impl ImageBackend,
    path: &Path,
    size: Dimensions,
    new_size: Dimensions,
    copy: CopyMode,
) -> Result<()> {
    if size == new_size {
        debug!("{}: no enlargement needed", name(path));
        return Ok(());
    }
    backend.crop(&CropParams {
        source: path.to_path_buf(),
        output: path.to_path_buf(),
        rect: Rect::anchored(new_size.width, new_size.height),
        copy,
        perfect: true,
    })?;
    Ok(())
}

/// Losslessly stack `bottom` under `top`, writing the result to `output`.
///
/// The work file lives next to `output` and is renamed onto it only after
/// both executor steps succeed; on failure it is removed and `output` is
/// left untouched.
pub fn concatenate(
    backend: &impl ImageBackend,
    top: &Path,
    bottom: &Path,
    output: &Path,
    copy: CopyMode,
) -> Result<()> {
    info!(
        "concatenating {} + {} (copy={})",
        name(top),
        name(bottom),
        copy.as_arg()
    );
    let upper = backend.identify(top)?;
    let lower = backend.identify(bottom)?;
    if upper.width != lower.width {
        return Err(ImagingError::WidthMismatch {
            top: upper.width,
            bottom: lower.width,
        });
    }

    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let work = tempfile::Builder::new()
        .prefix(".microscale-")
        .suffix(".jpg")
        .tempfile_in(dir)?
        .into_temp_path();
    std::fs::copy(top, &work)?;

    let merged = Dimensions {
        width: upper.width,
        height: upper.height + lower.height,
    };
    enlarge(backend, &work, upper, merged, copy)?;
    backend.drop_in(&DropParams {
        target: work.to_path_buf(),
        insert: bottom.to_path_buf(),
        output: work.to_path_buf(),
        left: 0,
        top: upper.height,
        copy,
    })?;

    work.persist(output).map_err(|e| e.error)?;
    info!("concatenation done: {}", name(output));
    Ok(())
}

/// Append a rendered scale-bar strip below `source`, writing `output`.
///
/// The strip is rendered into a temporary JPEG, encoded with the chroma
/// sampling of `source` so `jpegtran -drop` accepts it, and removed whether
/// or not the merge succeeds.
pub fn add_scale_bar(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    strip_height: u32,
    bar: &ScaleBar,
    caption: &str,
    style: &StripStyle,
) -> Result<()> {
    let (width, _) = get_dimensions(backend, source)?;
    let sampling = read_sampling(source)?;
    let strip = tempfile::Builder::new()
        .prefix("microscale-strip-")
        .suffix(".jpg")
        .tempfile()?
        .into_temp_path();

    write_scale_strip(&strip, width, strip_height, bar, caption, style, sampling)?;
    debug!(
        "{}: strip {}x{} ({}) with {} ({}px)",
        name(source),
        width,
        strip_height,
        sampling,
        bar.label,
        bar.length_px
    );

    concatenate(backend, source, &strip, output, CopyMode::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::params::Quality;
    use crate::test_helpers::{create_sampled_jpeg, create_test_jpeg, write_dummy};
    use jpeg_encoder::SamplingFactor;
    use tempfile::TempDir;

    fn bar() -> ScaleBar {
        ScaleBar {
            length_px: 669,
            label: "200 µm".to_string(),
        }
    }

    #[test]
    fn get_dimensions_calls_backend() {
        let backend = MockBackend::new().with_image("/test.jpg", 1920, 1080);
        assert_eq!(get_dimensions(&backend, Path::new("/test.jpg")).unwrap(), (1920, 1080));
    }

    #[test]
    fn crop_passes_centered_rect() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.jpg");
        write_dummy(&src);
        let backend = MockBackend::new().with_image(&src, 2000, 1000);

        let rect = crop(&backend, &src, &tmp.path().join("a#.jpg"), 1.164).unwrap();
        assert_eq!(rect.left, 420);

        let ops = backend.get_operations();
        assert!(matches!(
            &ops[1],
            RecordedOp::Crop { rect, copy: CopyMode::All, perfect: false, .. } if rect.width == 1160
        ));
    }

    #[test]
    fn crop_narrow_image_never_calls_executor() {
        let backend = MockBackend::new().with_image("/a.jpg", 1000, 1000);
        let err = crop(&backend, Path::new("/a.jpg"), Path::new("/a#.jpg"), 1.164).unwrap_err();
        assert!(matches!(err, ImagingError::Geometry(GeometryError::Ratio { .. })));
        assert_eq!(backend.get_operations().len(), 1);
    }

    #[test]
    fn descale_too_short_is_range_error() {
        let backend = MockBackend::new().with_image("/a.jpg", 1000, 40);
        let err = descale(&backend, Path::new("/a.jpg"), Path::new("/a#.jpg"), 48).unwrap_err();
        assert!(matches!(err, ImagingError::Geometry(GeometryError::Range { .. })));
    }

    #[test]
    fn rotate_is_in_place() {
        let backend = MockBackend::new().with_image("/a.jpg", 10, 10);
        rotate(&backend, Path::new("/a.jpg")).unwrap();
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Rotate {
                source: "/a.jpg".into(),
                output: "/a.jpg".into()
            }]
        );
    }

    #[test]
    fn enlarge_skips_when_size_unchanged() {
        let backend = MockBackend::new();
        let size = Dimensions { width: 100, height: 50 };
        enlarge(&backend, Path::new("/a.jpg"), size, size, CopyMode::All).unwrap();
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn enlarge_calls_perfect_crop() {
        let backend = MockBackend::new();
        enlarge(
            &backend,
            Path::new("/a.jpg"),
            Dimensions { width: 80, height: 40 },
            Dimensions { width: 80, height: 80 },
            CopyMode::All,
        )
        .unwrap();
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Crop { rect, perfect: true, .. } if *rect == Rect::anchored(80, 80)
        ));
    }

    #[test]
    fn concatenate_enlarges_then_drops_at_top_height() {
        let tmp = TempDir::new().unwrap();
        let top = tmp.path().join("top.jpg");
        let bottom = tmp.path().join("bottom.jpg");
        let out = tmp.path().join("out.jpg");
        write_dummy(&top);
        write_dummy(&bottom);
        let backend = MockBackend::new()
            .with_image(&top, 100, 56)
            .with_image(&bottom, 100, 72);

        concatenate(&backend, &top, &bottom, &out, CopyMode::None).unwrap();
        assert!(out.exists());

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 4);
        let RecordedOp::Crop { rect, source, output, .. } = &ops[2] else {
            panic!("expected enlarge crop, got {:?}", ops[2]);
        };
        assert_eq!(*rect, Rect::anchored(100, 128));
        assert_eq!(source, output);
        assert!(matches!(
            &ops[3],
            RecordedOp::DropIn { left: 0, top: 56, copy: CopyMode::None, .. }
        ));

        // Only the inputs and the output remain: the work file was renamed.
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 3);
    }

    #[test]
    fn concatenate_rejects_width_mismatch() {
        let backend = MockBackend::new()
            .with_image("/top.jpg", 100, 50)
            .with_image("/bottom.jpg", 120, 50);
        let err = concatenate(
            &backend,
            Path::new("/top.jpg"),
            Path::new("/bottom.jpg"),
            Path::new("/out.jpg"),
            CopyMode::All,
        )
        .unwrap_err();
        assert!(matches!(err, ImagingError::WidthMismatch { top: 100, bottom: 120 }));
    }

    #[test]
    fn concatenate_failure_leaves_no_output() {
        let tmp = TempDir::new().unwrap();
        let top = tmp.path().join("top.jpg");
        let bottom = tmp.path().join("bottom.jpg");
        let out = tmp.path().join("out.jpg");
        write_dummy(&top);
        write_dummy(&bottom);
        let backend = MockBackend::failing("mismatching sampling ratio 1:1, 1:2")
            .with_image(&top, 100, 56)
            .with_image(&bottom, 100, 48);

        let err = concatenate(&backend, &top, &bottom, &out, CopyMode::None).unwrap_err();
        assert!(err.to_string().contains("mismatching sampling ratio"));
        assert!(!out.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 2);
    }

    #[test]
    fn add_scale_bar_renders_strip_of_image_width() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("2555v1_vi_s_N4_25112210990_39_.jpg");
        let out = tmp.path().join("out.jpg");
        create_test_jpeg(&src, 64, 32);
        let backend = MockBackend::new().with_image(&src, 4656, 4000);
        let style = StripStyle::without_font(Quality::new(90));

        add_scale_bar(&backend, &src, &out, 48, &bar(), "stem", &style).unwrap();

        let ops = backend.get_operations();
        // identify(source) for width, then concatenate: identify ×2, enlarge, drop.
        let RecordedOp::Identify(strip) = &ops[2] else {
            panic!("expected strip identify, got {:?}", ops[2]);
        };
        assert!(strip.ends_with(".jpg"));
        assert!(matches!(
            &ops[3],
            RecordedOp::Crop { rect, copy: CopyMode::None, .. } if *rect == Rect::anchored(4656, 4048)
        ));
        assert!(matches!(&ops[4], RecordedOp::DropIn { top: 4000, .. }));
        assert!(!Path::new(strip).exists(), "strip temp file must be removed");
        assert!(out.exists());
    }

    #[test]
    fn add_scale_bar_removes_strip_on_failure() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("x_y_z_n4_.jpg");
        let out = tmp.path().join("out.jpg");
        create_test_jpeg(&src, 64, 32);
        let backend = MockBackend::failing("boom").with_image(&src, 800, 600);
        let style = StripStyle::without_font(Quality::new(90));

        let err = add_scale_bar(&backend, &src, &out, 48, &bar(), "stem", &style).unwrap_err();
        assert!(matches!(err, ImagingError::Backend(BackendError::Transform { .. })));
        assert!(!out.exists());

        let RecordedOp::Identify(strip) = &backend.get_operations()[2] else {
            panic!("expected strip identify");
        };
        assert!(!Path::new(strip).exists());
    }

    #[test]
    fn add_scale_bar_follows_source_sampling() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("x_y_z_n4_.jpg");
        let out = tmp.path().join("out.jpg");
        create_sampled_jpeg(&src, 64, 32, SamplingFactor::F_2_2);
        let backend = MockBackend::new().with_image(&src, 1600, 1200);
        let style = StripStyle::without_font(Quality::new(90));

        add_scale_bar(&backend, &src, &out, 48, &bar(), "stem", &style).unwrap();
        assert!(out.exists());
    }

    #[test]
    fn concatenate_rejects_mismatched_sampling() {
        let tmp = TempDir::new().unwrap();
        let top = tmp.path().join("top.jpg");
        let bottom = tmp.path().join("bottom.jpg");
        let out = tmp.path().join("out.jpg");
        create_sampled_jpeg(&top, 64, 32, SamplingFactor::F_2_1);
        create_sampled_jpeg(&bottom, 64, 16, SamplingFactor::F_1_1);
        let backend = MockBackend::new()
            .with_image(&top, 64, 32)
            .with_image(&bottom, 64, 16);

        let err = concatenate(&backend, &top, &bottom, &out, CopyMode::None).unwrap_err();
        assert!(err.to_string().contains("mismatching sampling ratio 2x1, 1x1"));
        assert!(!out.exists());
    }
}
