//! Pure calculation functions for lossless transform geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Every coordinate handed to the executor must be a multiple of
//! [`BLOCK_SIZE`]: lossless JPEG transforms operate on whole 8×8 blocks.

use super::params::Rect;
use thiserror::Error;

/// JPEG block edge. Crop offsets and sizes are rounded down to this.
pub const BLOCK_SIZE: u32 = 8;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Crop requested on an image that is not wider than the target ratio.
    #[error("cannot crop: image ratio {ratio:.3} does not exceed target {target}")]
    Ratio { ratio: f64, target: f64 },
    /// Descale strip leaves no whole block row.
    #[error("cannot descale: removing {strip}px from a {height}px image leaves nothing")]
    Range { height: u32, strip: u32 },
}

/// Round `x` down to the nearest multiple of [`BLOCK_SIZE`].
///
/// ```
/// # use microscale::imaging::round_down_to_block;
/// assert_eq!(round_down_to_block(1163), 1160);
/// assert_eq!(round_down_to_block(1160), 1160);
/// assert_eq!(round_down_to_block(7), 0);
/// ```
pub fn round_down_to_block(x: u32) -> u32 {
    x - (x % BLOCK_SIZE)
}

/// Rectangle that trims a too-wide image down to `target_ratio` (width / height).
///
/// The crop is horizontally centered and keeps the full (block-rounded) height.
/// Fails with [`GeometryError::Ratio`] when `width / height <= target_ratio`.
pub fn crop_geometry(width: u32, height: u32, target_ratio: f64) -> Result<Rect, GeometryError> {
    if height == 0 {
        return Err(GeometryError::Ratio {
            ratio: f64::NAN,
            target: target_ratio,
        });
    }
    let ratio = width as f64 / height as f64;
    if ratio <= target_ratio {
        return Err(GeometryError::Ratio {
            ratio,
            target: target_ratio,
        });
    }

    let new_w = (height as f64 * target_ratio).floor() as u32;
    let crop_w = round_down_to_block(new_w);
    let crop_h = round_down_to_block(height);
    Ok(Rect {
        width: crop_w,
        height: crop_h,
        left: (width - crop_w) / 2,
        top: 0,
    })
}

/// Rectangle that removes a `strip`-pixel band from the bottom of the image.
///
/// Full width, top-anchored, height rounded down to the block size.
pub fn descale_geometry(width: u32, height: u32, strip: u32) -> Result<Rect, GeometryError> {
    let crop_h = round_down_to_block(height.saturating_sub(strip));
    if crop_h == 0 {
        return Err(GeometryError::Range { height, strip });
    }
    Ok(Rect::anchored(width, crop_h))
}

/// Length and label of the scale bar drawn under an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleBar {
    /// Bar length in image pixels.
    pub length_px: u32,
    /// Human-readable physical length, e.g. `"200 µm"` or `"1 mm"`.
    pub label: String,
}

/// Round to the nearest multiple of `step`, ties to even: `250` → `200`,
/// `350` → `400`.
fn round_to(value: f64, step: f64) -> f64 {
    (value / step).round_ties_even() * step
}

/// Pick a "nice" scale bar roughly a sixth of the image width.
///
/// Only a few lengths are ever produced: whole hundreds of micrometres up to
/// 300 µm, exactly 500 µm for the middle band, and whole millimetres above
/// 750 µm. This avoids labels like "437 µm".
///
/// # Arguments
/// * `width_px` - Image width in pixels
/// * `pixels_per_mm` - Lens pixel density
///
/// ```
/// # use microscale::imaging::calculate_scale_length;
/// assert_eq!(calculate_scale_length(4656, 3345.0).label, "200 µm");
/// ```
pub fn calculate_scale_length(width_px: u32, pixels_per_mm: f64) -> ScaleBar {
    let width_um = width_px as f64 / pixels_per_mm * 1000.0;
    let mut scale_um = round_to(width_um / 6.0, 100.0);

    let label = if scale_um > 750.0 {
        scale_um = round_to(scale_um, 1000.0);
        format!("{:.0} mm", scale_um / 1000.0)
    } else if scale_um > 350.0 {
        scale_um = 500.0;
        "500 \u{b5}m".to_string()
    } else {
        format!("{:.0} \u{b5}m", scale_um)
    };

    ScaleBar {
        length_px: (scale_um / 1000.0 * pixels_per_mm).floor() as u32,
        label,
    }
}
