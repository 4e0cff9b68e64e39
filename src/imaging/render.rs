//! In-process pixel work on files this crate owns: the scale-bar strip and
//! the rebuilt EXIF thumbnail.
//!
//! The main image is never decoded for re-encoding here. The strip is a new
//! bitmap, and the thumbnail is a small derived copy.
//!
//! The strip is encoded with `jpeg-encoder` so its chroma sampling can match
//! the capture it is dropped into; `image`'s encoder has no sampling option.

use super::backend::BackendError;
use super::calculations::ScaleBar;
use super::params::Quality;
use super::sampling::Sampling;
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, ImageReader, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect as PixelRect;
use jpeg_encoder::{ColorType, Encoder, EncodingError, SamplingFactor};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Bar ends this far from the right edge.
const BAR_RIGHT_MARGIN: u32 = 350;
/// Scale label starts this far from the right edge.
const LABEL_RIGHT_MARGIN: u32 = 300;
const CAPTION_LEFT_MARGIN: i32 = 10;
const BAR_THICKNESS: u32 = 6;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Fonts tried, in order, when no font is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Appearance of the scale-bar strip.
pub struct StripStyle {
    /// `None` draws the bar without text labels.
    pub font: Option<FontVec>,
    pub font_size: f32,
    pub quality: Quality,
}

impl StripStyle {
    /// Load the configured font, falling back to well-known system fonts.
    ///
    /// A missing font is not an error: the bar is still drawn, only the
    /// labels are skipped.
    pub fn load(font: Option<&Path>, font_size: f32, quality: Quality) -> Self {
        let candidates: Vec<PathBuf> = match font {
            Some(path) => vec![path.to_path_buf()],
            None => SYSTEM_FONTS.iter().map(PathBuf::from).collect(),
        };

        let font = candidates.iter().find_map(|path| {
            let data = std::fs::read(path).ok()?;
            match FontVec::try_from_vec(data) {
                Ok(font) => {
                    debug!("scale-bar font: {}", path.display());
                    Some(font)
                }
                Err(_) => {
                    warn!("not a usable TTF/OTF font: {}", path.display());
                    None
                }
            }
        });
        if font.is_none() {
            warn!("no scale-bar font found; labels will be omitted");
        }

        Self {
            font,
            font_size,
            quality,
        }
    }

    /// Style without labels (tests, headless machines).
    pub fn without_font(quality: Quality) -> Self {
        Self {
            font: None,
            font_size: 40.0,
            quality,
        }
    }
}

/// Line height at the style's font size, 0 without a font.
fn text_height(font: &FontVec, scale: PxScale) -> i32 {
    let scaled = font.as_scaled(scale);
    (scaled.ascent() - scaled.descent()).ceil() as i32
}

/// Draw the scale-bar strip: black background, white bar right-aligned,
/// physical label to its right and `caption` (the file stem) on the left.
pub fn draw_scale_strip(
    width: u32,
    height: u32,
    bar: &ScaleBar,
    caption: &str,
    style: &StripStyle,
) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, BLACK);

    let bar_end = width.saturating_sub(BAR_RIGHT_MARGIN);
    let bar_start = bar_end.saturating_sub(bar.length_px);
    let bar_len = bar_end - bar_start;
    let bar_top = (height / 2).saturating_sub(BAR_THICKNESS / 2);
    if bar_len > 0 && height > 0 {
        draw_filled_rect_mut(
            &mut img,
            PixelRect::at(bar_start as i32, bar_top as i32)
                .of_size(bar_len, BAR_THICKNESS.min(height)),
            WHITE,
        );
    }

    if let Some(font) = &style.font {
        let scale = PxScale::from(style.font_size);
        let y = ((height as i32 - text_height(font, scale)) / 2).max(0);
        draw_text_mut(&mut img, WHITE, CAPTION_LEFT_MARGIN, y, scale, font, caption);
        let label_x = width.saturating_sub(LABEL_RIGHT_MARGIN) as i32;
        draw_text_mut(&mut img, WHITE, label_x, y, scale, font, &bar.label);
    }

    img
}

/// Encode an RGB bitmap as baseline JPEG.
pub fn save_jpeg(img: &RgbImage, path: &Path, quality: Quality) -> Result<(), BackendError> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(writer, quality.as_u8())
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
}

fn encode_error(path: &Path, e: EncodingError) -> BackendError {
    BackendError::ProcessingFailed(format!("JPEG encode of {} failed: {}", path.display(), e))
}

/// Encode `img` with the component count and sampling factors of `sampling`.
pub fn save_jpeg_sampled(
    img: &RgbImage,
    path: &Path,
    quality: Quality,
    sampling: Sampling,
) -> Result<(), BackendError> {
    let (width, height) = match (u16::try_from(img.width()), u16::try_from(img.height())) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(BackendError::ProcessingFailed(format!(
                "{}x{} exceeds the JPEG size limit",
                img.width(),
                img.height()
            )));
        }
    };
    let mut encoder =
        Encoder::new_file(path, quality.as_u8()).map_err(|e| encode_error(path, e))?;

    let result = match sampling {
        Sampling::Gray => {
            let gray = image::imageops::grayscale(img);
            encoder.encode(gray.as_raw(), width, height, ColorType::Luma)
        }
        Sampling::Color { .. } => {
            let factor = sampling.factor().unwrap_or_else(|| {
                warn!(
                    "sampling {} not supported for the strip, using {}",
                    sampling,
                    Sampling::FALLBACK
                );
                SamplingFactor::F_2_1
            });
            encoder.set_sampling_factor(factor);
            encoder.encode(img.as_raw(), width, height, ColorType::Rgb)
        }
    };
    result.map_err(|e| encode_error(path, e))
}

/// Render the strip for an image of `width` and write it to `output`,
/// sampled like the image it will be joined to.
pub fn write_scale_strip(
    output: &Path,
    width: u32,
    height: u32,
    bar: &ScaleBar,
    caption: &str,
    style: &StripStyle,
    sampling: Sampling,
) -> Result<(), BackendError> {
    let strip = draw_scale_strip(width, height, bar, caption, style);
    save_jpeg_sampled(&strip, output, style.quality, sampling)
}

/// Decode `source`, shrink it to fit a `max_edge` square (aspect preserved,
/// Lanczos3), and write it as JPEG to `output`. Smaller images are written
/// at their own size.
pub fn write_thumbnail(
    source: &Path,
    output: &Path,
    max_edge: u32,
    quality: Quality,
) -> Result<(), BackendError> {
    let img = ImageReader::open(source)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", source.display(), e))
        })?;
    let thumb = if img.width() <= max_edge && img.height() <= max_edge {
        img.to_rgb8()
    } else {
        img.resize(max_edge, max_edge, FilterType::Lanczos3).to_rgb8()
    };
    save_jpeg(&thumb, output, quality)
}
