//! End-to-end runs of the pipeline against the real `jpegtran`.
//!
//! Skipped (with a note on stderr) when no `jpegtran` with `-drop` support
//! is on the PATH.
//!
//! Run with: cargo test --test jpegtran_pipeline -- --nocapture

use image::{ImageBuffer, Rgb, RgbImage};
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};
use microscale::config::MicroscaleConfig;
use microscale::imaging::{
    ExiftoolBackend, JpegtranBackend, Quality, Sampling, StripStyle, crop_geometry, read_sampling,
};
use microscale::process::{Operations, Pipeline, Stage};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const CAPTURE_NAME: &str = "2555v1_vi_s_N4_25112210990_39_.jpg";

fn jpegtran_supports_drop() -> bool {
    // -help exits non-zero on some builds; only the switch list matters
    match Command::new("jpegtran").arg("-help").output() {
        Ok(out) => {
            let text = format!(
                "{}{}",
                String::from_utf8_lossy(&out.stdout),
                String::from_utf8_lossy(&out.stderr)
            );
            text.contains("-drop")
        }
        Err(_) => false,
    }
}

macro_rules! require_jpegtran {
    () => {
        if !jpegtran_supports_drop() {
            eprintln!("skipping: jpegtran with -drop support not found");
            return;
        }
    };
}

fn create_jpeg(path: &Path, width: u32, height: u32) {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    img.save(path).unwrap();
}

/// Camera-style capture with subsampled chroma.
fn create_sampled_jpeg(path: &Path, width: u32, height: u32, sampling: SamplingFactor) {
    let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 96])
    });
    let mut encoder = Encoder::new_file(path, 92).unwrap();
    encoder.set_sampling_factor(sampling);
    encoder
        .encode(img.as_raw(), width as u16, height as u16, ColorType::Rgb)
        .unwrap();
}

fn visible_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

fn run(dir: &Path, ops: Operations) -> microscale::process::ProcessedImage {
    let config = MicroscaleConfig::default();
    let style = StripStyle::without_font(Quality::new(90));
    let backend = JpegtranBackend::new();
    let metadata = ExiftoolBackend::new();
    let pipeline = Pipeline {
        backend: &backend,
        metadata: &metadata,
        config: &config,
        style: &style,
        ops,
    };
    pipeline.process_image(&dir.join(CAPTURE_NAME)).unwrap()
}

#[test]
fn scale_bar_extends_height_by_strip() {
    require_jpegtran!();
    let tmp = TempDir::new().unwrap();
    create_jpeg(&tmp.path().join(CAPTURE_NAME), 4656, 4000);

    let result = run(
        tmp.path(),
        Operations {
            copy_metadata: false,
            ..Operations::default()
        },
    );

    assert_eq!(result.stages, vec![Stage::Scaled]);
    assert_eq!(result.output, tmp.path().join(CAPTURE_NAME));
    assert_eq!(image::image_dimensions(&result.output).unwrap(), (4656, 4048));
    assert_eq!(visible_files(tmp.path()), vec![CAPTURE_NAME]);
}

#[test]
fn descale_then_scale_keeps_size() {
    require_jpegtran!();
    let tmp = TempDir::new().unwrap();
    create_jpeg(&tmp.path().join(CAPTURE_NAME), 2048, 1584);

    let result = run(
        tmp.path(),
        Operations {
            descale: true,
            copy_metadata: false,
            ..Operations::default()
        },
    );

    assert_eq!(result.stages, vec![Stage::Descaled, Stage::Scaled]);
    assert_eq!(image::image_dimensions(&result.output).unwrap(), (2048, 1584));
    assert_eq!(visible_files(tmp.path()), vec![CAPTURE_NAME]);
}

#[test]
fn crop_rotate_and_scale() {
    require_jpegtran!();
    let tmp = TempDir::new().unwrap();
    create_jpeg(&tmp.path().join(CAPTURE_NAME), 2416, 1536);
    let expected = crop_geometry(2416, 1536, MicroscaleConfig::default().geometry.target_ratio)
        .unwrap();

    let result = run(
        tmp.path(),
        Operations {
            crop: true,
            rotate: true,
            copy_metadata: false,
            ..Operations::default()
        },
    );

    assert_eq!(
        result.stages,
        vec![Stage::Cropped, Stage::Rotated, Stage::Scaled]
    );
    assert_eq!(
        image::image_dimensions(&result.output).unwrap(),
        (expected.width, expected.height + 48)
    );
    // Crop writes `..._39_#.jpg`, scaling replaces the `#` with `_`
    let output_name = "2555v1_vi_s_N4_25112210990_39__.jpg";
    assert_eq!(result.output, tmp.path().join(output_name));
    assert_eq!(visible_files(tmp.path()), vec![CAPTURE_NAME, output_name]);
}

#[test]
fn scale_bar_on_subsampled_captures() {
    require_jpegtran!();
    for (factor, sampling) in [
        (SamplingFactor::F_2_1, Sampling::Color { h: 2, v: 1 }),
        (SamplingFactor::F_2_2, Sampling::Color { h: 2, v: 2 }),
    ] {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join(CAPTURE_NAME);
        create_sampled_jpeg(&src, 1600, 1200, factor);

        let result = run(
            tmp.path(),
            Operations {
                copy_metadata: false,
                ..Operations::default()
            },
        );

        assert_eq!(image::image_dimensions(&result.output).unwrap(), (1600, 1248));
        assert_eq!(read_sampling(&result.output).unwrap(), sampling);
        assert_eq!(visible_files(tmp.path()), vec![CAPTURE_NAME]);
    }
}
