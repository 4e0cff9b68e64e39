//! Shared test utilities for the microscale test suite.
//!
//! Provides synthetic JPEG fixtures (including ones with a chosen chroma
//! sampling) and timestamp helpers.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = tmp.path().join(CAPTURE_NAME);
//! create_test_jpeg(&path, 64, 48);
//! set_times(&path, OLD_TIME);
//! ```

use image::{ImageBuffer, Rgb, RgbImage};
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};
use std::fs::{File, FileTimes};
use std::path::Path;
use std::time::{Duration, SystemTime};

/// A capture name with lens `N4` in field 3.
pub const CAPTURE_NAME: &str = "2555v1_vi_s_N4_25112210990_39_.jpg";

/// A fixed, clearly-in-the-past timestamp (2023-11-14T22:13:20Z).
pub const OLD_TIME: Duration = Duration::from_secs(1_700_000_000);

/// Write a gradient JPEG of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    img.save(path).unwrap();
}

/// Write a gradient JPEG with the given chroma sampling.
pub fn create_sampled_jpeg(path: &Path, width: u32, height: u32, sampling: SamplingFactor) {
    let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    });
    let mut encoder = Encoder::new_file(path, 90).unwrap();
    encoder.set_sampling_factor(sampling);
    encoder
        .encode(img.as_raw(), width as u16, height as u16, ColorType::Rgb)
        .unwrap();
}

/// Write placeholder bytes; for mock-backend tests that never decode.
pub fn write_dummy(path: &Path) {
    std::fs::write(path, b"fake jpeg").unwrap();
}

/// Set both access and modification time to `since_epoch`.
pub fn set_times(path: &Path, since_epoch: Duration) {
    set_file_times(path, since_epoch, since_epoch);
}

/// Set access and modification time separately.
pub fn set_file_times(path: &Path, accessed: Duration, modified: Duration) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_times(
            FileTimes::new()
                .set_accessed(SystemTime::UNIX_EPOCH + accessed)
                .set_modified(SystemTime::UNIX_EPOCH + modified),
        )
        .unwrap();
}

/// Access time as a duration since the epoch.
pub fn accessed(path: &Path) -> Duration {
    std::fs::metadata(path)
        .unwrap()
        .accessed()
        .unwrap()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
}

/// Modification time as a duration since the epoch.
pub fn modified(path: &Path) -> Duration {
    std::fs::metadata(path)
        .unwrap()
        .modified()
        .unwrap()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
}

/// Sorted file names in `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

