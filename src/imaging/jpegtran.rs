//! Production lossless executor: `jpegtran` for transforms, the `image`
//! crate for header-only dimension reads.
//!
//! ## Command mapping
//!
//! | Operation | Invocation |
//! |---|---|
//! | Identify | `image::image_dimensions` (reads the SOF header, no decode) |
//! | Crop / enlarge | `jpegtran -copy M [-perfect] -crop WxH+L+T -outfile OUT IN` |
//! | Rotate | `jpegtran -copy M -rotate 180 -outfile OUT IN` |
//! | Drop-in | `jpegtran -copy M -perfect -drop +L+T INSERT -outfile OUT TARGET` |
//!
//! `jpegtran` reads its whole input before opening the output, so `OUT` may
//! equal `IN` for in-place transforms.

use super::backend::{BackendError, Dimensions, ImageBackend, run_tool};
use super::params::{CropParams, DropParams, RotateParams};
use std::ffi::OsString;
use std::path::Path;

/// `jpegtran`-backed executor.
pub struct JpegtranBackend {
    program: String,
}

impl JpegtranBackend {
    pub fn new() -> Self {
        Self::with_program("jpegtran")
    }

    /// Use a specific binary (e.g. an absolute path from config).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: Vec<OsString>) -> Result<(), BackendError> {
        run_tool(&self.program, args)
    }
}

impl Default for JpegtranBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn crop_args(params: &CropParams) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-copy".into(), params.copy.as_arg().into()];
    if params.perfect {
        args.push("-perfect".into());
    }
    args.extend([
        "-crop".into(),
        params.rect.to_string().into(),
        "-outfile".into(),
        params.output.clone().into(),
        params.source.clone().into(),
    ]);
    args
}

fn rotate_args(params: &RotateParams) -> Vec<OsString> {
    vec![
        "-copy".into(),
        params.copy.as_arg().into(),
        "-rotate".into(),
        "180".into(),
        "-outfile".into(),
        params.output.clone().into(),
        params.source.clone().into(),
    ]
}

fn drop_args(params: &DropParams) -> Vec<OsString> {
    vec![
        "-copy".into(),
        params.copy.as_arg().into(),
        "-perfect".into(),
        "-drop".into(),
        format!("+{}+{}", params.left, params.top).into(),
        params.insert.clone().into(),
        "-outfile".into(),
        params.output.clone().into(),
        params.target.clone().into(),
    ]
}

impl ImageBackend for JpegtranBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Dimensions { width, height })
    }

    fn crop(&self, params: &CropParams) -> Result<(), BackendError> {
        self.run(crop_args(params))
    }

    fn rotate(&self, params: &RotateParams) -> Result<(), BackendError> {
        self.run(rotate_args(params))
    }

    fn drop_in(&self, params: &DropParams) -> Result<(), BackendError> {
        self.run(drop_args(params))
    }
}
