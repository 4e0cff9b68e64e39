//! Per-image transform pipeline and the parallel batch driver.
//!
//! Each input file runs through a fixed sequence of stages, each optional:
//!
//! ```text
//! Original ─▶ Descaled ─▶ Cropped ─▶ Rotated ─▶ Scaled ─▶ (metadata) ─▶ Final
//!  abc_.jpg    abc#.jpg    abc##.jpg  in place   abc#_.jpg
//! ```
//!
//! ## File state
//!
//! `FileState` carries the path of the current version together with its
//! [`Stage`]. At every stage boundary exactly one file represents the image:
//! when a stage writes a new file, the version it replaced is deleted, unless
//! that version is the original input. The original is never modified before
//! the final metadata merge has read from it.
//!
//! ## Collisions
//!
//! A stage may want to write the original's own name (`abc_.jpg` with the
//! scale bar is `abc_.jpg` again, and an in-place rotation of the original
//! would overwrite it). Such writes go to a hidden staging file in the same
//! directory instead. Metadata is merged from the untouched original into the
//! staging file, and only then is it renamed onto the original's name. A
//! crash at any point leaves the original intact; a failure removes the
//! staging file.
//!
//! ## Timestamps
//!
//! The input's access and modification times are captured before any work
//! and applied to the final output.
//!
//! ## Parallel Processing
//!
//! Files are independent jobs run on a [rayon](https://docs.rs/rayon) pool.
//! A failure aborts only its own file; results and failures are collected in
//! a [`BatchReport`], and progress is streamed as [`ProcessEvent`]s.

use crate::config::MicroscaleConfig;
use crate::imaging::{
    ImageBackend, ImagingError, MetadataBackend, ScaleBar, StripStyle, add_scale_bar,
    calculate_scale_length, crop, descale, get_dimensions, rotate,
};
use crate::metadata::{MetadataOutcome, merge_best_effort};
use crate::naming::{LensError, cropped_path, descaled_path, lens_label, scaled_path, stem_of};
use rayon::prelude::*;
use std::fs::{File, FileTimes};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::SystemTime;
use tempfile::TempPath;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error(transparent)]
    Lens(#[from] LensError),
    #[error("Source image not found: {0}")]
    SourceNotFound(PathBuf),
}

/// Which transforms run. Built once per invocation and shared read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operations {
    pub crop: bool,
    pub descale: bool,
    pub rotate: bool,
    pub scale_bar: bool,
    pub copy_metadata: bool,
}

impl Default for Operations {
    fn default() -> Self {
        Self {
            crop: false,
            descale: false,
            rotate: false,
            scale_bar: true,
            copy_metadata: true,
        }
    }
}

impl Operations {
    /// Whether any stage would write pixels. Metadata copy alone does not count.
    pub fn any_transform(&self) -> bool {
        self.crop || self.descale || self.rotate || self.scale_bar
    }
}

/// Processing stage of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Original,
    Descaled,
    Cropped,
    Rotated,
    Scaled,
    Final,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Original => "original",
            Stage::Descaled => "descale",
            Stage::Cropped => "crop",
            Stage::Rotated => "rotate",
            Stage::Scaled => "scale bar",
            Stage::Final => "final",
        }
    }
}

/// The current on-disk version of one image.
struct FileState {
    original: PathBuf,
    /// Where the current version physically is.
    current: PathBuf,
    /// The name the current version will carry once promoted.
    logical: PathBuf,
    stage: Stage,
    history: Vec<Stage>,
    /// Hidden file standing in for `original` until promotion.
    staging: Option<TempPath>,
}

impl FileState {
    fn new(original: &Path) -> Self {
        Self {
            original: original.to_path_buf(),
            current: original.to_path_buf(),
            logical: original.to_path_buf(),
            stage: Stage::Original,
            history: Vec::new(),
            staging: None,
        }
    }

    fn is_staged(&self) -> bool {
        self.staging
            .as_deref()
            .is_some_and(|staging| staging == self.current.as_path())
    }

    /// Physical path a stage should write when it wants to produce `intended`.
    fn destination(&mut self, intended: &Path) -> std::io::Result<PathBuf> {
        if intended != self.original {
            return Ok(intended.to_path_buf());
        }
        if let Some(staging) = &self.staging {
            return Ok(staging.to_path_buf());
        }
        let dir = self
            .original
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let staging = tempfile::Builder::new()
            .prefix(".microscale-")
            .suffix(".jpg")
            .tempfile_in(dir)?
            .into_temp_path();
        let path = staging.to_path_buf();
        debug!("{}: staging in {}", self.original.display(), path.display());
        self.staging = Some(staging);
        Ok(path)
    }

    /// Make `written` (produced as `intended`) the current version and
    /// remove the version it superseded, unless that was the original.
    fn advance(&mut self, intended: PathBuf, written: PathBuf, stage: Stage) -> std::io::Result<()> {
        let superseded = std::mem::replace(&mut self.current, written);
        if superseded != self.current {
            let was_staging = self
                .staging
                .as_deref()
                .is_some_and(|staging| staging == superseded.as_path());
            if was_staging {
                // Dropping the guard deletes the file.
                self.staging = None;
            } else if superseded != self.original {
                debug!("removing intermediate {}", superseded.display());
                std::fs::remove_file(&superseded)?;
            }
        }
        self.logical = intended;
        self.stage = stage;
        self.history.push(stage);
        Ok(())
    }

    /// Move the staged file onto its final name. Returns the final path.
    fn promote(mut self) -> std::io::Result<(PathBuf, Vec<Stage>)> {
        if self.is_staged() {
            if let Some(staging) = self.staging.take() {
                staging.persist(&self.logical).map_err(|e| e.error)?;
            }
        }
        debug!(
            "{}: {} → {}",
            self.logical.display(),
            self.stage.label(),
            Stage::Final.label()
        );
        Ok((self.logical, self.history))
    }
}

/// Result of processing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    pub source: PathBuf,
    /// Final output; equals `source` when nothing was written or the
    /// output replaced the source.
    pub output: PathBuf,
    /// Transform stages that ran, in order.
    pub stages: Vec<Stage>,
    pub metadata: MetadataOutcome,
}

/// Progress events streamed from the workers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    BatchStarted {
        total: usize,
        threads: usize,
    },
    ImageProcessed {
        /// 1-based position in the input list.
        index: usize,
        image: ProcessedImage,
    },
    ImageFailed {
        index: usize,
        source: PathBuf,
        error: String,
    },
}

/// Outcome of a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: Vec<ProcessedImage>,
    pub failed: Vec<(PathBuf, ProcessError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What the scale-bar stage would do to one file, without doing it.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedImage {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    pub lens: String,
    pub pixels_per_mm: f64,
    pub bar: ScaleBar,
    /// Name the scale-bar stage would write.
    pub output: PathBuf,
}

/// Dry run: resolve lens, density and scale bar for `source`. Reads the
/// image header only.
pub fn check_image(
    backend: &impl ImageBackend,
    config: &MicroscaleConfig,
    source: &Path,
) -> Result<CheckedImage, ProcessError> {
    if !source.is_file() {
        return Err(ProcessError::SourceNotFound(source.to_path_buf()));
    }
    let lens = lens_label(&stem_of(source))?;
    let pixels_per_mm = config.lenses.pixels_per_mm(&lens)?;
    let (width, height) = get_dimensions(backend, source)?;
    Ok(CheckedImage {
        source: source.to_path_buf(),
        width,
        height,
        bar: calculate_scale_length(width, pixels_per_mm),
        lens,
        pixels_per_mm,
        output: scaled_path(source, config.naming.scaled_suffix),
    })
}

/// Everything a worker needs, shared read-only across the pool.
pub struct Pipeline<'a, B: ImageBackend, M: MetadataBackend> {
    pub backend: &'a B,
    pub metadata: &'a M,
    pub config: &'a MicroscaleConfig,
    pub style: &'a StripStyle,
    pub ops: Operations,
}

struct Timestamps {
    accessed: SystemTime,
    modified: SystemTime,
}

impl Timestamps {
    fn capture(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            accessed: meta.accessed()?,
            modified: meta.modified()?,
        })
    }

    fn apply(&self, path: &Path) -> std::io::Result<()> {
        File::options().write(true).open(path)?.set_times(
            FileTimes::new()
                .set_accessed(self.accessed)
                .set_modified(self.modified),
        )
    }
}

impl<B: ImageBackend, M: MetadataBackend> Pipeline<'_, B, M> {
    /// Run every enabled stage on one file.
    pub fn process_image(&self, source: &Path) -> Result<ProcessedImage, ProcessError> {
        if !source.is_file() {
            return Err(ProcessError::SourceNotFound(source.to_path_buf()));
        }
        if !self.ops.any_transform() {
            debug!("{}: no transforms enabled", source.display());
            return Ok(ProcessedImage {
                source: source.to_path_buf(),
                output: source.to_path_buf(),
                stages: Vec::new(),
                metadata: MetadataOutcome::Skipped,
            });
        }

        let times = Timestamps::capture(source)?;
        let naming = &self.config.naming;
        let geometry = &self.config.geometry;
        let mut state = FileState::new(source);

        if self.ops.descale {
            let intended = descaled_path(&state.logical, naming.cropped_suffix);
            let out = state.destination(&intended)?;
            descale(self.backend, &state.current, &out, geometry.strip_height)?;
            state.advance(intended, out, Stage::Descaled)?;
        }

        if self.ops.crop {
            let intended = cropped_path(&state.logical, naming.cropped_suffix);
            let out = state.destination(&intended)?;
            crop(self.backend, &state.current, &out, geometry.target_ratio)?;
            state.advance(intended, out, Stage::Cropped)?;
        }

        if self.ops.rotate {
            let intended = state.logical.clone();
            let out = state.destination(&intended)?;
            if out != state.current {
                std::fs::copy(&state.current, &out)?;
            }
            rotate(self.backend, &out)?;
            state.advance(intended, out, Stage::Rotated)?;
        }

        if self.ops.scale_bar {
            let stem = stem_of(&state.logical);
            let label = lens_label(&stem)?;
            let density = self.config.lenses.pixels_per_mm(&label)?;
            let (width, _) = get_dimensions(self.backend, &state.current)?;
            let bar = calculate_scale_length(width, density);
            debug!("{}: lens {} → {} ({}px)", stem, label, bar.label, bar.length_px);

            let intended = scaled_path(&state.logical, naming.scaled_suffix);
            let out = state.destination(&intended)?;
            add_scale_bar(
                self.backend,
                &state.current,
                &out,
                geometry.strip_height,
                &bar,
                &stem,
                self.style,
            )?;
            state.advance(intended, out, Stage::Scaled)?;
        }

        let metadata = if self.ops.copy_metadata {
            merge_best_effort(
                self.metadata,
                &state.original,
                &state.current,
                &self.config.thumbnail,
            )
        } else {
            MetadataOutcome::Skipped
        };

        let (output, stages) = state.promote()?;
        times.apply(&output)?;
        info!("{} → {}", source.display(), output.display());

        Ok(ProcessedImage {
            source: source.to_path_buf(),
            output,
            stages,
            metadata,
        })
    }

    /// Process `files` on `threads` workers (1 = sequential).
    pub fn process_batch(
        &self,
        files: &[PathBuf],
        threads: usize,
        progress: Option<Sender<ProcessEvent>>,
    ) -> BatchReport {
        let threads = threads.max(1);
        if let Some(tx) = &progress {
            tx.send(ProcessEvent::BatchStarted {
                total: files.len(),
                threads,
            })
            .ok();
        }

        let run_one = |(i, path): (usize, &PathBuf)| {
            let result = self.process_image(path);
            if let Some(tx) = &progress {
                let event = match &result {
                    Ok(image) => ProcessEvent::ImageProcessed {
                        index: i + 1,
                        image: image.clone(),
                    },
                    Err(e) => ProcessEvent::ImageFailed {
                        index: i + 1,
                        source: path.clone(),
                        error: e.to_string(),
                    },
                };
                tx.send(event).ok();
            }
            (path.clone(), result)
        };

        let results: Vec<(PathBuf, Result<ProcessedImage, ProcessError>)> = if threads == 1 {
            files.iter().enumerate().map(run_one).collect()
        } else {
            match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool.install(|| files.par_iter().enumerate().map(run_one).collect()),
                Err(e) => {
                    warn!("could not start {} workers ({}); running sequentially", threads, e);
                    files.iter().enumerate().map(run_one).collect()
                }
            }
        };

        let mut report = BatchReport::default();
        for (path, result) in results {
            match result {
                Ok(image) => report.processed.push(image),
                Err(e) => {
                    warn!("{}: {}", path.display(), e);
                    report.failed.push((path, e));
                }
            }
        }
        report
    }
}
