//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! Processing 3 files on 4 workers
//! 001 2555v1_vi_s_N4_25112210990_39_.jpg
//!     Output: 2555v1_vi_s_N4_25112210990_39_.jpg
//!     Stages: descale, scale bar
//!     Metadata: merged
//! 002 invalid_file_name.jpg
//!     Failed: no lens code in field 3 of 'invalid_file_name'
//!
//! Processed 2 files, 1 failed
//! ```
//!
//! ## Check
//!
//! ```text
//! 001 2555v1_vi_s_N4_25112210990_39_.jpg
//!     Size: 4656x4000
//!     Lens: n4 (1376 px/mm)
//!     Scale bar: 500 µm (688 px)
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::metadata::MetadataOutcome;
use crate::process::{BatchReport, CheckedImage, ProcessError, ProcessEvent};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn header(index: usize, path: &Path) -> String {
    format!("{} {}", format_index(index), file_name(path))
}

// ============================================================================
// Process output
// ============================================================================

/// Format a single process progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::BatchStarted { total, threads } => {
            let files = if *total == 1 { "file" } else { "files" };
            let workers = if *threads == 1 { "worker" } else { "workers" };
            vec![format!(
                "Processing {} {} on {} {}",
                total, files, threads, workers
            )]
        }
        ProcessEvent::ImageProcessed { index, image } => {
            let mut lines = vec![header(*index, &image.source)];
            if image.stages.is_empty() {
                lines.push(format!("{}Unchanged", indent(1)));
                return lines;
            }
            lines.push(format!("{}Output: {}", indent(1), file_name(&image.output)));
            let stages: Vec<&str> = image.stages.iter().map(|s| s.label()).collect();
            lines.push(format!("{}Stages: {}", indent(1), stages.join(", ")));
            let metadata = match &image.metadata {
                MetadataOutcome::Merged => "merged".to_string(),
                MetadataOutcome::Skipped => "skipped".to_string(),
                MetadataOutcome::Failed(reason) => format!("failed ({})", reason),
            };
            lines.push(format!("{}Metadata: {}", indent(1), metadata));
            lines
        }
        ProcessEvent::ImageFailed {
            index,
            source,
            error,
        } => vec![
            header(*index, source),
            format!("{}Failed: {}", indent(1), error),
        ],
    }
}

/// Format the end-of-batch summary.
pub fn format_batch_summary(report: &BatchReport) -> Vec<String> {
    let processed = report.processed.len();
    let noun = if processed == 1 { "file" } else { "files" };
    let mut summary = format!("Processed {} {}", processed, noun);
    if !report.failed.is_empty() {
        summary.push_str(&format!(", {} failed", report.failed.len()));
    }
    let mut lines = vec![String::new(), summary];
    for (path, error) in &report.failed {
        lines.push(format!("{}{}: {}", indent(1), path.display(), error));
    }
    lines
}

/// Print the end-of-batch summary to stdout.
pub fn print_batch_summary(report: &BatchReport) {
    for line in format_batch_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format one dry-run result.
pub fn format_check_result(
    index: usize,
    path: &Path,
    result: &Result<CheckedImage, ProcessError>,
) -> Vec<String> {
    let mut lines = vec![header(index, path)];
    match result {
        Ok(checked) => {
            lines.push(format!(
                "{}Size: {}x{}",
                indent(1),
                checked.width,
                checked.height
            ));
            lines.push(format!(
                "{}Lens: {} ({} px/mm)",
                indent(1),
                checked.lens,
                checked.pixels_per_mm
            ));
            lines.push(format!(
                "{}Scale bar: {} ({} px)",
                indent(1),
                checked.bar.label,
                checked.bar.length_px
            ));
        }
        Err(e) => lines.push(format!("{}Error: {}", indent(1), e)),
    }
    lines
}

/// Print one dry-run result to stdout.
pub fn print_check_result(index: usize, path: &Path, result: &Result<CheckedImage, ProcessError>) {
    for line in format_check_result(index, path, result) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::ScaleBar;
    use crate::naming::LensError;
    use crate::process::{ProcessedImage, Stage};
    use std::path::PathBuf;

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(1), "    ");
    }

    #[test]
    fn format_batch_started() {
        let lines = format_process_event(&ProcessEvent::BatchStarted {
            total: 3,
            threads: 1,
        });
        assert_eq!(lines, vec!["Processing 3 files on 1 worker"]);
    }

    #[test]
    fn format_processed_image() {
        let event = ProcessEvent::ImageProcessed {
            index: 1,
            image: ProcessedImage {
                source: PathBuf::from("/caps/abc_.jpg"),
                output: PathBuf::from("/caps/abc_.jpg"),
                stages: vec![Stage::Descaled, Stage::Scaled],
                metadata: MetadataOutcome::Merged,
            },
        };
        let lines = format_process_event(&event);
        assert_eq!(
            lines,
            vec![
                "001 abc_.jpg",
                "    Output: abc_.jpg",
                "    Stages: descale, scale bar",
                "    Metadata: merged",
            ]
        );
    }

    #[test]
    fn format_unchanged_image() {
        let event = ProcessEvent::ImageProcessed {
            index: 2,
            image: ProcessedImage {
                source: PathBuf::from("a.jpg"),
                output: PathBuf::from("a.jpg"),
                stages: vec![],
                metadata: MetadataOutcome::Skipped,
            },
        };
        assert_eq!(format_process_event(&event), vec!["002 a.jpg", "    Unchanged"]);
    }

    #[test]
    fn format_metadata_failure_reason() {
        let event = ProcessEvent::ImageProcessed {
            index: 1,
            image: ProcessedImage {
                source: PathBuf::from("a.jpg"),
                output: PathBuf::from("a#.jpg"),
                stages: vec![Stage::Cropped],
                metadata: MetadataOutcome::Failed("exiftool missing".to_string()),
            },
        };
        let lines = format_process_event(&event);
        assert_eq!(lines[3], "    Metadata: failed (exiftool missing)");
    }

    #[test]
    fn format_failed_image() {
        let event = ProcessEvent::ImageFailed {
            index: 7,
            source: PathBuf::from("/x/bad.jpg"),
            error: "boom".to_string(),
        };
        assert_eq!(format_process_event(&event), vec!["007 bad.jpg", "    Failed: boom"]);
    }

    #[test]
    fn summary_counts_failures() {
        let report = BatchReport {
            processed: vec![],
            failed: vec![(
                PathBuf::from("bad.jpg"),
                ProcessError::SourceNotFound(PathBuf::from("bad.jpg")),
            )],
        };
        let lines = format_batch_summary(&report);
        assert_eq!(lines[1], "Processed 0 files, 1 failed");
        assert_eq!(lines[2], "    bad.jpg: Source image not found: bad.jpg");
    }

    #[test]
    fn summary_without_failures() {
        let lines = format_batch_summary(&BatchReport::default());
        assert_eq!(lines, vec!["", "Processed 0 files"]);
    }

    #[test]
    fn format_check_success() {
        let checked = CheckedImage {
            source: PathBuf::from("a_b_c_n4_.jpg"),
            width: 4656,
            height: 4000,
            lens: "n4".to_string(),
            pixels_per_mm: 1376.0,
            bar: ScaleBar {
                length_px: 688,
                label: "500 µm".to_string(),
            },
            output: PathBuf::from("a_b_c_n4_.jpg"),
        };
        let lines = format_check_result(1, Path::new("a_b_c_n4_.jpg"), &Ok(checked));
        assert_eq!(
            lines,
            vec![
                "001 a_b_c_n4_.jpg",
                "    Size: 4656x4000",
                "    Lens: n4 (1376 px/mm)",
                "    Scale bar: 500 µm (688 px)",
            ]
        );
    }

    #[test]
    fn format_check_error() {
        let result = Err(ProcessError::Lens(LensError::UnknownLens {
            label: "z9".to_string(),
        }));
        let lines = format_check_result(3, Path::new("x.jpg"), &result);
        assert_eq!(lines, vec!["003 x.jpg", "    Error: unknown lens 'z9'"]);
    }
}
