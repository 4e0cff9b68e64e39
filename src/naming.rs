//! Filename conventions for microscope captures.
//!
//! Capture stems are `_`-separated fields, with the objective lens code in
//! field 3:
//!
//! ```text
//! 2555v1_vi_s_N4_25112210990_39_
//! │      │  │ │  │           │
//! │      │  │ │  │           └── sequence
//! │      │  │ │  └── timestamp
//! │      │  │ └── lens code → "n4"
//! ```
//!
//! ## Derived Output Names
//!
//! Each transform writes a sibling file whose stem is derived from its input:
//! - descale: last stem character → cropped suffix (`abc_` → `abc#`)
//! - crop: cropped suffix appended (`abc` → `abc#`)
//! - scale bar: last stem character → scaled suffix (`abc#` → `abc_`)
//!
//! Rotation happens in place and keeps the name.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static LENS_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][0-9]{1,2}$").expect("lens code pattern is valid")
});

/// Index of the lens code among the `_`-separated stem fields.
const LENS_FIELD: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LensError {
    #[error("no lens code in field 3 of '{stem}'")]
    Format { stem: String },
    #[error("unknown lens '{label}'")]
    UnknownLens { label: String },
}

/// Whether `code` has the shape of a lens code (`N4`, `m10`, ...).
pub fn is_lens_code(code: &str) -> bool {
    LENS_CODE.is_match(code)
}

/// Extract the lower-cased lens label from a capture stem.
///
/// - `"2555v1_vi_s_N4_25112210990_39_"` → `"n4"`
/// - `"a_b_c_M10"` → `"m10"`
/// - `"invalid_file_name"` → [`LensError::Format`] (only three fields)
/// - `"a_b_c_N400"` → [`LensError::Format`] (three digits)
pub fn lens_label(stem: &str) -> Result<String, LensError> {
    stem.split('_')
        .nth(LENS_FIELD)
        .filter(|field| is_lens_code(field))
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| LensError::Format {
            stem: stem.to_string(),
        })
}

/// File stem as a string, empty when the path has none.
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn with_stem(path: &Path, stem: &str) -> PathBuf {
    match path.extension() {
        Some(ext) => path.with_file_name(format!("{}.{}", stem, ext.to_string_lossy())),
        None => path.with_file_name(stem),
    }
}

/// Replace the last character of the stem with `suffix`; an empty stem
/// gets the suffix appended.
fn replace_last(path: &Path, suffix: char) -> PathBuf {
    let mut stem = stem_of(path);
    stem.pop();
    stem.push(suffix);
    with_stem(path, &stem)
}

/// Output path of the descale stage.
pub fn descaled_path(path: &Path, cropped_suffix: char) -> PathBuf {
    replace_last(path, cropped_suffix)
}

/// Output path of the crop stage.
pub fn cropped_path(path: &Path, cropped_suffix: char) -> PathBuf {
    let mut stem = stem_of(path);
    stem.push(cropped_suffix);
    with_stem(path, &stem)
}

/// Output path of the scale-bar stage.
pub fn scaled_path(path: &Path, scaled_suffix: char) -> PathBuf {
    replace_last(path, scaled_suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lens_label_from_capture_stem() {
        assert_eq!(lens_label("2555v1_vi_s_N4_25112210990_39_").unwrap(), "n4");
    }

    #[test]
    fn lens_label_two_digits() {
        assert_eq!(lens_label("a_b_c_M10_x").unwrap(), "m10");
    }

    #[test]
    fn lens_label_last_field() {
        assert_eq!(lens_label("a_b_c_o2").unwrap(), "o2");
    }

    #[test]
    fn too_few_fields_is_format_error() {
        assert_eq!(
            lens_label("invalid_file_name"),
            Err(LensError::Format {
                stem: "invalid_file_name".to_string()
            })
        );
    }

    #[test]
    fn partial_match_is_rejected() {
        assert!(lens_label("a_b_c_N400_x").is_err());
        assert!(lens_label("a_b_c_N4x_x").is_err());
        assert!(lens_label("a_b_c_4N_x").is_err());
        assert!(lens_label("a_b_c__x").is_err());
    }

    #[test]
    fn non_ascii_letter_is_rejected() {
        assert!(lens_label("a_b_c_µ4_x").is_err());
    }

    #[test]
    fn descale_replaces_last_char() {
        assert_eq!(
            descaled_path(Path::new("/d/abc_.jpg"), '#'),
            PathBuf::from("/d/abc#.jpg")
        );
    }

    #[test]
    fn crop_appends_suffix() {
        assert_eq!(
            cropped_path(Path::new("/d/abc.jpg"), '#'),
            PathBuf::from("/d/abc#.jpg")
        );
    }

    #[test]
    fn scale_replaces_last_char() {
        assert_eq!(
            scaled_path(Path::new("/d/abc#.jpg"), '_'),
            PathBuf::from("/d/abc_.jpg")
        );
    }

    #[test]
    fn scale_of_capture_stem_collides_with_original() {
        let original = Path::new("2555v1_vi_s_N4_25112210990_39_.jpg");
        assert_eq!(scaled_path(original, '_'), original);
    }

    #[test]
    fn uppercase_extension_is_kept() {
        assert_eq!(
            scaled_path(Path::new("IMG1.JPG"), '_'),
            PathBuf::from("IMG_.JPG")
        );
    }

    #[test]
    fn single_char_stem_is_replaced() {
        assert_eq!(descaled_path(Path::new("x.jpg"), '#'), PathBuf::from("#.jpg"));
    }
}
