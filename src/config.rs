//! Configuration module.
//!
//! Handles loading, validating, and merging `microscale.toml`. Stock defaults
//! are overridden by the user file; the file only needs the keys it changes.
//!
//! ## Config File Location
//!
//! `--config <FILE>` if given, otherwise `microscale.toml` in the current
//! directory. Without either, the stock defaults apply.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [geometry]
//! target_ratio = 1.164      # width / height after cropping
//! strip_height = 48         # scale-bar strip height (multiple of 8)
//!
//! [naming]
//! cropped_suffix = "#"      # descale/crop output marker
//! scaled_suffix = "_"       # scale-bar output marker
//!
//! [scale_bar]
//! font = "/path/to/font.ttf"  # omit to search common system fonts
//! font_size = 40.0
//! quality = 90
//!
//! [thumbnail]
//! max_edge = 256
//! quality = 70
//!
//! [tools]
//! jpegtran = "jpegtran"
//! exiftool = "exiftool"
//!
//! [processing]
//! max_processes = 4         # omit for auto = CPU cores
//!
//! [lenses]
//! n4 = 1376.0               # pixels per millimetre, merged onto the stock table
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::naming::{LensError, is_lens_code};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "microscale.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `microscale.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MicroscaleConfig {
    /// Crop ratio and strip height.
    pub geometry: GeometryConfig,
    /// Output filename markers.
    pub naming: NamingConfig,
    /// Scale-bar strip appearance.
    pub scale_bar: ScaleBarConfig,
    /// Rebuilt EXIF thumbnail.
    pub thumbnail: ThumbnailConfig,
    /// External executables.
    pub tools: ToolsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Objective lens → pixels per millimetre.
    pub lenses: LensTable,
}

impl MicroscaleConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.geometry;
        if !(g.target_ratio.is_finite() && g.target_ratio > 0.0) {
            return Err(ConfigError::Validation(
                "geometry.target_ratio must be a positive number".into(),
            ));
        }
        if g.strip_height == 0 || g.strip_height % crate::imaging::BLOCK_SIZE != 0 {
            return Err(ConfigError::Validation(format!(
                "geometry.strip_height must be a positive multiple of {}",
                crate::imaging::BLOCK_SIZE
            )));
        }

        let n = &self.naming;
        if n.cropped_suffix == n.scaled_suffix {
            return Err(ConfigError::Validation(
                "naming.cropped_suffix and naming.scaled_suffix must differ".into(),
            ));
        }
        for c in [n.cropped_suffix, n.scaled_suffix] {
            if c == '/' || c == '\\' || c == '.' || c.is_control() {
                return Err(ConfigError::Validation(format!(
                    "naming suffix {:?} is not usable in a file name",
                    c
                )));
            }
        }

        if !(1..=100).contains(&self.scale_bar.quality) {
            return Err(ConfigError::Validation(
                "scale_bar.quality must be 1-100".into(),
            ));
        }
        if !(self.scale_bar.font_size > 0.0) {
            return Err(ConfigError::Validation(
                "scale_bar.font_size must be positive".into(),
            ));
        }
        if !(1..=100).contains(&self.thumbnail.quality) {
            return Err(ConfigError::Validation(
                "thumbnail.quality must be 1-100".into(),
            ));
        }
        if self.thumbnail.max_edge == 0 {
            return Err(ConfigError::Validation(
                "thumbnail.max_edge must be non-zero".into(),
            ));
        }

        self.lenses.validate()
    }
}

/// Crop and descale geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeometryConfig {
    /// Width / height that `--crop` trims wide images down to.
    pub target_ratio: f64,
    /// Height of the scale-bar strip, also the band `--descale` removes.
    pub strip_height: u32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            target_ratio: 1.164,
            strip_height: 48,
        }
    }
}

/// Suffix characters that mark derived files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    pub cropped_suffix: char,
    pub scaled_suffix: char,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            cropped_suffix: '#',
            scaled_suffix: '_',
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScaleBarConfig {
    /// TTF/OTF font for the labels. When absent, common system fonts are tried.
    pub font: Option<PathBuf>,
    pub font_size: f32,
    /// JPEG quality of the rendered strip.
    pub quality: u32,
}

impl Default for ScaleBarConfig {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 40.0,
            quality: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailConfig {
    /// Bounding box edge; the thumbnail keeps the image's aspect ratio.
    pub max_edge: u32,
    pub quality: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_edge: 256,
            quality: 70,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub jpegtran: String,
    pub exiftool: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            jpegtran: "jpegtran".to_string(),
            exiftool: "exiftool".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// 0 and 1 both mean sequential. Values larger than the core count are
    /// clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(0)` → 1 (sequential)
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Objective lens code → pixel density (pixels per millimetre).
///
/// Codes are stored lower-case; lookups use the label from
/// [`lens_label`](crate::naming::lens_label), which is already lower-cased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LensTable(BTreeMap<String, f64>);

const STOCK_LENSES: &[(&str, f64)] = &[
    ("n1", 426.0),
    ("n2", 683.0),
    ("n4", 1376.0),
    ("n10", 3345.0),
    ("n20", 6924.0),
    ("n40", 13530.0),
    ("m2", 628.0),
    ("m4", 1200.0),
    ("m10", 2324.0),
    ("m20", 4218.0),
    ("l2", 628.0),
    ("l4", 1200.0),
    ("l10", 2324.0),
    ("l20", 4218.0),
    ("o2", 535.0),
    ("o4", 1200.0),
    ("o10", 2324.0),
    ("o20", 4218.0),
];

impl Default for LensTable {
    fn default() -> Self {
        Self(
            STOCK_LENSES
                .iter()
                .map(|(code, density)| (code.to_string(), *density))
                .collect(),
        )
    }
}

impl LensTable {
    pub fn new(entries: BTreeMap<String, f64>) -> Self {
        Self(entries)
    }

    /// Pixel density for a lens label.
    pub fn pixels_per_mm(&self, label: &str) -> Result<f64, LensError> {
        self.0
            .get(label)
            .copied()
            .ok_or_else(|| LensError::UnknownLens {
                label: label.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (code, density) in &self.0 {
            if !is_lens_code(code) || code.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(ConfigError::Validation(format!(
                    "lenses.{code}: lens codes are a lower-case letter and 1-2 digits"
                )));
            }
            if !(density.is_finite() && *density > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "lenses.{code}: pixel density must be positive"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(MicroscaleConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<MicroscaleConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: MicroscaleConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from an explicit file, or from `microscale.toml` in `dir`.
///
/// An explicit file must exist; the implicit one is optional.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<MicroscaleConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str(&content)?)
        }
        None => load_raw_config(&dir.join(CONFIG_FILE))?,
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `microscale.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# microscale configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Geometry
# ---------------------------------------------------------------------------
[geometry]
# Width / height that --crop trims wide images down to.
target_ratio = 1.164

# Height of the scale-bar strip in pixels, and the band --descale removes.
# Must be a multiple of 8 (the JPEG block size).
strip_height = 48

# ---------------------------------------------------------------------------
# Output file names
# ---------------------------------------------------------------------------
[naming]
# Descale replaces the last stem character with this; crop appends it.
cropped_suffix = "#"

# The scale-bar stage replaces the last stem character with this.
scaled_suffix = "_"

# ---------------------------------------------------------------------------
# Scale-bar strip
# ---------------------------------------------------------------------------
[scale_bar]
# TTF/OTF font for the labels. When unset, common system fonts are tried;
# if none loads, the bar is drawn without labels.
# font = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"

font_size = 40.0

# JPEG quality of the strip (1-100).
quality = 90

# ---------------------------------------------------------------------------
# Embedded EXIF thumbnail (rebuilt after metadata merge)
# ---------------------------------------------------------------------------
[thumbnail]
# The thumbnail fits in a max_edge x max_edge box.
max_edge = 256
quality = 70

# ---------------------------------------------------------------------------
# External tools
# ---------------------------------------------------------------------------
[tools]
jpegtran = "jpegtran"
exiftool = "exiftool"

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of images to process in parallel.
# Omit to use all CPU cores. 0 or 1 processes files one at a time.
# max_processes = 4

# ---------------------------------------------------------------------------
# Objective lenses: pixels per millimetre
# ---------------------------------------------------------------------------
# The lens code is field 3 of the `_`-separated file name, e.g. N4 in
# 2555v1_vi_s_N4_25112210990_39_.jpg. Entries here are merged onto this
# stock table.
[lenses]
n1 = 426.0
n2 = 683.0
n4 = 1376.0
n10 = 3345.0
n20 = 6924.0
n40 = 13530.0
m2 = 628.0
m4 = 1200.0
m10 = 2324.0
m20 = 4218.0
l2 = 628.0
l4 = 1200.0
l10 = 2324.0
l20 = 4218.0
o2 = 535.0
o4 = 1200.0
o10 = 2324.0
o20 = 4218.0
"##
}
