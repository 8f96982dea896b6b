//! Structured light codecs: pattern generation and capture decoding.

mod gray_code;
mod three_phase;

pub use gray_code::{bits_required, GrayCode};
pub use three_phase::ThreePhase;

use crate::disparity::{DisparityMap, Orientation};
use crate::error::{CodecError, Result};
use crate::parameters::{self, collect, keys, ParameterSet};
use crate::pattern::{CaptureSequence, PatternColor, PatternSequence};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// Common contract of every codec.
///
/// `setup` must succeed before the other operations; until then they fail
/// with [`CodecError::NotSetUp`]. Decoding borrows the codec immutably, so a
/// codec cannot be reconfigured while a decode is running.
pub trait StructuredLightCodec {
    fn kind(&self) -> CodecKind;

    /// Validate and store the configuration. On failure the codec is left
    /// not set up.
    fn setup(&mut self, settings: &ParameterSet) -> Result<()>;

    /// Like `setup`, taking `columns`/`rows` from the projector when the
    /// settings do not carry them.
    fn setup_for_projector(&mut self, settings: &ParameterSet, columns: u32, rows: u32) -> Result<()> {
        self.setup(&with_projector_resolution(settings, columns, rows))
    }

    /// Write the active configuration into `settings`.
    fn get_setup(&self, settings: &mut ParameterSet) -> Result<()>;

    fn is_setup(&self) -> bool;

    /// Number of patterns (and therefore captures) per scan, 0 if not set up.
    fn total_pattern_count(&self) -> usize;

    fn generate_pattern_sequence(&self) -> Result<PatternSequence>;

    /// Decode captures taken in the order `generate_pattern_sequence` produced.
    fn decode_capture_sequence(&self, captures: &CaptureSequence) -> Result<DisparityMap>;

    /// Drop the configuration.
    fn clear(&mut self);
}

/// Available codec families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CodecKind {
    #[default]
    GrayCode,
    ThreePhase,
}

impl CodecKind {
    pub fn name(self) -> &'static str {
        match self {
            CodecKind::GrayCode => "gray_code",
            CodecKind::ThreePhase => "three_phase",
        }
    }

    /// Create an unconfigured codec of this kind.
    pub fn create(self) -> Box<dyn StructuredLightCodec> {
        match self {
            CodecKind::GrayCode => Box::new(GrayCode::new()),
            CodecKind::ThreePhase => Box::new(ThreePhase::new()),
        }
    }
}

impl std::fmt::Display for CodecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CodecKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "gray_code" | "graycode" => Ok(CodecKind::GrayCode),
            "three_phase" | "threephase" => Ok(CodecKind::ThreePhase),
            other => Err(format!("unknown codec '{}'", other)),
        }
    }
}

/// Create and set up a codec in one step.
pub fn create_codec(kind: CodecKind, settings: &ParameterSet) -> Result<Box<dyn StructuredLightCodec>> {
    let mut codec = kind.create();
    codec.setup(settings)?;
    Ok(codec)
}

/// Hints for the display collaborator, attached to every generated sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DisplaySettings {
    pub color: PatternColor,
    pub exposure_us: u32,
    pub period_us: u32,
}

impl DisplaySettings {
    pub fn read(settings: &ParameterSet, issues: &mut Vec<CodecError>) -> Option<Self> {
        let color = collect(issues, settings.get_or(keys::PATTERN_COLOR, PatternColor::White));
        let exposure_us = collect(
            issues,
            settings.get_or(keys::EXPOSURE_US, parameters::DEFAULT_EXPOSURE_US),
        );
        let period_us = collect(
            issues,
            settings.get_or(keys::PERIOD_US, parameters::DEFAULT_PERIOD_US),
        );

        let (color, exposure_us, period_us) = (color?, exposure_us?, period_us?);
        if exposure_us == 0 {
            issues.push(CodecError::invalid_setting(keys::EXPOSURE_US, "must be positive"));
            return None;
        }
        if period_us < exposure_us {
            issues.push(CodecError::invalid_setting(
                keys::PERIOD_US,
                format!("period {} is shorter than exposure {}", period_us, exposure_us),
            ));
            return None;
        }

        Some(Self {
            color,
            exposure_us,
            period_us,
        })
    }

    pub fn write(&self, settings: &mut ParameterSet) {
        settings.set(keys::PATTERN_COLOR, self.color.name());
        settings.set(keys::EXPOSURE_US, self.exposure_us);
        settings.set(keys::PERIOD_US, self.period_us);
    }
}

/// Projector geometry shared by both codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub orientation: Orientation,
    pub columns: u32,
    pub rows: u32,
    /// Length of the coded axis.
    pub resolution: u32,
}

impl Geometry {
    pub fn read(settings: &ParameterSet, issues: &mut Vec<CodecError>) -> Option<Self> {
        let orientation = collect(
            issues,
            settings.get_or(keys::ORIENTATION, Orientation::Vertical),
        );
        let columns = collect(issues, settings.require::<u32>(keys::COLUMNS));
        let rows = collect(issues, settings.require::<u32>(keys::ROWS));

        let (orientation, columns, rows) = (orientation?, columns?, rows?);
        if columns == 0 || rows == 0 {
            issues.push(CodecError::invalid_setting(
                keys::COLUMNS,
                format!("projector resolution must be non-zero, got {}x{}", columns, rows),
            ));
            return None;
        }

        let resolution = orientation.resolution(columns, rows)?;
        if resolution < 2 {
            issues.push(CodecError::invalid_setting(
                keys::ORIENTATION,
                format!("coded axis of {} pixels is too short", resolution),
            ));
            return None;
        }

        Some(Self {
            orientation,
            columns,
            rows,
            resolution,
        })
    }

    pub fn write(&self, settings: &mut ParameterSet) {
        settings.set(keys::ORIENTATION, self.orientation.name());
        settings.set(keys::COLUMNS, self.columns);
        settings.set(keys::ROWS, self.rows);
    }

    /// Paint a projector-sized image from per-code-index values.
    pub fn rasterize(&self, line: &[u8]) -> GrayImage {
        GrayImage::from_fn(self.columns, self.rows, |column, row| {
            Luma([line[self.orientation.code_index(column, row, self.rows) as usize]])
        })
    }
}

/// Read `oversample`, which must lie in `1..=MAX_OVERSAMPLE`.
pub(crate) fn read_oversample(settings: &ParameterSet, issues: &mut Vec<CodecError>) -> Option<u32> {
    let oversample = collect(issues, settings.get_or(keys::OVERSAMPLE, 1u32))?;
    if !(1..=parameters::MAX_OVERSAMPLE).contains(&oversample) {
        issues.push(CodecError::invalid_setting(
            keys::OVERSAMPLE,
            format!(
                "must be between 1 and {}, got {}",
                parameters::MAX_OVERSAMPLE,
                oversample
            ),
        ));
        return None;
    }
    Some(oversample)
}

/// Fill in `columns`/`rows` from an externally supplied projector resolution
/// when the settings do not carry them.
pub fn with_projector_resolution(settings: &ParameterSet, columns: u32, rows: u32) -> ParameterSet {
    let mut merged = settings.clone();
    if !merged.contains(keys::COLUMNS) {
        merged.set(keys::COLUMNS, columns);
    }
    if !merged.contains(keys::ROWS) {
        merged.set(keys::ROWS, rows);
    }
    merged
}
