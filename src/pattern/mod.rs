//! Projectable patterns and the sequences codecs generate.

mod capture;

pub use capture::{Capture, CaptureData, CaptureSequence};

use crate::error::{CodecError, Result};
use crate::parameters::{FromParameter, ParameterSet, ParameterValue};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// LED color the projector should use for a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PatternColor {
    Black,
    Red,
    Green,
    Blue,
    Cyan,
    Yellow,
    Magenta,
    #[default]
    White,
}

impl PatternColor {
    pub fn name(self) -> &'static str {
        match self {
            PatternColor::Black => "black",
            PatternColor::Red => "red",
            PatternColor::Green => "green",
            PatternColor::Blue => "blue",
            PatternColor::Cyan => "cyan",
            PatternColor::Yellow => "yellow",
            PatternColor::Magenta => "magenta",
            PatternColor::White => "white",
        }
    }
}

impl std::str::FromStr for PatternColor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "black" => Ok(PatternColor::Black),
            "red" => Ok(PatternColor::Red),
            "green" => Ok(PatternColor::Green),
            "blue" => Ok(PatternColor::Blue),
            "cyan" => Ok(PatternColor::Cyan),
            "yellow" => Ok(PatternColor::Yellow),
            "magenta" => Ok(PatternColor::Magenta),
            "white" => Ok(PatternColor::White),
            other => Err(format!("unknown pattern color '{}'", other)),
        }
    }
}

impl FromParameter for PatternColor {
    fn from_parameter(key: &str, value: &ParameterValue) -> Result<Self> {
        value
            .to_string()
            .parse()
            .map_err(|reason: String| CodecError::invalid_setting(key, reason))
    }
}

/// Bits per pixel a pattern is displayed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    Mono1,
    Mono2,
    Mono3,
    Mono4,
    Mono5,
    Mono6,
    Mono7,
    Mono8,
}

/// Maximum intensity per bit depth, indexed by `bits - 1`.
const MAX_INTENSITY: [u8; 8] = [1, 3, 7, 15, 31, 63, 127, 255];

const BIT_DEPTHS: [BitDepth; 8] = [
    BitDepth::Mono1,
    BitDepth::Mono2,
    BitDepth::Mono3,
    BitDepth::Mono4,
    BitDepth::Mono5,
    BitDepth::Mono6,
    BitDepth::Mono7,
    BitDepth::Mono8,
];

impl BitDepth {
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            1..=8 => Ok(BIT_DEPTHS[bits as usize - 1]),
            _ => Err(CodecError::InvalidBitDepth(bits)),
        }
    }

    pub fn bits(self) -> u32 {
        self as u32 + 1
    }

    /// Largest intensity representable at this depth (`2^bits - 1`).
    pub fn max_intensity(self) -> u8 {
        MAX_INTENSITY[self as usize]
    }
}

/// Payload of a pattern.
#[derive(Debug, Clone)]
pub enum PatternData {
    /// Raster held in memory.
    Image(GrayImage),
    /// Raster stored in an image file.
    File(PathBuf),
    /// Pattern described by parameters for a display that renders it itself.
    Parameters(ParameterSet),
}

/// A single projectable pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub color: PatternColor,
    pub bit_depth: BitDepth,
    pub data: PatternData,
}

impl Pattern {
    pub fn image(color: PatternColor, bit_depth: BitDepth, image: GrayImage) -> Self {
        Self {
            color,
            bit_depth,
            data: PatternData::Image(image),
        }
    }

    /// Check the payload resolves to something displayable.
    pub fn validate(&self) -> Result<()> {
        match &self.data {
            PatternData::Image(image) => {
                if image.width() == 0 || image.height() == 0 {
                    return Err(CodecError::InvalidPattern("image is empty".to_string()));
                }
            }
            PatternData::File(path) => {
                if path.as_os_str().is_empty() {
                    return Err(CodecError::InvalidPattern("file path is empty".to_string()));
                }
                if !path.is_file() {
                    return Err(CodecError::InvalidPattern(format!(
                        "file {} does not exist",
                        path.display()
                    )));
                }
            }
            PatternData::Parameters(parameters) => {
                if parameters.is_empty() {
                    return Err(CodecError::InvalidPattern(
                        "parameter set is empty".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// In-memory raster, if this pattern carries one.
    pub fn as_image(&self) -> Option<&GrayImage> {
        match &self.data {
            PatternData::Image(image) => Some(image),
            _ => None,
        }
    }
}

/// Ordered list of patterns plus parameters shared by all of them.
#[derive(Debug, Clone, Default)]
pub struct PatternSequence {
    patterns: Vec<Pattern>,
    pub parameters: ParameterSet,
}

impl PatternSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            patterns: Vec::with_capacity(capacity),
            parameters: ParameterSet::new(),
        }
    }

    /// Append a pattern after validating its payload.
    pub fn add(&mut self, pattern: Pattern) -> Result<()> {
        pattern.validate()?;
        self.patterns.push(pattern);
        Ok(())
    }

    /// Append every pattern of `other`, keeping this sequence's parameters.
    pub fn append(&mut self, other: PatternSequence) {
        self.patterns.extend(other.patterns);
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pattern> {
        self.patterns.iter()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
        self.parameters.clear();
    }
}

impl<'a> IntoIterator for &'a PatternSequence {
    type Item = &'a Pattern;
    type IntoIter = std::slice::Iter<'a, Pattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}
