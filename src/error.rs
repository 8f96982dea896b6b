//! Error types shared by the codecs, pattern containers and disparity maps.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by codec setup, pattern handling and decoding.
///
/// Per-pixel decode ambiguity is never reported here; it is written into the
/// output map as [`crate::disparity::Disparity::Invalid`].
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Codec has not been set up")]
    NotSetUp,

    #[error("Missing required setting '{0}'")]
    MissingSetting(&'static str),

    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("{regions} regions do not evenly tile a resolution of {resolution}")]
    RegionsDoNotTile { resolution: u32, regions: u32 },

    #[error("Requested {requested} patterns but at most {maximum} are available")]
    TooManyPatterns { requested: u32, maximum: u32 },

    #[error("Unsupported bit depth: {0}")]
    InvalidBitDepth(u32),

    #[error("Pixels per period must be a positive multiple of 8, got {0}")]
    InvalidPixelsPerPeriod(u32),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Capture sequence is empty")]
    EmptyCaptureSequence,

    #[error("Expected {expected} captures, got {actual}")]
    CaptureCountMismatch { expected: usize, actual: usize },

    #[error("Capture {index} is {actual:?} but previous captures are {expected:?}")]
    CaptureResolutionMismatch {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Capture {0} has no pixel data")]
    EmptyCapture(usize),

    #[error("Failed to read capture {index} from {path:?}: {source}")]
    UnreadableCapture {
        index: usize,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Disparity map has not been created")]
    EmptyMap,

    #[error("Pixel ({column}, {row}) is outside a {columns}x{rows} map")]
    PixelOutOfBounds {
        column: u32,
        row: u32,
        columns: u32,
        rows: u32,
    },

    #[error("Disparity value {0} collides with a sentinel and cannot be stored")]
    UnrepresentableValue(u32),

    #[error("{}", join_errors(.0))]
    Settings(Vec<CodecError>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CodecError {
    pub(crate) fn invalid_setting(key: &str, reason: impl Into<String>) -> Self {
        CodecError::InvalidSetting {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Collapse a list of setup problems into a single error.
    ///
    /// A lone problem is returned as itself so callers matching on a specific
    /// variant still can.
    pub(crate) fn collapse(mut issues: Vec<CodecError>) -> Self {
        if issues.len() == 1 {
            issues.remove(0)
        } else {
            CodecError::Settings(issues)
        }
    }

    /// All individual errors carried by this error.
    pub fn issues(&self) -> Vec<&CodecError> {
        match self {
            CodecError::Settings(list) => list.iter().collect(),
            other => vec![other],
        }
    }
}

fn join_errors(errors: &[CodecError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, CodecError>;
