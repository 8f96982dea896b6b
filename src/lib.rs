//! Structured Light Pattern Codecs
//!
//! Pattern generation and per-pixel correspondence decoding for projector /
//! camera scanning:
//! - Gray code, at pixel or region granularity, with inverted or albedo decoding
//! - Three-phase sinusoids unwrapped with an embedded Gray code pass
//! - Disparity maps with oversampling, smoothing and on-disk persistence

pub mod codec;
pub mod config;
pub mod disparity;
pub mod error;
pub mod export;
pub mod parameters;
pub mod pattern;

pub use codec::{create_codec, CodecKind, GrayCode, StructuredLightCodec, ThreePhase};
pub use disparity::{Disparity, DisparityMap, Orientation};
pub use error::{CodecError, Result};
pub use parameters::{ParameterSet, ParameterValue};
pub use pattern::{BitDepth, Capture, CaptureSequence, Pattern, PatternColor, PatternSequence};
