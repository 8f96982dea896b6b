//! Camera captures handed back to a codec for decoding.

use crate::error::{CodecError, Result};
use image::GrayImage;
use std::borrow::Cow;
use std::ops::Range;
use std::path::PathBuf;

/// Payload of a captured frame.
#[derive(Debug, Clone)]
pub enum CaptureData {
    Image(GrayImage),
    /// Image file; color files are converted to luma on load.
    File(PathBuf),
}

/// One camera frame, captured while a single pattern was displayed.
#[derive(Debug, Clone)]
pub struct Capture {
    pub data: CaptureData,
}

impl Capture {
    pub fn image(image: GrayImage) -> Self {
        Self {
            data: CaptureData::Image(image),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            data: CaptureData::File(path.into()),
        }
    }

    fn resolve(&self, index: usize) -> Result<Cow<'_, GrayImage>> {
        let frame = match &self.data {
            CaptureData::Image(image) => Cow::Borrowed(image),
            CaptureData::File(path) => {
                let image = image::open(path).map_err(|source| CodecError::UnreadableCapture {
                    index,
                    path: path.clone(),
                    source,
                })?;
                Cow::Owned(image.to_luma8())
            }
        };

        if frame.width() == 0 || frame.height() == 0 {
            return Err(CodecError::EmptyCapture(index));
        }
        Ok(frame)
    }
}

/// Captures in the order their patterns were projected.
#[derive(Debug, Clone, Default)]
pub struct CaptureSequence {
    captures: Vec<Capture>,
}

impl CaptureSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, capture: Capture) {
        self.captures.push(capture);
    }

    pub fn add_image(&mut self, image: GrayImage) {
        self.captures.push(Capture::image(image));
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Capture> {
        self.captures.get(index)
    }

    /// Copy of a contiguous run of captures.
    pub fn slice(&self, range: Range<usize>) -> CaptureSequence {
        Self {
            captures: self.captures[range].to_vec(),
        }
    }

    /// Resolve every capture to a luma frame.
    ///
    /// Fails before any pixel work if the count differs from `expected`, a
    /// frame cannot be read or is empty, or the frames differ in size.
    pub fn frames(&self, expected: usize) -> Result<Vec<Cow<'_, GrayImage>>> {
        if self.captures.is_empty() {
            return Err(CodecError::EmptyCaptureSequence);
        }
        if self.captures.len() != expected {
            return Err(CodecError::CaptureCountMismatch {
                expected,
                actual: self.captures.len(),
            });
        }

        let mut frames: Vec<Cow<'_, GrayImage>> = Vec::with_capacity(self.captures.len());
        for (index, capture) in self.captures.iter().enumerate() {
            let frame = capture.resolve(index)?;
            if let Some(first) = frames.first() {
                if first.dimensions() != frame.dimensions() {
                    return Err(CodecError::CaptureResolutionMismatch {
                        index,
                        expected: first.dimensions(),
                        actual: frame.dimensions(),
                    });
                }
            }
            frames.push(frame);
        }
        Ok(frames)
    }
}

impl FromIterator<GrayImage> for CaptureSequence {
    fn from_iter<I: IntoIterator<Item = GrayImage>>(iter: I) -> Self {
        Self {
            captures: iter.into_iter().map(Capture::image).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_validation() {
        let empty = CaptureSequence::new();
        assert!(matches!(empty.frames(2), Err(CodecError::EmptyCaptureSequence)));

        let captures: CaptureSequence = vec![GrayImage::new(4, 3), GrayImage::new(4, 3)]
            .into_iter()
            .collect();
        assert!(matches!(
            captures.frames(3),
            Err(CodecError::CaptureCountMismatch { expected: 3, actual: 2 })
        ));
        assert_eq!(captures.frames(2).unwrap().len(), 2);

        let mut mixed = captures.clone();
        mixed.add_image(GrayImage::new(5, 3));
        assert!(matches!(
            mixed.frames(3),
            Err(CodecError::CaptureResolutionMismatch { index: 2, .. })
        ));

        let mut zero = CaptureSequence::new();
        zero.add_image(GrayImage::new(0, 0));
        assert!(matches!(zero.frames(1), Err(CodecError::EmptyCapture(0))));
    }

    #[test]
    fn test_unreadable_file() {
        let mut captures = CaptureSequence::new();
        captures.add(Capture::file("/no/such/capture.png"));
        assert!(matches!(
            captures.frames(1),
            Err(CodecError::UnreadableCapture { index: 0, .. })
        ));
    }

    #[test]
    fn test_file_capture_loads_as_luma() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let rgb = image::RgbImage::from_pixel(3, 2, image::Rgb([200, 200, 200]));
        rgb.save(&path).unwrap();

        let mut captures = CaptureSequence::new();
        captures.add(Capture::file(&path));
        let frames = captures.frames(1).unwrap();
        assert_eq!(frames[0].dimensions(), (3, 2));
        assert_eq!(frames[0].get_pixel(1, 1).0[0], 200);
    }

    #[test]
    fn test_slice() {
        let captures: CaptureSequence = (0..5).map(|_| GrayImage::new(2, 2)).collect();
        assert_eq!(captures.slice(3..5).len(), 2);
    }
}
