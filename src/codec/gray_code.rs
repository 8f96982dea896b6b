//! Gray code pattern generation and decoding.

use super::{read_oversample, CodecKind, DisplaySettings, Geometry, StructuredLightCodec};
use crate::disparity::{Disparity, DisparityMap};
use crate::error::{CodecError, Result};
use crate::parameters::{self, collect, keys, ParameterSet};
use crate::pattern::{BitDepth, CaptureSequence, Pattern, PatternSequence};
use image::GrayImage;

const ON: u8 = 255;
const OFF: u8 = 0;

/// Number of bits needed to code `n` distinct values, `ceil(log2(n))`.
pub fn bits_required(n: u32) -> u32 {
    if n <= 1 {
        0
    } else {
        u32::BITS - (n - 1).leading_zeros()
    }
}

/// What each plane capture is compared against.
#[derive(Clone, Copy)]
enum Reference<'a> {
    Inverse(&'a [u8]),
    Albedo(&'a [i32]),
}

/// What a decoded value indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Granularity {
    /// Individual projector pixels along the coded axis.
    Pixel,
    /// `count` equal regions of `width` pixels each.
    Regions { count: u32, width: u32 },
}

/// Configuration derived by a successful setup.
#[derive(Debug, Clone)]
struct GrayCodeSetup {
    geometry: Geometry,
    display: DisplaySettings,
    use_inverted: bool,
    threshold: u32,
    granularity: Granularity,
    oversample: u32,
    /// Bit planes actually projected.
    pattern_count: u32,
    /// Bit planes needed to code every value.
    maximum_patterns: u32,
    maximum_disparity: u32,
    /// Centres the coded range inside `maximum_disparity` (pixel mode only).
    offset: u32,
    msb_pattern_value: u32,
}

impl GrayCodeSetup {
    /// Number of distinct values a pixel can decode to.
    fn code_count(&self) -> u32 {
        match self.granularity {
            Granularity::Pixel => self.geometry.resolution,
            Granularity::Regions { count, .. } => count,
        }
    }

    /// Binary code projected at each position of the coded axis.
    fn code_values(&self) -> Vec<u32> {
        (0..self.geometry.resolution)
            .map(|index| match self.granularity {
                Granularity::Pixel => index + self.offset,
                Granularity::Regions { width, .. } => index / width,
            })
            .collect()
    }

    fn total_pattern_count(&self) -> usize {
        if self.use_inverted {
            self.pattern_count as usize * 2
        } else {
            self.pattern_count as usize + 2
        }
    }
}

/// Binary-reflected Gray code codec.
///
/// Works either at projector pixel resolution or over a fixed number of
/// equal regions. Decoding compares each pattern against its inverse, or,
/// in albedo mode, against the midpoint of an all-white and an all-black
/// reference capture.
#[derive(Debug, Default)]
pub struct GrayCode {
    setup: Option<GrayCodeSetup>,
}

impl GrayCode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert binary value to Gray code.
    pub fn binary_to_gray(binary: u32) -> u32 {
        binary ^ (binary >> 1)
    }

    /// Convert Gray code back to binary.
    pub fn gray_to_binary(gray: u32) -> u32 {
        let mut binary = gray;
        let mut shift = 1;
        while shift < 32 {
            binary ^= binary >> shift;
            shift *= 2;
        }
        binary
    }

    pub fn maximum_patterns(&self) -> Option<u32> {
        self.setup.as_ref().map(|s| s.maximum_patterns)
    }

    pub fn maximum_disparity(&self) -> Option<u32> {
        self.setup.as_ref().map(|s| s.maximum_disparity)
    }

    pub fn offset(&self) -> Option<u32> {
        self.setup.as_ref().map(|s| s.offset)
    }

    /// Length of the coded axis in projector pixels.
    pub fn resolution(&self) -> Option<u32> {
        self.setup.as_ref().map(|s| s.geometry.resolution)
    }

    /// Region count in region mode, `None` in pixel mode or when not set up.
    pub fn region_count(&self) -> Option<u32> {
        match self.setup.as_ref()?.granularity {
            Granularity::Regions { count, .. } => Some(count),
            Granularity::Pixel => None,
        }
    }

    /// Binary bit planes over the coded axis, most significant first.
    fn binary_planes(setup: &GrayCodeSetup) -> Vec<Vec<bool>> {
        let codes = setup.code_values();
        (0..setup.pattern_count)
            .map(|plane| {
                let bit = setup.msb_pattern_value >> plane;
                codes.iter().map(|code| code & bit != 0).collect()
            })
            .collect()
    }

    /// `gray[i] = binary[i] XOR binary[i-1]`; the first plane is shared.
    fn gray_planes(binary: &[Vec<bool>]) -> Vec<Vec<bool>> {
        binary
            .iter()
            .enumerate()
            .map(|(plane, line)| {
                if plane == 0 {
                    line.clone()
                } else {
                    line.iter()
                        .zip(&binary[plane - 1])
                        .map(|(current, previous)| current ^ previous)
                        .collect()
                }
            })
            .collect()
    }
}

impl StructuredLightCodec for GrayCode {
    fn kind(&self) -> CodecKind {
        CodecKind::GrayCode
    }

    fn setup(&mut self, settings: &ParameterSet) -> Result<()> {
        self.setup = None;

        let mut issues = Vec::new();
        let geometry = Geometry::read(settings, &mut issues);
        let display = DisplaySettings::read(settings, &mut issues);
        let use_inverted = collect(&mut issues, settings.get_or(keys::USE_INVERTED_PATTERNS, true));
        let threshold = collect(
            &mut issues,
            settings.get_or(keys::PIXEL_THRESHOLD, parameters::DEFAULT_PIXEL_THRESHOLD),
        );
        let region_count = collect(&mut issues, settings.get_or(keys::REGION_COUNT, 0u32));
        let requested = collect(&mut issues, settings.get_or(keys::PATTERN_COUNT, 0u32));
        let oversample = read_oversample(settings, &mut issues);

        let (
            Some(geometry),
            Some(display),
            Some(use_inverted),
            Some(threshold),
            Some(region_count),
            Some(requested),
            Some(oversample),
        ) = (
            geometry,
            display,
            use_inverted,
            threshold,
            region_count,
            requested,
            oversample,
        )
        else {
            return Err(CodecError::collapse(issues));
        };

        if threshold > u8::MAX as u32 {
            log::warn!(
                "Pixel threshold {} exceeds 8-bit capture range, every pixel will be invalid",
                threshold
            );
        }

        let resolution = geometry.resolution;
        let granularity = if region_count == 0 {
            Granularity::Pixel
        } else if region_count < 2 || region_count > resolution {
            issues.push(CodecError::invalid_setting(
                keys::REGION_COUNT,
                format!("must be between 2 and {}, got {}", resolution, region_count),
            ));
            Granularity::Pixel
        } else {
            let width = (resolution as f64 / region_count as f64).round() as u32;
            if width * region_count != resolution {
                issues.push(CodecError::RegionsDoNotTile {
                    resolution,
                    regions: region_count,
                });
            }
            Granularity::Regions {
                count: region_count,
                width,
            }
        };

        let maximum_patterns = match granularity {
            Granularity::Pixel => bits_required(resolution),
            Granularity::Regions { count, .. } => bits_required(count),
        };
        let pattern_count = if requested == 0 {
            maximum_patterns
        } else {
            requested
        };
        if pattern_count > maximum_patterns {
            issues.push(CodecError::TooManyPatterns {
                requested: pattern_count,
                maximum: maximum_patterns,
            });
        }

        if !issues.is_empty() {
            return Err(CodecError::collapse(issues));
        }

        let maximum_disparity = 1u32 << maximum_patterns;
        let offset = match granularity {
            Granularity::Pixel => (maximum_disparity - resolution) / 2,
            Granularity::Regions { .. } => 0,
        };

        let setup = GrayCodeSetup {
            geometry,
            display,
            use_inverted,
            threshold,
            granularity,
            oversample,
            pattern_count,
            maximum_patterns,
            maximum_disparity,
            offset,
            msb_pattern_value: maximum_disparity / 2,
        };

        log::info!(
            "Gray code set up: {} {}x{}, {} of {} bit planes, {} patterns, offset {}, {}",
            geometry.orientation,
            geometry.columns,
            geometry.rows,
            pattern_count,
            maximum_patterns,
            setup.total_pattern_count(),
            offset,
            if use_inverted { "inverted decoding" } else { "albedo decoding" }
        );

        self.setup = Some(setup);
        Ok(())
    }

    fn get_setup(&self, settings: &mut ParameterSet) -> Result<()> {
        let setup = self.setup.as_ref().ok_or(CodecError::NotSetUp)?;

        setup.geometry.write(settings);
        setup.display.write(settings);
        settings.set(keys::USE_INVERTED_PATTERNS, setup.use_inverted);
        settings.set(keys::PIXEL_THRESHOLD, setup.threshold);
        settings.set(
            keys::REGION_COUNT,
            match setup.granularity {
                Granularity::Pixel => 0,
                Granularity::Regions { count, .. } => count,
            },
        );
        settings.set(keys::PATTERN_COUNT, setup.pattern_count);
        settings.set(keys::OVERSAMPLE, setup.oversample);
        Ok(())
    }

    fn is_setup(&self) -> bool {
        self.setup.is_some()
    }

    fn total_pattern_count(&self) -> usize {
        self.setup
            .as_ref()
            .map(GrayCodeSetup::total_pattern_count)
            .unwrap_or(0)
    }

    fn generate_pattern_sequence(&self) -> Result<PatternSequence> {
        let setup = self.setup.as_ref().ok_or(CodecError::NotSetUp)?;
        let geometry = &setup.geometry;
        let color = setup.display.color;

        let mut sequence = PatternSequence::with_capacity(setup.total_pattern_count());
        setup.display.write(&mut sequence.parameters);

        if !setup.use_inverted {
            let white = GrayImage::from_pixel(geometry.columns, geometry.rows, image::Luma([ON]));
            let black = GrayImage::from_pixel(geometry.columns, geometry.rows, image::Luma([OFF]));
            sequence.add(Pattern::image(color, BitDepth::Mono1, white))?;
            sequence.add(Pattern::image(color, BitDepth::Mono1, black))?;
        }

        let binary = Self::binary_planes(setup);
        for (plane, gray) in Self::gray_planes(&binary).iter().enumerate() {
            let line: Vec<u8> = gray.iter().map(|&bit| if bit { ON } else { OFF }).collect();
            let pattern = geometry.rasterize(&line);

            if setup.use_inverted {
                let mut inverse = pattern.clone();
                image::imageops::invert(&mut inverse);
                sequence.add(Pattern::image(color, BitDepth::Mono1, pattern))?;
                sequence.add(Pattern::image(color, BitDepth::Mono1, inverse))?;
            } else {
                sequence.add(Pattern::image(color, BitDepth::Mono1, pattern))?;
            }
            log::debug!("Generated Gray code plane {}", plane);
        }

        Ok(sequence)
    }

    fn decode_capture_sequence(&self, captures: &CaptureSequence) -> Result<DisparityMap> {
        let setup = self.setup.as_ref().ok_or(CodecError::NotSetUp)?;
        let frames = captures.frames(setup.total_pattern_count())?;
        let (width, height) = frames[0].dimensions();

        let mut map = DisparityMap::create(width, height, setup.geometry.orientation)?;
        let pixel_count = width as usize * height as usize;
        let threshold = setup.threshold.min(i32::MAX as u32) as i32;
        let mut accum = vec![0u32; pixel_count];

        // Albedo mode compares every plane against the reference midpoint.
        let albedo = if setup.use_inverted {
            None
        } else {
            let first = frames[0].as_raw();
            let second = frames[1].as_raw();
            let pixels = map.pixels_mut();
            let mut albedo = vec![0i32; pixel_count];
            for i in 0..pixel_count {
                let high = first[i].max(second[i]) as i32;
                let low = first[i].min(second[i]) as i32;
                albedo[i] = (high + low) / 2;
                if high - low < threshold {
                    pixels[i] = Disparity::Invalid;
                }
            }
            Some(albedo)
        };

        for plane in 0..setup.pattern_count as usize {
            let bit_value = setup.msb_pattern_value >> plane;
            let pixels = map.pixels_mut();

            let (normal, reference) = match &albedo {
                None => (
                    frames[2 * plane].as_raw(),
                    Reference::Inverse(frames[2 * plane + 1].as_raw()),
                ),
                Some(albedo) => (frames[2 + plane].as_raw(), Reference::Albedo(albedo)),
            };

            for i in 0..pixel_count {
                if pixels[i] == Disparity::Invalid {
                    continue;
                }

                let reference_value = match reference {
                    Reference::Inverse(inverse) => inverse[i] as i32,
                    Reference::Albedo(albedo) => albedo[i],
                };
                let difference = normal[i] as i32 - reference_value;

                if difference.abs() >= threshold {
                    let bit = if difference > 0 { bit_value } else { 0 };
                    accum[i] |= bit ^ ((accum[i] >> 1) & bit_value);
                } else {
                    pixels[i] = Disparity::Invalid;
                }
            }
            log::debug!("Decoded Gray code plane {}", plane);
        }

        let limit = setup.code_count() as i64;
        let offset = setup.offset as i64;
        // With fewer planes than needed the low bits are dropped, so the
        // first bucket can start below the offset.
        let quantized = setup.pattern_count < setup.maximum_patterns;
        for (pixel, &code) in map.pixels_mut().iter_mut().zip(&accum) {
            if *pixel == Disparity::Invalid {
                continue;
            }
            let code = code as i64;
            let value = if quantized {
                code.max(offset) - offset
            } else {
                code - offset
            };
            *pixel = if (0..limit).contains(&value) {
                Disparity::Valid(value as u32)
            } else {
                Disparity::Invalid
            };
        }

        if setup.oversample > 1 {
            map.oversample_and_smooth(setup.oversample)?;
        }

        log::info!(
            "Gray code decoded {} of {} pixels",
            map.valid_count(),
            pixel_count
        );
        Ok(map)
    }

    fn clear(&mut self) {
        self.setup = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disparity::Orientation;
    use crate::pattern::Capture;

    fn settings(columns: u32, rows: u32) -> ParameterSet {
        ParameterSet::new()
            .with(keys::COLUMNS, columns)
            .with(keys::ROWS, rows)
    }

    /// Feed generated patterns straight back as noise-free captures.
    fn loopback(codec: &GrayCode) -> CaptureSequence {
        codec
            .generate_pattern_sequence()
            .unwrap()
            .iter()
            .map(|pattern| pattern.as_image().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_gray_code_conversion() {
        // Test binary to gray and back
        for i in 0..256 {
            let gray = GrayCode::binary_to_gray(i);
            let back = GrayCode::gray_to_binary(gray);
            assert_eq!(i, back, "Failed for {}", i);
        }
    }

    #[test]
    fn test_bits_required() {
        assert_eq!(bits_required(1), 0);
        assert_eq!(bits_required(2), 1);
        assert_eq!(bits_required(255), 8);
        assert_eq!(bits_required(256), 8);
        assert_eq!(bits_required(257), 9);
        assert_eq!(bits_required(600), 10);
        assert_eq!(bits_required(1920), 11);
    }

    #[test]
    fn test_maximum_patterns_tracks_resolution() {
        for (columns, expected) in [(255, 8), (256, 8), (257, 9), (1024, 10), (1025, 11)] {
            let mut codec = GrayCode::new();
            codec.setup(&settings(columns, 4)).unwrap();
            assert_eq!(codec.maximum_patterns(), Some(expected), "columns {}", columns);
            assert_eq!(codec.maximum_disparity(), Some(1 << expected));
        }
    }

    #[test]
    fn test_offset_centres_code_range() {
        let mut codec = GrayCode::new();
        codec.setup(&settings(600, 4)).unwrap();
        assert_eq!(codec.offset(), Some((1024 - 600) / 2));

        codec.setup(&settings(512, 4)).unwrap();
        assert_eq!(codec.offset(), Some(0));
    }

    #[test]
    fn test_region_tiling() {
        let mut codec = GrayCode::new();
        let tiled = settings(600, 4).with(keys::REGION_COUNT, 120u32);
        codec.setup(&tiled).unwrap();
        assert_eq!(codec.region_count(), Some(120));
        assert_eq!(codec.maximum_patterns(), Some(7));
        assert_eq!(codec.offset(), Some(0));

        for regions in [7u32, 11, 601] {
            let untiled = settings(600, 4).with(keys::REGION_COUNT, regions);
            assert!(codec.setup(&untiled).is_err(), "{} regions accepted", regions);
            assert!(!codec.is_setup());
        }
        let untiled = settings(600, 4).with(keys::REGION_COUNT, 7u32);
        assert!(matches!(
            codec.setup(&untiled),
            Err(CodecError::RegionsDoNotTile { resolution: 600, regions: 7 })
        ));
    }

    #[test]
    fn test_too_many_patterns() {
        let mut codec = GrayCode::new();
        let request = settings(600, 4).with(keys::PATTERN_COUNT, 11u32);
        assert!(matches!(
            codec.setup(&request),
            Err(CodecError::TooManyPatterns { requested: 11, maximum: 10 })
        ));
    }

    #[test]
    fn test_setup_reports_all_problems() {
        let mut codec = GrayCode::new();
        let bad = ParameterSet::new()
            .with(keys::COLUMNS, 600u32)
            .with(keys::PIXEL_THRESHOLD, "high")
            .with(keys::USE_INVERTED_PATTERNS, "maybe");
        let err = codec.setup(&bad).unwrap_err();
        // rows missing, threshold and inverted flag unparseable
        assert_eq!(err.issues().len(), 3);
        assert!(!codec.is_setup());
    }

    #[test]
    fn test_not_set_up() {
        let codec = GrayCode::new();
        assert!(matches!(codec.generate_pattern_sequence(), Err(CodecError::NotSetUp)));
        assert!(matches!(
            codec.decode_capture_sequence(&CaptureSequence::new()),
            Err(CodecError::NotSetUp)
        ));
        assert!(matches!(
            codec.get_setup(&mut ParameterSet::new()),
            Err(CodecError::NotSetUp)
        ));
    }

    #[test]
    fn test_pattern_counts() {
        let mut codec = GrayCode::new();
        codec.setup(&settings(600, 4)).unwrap();
        assert_eq!(codec.total_pattern_count(), 20);

        codec
            .setup(&settings(600, 4).with(keys::USE_INVERTED_PATTERNS, false))
            .unwrap();
        assert_eq!(codec.total_pattern_count(), 12);

        codec
            .setup(&settings(600, 4).with(keys::PATTERN_COUNT, 4u32))
            .unwrap();
        assert_eq!(codec.total_pattern_count(), 8);
    }

    #[test]
    fn test_end_to_end_vertical_inverted() {
        let mut codec = GrayCode::new();
        codec
            .setup(
                &settings(600, 400)
                    .with(keys::ORIENTATION, "vertical")
                    .with(keys::USE_INVERTED_PATTERNS, true)
                    .with(keys::PIXEL_THRESHOLD, 5u32),
            )
            .unwrap();

        let sequence = codec.generate_pattern_sequence().unwrap();
        assert_eq!(sequence.len(), 20);

        let captures = loopback(&codec);
        let map = codec.decode_capture_sequence(&captures).unwrap();
        assert_eq!((map.columns(), map.rows()), (600, 400));
        assert_eq!(map.orientation(), Orientation::Vertical);

        for row in 0..400 {
            for column in 0..600 {
                assert_eq!(map.pixel(column, row), Disparity::Valid(column));
            }
        }
    }

    #[test]
    fn test_inverse_follows_each_pattern() {
        let mut codec = GrayCode::new();
        codec.setup(&settings(16, 2)).unwrap();
        let sequence = codec.generate_pattern_sequence().unwrap();

        for pair in 0..sequence.len() / 2 {
            let normal = sequence.get(2 * pair).unwrap().as_image().unwrap();
            let inverse = sequence.get(2 * pair + 1).unwrap().as_image().unwrap();
            for (a, b) in normal.as_raw().iter().zip(inverse.as_raw()) {
                assert_eq!(*a as u32 + *b as u32, 255);
            }
        }
    }

    #[test]
    fn test_round_trip_every_resolution() {
        for resolution in [2u32, 3, 5, 100, 255, 256, 257, 600, 1000] {
            for use_inverted in [true, false] {
                let mut codec = GrayCode::new();
                codec
                    .setup(
                        &settings(resolution, 1)
                            .with(keys::USE_INVERTED_PATTERNS, use_inverted)
                            .with(keys::PIXEL_THRESHOLD, 0u32),
                    )
                    .unwrap();
                let map = codec.decode_capture_sequence(&loopback(&codec)).unwrap();
                for column in 0..resolution {
                    assert_eq!(
                        map.pixel(column, 0),
                        Disparity::Valid(column),
                        "resolution {} inverted {}",
                        resolution,
                        use_inverted
                    );
                }
            }
        }
    }

    #[test]
    fn test_non_power_of_two_stays_in_range() {
        let mut codec = GrayCode::new();
        codec.setup(&settings(777, 3)).unwrap();
        let map = codec.decode_capture_sequence(&loopback(&codec)).unwrap();
        assert_eq!(map.invalid_count(), 0);
        assert!(map.pixels().iter().all(|d| matches!(d, Disparity::Valid(v) if *v < 777)));
    }

    #[test]
    fn test_albedo_sequence_starts_with_references() {
        let mut codec = GrayCode::new();
        codec
            .setup(&settings(32, 2).with(keys::USE_INVERTED_PATTERNS, false))
            .unwrap();
        let sequence = codec.generate_pattern_sequence().unwrap();
        let white = sequence.get(0).unwrap().as_image().unwrap();
        let black = sequence.get(1).unwrap().as_image().unwrap();
        assert!(white.as_raw().iter().all(|&v| v == 255));
        assert!(black.as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_albedo_shadow_is_invalid() {
        let mut codec = GrayCode::new();
        codec
            .setup(&settings(8, 1).with(keys::USE_INVERTED_PATTERNS, false))
            .unwrap();

        // Column 3 never sees the projector: flat mid grey in every frame.
        let captures: CaptureSequence = loopback(&codec)
            .frames(codec.total_pattern_count())
            .unwrap()
            .into_iter()
            .map(|frame| {
                let mut frame = frame.into_owned();
                frame.put_pixel(3, 0, image::Luma([128]));
                frame
            })
            .collect();

        let map = codec.decode_capture_sequence(&captures).unwrap();
        assert_eq!(map.pixel(3, 0), Disparity::Invalid);
        assert_eq!(map.pixel(2, 0), Disparity::Valid(2));
        assert_eq!(map.pixel(4, 0), Disparity::Valid(4));
    }

    #[test]
    fn test_invalid_is_never_revisited() {
        let mut codec = GrayCode::new();
        codec
            .setup(&settings(8, 1).with(keys::PIXEL_THRESHOLD, 20u32))
            .unwrap();

        let mut frames: Vec<GrayImage> = loopback(&codec)
            .frames(codec.total_pattern_count())
            .unwrap()
            .into_iter()
            .map(|frame| frame.into_owned())
            .collect();

        // Weak contrast on the first plane only; later planes are crisp.
        frames[0].put_pixel(5, 0, image::Luma([110]));
        frames[1].put_pixel(5, 0, image::Luma([100]));

        let captures: CaptureSequence = frames.into_iter().collect();
        let map = codec.decode_capture_sequence(&captures).unwrap();
        assert_eq!(map.pixel(5, 0), Disparity::Invalid);
        assert_eq!(map.valid_count(), 7);
    }

    #[test]
    fn test_region_mode_decodes_region_index() {
        let mut codec = GrayCode::new();
        codec
            .setup(&settings(600, 2).with(keys::REGION_COUNT, 120u32))
            .unwrap();
        assert_eq!(codec.total_pattern_count(), 14);

        let map = codec.decode_capture_sequence(&loopback(&codec)).unwrap();
        for column in 0..600 {
            assert_eq!(map.pixel(column, 1), Disparity::Valid(column / 5));
        }
    }

    #[test]
    fn test_horizontal_and_diamond_orientations() {
        let mut codec = GrayCode::new();
        codec
            .setup(&settings(6, 40).with(keys::ORIENTATION, "horizontal"))
            .unwrap();
        let map = codec.decode_capture_sequence(&loopback(&codec)).unwrap();
        assert_eq!(map.pixel(3, 17), Disparity::Valid(17));

        codec
            .setup(&settings(20, 10).with(keys::ORIENTATION, "diamond_angle_1"))
            .unwrap();
        assert_eq!(codec.resolution(), Some(25));
        let map = codec.decode_capture_sequence(&loopback(&codec)).unwrap();
        assert_eq!(map.pixel(7, 9), Disparity::Valid(4 + 7));

        codec
            .setup(&settings(20, 10).with(keys::ORIENTATION, "diamond_angle_2"))
            .unwrap();
        let map = codec.decode_capture_sequence(&loopback(&codec)).unwrap();
        assert_eq!(map.pixel(7, 0), Disparity::Valid(5 + 7));
        assert_eq!(map.pixel(7, 9), Disparity::Valid(7));
    }

    #[test]
    fn test_fewer_patterns_quantize() {
        let mut codec = GrayCode::new();
        codec
            .setup(&settings(256, 1).with(keys::PATTERN_COUNT, 4u32))
            .unwrap();
        let map = codec.decode_capture_sequence(&loopback(&codec)).unwrap();
        for column in 0..256 {
            assert_eq!(map.pixel(column, 0), Disparity::Valid(column & !0xF));
        }
    }

    #[test]
    fn test_fewer_patterns_with_offset_stay_valid() {
        let mut codec = GrayCode::new();
        codec
            .setup(&settings(600, 1).with(keys::PATTERN_COUNT, 4u32))
            .unwrap();
        assert_eq!(codec.offset(), Some(212));

        let map = codec.decode_capture_sequence(&loopback(&codec)).unwrap();
        assert_eq!(map.invalid_count(), 0);

        let values: Vec<u32> = (0..600).map(|c| map.pixel(c, 0).value().unwrap()).collect();
        assert_eq!(values[0], 0);
        assert_eq!(values[20], 0);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert!(values.iter().zip(0u32..).all(|(&v, column)| v <= column));
    }

    #[test]
    fn test_oversample_is_bounded() {
        let mut codec = GrayCode::new();
        let request = settings(64, 8).with(keys::OVERSAMPLE, 100_000_000u32);
        assert!(matches!(
            codec.setup(&request),
            Err(CodecError::InvalidSetting { .. })
        ));
        assert!(!codec.is_setup());
    }

    #[test]
    fn test_capture_errors_precede_decoding() {
        let mut codec = GrayCode::new();
        codec.setup(&settings(16, 2)).unwrap();

        let mut short = loopback(&codec).slice(0..7);
        assert!(matches!(
            codec.decode_capture_sequence(&short),
            Err(CodecError::CaptureCountMismatch { expected: 8, actual: 7 })
        ));

        short.add(Capture::file("/missing/frame.png"));
        assert!(matches!(
            codec.decode_capture_sequence(&short),
            Err(CodecError::UnreadableCapture { index: 7, .. })
        ));
    }

    #[test]
    fn test_oversampled_decode() {
        let mut codec = GrayCode::new();
        codec
            .setup(&settings(64, 8).with(keys::OVERSAMPLE, 2u32))
            .unwrap();
        let map = codec.decode_capture_sequence(&loopback(&codec)).unwrap();
        assert_eq!(map.oversample(), 2);
        assert_eq!(map.pixel(30, 4), Disparity::Valid(60));
    }

    #[test]
    fn test_get_setup_round_trip() {
        let mut codec = GrayCode::new();
        let original = settings(600, 400)
            .with(keys::REGION_COUNT, 120u32)
            .with(keys::PIXEL_THRESHOLD, 7u32);
        codec.setup(&original).unwrap();

        let mut active = ParameterSet::new();
        codec.get_setup(&mut active).unwrap();
        assert_eq!(active.get::<u32>(keys::PATTERN_COUNT).unwrap(), Some(7));
        assert_eq!(active.get::<String>(keys::ORIENTATION).unwrap().as_deref(), Some("vertical"));

        let mut again = GrayCode::new();
        again.setup(&active).unwrap();
        assert_eq!(again.total_pattern_count(), codec.total_pattern_count());
        assert_eq!(again.region_count(), Some(120));

        codec.clear();
        assert!(!codec.is_setup());
    }
}
