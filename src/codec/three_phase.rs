//! Three-phase sinusoidal codec with Gray code assisted unwrapping.

use super::{
    read_oversample, CodecKind, DisplaySettings, Geometry, GrayCode, StructuredLightCodec,
};
use crate::disparity::{Disparity, DisparityMap};
use crate::error::{CodecError, Result};
use crate::parameters::{self, collect, keys, ParameterSet};
use crate::pattern::{BitDepth, CaptureSequence, Pattern, PatternSequence};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

const DEFAULT_BIT_DEPTH: u32 = 8;
const DEFAULT_PIXELS_PER_PERIOD: u32 = 32;

/// Phase shift of each sinusoid, in projection order.
const PHASE_SHIFTS: [f64; 3] = [0.0, TAU / 3.0, -TAU / 3.0];

/// Gray code regions per half period.
const REGIONS_PER_PHASE: u32 = 4;

#[derive(Debug, Clone)]
struct ThreePhaseSetup {
    geometry: Geometry,
    display: DisplaySettings,
    threshold: u32,
    bit_depth: BitDepth,
    pixels_per_period: u32,
    repeat_phases: u32,
    oversample: u32,
    /// Whole periods across the coded axis.
    frequency: u32,
    /// Half periods across the coded axis; one wrap of the decoded phase each.
    phase_counts: u32,
}

impl ThreePhaseSetup {
    fn sinusoid_count(&self) -> usize {
        PHASE_SHIFTS.len() * self.repeat_phases as usize
    }

    /// Projector pixels covered by one half period.
    fn phase_width(&self) -> u32 {
        self.geometry.resolution / self.phase_counts
    }

    /// Settings for the coarse codec: one region per quarter of a half period.
    fn coarse_settings(&self) -> ParameterSet {
        let mut settings = ParameterSet::new();
        self.geometry.write(&mut settings);
        self.display.write(&mut settings);
        settings.set(keys::PIXEL_THRESHOLD, self.threshold);
        settings.set(keys::USE_INVERTED_PATTERNS, true);
        settings.set(keys::REGION_COUNT, REGIONS_PER_PHASE * self.phase_counts);
        settings
    }
}

/// Correct a coarse region index sitting on a half-period boundary.
///
/// The sign of the phase tells which side of the wrap the pixel really lies
/// on. This is a heuristic and can still misplace pixels whose region is
/// off by more than one.
fn correct_region(region: i64, phase: f64) -> i64 {
    match (region + 1) % REGIONS_PER_PHASE as i64 {
        0 if phase < 0.0 => region + 1,
        1 if phase > 0.0 => region - 1,
        _ => region,
    }
}

/// Wrapped phase in half periods, from the three phase intensities.
fn wrapped_phase(zero: f64, plus: f64, minus: f64) -> f64 {
    let numerator = 3f64.sqrt() * (minus - plus);
    let denominator = 2.0 * zero - minus - plus;
    (numerator / denominator).atan() / PI
}

/// Three sinusoids shifted by a third of a period each, followed by a Gray
/// code sequence that identifies the half period every pixel lies in.
#[derive(Debug, Default)]
pub struct ThreePhase {
    setup: Option<ThreePhaseSetup>,
    coarse: GrayCode,
}

impl ThreePhase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frequency(&self) -> Option<u32> {
        self.setup.as_ref().map(|s| s.frequency)
    }

    pub fn phase_counts(&self) -> Option<u32> {
        self.setup.as_ref().map(|s| s.phase_counts)
    }

    /// The embedded codec used for coarse unwrapping.
    pub fn coarse_codec(&self) -> &GrayCode {
        &self.coarse
    }

    /// One line of a sinusoid over the coded axis.
    ///
    /// Samples sit a quarter pixel into each pixel so no pixel lands exactly
    /// on a phase wrap.
    fn sinusoid_line(setup: &ThreePhaseSetup, shift: f64) -> Vec<u8> {
        let max = setup.bit_depth.max_intensity() as f64;
        let half = max / 2.0;
        let period = setup.pixels_per_period as f64;

        (0..setup.geometry.resolution)
            .map(|index| {
                let theta = TAU * (index as f64 + 0.25) / period - FRAC_PI_2 + shift;
                (half + half * theta.cos()).round().clamp(0.0, max) as u8
            })
            .collect()
    }
}

impl StructuredLightCodec for ThreePhase {
    fn kind(&self) -> CodecKind {
        CodecKind::ThreePhase
    }

    fn setup(&mut self, settings: &ParameterSet) -> Result<()> {
        self.setup = None;
        self.coarse.clear();

        let mut issues = Vec::new();
        let geometry = Geometry::read(settings, &mut issues);
        let display = DisplaySettings::read(settings, &mut issues);
        let threshold = collect(
            &mut issues,
            settings.get_or(keys::PIXEL_THRESHOLD, parameters::DEFAULT_PIXEL_THRESHOLD),
        );
        let bit_depth = collect(
            &mut issues,
            settings
                .get_or(keys::BIT_DEPTH, DEFAULT_BIT_DEPTH)
                .and_then(|bits| match bits {
                    5..=8 => BitDepth::from_bits(bits),
                    _ => Err(CodecError::InvalidBitDepth(bits)),
                }),
        );
        let pixels_per_period = collect(
            &mut issues,
            settings
                .get_or(keys::PIXELS_PER_PERIOD, DEFAULT_PIXELS_PER_PERIOD)
                .and_then(|ppp| {
                    if ppp == 0 || ppp % 8 != 0 {
                        Err(CodecError::InvalidPixelsPerPeriod(ppp))
                    } else {
                        Ok(ppp)
                    }
                }),
        );
        let repeat_phases = collect(&mut issues, settings.get_or(keys::REPEAT_PHASES, 1u32));
        let oversample = read_oversample(settings, &mut issues);

        if repeat_phases == Some(0) {
            issues.push(CodecError::invalid_setting(keys::REPEAT_PHASES, "must be at least 1"));
        }
        if let (Some(geometry), Some(ppp)) = (&geometry, pixels_per_period) {
            if geometry.resolution % ppp != 0 {
                issues.push(CodecError::invalid_setting(
                    keys::PIXELS_PER_PERIOD,
                    format!(
                        "{} does not divide the coded resolution {}",
                        ppp, geometry.resolution
                    ),
                ));
            }
        }

        let (
            Some(geometry),
            Some(display),
            Some(threshold),
            Some(bit_depth),
            Some(pixels_per_period),
            Some(repeat_phases),
            Some(oversample),
        ) = (
            geometry,
            display,
            threshold,
            bit_depth,
            pixels_per_period,
            repeat_phases,
            oversample,
        )
        else {
            return Err(CodecError::collapse(issues));
        };
        if !issues.is_empty() {
            return Err(CodecError::collapse(issues));
        }

        let frequency = geometry.resolution / pixels_per_period;
        let setup = ThreePhaseSetup {
            geometry,
            display,
            threshold,
            bit_depth,
            pixels_per_period,
            repeat_phases,
            oversample,
            frequency,
            phase_counts: 2 * frequency,
        };

        self.coarse.setup(&setup.coarse_settings())?;

        log::info!(
            "Three phase set up: {} {}x{}, {} periods of {} pixels, {} bit, {} repeats, {} patterns",
            geometry.orientation,
            geometry.columns,
            geometry.rows,
            frequency,
            pixels_per_period,
            bit_depth.bits(),
            repeat_phases,
            setup.sinusoid_count() + self.coarse.total_pattern_count()
        );

        self.setup = Some(setup);
        Ok(())
    }

    fn get_setup(&self, settings: &mut ParameterSet) -> Result<()> {
        let setup = self.setup.as_ref().ok_or(CodecError::NotSetUp)?;

        setup.geometry.write(settings);
        setup.display.write(settings);
        settings.set(keys::PIXEL_THRESHOLD, setup.threshold);
        settings.set(keys::BIT_DEPTH, setup.bit_depth.bits());
        settings.set(keys::PIXELS_PER_PERIOD, setup.pixels_per_period);
        settings.set(keys::REPEAT_PHASES, setup.repeat_phases);
        settings.set(keys::OVERSAMPLE, setup.oversample);
        Ok(())
    }

    fn is_setup(&self) -> bool {
        self.setup.is_some()
    }

    fn total_pattern_count(&self) -> usize {
        match &self.setup {
            Some(setup) => setup.sinusoid_count() + self.coarse.total_pattern_count(),
            None => 0,
        }
    }

    fn generate_pattern_sequence(&self) -> Result<PatternSequence> {
        let setup = self.setup.as_ref().ok_or(CodecError::NotSetUp)?;

        let mut sequence = PatternSequence::with_capacity(self.total_pattern_count());
        setup.display.write(&mut sequence.parameters);

        for shift in PHASE_SHIFTS {
            let raster = setup.geometry.rasterize(&Self::sinusoid_line(setup, shift));
            for _ in 0..setup.repeat_phases {
                sequence.add(Pattern::image(
                    setup.display.color,
                    setup.bit_depth,
                    raster.clone(),
                ))?;
            }
        }

        sequence.append(self.coarse.generate_pattern_sequence()?);
        Ok(sequence)
    }

    fn decode_capture_sequence(&self, captures: &CaptureSequence) -> Result<DisparityMap> {
        let setup = self.setup.as_ref().ok_or(CodecError::NotSetUp)?;

        // Every frame is resolved and size-checked before any pixel work, so
        // reported capture indices refer to the caller's sequence.
        let expected = self.total_pattern_count();
        let frames = captures.frames(expected)?;
        let sinusoids = setup.sinusoid_count();
        let (width, height) = frames[0].dimensions();

        let coarse_captures: CaptureSequence = frames[sinusoids..]
            .iter()
            .map(|frame| frame.clone().into_owned())
            .collect();
        let coarse = self.coarse.decode_capture_sequence(&coarse_captures)?;
        let frames = &frames[..sinusoids];

        let mut map = DisparityMap::create_oversampled(
            width,
            height,
            setup.geometry.orientation,
            setup.oversample,
        )?;

        let repeats = setup.repeat_phases as usize;
        let oversample = setup.oversample as f64;
        let phase_width = setup.phase_width() as f64;
        let period_step = setup.oversample as i64 * setup.phase_width() as i64;
        let limit = setup.oversample as i64 * setup.geometry.resolution as i64;

        let mean = |phase: usize, pixel: usize| -> f64 {
            let runs = &frames[phase * repeats..(phase + 1) * repeats];
            runs.iter().map(|f| f.as_raw()[pixel] as f64).sum::<f64>() / repeats as f64
        };

        for (pixel, (out, region)) in map
            .pixels_mut()
            .iter_mut()
            .zip(coarse.pixels())
            .enumerate()
        {
            let Disparity::Valid(region) = *region else {
                *out = Disparity::Invalid;
                continue;
            };

            let phase = wrapped_phase(mean(0, pixel), mean(1, pixel), mean(2, pixel));
            if !(phase > -0.5 && phase < 0.5) {
                *out = Disparity::Invalid;
                continue;
            }

            let fine = (oversample * (phase + 0.5) * phase_width).round() as i64;
            let period = correct_region(region as i64, phase) / REGIONS_PER_PHASE as i64;
            let value = period
                .checked_mul(period_step)
                .and_then(|offset| offset.checked_add(fine));

            *out = match value {
                Some(value) if (0..limit).contains(&value) => Disparity::Valid(value as u32),
                _ => Disparity::Invalid,
            };
        }

        log::info!(
            "Three phase decoded {} of {} pixels ({} coarse)",
            map.valid_count(),
            map.pixels().len(),
            coarse.valid_count()
        );
        Ok(map)
    }

    fn clear(&mut self) {
        self.setup = None;
        self.coarse.clear();
    }
}
