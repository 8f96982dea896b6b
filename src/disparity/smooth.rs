//! Edge-preserving oversampling of disparity maps.

use super::{Disparity, DisparityMap};
use crate::error::{CodecError, Result};
use crate::parameters::{keys, MAX_OVERSAMPLE};

impl DisparityMap {
    /// Scale every valid pixel by `factor` and smooth with a bilateral filter.
    ///
    /// The window radius and spatial sigma equal `factor`, the range sigma is
    /// `2 * factor` in oversampled units, so neighbouring codes one step
    /// apart blend while depth edges spanning many codes do not. Only valid
    /// pixels contribute and only valid pixels are rewritten. A factor of 1
    /// leaves the map untouched.
    pub fn oversample_and_smooth(&mut self, factor: u32) -> Result<()> {
        if !self.is_created() {
            return Err(CodecError::EmptyMap);
        }
        if factor == 0 || factor > MAX_OVERSAMPLE {
            return Err(CodecError::invalid_setting(
                keys::OVERSAMPLE,
                format!("must be between 1 and {}, got {}", MAX_OVERSAMPLE, factor),
            ));
        }
        if factor == 1 {
            return Ok(());
        }

        let scaled = self
            .data
            .iter()
            .map(|d| match d {
                Disparity::Valid(v) => v
                    .checked_mul(factor)
                    .map(|s| Some(s as f64))
                    .ok_or(CodecError::UnrepresentableValue(*v)),
                _ => Ok(None),
            })
            .collect::<Result<Vec<Option<f64>>>>()?;

        let radius = factor as i64;
        let sigma_space = factor as f64;
        let sigma_range = 2.0 * factor as f64;
        let range_denominator = 2.0 * sigma_range * sigma_range;

        let side = (2 * radius + 1) as usize;
        let mut spatial = Vec::with_capacity(side * side);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let d2 = (dx * dx + dy * dy) as f64;
                spatial.push((-d2 / (2.0 * sigma_space * sigma_space)).exp());
            }
        }

        let columns = self.columns as i64;
        let rows = self.rows as i64;

        for row in 0..rows {
            for column in 0..columns {
                let idx = (row * columns + column) as usize;
                let center = match scaled[idx] {
                    Some(v) => v,
                    None => continue,
                };

                let mut weighted_sum = 0.0;
                let mut weight_total = 0.0;

                for dy in -radius..=radius {
                    let y = row + dy;
                    if y < 0 || y >= rows {
                        continue;
                    }
                    for dx in -radius..=radius {
                        let x = column + dx;
                        if x < 0 || x >= columns {
                            continue;
                        }
                        let neighbour = match scaled[(y * columns + x) as usize] {
                            Some(v) => v,
                            None => continue,
                        };
                        let diff = neighbour - center;
                        let k = ((dy + radius) as usize) * side + (dx + radius) as usize;
                        let weight = spatial[k] * (-(diff * diff) / range_denominator).exp();
                        weighted_sum += weight * neighbour;
                        weight_total += weight;
                    }
                }

                // The centre always contributes weight 1, so the total is positive.
                self.data[idx] = Disparity::Valid((weighted_sum / weight_total).round() as u32);
            }
        }

        self.oversample *= factor;
        Ok(())
    }
}
