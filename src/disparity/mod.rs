//! Per-pixel correspondence maps produced by the codecs.

mod file;
mod smooth;

use crate::error::{CodecError, Result};
use crate::parameters::{FromParameter, ParameterValue};
use serde::{Deserialize, Serialize};

/// Decode state of a single camera pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disparity {
    /// Not decoded yet.
    #[default]
    Empty,
    /// Decoded but rejected by a threshold or range test.
    Invalid,
    /// Projector column/row (or region) index.
    Valid(u32),
}

impl Disparity {
    /// Wire value of [`Disparity::Empty`].
    pub const EMPTY_PIXEL: i32 = -1;
    /// Wire value of [`Disparity::Invalid`].
    pub const INVALID_PIXEL: i32 = 0xFFFF;

    pub fn is_valid(self) -> bool {
        matches!(self, Disparity::Valid(_))
    }

    pub fn value(self) -> Option<u32> {
        match self {
            Disparity::Valid(v) => Some(v),
            _ => None,
        }
    }

    /// Packed integer form using the sentinel values.
    ///
    /// Valid values that collide with a sentinel are not representable and
    /// are reported by [`DisparityMap::save`] before reaching this point.
    pub fn to_raw(self) -> i32 {
        match self {
            Disparity::Empty => Self::EMPTY_PIXEL,
            Disparity::Invalid => Self::INVALID_PIXEL,
            Disparity::Valid(v) => v as i32,
        }
    }

    pub fn from_raw(raw: i32) -> Self {
        match raw {
            Self::EMPTY_PIXEL => Disparity::Empty,
            Self::INVALID_PIXEL => Disparity::Invalid,
            v if v >= 0 => Disparity::Valid(v as u32),
            _ => Disparity::Invalid,
        }
    }
}

/// Direction the coded stripes run across the projector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// Stripes run vertically, code the column.
    Vertical,
    /// Stripes run horizontally, code the row.
    Horizontal,
    /// Diagonal mirror array, rows offset by half a column going down.
    DiamondAngle1,
    /// Diagonal mirror array, rows offset by half a column going up.
    DiamondAngle2,
    /// Not configured.
    #[default]
    Invalid,
}

impl Orientation {
    /// Length of the coded axis for a `columns x rows` projector.
    pub fn resolution(self, columns: u32, rows: u32) -> Option<u32> {
        match self {
            Orientation::Vertical => Some(columns),
            Orientation::Horizontal => Some(rows),
            Orientation::DiamondAngle1 | Orientation::DiamondAngle2 => Some(columns + rows / 2),
            Orientation::Invalid => None,
        }
    }

    /// Position along the coded axis of projector pixel (`column`, `row`).
    pub fn code_index(self, column: u32, row: u32, rows: u32) -> u32 {
        match self {
            Orientation::Vertical => column,
            Orientation::Horizontal => row,
            Orientation::DiamondAngle1 => row / 2 + column,
            Orientation::DiamondAngle2 => (rows - row) / 2 + column,
            Orientation::Invalid => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Orientation::Vertical => "vertical",
            Orientation::Horizontal => "horizontal",
            Orientation::DiamondAngle1 => "diamond_angle_1",
            Orientation::DiamondAngle2 => "diamond_angle_2",
            Orientation::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertical" => Ok(Orientation::Vertical),
            "horizontal" => Ok(Orientation::Horizontal),
            "diamond_angle_1" => Ok(Orientation::DiamondAngle1),
            "diamond_angle_2" => Ok(Orientation::DiamondAngle2),
            other => Err(format!("unknown orientation '{}'", other)),
        }
    }
}

impl FromParameter for Orientation {
    fn from_parameter(key: &str, value: &ParameterValue) -> Result<Self> {
        value
            .to_string()
            .parse()
            .map_err(|reason: String| CodecError::invalid_setting(key, reason))
    }
}

/// 2D grid of decoded disparities in camera space.
#[derive(Debug, Clone, PartialEq)]
pub struct DisparityMap {
    columns: u32,
    rows: u32,
    orientation: Orientation,
    oversample: u32,
    /// Row-major pixel states.
    data: Vec<Disparity>,
}

impl Default for DisparityMap {
    fn default() -> Self {
        Self {
            columns: 0,
            rows: 0,
            orientation: Orientation::Invalid,
            oversample: 1,
            data: Vec::new(),
        }
    }
}

impl DisparityMap {
    /// Create a map with every pixel [`Disparity::Empty`].
    pub fn create(columns: u32, rows: u32, orientation: Orientation) -> Result<Self> {
        Self::create_oversampled(columns, rows, orientation, 1)
    }

    pub fn create_oversampled(
        columns: u32,
        rows: u32,
        orientation: Orientation,
        oversample: u32,
    ) -> Result<Self> {
        if columns == 0 || rows == 0 {
            return Err(CodecError::invalid_setting(
                "columns",
                format!("map dimensions must be non-zero, got {}x{}", columns, rows),
            ));
        }
        if orientation == Orientation::Invalid {
            return Err(CodecError::invalid_setting(
                "orientation",
                "a map needs a valid orientation",
            ));
        }
        if oversample == 0 {
            return Err(CodecError::invalid_setting("oversample", "must be at least 1"));
        }

        Ok(Self {
            columns,
            rows,
            orientation,
            oversample,
            data: vec![Disparity::Empty; columns as usize * rows as usize],
        })
    }

    /// Rebuild a map from packed sentinel values.
    pub fn from_raw(
        columns: u32,
        rows: u32,
        orientation: Orientation,
        oversample: u32,
        raw: &[i32],
    ) -> Result<Self> {
        let mut map = Self::create_oversampled(columns, rows, orientation, oversample)?;
        if raw.len() != map.data.len() {
            return Err(CodecError::Serialization(format!(
                "expected {} pixels, got {}",
                map.data.len(),
                raw.len()
            )));
        }
        for (dst, &src) in map.data.iter_mut().zip(raw) {
            *dst = Disparity::from_raw(src);
        }
        Ok(map)
    }

    /// Release the pixel data and return to the uncreated state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_created(&self) -> bool {
        self.orientation != Orientation::Invalid && !self.data.is_empty()
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn oversample(&self) -> u32 {
        self.oversample
    }

    /// Bounds-checked read.
    pub fn get_pixel(&self, column: u32, row: u32) -> Result<Disparity> {
        let idx = self.checked_index(column, row)?;
        Ok(self.data[idx])
    }

    /// Bounds-checked write.
    pub fn set_pixel(&mut self, column: u32, row: u32, value: Disparity) -> Result<()> {
        let idx = self.checked_index(column, row)?;
        self.data[idx] = value;
        Ok(())
    }

    /// Unchecked read for decode loops. Panics when out of range.
    #[inline]
    pub fn pixel(&self, column: u32, row: u32) -> Disparity {
        self.data[(row * self.columns + column) as usize]
    }

    /// Unchecked write for decode loops. Panics when out of range.
    #[inline]
    pub fn put_pixel(&mut self, column: u32, row: u32, value: Disparity) {
        self.data[(row * self.columns + column) as usize] = value;
    }

    pub fn pixels(&self) -> &[Disparity] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [Disparity] {
        &mut self.data
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|d| d.is_valid()).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.data.iter().filter(|d| **d == Disparity::Invalid).count()
    }

    /// Largest valid value, if any pixel decoded.
    pub fn max_value(&self) -> Option<u32> {
        self.data.iter().filter_map(|d| d.value()).max()
    }

    /// Packed sentinel form of every pixel, row-major.
    pub fn to_raw(&self) -> Vec<i32> {
        self.data.iter().map(|d| d.to_raw()).collect()
    }

    fn checked_index(&self, column: u32, row: u32) -> Result<usize> {
        if !self.is_created() {
            return Err(CodecError::EmptyMap);
        }
        if column >= self.columns || row >= self.rows {
            return Err(CodecError::PixelOutOfBounds {
                column,
                row,
                columns: self.columns,
                rows: self.rows,
            });
        }
        Ok((row * self.columns + column) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert_eq!(Disparity::Empty.to_raw(), -1);
        assert_eq!(Disparity::Invalid.to_raw(), 0xFFFF);
        assert_eq!(Disparity::Valid(42).to_raw(), 42);

        assert_eq!(Disparity::from_raw(-1), Disparity::Empty);
        assert_eq!(Disparity::from_raw(0xFFFF), Disparity::Invalid);
        assert_eq!(Disparity::from_raw(0), Disparity::Valid(0));
        assert_eq!(Disparity::from_raw(-7), Disparity::Invalid);
    }

    #[test]
    fn test_uncreated_map() {
        let mut map = DisparityMap::default();
        assert!(!map.is_created());
        assert_eq!(map.orientation(), Orientation::Invalid);
        assert!(matches!(map.get_pixel(0, 0), Err(CodecError::EmptyMap)));
        assert!(matches!(
            map.set_pixel(0, 0, Disparity::Valid(1)),
            Err(CodecError::EmptyMap)
        ));
    }

    #[test]
    fn test_create_rejects_bad_arguments() {
        assert!(DisparityMap::create(0, 10, Orientation::Vertical).is_err());
        assert!(DisparityMap::create(10, 10, Orientation::Invalid).is_err());
        assert!(DisparityMap::create_oversampled(10, 10, Orientation::Vertical, 0).is_err());
    }

    #[test]
    fn test_pixel_access() {
        let mut map = DisparityMap::create(4, 3, Orientation::Horizontal).unwrap();
        assert_eq!(map.get_pixel(3, 2).unwrap(), Disparity::Empty);

        map.set_pixel(3, 2, Disparity::Valid(7)).unwrap();
        map.put_pixel(0, 1, Disparity::Invalid);
        assert_eq!(map.pixel(3, 2), Disparity::Valid(7));
        assert_eq!(map.get_pixel(0, 1).unwrap(), Disparity::Invalid);
        assert_eq!(map.valid_count(), 1);
        assert_eq!(map.invalid_count(), 1);

        assert!(matches!(
            map.get_pixel(4, 0),
            Err(CodecError::PixelOutOfBounds { column: 4, .. })
        ));
        assert!(map.set_pixel(0, 3, Disparity::Valid(1)).is_err());

        map.clear();
        assert!(!map.is_created());
    }

    #[test]
    fn test_raw_round_trip() {
        let mut map = DisparityMap::create(3, 1, Orientation::Vertical).unwrap();
        map.put_pixel(0, 0, Disparity::Valid(5));
        map.put_pixel(1, 0, Disparity::Invalid);
        let raw = map.to_raw();
        assert_eq!(raw, vec![5, 0xFFFF, -1]);

        let back = DisparityMap::from_raw(3, 1, Orientation::Vertical, 1, &raw).unwrap();
        assert_eq!(back, map);
        assert!(DisparityMap::from_raw(2, 1, Orientation::Vertical, 1, &raw).is_err());
    }

    #[test]
    fn test_code_index_mapping() {
        assert_eq!(Orientation::Vertical.code_index(5, 9, 10), 5);
        assert_eq!(Orientation::Horizontal.code_index(5, 9, 10), 9);
        assert_eq!(Orientation::DiamondAngle1.code_index(5, 9, 10), 4 + 5);
        assert_eq!(Orientation::DiamondAngle2.code_index(5, 9, 10), 0 + 5);
        assert_eq!(Orientation::DiamondAngle2.code_index(5, 0, 10), 5 + 5);

        assert_eq!(Orientation::Vertical.resolution(912, 1140), Some(912));
        assert_eq!(Orientation::DiamondAngle1.resolution(608, 684), Some(608 + 342));
        assert_eq!(Orientation::Invalid.resolution(608, 684), None);
    }

    #[test]
    fn test_orientation_parse() {
        assert_eq!("Vertical".parse::<Orientation>(), Ok(Orientation::Vertical));
        assert_eq!(
            "diamond_angle_2".parse::<Orientation>(),
            Ok(Orientation::DiamondAngle2)
        );
        assert!("sideways".parse::<Orientation>().is_err());
        assert_eq!(Orientation::DiamondAngle1.to_string(), "diamond_angle_1");
    }
}
