//! String-keyed settings bag consumed by codec setup.
//!
//! Values are typed, but every typed read also accepts a string encoding so
//! bags loaded from hand-written config files behave the same as bags built
//! in code.

use crate::error::{CodecError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Setting names recognized by the codecs, with their defaults.
pub mod keys {
    /// Stripe orientation: `vertical`, `horizontal`, `diamond_angle_1`,
    /// `diamond_angle_2`. Default `vertical`.
    pub const ORIENTATION: &str = "orientation";
    /// Projector columns. Required.
    pub const COLUMNS: &str = "columns";
    /// Projector rows. Required.
    pub const ROWS: &str = "rows";
    /// Decode against inverted patterns instead of an albedo threshold.
    /// Default `true`.
    pub const USE_INVERTED_PATTERNS: &str = "use_inverted_patterns";
    /// Minimum intensity difference for a bit to be trusted. Default 10.
    pub const PIXEL_THRESHOLD: &str = "pixel_threshold";
    /// Number of equal regions to code instead of single pixels. Default 0
    /// (pixel mode).
    pub const REGION_COUNT: &str = "region_count";
    /// Number of Gray code bit planes to project. Default 0 (all of them).
    pub const PATTERN_COUNT: &str = "pattern_count";
    /// Disparity oversampling factor. Default 1.
    pub const OVERSAMPLE: &str = "oversample";
    /// Color the projector should use for patterns. Default `white`.
    pub const PATTERN_COLOR: &str = "pattern_color";
    /// Pattern exposure in microseconds. Default 16667.
    pub const EXPOSURE_US: &str = "exposure_us";
    /// Pattern period in microseconds. Default 16667.
    pub const PERIOD_US: &str = "period_us";
    /// Bits per pixel of sinusoidal patterns (5..=8). Default 8.
    pub const BIT_DEPTH: &str = "bit_depth";
    /// Projector pixels per sinusoid period, multiple of 8. Default 32.
    pub const PIXELS_PER_PERIOD: &str = "pixels_per_period";
    /// Captures per sinusoidal phase, averaged on decode. Default 1.
    pub const REPEAT_PHASES: &str = "repeat_phases";
}

pub const DEFAULT_PIXEL_THRESHOLD: u32 = 10;
pub const DEFAULT_EXPOSURE_US: u32 = 16667;
pub const DEFAULT_PERIOD_US: u32 = 16667;
/// Largest accepted `oversample` factor.
pub const MAX_OVERSAMPLE: u32 = 16;

/// Parameter value types supported by the settings bag
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

/// Helper struct for ParameterValue serialization (quick-xml compatible)
#[derive(Serialize, Deserialize)]
struct ParameterValueHelper {
    #[serde(rename = "type")]
    value_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    int_val: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    float_val: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bool_val: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string_val: Option<String>,
}

impl ParameterValueHelper {
    fn empty(value_type: &str) -> Self {
        Self {
            value_type: value_type.to_string(),
            int_val: None,
            float_val: None,
            bool_val: None,
            string_val: None,
        }
    }
}

impl Serialize for ParameterValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let helper = match self {
            ParameterValue::Int(v) => ParameterValueHelper {
                int_val: Some(*v),
                ..ParameterValueHelper::empty("Int")
            },
            ParameterValue::Float(v) => ParameterValueHelper {
                float_val: Some(*v),
                ..ParameterValueHelper::empty("Float")
            },
            ParameterValue::Bool(v) => ParameterValueHelper {
                bool_val: Some(*v),
                ..ParameterValueHelper::empty("Bool")
            },
            ParameterValue::String(v) => ParameterValueHelper {
                string_val: Some(v.clone()),
                ..ParameterValueHelper::empty("String")
            },
        };
        helper.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ParameterValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let helper = ParameterValueHelper::deserialize(deserializer)?;
        match helper.value_type.as_str() {
            "Int" => Ok(ParameterValue::Int(helper.int_val.unwrap_or(0))),
            "Float" => Ok(ParameterValue::Float(helper.float_val.unwrap_or(0.0))),
            "Bool" => Ok(ParameterValue::Bool(helper.bool_val.unwrap_or(false))),
            "String" => Ok(ParameterValue::String(helper.string_val.unwrap_or_default())),
            other => Err(serde::de::Error::custom(format!(
                "unknown parameter type '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        ParameterValue::Int(v as i64)
    }
}

impl From<u32> for ParameterValue {
    fn from(v: u32) -> Self {
        ParameterValue::Int(v as i64)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::String(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        ParameterValue::String(v)
    }
}

/// Conversion from a stored parameter into a typed setting.
pub trait FromParameter: Sized {
    fn from_parameter(key: &str, value: &ParameterValue) -> Result<Self>;
}

impl FromParameter for i64 {
    fn from_parameter(key: &str, value: &ParameterValue) -> Result<Self> {
        match value {
            ParameterValue::Int(v) => Ok(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Ok(*v as i64),
            ParameterValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| CodecError::invalid_setting(key, format!("'{}' is not an integer", s))),
            other => Err(CodecError::invalid_setting(
                key,
                format!("expected an integer, got {}", other),
            )),
        }
    }
}

impl FromParameter for u32 {
    fn from_parameter(key: &str, value: &ParameterValue) -> Result<Self> {
        let v = i64::from_parameter(key, value)?;
        u32::try_from(v)
            .map_err(|_| CodecError::invalid_setting(key, format!("{} is out of range", v)))
    }
}

impl FromParameter for f64 {
    fn from_parameter(key: &str, value: &ParameterValue) -> Result<Self> {
        match value {
            ParameterValue::Float(v) => Ok(*v),
            ParameterValue::Int(v) => Ok(*v as f64),
            ParameterValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| CodecError::invalid_setting(key, format!("'{}' is not a number", s))),
            other => Err(CodecError::invalid_setting(
                key,
                format!("expected a number, got {}", other),
            )),
        }
    }
}

impl FromParameter for bool {
    fn from_parameter(key: &str, value: &ParameterValue) -> Result<Self> {
        match value {
            ParameterValue::Bool(v) => Ok(*v),
            ParameterValue::Int(0) => Ok(false),
            ParameterValue::Int(1) => Ok(true),
            ParameterValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(CodecError::invalid_setting(key, format!("'{}' is not a boolean", s))),
            },
            other => Err(CodecError::invalid_setting(
                key,
                format!("expected a boolean, got {}", other),
            )),
        }
    }
}

impl FromParameter for String {
    fn from_parameter(_key: &str, value: &ParameterValue) -> Result<Self> {
        Ok(value.to_string())
    }
}

/// A generic name/value store used to configure codecs and annotate
/// pattern sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParameterList", into = "ParameterList")]
pub struct ParameterSet {
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<ParameterValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<ParameterValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<ParameterValue> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&ParameterValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy every entry of `other` into this set, replacing existing keys.
    pub fn merge(&mut self, other: &ParameterSet) {
        for (key, value) in other.iter() {
            self.values.insert(key.to_string(), value.clone());
        }
    }

    /// Typed read. `Ok(None)` when the key is absent.
    pub fn get<T: FromParameter>(&self, key: &str) -> Result<Option<T>> {
        self.values
            .get(key)
            .map(|value| T::from_parameter(key, value))
            .transpose()
    }

    /// Typed read falling back to `default` when the key is absent.
    pub fn get_or<T: FromParameter>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Typed read of a setting that has no default.
    pub fn require<T: FromParameter>(&self, key: &'static str) -> Result<T> {
        self.get(key)?.ok_or(CodecError::MissingSetting(key))
    }
}

/// Record `result`'s error in `issues` and hand back the value, if any.
///
/// Lets setup routines read every setting before reporting all problems at
/// once.
pub(crate) fn collect<T>(issues: &mut Vec<CodecError>, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            issues.push(e);
            None
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ParameterEntry {
    name: String,
    value: ParameterValue,
}

#[derive(Serialize, Deserialize, Default)]
struct ParameterList {
    #[serde(default, rename = "parameter")]
    parameters: Vec<ParameterEntry>,
}

impl From<ParameterList> for ParameterSet {
    fn from(list: ParameterList) -> Self {
        Self {
            values: list
                .parameters
                .into_iter()
                .map(|entry| (entry.name, entry.value))
                .collect(),
        }
    }
}

impl From<ParameterSet> for ParameterList {
    fn from(set: ParameterSet) -> Self {
        Self {
            parameters: set
                .values
                .into_iter()
                .map(|(name, value)| ParameterEntry { name, value })
                .collect(),
        }
    }
}
