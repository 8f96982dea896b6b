//! Scan configuration and serialization.

use crate::codec::{create_codec, CodecKind, StructuredLightCodec};
use crate::parameters::{keys, ParameterSet};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A named codec choice plus its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Scan name.
    pub name: String,
    /// Codec family.
    pub codec: CodecKind,
    /// Codec settings, see [`crate::parameters::keys`].
    #[serde(default)]
    pub settings: ParameterSet,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            name: "New Scan".to_string(),
            codec: CodecKind::GrayCode,
            settings: ParameterSet::new(),
        }
    }
}

/// On-disk format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Xml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Self {
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            ConfigFormat::Json
        } else {
            ConfigFormat::Xml
        }
    }
}

impl ScanConfig {
    /// Config for `kind` on a projector of the given size with every
    /// setting spelled out at its default.
    pub fn defaults(kind: CodecKind, columns: u32, rows: u32) -> crate::Result<Self> {
        let mut codec = kind.create();
        let mut base = ParameterSet::new()
            .with(keys::COLUMNS, columns)
            .with(keys::ROWS, rows);
        // The default period does not tile arbitrary resolutions; pick one
        // that does when possible.
        if kind == CodecKind::ThreePhase {
            if let Some(ppp) = [32u32, 40, 48, 64, 24, 16, 8]
                .into_iter()
                .find(|ppp| columns % ppp == 0)
            {
                base.set(keys::PIXELS_PER_PERIOD, ppp);
            }
        }
        codec.setup(&base)?;

        let mut settings = ParameterSet::new();
        codec.get_setup(&mut settings)?;
        Ok(Self {
            name: format!("{} {}x{}", kind, columns, rows),
            codec: kind,
            settings,
        })
    }

    /// Create and set up the configured codec.
    pub fn codec(&self) -> crate::Result<Box<dyn StructuredLightCodec>> {
        create_codec(self.codec, &self.settings)
    }

    /// Save as JSON or XML depending on the extension.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = match ConfigFormat::from_path(path) {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Xml => quick_xml::se::to_string(self)?,
        };
        std::fs::write(path, contents)?;
        log::info!("Saved scan config to {:?}", path);
        Ok(())
    }

    /// Load a config written by [`ScanConfig::save`].
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = match ConfigFormat::from_path(path) {
            ConfigFormat::Json => serde_json::from_str(&contents)?,
            ConfigFormat::Xml => quick_xml::de::from_str(&contents)?,
        };
        log::info!("Loaded scan config '{}' from {:?}", config.name, path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScanConfig {
        ScanConfig {
            name: "bench".to_string(),
            codec: CodecKind::ThreePhase,
            settings: ParameterSet::new()
                .with(keys::COLUMNS, 640u32)
                .with(keys::ROWS, 480u32)
                .with(keys::PIXELS_PER_PERIOD, 64u32)
                .with(keys::ORIENTATION, "vertical")
                .with(keys::USE_INVERTED_PATTERNS, true),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        let config = sample();
        config.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("ThreePhase"));
        assert_eq!(ScanConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_xml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.xml");
        let config = sample();
        config.save(&path).unwrap();

        let loaded = ScanConfig::load(&path).unwrap();
        assert_eq!(loaded.name, "bench");
        assert_eq!(loaded.codec, CodecKind::ThreePhase);
        assert_eq!(loaded.settings.get::<u32>(keys::COLUMNS).unwrap(), Some(640));
        assert_eq!(
            loaded.settings.get::<String>(keys::ORIENTATION).unwrap().as_deref(),
            Some("vertical")
        );
        assert!(loaded.codec().unwrap().is_setup());
    }

    #[test]
    fn test_defaults_fill_every_key() {
        let config = ScanConfig::defaults(CodecKind::GrayCode, 1024, 768).unwrap();
        for key in [
            keys::ORIENTATION,
            keys::USE_INVERTED_PATTERNS,
            keys::PIXEL_THRESHOLD,
            keys::REGION_COUNT,
            keys::PATTERN_COUNT,
            keys::EXPOSURE_US,
        ] {
            assert!(config.settings.contains(key), "missing {}", key);
        }
        assert_eq!(config.settings.get::<u32>(keys::PATTERN_COUNT).unwrap(), Some(10));

        let three_phase = ScanConfig::defaults(CodecKind::ThreePhase, 600, 400).unwrap();
        assert_eq!(
            three_phase.settings.get::<u32>(keys::PIXELS_PER_PERIOD).unwrap(),
            Some(40)
        );
        assert_eq!(three_phase.codec().unwrap().total_pattern_count(), 17);
    }

    #[test]
    fn test_missing_file() {
        assert!(ScanConfig::load(Path::new("/no/such/scan.json")).is_err());
    }
}
