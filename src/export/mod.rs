//! Export of pattern sequences and disparity maps, and capture import.

use crate::disparity::{Disparity, DisparityMap};
use crate::pattern::{Capture, CaptureSequence, PatternData, PatternSequence};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Image extensions picked up when loading a capture directory.
const CAPTURE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Export scan data to image files.
pub struct ScanExporter;

impl ScanExporter {
    /// Write every pattern of a sequence to `output_dir` as `pattern_NNN.*`.
    ///
    /// Rasters become PNGs, file patterns are copied and parameter patterns
    /// are written as JSON. Returns the written paths in sequence order.
    pub fn export_patterns(
        sequence: &PatternSequence,
        output_dir: &Path,
    ) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(output_dir)?;

        let mut written = Vec::with_capacity(sequence.len());
        for (i, pattern) in sequence.iter().enumerate() {
            let path = match &pattern.data {
                PatternData::Image(image) => {
                    let path = output_dir.join(format!("pattern_{:03}.png", i));
                    image
                        .save(&path)
                        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                    path
                }
                PatternData::File(source) => {
                    let extension = source
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("png");
                    let path = output_dir.join(format!("pattern_{:03}.{}", i, extension));
                    std::fs::copy(source, &path)?;
                    path
                }
                PatternData::Parameters(parameters) => {
                    let path = output_dir.join(format!("pattern_{:03}.json", i));
                    let json = serde_json::to_string_pretty(parameters)
                        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                    std::fs::write(&path, json)?;
                    path
                }
            };
            written.push(path);
        }

        log::info!(
            "Exported {} patterns to {}",
            written.len(),
            output_dir.display()
        );
        Ok(written)
    }

    /// Export a disparity map as a 16-bit grayscale PNG preview.
    ///
    /// Valid values are stretched over the full 16-bit range; invalid and
    /// empty pixels are black.
    pub fn export_disparity_preview(map: &DisparityMap, path: &Path) -> std::io::Result<()> {
        let scale = match map.max_value() {
            Some(max) if max > 0 => 65535.0 / max as f64,
            _ => 0.0,
        };

        let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_fn(
            map.columns(),
            map.rows(),
            |x, y| {
                let value = match map.pixel(x, y) {
                    Disparity::Valid(v) => (v as f64 * scale).round().clamp(0.0, 65535.0) as u16,
                    Disparity::Invalid | Disparity::Empty => 0,
                };
                image::Luma([value])
            },
        );

        img.save(path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

/// Load every image in `dir`, sorted by file name, as file captures.
pub fn load_captures(dir: &Path) -> anyhow::Result<CaptureSequence> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read capture directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| CAPTURE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_image {
            paths.push(path);
        }
    }
    paths.sort();

    let mut captures = CaptureSequence::new();
    for path in paths {
        captures.add(Capture::file(path));
    }

    log::info!("Found {} captures in {}", captures.len(), dir.display());
    Ok(captures)
}
