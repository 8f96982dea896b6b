//! Binary disparity map files.
//!
//! Layout: LZ4 block (size-prepended) around a bincode record holding the
//! header and the packed sentinel pixel values.

use super::{Disparity, DisparityMap, Orientation};
use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAGIC: [u8; 4] = *b"SLDM";
const VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct DisparityMapRecord {
    magic: [u8; 4],
    version: u32,
    columns: u32,
    rows: u32,
    orientation: Orientation,
    oversample: u32,
    pixels: Vec<i32>,
}

impl DisparityMap {
    /// Encode the map into the compressed on-disk representation.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.is_created() {
            return Err(CodecError::EmptyMap);
        }
        if let Some(v) = self
            .data
            .iter()
            .filter_map(|d| d.value())
            .find(|&v| v >= Disparity::INVALID_PIXEL as u32)
        {
            return Err(CodecError::UnrepresentableValue(v));
        }

        let record = DisparityMapRecord {
            magic: MAGIC,
            version: VERSION,
            columns: self.columns,
            rows: self.rows,
            orientation: self.orientation,
            oversample: self.oversample,
            pixels: self.to_raw(),
        };

        let encoded =
            bincode::serialize(&record).map_err(|e| CodecError::Serialization(e.to_string()))?;
        Ok(lz4_flex::compress_prepend_size(&encoded))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let decoded = lz4_flex::decompress_size_prepended(bytes)
            .map_err(|e| CodecError::Serialization(format!("LZ4 decompression failed: {}", e)))?;
        let record: DisparityMapRecord =
            bincode::deserialize(&decoded).map_err(|e| CodecError::Serialization(e.to_string()))?;

        if record.magic != MAGIC {
            return Err(CodecError::Serialization("not a disparity map file".to_string()));
        }
        if record.version != VERSION {
            return Err(CodecError::Serialization(format!(
                "unsupported disparity map version {}",
                record.version
            )));
        }

        Self::from_raw(
            record.columns,
            record.rows,
            record.orientation,
            record.oversample,
            &record.pixels,
        )
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        log::info!(
            "Saved {}x{} disparity map to {}",
            self.columns,
            self.rows,
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}
