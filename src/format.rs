//! Container format detection for replay files.
//!
//! Replay files start with a small framed section holding a four-byte
//! replay tag, followed by the compressed header section. The tag and the
//! first payload byte are enough to classify the container:
//!
//! | Bytes | Value | Format | Confidence |
//! |-------|-------|--------|------------|
//! | 12..16 | `seRS` | [`ReplayFormat::Modern121`] | 0.95 |
//! | 28 | `0x78` (zlib) | [`ReplayFormat::ModernZlib`] | 0.90 |
//! | otherwise | | [`ReplayFormat::LegacyPkware`] | 0.85 |
//!
//! # Example
//!
//! ```
//! use rep_parser::format::{ReplayContainer, ReplayFormat};
//!
//! let mut data = vec![0u8; 32];
//! data[12..16].copy_from_slice(b"seRS");
//!
//! let container = ReplayContainer::detect(&data).unwrap();
//! assert_eq!(container.format(), ReplayFormat::Modern121);
//! ```

use serde::Serialize;

use crate::error::{DecodeError, Result};

/// The replay tag written by 1.21+ clients.
pub const MODERN_121_TAG: &[u8; 4] = b"seRS";

/// The replay tag written by older clients.
pub const LEGACY_TAG: &[u8; 4] = b"reRS";

/// Byte offset of the four-byte replay tag.
pub const TAG_OFFSET: usize = 12;

/// Byte offset of the first byte of the header section payload.
pub const PAYLOAD_OFFSET: usize = 28;

/// First byte of a zlib stream (deflate, 32K window).
pub const ZLIB_MAGIC: u8 = 0x78;

/// Smallest buffer the detector accepts.
pub const MIN_CONTAINER_SIZE: usize = 16;

/// Frame rate of modern clients (42 ms per frame at "fastest").
pub const MODERN_FPS: f64 = 23.81;

/// Frame rate used for legacy and uncompressed replays.
pub const LEGACY_FPS: f64 = 24.0;

/// The compression layout of a replay container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReplayFormat {
    /// Payload stored without compression.
    ///
    /// Never produced by detection; used when a caller falls back to
    /// reading the payload verbatim.
    Uncompressed,

    /// Pre-1.18 container with PKWare DCL "implode" compressed chunks.
    LegacyPkware,

    /// Container with zlib compressed chunks.
    ModernZlib,

    /// 1.21+ container (`seRS` tag), zlib compressed, extended command set.
    Modern121,
}

impl ReplayFormat {
    /// Returns the simulation frame rate for replays of this format.
    #[must_use]
    pub const fn frames_per_second(&self) -> f64 {
        match self {
            ReplayFormat::ModernZlib | ReplayFormat::Modern121 => MODERN_FPS,
            ReplayFormat::LegacyPkware | ReplayFormat::Uncompressed => LEGACY_FPS,
        }
    }

    /// Returns whether the payload is zlib compressed.
    #[must_use]
    pub const fn is_modern(&self) -> bool {
        matches!(self, ReplayFormat::ModernZlib | ReplayFormat::Modern121)
    }

    /// Returns the detection confidence associated with this format.
    #[must_use]
    pub const fn detection_confidence(&self) -> f32 {
        match self {
            ReplayFormat::Modern121 => 0.95,
            ReplayFormat::ModernZlib => 0.90,
            ReplayFormat::LegacyPkware => 0.85,
            ReplayFormat::Uncompressed => 0.5,
        }
    }
}

/// Raw replay bytes together with their detected format.
///
/// Created once per file and consumed immutably by the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ReplayContainer<'a> {
    bytes: &'a [u8],
    format: ReplayFormat,
    confidence: f32,
}

impl<'a> ReplayContainer<'a> {
    /// Classifies the raw bytes of a replay file.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::FormatUnrecognized` if the buffer is shorter
    /// than [`MIN_CONTAINER_SIZE`].
    pub fn detect(bytes: &'a [u8]) -> Result<Self> {
        let format = detect_format(bytes)?;
        Ok(Self {
            bytes,
            format,
            confidence: format.detection_confidence(),
        })
    }

    /// Wraps bytes with an explicitly chosen format.
    #[must_use]
    pub fn with_format(bytes: &'a [u8], format: ReplayFormat) -> Self {
        Self {
            bytes,
            format,
            confidence: format.detection_confidence(),
        }
    }

    /// Returns the raw bytes of the file.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Returns the detected format.
    #[must_use]
    pub fn format(&self) -> ReplayFormat {
        self.format
    }

    /// Returns the detection confidence in `[0, 1]`.
    #[must_use]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the bytes after the container prefix.
    ///
    /// This is what the uncompressed fallback reads as the decoded stream.
    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        self.bytes.get(PAYLOAD_OFFSET..).unwrap_or(&[])
    }
}

/// Detects the container format of a replay from its raw bytes.
///
/// # Errors
///
/// Returns `DecodeError::FormatUnrecognized` if fewer than 16 bytes are
/// available.
///
/// # Example
///
/// ```
/// use rep_parser::format::{detect_format, ReplayFormat};
///
/// let mut data = vec![0u8; 40];
/// data[28] = 0x78;
/// assert_eq!(detect_format(&data).unwrap(), ReplayFormat::ModernZlib);
///
/// assert!(detect_format(&[0u8; 15]).is_err());
/// ```
pub fn detect_format(data: &[u8]) -> Result<ReplayFormat> {
    if data.len() < MIN_CONTAINER_SIZE {
        return Err(DecodeError::too_short(MIN_CONTAINER_SIZE, data));
    }

    if &data[TAG_OFFSET..TAG_OFFSET + 4] == MODERN_121_TAG {
        return Ok(ReplayFormat::Modern121);
    }

    if data.get(PAYLOAD_OFFSET) == Some(&ZLIB_MAGIC) {
        return Ok(ReplayFormat::ModernZlib);
    }

    Ok(ReplayFormat::LegacyPkware)
}
