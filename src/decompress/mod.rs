//! Decompression of replay payloads.
//!
//! This module turns a [`ReplayContainer`] into the flat byte stream the
//! header and command decoders read:
//! - **Modern (zlib)**: one or more zlib streams after the container prefix
//! - **Legacy (PKWare)**: sections of imploded or stored chunks
//! - **Uncompressed**: the bytes after the container prefix, as-is
//!
//! # Usage
//!
//! ```
//! use rep_parser::config::DecompressionConfig;
//! use rep_parser::decompress::decompress;
//! use rep_parser::format::{ReplayContainer, ReplayFormat};
//!
//! let mut data = vec![0u8; 28];
//! data.extend_from_slice(b"payload");
//!
//! let container = ReplayContainer::with_format(&data, ReplayFormat::Uncompressed);
//! let stream = decompress(&container, &DecompressionConfig::default()).unwrap();
//! assert_eq!(stream, b"payload");
//! ```
//!
//! # Format-Specific Functions
//!
//! - [`zlib::inflate_payload`] - zlib stream location and bounded inflation
//! - [`legacy::decompress_legacy`] - legacy section walker
//! - [`implode::explode`] - PKWare DCL explode for a single chunk

pub mod implode;
pub mod legacy;
pub mod zlib;

pub use implode::explode;
pub use legacy::decompress_legacy;
pub use zlib::{inflate_payload, locate_zlib_stream};

use crate::config::DecompressionConfig;
use crate::error::{DecodeError, Result};
use crate::format::{ReplayContainer, ReplayFormat};

/// Decompresses the payload of a replay container.
///
/// The strategy is chosen from the container's detected format.
///
/// # Errors
///
/// Returns `DecodeError::DecompressionFailed` if the payload is corrupt,
/// its framing is inconsistent, or the output would exceed
/// `limits.max_decompressed_size`.
pub fn decompress(
    container: &ReplayContainer<'_>,
    limits: &DecompressionConfig,
) -> Result<Vec<u8>> {
    match container.format() {
        ReplayFormat::ModernZlib | ReplayFormat::Modern121 => {
            inflate_payload(container.bytes(), limits)
        }
        ReplayFormat::LegacyPkware => decompress_legacy(container.bytes(), limits),
        ReplayFormat::Uncompressed => {
            let payload = container.payload();
            if payload.len() > limits.max_decompressed_size {
                return Err(DecodeError::decompression(format!(
                    "decompressed size exceeds limit of {} bytes",
                    limits.max_decompressed_size
                )));
            }
            Ok(payload.to_vec())
        }
    }
}
