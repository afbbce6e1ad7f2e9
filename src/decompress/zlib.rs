//! Zlib payload inflation for modern replay containers.
//!
//! Modern containers carry one or more zlib streams after the 28-byte
//! container prefix. Writers differ in how much framing sits in front of
//! the first stream, so its start is located by probing a few expected
//! offsets and then scanning a bounded window. Streams that follow the
//! first one closely (separated only by chunk length framing) are inflated
//! and appended in order.
//!
//! # Example
//!
//! ```
//! use std::io::Write;
//!
//! use flate2::write::ZlibEncoder;
//! use flate2::Compression;
//! use rep_parser::config::DecompressionConfig;
//! use rep_parser::decompress::zlib::inflate_payload;
//!
//! let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
//! encoder.write_all(b"frame data").unwrap();
//!
//! let mut file = vec![0u8; 28];
//! file.extend(encoder.finish().unwrap());
//!
//! let payload = inflate_payload(&file, &DecompressionConfig::default()).unwrap();
//! assert_eq!(payload, b"frame data");
//! ```

use std::io::Read;
use std::ops::RangeInclusive;

use flate2::read::ZlibDecoder;

use crate::config::DecompressionConfig;
use crate::error::{DecodeError, Result};
use crate::format::ZLIB_MAGIC;

/// Second byte of a zlib header for each compression level.
pub const ZLIB_FLAGS: [u8; 4] = [0x01, 0x5E, 0x9C, 0xDA];

/// Offsets probed for the first stream before scanning.
pub const EXPECTED_STREAM_OFFSETS: RangeInclusive<usize> = 28..=32;

/// Returns whether a zlib header starts at `offset`.
#[must_use]
pub fn is_zlib_header(data: &[u8], offset: usize) -> bool {
    match data.get(offset..offset.saturating_add(2)) {
        Some([cmf, flg]) => *cmf == ZLIB_MAGIC && ZLIB_FLAGS.contains(flg),
        _ => false,
    }
}

/// Finds the start of the first zlib stream in a modern container.
///
/// The expected offsets are tried first, then the first `scan_window`
/// bytes are scanned in order.
///
/// # Example
///
/// ```
/// use rep_parser::decompress::zlib::locate_zlib_stream;
///
/// let mut data = vec![0u8; 64];
/// data[40] = 0x78;
/// data[41] = 0xDA;
/// assert_eq!(locate_zlib_stream(&data, 200), Some(40));
/// assert_eq!(locate_zlib_stream(&data, 40), None);
/// ```
#[must_use]
pub fn locate_zlib_stream(data: &[u8], scan_window: usize) -> Option<usize> {
    EXPECTED_STREAM_OFFSETS
        .clone()
        .find(|&offset| is_zlib_header(data, offset))
        .or_else(|| (0..scan_window.min(data.len())).find(|&offset| is_zlib_header(data, offset)))
}

/// Why a single stream could not be inflated.
enum StreamError {
    Corrupt(std::io::Error),
    TooLarge,
}

fn inflate_bounded(
    data: &[u8],
    start: usize,
    limit: usize,
) -> std::result::Result<(Vec<u8>, usize), StreamError> {
    let input = data.get(start..).unwrap_or(&[]);
    let mut decoder = ZlibDecoder::new(input);
    let mut output = Vec::new();

    (&mut decoder)
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut output)
        .map_err(StreamError::Corrupt)?;

    if output.len() > limit {
        return Err(StreamError::TooLarge);
    }

    let consumed = usize::try_from(decoder.total_in()).unwrap_or(input.len());
    Ok((output, consumed))
}

fn stream_error(error: StreamError, start: usize, limit: usize) -> DecodeError {
    match error {
        StreamError::Corrupt(e) => {
            DecodeError::decompression(format!("zlib stream at offset 0x{start:X}: {e}"))
        }
        StreamError::TooLarge => DecodeError::decompression(format!(
            "decompressed size exceeds limit of {limit} bytes"
        )),
    }
}

/// Inflates a single zlib stream starting at `start`.
///
/// # Arguments
///
/// * `data` - The buffer holding the stream
/// * `start` - Offset of the zlib header
/// * `limit` - Maximum number of bytes the stream may produce
///
/// # Returns
///
/// A tuple of `(decompressed_bytes, compressed_bytes_consumed)`.
///
/// # Errors
///
/// Returns `DecodeError::DecompressionFailed` if the stream is corrupt or
/// would produce more than `limit` bytes.
pub fn inflate_stream(data: &[u8], start: usize, limit: usize) -> Result<(Vec<u8>, usize)> {
    inflate_bounded(data, start, limit).map_err(|e| stream_error(e, start, limit))
}

/// Finds a continuation stream within `max_gap` bytes of `from`.
fn next_stream_start(data: &[u8], from: usize, max_gap: usize) -> Option<usize> {
    (from..=from.saturating_add(max_gap)).find(|&offset| is_zlib_header(data, offset))
}

/// Inflates the payload of a modern container.
///
/// # Errors
///
/// Returns `DecodeError::DecompressionFailed` if no zlib stream is found,
/// the first stream is corrupt, or the combined output exceeds
/// `limits.max_decompressed_size`.
pub fn inflate_payload(data: &[u8], limits: &DecompressionConfig) -> Result<Vec<u8>> {
    let start = locate_zlib_stream(data, limits.zlib_scan_window).ok_or_else(|| {
        DecodeError::decompression(format!(
            "no zlib stream found in the first {} bytes",
            limits.zlib_scan_window
        ))
    })?;

    let (mut output, consumed) = inflate_stream(data, start, limits.max_decompressed_size)?;
    let mut cursor = start + consumed;
    let mut streams = 1usize;

    while let Some(next) = next_stream_start(data, cursor, limits.max_chunk_gap) {
        let remaining = limits.max_decompressed_size.saturating_sub(output.len());
        match inflate_bounded(data, next, remaining) {
            Ok((chunk, consumed)) => {
                output.extend_from_slice(&chunk);
                cursor = next + consumed;
                streams += 1;
            }
            Err(StreamError::TooLarge) => {
                return Err(stream_error(
                    StreamError::TooLarge,
                    next,
                    limits.max_decompressed_size,
                ));
            }
            Err(StreamError::Corrupt(e)) => {
                tracing::debug!("stopping at unreadable stream at offset {next}: {e}");
                break;
            }
        }
    }

    tracing::debug!(
        "inflated {} zlib stream(s) from offset {start} into {} bytes",
        streams,
        output.len()
    );
    Ok(output)
}
