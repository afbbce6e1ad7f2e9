//! Binary reading utilities for decoding replay streams.
//!
//! This module provides functions for reading little-endian integers,
//! byte slices, and fixed-width text fields from byte buffers. All
//! functions perform bounds checking and return
//! [`DecodeError::HeaderTruncated`] for reads past the end of the buffer.
//!
//! # Example
//!
//! ```
//! use rep_parser::binary::{read_u16_le, read_u32_le, read_name_field};
//!
//! let data = [0x60, 0x05, 0x00, 0x00, b'H', b'i', 0x00];
//!
//! assert_eq!(read_u16_le(&data, 0).unwrap(), 0x0560);
//! assert_eq!(read_u32_le(&data, 0).unwrap(), 1376);
//! assert_eq!(read_name_field(&data, 4, 3).unwrap(), "Hi");
//! ```

use crate::error::{DecodeError, Result};

/// Reads a single byte from the buffer at the given offset.
///
/// # Errors
///
/// Returns `DecodeError::HeaderTruncated` if `offset` is past the end.
pub fn read_u8(bytes: &[u8], offset: usize) -> Result<u8> {
    bytes
        .get(offset)
        .copied()
        .ok_or_else(|| DecodeError::truncated(offset + 1, bytes.len()))
}

/// Reads a little-endian u16 value from the byte buffer at the given offset.
///
/// # Errors
///
/// Returns `DecodeError::HeaderTruncated` if the buffer doesn't contain
/// at least 2 bytes starting from the given offset.
///
/// # Example
///
/// ```
/// use rep_parser::binary::read_u16_le;
///
/// let data = [0x34, 0x12, 0xFF, 0xFF];
/// assert_eq!(read_u16_le(&data, 0).unwrap(), 0x1234);
/// assert_eq!(read_u16_le(&data, 2).unwrap(), 0xFFFF);
/// ```
pub fn read_u16_le(bytes: &[u8], offset: usize) -> Result<u16> {
    let slice = read_bytes(bytes, offset, 2)?;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

/// Reads a little-endian u32 value from the byte buffer at the given offset.
///
/// # Errors
///
/// Returns `DecodeError::HeaderTruncated` if the buffer doesn't contain
/// at least 4 bytes starting from the given offset.
pub fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32> {
    let slice = read_bytes(bytes, offset, 4)?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// Reads a slice of bytes from the buffer at the given offset.
///
/// # Errors
///
/// Returns `DecodeError::HeaderTruncated` if the buffer doesn't contain
/// at least `len` bytes starting from the given offset.
pub fn read_bytes(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| DecodeError::truncated(usize::MAX, bytes.len()))?;

    bytes
        .get(offset..end)
        .ok_or_else(|| DecodeError::truncated(end, bytes.len()))
}

/// Reads a fixed-width, NUL-terminated text field.
///
/// The field is cut at the first NUL byte (or at `len`), decoded as
/// UTF-8 with a Latin-1 fallback, stripped of control characters, and
/// trimmed. An empty result means the field carried no usable text.
///
/// # Errors
///
/// Returns `DecodeError::HeaderTruncated` if the field extends past the
/// end of the buffer.
///
/// # Example
///
/// ```
/// use rep_parser::binary::read_name_field;
///
/// // 0xE9 alone is not valid UTF-8, so Latin-1 applies.
/// let data = b" Ren\xE9\x07 \x00garbage";
/// assert_eq!(read_name_field(data, 0, 12).unwrap(), "Ren\u{e9}");
/// ```
pub fn read_name_field(bytes: &[u8], offset: usize, len: usize) -> Result<String> {
    let field = read_bytes(bytes, offset, len)?;
    Ok(decode_text(field))
}

/// Decodes a NUL-terminated byte field into display text.
///
/// See [`read_name_field`] for the decoding rule.
#[must_use]
pub fn decode_text(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let raw = &field[..end];

    let text = match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => raw.iter().map(|&b| char::from(b)).collect(),
    };

    text.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}
