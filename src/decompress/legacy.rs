//! Section walker for legacy (PKWare) replay containers.
//!
//! Legacy files store the payload as a run of sections starting right
//! after the 16-byte container prefix:
//!
//! ```text
//! section := checksum:u32 chunk_count:u32 chunk*
//! chunk   := length:u32 bytes[length]
//! ```
//!
//! A chunk whose first two bytes form an implode header is exploded; any
//! other chunk was stored uncompressed by the writer and is copied through.

use crate::binary::read_u32_le;
use crate::config::DecompressionConfig;
use crate::decompress::implode::{explode, is_implode_header};
use crate::error::{DecodeError, Result};

/// Offset of the first section in a legacy container.
pub const LEGACY_SECTION_OFFSET: usize = 16;

/// Size of a section header (checksum + chunk count).
pub const SECTION_HEADER_SIZE: usize = 8;

/// A legacy section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    /// Checksum written by the game. Not verified.
    pub checksum: u32,
    /// Number of chunks that follow.
    pub chunk_count: u32,
}

impl SectionHeader {
    /// Parses a section header at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::DecompressionFailed` if the header runs past
    /// the end of the file.
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        let framing = |e: DecodeError| {
            DecodeError::decompression(format!("section header at offset 0x{offset:X}: {e}"))
        };

        Ok(SectionHeader {
            checksum: read_u32_le(data, offset).map_err(framing)?,
            chunk_count: read_u32_le(data, offset + 4).map_err(framing)?,
        })
    }
}

/// Decompresses all sections of a legacy container.
///
/// # Errors
///
/// Returns `DecodeError::DecompressionFailed` if the framing runs past the
/// end of the file, a section declares more chunks than allowed, there are
/// more sections than allowed, a chunk is malformed, or the output exceeds
/// `limits.max_decompressed_size`.
///
/// # Example
///
/// ```
/// use rep_parser::config::DecompressionConfig;
/// use rep_parser::decompress::legacy::decompress_legacy;
///
/// let mut file = vec![0u8; 16];
/// file.extend_from_slice(&0u32.to_le_bytes()); // checksum
/// file.extend_from_slice(&1u32.to_le_bytes()); // one chunk
/// file.extend_from_slice(&8u32.to_le_bytes());
/// file.extend_from_slice(&[0x00, 0x04, 0x82, 0x24, 0x25, 0x8F, 0x80, 0x7F]);
///
/// let payload = decompress_legacy(&file, &DecompressionConfig::default()).unwrap();
/// assert_eq!(payload, b"AIAIAIAIAIAIA");
/// ```
pub fn decompress_legacy(data: &[u8], limits: &DecompressionConfig) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut offset = LEGACY_SECTION_OFFSET;
    let mut sections = 0usize;

    while offset < data.len() {
        if sections == limits.max_sections {
            return Err(DecodeError::decompression(format!(
                "more than {} sections",
                limits.max_sections
            )));
        }

        let header = SectionHeader::parse(data, offset)?;
        let chunk_count = header.chunk_count as usize;
        if chunk_count > limits.max_chunks_per_section {
            return Err(DecodeError::decompression(format!(
                "section {sections} declares {chunk_count} chunks (limit {})",
                limits.max_chunks_per_section
            )));
        }
        offset += SECTION_HEADER_SIZE;

        for chunk_index in 0..chunk_count {
            let length = read_u32_le(data, offset).map_err(|e| {
                DecodeError::decompression(format!(
                    "chunk {chunk_index} of section {sections}: {e}"
                ))
            })? as usize;
            let start = offset + 4;
            let chunk = start
                .checked_add(length)
                .and_then(|end| data.get(start..end))
                .ok_or_else(|| {
                    DecodeError::decompression(format!(
                        "chunk {chunk_index} of section {sections} at offset 0x{offset:X} \
                         extends beyond file (needs {length} bytes, {} available)",
                        data.len().saturating_sub(start)
                    ))
                })?;

            let remaining = limits.max_decompressed_size.saturating_sub(output.len());
            if is_implode_header(chunk) {
                output.extend(explode(chunk, remaining)?);
            } else if chunk.len() > remaining {
                return Err(DecodeError::decompression(format!(
                    "decompressed size exceeds limit of {} bytes",
                    limits.max_decompressed_size
                )));
            } else {
                output.extend_from_slice(chunk);
            }

            offset = start + length;
        }

        sections += 1;
    }

    tracing::debug!(
        "exploded {sections} legacy section(s) into {} bytes",
        output.len()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AIAI: [u8; 8] = [0x00, 0x04, 0x82, 0x24, 0x25, 0x8F, 0x80, 0x7F];

    fn section(chunks: &[&[u8]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        bytes.extend_from_slice(&(chunks.len() as u32).to_le_bytes());
        for chunk in chunks {
            bytes.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
            bytes.extend_from_slice(chunk);
        }
        bytes
    }

    fn legacy_file(sections: &[Vec<u8>]) -> Vec<u8> {
        let mut file = vec![0u8; LEGACY_SECTION_OFFSET];
        file[12..16].copy_from_slice(b"reRS");
        for s in sections {
            file.extend_from_slice(s);
        }
        file
    }

    #[test]
    fn test_section_header_parse() {
        let data = section(&[]);
        let header = SectionHeader::parse(&data, 0).unwrap();
        assert_eq!(header.checksum, 0xDEAD_BEEF);
        assert_eq!(header.chunk_count, 0);
    }

    #[test]
    fn test_section_header_truncated() {
        let result = SectionHeader::parse(&[0u8; 6], 0);
        assert!(matches!(result, Err(DecodeError::DecompressionFailed { .. })));
    }

    #[test]
    fn test_imploded_and_stored_chunks() {
        let file = legacy_file(&[section(&[&AIAI, b"\x10stored"]), section(&[&AIAI])]);
        let output = decompress_legacy(&file, &DecompressionConfig::default()).unwrap();
        assert_eq!(output, b"AIAIAIAIAIAIA\x10storedAIAIAIAIAIAIA");
    }

    #[test]
    fn test_empty_container() {
        let file = legacy_file(&[]);
        let output = decompress_legacy(&file, &DecompressionConfig::default()).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_chunk_overrun() {
        let mut s = section(&[b"abcdef"]);
        s.truncate(s.len() - 3);
        let file = legacy_file(&[s]);
        let err = decompress_legacy(&file, &DecompressionConfig::default()).unwrap_err();
        assert!(err.to_string().contains("extends beyond file"));
    }

    #[test]
    fn test_chunk_count_limit() {
        let mut s = Vec::new();
        s.extend_from_slice(&0u32.to_le_bytes());
        s.extend_from_slice(&u32::MAX.to_le_bytes());
        let file = legacy_file(&[s]);
        let err = decompress_legacy(&file, &DecompressionConfig::default()).unwrap_err();
        assert!(err.to_string().contains("chunks"));
    }

    #[test]
    fn test_section_limit() {
        let file = legacy_file(&[section(&[]), section(&[]), section(&[])]);
        let limits = DecompressionConfig {
            max_sections: 2,
            ..DecompressionConfig::default()
        };
        let err = decompress_legacy(&file, &limits).unwrap_err();
        assert!(err.to_string().contains("more than 2 sections"));
    }

    #[test]
    fn test_output_cap() {
        let file = legacy_file(&[section(&[&AIAI, &AIAI])]);
        let limits = DecompressionConfig {
            max_decompressed_size: 20,
            ..DecompressionConfig::default()
        };
        let result = decompress_legacy(&file, &limits);
        assert!(matches!(result, Err(DecodeError::DecompressionFailed { .. })));
    }

    #[test]
    fn test_corrupt_imploded_chunk() {
        // Valid header, then the stream ends before the end marker
        let file = legacy_file(&[section(&[&[0x00, 0x04, 0x82]])]);
        let result = decompress_legacy(&file, &DecompressionConfig::default());
        assert!(matches!(result, Err(DecodeError::DecompressionFailed { .. })));
    }
}
