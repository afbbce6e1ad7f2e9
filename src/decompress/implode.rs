//! PKWare Data Compression Library "explode" decoder.
//!
//! Legacy replays store each chunk of the payload with the DCL "implode"
//! algorithm. A stream starts with two header bytes:
//!
//! - literal mode: `0` for raw 8-bit literals, `1` for Huffman coded ones
//! - dictionary bits: `4`, `5` or `6` (1K, 2K or 4K sliding window)
//!
//! followed by an LSB-first bit stream of literals and length/distance pairs.
//! All three Huffman codes are fixed, so the tables below are compile-time
//! data expanded once per call.
//!
//! # Example
//!
//! ```
//! use rep_parser::decompress::implode::explode;
//!
//! let stream = [0x00, 0x04, 0x82, 0x24, 0x25, 0x8F, 0x80, 0x7F];
//! assert_eq!(explode(&stream, 1024).unwrap(), b"AIAIAIAIAIAIA");
//! ```

use crate::error::{DecodeError, Result};

/// Longest code in any of the fixed Huffman tables.
const MAX_BITS: usize = 13;

/// Decoded length value that marks the end of the stream.
const END_OF_STREAM: usize = 519;

/// Run-length encoded bit lengths for the 256 coded literals.
///
/// Each byte holds a code length in the low nibble and a repeat count minus
/// one in the high nibble.
const LITERAL_LENGTHS: &[u8] = &[
    11, 124, 8, 7, 28, 7, 188, 13, 76, 4, 10, 8, 12, 10, 12, 10, 8, 23, 8, 9, 7, 6, 7, 8, 7, 6,
    55, 8, 23, 24, 12, 11, 7, 9, 11, 12, 6, 7, 22, 5, 7, 24, 6, 11, 9, 6, 7, 22, 7, 11, 38, 7, 9,
    8, 25, 11, 8, 11, 9, 12, 8, 12, 5, 38, 5, 38, 5, 11, 7, 5, 6, 21, 6, 10, 53, 8, 7, 24, 10, 27,
    44, 253, 253, 253, 252, 252, 252, 13, 12, 45, 12, 45, 12, 61, 12, 45, 44, 173,
];

/// Run-length encoded bit lengths for the 16 length symbols.
const LENGTH_LENGTHS: &[u8] = &[2, 35, 36, 53, 38, 23];

/// Run-length encoded bit lengths for the 64 distance symbols.
const DISTANCE_LENGTHS: &[u8] = &[2, 20, 53, 230, 247, 151, 248];

/// Base copy length for each length symbol.
const LENGTH_BASE: [u16; 16] = [3, 2, 4, 5, 6, 7, 8, 9, 10, 12, 16, 24, 40, 72, 136, 264];

/// Extra bits read after each length symbol.
const LENGTH_EXTRA: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8];

/// Returns whether the first two bytes look like an implode stream header.
///
/// # Example
///
/// ```
/// use rep_parser::decompress::implode::is_implode_header;
///
/// assert!(is_implode_header(&[0x01, 0x06, 0xFF]));
/// assert!(!is_implode_header(&[0x78, 0x9C]));
/// assert!(!is_implode_header(&[0x00]));
/// ```
#[must_use]
pub fn is_implode_header(chunk: &[u8]) -> bool {
    matches!(chunk, [0 | 1, 4..=6, ..])
}

/// A canonical Huffman decoding table.
struct Huffman {
    /// Number of symbols of each code length.
    count: [u16; MAX_BITS + 1],
    /// Symbols ordered by code length, then by value.
    symbol: Vec<u16>,
}

impl Huffman {
    /// Expands a run-length encoded bit-length table.
    fn from_compact(compact: &[u8]) -> Self {
        let lengths: Vec<usize> = compact
            .iter()
            .flat_map(|&b| std::iter::repeat(usize::from(b & 15)).take(usize::from(b >> 4) + 1))
            .collect();

        let mut count = [0u16; MAX_BITS + 1];
        for &len in &lengths {
            count[len] += 1;
        }

        let mut offsets = [0usize; MAX_BITS + 1];
        for len in 1..MAX_BITS {
            offsets[len + 1] = offsets[len] + usize::from(count[len]);
        }

        let mut symbol = vec![0u16; lengths.len()];
        for (value, &len) in (0u16..).zip(lengths.iter()) {
            if len != 0 {
                symbol[offsets[len]] = value;
                offsets[len] += 1;
            }
        }

        Self { count, symbol }
    }
}

/// LSB-first bit reader over the compressed input.
struct BitReader<'a> {
    input: &'a [u8],
    position: usize,
    buffer: u32,
    available: u32,
}

impl<'a> BitReader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            position: 0,
            buffer: 0,
            available: 0,
        }
    }

    /// Reads `need` bits (at most 16).
    fn bits(&mut self, need: u32) -> Result<u32> {
        let mut value = self.buffer;
        while self.available < need {
            let byte = *self
                .input
                .get(self.position)
                .ok_or_else(|| DecodeError::decompression("implode stream ended unexpectedly"))?;
            self.position += 1;
            value |= u32::from(byte) << self.available;
            self.available += 8;
        }

        self.buffer = value >> need;
        self.available -= need;
        Ok(value & ((1 << need) - 1))
    }

    /// Decodes one symbol. Codes are stored bit-inverted.
    fn decode(&mut self, table: &Huffman) -> Result<usize> {
        let mut code = 0usize;
        let mut first = 0usize;
        let mut index = 0usize;

        for len in 1..=MAX_BITS {
            code |= (self.bits(1)? ^ 1) as usize;
            let count = usize::from(table.count[len]);
            if code < first + count {
                return Ok(usize::from(table.symbol[index + code - first]));
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }

        Err(DecodeError::decompression("invalid implode code"))
    }
}

/// Decompresses one PKWare DCL imploded stream.
///
/// # Arguments
///
/// * `input` - The compressed chunk, starting with its two header bytes
/// * `max_output` - Upper bound on the decompressed size
///
/// # Errors
///
/// Returns `DecodeError::DecompressionFailed` if the header is invalid, the
/// input ends before the end-of-stream marker, a distance reaches before
/// the start of the output, or the output would exceed `max_output`.
pub fn explode(input: &[u8], max_output: usize) -> Result<Vec<u8>> {
    let mut reader = BitReader::new(input);

    let literal_mode = reader.bits(8)?;
    if literal_mode > 1 {
        return Err(DecodeError::decompression(format!(
            "invalid implode literal mode {literal_mode}"
        )));
    }

    let dictionary_bits = reader.bits(8)?;
    if !(4..=6).contains(&dictionary_bits) {
        return Err(DecodeError::decompression(format!(
            "invalid implode dictionary size {dictionary_bits}"
        )));
    }

    let literals = Huffman::from_compact(LITERAL_LENGTHS);
    let lengths = Huffman::from_compact(LENGTH_LENGTHS);
    let distances = Huffman::from_compact(DISTANCE_LENGTHS);

    let mut output = Vec::new();

    loop {
        if reader.bits(1)? == 1 {
            let symbol = reader.decode(&lengths)?;
            let length = usize::from(LENGTH_BASE[symbol])
                + reader.bits(u32::from(LENGTH_EXTRA[symbol]))? as usize;
            if length == END_OF_STREAM {
                break;
            }

            let shift = if length == 2 { 2 } else { dictionary_bits };
            let distance =
                (reader.decode(&distances)? << shift) + reader.bits(shift)? as usize + 1;

            if distance > output.len() {
                return Err(DecodeError::decompression(format!(
                    "implode distance {distance} exceeds {} bytes of output",
                    output.len()
                )));
            }
            if output.len() + length > max_output {
                return Err(exceeded(max_output));
            }

            // Copies may overlap the bytes they produce.
            let start = output.len() - distance;
            for i in 0..length {
                let byte = output[start + i];
                output.push(byte);
            }
        } else {
            let literal = if literal_mode == 1 {
                reader.decode(&literals)? as u32
            } else {
                reader.bits(8)?
            };
            if output.len() >= max_output {
                return Err(exceeded(max_output));
            }
            output.push((literal & 0xFF) as u8);
        }
    }

    Ok(output)
}

fn exceeded(max_output: usize) -> DecodeError {
    DecodeError::decompression(format!(
        "decompressed size exceeds limit of {max_output} bytes"
    ))
}
