//! Synthetic replay builders shared by the integration tests.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Offset of the first known command section start.
pub const COMMAND_OFFSET: usize = 633;

/// Length of the header region of a decompressed stream.
pub const HEADER_LEN: usize = 0x311;

/// Offset of the first slot record.
pub const PLAYER_TABLE: usize = 0x161;

/// Size of one slot record.
pub const SLOT_SIZE: usize = 36;

/// One Stop command followed by an 11-frame skip.
pub const STOP_AND_WAIT: [u8; 5] = [0x1A, 0x00, 0x00, 0x01, 0x0B];

/// Builder for a decompressed replay stream.
pub struct StreamBuilder {
    bytes: Vec<u8>,
}

impl StreamBuilder {
    /// Starts a stream with the given frame count and an empty slot table.
    pub fn new(frame_count: u32) -> Self {
        let mut bytes = vec![0u8; COMMAND_OFFSET];
        bytes[0x00..0x04].copy_from_slice(&59u32.to_le_bytes());
        bytes[0x04..0x08].copy_from_slice(&frame_count.to_le_bytes());
        bytes[0x08..0x0C].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        bytes[0x3C..0x3E].copy_from_slice(&2u16.to_le_bytes());
        Self { bytes }
    }

    /// Fills a slot record.
    ///
    /// The player table runs up to `HEADER_LEN` and so overlaps the nominal
    /// command start at `COMMAND_OFFSET`. Slots 7 and above grow the stream
    /// past it, so fill them before appending commands.
    pub fn slot(mut self, index: usize, name: &str, race: u8, team: u8) -> Self {
        let base = PLAYER_TABLE + index * SLOT_SIZE;
        if self.bytes.len() < base + SLOT_SIZE {
            self.bytes.resize(base + SLOT_SIZE, 0);
        }
        self.bytes[base..base + name.len()].copy_from_slice(name.as_bytes());
        self.bytes[base + 32] = race;
        self.bytes[base + 33] = team;
        self.bytes[base + 34] = index as u8;
        self
    }

    /// Overwrites the first header bytes.
    pub fn engine_bytes(mut self, bytes: [u8; 4]) -> Self {
        self.bytes[0..4].copy_from_slice(&bytes);
        self
    }

    /// Appends command section bytes.
    pub fn commands(mut self, commands: &[u8]) -> Self {
        self.bytes.extend_from_slice(commands);
        self
    }

    /// Returns the stream, padded to cover the whole header region.
    pub fn build(mut self) -> Vec<u8> {
        if self.bytes.len() < HEADER_LEN {
            self.bytes.resize(HEADER_LEN, 0);
        }
        self.bytes
    }
}

/// `count` Stop commands by player 0, eleven frames apart.
pub fn stops(count: usize) -> Vec<u8> {
    STOP_AND_WAIT.repeat(count)
}

/// Wraps chunks in a legacy container with a single section.
pub fn legacy_container(chunks: &[&[u8]]) -> Vec<u8> {
    let mut data = vec![0u8; 16];
    data[12..16].copy_from_slice(b"reRS");
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&(chunks.len() as u32).to_le_bytes());
    for chunk in chunks {
        data.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        data.extend_from_slice(chunk);
    }
    data
}

/// Compresses bytes into one zlib stream.
pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Builds a modern container whose payload is the given zlib streams,
/// written back to back from offset 28.
pub fn modern_container(tag: &[u8; 4], streams: &[Vec<u8>]) -> Vec<u8> {
    let mut data = vec![0u8; 28];
    data[12..16].copy_from_slice(tag);
    for stream in streams {
        data.extend_from_slice(stream);
    }
    data
}
