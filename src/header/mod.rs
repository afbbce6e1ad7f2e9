//! Header decoding for decompressed replay streams.
//!
//! The header sits at the start of the decompressed stream and is read at
//! fixed offsets. The offsets are kept in a [`HeaderLayout`] value so a
//! different engine revision only needs a different layout.
//!
//! # Layout
//!
//! | Offset | Size | Type | Field |
//! |--------|------|------|-------|
//! | 0x00 | 4 | u32 | Engine version |
//! | 0x04 | 4 | u32 | Frame count |
//! | 0x08 | 4 | u32 | Random seed |
//! | 0x3C | 2 | u16 | Game type |
//! | 0x3E | 2 | u16 | Game sub-type |
//! | 0x161 | 12 x 36 | records | Player table (see [`player`]) |
//! | 0x1CD | 25 | string | Map name |
//!
//! The map name field overlaps the name of the fourth slot record. Both are
//! read as laid out; a replay with four or more occupied slots can surface
//! that player's name as the map name.
//!
//! # Example
//!
//! ```
//! use rep_parser::header::{HeaderLayout, ReplayHeader};
//!
//! let mut stream = vec![0u8; 0x311];
//! stream[0x04..0x08].copy_from_slice(&1440u32.to_le_bytes());
//! stream[0x161..0x166].copy_from_slice(b"Flash");
//! stream[0x161 + 32] = 1;
//!
//! let header = ReplayHeader::decode(&stream, &HeaderLayout::NOMINAL).unwrap();
//! assert_eq!(header.frame_count, 1440);
//! assert_eq!(header.players.len(), 1);
//! assert_eq!(header.map_name, "<unknown>");
//! ```

pub mod player;

pub use player::{parse_player_table, PlayerSlot, Race, SlotRecord};

use std::fmt;

use serde::Serialize;

use crate::binary::{read_name_field, read_u16_le, read_u32_le};
use crate::error::{DecodeError, DecodeWarning, Result};

/// Map name used when the header field is empty.
pub const UNKNOWN_MAP: &str = "<unknown>";

/// Frame counts at or above this value are treated as corrupt.
pub const MAX_PLAUSIBLE_FRAMES: u32 = 10_000_000;

/// Average stream bytes per frame, used to estimate a corrupt frame count.
pub const AVERAGE_BYTES_PER_FRAME: usize = 3;

/// Byte offsets of the header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    /// Offset of the engine version (u32).
    pub engine_version: usize,
    /// Offset of the frame count (u32).
    pub frame_count: usize,
    /// Offset of the random seed (u32).
    pub random_seed: usize,
    /// Offset of the game type (u16).
    pub game_type: usize,
    /// Offset of the game sub-type (u16).
    pub game_sub_type: usize,
    /// Offset of the first slot record.
    pub player_table: usize,
    /// Number of slot records.
    pub slot_count: usize,
    /// Offset of the map name field.
    pub map_name: usize,
    /// Width of the map name field.
    pub map_name_length: usize,
}

impl HeaderLayout {
    /// The layout written by the supported engine revisions.
    pub const NOMINAL: HeaderLayout = HeaderLayout {
        engine_version: 0x00,
        frame_count: 0x04,
        random_seed: 0x08,
        game_type: 0x3C,
        game_sub_type: 0x3E,
        player_table: 0x161,
        slot_count: 12,
        map_name: 0x1CD,
        map_name_length: 25,
    };

    /// Returns the number of stream bytes needed to decode every field.
    #[must_use]
    pub fn required_len(&self) -> usize {
        [
            self.engine_version + 4,
            self.frame_count + 4,
            self.random_seed + 4,
            self.game_type + 2,
            self.game_sub_type + 2,
            self.player_table + self.slot_count * player::SLOT_SIZE,
            self.map_name + self.map_name_length,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

impl Default for HeaderLayout {
    fn default() -> Self {
        Self::NOMINAL
    }
}

/// The game type stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GameType {
    /// 0x02
    Melee,
    /// 0x03
    FreeForAll,
    /// 0x04
    OneOnOne,
    /// 0x05
    CaptureTheFlag,
    /// 0x06
    Greed,
    /// 0x07
    Slaughter,
    /// 0x08
    SuddenDeath,
    /// 0x09
    Ladder,
    /// 0x0A
    UseMapSettings,
    /// 0x0B
    TeamMelee,
    /// 0x0C
    TeamFreeForAll,
    /// 0x0D
    TeamCaptureTheFlag,
    /// 0x0F
    TopVsBottom,
    /// 0x10
    IronManLadder,
    /// Any other id.
    Other(u16),
}

impl GameType {
    /// Maps a raw game type id.
    #[must_use]
    pub fn from_id(id: u16) -> Self {
        match id {
            0x02 => GameType::Melee,
            0x03 => GameType::FreeForAll,
            0x04 => GameType::OneOnOne,
            0x05 => GameType::CaptureTheFlag,
            0x06 => GameType::Greed,
            0x07 => GameType::Slaughter,
            0x08 => GameType::SuddenDeath,
            0x09 => GameType::Ladder,
            0x0A => GameType::UseMapSettings,
            0x0B => GameType::TeamMelee,
            0x0C => GameType::TeamFreeForAll,
            0x0D => GameType::TeamCaptureTheFlag,
            0x0F => GameType::TopVsBottom,
            0x10 => GameType::IronManLadder,
            other => GameType::Other(other),
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameType::Melee => "Melee",
            GameType::FreeForAll => "Free For All",
            GameType::OneOnOne => "One on One",
            GameType::CaptureTheFlag => "Capture The Flag",
            GameType::Greed => "Greed",
            GameType::Slaughter => "Slaughter",
            GameType::SuddenDeath => "Sudden Death",
            GameType::Ladder => "Ladder",
            GameType::UseMapSettings => "Use Map Settings",
            GameType::TeamMelee => "Team Melee",
            GameType::TeamFreeForAll => "Team Free For All",
            GameType::TeamCaptureTheFlag => "Team Capture The Flag",
            GameType::TopVsBottom => "Top vs Bottom",
            GameType::IronManLadder => "Iron Man Ladder",
            GameType::Other(id) => return write!(f, "Unknown (0x{id:02X})"),
        };
        write!(f, "{name}")
    }
}

/// The decoded replay header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayHeader {
    /// Engine version.
    pub engine_version: u32,

    /// Number of simulation frames in the game.
    ///
    /// Replaced by an estimate when the stored value is implausible.
    pub frame_count: u32,

    /// The frame count as stored in the header.
    pub stored_frame_count: u32,

    /// Whether `frame_count` was estimated from the stream length.
    pub frame_count_estimated: bool,

    /// Random seed.
    pub random_seed: u32,

    /// Map name, or [`UNKNOWN_MAP`].
    pub map_name: String,

    /// Game type.
    pub game_type: GameType,

    /// Game sub-type (meaning depends on the game type).
    pub game_sub_type: u16,

    /// Active players with dense ids.
    pub players: Vec<PlayerSlot>,
}

impl ReplayHeader {
    /// Decodes the header from the start of a decompressed stream.
    ///
    /// # Arguments
    ///
    /// * `stream` - The decompressed replay stream
    /// * `layout` - Field offsets to read from
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::HeaderTruncated` if the stream is shorter than
    /// the layout requires.
    pub fn decode(stream: &[u8], layout: &HeaderLayout) -> Result<Self> {
        let required = layout.required_len();
        if stream.len() < required {
            return Err(DecodeError::truncated(required, stream.len()));
        }

        let engine_version = read_u32_le(stream, layout.engine_version)?;
        let stored_frame_count = read_u32_le(stream, layout.frame_count)?;
        let random_seed = read_u32_le(stream, layout.random_seed)?;
        let game_type = GameType::from_id(read_u16_le(stream, layout.game_type)?);
        let game_sub_type = read_u16_le(stream, layout.game_sub_type)?;
        let players = parse_player_table(stream, layout.player_table, layout.slot_count)?;

        let map_name = read_name_field(stream, layout.map_name, layout.map_name_length)?;
        let map_name = if map_name.is_empty() {
            UNKNOWN_MAP.to_string()
        } else {
            map_name
        };

        let (frame_count, frame_count_estimated) = if is_plausible_frame_count(stored_frame_count) {
            (stored_frame_count, false)
        } else {
            (estimate_frame_count(stream.len()), true)
        };

        Ok(ReplayHeader {
            engine_version,
            frame_count,
            stored_frame_count,
            frame_count_estimated,
            random_seed,
            map_name,
            game_type,
            game_sub_type,
            players,
        })
    }

    /// Returns the warning to report when the frame count was estimated.
    #[must_use]
    pub fn frame_count_warning(&self) -> Option<DecodeWarning> {
        self.frame_count_estimated
            .then_some(DecodeWarning::FrameCountEstimated {
                stored: self.stored_frame_count,
                estimated: self.frame_count,
            })
    }

    /// Returns the number of active players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Looks up an active player by dense id.
    #[must_use]
    pub fn player(&self, player_id: u8) -> Option<&PlayerSlot> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    /// Returns the game length in seconds at the given frame rate.
    #[must_use]
    pub fn duration_seconds(&self, fps: f64) -> f64 {
        if fps <= 0.0 {
            return 0.0;
        }
        f64::from(self.frame_count) / fps
    }

    /// Returns the game length formatted as "HH:MM:SS".
    #[must_use]
    pub fn duration_string(&self, fps: f64) -> String {
        let total_seconds = self.duration_seconds(fps) as u64;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds / 60) % 60;
        let seconds = total_seconds % 60;
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

/// Returns whether a stored frame count passes the sanity check.
#[must_use]
pub fn is_plausible_frame_count(frames: u32) -> bool {
    frames > 0 && frames < MAX_PLAUSIBLE_FRAMES
}

/// Estimates the frame count from the stream length.
#[must_use]
pub fn estimate_frame_count(stream_len: usize) -> u32 {
    u32::try_from(stream_len / AVERAGE_BYTES_PER_FRAME).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLOT_BASE: usize = 0x161;

    fn stream_with_frames(frames: u32) -> Vec<u8> {
        let mut stream = vec![0u8; HeaderLayout::NOMINAL.required_len()];
        stream[0x00..0x04].copy_from_slice(&59u32.to_le_bytes());
        stream[0x04..0x08].copy_from_slice(&frames.to_le_bytes());
        stream[0x08..0x0C].copy_from_slice(&0xCAFE_F00Du32.to_le_bytes());
        stream[0x3C..0x3E].copy_from_slice(&0x0Fu16.to_le_bytes());
        stream[0x3E..0x40].copy_from_slice(&2u16.to_le_bytes());
        stream
    }

    fn set_player(stream: &mut [u8], slot: usize, name: &[u8], race: u8) {
        let base = SLOT_BASE + slot * player::SLOT_SIZE;
        stream[base..base + name.len()].copy_from_slice(name);
        stream[base + player::RACE_OFFSET] = race;
    }

    // ========================
    // layout
    // ========================

    #[test]
    fn test_nominal_required_len() {
        assert_eq!(HeaderLayout::NOMINAL.required_len(), 0x311);
        assert_eq!(HeaderLayout::default(), HeaderLayout::NOMINAL);
    }

    #[test]
    fn test_custom_layout() {
        let layout = HeaderLayout {
            frame_count: 0x10,
            slot_count: 2,
            player_table: 0x40,
            map_name: 0x20,
            ..HeaderLayout::NOMINAL
        };
        let mut stream = vec![0u8; layout.required_len()];
        stream[0x10..0x14].copy_from_slice(&500u32.to_le_bytes());
        stream[0x20..0x28].copy_from_slice(b"Fighting");
        stream[0x40 + 36..0x40 + 36 + 5].copy_from_slice(b"Stork");

        let header = ReplayHeader::decode(&stream, &layout).unwrap();
        assert_eq!(header.frame_count, 500);
        assert_eq!(header.map_name, "Fighting");
        assert_eq!(header.players[0].name, "Stork");
        assert_eq!(header.players[0].slot_index, 1);
    }

    // ========================
    // fields
    // ========================

    #[test]
    fn test_decode_fixed_fields() {
        let stream = stream_with_frames(14_400);
        let header = ReplayHeader::decode(&stream, &HeaderLayout::NOMINAL).unwrap();

        assert_eq!(header.engine_version, 59);
        assert_eq!(header.frame_count, 14_400);
        assert!(!header.frame_count_estimated);
        assert_eq!(header.random_seed, 0xCAFE_F00D);
        assert_eq!(header.game_type, GameType::TopVsBottom);
        assert_eq!(header.game_sub_type, 2);
        assert!(header.frame_count_warning().is_none());
    }

    #[test]
    fn test_decode_map_name() {
        let mut stream = stream_with_frames(100);
        stream[0x1CD..0x1CD + 15].copy_from_slice(b"| iCCup | Match");
        let header = ReplayHeader::decode(&stream, &HeaderLayout::NOMINAL).unwrap();
        assert_eq!(header.map_name, "| iCCup | Match");
    }

    #[test]
    fn test_empty_map_name_is_sentinel() {
        let stream = stream_with_frames(100);
        let header = ReplayHeader::decode(&stream, &HeaderLayout::NOMINAL).unwrap();
        assert_eq!(header.map_name, UNKNOWN_MAP);
    }

    #[test]
    fn test_players_are_dense() {
        let mut stream = stream_with_frames(100);
        set_player(&mut stream, 0, b"Flash", 1);
        set_player(&mut stream, 1, b"Computer", 0);
        set_player(&mut stream, 2, b"Jaedong", 0);

        let header = ReplayHeader::decode(&stream, &HeaderLayout::NOMINAL).unwrap();
        assert_eq!(header.player_count(), 2);
        assert_eq!(header.player(1).map(|p| p.name.as_str()), Some("Jaedong"));
        assert_eq!(header.player(1).map(|p| p.race), Some(Race::Zerg));
        assert!(header.player(2).is_none());
    }

    #[test]
    fn test_game_type_mapping() {
        assert_eq!(GameType::from_id(0x02), GameType::Melee);
        assert_eq!(GameType::from_id(0x0A), GameType::UseMapSettings);
        assert_eq!(GameType::from_id(0x0E), GameType::Other(0x0E));
        assert_eq!(GameType::Other(0x20).to_string(), "Unknown (0x20)");
        assert_eq!(GameType::OneOnOne.to_string(), "One on One");
    }

    // ========================
    // frame count sanity
    // ========================

    #[test]
    fn test_zero_frame_count_is_estimated() {
        let stream = stream_with_frames(0);
        let header = ReplayHeader::decode(&stream, &HeaderLayout::NOMINAL).unwrap();

        assert!(header.frame_count_estimated);
        assert_eq!(header.frame_count, (0x311 / 3) as u32);
        assert_eq!(
            header.frame_count_warning(),
            Some(DecodeWarning::FrameCountEstimated {
                stored: 0,
                estimated: 261
            })
        );
    }

    #[test]
    fn test_huge_frame_count_is_estimated() {
        let stream = stream_with_frames(MAX_PLAUSIBLE_FRAMES);
        let header = ReplayHeader::decode(&stream, &HeaderLayout::NOMINAL).unwrap();
        assert!(header.frame_count_estimated);
        assert_eq!(header.stored_frame_count, MAX_PLAUSIBLE_FRAMES);

        let stream = stream_with_frames(MAX_PLAUSIBLE_FRAMES - 1);
        let header = ReplayHeader::decode(&stream, &HeaderLayout::NOMINAL).unwrap();
        assert!(!header.frame_count_estimated);
    }

    #[test]
    fn test_truncated_stream() {
        let stream = vec![0u8; 0x200];
        let result = ReplayHeader::decode(&stream, &HeaderLayout::NOMINAL);
        assert_eq!(result, Err(DecodeError::truncated(0x311, 0x200)));
    }

    #[test]
    fn test_duration_string() {
        let stream = stream_with_frames(24 * 3725);
        let header = ReplayHeader::decode(&stream, &HeaderLayout::NOMINAL).unwrap();
        assert_eq!(header.duration_string(24.0), "01:02:05");
        assert!((header.duration_seconds(0.0)).abs() < f64::EPSILON);
    }
}
