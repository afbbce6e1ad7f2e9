//! Player table decoding.
//!
//! The header holds a fixed table of 12 slot records. Each record is 36
//! bytes:
//!
//! | Offset | Size | Type | Field |
//! |--------|------|------|-------|
//! | 0 | 25 | string | Player name (NUL-terminated) |
//! | 25 | 7 | bytes | Unused |
//! | 32 | 1 | u8 | Race |
//! | 33 | 1 | u8 | Team |
//! | 34 | 1 | u8 | Color |
//! | 35 | 1 | u8 | Unused |
//!
//! Open and computer slots are dropped. The remaining slots receive dense
//! player ids `0..n` in table order, which is how the command stream
//! refers to them.

use std::fmt;

use serde::Serialize;

use crate::binary::{read_name_field, read_u8};
use crate::error::Result;

/// Size of one slot record in bytes.
pub const SLOT_SIZE: usize = 36;

/// Width of the name field in bytes.
pub const NAME_LENGTH: usize = 25;

/// Offset of the race byte within a slot record.
pub const RACE_OFFSET: usize = 32;

/// Offset of the team byte within a slot record.
pub const TEAM_OFFSET: usize = 33;

/// Offset of the color byte within a slot record.
pub const COLOR_OFFSET: usize = 34;

/// Name the game writes into computer-controlled slots.
pub const COMPUTER_NAME: &str = "Computer";

/// A player's race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Race {
    /// Race id 0.
    Zerg,
    /// Race id 1.
    Terran,
    /// Race id 2.
    Protoss,
    /// Race id 6.
    Random,
    /// Any other race id.
    Invalid,
}

impl Race {
    /// Maps a raw race id to a race.
    ///
    /// # Example
    ///
    /// ```
    /// use rep_parser::header::Race;
    ///
    /// assert_eq!(Race::from_id(2), Race::Protoss);
    /// assert_eq!(Race::from_id(6), Race::Random);
    /// assert_eq!(Race::from_id(3), Race::Invalid);
    /// ```
    #[must_use]
    pub fn from_id(id: u8) -> Self {
        match id {
            0 => Race::Zerg,
            1 => Race::Terran,
            2 => Race::Protoss,
            6 => Race::Random,
            _ => Race::Invalid,
        }
    }

    /// Returns the display name of the race.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Race::Zerg => "Zerg",
            Race::Terran => "Terran",
            Race::Protoss => "Protoss",
            Race::Random => "Random",
            Race::Invalid => "Invalid",
        }
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One raw record of the slot table, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRecord {
    /// Decoded name. Empty for open slots.
    pub name: String,
    /// Raw race id.
    pub race_id: u8,
    /// Team number.
    pub team: u8,
    /// Color index.
    pub color: u8,
}

impl SlotRecord {
    /// Parses the slot record that starts at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::HeaderTruncated` if the record extends past
    /// the end of the stream.
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        Ok(SlotRecord {
            name: read_name_field(data, offset, NAME_LENGTH)?,
            race_id: read_u8(data, offset + RACE_OFFSET)?,
            team: read_u8(data, offset + TEAM_OFFSET)?,
            color: read_u8(data, offset + COLOR_OFFSET)?,
        })
    }

    /// Returns whether this slot holds a human player.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.name.is_empty() && self.name != COMPUTER_NAME
    }
}

/// An active player of the replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSlot {
    /// Dense id used by the command stream.
    pub player_id: u8,
    /// Position in the raw slot table.
    pub slot_index: u8,
    /// Display name.
    pub name: String,
    /// Race.
    pub race: Race,
    /// Team number.
    pub team: u8,
    /// Color index.
    pub color: u8,
}

/// Reads the slot table and returns the active players with dense ids.
///
/// # Arguments
///
/// * `data` - The decompressed stream
/// * `table_offset` - Offset of the first slot record
/// * `slot_count` - Number of records in the table
///
/// # Errors
///
/// Returns `DecodeError::HeaderTruncated` if the table extends past the
/// end of the stream.
pub fn parse_player_table(
    data: &[u8],
    table_offset: usize,
    slot_count: usize,
) -> Result<Vec<PlayerSlot>> {
    let mut players = Vec::new();

    for index in 0..slot_count {
        let record = SlotRecord::parse(data, table_offset + index * SLOT_SIZE)?;
        if !record.is_active() {
            continue;
        }

        // At most 12 slots, so both ids fit in a byte.
        players.push(PlayerSlot {
            player_id: players.len() as u8,
            slot_index: index as u8,
            race: Race::from_id(record.race_id),
            name: record.name,
            team: record.team,
            color: record.color,
        });
    }

    Ok(players)
}
