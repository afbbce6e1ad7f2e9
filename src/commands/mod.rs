//! Command stream decoding.
//!
//! After the header, the decompressed stream holds the timeline of player
//! commands interleaved with frame markers:
//!
//! - `0x00`: advance one frame
//! - `0x01 n`: advance `n` frames
//! - `0x02 n:u16`: advance `n` frames
//! - any other byte: an opcode, followed by the player id and a payload
//!
//! Where that section starts is not stored reliably, so it is located with
//! a scoring heuristic ([`offset`]) before the state machine in
//! [`decoder`] walks it.
//!
//! # Example
//!
//! ```
//! use rep_parser::commands::{CommandStreamDecoder, EngineProfile, Opcode};
//! use rep_parser::format::ReplayFormat;
//!
//! let mut stream = vec![0x00; 120];
//! stream.extend_from_slice(&[0x0C, 1, 65, 0, 10, 0, 10, 0]);
//!
//! let profile = EngineProfile::for_format(ReplayFormat::LegacyPkware);
//! let decoded = CommandStreamDecoder::new(&profile).decode(&stream, 0, 1000);
//!
//! assert_eq!(decoded.commands.len(), 1);
//! assert_eq!(decoded.commands[0].opcode, Opcode::Build);
//! assert_eq!(decoded.commands[0].frame, 120);
//! assert_eq!(decoded.commands[0].params.unit_type, Some(65));
//! ```

pub mod decoder;
pub mod offset;
pub mod opcode;

pub use decoder::{CommandStream, CommandStreamDecoder, DecodeStats, Termination};
pub use offset::{OffsetCandidate, OffsetRecovery, OffsetSelection};
pub use opcode::{Category, EngineProfile, Opcode, OpcodeInfo, OpcodeTable, PayloadLength};

use serde::Serialize;

/// Typed parameters decoded from a command payload.
///
/// Only the fields meaningful for the opcode are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommandParams {
    /// Unit or building type id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<u16>,

    /// Map x coordinate in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<u16>,

    /// Map y coordinate in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<u16>,

    /// Target unit tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<u16>,

    /// Control group number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<u8>,

    /// Tech or upgrade id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_id: Option<u8>,

    /// Number of units in a selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_count: Option<u8>,

    /// Whether the order was shift-queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued: Option<bool>,
}

/// A single decoded player command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Command {
    /// Frame the command was issued on.
    pub frame: u32,
    /// Dense id of the issuing player.
    pub player_id: u8,
    /// The command.
    pub opcode: Opcode,
    /// Decoded parameters.
    pub params: CommandParams,
}

impl Command {
    /// Returns the opcode's category.
    #[must_use]
    pub fn category(&self) -> Category {
        self.opcode.category()
    }

    /// Returns whether the command counts towards APM.
    #[must_use]
    pub fn is_game_action(&self) -> bool {
        self.opcode.is_game_action()
    }

    /// Returns whether the command counts towards effective APM.
    #[must_use]
    pub fn is_effective_action(&self) -> bool {
        self.is_game_action() && !self.category().is_ineffective()
    }
}
