//! The frame/command state machine.

use serde::Serialize;

use super::opcode::{EngineProfile, Opcode, PayloadLength};
use super::{Command, CommandParams};
use crate::binary::{read_u16_le, read_u8};

/// Frame marker: advance one frame.
pub const FRAME_STEP: u8 = 0x00;

/// Frame marker: advance by the following byte.
pub const FRAME_SKIP_U8: u8 = 0x01;

/// Frame marker: advance by the following u16.
pub const FRAME_SKIP_U16: u8 = 0x02;

/// Largest selection the game allows.
pub const MAX_SELECTION: u8 = 12;

/// Default cap on emitted commands.
pub const DEFAULT_MAX_COMMANDS: usize = 20_000;

/// Why decoding stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The cursor reached the end of the stream.
    EndOfStream,
    /// The current frame passed the header's frame count.
    FrameLimit,
    /// The emitted-command cap was reached.
    CommandLimit,
    /// A command or frame marker ran past the end of the stream.
    TruncatedCommand,
}

/// Counters collected while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Offset decoding started at.
    pub start_offset: usize,
    /// Bytes walked from the start offset.
    pub bytes_consumed: usize,
    /// Bytes skipped because they were not a valid command start.
    pub unknown_bytes: usize,
    /// Frame marker records seen.
    pub frame_markers: usize,
    /// Frame reached when decoding stopped.
    pub final_frame: u32,
    /// Why decoding stopped.
    pub termination: Termination,
}

/// The output of a decoding run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStream {
    /// Commands in stream order; frames never decrease.
    pub commands: Vec<Command>,
    /// Counters.
    pub stats: DecodeStats,
}

/// Decodes the command section of a stream.
#[derive(Debug, Clone)]
pub struct CommandStreamDecoder<'p> {
    profile: &'p EngineProfile,
    max_commands: usize,
}

impl<'p> CommandStreamDecoder<'p> {
    /// Creates a decoder with the default command cap.
    #[must_use]
    pub fn new(profile: &'p EngineProfile) -> Self {
        Self {
            profile,
            max_commands: DEFAULT_MAX_COMMANDS,
        }
    }

    /// Sets the emitted-command cap.
    #[must_use]
    pub fn with_max_commands(mut self, max_commands: usize) -> Self {
        self.max_commands = max_commands;
        self
    }

    /// Decodes commands starting at `start` until the stream ends, the
    /// frame passes `frame_count`, or the command cap is hit.
    ///
    /// Never fails: bytes that do not start a known command are skipped one
    /// at a time, and a truncated tail ends decoding with what was
    /// collected so far.
    ///
    /// # Arguments
    ///
    /// * `stream` - The decompressed replay stream
    /// * `start` - Offset of the first command byte
    /// * `frame_count` - Last frame of the game
    #[must_use]
    pub fn decode(&self, stream: &[u8], start: usize, frame_count: u32) -> CommandStream {
        let mut commands = Vec::new();
        let mut cursor = start;
        let mut frame: u32 = 0;
        let mut unknown_bytes = 0usize;
        let mut frame_markers = 0usize;

        let termination = loop {
            if cursor >= stream.len() {
                break Termination::EndOfStream;
            }
            if frame > frame_count {
                break Termination::FrameLimit;
            }
            if commands.len() >= self.max_commands {
                break Termination::CommandLimit;
            }

            let byte = stream[cursor];
            match byte {
                FRAME_STEP => {
                    frame = frame.saturating_add(1);
                    frame_markers += 1;
                    cursor += 1;
                }
                FRAME_SKIP_U8 => {
                    let Ok(skip) = read_u8(stream, cursor + 1) else {
                        break Termination::TruncatedCommand;
                    };
                    frame = frame.saturating_add(u32::from(skip));
                    frame_markers += 1;
                    cursor += 2;
                }
                FRAME_SKIP_U16 => {
                    let Ok(skip) = read_u16_le(stream, cursor + 1) else {
                        break Termination::TruncatedCommand;
                    };
                    frame = frame.saturating_add(u32::from(skip));
                    frame_markers += 1;
                    cursor += 3;
                }
                _ => {
                    let Some(opcode) = self.profile.opcodes.lookup(byte) else {
                        unknown_bytes += 1;
                        cursor += 1;
                        continue;
                    };

                    let length = match opcode.payload_length() {
                        PayloadLength::Fixed(len) => len,
                        selection @ PayloadLength::Selection { .. } => {
                            let Ok(count) = read_u8(stream, cursor + 2) else {
                                break Termination::TruncatedCommand;
                            };
                            if count == 0 || count > MAX_SELECTION {
                                // Misaligned; resynchronise on the next byte.
                                unknown_bytes += 1;
                                cursor += 1;
                                continue;
                            }
                            selection.resolve(count)
                        }
                    };

                    let Some(payload) = stream.get(cursor..cursor + length) else {
                        break Termination::TruncatedCommand;
                    };

                    commands.push(Command {
                        frame,
                        player_id: payload[1],
                        opcode,
                        params: decode_params(opcode, payload),
                    });
                    cursor += length;
                }
            }
        };

        let stats = DecodeStats {
            start_offset: start,
            bytes_consumed: cursor.min(stream.len()).saturating_sub(start),
            unknown_bytes,
            frame_markers,
            final_frame: frame,
            termination,
        };

        tracing::debug!(
            "decoded {} commands from offset {start} ({:?}, {} unknown bytes)",
            commands.len(),
            termination,
            unknown_bytes
        );

        CommandStream { commands, stats }
    }
}

/// Decodes the typed parameters of a complete command payload.
///
/// `payload` starts at the opcode byte and has the opcode's full length.
#[must_use]
pub fn decode_params(opcode: Opcode, payload: &[u8]) -> CommandParams {
    let u16_at = |offset: usize| read_u16_le(payload, offset).ok();
    let u8_at = |offset: usize| read_u8(payload, offset).ok();
    let flag_at = |offset: usize| u8_at(offset).map(|b| b != 0);

    match opcode {
        Opcode::Build => CommandParams {
            unit_type: u16_at(2),
            x: u16_at(4),
            y: u16_at(6),
            ..CommandParams::default()
        },
        Opcode::Train | Opcode::UnitMorph | Opcode::BuildingMorph => CommandParams {
            unit_type: u16_at(2),
            ..CommandParams::default()
        },
        Opcode::Tech | Opcode::Upgrade => CommandParams {
            research_id: u8_at(2),
            ..CommandParams::default()
        },
        Opcode::Hotkey => CommandParams {
            hotkey: u8_at(3),
            ..CommandParams::default()
        },
        Opcode::RightClick => CommandParams {
            x: u16_at(2),
            y: u16_at(4),
            target_id: u16_at(6),
            unit_type: u16_at(8),
            queued: flag_at(10),
            ..CommandParams::default()
        },
        Opcode::TargetedOrder => CommandParams {
            x: u16_at(2),
            y: u16_at(4),
            target_id: u16_at(6),
            unit_type: u16_at(8),
            queued: flag_at(11),
            ..CommandParams::default()
        },
        Opcode::RightClick121 => CommandParams {
            x: u16_at(2),
            y: u16_at(4),
            target_id: u16_at(6),
            unit_type: u16_at(10),
            queued: flag_at(12),
            ..CommandParams::default()
        },
        Opcode::TargetedOrder121 => CommandParams {
            x: u16_at(2),
            y: u16_at(4),
            target_id: u16_at(6),
            unit_type: u16_at(10),
            queued: flag_at(13),
            ..CommandParams::default()
        },
        Opcode::Select
        | Opcode::ShiftSelect
        | Opcode::ShiftDeselect
        | Opcode::Select121
        | Opcode::ShiftSelect121
        | Opcode::ShiftDeselect121 => CommandParams {
            unit_count: u8_at(2),
            ..CommandParams::default()
        },
        Opcode::Stop | Opcode::ReturnCargo | Opcode::HoldPosition => CommandParams {
            queued: flag_at(2),
            ..CommandParams::default()
        },
        Opcode::LiftOff | Opcode::MinimapPing => CommandParams {
            x: u16_at(2),
            y: u16_at(4),
            ..CommandParams::default()
        },
        _ => CommandParams::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ReplayFormat;

    fn legacy() -> EngineProfile {
        EngineProfile::for_format(ReplayFormat::LegacyPkware)
    }

    fn decode(stream: &[u8]) -> CommandStream {
        CommandStreamDecoder::new(&legacy()).decode(stream, 0, u32::MAX)
    }

    // ========================
    // frame markers
    // ========================

    #[test]
    fn test_frame_markers() {
        let stream = [
            0x00, // +1
            0x01, 0x0A, // +10
            0x02, 0x00, 0x01, // +256
            0x1A, 0x00, 0x00, // Stop
        ];
        let decoded = decode(&stream);

        assert_eq!(decoded.commands.len(), 1);
        assert_eq!(decoded.commands[0].frame, 267);
        assert_eq!(decoded.stats.frame_markers, 3);
        assert_eq!(decoded.stats.final_frame, 267);
        assert_eq!(decoded.stats.termination, Termination::EndOfStream);
        assert_eq!(decoded.stats.bytes_consumed, stream.len());
    }

    #[test]
    fn test_build_scenario() {
        let mut stream = vec![0x00; 120];
        stream.extend_from_slice(&[0x0C, 0x01, 65, 0, 10, 0, 10, 0]);
        let decoded = decode(&stream);

        assert_eq!(decoded.commands.len(), 1);
        let build = decoded.commands[0];
        assert_eq!(build.frame, 120);
        assert_eq!(build.player_id, 1);
        assert_eq!(build.opcode, Opcode::Build);
        assert_eq!(build.params.unit_type, Some(65));
        assert_eq!(build.params.x, Some(10));
        assert_eq!(build.params.y, Some(10));
    }

    #[test]
    fn test_frame_limit() {
        let stream = [0x1A, 0x00, 0x00, 0x01, 0x05, 0x1A, 0x01, 0x00];
        let decoded = CommandStreamDecoder::new(&legacy()).decode(&stream, 0, 4);

        assert_eq!(decoded.commands.len(), 1);
        assert_eq!(decoded.stats.termination, Termination::FrameLimit);
    }

    #[test]
    fn test_large_frame_skips() {
        let stream: Vec<u8> = std::iter::repeat([0x02, 0xFF, 0xFF]).take(3).flatten().collect();
        let decoded = decode(&stream);
        assert_eq!(decoded.stats.final_frame, 3 * 0xFFFF);
        assert_eq!(decoded.stats.frame_markers, 3);
    }

    // ========================
    // resynchronisation
    // ========================

    #[test]
    fn test_unknown_byte_skipped_by_one() {
        // 0x24 is not an opcode; 0x1A right after must still decode.
        let stream = [0x24, 0x1A, 0x02, 0x01];
        let decoded = decode(&stream);

        assert_eq!(decoded.stats.unknown_bytes, 1);
        assert_eq!(decoded.commands.len(), 1);
        assert_eq!(decoded.commands[0].opcode, Opcode::Stop);
        assert_eq!(decoded.commands[0].player_id, 2);
        assert_eq!(decoded.commands[0].params.queued, Some(true));
    }

    #[test]
    fn test_extended_opcode_unknown_in_legacy_profile() {
        let stream = [0x63, 0x1A, 0x00, 0x00];
        let decoded = decode(&stream);
        assert_eq!(decoded.stats.unknown_bytes, 1);
        assert_eq!(decoded.commands[0].opcode, Opcode::Stop);
    }

    #[test]
    fn test_bad_selection_count_resyncs() {
        // Counts of 0 and 255 are both misaligned
        let stream = [0x09, 0x00, 0x00, 0x09, 0x00, 0xFF, 0x1A, 0x00, 0x00];
        let decoded = decode(&stream);

        let opcodes: Vec<Opcode> = decoded.commands.iter().map(|c| c.opcode).collect();
        assert!(!opcodes.contains(&Opcode::Select));
        assert!(opcodes.contains(&Opcode::Stop));
    }

    #[test]
    fn test_selection_lengths() {
        let mut stream = vec![0x09, 0x00, 0x02, 0x10, 0x00, 0x11, 0x00];
        stream.extend_from_slice(&[0x1A, 0x00, 0x00]);
        let decoded = decode(&stream);

        assert_eq!(decoded.commands.len(), 2);
        assert_eq!(decoded.commands[0].params.unit_count, Some(2));
        assert_eq!(decoded.commands[1].opcode, Opcode::Stop);

        let profile = EngineProfile::for_format(ReplayFormat::Modern121);
        let mut stream = vec![0x63, 0x00, 0x01, 0x10, 0x00, 0x00, 0x00];
        stream.extend_from_slice(&[0x1A, 0x00, 0x00]);
        let decoded = CommandStreamDecoder::new(&profile).decode(&stream, 0, 100);

        assert_eq!(decoded.commands.len(), 2);
        assert_eq!(decoded.commands[0].opcode, Opcode::Select121);
    }

    // ========================
    // termination
    // ========================

    #[test]
    fn test_truncated_command() {
        let stream = [0x1A, 0x00, 0x00, 0x0C, 0x00, 0x41];
        let decoded = decode(&stream);

        assert_eq!(decoded.commands.len(), 1);
        assert_eq!(decoded.stats.termination, Termination::TruncatedCommand);
    }

    #[test]
    fn test_truncated_frame_skip() {
        let decoded = decode(&[0x00, 0x02, 0x05]);
        assert_eq!(decoded.stats.termination, Termination::TruncatedCommand);
        assert_eq!(decoded.stats.final_frame, 1);
    }

    #[test]
    fn test_command_cap() {
        let stream: Vec<u8> = std::iter::repeat([0x1A, 0x00, 0x00]).take(50).flatten().collect();
        let decoded = CommandStreamDecoder::new(&legacy())
            .with_max_commands(10)
            .decode(&stream, 0, 100);

        assert_eq!(decoded.commands.len(), 10);
        assert_eq!(decoded.stats.termination, Termination::CommandLimit);
    }

    #[test]
    fn test_start_offset_past_end() {
        let decoded = CommandStreamDecoder::new(&legacy()).decode(&[0x00; 4], 10, 100);
        assert!(decoded.commands.is_empty());
        assert_eq!(decoded.stats.bytes_consumed, 0);
        assert_eq!(decoded.stats.termination, Termination::EndOfStream);
    }

    #[test]
    fn test_frames_never_decrease() {
        let stream = [
            0x13, 0x00, 0x00, 0x01, 0x1F, 0x01, 0x07, 0x00, 0x00, 0x00, 0x30, 0x01, 0x05, 0x01,
            0x20, 0x32, 0x00, 0x02,
        ];
        let decoded = decode(&stream);
        assert!(decoded
            .commands
            .windows(2)
            .all(|pair| pair[0].frame <= pair[1].frame));
        assert_eq!(decoded.commands.len(), 4);
    }

    // ========================
    // parameters
    // ========================

    #[test]
    fn test_decode_params() {
        let params = decode_params(Opcode::Hotkey, &[0x13, 0x00, 0x01, 0x04]);
        assert_eq!(params.hotkey, Some(4));

        let params = decode_params(Opcode::Tech, &[0x30, 0x00, 0x07]);
        assert_eq!(params.research_id, Some(7));
        assert_eq!(params.unit_type, None);

        let click = [0x14, 0x00, 0x20, 0x00, 0x30, 0x00, 0x99, 0x00, 0x00, 0x00, 0x01];
        let params = decode_params(Opcode::RightClick, &click);
        assert_eq!(params.x, Some(0x20));
        assert_eq!(params.y, Some(0x30));
        assert_eq!(params.target_id, Some(0x99));
        assert_eq!(params.unit_type, Some(0));
        assert_eq!(params.queued, Some(true));

        let params = decode_params(Opcode::KeepAlive, &[0x05, 0x00]);
        assert_eq!(params, CommandParams::default());
    }
}
