//! Decoder configuration.
//!
//! All hard bounds and heuristic thresholds used by the pipeline are grouped
//! here. Every field has a default, so a partial JSON document (or none at
//! all) yields a usable configuration:
//!
//! ```
//! use rep_parser::config::DecoderConfig;
//!
//! let config: DecoderConfig =
//!     serde_json::from_str(r#"{ "commands": { "max_commands": 500 } }"#).unwrap();
//! assert_eq!(config.commands.max_commands, 500);
//! assert_eq!(config.offsets.min_opcode_matches, 3);
//! ```

use serde::{Deserialize, Serialize};

/// Top-level configuration for [`crate::ReplayDecoder`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Decompression bounds.
    pub decompression: DecompressionConfig,

    /// Offset recovery heuristic settings.
    pub offsets: OffsetRecoveryConfig,

    /// Command stream decoder bounds.
    pub commands: CommandDecoderConfig,

    /// Metrics engine settings.
    pub metrics: MetricsConfig,

    /// Retry as uncompressed when the declared decompression fails.
    ///
    /// The fallback is always reported in the result's quality flags.
    pub allow_raw_fallback: bool,
}

/// Bounds applied while inflating or exploding the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompressionConfig {
    /// Maximum size of the decompressed stream in bytes.
    pub max_decompressed_size: usize,

    /// Number of leading bytes scanned for a zlib header when none of the
    /// expected offsets match.
    pub zlib_scan_window: usize,

    /// Largest gap between the end of one zlib stream and the start of the
    /// next for the second stream to be treated as a continuation.
    pub max_chunk_gap: usize,

    /// Maximum number of sections walked in a legacy container.
    pub max_sections: usize,

    /// Maximum number of chunks in a single legacy section.
    pub max_chunks_per_section: usize,
}

impl Default for DecompressionConfig {
    fn default() -> Self {
        Self {
            max_decompressed_size: 32 * 1024 * 1024,
            zlib_scan_window: 200,
            max_chunk_gap: 16,
            max_sections: 64,
            max_chunks_per_section: 4096,
        }
    }
}

/// Settings for locating the start of the command section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffsetRecoveryConfig {
    /// Known command-section offsets, tried first and in order.
    pub known_offsets: Vec<usize>,

    /// First offset of the dense fallback scan (inclusive).
    pub scan_start: usize,

    /// End of the dense fallback scan (exclusive).
    pub scan_end: usize,

    /// Number of bytes inspected after each candidate.
    pub lookahead: usize,

    /// Player ids at or above this value are implausible.
    pub max_players: u8,

    /// Minimum opcode matches for a candidate to be accepted.
    pub min_opcode_matches: usize,

    /// Minimum frame-sync bytes for a candidate to be accepted.
    pub min_frame_markers: usize,
}

impl Default for OffsetRecoveryConfig {
    fn default() -> Self {
        Self {
            known_offsets: vec![633, 637, 641, 645],
            scan_start: 0x200,
            scan_end: 0x500,
            lookahead: 64,
            max_players: 8,
            min_opcode_matches: 3,
            min_frame_markers: 5,
        }
    }
}

/// Bounds for the command stream state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandDecoderConfig {
    /// Decoding stops after this many commands have been emitted.
    pub max_commands: usize,
}

impl Default for CommandDecoderConfig {
    fn default() -> Self {
        Self {
            max_commands: 20_000,
        }
    }
}

/// Settings for the derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Number of build order entries kept per player.
    pub build_order_limit: usize,

    /// Supply assumed before any build action.
    pub min_supply: u32,

    /// Supply ceiling.
    pub max_supply: u32,

    /// Commands per player-minute assumed by the quality check.
    pub assumed_commands_per_minute: f64,

    /// Relative tolerance around the expected command total.
    pub command_tolerance: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            build_order_limit: 25,
            min_supply: 4,
            max_supply: 200,
            assumed_commands_per_minute: 150.0,
            command_tolerance: 0.85,
        }
    }
}
