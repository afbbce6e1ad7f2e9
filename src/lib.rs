//! # Rep Parser
//!
//! A decoder for RTS `.rep` replay files.
//!
//! A replay is a recorded command log: the header describes the map and
//! the players, and the command section lists every player command with
//! the frame it was issued on. This library turns the raw file into that
//! timeline and derives activity metrics from it:
//! - **APM / EAPM** per player, with a per-minute breakdown
//! - **Build orders** with a supply estimate
//! - **Quality flags** describing how far the decode can be trusted
//!
//! ## Quick Start
//!
//! ```no_run
//! use rep_parser::decode_replay;
//! use rep_parser::error::Result;
//!
//! fn print_apm(data: &[u8]) -> Result<()> {
//!     let analysis = decode_replay(data)?;
//!
//!     println!("Format: {:?}", analysis.format);
//!     println!("Map: {}", analysis.header.map_name);
//!
//!     for player in &analysis.metrics {
//!         println!("{}: {:.0} APM, {:.0} EAPM", player.name, player.apm, player.eapm);
//!     }
//!     println!("Confidence: {:.2}", analysis.quality.confidence);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`error`] - Fatal errors, non-fatal warnings and the result alias
//! - [`binary`] - Low-level little-endian reading helpers
//! - [`format`] - Container format detection
//! - [`decompress`] - zlib and PKWare DCL decompression
//! - [`header`] - Header and player table decoding
//! - [`commands`] - Opcode table, command offset recovery and the command decoder
//! - [`units`] - Unit and building reference data
//! - [`metrics`] - APM, EAPM, build orders and the command count check
//! - [`config`] - Decoder configuration
//! - [`analysis`] - The pipeline tying the stages together
//!
//! ## Format Reference
//!
//! - **Legacy**: sections of PKWare DCL imploded (or stored) chunks from
//!   offset 16, 24 frames per second
//! - **Modern**: zlib streams from offset 28, 23.81 frames per second
//! - **1.21+** (`seRS` tag): modern layout with an extended command set
//!
//! All multi-byte integers are stored in little-endian byte order.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub mod binary;
pub mod commands;
pub mod config;
pub mod decompress;
pub mod error;
pub mod format;
pub mod header;
pub mod metrics;
pub mod units;

// Re-export commonly used types at the crate root
pub use analysis::{decode_replay, DecodedStream, ReplayAnalysis, ReplayDecoder};
pub use commands::{Command, CommandParams, Opcode, OffsetCandidate, OffsetSelection};
pub use config::DecoderConfig;
pub use decompress::decompress;
pub use error::{DecodeError, DecodeWarning, Result};
pub use format::{detect_format, ReplayContainer, ReplayFormat};
pub use header::{GameType, PlayerSlot, Race, ReplayHeader};
pub use metrics::{
    BuildCategory, BuildOrder, BuildOrderEntry, CommandCountAssessment, PlayerMetrics,
    QualityFlags,
};
