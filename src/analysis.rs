//! The decoding pipeline.
//!
//! [`ReplayDecoder`] runs every stage in order:
//!
//! 1. detect the container format
//! 2. decompress the payload (optionally falling back to the raw bytes)
//! 3. decode the header
//! 4. locate the command section
//! 5. decode the command stream
//! 6. derive metrics, build orders and quality flags
//!
//! Stages 1 to 3 can fail; everything after the header only degrades the
//! reported confidence.

use serde::Serialize;

use crate::commands::{
    Command, CommandStreamDecoder, DecodeStats, EngineProfile, OffsetCandidate, OffsetRecovery,
};
use crate::config::DecoderConfig;
use crate::decompress::decompress;
use crate::error::{DecodeError, DecodeWarning, Result};
use crate::format::{ReplayContainer, ReplayFormat};
use crate::header::{HeaderLayout, ReplayHeader};
use crate::metrics::{self, assess_command_count, BuildOrder, PlayerMetrics, QualityFlags};

/// The full result of decoding one replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayAnalysis {
    /// Detected container format.
    pub format: ReplayFormat,
    /// Decoded header.
    pub header: ReplayHeader,
    /// Commands in stream order.
    pub commands: Vec<Command>,
    /// Per-player activity, in player id order.
    pub metrics: Vec<PlayerMetrics>,
    /// Per-player build orders, in player id order.
    pub build_orders: Vec<BuildOrder>,
    /// How far the decode can be trusted.
    pub quality: QualityFlags,
    /// Command decoder counters.
    pub stats: DecodeStats,
}

impl ReplayAnalysis {
    /// Returns the simulation frame rate used for timings.
    #[must_use]
    pub fn fps(&self) -> f64 {
        self.format.frames_per_second()
    }

    /// Returns the game length in minutes.
    #[must_use]
    pub fn game_minutes(&self) -> f64 {
        metrics::game_minutes(self.header.frame_count, self.fps())
    }

    /// Returns the non-fatal warnings raised while decoding.
    #[must_use]
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.quality.warnings
    }
}

/// A decompressed replay stream with its origin.
#[derive(Debug, Clone)]
pub struct DecodedStream {
    /// Detected container format.
    pub format: ReplayFormat,
    /// Detection confidence.
    pub format_confidence: f32,
    /// The decompressed bytes.
    pub bytes: Vec<u8>,
    /// Why decompression failed, if the raw payload was used instead.
    pub fallback_reason: Option<String>,
}

impl DecodedStream {
    /// Returns whether the raw fallback was used.
    #[must_use]
    pub fn used_raw_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Decodes replays with a fixed configuration.
///
/// The decoder holds no state between calls; one value can decode any
/// number of replays.
///
/// # Example
///
/// ```
/// use rep_parser::config::DecoderConfig;
/// use rep_parser::ReplayDecoder;
///
/// let decoder = ReplayDecoder::new(DecoderConfig::default());
/// assert!(decoder.decode(&[0u8; 8]).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReplayDecoder {
    config: DecoderConfig,
}

impl ReplayDecoder {
    /// Creates a decoder with the given configuration.
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Detects the format and decompresses the payload.
    ///
    /// With `allow_raw_fallback` set, a decompression failure is retried by
    /// reading the payload as uncompressed.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::FormatUnrecognized` for buffers too short to
    /// classify, and `DecodeError::DecompressionFailed` when decompression
    /// fails and the fallback is disabled or also fails.
    pub fn decompress(&self, bytes: &[u8]) -> Result<DecodedStream> {
        let container = ReplayContainer::detect(bytes)?;
        tracing::debug!(
            "detected {:?} container ({} bytes, confidence {:.2})",
            container.format(),
            bytes.len(),
            container.confidence()
        );

        let limits = &self.config.decompression;
        let (stream, fallback_reason) = match decompress(&container, limits) {
            Ok(stream) => (stream, None),
            Err(DecodeError::DecompressionFailed { reason }) if self.config.allow_raw_fallback => {
                tracing::warn!("decompression failed ({reason}), reading payload as uncompressed");
                let raw = ReplayContainer::with_format(bytes, ReplayFormat::Uncompressed);
                (decompress(&raw, limits)?, Some(reason))
            }
            Err(e) => return Err(e),
        };

        tracing::debug!("decompressed stream is {} bytes", stream.len());

        Ok(DecodedStream {
            format: container.format(),
            format_confidence: container.confidence(),
            bytes: stream,
            fallback_reason,
        })
    }

    /// Scores every command offset candidate of a replay, for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`ReplayDecoder::decompress`].
    pub fn offset_candidates(&self, bytes: &[u8]) -> Result<Vec<OffsetCandidate>> {
        let stream = self.decompress(bytes)?;
        let profile = EngineProfile::for_format(stream.format);
        let recovery = OffsetRecovery::new(&self.config.offsets, &profile.opcodes);
        Ok(recovery.evaluate_all(&stream.bytes))
    }

    /// Decodes a replay.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::FormatUnrecognized`,
    /// `DecodeError::DecompressionFailed` or `DecodeError::HeaderTruncated`.
    /// No partial result is returned on error.
    pub fn decode(&self, bytes: &[u8]) -> Result<ReplayAnalysis> {
        let stream = self.decompress(bytes)?;
        let mut warnings = Vec::new();
        if let Some(reason) = &stream.fallback_reason {
            warnings.push(DecodeWarning::DecompressionFallback {
                reason: reason.clone(),
            });
        }

        let header = ReplayHeader::decode(&stream.bytes, &HeaderLayout::NOMINAL)?;
        tracing::debug!(
            "header: engine {}, {} frames, {} players, map {:?}",
            header.engine_version,
            header.frame_count,
            header.player_count(),
            header.map_name
        );
        if let Some(warning) = header.frame_count_warning() {
            tracing::warn!("{warning}");
            warnings.push(warning);
        }

        let profile = EngineProfile::for_format(stream.format);
        let offset =
            OffsetRecovery::new(&self.config.offsets, &profile.opcodes).select(&stream.bytes);
        if let Some(warning) = offset.warning() {
            warnings.push(warning);
        }

        let decoded = CommandStreamDecoder::new(&profile)
            .with_max_commands(self.config.commands.max_commands)
            .decode(&stream.bytes, offset.offset, header.frame_count);
        if decoded.commands.is_empty() {
            tracing::warn!("no commands decoded from offset {}", offset.offset);
            warnings.push(DecodeWarning::CommandStreamEmpty);
        }

        let report = metrics::compute_metrics(
            &header,
            &decoded.commands,
            profile.fps,
            &self.config.metrics,
        );
        let command_count = assess_command_count(
            header.player_count(),
            report.game_minutes,
            decoded.commands.len(),
            &self.config.metrics,
        );
        let quality = QualityFlags::new(
            stream.format_confidence,
            stream.used_raw_fallback(),
            offset,
            command_count,
            warnings,
        );
        tracing::debug!(
            "decoded {} commands, {:?} command count, confidence {:.2}",
            decoded.commands.len(),
            quality.command_count.assessment,
            quality.confidence
        );

        Ok(ReplayAnalysis {
            format: stream.format,
            header,
            commands: decoded.commands,
            metrics: report.players,
            build_orders: report.build_orders,
            quality,
            stats: decoded.stats,
        })
    }
}

/// Decodes a replay with the default configuration.
///
/// # Errors
///
/// Returns `DecodeError::FormatUnrecognized`,
/// `DecodeError::DecompressionFailed` or `DecodeError::HeaderTruncated`.
///
/// # Example
///
/// ```
/// use rep_parser::{decode_replay, DecodeError};
///
/// let err = decode_replay(&[0u8; 10]).unwrap_err();
/// assert!(matches!(err, DecodeError::FormatUnrecognized { .. }));
/// ```
pub fn decode_replay(bytes: &[u8]) -> Result<ReplayAnalysis> {
    ReplayDecoder::default().decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Opcode;
    use crate::metrics::CommandCountAssessment;

    const COMMAND_OFFSET: usize = 633;

    /// Builds a legacy container holding one stored chunk.
    fn legacy_container(stream: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 16];
        data[12..16].copy_from_slice(b"reRS");
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&(stream.len() as u32).to_le_bytes());
        data.extend_from_slice(stream);
        data
    }

    /// A decompressed stream with one player and the given commands.
    fn stream(frames: u32, commands: &[u8]) -> Vec<u8> {
        let mut stream = vec![0u8; COMMAND_OFFSET];
        stream[0x00..0x04].copy_from_slice(&59u32.to_le_bytes());
        stream[0x04..0x08].copy_from_slice(&frames.to_le_bytes());
        stream[0x161..0x166].copy_from_slice(b"Flash");
        stream[0x161 + 32] = 1;
        stream.extend_from_slice(commands);
        if stream.len() < 0x311 {
            stream.resize(0x311, 0);
        }
        stream
    }

    fn stops(count: usize) -> Vec<u8> {
        (0..count)
            .flat_map(|_| [0x1A, 0x00, 0x00, 0x01, 0x0B])
            .collect()
    }

    #[test]
    fn test_decode_legacy_stored() {
        let data = legacy_container(&stream(1440, &stops(120)));
        let analysis = decode_replay(&data).unwrap();

        assert_eq!(analysis.format, ReplayFormat::LegacyPkware);
        assert_eq!(analysis.header.players.len(), 1);
        assert_eq!(analysis.commands.len(), 120);
        assert!(analysis.commands.iter().all(|c| c.opcode == Opcode::Stop));
        assert!((analysis.metrics[0].apm - 120.0).abs() < 1e-9);
        assert_eq!(
            analysis.quality.command_count.assessment,
            CommandCountAssessment::Realistic
        );
        assert!(analysis.quality.offset.recovered);
        assert_eq!(analysis.quality.offset.offset, COMMAND_OFFSET);
        assert!(analysis.warnings().is_empty());
        assert!((analysis.quality.confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_empty_command_stream_warns() {
        let data = legacy_container(&stream(1440, &[]));
        let analysis = decode_replay(&data).unwrap();

        assert!(analysis.commands.is_empty());
        assert!(analysis
            .warnings()
            .contains(&DecodeWarning::CommandStreamEmpty));
        assert!(analysis
            .warnings()
            .iter()
            .any(|w| matches!(w, DecodeWarning::OffsetRecoveryFailed { .. })));
        assert!(analysis.quality.confidence < 0.1);
    }

    #[test]
    fn test_short_stream_is_truncated_header() {
        let data = legacy_container(&[0u8; 100]);
        let err = decode_replay(&data).unwrap_err();
        assert_eq!(err, DecodeError::truncated(0x311, 100));
    }

    #[test]
    fn test_raw_fallback() {
        // Chunk length runs past the end of the file
        let mut data = vec![0u8; 16];
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(&stream(1440, &stops(120)));

        assert!(matches!(
            decode_replay(&data),
            Err(DecodeError::DecompressionFailed { .. })
        ));

        let config = DecoderConfig {
            allow_raw_fallback: true,
            ..DecoderConfig::default()
        };
        let analysis = ReplayDecoder::new(config).decode(&data).unwrap();
        assert!(analysis.quality.used_raw_fallback);
        assert!(matches!(
            analysis.warnings().first(),
            Some(DecodeWarning::DecompressionFallback { .. })
        ));
        assert!(analysis.quality.confidence <= 0.85 * 0.5 + 1e-6);
    }

    #[test]
    fn test_offset_candidates() {
        let data = legacy_container(&stream(1440, &stops(120)));
        let candidates = ReplayDecoder::default().offset_candidates(&data).unwrap();

        assert_eq!(candidates[0].offset, COMMAND_OFFSET);
        assert!(candidates[0].accepted);
        assert!(candidates[0].known);
    }
}
