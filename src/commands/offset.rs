//! Locating the start of the command section.
//!
//! Candidates are generated in priority order (the known offsets first,
//! then a dense scan of a bounded window) and each is scored on a short
//! lookahead window:
//!
//! - **opcode matches**: positions holding a known opcode followed by a
//!   plausible player id
//! - **frame markers**: bytes in `0x00..=0x02`
//!
//! The first candidate that clears both thresholds wins.

use serde::Serialize;

use super::opcode::OpcodeTable;
use crate::config::OffsetRecoveryConfig;
use crate::error::DecodeWarning;

/// Highest byte value that is a frame marker.
const MAX_FRAME_MARKER: u8 = 0x02;

/// A scored candidate offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OffsetCandidate {
    /// Offset into the decompressed stream.
    pub offset: usize,
    /// Opcode followed by a plausible player id.
    pub opcode_matches: usize,
    /// Frame marker bytes.
    pub frame_markers: usize,
    /// Whether the candidate passed both thresholds.
    pub accepted: bool,
    /// Whether the offset came from the known list rather than the scan.
    pub known: bool,
}

/// The chosen command section offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OffsetSelection {
    /// Offset to decode from.
    pub offset: usize,
    /// Whether a candidate was accepted.
    ///
    /// When false, `offset` is the first known offset used as a fallback.
    pub recovered: bool,
    /// The accepted candidate, if any.
    pub candidate: Option<OffsetCandidate>,
    /// Number of candidates evaluated.
    pub evaluated: usize,
}

impl OffsetSelection {
    /// Returns the warning to report when no candidate was accepted.
    #[must_use]
    pub fn warning(&self) -> Option<DecodeWarning> {
        (!self.recovered).then_some(DecodeWarning::OffsetRecoveryFailed {
            fallback_offset: self.offset,
        })
    }
}

/// The candidate generator and scorer.
#[derive(Debug, Clone, Copy)]
pub struct OffsetRecovery<'a> {
    config: &'a OffsetRecoveryConfig,
    opcodes: &'a OpcodeTable,
}

impl<'a> OffsetRecovery<'a> {
    /// Creates a recovery pass for the given settings and opcode set.
    #[must_use]
    pub fn new(config: &'a OffsetRecoveryConfig, opcodes: &'a OpcodeTable) -> Self {
        Self { config, opcodes }
    }

    /// Returns the candidate offsets that fit in the stream, in priority
    /// order, paired with whether each is a known offset.
    #[must_use]
    pub fn candidates(&self, stream_len: usize) -> Vec<(usize, bool)> {
        let known = self
            .config
            .known_offsets
            .iter()
            .map(|&offset| (offset, true));
        let scan_end = self.config.scan_end.min(stream_len);
        let scanned = (self.config.scan_start..scan_end)
            .filter(|offset| !self.config.known_offsets.contains(offset))
            .map(|offset| (offset, false));

        known
            .chain(scanned)
            .filter(|&(offset, _)| offset < stream_len)
            .collect()
    }

    /// Scores a single offset.
    #[must_use]
    pub fn score(&self, stream: &[u8], offset: usize, known: bool) -> OffsetCandidate {
        let end = offset.saturating_add(self.config.lookahead).min(stream.len());
        let window = stream.get(offset..end).unwrap_or(&[]);

        let frame_markers = window.iter().filter(|&&b| b <= MAX_FRAME_MARKER).count();
        let opcode_matches = (offset..end)
            .filter(|&pos| {
                self.opcodes.contains(stream[pos])
                    && stream
                        .get(pos + 1)
                        .is_some_and(|&player| player < self.config.max_players)
            })
            .count();

        OffsetCandidate {
            offset,
            opcode_matches,
            frame_markers,
            accepted: opcode_matches >= self.config.min_opcode_matches
                && frame_markers >= self.config.min_frame_markers,
            known,
        }
    }

    /// Scores every candidate, for diagnostics.
    #[must_use]
    pub fn evaluate_all(&self, stream: &[u8]) -> Vec<OffsetCandidate> {
        self.candidates(stream.len())
            .into_iter()
            .map(|(offset, known)| self.score(stream, offset, known))
            .collect()
    }

    /// Picks the first accepted candidate, or falls back to the first
    /// known offset.
    ///
    /// # Example
    ///
    /// ```
    /// use rep_parser::commands::{OffsetRecovery, OpcodeTable};
    /// use rep_parser::config::OffsetRecoveryConfig;
    ///
    /// let config = OffsetRecoveryConfig::default();
    /// let opcodes = OpcodeTable::standard();
    ///
    /// let mut stream = vec![0xFF; 1024];
    /// for i in 0..20 {
    ///     let at = 633 + i * 4;
    ///     stream[at..at + 4].copy_from_slice(&[0x1A, 0x00, 0x00, 0x00]);
    /// }
    ///
    /// let selection = OffsetRecovery::new(&config, &opcodes).select(&stream);
    /// assert_eq!(selection.offset, 633);
    /// assert!(selection.recovered);
    /// ```
    #[must_use]
    pub fn select(&self, stream: &[u8]) -> OffsetSelection {
        let mut evaluated = 0;

        for (offset, known) in self.candidates(stream.len()) {
            evaluated += 1;
            let candidate = self.score(stream, offset, known);
            if candidate.accepted {
                tracing::debug!(
                    "command section at offset {offset} ({} opcode matches, {} frame markers)",
                    candidate.opcode_matches,
                    candidate.frame_markers
                );
                return OffsetSelection {
                    offset,
                    recovered: true,
                    candidate: Some(candidate),
                    evaluated,
                };
            }
        }

        let fallback = self
            .config
            .known_offsets
            .first()
            .copied()
            .unwrap_or(self.config.scan_start);

        tracing::warn!(
            "no command offset candidate accepted after {evaluated} tries, using {fallback}"
        );

        OffsetSelection {
            offset: fallback,
            recovered: false,
            candidate: None,
            evaluated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recover(stream: &[u8]) -> OffsetSelection {
        let config = OffsetRecoveryConfig::default();
        let opcodes = OpcodeTable::standard();
        OffsetRecovery::new(&config, &opcodes).select(stream)
    }

    #[test]
    fn test_candidate_order() {
        let config = OffsetRecoveryConfig::default();
        let opcodes = OpcodeTable::standard();
        let recovery = OffsetRecovery::new(&config, &opcodes);

        let candidates = recovery.candidates(0x500);
        assert_eq!(
            &candidates[..5],
            &[(633, true), (637, true), (641, true), (645, true), (0x200, false)]
        );
        // Known offsets are not scanned twice
        assert_eq!(candidates.len(), 4 + (0x500 - 0x200) - 4);
        assert_eq!(candidates.iter().filter(|(o, _)| *o == 637).count(), 1);
    }

    #[test]
    fn test_candidates_beyond_stream_are_skipped() {
        let config = OffsetRecoveryConfig::default();
        let opcodes = OpcodeTable::standard();
        let recovery = OffsetRecovery::new(&config, &opcodes);

        let candidates = recovery.candidates(640);
        assert_eq!(candidates.first(), Some(&(633, true)));
        assert_eq!(candidates.iter().filter(|(_, known)| *known).count(), 2);
        assert!(candidates.iter().all(|(offset, _)| *offset < 640));
    }

    #[test]
    fn test_scan_window_clamped_to_stream() {
        let config = OffsetRecoveryConfig {
            scan_end: usize::MAX,
            ..OffsetRecoveryConfig::default()
        };
        let opcodes = OpcodeTable::standard();
        let recovery = OffsetRecovery::new(&config, &opcodes);

        let candidates = recovery.candidates(700);
        assert_eq!(candidates.len(), 4 + (700 - 0x200) - 4);
        assert_eq!(candidates.last(), Some(&(699, false)));
    }

    #[test]
    fn test_score_counts() {
        let config = OffsetRecoveryConfig::default();
        let opcodes = OpcodeTable::standard();
        let recovery = OffsetRecovery::new(&config, &opcodes);

        // Stop by player 0, Stop by player 255 (implausible), frame markers
        let stream = [0x1A, 0x00, 0x00, 0x1A, 0xFF, 0x00, 0x01, 0x02, 0xFF];
        let candidate = recovery.score(&stream, 0, true);

        assert_eq!(candidate.opcode_matches, 1);
        assert_eq!(candidate.frame_markers, 5);
        assert!(!candidate.accepted);
    }

    #[test]
    fn test_second_known_offset_chosen() {
        let mut stream = vec![0xFF; 0x600];
        // Shared by the windows of 633 and 637: two matches, five markers
        stream[640..642].copy_from_slice(&[0x36, 0x03]);
        stream[650..652].copy_from_slice(&[0x36, 0x04]);
        stream[660..665].copy_from_slice(&[0x00; 5]);
        // Only inside the window of 637
        stream[697..699].copy_from_slice(&[0x36, 0x03]);

        let selection = recover(&stream);
        assert_eq!(selection.offset, 637);
        assert!(selection.recovered);
        assert_eq!(selection.evaluated, 2);

        let candidate = selection.candidate.unwrap();
        assert_eq!(candidate.opcode_matches, 3);
        assert_eq!(candidate.frame_markers, 5);
        assert!(candidate.known);
        assert!(selection.warning().is_none());
    }

    #[test]
    fn test_dense_scan_finds_unlisted_offset() {
        let mut stream = vec![0xFF; 0x600];
        for i in 0..10 {
            let at = 0x400 + i * 4;
            stream[at..at + 4].copy_from_slice(&[0x1A, 0x01, 0x00, 0x00]);
        }

        let selection = recover(&stream);
        assert!(selection.recovered);
        assert!(!selection.candidate.unwrap().known);
        assert!(selection.offset <= 0x400);
        assert!(selection.offset > 0x400 - 64);
    }

    #[test]
    fn test_fallback_when_nothing_passes() {
        let stream = vec![0xFF; 0x600];
        let selection = recover(&stream);

        assert_eq!(selection.offset, 633);
        assert!(!selection.recovered);
        assert!(selection.candidate.is_none());
        assert_eq!(
            selection.warning(),
            Some(DecodeWarning::OffsetRecoveryFailed {
                fallback_offset: 633
            })
        );
    }

    #[test]
    fn test_short_stream() {
        let selection = recover(&[0u8; 100]);
        assert!(!selection.recovered);
        assert_eq!(selection.evaluated, 0);
    }
}
