//! Decode quality reporting.
//!
//! The command count check compares the number of decoded commands with
//! what a game of that length and player count would normally produce. A
//! wrong command offset or a misaligned stream usually shows up here as a
//! total far too low, or implausibly high.

use serde::Serialize;

use crate::commands::OffsetSelection;
use crate::config::MetricsConfig;
use crate::error::DecodeWarning;

/// Degradation applied when the raw fallback was used.
const FALLBACK_PENALTY: f32 = 0.5;
/// Degradation applied when no offset candidate was accepted.
const OFFSET_PENALTY: f32 = 0.6;
/// Degradation applied when the frame count was estimated.
const FRAME_COUNT_PENALTY: f32 = 0.8;
/// Degradation applied to a suspicious command count.
const SUSPICIOUS_PENALTY: f32 = 0.7;
/// Degradation applied to an insufficient command count.
const INSUFFICIENT_PENALTY: f32 = 0.5;
/// Degradation applied when no commands were decoded.
const EMPTY_PENALTY: f32 = 0.2;

/// Outcome of the command count check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCountAssessment {
    /// Within the expected range.
    Realistic,
    /// More commands than expected.
    Suspicious,
    /// Fewer commands than expected.
    Insufficient,
}

/// The command count check with its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CommandCountCheck {
    /// Commands decoded.
    pub observed: usize,
    /// Commands expected.
    pub expected: f64,
    /// Lowest realistic total.
    pub lower_bound: f64,
    /// Highest realistic total.
    pub upper_bound: f64,
    /// Verdict.
    pub assessment: CommandCountAssessment,
}

/// Compares the decoded command total with the expected range.
///
/// A game with no players or no length has an expected total of zero,
/// which is always reported as insufficient.
///
/// # Example
///
/// ```
/// use rep_parser::config::MetricsConfig;
/// use rep_parser::metrics::{assess_command_count, CommandCountAssessment};
///
/// let config = MetricsConfig::default();
///
/// // Two players for ten minutes: 3000 expected, 450..=5550 realistic
/// let check = assess_command_count(2, 10.0, 2000, &config);
/// assert_eq!(check.assessment, CommandCountAssessment::Realistic);
///
/// let check = assess_command_count(2, 10.0, 40, &config);
/// assert_eq!(check.assessment, CommandCountAssessment::Insufficient);
/// ```
#[must_use]
pub fn assess_command_count(
    player_count: usize,
    game_minutes: f64,
    observed: usize,
    config: &MetricsConfig,
) -> CommandCountCheck {
    let expected = player_count as f64 * config.assumed_commands_per_minute * game_minutes;
    let lower_bound = expected * (1.0 - config.command_tolerance);
    let upper_bound = expected * (1.0 + config.command_tolerance);
    let total = observed as f64;

    let assessment = if expected <= 0.0 || total < lower_bound {
        CommandCountAssessment::Insufficient
    } else if total > upper_bound {
        CommandCountAssessment::Suspicious
    } else {
        CommandCountAssessment::Realistic
    };

    CommandCountCheck {
        observed,
        expected,
        lower_bound,
        upper_bound,
        assessment,
    }
}

/// Everything known about how trustworthy a decode is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityFlags {
    /// Confidence of the container format detection.
    pub format_confidence: f32,
    /// Whether decompression failed and the payload was read as-is.
    pub used_raw_fallback: bool,
    /// The chosen command section offset.
    pub offset: OffsetSelection,
    /// The command count check.
    pub command_count: CommandCountCheck,
    /// Non-fatal conditions hit while decoding.
    pub warnings: Vec<DecodeWarning>,
    /// Overall confidence in `[0, 1]`.
    pub confidence: f32,
}

impl QualityFlags {
    /// Builds the flags and derives the overall confidence.
    #[must_use]
    pub fn new(
        format_confidence: f32,
        used_raw_fallback: bool,
        offset: OffsetSelection,
        command_count: CommandCountCheck,
        warnings: Vec<DecodeWarning>,
    ) -> Self {
        let mut confidence = format_confidence;

        if used_raw_fallback {
            confidence *= FALLBACK_PENALTY;
        }
        if !offset.recovered {
            confidence *= OFFSET_PENALTY;
        }
        if warnings
            .iter()
            .any(|w| matches!(w, DecodeWarning::FrameCountEstimated { .. }))
        {
            confidence *= FRAME_COUNT_PENALTY;
        }
        match command_count.assessment {
            CommandCountAssessment::Realistic => {}
            CommandCountAssessment::Suspicious => confidence *= SUSPICIOUS_PENALTY,
            CommandCountAssessment::Insufficient => confidence *= INSUFFICIENT_PENALTY,
        }
        if command_count.observed == 0 {
            confidence *= EMPTY_PENALTY;
        }

        Self {
            format_confidence,
            used_raw_fallback,
            offset,
            command_count,
            warnings,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Returns whether the decode finished without any warning.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
