//! Error and warning types for the replay decoder.
//!
//! Fatal conditions are reported through [`DecodeError`] and abort the
//! pipeline with no partial result. Conditions the pipeline can recover
//! from are reported as [`DecodeWarning`] values attached to the result's
//! quality flags.

use serde::Serialize;
use thiserror::Error;

/// The main error type for replay decoding operations.
///
/// Every variant is fatal: once one of these is returned, no header,
/// commands, or metrics are available.
///
/// # Example
///
/// ```
/// use rep_parser::error::{DecodeError, Result};
///
/// fn example_operation() -> Result<()> {
///     Err(DecodeError::DecompressionFailed {
///         reason: "invalid zlib stream".to_string(),
///     })
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer is too short or carries no recognizable container layout.
    #[error("Format unrecognized: {reason}")]
    FormatUnrecognized {
        /// A description of why the container was rejected.
        reason: String,
    },

    /// Decompression of the replay payload failed.
    ///
    /// Covers corrupt zlib or implode data, framing that runs past the end
    /// of the file, and payloads that exceed the decompressed size cap.
    #[error("Decompression failed: {reason}")]
    DecompressionFailed {
        /// A description of the decompression failure.
        reason: String,
    },

    /// A read ran past the end of the decompressed stream.
    ///
    /// Raised by the header decoder (and the low-level binary helpers it
    /// uses). Without a header no metrics can be computed.
    #[error("Header truncated: expected {expected} bytes, but only {available} available")]
    HeaderTruncated {
        /// The number of bytes that were needed.
        expected: usize,
        /// The actual number of bytes available.
        available: usize,
    },
}

impl DecodeError {
    /// Creates a `HeaderTruncated` error with the given sizes.
    ///
    /// # Arguments
    ///
    /// * `expected` - The number of bytes that were needed
    /// * `available` - The number of bytes actually available
    #[must_use]
    pub fn truncated(expected: usize, available: usize) -> Self {
        DecodeError::HeaderTruncated {
            expected,
            available,
        }
    }

    /// Creates a `DecompressionFailed` error from any displayable reason.
    #[must_use]
    pub fn decompression(reason: impl Into<String>) -> Self {
        DecodeError::DecompressionFailed {
            reason: reason.into(),
        }
    }

    /// Creates a `FormatUnrecognized` error for a buffer that is too short.
    #[must_use]
    pub fn too_short(minimum: usize, found: &[u8]) -> Self {
        DecodeError::FormatUnrecognized {
            reason: format!(
                "need at least {minimum} bytes, found {} ({})",
                found.len(),
                bytes_to_hex(found)
            ),
        }
    }
}

/// A non-fatal condition encountered while decoding.
///
/// Warnings never stop the pipeline. They lower the confidence reported
/// in the result's quality flags.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeWarning {
    /// The command section produced no commands; all metrics are zero.
    #[error("Command stream empty: no commands were decoded")]
    CommandStreamEmpty,

    /// No offset candidate passed the acceptance test.
    #[error("Offset recovery failed: using default command offset {fallback_offset}")]
    OffsetRecoveryFailed {
        /// The offset that was used anyway.
        fallback_offset: usize,
    },

    /// The stored frame count failed its sanity check and was replaced.
    #[error("Frame count {stored} out of range, estimated {estimated} from stream length")]
    FrameCountEstimated {
        /// The value stored in the header.
        stored: u32,
        /// The estimate that replaced it.
        estimated: u32,
    },

    /// The declared decompression failed and the payload was read as-is.
    #[error("Decompression fallback: payload treated as uncompressed ({reason})")]
    DecompressionFallback {
        /// The failure that triggered the fallback.
        reason: String,
    },
}

/// Converts a byte slice to a hexadecimal string representation.
///
/// If the slice is 8 bytes or less, formats as space-separated hex values.
/// If longer, shows the first 8 bytes followed by "...".
fn bytes_to_hex(bytes: &[u8]) -> String {
    let shown = &bytes[..bytes.len().min(8)];
    let prefix = shown
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ");

    if bytes.len() <= 8 {
        prefix
    } else {
        format!("{prefix}... ({} bytes total)", bytes.len())
    }
}

/// A specialized Result type for replay decoding operations.
pub type Result<T> = std::result::Result<T, DecodeError>;
