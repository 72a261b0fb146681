//! Error taxonomy for parsing and block application.
//!
//! Per-block failures are values, not `Err`s: one bad block must never
//! abort the rest of a batch, so they travel inside the apply report. The
//! `Display` strings double as the human-readable reasons quoted back to
//! the model in corrective prompts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single block failed to apply.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailReason {
    /// No strategy in the locator cascade found the search text.
    #[error("SEARCH text not found in the document")]
    SearchNotFound,

    /// The search text matched more than one location. Picking the first
    /// occurrence silently is the principal source of mis-edits, so this is
    /// always a failure.
    #[error("search matched {count} locations; add more surrounding context to make it unique")]
    AmbiguousMatch { count: usize },

    /// A regex-tagged block's pattern matched nothing.
    #[error("regex pattern matched no location in the document")]
    RegexNoMatch,

    /// A regex-tagged block's pattern matched more than one location.
    #[error("regex pattern matched {count} locations, expected exactly one")]
    RegexMultipleMatches { count: usize },

    /// The pattern did not compile.
    #[error("invalid regex pattern: {message}")]
    RegexInvalid { message: String },

    /// A line range that cannot be clamped into the document (zero start or
    /// inverted bounds). Merely out-of-bounds ranges are clamped instead.
    #[error("line range {start}-{end} is not a usable range")]
    InvalidRange { start: usize, end: usize },
}

/// Errors from the block parser itself.
///
/// Note that "nothing parsed" is deliberately *not* here: an empty block
/// list is an ordinary `ParseOutcome` the caller decides how to handle.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ParseError {
    /// The response is a whole replacement document but the session's
    /// encoding is strict edit-only.
    #[error("model returned a full-document rewrite, which this encoding forbids")]
    FullDocumentRejected,
}
