//! Apply reports: the authoritative outcome of one application pass.

use serde::{Deserialize, Serialize};

use crate::error::FailReason;

/// The span of the current document that an edit will replace.
///
/// `matched_text` is the verbatim substring of the *current* document, which
/// may differ from the proposed search text in immaterial formatting
/// (trailing whitespace, tab width, line endings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedSpan {
    /// Byte offset of the start of the span.
    pub start: usize,
    /// Byte offset one past the end of the span.
    pub end: usize,
    /// The exact text occupying `start..end`.
    pub matched_text: String,
}

/// A single block that could not be applied, by input position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFailure {
    /// Index of the block in the parsed batch.
    pub index: usize,
    pub reason: FailReason,
}

/// Outcome of applying one batch of blocks to a document snapshot.
///
/// Two distinct success notions are carried explicitly and must not be
/// conflated: `any_applied` decides whether the user sees progress at all,
/// `all_applied` decides whether another correction round is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Every block in the batch applied.
    pub all_applied: bool,
    /// At least one block applied.
    pub any_applied: bool,
    /// The new document. Equals the input snapshot when nothing applied.
    pub html: String,
    pub applied_count: usize,
    pub failed: Vec<BlockFailure>,
    /// Unified-diff preview of this pass, for the dashboard.
    pub diff: String,
}

impl ApplyReport {
    /// A report for a batch that changed nothing.
    pub fn unchanged(html: impl Into<String>) -> Self {
        Self {
            all_applied: true,
            any_applied: false,
            html: html.into(),
            applied_count: 0,
            failed: Vec::new(),
            diff: String::new(),
        }
    }
}
