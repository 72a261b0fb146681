//! Edit blocks: the units of change proposed by the model.

use serde::{Deserialize, Serialize};

/// One proposed, independently applicable edit extracted from a model
/// response.
///
/// Each block carries exactly one addressing interpretation. The applicator
/// matches on this enum exhaustively, so supporting a new encoding is a
/// localized change rather than a set of duck-typed field checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditBlock {
    /// Content-addressed search/replace. `search` must be non-empty.
    Content { search: String, replace: String },
    /// Regex-addressed replacement. The pattern is compiled with multi-line
    /// and dot-all semantics and must match exactly one location.
    Regex { pattern: String, replace: String },
    /// Line-range replacement. Line numbers are interpreted against the
    /// document *as numbered when the prompt was built*, which is why a
    /// batch of these must be applied in descending `start_line` order.
    Line {
        start_line: usize,
        end_line: usize,
        new_content: String,
    },
}

impl EditBlock {
    /// Whether this block addresses the document by line numbers.
    pub fn is_line_addressed(&self) -> bool {
        matches!(self, EditBlock::Line { .. })
    }
}

/// What the block parser understood from a raw model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ParseOutcome {
    /// The model declared the document already satisfies the instruction.
    NoChanges,
    /// The model produced a complete replacement document. Only surfaced
    /// when the full-rewrite affordance is enabled.
    FullDocument { html: String },
    /// Zero or more edit blocks. An empty list is not an error by itself;
    /// it is relayed up as "no usable edits produced".
    Blocks { blocks: Vec<EditBlock> },
}

impl ParseOutcome {
    /// Convenience accessor for the block list, empty for the other arms.
    pub fn blocks(&self) -> &[EditBlock] {
        match self {
            ParseOutcome::Blocks { blocks } => blocks,
            _ => &[],
        }
    }
}
