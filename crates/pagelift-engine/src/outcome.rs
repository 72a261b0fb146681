//! Terminal outcomes, progress events, and loop-boundary errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pagelift_core::BlockFailure;

/// Where the loop currently is, for progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    Analyzing,
    Applying,
    Succeeded,
    PartiallyFailed,
    RetryExhausted,
}

/// Progress events forwarded verbatim by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    PhaseChanged { phase: EnginePhase },
    RoundCompleted {
        round: usize,
        applied_count: usize,
        failed_count: usize,
    },
}

/// How one edit session ended.
///
/// Only outcomes that changed the document carry one: a total failure has
/// no `html` field at all, so callers cannot accidentally substitute a
/// blank page for the prior document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EditOutcome {
    /// The model declared the document already satisfies the instruction.
    NoChanges,
    /// Every proposed block applied.
    Succeeded {
        html: String,
        applied_count: usize,
        rounds: usize,
    },
    /// The retry budget ran out with some blocks applied; `html` is the
    /// best partial document and becomes the new baseline.
    PartiallyFailed {
        html: String,
        applied_count: usize,
        failed: Vec<BlockFailure>,
        rounds: usize,
    },
    /// No block ever applied. The caller keeps showing the prior document.
    Failed {
        failed: Vec<BlockFailure>,
        rounds: usize,
    },
    /// The response contained no usable edits (nothing parsed, or a
    /// forbidden full rewrite). Never auto-retried by the engine.
    NoUsableEdits { rounds: usize },
}

/// Errors that abort the loop outright.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model call failed: {0}")]
    Model(anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_with_state_tag() {
        let outcome = EditOutcome::Succeeded {
            html: "<p>x</p>".to_string(),
            applied_count: 2,
            rounds: 1,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["state"], "succeeded");
        assert_eq!(json["applied_count"], 2);
    }

    #[test]
    fn failed_outcome_carries_no_document() {
        let outcome = EditOutcome::Failed {
            failed: Vec::new(),
            rounds: 3,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json.get("html").is_none());
    }
}
