//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Which block encoding the model is prompted to produce.
///
/// Content-addressed search/replace is the default: it is the most robust
/// against the line-number drift models accumulate between rounds. The
/// line-range encoding is kept as a selectable alternative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingKind {
    #[default]
    ContentSearch,
    LineRange,
}

/// Tunables for one edit session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub encoding: EncodingKind,
    /// Corrective rounds allowed after the first attempt.
    pub max_retry_rounds: usize,
    /// Accept a whole replacement document from the model. Off by default:
    /// strict edit-only sessions reject full rewrites outright.
    pub allow_full_rewrite: bool,
    /// Tab expansion width used by whitespace-normalized matching.
    pub tab_width: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            encoding: EncodingKind::default(),
            max_retry_rounds: 2,
            allow_full_rewrite: false,
            tab_width: 4,
        }
    }
}
