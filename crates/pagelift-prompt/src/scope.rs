//! Scope classification for edit instructions.
//!
//! A pure keyword-membership check deciding how much of the document the
//! model needs to see. Priority order is global, then section, then the
//! targeted default: "change the whole theme's header color" is a global
//! edit even though it names a section, because global intent makes a
//! section excerpt too narrow.

use serde::{Deserialize, Serialize};

/// How much of the document an instruction is expected to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditScope {
    /// A small, pointed change; send the full document.
    Targeted,
    /// Confined to one recognizable section; an excerpt suffices.
    Section,
    /// Touches the whole document (theme, colors, fonts, layout).
    Global,
}

const GLOBAL_KEYWORDS: &[&str] = &[
    "entire",
    "whole",
    "all",
    "every",
    "everywhere",
    "throughout",
    "global",
    "overall",
    "theme",
    "site-wide",
    "sitewide",
    "site wide",
    "color scheme",
    "across the site",
    "across the page",
];

const SECTION_KEYWORDS: &[&str] = &[
    "header",
    "nav",
    "navbar",
    "navigation",
    "menu",
    "footer",
    "hero",
    "banner",
    "about",
    "contact",
    "pricing",
    "features",
    "testimonials",
    "section",
];

/// Classify an instruction by keyword membership, global first.
pub fn classify(instruction: &str) -> EditScope {
    let lowered = instruction.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .collect();

    if matches_any(&lowered, &words, GLOBAL_KEYWORDS) {
        return EditScope::Global;
    }
    if matches_any(&lowered, &words, SECTION_KEYWORDS) {
        return EditScope::Section;
    }
    EditScope::Targeted
}

// Single-word keywords match on word boundaries (so "all" never fires on
// "small"); phrases match as substrings.
fn matches_any(lowered: &str, words: &[&str], keywords: &[&str]) -> bool {
    keywords.iter().any(|k| {
        if k.contains(' ') {
            lowered.contains(k)
        } else {
            words.contains(k)
        }
    })
}
