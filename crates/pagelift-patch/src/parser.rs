//! Parser for edit blocks in raw model output.
//!
//! Two encodings are supported, each with a fallback format:
//!
//! - Content-addressed: SEARCH/REPLACE marker blocks, falling back to
//!   labeled ```search / ```replace fence pairs when no marker block parses.
//! - Line-addressed: fenced blocks opening with a `[N-M]` range header,
//!   falling back to a free-text `lines N-M:` prefix before the fence.
//!
//! A "no changes" declaration short-circuits before any block pattern is
//! attempted, and a response that is itself a whole HTML document is either
//! surfaced as a full rewrite or rejected, depending on the session.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use pagelift_core::{EditBlock, EncodingKind, ParseError, ParseOutcome};

// Marker lines tolerate 6-7 repeated marker characters and trailing
// colons/whitespace; models drift on both.
static SEARCH_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^<{6,7}\s*SEARCH(?P<regex>\s*\(regex\))?\s*:?\s*$").unwrap()
});
static DIVIDER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^={6,7}\s*$").unwrap());
static REPLACE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^>{6,7}\s*REPLACE\s*:?\s*$").unwrap());

static LABELED_FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```+\s*(search|replace)\s*$").unwrap());
static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```+\s*[a-zA-Z0-9_-]*\s*$").unwrap());
static FENCE_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^```+\s*$").unwrap());

static RANGE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(\d+)(?:\s*-\s*(\d+))?\]\s*$").unwrap());
static LINE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^lines?\s+(\d+)(?:\s*-\s*(\d+))?\s*:").unwrap());

const NO_CHANGES_PHRASES: &[&str] = &["no changes required", "no changes needed"];

/// Parser for one model response under a fixed encoding.
pub struct BlockParser {
    encoding: EncodingKind,
    allow_full_rewrite: bool,
}

impl BlockParser {
    pub fn new(encoding: EncodingKind, allow_full_rewrite: bool) -> Self {
        Self {
            encoding,
            allow_full_rewrite,
        }
    }

    /// Parse a raw model response into an outcome.
    ///
    /// Zero parsed blocks is not an error; it is relayed up as "no usable
    /// edits produced" and the caller decides retry vs abort.
    pub fn parse(&self, raw: &str) -> Result<ParseOutcome, ParseError> {
        if declares_no_changes(raw) {
            return Ok(ParseOutcome::NoChanges);
        }

        if let Some(html) = full_document_body(raw) {
            if self.allow_full_rewrite {
                return Ok(ParseOutcome::FullDocument { html });
            }
            return Err(ParseError::FullDocumentRejected);
        }

        let blocks = match self.encoding {
            EncodingKind::ContentSearch => {
                let blocks = parse_marker_blocks(raw);
                if blocks.is_empty() {
                    debug!("no marker blocks found, trying labeled fence pairs");
                    parse_fenced_pairs(raw)
                } else {
                    blocks
                }
            }
            EncodingKind::LineRange => {
                let blocks = parse_range_header_fences(raw);
                if blocks.is_empty() {
                    debug!("no range-header fences found, trying line-prefix fences");
                    parse_prefixed_fences(raw)
                } else {
                    blocks
                }
            }
        };

        Ok(ParseOutcome::Blocks { blocks })
    }
}

/// The "nothing to do" declaration must win before any block regex runs:
/// models sometimes quote the block format while explaining why no edit is
/// needed.
fn declares_no_changes(raw: &str) -> bool {
    let lowered = raw.trim().to_lowercase();
    NO_CHANGES_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

/// Detect a response that is itself a complete HTML document, with or
/// without a surrounding code fence. Returns the unfenced body.
fn full_document_body(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let body = strip_outer_fence(trimmed).unwrap_or(trimmed);
    let lowered = body.trim_start().to_lowercase();
    if lowered.starts_with("<!doctype") || lowered.starts_with("<html") {
        Some(body.trim_start().to_string())
    } else {
        None
    }
}

/// Strip one outer ``` fence pair when the whole response is fenced.
fn strip_outer_fence(text: &str) -> Option<&str> {
    let mut lines = text.lines();
    let first = lines.next()?;
    if !FENCE_OPEN.is_match(first) {
        return None;
    }
    let last = text.lines().last()?;
    if !FENCE_CLOSE.is_match(last.trim()) {
        return None;
    }
    let start = text.find('\n')? + 1;
    let end = text.rfind('\n')?;
    (start <= end).then(|| &text[start..end])
}

/// State machine over lines for SEARCH / ======= / REPLACE marker blocks.
fn parse_marker_blocks(raw: &str) -> Vec<EditBlock> {
    enum State {
        Scanning,
        InSearch { regex: bool, lines: Vec<String> },
        InReplace {
            regex: bool,
            search: Vec<String>,
            lines: Vec<String>,
        },
    }

    let mut blocks = Vec::new();
    let mut state = State::Scanning;

    for line in raw.lines() {
        state = match state {
            State::Scanning => {
                if let Some(caps) = SEARCH_MARKER.captures(line.trim_end()) {
                    State::InSearch {
                        regex: caps.name("regex").is_some(),
                        lines: Vec::new(),
                    }
                } else {
                    State::Scanning
                }
            }
            State::InSearch { regex, mut lines } => {
                if DIVIDER_MARKER.is_match(line.trim_end()) {
                    State::InReplace {
                        regex,
                        search: lines,
                        lines: Vec::new(),
                    }
                } else {
                    lines.push(line.to_string());
                    State::InSearch { regex, lines }
                }
            }
            State::InReplace {
                regex,
                search,
                mut lines,
            } => {
                if REPLACE_MARKER.is_match(line.trim_end()) {
                    let search = search.join("\n");
                    let replace = lines.join("\n");
                    if regex {
                        if !search.trim().is_empty() {
                            blocks.push(EditBlock::Regex {
                                pattern: search,
                                replace,
                            });
                        }
                    } else if !search.is_empty() {
                        blocks.push(EditBlock::Content { search, replace });
                    }
                    State::Scanning
                } else {
                    lines.push(line.to_string());
                    State::InReplace {
                        regex,
                        search,
                        lines,
                    }
                }
            }
        };
    }

    blocks
}

/// Fallback encoding: a ```search fence immediately paired with a
/// ```replace fence. Unlabeled fences and unpaired labels are ignored.
fn parse_fenced_pairs(raw: &str) -> Vec<EditBlock> {
    enum Label {
        Search,
        Replace,
    }

    let mut blocks = Vec::new();
    let mut pending_search: Option<String> = None;
    let mut in_fence: Option<(Label, Vec<String>)> = None;

    for line in raw.lines() {
        match in_fence.take() {
            Some((label, mut lines)) => {
                if FENCE_CLOSE.is_match(line.trim_end()) {
                    let body = lines.join("\n");
                    match label {
                        Label::Search => pending_search = Some(body),
                        Label::Replace => {
                            if let Some(search) = pending_search.take() {
                                if !search.is_empty() {
                                    blocks.push(EditBlock::Content {
                                        search,
                                        replace: body,
                                    });
                                }
                            }
                        }
                    }
                } else {
                    lines.push(line.to_string());
                    in_fence = Some((label, lines));
                }
            }
            None => {
                if let Some(caps) = LABELED_FENCE_OPEN.captures(line.trim_end()) {
                    let label = if caps[1].eq_ignore_ascii_case("search") {
                        Label::Search
                    } else {
                        Label::Replace
                    };
                    in_fence = Some((label, Vec::new()));
                }
            }
        }
    }

    blocks
}

/// Line-addressed primary format: a fenced block whose first line is a
/// `[N-M]` (or `[N]`) range header.
fn parse_range_header_fences(raw: &str) -> Vec<EditBlock> {
    let mut blocks = Vec::new();
    let mut in_fence = false;
    let mut fence_lines: Vec<String> = Vec::new();

    for line in raw.lines() {
        if !in_fence {
            if FENCE_OPEN.is_match(line.trim_end()) {
                in_fence = true;
                fence_lines.clear();
            }
            continue;
        }
        if FENCE_CLOSE.is_match(line.trim_end()) {
            in_fence = false;
            if let Some(block) = range_fence_to_block(&fence_lines) {
                blocks.push(block);
            }
            continue;
        }
        fence_lines.push(line.to_string());
    }

    blocks
}

fn range_fence_to_block(fence_lines: &[String]) -> Option<EditBlock> {
    let header = fence_lines.first()?;
    let caps = RANGE_HEADER.captures(header.trim())?;
    let start_line: usize = caps[1].parse().ok()?;
    let end_line: usize = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => start_line,
    };
    Some(EditBlock::Line {
        start_line,
        end_line,
        new_content: fence_lines[1..].join("\n"),
    })
}

/// Line-addressed fallback: a free-text `lines N-M:` prefix followed by a
/// fence holding the replacement. Only blank lines may sit between the
/// prefix and its fence.
fn parse_prefixed_fences(raw: &str) -> Vec<EditBlock> {
    let mut blocks = Vec::new();
    let mut pending_range: Option<(usize, usize)> = None;
    let mut in_fence: Option<Vec<String>> = None;

    for line in raw.lines() {
        if let Some(mut lines) = in_fence.take() {
            if FENCE_CLOSE.is_match(line.trim_end()) {
                if let Some((start_line, end_line)) = pending_range.take() {
                    blocks.push(EditBlock::Line {
                        start_line,
                        end_line,
                        new_content: lines.join("\n"),
                    });
                }
            } else {
                lines.push(line.to_string());
                in_fence = Some(lines);
            }
            continue;
        }

        if let Some(caps) = LINE_PREFIX.captures(line.trim()) {
            let start: usize = caps[1].parse().unwrap_or(0);
            let end: usize = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(start);
            pending_range = Some((start, end));
        } else if FENCE_OPEN.is_match(line.trim_end()) {
            if pending_range.is_some() {
                in_fence = Some(Vec::new());
            }
        } else if !line.trim().is_empty() {
            // Prose between a prefix and its fence breaks the association.
            pending_range = None;
        }
    }

    blocks
}
