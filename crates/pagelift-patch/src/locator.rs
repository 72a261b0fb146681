//! Content locator: find the unique span a search snippet addresses.
//!
//! Strategies run in strict priority order, from exact to increasingly
//! fuzzy. Whatever matched, picking the first of several occurrences
//! silently is forbidden: an ambiguous snippet is always rejected so the
//! model can be asked for more surrounding context.

use regex::RegexBuilder;
use tracing::debug;

use pagelift_core::{FailReason, LocatedSpan};

/// Locates search snippets in a document.
pub struct ContentLocator {
    tab_width: usize,
}

impl Default for ContentLocator {
    fn default() -> Self {
        Self { tab_width: 4 }
    }
}

impl ContentLocator {
    pub fn new(tab_width: usize) -> Self {
        Self { tab_width }
    }

    /// Find the unique span `search` addresses in `document`.
    ///
    /// Tries, in order:
    /// 1. Exact substring match
    /// 2. Normalized-whitespace match (line endings unified, tabs expanded,
    ///    trailing whitespace trimmed), mapped back onto the original
    ///    document at line boundaries
    /// 3. Trimmed line-run match (snippet blank lines dropped, every line
    ///    compared trimmed) - the most permissive, tried last
    pub fn locate(&self, document: &str, search: &str) -> Result<LocatedSpan, FailReason> {
        if search.is_empty() {
            return Err(FailReason::SearchNotFound);
        }

        let occurrences: Vec<usize> = document.match_indices(search).map(|(i, _)| i).collect();
        match occurrences.len() {
            1 => {
                debug!(strategy = "exact", "located search snippet");
                let start = occurrences[0];
                let end = start + search.len();
                return Ok(LocatedSpan {
                    start,
                    end,
                    matched_text: document[start..end].to_string(),
                });
            }
            0 => {}
            count => return Err(FailReason::AmbiguousMatch { count }),
        }

        if let Some(span) = self.normalized_match(document, search)? {
            debug!(strategy = "normalized_whitespace", "located search snippet");
            return Ok(span);
        }

        if let Some(span) = trimmed_run_match(document, search)? {
            debug!(strategy = "trimmed_line_run", "located search snippet");
            return Ok(span);
        }

        Err(FailReason::SearchNotFound)
    }

    /// Regex mode bypasses the cascade entirely: the pattern must match
    /// exactly one location under multi-line, dot-all semantics.
    pub fn locate_regex(document: &str, pattern: &str) -> Result<LocatedSpan, FailReason> {
        let re = RegexBuilder::new(pattern)
            .multi_line(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| FailReason::RegexInvalid {
                message: e.to_string(),
            })?;

        let matches: Vec<(usize, usize)> =
            re.find_iter(document).map(|m| (m.start(), m.end())).collect();
        match matches.as_slice() {
            [] => Err(FailReason::RegexNoMatch),
            [(start, end)] => Ok(LocatedSpan {
                start: *start,
                end: *end,
                matched_text: document[*start..*end].to_string(),
            }),
            _ => Err(FailReason::RegexMultipleMatches {
                count: matches.len(),
            }),
        }
    }

    fn normalize_line(&self, line: &str) -> String {
        let expanded = if line.contains('\t') {
            line.replace('\t', &" ".repeat(self.tab_width))
        } else {
            line.to_string()
        };
        expanded.trim_end().to_string()
    }

    /// Strategy 2: line-aligned window scan over normalized lines. The hit
    /// is mapped back onto the *original* document so everything outside
    /// the span keeps its original bytes.
    fn normalized_match(
        &self,
        document: &str,
        search: &str,
    ) -> Result<Option<LocatedSpan>, FailReason> {
        let snippet: Vec<String> = search
            .replace("\r\n", "\n")
            .lines()
            .map(|l| self.normalize_line(l))
            .collect();
        if snippet.is_empty() {
            return Ok(None);
        }

        let spans = line_spans(document);
        if spans.len() < snippet.len() {
            return Ok(None);
        }
        let normalized: Vec<String> = spans
            .iter()
            .map(|&(start, end)| self.normalize_line(&document[start..end]))
            .collect();

        let mut hits = Vec::new();
        for i in 0..=normalized.len() - snippet.len() {
            if normalized[i..i + snippet.len()] == snippet[..] {
                hits.push(i);
            }
        }

        match hits.as_slice() {
            [] => Ok(None),
            [line] => {
                let start = spans[*line].0;
                let end = spans[line + snippet.len() - 1].1;
                Ok(Some(LocatedSpan {
                    start,
                    end,
                    matched_text: document[start..end].to_string(),
                }))
            }
            _ => Err(FailReason::AmbiguousMatch { count: hits.len() }),
        }
    }
}

/// Strategy 3: drop the snippet's blank lines, trim everything, then look
/// for a run of document lines with equal trimmed content. Blank document
/// lines inside the run are skipped.
fn trimmed_run_match(document: &str, search: &str) -> Result<Option<LocatedSpan>, FailReason> {
    let snippet: Vec<&str> = search
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if snippet.is_empty() {
        return Ok(None);
    }

    let spans = line_spans(document);
    let trimmed: Vec<&str> = spans
        .iter()
        .map(|&(start, end)| document[start..end].trim())
        .collect();

    let mut hits: Vec<(usize, usize)> = Vec::new();
    for first in 0..trimmed.len() {
        if trimmed[first].is_empty() || trimmed[first] != snippet[0] {
            continue;
        }
        let mut snippet_idx = 1;
        let mut doc_idx = first + 1;
        let mut last = first;
        while snippet_idx < snippet.len() && doc_idx < trimmed.len() {
            if trimmed[doc_idx].is_empty() {
                doc_idx += 1;
                continue;
            }
            if trimmed[doc_idx] == snippet[snippet_idx] {
                last = doc_idx;
                snippet_idx += 1;
                doc_idx += 1;
            } else {
                break;
            }
        }
        if snippet_idx == snippet.len() {
            hits.push((first, last));
        }
    }

    match hits.as_slice() {
        [] => Ok(None),
        [(first, last)] => {
            let start = spans[*first].0;
            let end = spans[*last].1;
            Ok(Some(LocatedSpan {
                start,
                end,
                matched_text: document[start..end].to_string(),
            }))
        }
        _ => Err(FailReason::AmbiguousMatch { count: hits.len() }),
    }
}

/// Byte spans of each line's content, excluding the line terminator (and
/// the CR of a CRLF ending), consistent with `str::lines`.
fn line_spans(document: &str) -> Vec<(usize, usize)> {
    let bytes = document.as_bytes();
    let mut spans = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            let end = if i > start && bytes[i - 1] == b'\r' {
                i - 1
            } else {
                i
            };
            spans.push((start, end));
            start = i + 1;
        }
    }
    if start < document.len() {
        spans.push((start, document.len()));
    }
    spans
}
