//! Patch applicator: turn a batch of edit blocks into a new document.
//!
//! Failures are collected per block, never thrown: one bad block must not
//! prevent the independent blocks in the same response from applying. The
//! report carries both success notions ("all applied" drives the retry
//! decision, "any applied" drives what the user sees).

use similar::{ChangeTag, TextDiff};
use tracing::debug;

use pagelift_core::{ApplyReport, BlockFailure, EditBlock, FailReason, LocatedSpan};

use crate::locator::ContentLocator;

/// Applies edit-block batches to document snapshots.
pub struct PatchApplicator {
    locator: ContentLocator,
}

impl Default for PatchApplicator {
    fn default() -> Self {
        Self {
            locator: ContentLocator::default(),
        }
    }
}

impl PatchApplicator {
    pub fn new(tab_width: usize) -> Self {
        Self {
            locator: ContentLocator::new(tab_width),
        }
    }

    /// Apply a batch of blocks to `document`, producing a new document.
    ///
    /// Line-addressed blocks splice first, in descending `start_line`
    /// order, because their numbering references the snapshot that was
    /// prompted and every splice shifts the line numbers below it.
    /// Content- and regex-addressed blocks then apply in input order
    /// against the evolving document, so later blocks see earlier
    /// successful edits but not failed ones. Failure indices always refer
    /// to input positions.
    pub fn apply(&self, document: &str, blocks: &[EditBlock]) -> ApplyReport {
        if blocks.is_empty() {
            return ApplyReport::unchanged(document);
        }

        let mut current = document.to_string();
        let mut applied_count = 0;
        let mut failed: Vec<BlockFailure> = Vec::new();

        let mut line_blocks: Vec<(usize, usize, usize, &str)> = Vec::new();
        for (index, block) in blocks.iter().enumerate() {
            if let EditBlock::Line {
                start_line,
                end_line,
                new_content,
            } = block
            {
                if *start_line == 0 || start_line > end_line {
                    failed.push(BlockFailure {
                        index,
                        reason: FailReason::InvalidRange {
                            start: *start_line,
                            end: *end_line,
                        },
                    });
                } else {
                    line_blocks.push((index, *start_line, *end_line, new_content));
                }
            }
        }

        if !line_blocks.is_empty() {
            // Descending order is load-bearing: ascending application
            // would silently corrupt any not-yet-applied block whose range
            // sits below an earlier splice.
            line_blocks.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)).then(b.0.cmp(&a.0)));
            current = self.splice_line_blocks(&current, &line_blocks, &mut applied_count, &mut failed);
        }

        for (index, block) in blocks.iter().enumerate() {
            let (located, replace) = match block {
                EditBlock::Line { .. } => continue,
                EditBlock::Content { search, replace } => {
                    (self.locator.locate(&current, search), replace)
                }
                EditBlock::Regex { pattern, replace } => {
                    (ContentLocator::locate_regex(&current, pattern), replace)
                }
            };
            match located {
                Ok(span) => {
                    current = splice(&current, &span, replace);
                    applied_count += 1;
                    debug!(index, start = span.start, end = span.end, "applied block");
                }
                Err(reason) => {
                    debug!(index, %reason, "block failed to apply");
                    failed.push(BlockFailure { index, reason });
                }
            }
        }

        failed.sort_by_key(|f| f.index);
        let diff = if current == document {
            String::new()
        } else {
            render_diff(document, &current)
        };

        ApplyReport {
            all_applied: failed.is_empty(),
            any_applied: applied_count > 0,
            html: current,
            applied_count,
            failed,
            diff,
        }
    }

    fn splice_line_blocks(
        &self,
        document: &str,
        ordered: &[(usize, usize, usize, &str)],
        applied_count: &mut usize,
        failed: &mut Vec<BlockFailure>,
    ) -> String {
        let had_trailing_newline = document.ends_with('\n');
        let mut lines: Vec<String> = document.lines().map(str::to_string).collect();

        for &(index, start_line, end_line, new_content) in ordered {
            if lines.is_empty() {
                failed.push(BlockFailure {
                    index,
                    reason: FailReason::InvalidRange {
                        start: start_line,
                        end: end_line,
                    },
                });
                continue;
            }
            // Off-by-one and stale ranges are common model drift; clamp
            // instead of rejecting.
            let line_count = lines.len();
            let start = start_line.min(line_count);
            let end = end_line.min(line_count);
            let replacement: Vec<String> = new_content.lines().map(str::to_string).collect();
            lines.splice(start - 1..end, replacement);
            *applied_count += 1;
            debug!(index, start, end, "applied line block");
        }

        let mut result = lines.join("\n");
        if had_trailing_newline && !result.is_empty() {
            result.push('\n');
        }
        result
    }
}

fn splice(document: &str, span: &LocatedSpan, replacement: &str) -> String {
    let mut out = String::with_capacity(document.len() + replacement.len());
    out.push_str(&document[..span.start]);
    out.push_str(replacement);
    out.push_str(&document[span.end..]);
    out
}

/// Unified-diff preview of one application pass.
fn render_diff(old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut result = String::new();

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        result.push_str(sign);
        result.push_str(change.value());
        if !change.value().ends_with('\n') {
            result.push('\n');
        }
    }

    result
}
