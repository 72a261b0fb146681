//! Stable 1-based line numbering for prompt display.

use std::fmt::Write;

/// Render a document with 1-based line numbers, one number per line, in a
/// fixed width derived from the total line count. Purely presentational;
/// the numbered text is never parsed back.
pub fn number_lines(document: &str) -> String {
    let total = document.lines().count();
    if total == 0 {
        return String::new();
    }
    let width = total.to_string().len();

    let mut out = String::with_capacity(document.len() + total * (width + 3));
    for (i, line) in document.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:>width$} | {}", i + 1, line, width = width);
    }
    out
}
