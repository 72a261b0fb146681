//! Section extraction: a bounded, tag-balanced excerpt of the document.
//!
//! When an instruction names a recognizable section, the model only needs
//! that region plus a little surrounding context. The extractor seeds a
//! tag-depth counter at the first line matching the family's recognizer
//! and stops when the depth returns to zero.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Context lines added on each side of the balanced region so the model
/// sees boundary content.
const CONTEXT_PAD_LINES: usize = 2;

/// A recognized section of the document, in 1-based inclusive lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSlice {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl SectionSlice {
    /// The excerpt text for this slice.
    pub fn excerpt(&self, document: &str) -> String {
        document
            .lines()
            .skip(self.start_line - 1)
            .take(self.end_line - self.start_line + 1)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Lines to add to excerpt-relative line numbers to get document
    /// line numbers.
    pub fn line_offset(&self) -> usize {
        self.start_line - 1
    }
}

struct Family {
    name: &'static str,
    keywords: &'static [&'static str],
    recognizers: &'static [&'static str],
}

const FAMILIES: &[Family] = &[
    Family {
        name: "header",
        keywords: &["header", "nav", "navbar", "navigation", "menu"],
        recognizers: &[
            "<header",
            "<nav",
            "class=\"header",
            "class=\"navbar",
            "id=\"header",
            "id=\"nav",
        ],
    },
    Family {
        name: "footer",
        keywords: &["footer"],
        recognizers: &["<footer", "class=\"footer", "id=\"footer"],
    },
    Family {
        name: "hero",
        keywords: &["hero", "banner"],
        recognizers: &["class=\"hero", "id=\"hero", "class=\"banner", "id=\"banner"],
    },
    Family {
        name: "about",
        keywords: &["about"],
        recognizers: &["id=\"about", "class=\"about"],
    },
    Family {
        name: "contact",
        keywords: &["contact"],
        recognizers: &["id=\"contact", "class=\"contact"],
    },
    Family {
        name: "pricing",
        keywords: &["pricing", "plans"],
        recognizers: &["id=\"pricing", "class=\"pricing"],
    },
    Family {
        name: "features",
        keywords: &["feature", "features"],
        recognizers: &["id=\"features", "class=\"feature"],
    },
    Family {
        name: "testimonials",
        keywords: &["testimonial", "testimonials", "reviews"],
        recognizers: &["id=\"testimonials", "class=\"testimonial", "class=\"reviews"],
    },
];

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9-]*)[^<>]*?(/?)>").unwrap());

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Extract the section an instruction refers to, if any.
///
/// Returns `None` when no keyword family matches or no balanced region is
/// found; callers must then fall back to sending the full document.
pub fn extract(document: &str, instruction: &str) -> Option<SectionSlice> {
    let lowered = instruction.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .collect();
    let family = FAMILIES
        .iter()
        .find(|f| f.keywords.iter().any(|k| words.contains(k)))?;

    let lines: Vec<&str> = document.lines().collect();
    let seed = lines.iter().position(|line| {
        let normalized = line.to_lowercase().replace('\'', "\"");
        family.recognizers.iter().any(|r| normalized.contains(r))
    })?;

    let mut depth: i32 = 0;
    let mut last = None;
    for (i, line) in lines.iter().enumerate().skip(seed) {
        depth += tag_depth_delta(line);
        if depth <= 0 {
            last = Some(i);
            break;
        }
    }
    // An unbalanced region means the heuristic lost track; better to send
    // the whole document than a truncated excerpt.
    let last = last?;

    let start_line = seed.saturating_sub(CONTEXT_PAD_LINES) + 1;
    let end_line = (last + 1 + CONTEXT_PAD_LINES).min(lines.len());
    debug!(
        section = family.name,
        start_line, end_line, "extracted section excerpt"
    );
    Some(SectionSlice {
        name: family.name.to_string(),
        start_line,
        end_line,
    })
}

// Net open/close tag depth contributed by one line. Void and self-closing
// tags contribute nothing. Tags split across lines are not recognized;
// the unbalanced-region fallback covers those documents.
fn tag_depth_delta(line: &str) -> i32 {
    let mut delta = 0;
    for cap in TAG.captures_iter(line) {
        let closing = &cap[1] == "/";
        let self_closing = &cap[3] == "/";
        let name = cap[2].to_lowercase();
        if self_closing || VOID_TAGS.contains(&name.as_str()) {
            continue;
        }
        delta += if closing { -1 } else { 1 };
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<!DOCTYPE html>\n\
<html>\n\
<body>\n\
  <header class=\"site-header\">\n\
    <div class=\"logo\">Acme</div>\n\
    <nav>\n\
      <a href=\"/\">Home</a>\n\
    </nav>\n\
  </header>\n\
  <section id=\"hero\">\n\
    <h1>Welcome</h1>\n\
  </section>\n\
  <footer>\n\
    <p>&copy; 2025 Acme</p>\n\
  </footer>\n\
</body>\n\
</html>";

    #[test]
    fn extracts_header_with_context_padding() {
        let slice = extract(PAGE, "update the header logo").unwrap();
        assert_eq!(slice.name, "header");
        // Header spans lines 4-9; padded by two lines each side.
        assert_eq!(slice.start_line, 2);
        assert_eq!(slice.end_line, 11);
        let excerpt = slice.excerpt(PAGE);
        assert!(excerpt.contains("site-header"));
        assert!(excerpt.contains("</header>"));
    }

    #[test]
    fn extracts_footer_by_tag() {
        let slice = extract(PAGE, "make the footer darker").unwrap();
        assert_eq!(slice.name, "footer");
        assert!(slice.excerpt(PAGE).contains("&copy; 2025 Acme"));
    }

    #[test]
    fn extracts_hero_by_id() {
        let slice = extract(PAGE, "rewrite the hero heading").unwrap();
        assert_eq!(slice.name, "hero");
        assert!(slice.excerpt(PAGE).contains("<h1>Welcome</h1>"));
    }

    #[test]
    fn padding_clamps_at_document_start() {
        let doc = "<header>\n  <h1>x</h1>\n</header>";
        let slice = extract(doc, "change the header").unwrap();
        assert_eq!(slice.start_line, 1);
        assert_eq!(slice.end_line, 3);
        assert_eq!(slice.line_offset(), 0);
    }

    #[test]
    fn one_line_section_balances_immediately() {
        let doc = "before\n<footer><p>x</p></footer>\nafter";
        let slice = extract(doc, "edit the footer").unwrap();
        assert_eq!(slice.start_line, 1);
        assert_eq!(slice.end_line, 3);
    }

    #[test]
    fn void_and_self_closing_tags_do_not_skew_depth() {
        let doc = "<header>\n  <img src=\"logo.png\">\n  <br/>\n  <h1>x</h1>\n</header>\nafter\nmore";
        let slice = extract(doc, "update the header").unwrap();
        assert_eq!(slice.end_line, 7);
        assert!(slice.excerpt(doc).contains("</header>"));
    }

    #[test]
    fn unknown_keyword_returns_none() {
        assert!(extract(PAGE, "fix the typo in the article").is_none());
    }

    #[test]
    fn unbalanced_region_returns_none() {
        let doc = "<header>\n  <div>\n  <h1>x</h1>";
        assert!(extract(doc, "change the header").is_none());
    }

    #[test]
    fn single_quoted_attributes_recognized() {
        let doc = "<div class='footer-wrap'>\n  <p>fine print</p>\n</div>";
        let slice = extract(doc, "shrink the footer text").unwrap();
        assert_eq!(slice.name, "footer");
    }
}
