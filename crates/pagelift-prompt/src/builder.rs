//! Deterministic prompt construction for the edit loop.
//!
//! Two prompts are built here: the initial edit prompt (instruction plus
//! either the full document or a section excerpt) and the corrective
//! prompt for a retry round (exact failure reasons plus the *current*,
//! partially-patched document). Both are pure string builders; given the
//! same inputs they produce the same bytes.

use std::fmt::Write;

use pagelift_core::{BlockFailure, EncodingKind};

use crate::numbering::number_lines;
use crate::section::SectionSlice;

const CONTENT_RULES: &str = r#"Propose your edits as search/replace blocks, exactly in this format:

<<<<<<< SEARCH
(the exact text currently in the document)
=======
(the replacement text)
>>>>>>> REPLACE

Rules:
- Copy the SEARCH text verbatim from the document, including whitespace.
- Include enough surrounding context to make each SEARCH unique.
- Prefer several small blocks over one large block.
- Do not return the whole document.
- If the document already satisfies the request, reply "No changes required."
"#;

const LINE_RULES: &str = r#"Propose your edits as fenced code blocks whose first line is the
inclusive line range to replace:

```
[12-15]
(replacement lines)
```

Rules:
- Line numbers refer to the numbered document shown above.
- Use [N-N] to replace a single line.
- Do not return the whole document.
- If the document already satisfies the request, reply "No changes required."
"#;

/// Builds initial and corrective prompts for one edit session.
pub struct PromptBuilder {
    encoding: EncodingKind,
}

impl PromptBuilder {
    pub fn new(encoding: EncodingKind) -> Self {
        Self { encoding }
    }

    /// The first-round prompt. When `section` is given, only its excerpt
    /// of `document` is shown; line numbers (line-addressed encoding only)
    /// are then excerpt-relative and the caller rebases parsed ranges.
    pub fn edit_prompt(
        &self,
        instruction: &str,
        document: &str,
        section: Option<&SectionSlice>,
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str("You are editing an HTML page for a website builder.\n\n");
        let _ = writeln!(prompt, "Instruction:\n{}\n", instruction);

        match section {
            Some(slice) => {
                let _ = writeln!(
                    prompt,
                    "Relevant section ({}, lines {}-{} of the page):",
                    slice.name, slice.start_line, slice.end_line
                );
                prompt.push_str(&self.render_body(&slice.excerpt(document)));
            }
            None => {
                prompt.push_str("Current page:\n");
                prompt.push_str(&self.render_body(document));
            }
        }
        prompt.push_str("\n\n");
        prompt.push_str(self.rules());
        prompt
    }

    /// A retry-round prompt. The document shown is the current snapshot
    /// (edits that already applied are in it), so the model must only
    /// re-issue corrected blocks for the listed failures.
    pub fn corrective_prompt(
        &self,
        instruction: &str,
        document: &str,
        failures: &[BlockFailure],
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str("Some of your proposed edits could not be applied.\n\n");
        let _ = writeln!(prompt, "Instruction (unchanged):\n{}\n", instruction);

        prompt.push_str("Failed edits:\n");
        for failure in failures {
            let _ = writeln!(prompt, "- block {}: {}", failure.index, failure.reason);
        }
        prompt.push('\n');
        prompt.push_str(
            "The page below already includes the edits that did apply. \
             Re-issue corrected blocks for the failed edits only; do not \
             repeat edits that already applied.\n\n",
        );
        prompt.push_str("Current page:\n");
        prompt.push_str(&self.render_body(document));
        prompt.push_str("\n\n");
        prompt.push_str(self.rules());
        prompt
    }

    fn render_body(&self, body: &str) -> String {
        match self.encoding {
            EncodingKind::ContentSearch => body.to_string(),
            EncodingKind::LineRange => number_lines(body),
        }
    }

    fn rules(&self) -> &'static str {
        match self.encoding {
            EncodingKind::ContentSearch => CONTENT_RULES,
            EncodingKind::LineRange => LINE_RULES,
        }
    }
}
