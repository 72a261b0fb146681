//! Prompt materials for the Pagelift patch engine.
//!
//! Everything the caller needs between "user typed an instruction" and
//! "prompt handed to the model": a scope classification deciding whether to
//! send the whole document or an excerpt, a tag-balanced section extractor,
//! a stable line-numbering formatter, and deterministic prompt builders for
//! the initial and corrective rounds.
//!
//! This is a **Layer 2 (Infrastructure)** crate:
//! - Depends on: pagelift-core (data model)
//! - Used by: pagelift-engine (retry loop)

mod builder;
mod numbering;
mod scope;
mod section;

pub use builder::PromptBuilder;
pub use numbering::number_lines;
pub use scope::{classify, EditScope};
pub use section::{extract, SectionSlice};
