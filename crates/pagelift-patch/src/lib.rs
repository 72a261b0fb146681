//! Edit-block parsing and application for model-proposed document edits.
//!
//! This crate converts a raw model response into edit blocks and applies
//! them to an HTML document with flexible matching strategies.
//!
//! # Architecture
//!
//! This is a **Layer 2 (Infrastructure)** crate:
//! - Depends on: pagelift-core (data model)
//! - Used by: pagelift-engine (retry loop)
//!
//! # Usage
//!
//! ```rust,ignore
//! use pagelift_core::{EncodingKind, ParseOutcome};
//! use pagelift_patch::{BlockParser, PatchApplicator};
//!
//! let parser = BlockParser::new(EncodingKind::ContentSearch, false);
//! let outcome = parser.parse(model_output)?;
//!
//! if let ParseOutcome::Blocks { blocks } = outcome {
//!     let report = PatchApplicator::default().apply(&html, &blocks);
//!     // report.html is the new document; report.failed feeds the
//!     // corrective prompt for the next round.
//! }
//! ```

mod applier;
mod locator;
mod parser;

pub use applier::PatchApplicator;
pub use locator::ContentLocator;
pub use parser::BlockParser;
