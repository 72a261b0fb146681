//! The retry orchestrator: analyze, apply, and correct within a bounded
//! round budget.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use pagelift_core::{
    BlockFailure, EditBlock, EngineConfig, ParseError, ParseOutcome,
};
use pagelift_patch::{BlockParser, PatchApplicator};
use pagelift_prompt::{classify, extract, EditScope, PromptBuilder, SectionSlice};

use crate::client::ModelClient;
use crate::outcome::{EditOutcome, EngineError, EngineEvent, EnginePhase};

/// Drives one edit session against a document snapshot.
pub struct EditEngine {
    config: EngineConfig,
    client: Arc<dyn ModelClient>,
    events: Option<UnboundedSender<EngineEvent>>,
}

impl EditEngine {
    pub fn new(client: Arc<dyn ModelClient>, config: EngineConfig) -> Self {
        Self {
            config,
            client,
            events: None,
        }
    }

    /// Forward progress events to the given channel. Send failures are
    /// ignored; progress display is best-effort.
    pub fn with_events(mut self, events: UnboundedSender<EngineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run the full analyze -> apply -> correct loop for one instruction.
    ///
    /// The caller owns serialization per end-user: two concurrent sessions
    /// against the same document would violate the single-writer snapshot
    /// assumption.
    pub async fn run(
        &self,
        document: &str,
        instruction: &str,
    ) -> Result<EditOutcome, EngineError> {
        let parser = BlockParser::new(self.config.encoding, self.config.allow_full_rewrite);
        let applicator = PatchApplicator::new(self.config.tab_width);
        let prompts = PromptBuilder::new(self.config.encoding);

        self.emit_phase(EnginePhase::Analyzing);
        let scope = classify(instruction);
        let section = match scope {
            EditScope::Section => extract(document, instruction),
            _ => None,
        };
        debug!(
            ?scope,
            section = section.as_ref().map(|s| s.name.as_str()),
            "analyzed instruction"
        );

        let max_rounds = self.config.max_retry_rounds + 1;
        let mut current = document.to_string();
        let mut total_applied = 0usize;
        let mut last_failures: Vec<BlockFailure> = Vec::new();

        for round in 1..=max_rounds {
            // Corrective rounds always show the current snapshot, freshly
            // renumbered; already-applied edits must not be re-requested.
            let prompt = if round == 1 {
                prompts.edit_prompt(instruction, &current, section.as_ref())
            } else {
                prompts.corrective_prompt(instruction, &current, &last_failures)
            };

            let raw = self
                .client
                .complete(&prompt)
                .await
                .map_err(EngineError::Model)?;

            let parsed = match parser.parse(&raw) {
                Ok(parsed) => parsed,
                Err(ParseError::FullDocumentRejected) => {
                    warn!(round, "model produced a forbidden full-document rewrite");
                    return Ok(self.stall(round, current, total_applied, last_failures));
                }
            };

            let blocks = match parsed {
                ParseOutcome::NoChanges => {
                    debug!(round, "model declared no changes needed");
                    if round == 1 {
                        return Ok(EditOutcome::NoChanges);
                    }
                    return Ok(self.stall(round, current, total_applied, last_failures));
                }
                ParseOutcome::FullDocument { html } => {
                    info!(round, "model produced a full-document rewrite");
                    self.emit_phase(EnginePhase::Succeeded);
                    return Ok(EditOutcome::Succeeded {
                        html,
                        applied_count: total_applied,
                        rounds: round,
                    });
                }
                ParseOutcome::Blocks { blocks } => blocks,
            };

            if blocks.is_empty() {
                // The sole hard stop: nothing usable was parsed, and a
                // parse failure is never retried by the engine itself.
                warn!(round, "no usable edit blocks parsed");
                return Ok(self.stall(round, current, total_applied, last_failures));
            }

            let blocks = if round == 1 {
                rebase_line_blocks(blocks, section.as_ref())
            } else {
                blocks
            };

            self.emit_phase(EnginePhase::Applying);
            let report = applicator.apply(&current, &blocks);
            info!(
                round,
                applied = report.applied_count,
                failed = report.failed.len(),
                "apply pass complete"
            );
            self.emit(EngineEvent::RoundCompleted {
                round,
                applied_count: report.applied_count,
                failed_count: report.failed.len(),
            });

            total_applied += report.applied_count;
            current = report.html;

            if report.all_applied {
                self.emit_phase(EnginePhase::Succeeded);
                return Ok(EditOutcome::Succeeded {
                    html: current,
                    applied_count: total_applied,
                    rounds: round,
                });
            }
            last_failures = report.failed;
        }

        warn!(
            rounds = max_rounds,
            unresolved = last_failures.len(),
            "retry budget exhausted"
        );
        Ok(if total_applied > 0 {
            self.emit_phase(EnginePhase::PartiallyFailed);
            EditOutcome::PartiallyFailed {
                html: current,
                applied_count: total_applied,
                failed: last_failures,
                rounds: max_rounds,
            }
        } else {
            self.emit_phase(EnginePhase::RetryExhausted);
            EditOutcome::Failed {
                failed: last_failures,
                rounds: max_rounds,
            }
        })
    }

    /// Terminal outcome for a round that produced nothing applicable.
    fn stall(
        &self,
        rounds: usize,
        html: String,
        total_applied: usize,
        failures: Vec<BlockFailure>,
    ) -> EditOutcome {
        if total_applied > 0 {
            self.emit_phase(EnginePhase::PartiallyFailed);
            EditOutcome::PartiallyFailed {
                html,
                applied_count: total_applied,
                failed: failures,
                rounds,
            }
        } else if failures.is_empty() {
            self.emit_phase(EnginePhase::RetryExhausted);
            EditOutcome::NoUsableEdits { rounds }
        } else {
            self.emit_phase(EnginePhase::RetryExhausted);
            EditOutcome::Failed {
                failed: failures,
                rounds,
            }
        }
    }

    fn emit_phase(&self, phase: EnginePhase) {
        self.emit(EngineEvent::PhaseChanged { phase });
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// Map excerpt-relative line numbers back onto the full document. Only the
/// first round can show an excerpt, so only its blocks need rebasing.
fn rebase_line_blocks(blocks: Vec<EditBlock>, section: Option<&SectionSlice>) -> Vec<EditBlock> {
    let Some(slice) = section else {
        return blocks;
    };
    let offset = slice.line_offset();
    if offset == 0 {
        return blocks;
    }
    blocks
        .into_iter()
        .map(|block| match block {
            EditBlock::Line {
                start_line,
                end_line,
                new_content,
            } => EditBlock::Line {
                start_line: start_line + offset,
                end_line: end_line + offset,
                new_content,
            },
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pagelift_core::{EncodingKind, FailReason};

    use super::*;

    /// A model that replays scripted responses and records every prompt.
    struct ScriptedClient {
        responses: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompt(&self, i: usize) -> String {
            self.prompts.lock().unwrap()[i].clone()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("scripted responses exhausted"))
        }
    }

    fn search_replace(search: &str, replace: &str) -> String {
        format!(
            "<<<<<<< SEARCH\n{}\n=======\n{}\n>>>>>>> REPLACE\n",
            search, replace
        )
    }

    fn engine(client: Arc<ScriptedClient>) -> EditEngine {
        EditEngine::new(client, EngineConfig::default())
    }

    #[tokio::test]
    async fn succeeds_in_one_round() {
        let client = ScriptedClient::new(&[&search_replace("<p>Hi</p>", "<p>Hello</p>")]);
        let outcome = engine(client.clone())
            .run("<div><p>Hi</p></div>", "say hello")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            EditOutcome::Succeeded {
                html: "<div><p>Hello</p></div>".to_string(),
                applied_count: 1,
                rounds: 1,
            }
        );
        // Round 1 prompt shows the instruction and the full document.
        let prompt = client.prompt(0);
        assert!(prompt.contains("say hello"));
        assert!(prompt.contains("<div><p>Hi</p></div>"));
    }

    #[tokio::test]
    async fn corrective_round_reports_failure_reasons() {
        let doc = "<h1>Title</h1>\n<p>body</p>";
        let round1 = format!(
            "{}{}",
            search_replace("<h1>Title</h1>", "<h1>New</h1>"),
            search_replace("<aside>missing</aside>", "<aside>x</aside>"),
        );
        let round2 = search_replace("<p>body</p>", "<p>text</p>");
        let client = ScriptedClient::new(&[&round1, &round2]);

        let outcome = engine(client.clone()).run(doc, "freshen up").await.unwrap();
        assert_eq!(
            outcome,
            EditOutcome::Succeeded {
                html: "<h1>New</h1>\n<p>text</p>".to_string(),
                applied_count: 2,
                rounds: 2,
            }
        );

        // The corrective prompt names the failed block and its reason, and
        // shows the partially-patched document, not the stale one.
        let corrective = client.prompt(1);
        assert!(corrective.contains("block 1:"));
        assert!(corrective.contains("not found"));
        assert!(corrective.contains("<h1>New</h1>"));
        assert!(!corrective.contains("<h1>Title</h1>"));
    }

    #[tokio::test]
    async fn partial_failure_after_exhausted_retries() {
        let doc = "<h1>Title</h1>\n<p>body</p>";
        let good_then_bad = format!(
            "{}{}",
            search_replace("<h1>Title</h1>", "<h1>New</h1>"),
            search_replace("<aside>missing</aside>", "<aside>x</aside>"),
        );
        let still_bad = search_replace("<aside>missing</aside>", "<aside>x</aside>");
        let client = ScriptedClient::new(&[&good_then_bad, &still_bad, &still_bad]);

        let outcome = engine(client).run(doc, "freshen up").await.unwrap();
        match outcome {
            EditOutcome::PartiallyFailed {
                html,
                applied_count,
                failed,
                rounds,
            } => {
                assert!(html.contains("<h1>New</h1>"));
                assert_eq!(applied_count, 1);
                assert_eq!(rounds, 3);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].reason, FailReason::SearchNotFound);
            }
            other => panic!("expected PartiallyFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn total_failure_surfaces_no_document() {
        let bad = search_replace("<nothing>here</nothing>", "<x/>");
        let client = ScriptedClient::new(&[&bad, &bad, &bad]);
        let outcome = engine(client).run("<p>doc</p>", "edit").await.unwrap();
        match outcome {
            EditOutcome::Failed { failed, rounds } => {
                assert_eq!(rounds, 3);
                assert_eq!(failed.len(), 1);
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn no_changes_declaration_ends_the_session() {
        let client = ScriptedClient::new(&["No changes required."]);
        let outcome = engine(client).run("<p>fine</p>", "tidy").await.unwrap();
        assert_eq!(outcome, EditOutcome::NoChanges);
    }

    #[tokio::test]
    async fn unparseable_response_is_not_retried() {
        let client = ScriptedClient::new(&["I would suggest a nicer hero image."]);
        let outcome = engine(client.clone()).run("<p>doc</p>", "edit").await.unwrap();
        assert_eq!(outcome, EditOutcome::NoUsableEdits { rounds: 1 });
        assert_eq!(client.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn full_rewrite_rejected_by_default() {
        let client = ScriptedClient::new(&["<!DOCTYPE html>\n<html><body>new</body></html>"]);
        let outcome = engine(client).run("<p>doc</p>", "edit").await.unwrap();
        assert_eq!(outcome, EditOutcome::NoUsableEdits { rounds: 1 });
    }

    #[tokio::test]
    async fn full_rewrite_accepted_when_configured() {
        let client = ScriptedClient::new(&["<!DOCTYPE html>\n<html><body>new</body></html>"]);
        let config = EngineConfig {
            allow_full_rewrite: true,
            ..EngineConfig::default()
        };
        let outcome = EditEngine::new(client, config)
            .run("<p>doc</p>", "start over")
            .await
            .unwrap();
        match outcome {
            EditOutcome::Succeeded { html, rounds, .. } => {
                assert!(html.contains("<body>new</body>"));
                assert_eq!(rounds, 1);
            }
            other => panic!("expected Succeeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn line_encoding_round_trip() {
        let doc = "a\nb\nc\nd\ne";
        let client = ScriptedClient::new(&["```\n[2-2]\nB\n```"]);
        let config = EngineConfig {
            encoding: EncodingKind::LineRange,
            ..EngineConfig::default()
        };
        let outcome = EditEngine::new(client.clone(), config)
            .run(doc, "capitalize the second line")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            EditOutcome::Succeeded {
                html: "a\nB\nc\nd\ne".to_string(),
                applied_count: 1,
                rounds: 1,
            }
        );
        // Line-addressed prompts show the numbered document.
        assert!(client.prompt(0).contains("1 | a"));
    }

    #[tokio::test]
    async fn phases_are_emitted_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let client = ScriptedClient::new(&[&search_replace("<p>Hi</p>", "<p>Hello</p>")]);
        let outcome = engine(client)
            .with_events(tx)
            .run("<p>Hi</p>", "greet")
            .await
            .unwrap();
        assert!(matches!(outcome, EditOutcome::Succeeded { .. }));

        let mut phases = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let EngineEvent::PhaseChanged { phase } = event {
                phases.push(phase);
            }
        }
        assert_eq!(
            phases,
            vec![
                EnginePhase::Analyzing,
                EnginePhase::Applying,
                EnginePhase::Succeeded,
            ]
        );
    }
}
