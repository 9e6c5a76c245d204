//! Interaction engine: central coordinator for the three tasks.
//!
//! Wires prompt building, the text generator, reply extraction and
//! validation, and keeps per-task state. State locks are only taken between
//! awaits, never across one.

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use reflectify_client::TextGenerator;
use reflectify_core::{AnalysisRecord, ExpressionResult, GenerationOptions, Mood, Turn};

use crate::context::{ConversationStore, ConversationView};
use crate::error::{EngineError, ErrorKind};
use crate::parser::ResponseExtractor;
use crate::prompt::{build_analysis_prompt, build_chat_prompt, build_expression_prompt};
use crate::state::{InFlight, TaskSlot, TaskSnapshot};
use crate::validator::AnalysisValidator;

/// Coordinates expression, chat and analysis requests against one generator.
pub struct InteractionEngine<G: TextGenerator> {
    generator: G,
    extractor: ResponseExtractor,
    validator: AnalysisValidator,
    expression: Mutex<TaskSlot<ExpressionResult>>,
    analysis: Mutex<TaskSlot<AnalysisRecord>>,
    chat: Mutex<ConversationStore>,
    analysis_retries: u32,
}

impl<G: TextGenerator> InteractionEngine<G> {
    /// Create an engine with default extraction limits and single-shot
    /// analysis.
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            extractor: ResponseExtractor::default(),
            validator: AnalysisValidator::default(),
            expression: Mutex::new(TaskSlot::new("expression")),
            analysis: Mutex::new(TaskSlot::new("analysis")),
            chat: Mutex::new(ConversationStore::new()),
            analysis_retries: 0,
        }
    }

    /// Re-ask up to `retries` more times when an analysis reply is unusable.
    ///
    /// Transport and service failures are never retried.
    pub fn with_analysis_retries(mut self, retries: u32) -> Self {
        self.analysis_retries = retries;
        self
    }

    pub fn with_extractor(mut self, extractor: ResponseExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    // =========================================================================
    // Expression
    // =========================================================================

    /// Send a free-form expression and return the supportive reply.
    pub async fn submit_expression(&self, text: &str) -> Result<ExpressionResult, EngineError> {
        let text = non_empty(text, "expression")?;
        let ticket = lock(&self.expression)?.begin()?;
        tracing::info!(task = "expression", input_len = text.len(), "Submitting expression");

        let started = Instant::now();
        let prompt = build_expression_prompt(text);
        let outcome = self
            .generator
            .generate(&prompt, &GenerationOptions::CONVERSATIONAL)
            .await
            .map_err(EngineError::from)
            .and_then(|raw| self.extractor.extract_text(&raw))
            .map(|reply| ExpressionResult { reply });

        let outcome = settle(&self.expression, ticket, outcome)?;
        log_outcome("expression", started, &outcome);
        outcome
    }

    /// Drop the current reply. A request still in flight will be discarded.
    pub fn clear_expression(&self) -> Result<(), EngineError> {
        lock(&self.expression)?.clear();
        Ok(())
    }

    pub fn expression(&self) -> Result<TaskSnapshot<ExpressionResult>, EngineError> {
        Ok(lock(&self.expression)?.snapshot())
    }

    // =========================================================================
    // Chat
    // =========================================================================

    /// Start a fresh conversation for `mood`, opened by its welcome turn.
    pub fn select_mood(&self, mood: Mood) -> Result<ConversationView, EngineError> {
        let mut chat = lock(&self.chat)?;
        chat.select_mood(mood)?;
        tracing::info!(task = "chat", mood = %mood, "Conversation started");
        Ok(chat.view())
    }

    /// Send the next user message and return the assistant's turn.
    ///
    /// The user turn is appended before the call and stays even if the call
    /// fails.
    pub async fn submit_chat_turn(&self, text: &str) -> Result<Turn, EngineError> {
        let text = non_empty(text, "chat")?;
        let ticket = lock(&self.chat)?.begin_turn(text)?;
        tracing::info!(
            task = "chat",
            mood = %ticket.mood(),
            history_len = ticket.history().len(),
            input_len = text.len(),
            "Submitting chat turn"
        );

        let started = Instant::now();
        let prompt = build_chat_prompt(ticket.mood(), ticket.history(), ticket.text());
        let outcome = self
            .generator
            .generate(&prompt, &GenerationOptions::CONVERSATIONAL)
            .await
            .map_err(EngineError::from)
            .and_then(|raw| self.extractor.extract_text(&raw));

        let outcome = lock(&self.chat)?.complete_turn(ticket, outcome);
        log_outcome("chat", started, &outcome);
        outcome
    }

    /// Discard the conversation and go back to mood selection.
    pub fn reset_chat(&self) -> Result<(), EngineError> {
        lock(&self.chat)?.reset();
        tracing::info!(task = "chat", "Conversation reset");
        Ok(())
    }

    pub fn conversation(&self) -> Result<ConversationView, EngineError> {
        Ok(lock(&self.chat)?.view())
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    /// Ask for a safety analysis of `text` and return the validated record.
    pub async fn analyze_content(&self, text: &str) -> Result<AnalysisRecord, EngineError> {
        let text = non_empty(text, "analysis")?;
        let ticket = lock(&self.analysis)?.begin()?;
        tracing::info!(task = "analysis", input_len = text.len(), "Submitting analysis");

        let started = Instant::now();
        let prompt = build_analysis_prompt(text);
        let mut attempt = 0u32;
        let outcome = loop {
            attempt += 1;
            let result = self.analyze_once(&prompt).await;
            let retryable = matches!(&result, Err(err) if err.kind().is_some_and(|k| k.is_unusable_reply()));
            if !retryable || attempt > self.analysis_retries {
                break result;
            }
            if !lock(&self.analysis)?.is_current(&ticket) {
                break result;
            }
            if let Err(err) = &result {
                tracing::warn!(
                    task = "analysis",
                    attempt,
                    retries = self.analysis_retries,
                    error = %err,
                    "Unusable analysis reply, asking again"
                );
            }
        };

        let outcome = settle(&self.analysis, ticket, outcome)?;
        log_outcome("analysis", started, &outcome);
        outcome
    }

    pub fn analysis(&self) -> Result<TaskSnapshot<AnalysisRecord>, EngineError> {
        Ok(lock(&self.analysis)?.snapshot())
    }

    async fn analyze_once(&self, prompt: &str) -> Result<AnalysisRecord, EngineError> {
        let raw = self
            .generator
            .generate(prompt, &GenerationOptions::ANALYSIS)
            .await?;
        let text = self.extractor.extract_text(&raw)?;
        let object = self.extractor.extract_object(&text)?;
        Ok(self.validator.validate(&object)?)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, EngineError> {
    mutex
        .lock()
        .map_err(|e| EngineError::StateLock(e.to_string()))
}

/// Trimmed input, or `EmptyInput` without touching task state.
fn non_empty<'a>(text: &'a str, task: &'static str) -> Result<&'a str, EngineError> {
    let text = text.trim();
    if text.is_empty() {
        tracing::debug!(task, "Rejecting empty input");
        return Err(EngineError::EmptyInput);
    }
    Ok(text)
}

/// Apply a finished request to its slot.
///
/// The outer `Result` is a lock failure; the inner one is what the caller
/// gets back. A stale ticket turns any outcome into `Superseded`.
fn settle<T: Clone>(
    slot: &Mutex<TaskSlot<T>>,
    ticket: InFlight,
    outcome: Result<T, EngineError>,
) -> Result<Result<T, EngineError>, EngineError> {
    let mut slot = lock(slot)?;
    let settled = match outcome {
        Ok(value) => {
            if slot.succeed(ticket, value.clone()) {
                Ok(value)
            } else {
                Err(EngineError::Superseded)
            }
        }
        Err(err) => {
            // Errors returned after a call always carry a kind.
            let kind = err.kind().unwrap_or(ErrorKind::Service);
            if slot.fail(ticket, kind) {
                Err(err)
            } else {
                Err(EngineError::Superseded)
            }
        }
    };
    Ok(settled)
}

fn log_outcome<T>(task: &'static str, started: Instant, outcome: &Result<T, EngineError>) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(_) => tracing::info!(task, elapsed_ms, "Request succeeded"),
        Err(EngineError::Superseded) => {
            tracing::info!(task, elapsed_ms, "Request result discarded")
        }
        Err(err) => tracing::warn!(task, elapsed_ms, error = %err, "Request failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflectify_client::{ClientError, MockTextGenerator};
    use reflectify_core::{OverallRating, Speaker};

    use crate::state::TaskPhase;

    const ANALYSIS_REPLY: &str = r#"{"toxicity":0.1,"insult":0.0,"profanity":0.0,"identity_attack":0.0,"threat":0.0,"overall":"safe","summary":"Friendly."}"#;

    #[tokio::test]
    async fn test_expression_success() {
        let engine = InteractionEngine::new(MockTextGenerator::replying("  That sounds hard...  "));
        let result = engine.submit_expression("I had a rough day").await.unwrap();
        assert_eq!(result.reply, "That sounds hard...");

        let snapshot = engine.expression().unwrap();
        assert_eq!(snapshot.phase, TaskPhase::Succeeded);
        assert_eq!(snapshot.result, Some(result));

        let calls = engine.generator().calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("I had a rough day"));
        assert_eq!(calls[0].options, GenerationOptions::CONVERSATIONAL);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_call() {
        let engine = InteractionEngine::new(MockTextGenerator::replying("unused"));
        assert!(matches!(
            engine.submit_expression("   ").await,
            Err(EngineError::EmptyInput)
        ));
        assert!(matches!(
            engine.analyze_content("").await,
            Err(EngineError::EmptyInput)
        ));
        engine.select_mood(Mood::Happy).unwrap();
        assert!(matches!(
            engine.submit_chat_turn("\n").await,
            Err(EngineError::EmptyInput)
        ));
        assert_eq!(engine.generator().call_count(), 0);
        assert_eq!(engine.expression().unwrap().phase, TaskPhase::Idle);
        assert_eq!(engine.conversation().unwrap().turns().len(), 1);
    }

    #[tokio::test]
    async fn test_expression_failure_keeps_previous_reply() {
        let mock = MockTextGenerator::scripted(vec![
            Ok("first reply".to_string()),
            Err(ClientError::Transport("connection reset".to_string())),
        ]);
        let engine = InteractionEngine::new(mock);
        engine.submit_expression("one").await.unwrap();

        let err = engine.submit_expression("two").await.unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));

        let snapshot = engine.expression().unwrap();
        assert_eq!(snapshot.phase, TaskPhase::Failed);
        assert_eq!(snapshot.last_error, Some(ErrorKind::Transport));
        assert_eq!(snapshot.result.unwrap().reply, "first reply");
    }

    #[tokio::test]
    async fn test_expression_empty_reply() {
        let engine = InteractionEngine::new(MockTextGenerator::replying("   "));
        assert!(matches!(
            engine.submit_expression("hello").await,
            Err(EngineError::EmptyReply)
        ));
        assert_eq!(
            engine.expression().unwrap().last_error,
            Some(ErrorKind::EmptyReply)
        );
    }

    #[tokio::test]
    async fn test_clear_expression() {
        let engine = InteractionEngine::new(MockTextGenerator::replying("reply"));
        engine.submit_expression("hello").await.unwrap();
        engine.clear_expression().unwrap();
        let snapshot = engine.expression().unwrap();
        assert_eq!(snapshot.phase, TaskPhase::Idle);
        assert!(snapshot.result.is_none());
    }

    #[tokio::test]
    async fn test_chat_turn_uses_conversational_profile_and_history() {
        let engine = InteractionEngine::new(MockTextGenerator::replying("I hear you."));
        engine.select_mood(Mood::Sad).unwrap();
        let turn = engine.submit_chat_turn("work was rough").await.unwrap();
        assert_eq!(turn.speaker(), Speaker::Assistant);
        assert_eq!(turn.text(), "I hear you.");

        let call = &engine.generator().calls()[0];
        assert_eq!(call.options, GenerationOptions::CONVERSATIONAL);
        assert!(call.prompt.contains("AI: I'm sorry to hear you're feeling down."));
        assert!(call.prompt.contains("User's new message: \"work was rough\""));
        assert!(
            !call.prompt.contains("User: work was rough"),
            "new message is not duplicated into the history"
        );
    }

    #[tokio::test]
    async fn test_chat_without_mood() {
        let engine = InteractionEngine::new(MockTextGenerator::replying("unused"));
        assert!(matches!(
            engine.submit_chat_turn("hello").await,
            Err(EngineError::NoMood)
        ));
        assert_eq!(engine.generator().call_count(), 0);
    }

    #[tokio::test]
    async fn test_select_unset_mood() {
        let engine = InteractionEngine::new(MockTextGenerator::replying("unused"));
        assert!(matches!(
            engine.select_mood(Mood::Unset),
            Err(EngineError::UnsetMood)
        ));
    }

    #[tokio::test]
    async fn test_analysis_success() {
        let engine = InteractionEngine::new(MockTextGenerator::replying(ANALYSIS_REPLY));
        let record = engine.analyze_content("have a nice day").await.unwrap();
        assert_eq!(record.overall, OverallRating::Safe);
        assert_eq!(record.summary, "Friendly.");
        assert_eq!(
            engine.generator().calls()[0].options,
            GenerationOptions::ANALYSIS
        );
        assert_eq!(engine.analysis().unwrap().phase, TaskPhase::Succeeded);
    }

    #[tokio::test]
    async fn test_analysis_no_object() {
        let engine =
            InteractionEngine::new(MockTextGenerator::replying("I can't analyze that."));
        let err = engine.analyze_content("text").await.unwrap_err();
        assert!(matches!(err, EngineError::Extraction(_)));
        assert_eq!(
            engine.analysis().unwrap().last_error,
            Some(ErrorKind::Extraction)
        );
    }

    #[tokio::test]
    async fn test_analysis_too_large_reply() {
        let engine = InteractionEngine::new(MockTextGenerator::replying(ANALYSIS_REPLY))
            .with_extractor(ResponseExtractor::new(32, 8));
        let err = engine.analyze_content("text").await.unwrap_err();
        assert!(matches!(err, EngineError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_analysis_service_error_kind() {
        let mock = MockTextGenerator::scripted(vec![Err(ClientError::Service(
            "prompt blocked: SAFETY".to_string(),
        ))]);
        let engine = InteractionEngine::new(mock);
        let err = engine.analyze_content("text").await.unwrap_err();
        assert!(matches!(err, EngineError::Service(_)));
        let kind = engine.analysis().unwrap().last_error.unwrap();
        assert!(kind.is_unreachable());
    }

    #[tokio::test]
    async fn test_poisoned_lock_is_reported() {
        let engine = InteractionEngine::new(MockTextGenerator::replying("reply"));
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = engine.expression.lock().unwrap();
            panic!("poison the expression slot");
        }));
        assert!(matches!(
            engine.submit_expression("hello").await,
            Err(EngineError::StateLock(_))
        ));
        // Other tasks are unaffected.
        assert!(engine.analysis().is_ok());
    }
}
