//! Reflectify client crate - generative-text transport trait and implementations.
//!
//! Provides the [`TextGenerator`] trait the interaction engine depends on,
//! a [`MockTextGenerator`] for tests and offline runs, and a [`GeminiClient`]
//! that talks to the Gemini `generateContent` API over HTTPS.

pub mod error;
pub mod gemini;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use reflectify_core::GenerationOptions;
use tokio::sync::Semaphore;

pub use error::ClientError;
pub use gemini::GeminiClient;

/// Service that turns a prompt into generated text.
///
/// Implementations are stateless per call; the engine may issue calls for
/// different tasks concurrently through the same instance.
pub trait TextGenerator: Send + Sync {
    /// Generate a reply for `prompt` using the given sampling options.
    ///
    /// # Returns
    /// The raw reply text. It may be empty; deciding whether an empty reply
    /// is usable is the caller's job.
    fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> impl std::future::Future<Output = Result<String, ClientError>> + Send;
}

/// A prompt/options pair seen by [`MockTextGenerator`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub prompt: String,
    pub options: GenerationOptions,
}

/// Mock text generator for testing.
///
/// Replies come from a script (consumed in order) and, once the script is
/// exhausted, from an optional fixed fallback reply. Clones share the same
/// script, call log and gate.
///
/// A gated mock parks every call until [`release`](Self::release) hands out
/// permits, which makes in-flight states observable. A gated mock that is
/// never released models a reply that never arrives.
#[derive(Debug, Clone)]
pub struct MockTextGenerator {
    script: Arc<Mutex<VecDeque<Result<String, ClientError>>>>,
    fallback: Option<String>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    gate: Option<Arc<Semaphore>>,
}

impl MockTextGenerator {
    /// Create a mock that always replies with `text`.
    pub fn replying(text: &str) -> Self {
        Self::build(VecDeque::new(), Some(text.to_string()))
    }

    /// Create a mock that plays back `replies` in order, then fails with a
    /// service error.
    pub fn scripted(replies: Vec<Result<String, ClientError>>) -> Self {
        Self::build(replies.into(), None)
    }

    fn build(script: VecDeque<Result<String, ClientError>>, fallback: Option<String>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            fallback,
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }

    /// Hold every call until permits are released.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `n` held calls proceed. No-op on an ungated mock.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Queue another scripted reply.
    pub fn push_reply(&self, reply: Result<String, ClientError>) {
        self.script
            .lock()
            .expect("mock script mutex poisoned")
            .push_back(reply);
    }

    /// Number of calls started so far (including ones still held).
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock calls mutex poisoned").len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("mock calls mutex poisoned").clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.calls
            .lock()
            .expect("mock calls mutex poisoned")
            .last()
            .map(|c| c.prompt.clone())
    }

    /// Calls currently between start and reply.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were ever in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Result<String, ClientError> {
        let scripted = self
            .script
            .lock()
            .expect("mock script mutex poisoned")
            .pop_front();
        match (scripted, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(ClientError::Service("mock script exhausted".to_string())),
        }
    }
}

/// Decrements the in-flight counter even when the call future is dropped.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TextGenerator for MockTextGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ClientError> {
        if prompt.trim().is_empty() {
            return Err(ClientError::Service("empty prompt".to_string()));
        }

        self.calls
            .lock()
            .expect("mock calls mutex poisoned")
            .push(RecordedCall {
                prompt: prompt.to_string(),
                options: *options,
            });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if let Some(gate) = &self.gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(ClientError::Transport("mock gate closed".to_string())),
            }
        }

        self.next_reply()
    }
}
