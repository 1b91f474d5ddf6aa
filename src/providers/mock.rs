/*!
 * Mock provider implementations for testing.
 *
 * This module provides a scripted mock provider that simulates different
 * behaviors:
 * - `MockProvider::replying(text)` - Always succeeds with the given text
 * - `MockProvider::failing(message)` - Always fails with a connection error
 * - `MockProvider::scripted(outcomes)` - Plays back per-call outcomes in order
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::{ChatProvider, ChatRequest};

/// Scripted outcome for a single mock completion call
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Respond successfully with the given text payload
    Reply(String),
    /// Fail with a connection error carrying the given message
    Fail(String),
}

impl MockOutcome {
    /// Convenience constructor for a successful reply
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }

    /// Convenience constructor for a transport failure
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

/// Mock provider for testing orchestration behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Per-call outcomes consumed front-to-back
    script: Mutex<VecDeque<MockOutcome>>,
    /// Outcome used once the script is exhausted
    fallback: MockOutcome,
    /// Number of completion calls received
    call_count: AtomicUsize,
    /// The most recent request, for assertions on assembled parameters
    last_request: Mutex<Option<ChatRequest>>,
}

impl MockProvider {
    /// Create a mock that plays back the given outcomes, then repeats the last one
    pub fn scripted(outcomes: Vec<MockOutcome>) -> Self {
        let fallback = outcomes
            .last()
            .cloned()
            .unwrap_or_else(|| MockOutcome::fail("mock script is empty"));
        Self {
            script: Mutex::new(outcomes.into()),
            fallback,
            call_count: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock provider that always succeeds with the given text
    pub fn replying(text: impl Into<String>) -> Self {
        Self::scripted(vec![MockOutcome::reply(text)])
    }

    /// Create a failing mock provider that always errors
    pub fn failing(message: impl Into<String>) -> Self {
        Self::scripted(vec![MockOutcome::fail(message)])
    }

    /// Number of completion calls this mock has received
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The most recent request received, if any
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn complete(&self, request: ChatRequest) -> Result<String, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request);

        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match outcome {
            MockOutcome::Reply(text) => Ok(text),
            MockOutcome::Fail(message) => Err(ProviderError::ConnectionError(message)),
        }
    }
}
