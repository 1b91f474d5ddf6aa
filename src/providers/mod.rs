/*!
 * Provider implementations for generative-text services.
 *
 * This module contains client implementations for chat-completion providers:
 * - Anthropic: Anthropic messages API integration
 * - Mock: scripted provider for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// A single chat-completion exchange submitted to a provider
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The model to use
    pub model: String,

    /// The user prompt
    pub prompt: String,

    /// Optional system context to guide the model
    pub system: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum number of tokens to generate, when bounded
    pub max_tokens: Option<u32>,
}

/// Common trait for all chat-completion providers
///
/// This trait defines the interface that all provider implementations must
/// follow, allowing them to be used interchangeably by the request
/// orchestrator.
#[async_trait]
pub trait ChatProvider: Send + Sync + Debug {
    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<String, ProviderError>` - The response text payload or an error
    async fn complete(&self, request: ChatRequest) -> Result<String, ProviderError>;
}

pub mod anthropic;
pub mod mock;
