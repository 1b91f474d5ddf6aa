/*!
 * # sublingo
 *
 * LLM request orchestration core for an AI video subtitling pipeline.
 *
 * ## Features
 *
 * - Cache-first dispatch of requests to a generative text API
 * - Bounded retries with distinct policies per failure mode: transport
 *   failures back off, malformed structured output retries immediately,
 *   semantic validation failures fail at once
 * - Durable per-partition response cache doubling as the audit log of every
 *   request, response and validation failure
 * - Thread-safe usage metering with time-debounced persistence
 * - Duration-constrained subtitle trimming with a deterministic fallback
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `providers`: Client implementations for chat-completion providers:
 *   - `providers::anthropic`: Anthropic API client
 *   - `providers::mock`: Scripted provider for tests
 * - `llm`: Request orchestration services:
 *   - `llm::core`: Request building and dispatch
 *   - `llm::log_store`: Partitioned response cache and audit log
 *   - `llm::usage`: Usage metering
 *   - `llm::prompts`: Prompt templates
 * - `subtitle_trim`: Duration-constrained subtitle shortening
 * - `errors`: Custom error types for the crate
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod errors;
pub mod llm;
pub mod providers;
pub mod subtitle_trim;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{DispatchError, ProviderError};
pub use llm::{LlmRequest, RequestOrchestrator, ResponseLog, UsageMeter, ValidationResult};
pub use subtitle_trim::{DurationEstimator, SubtitleTrimmer};
