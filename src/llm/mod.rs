/*!
 * LLM request orchestration for the subtitling pipeline.
 *
 * This module contains the stateful services around every LLM call. It is
 * split into several submodules:
 *
 * - `core`: request building and the dispatch loop
 * - `log_store`: partitioned response cache and audit log
 * - `usage`: per-function / per-origin usage metering
 * - `prompts`: prompt templates and builders
 */

// Re-export main types for easier usage
pub use self::core::{LlmRequest, RequestOrchestrator, RetryPolicy, ValidationResult, Validator};
pub use self::log_store::{LogEntry, ResponseLog, ERROR_PARTITION};
pub use self::usage::{FunctionUsage, UsageMeter, UsageSnapshot};

// Submodules
pub mod core;
pub mod log_store;
pub mod prompts;
pub mod usage;
