/*!
 * Core request orchestration.
 *
 * This module contains the `RequestOrchestrator`, the sole entry point other
 * pipeline stages use for any LLM call. It applies a cache-first policy over
 * the response log, issues the remote call through a `ChatProvider`, retries
 * with a per-failure-mode policy, runs caller-supplied semantic validation,
 * and records every outcome.
 */

use std::sync::Arc;
use std::time::Duration;
use serde_json::Value;
use tokio::time::sleep;
use log::{debug, error, warn};

use crate::app_config::ApiConfig;
use crate::errors::{DispatchError, ProviderError};
use crate::providers::anthropic::Anthropic;
use crate::providers::{ChatProvider, ChatRequest};
use super::log_store::{ResponseLog, ERROR_PARTITION};
use super::usage::UsageMeter;

/// Instruction appended to the system context when structured output is expected
const JSON_INSTRUCTION: &str = "Please provide your response in valid JSON format.";

/// Function name under which dispatches are metered
const DISPATCH_FUNCTION: &str = "dispatch";

/// Origin recorded when the caller did not tag the request
const UNKNOWN_ORIGIN: &str = "unknown";

/// Outcome of caller-supplied semantic validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    ok: bool,
    message: String,
}

impl ValidationResult {
    /// The response is semantically acceptable
    pub fn success() -> Self {
        Self { ok: true, message: String::new() }
    }

    /// The response is rejected for the given reason
    pub fn error(message: impl Into<String>) -> Self {
        Self { ok: false, message: message.into() }
    }

    /// Whether the response was accepted
    pub fn is_success(&self) -> bool {
        self.ok
    }

    /// Human-readable rejection reason, empty on success
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Caller-supplied semantic check run against a parsed response
pub type Validator = Arc<dyn Fn(&Value) -> ValidationResult + Send + Sync>;

/// A single logical request to the generative-text API
///
/// Built in the builder style; the defaults mirror the common case of a
/// structured response logged under the `"default"` partition at temperature
/// 1.0.
#[derive(Clone)]
pub struct LlmRequest {
    prompt: String,
    expect_structured: bool,
    validator: Option<Validator>,
    log_title: Option<String>,
    system_context: Option<String>,
    max_output_tokens: Option<u32>,
    temperature: f32,
    origin: String,
}

impl LlmRequest {
    /// Create a request for the given prompt
    ///
    /// The prompt doubles as the cache key, matched byte-for-byte; callers
    /// must construct identical prompts to hit the cache.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            expect_structured: true,
            validator: None,
            log_title: Some("default".to_string()),
            system_context: None,
            max_output_tokens: None,
            temperature: 1.0,
            origin: UNKNOWN_ORIGIN.to_string(),
        }
    }

    /// Whether the response must parse as structured data (default true)
    pub fn expect_structured(mut self, expect_structured: bool) -> Self {
        self.expect_structured = expect_structured;
        self
    }

    /// Attach a semantic validator run against the parsed response
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> ValidationResult + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Cache and audit-log partition for this request
    pub fn log_title(mut self, log_title: impl Into<String>) -> Self {
        self.log_title = Some(log_title.into());
        self
    }

    /// Disable caching and audit logging for this request
    ///
    /// The request is then never written to or read from any partition.
    pub fn without_logging(mut self) -> Self {
        self.log_title = None;
        self
    }

    /// System context sent alongside the prompt
    pub fn system_context(mut self, system_context: impl Into<String>) -> Self {
        self.system_context = Some(system_context.into());
        self
    }

    /// Bound the response length; values of zero are treated as unbounded
    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Tag the pipeline stage issuing this request, for usage attribution
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// The prompt this request will issue
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Bounds on the dispatch retry loop
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Upper bound on attempts per dispatch
    pub max_attempts: u32,

    /// Delay inserted before retrying a transport failure
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Issues logical requests to the generative-text API
///
/// Dispatch applies, in order: usage metering, a configuration check, a
/// cache-first lookup, and a bounded retry loop with distinct policies per
/// failure mode: transport failures retry after a backoff, parse failures
/// retry immediately, validation failures fail at once.
pub struct RequestOrchestrator {
    provider: Arc<dyn ChatProvider>,
    api: ApiConfig,
    log: Arc<ResponseLog>,
    meter: Arc<UsageMeter>,
    retry: RetryPolicy,
}

impl RequestOrchestrator {
    /// Create an orchestrator backed by the Anthropic API
    pub fn new(api: ApiConfig, log: Arc<ResponseLog>, meter: Arc<UsageMeter>) -> Self {
        let provider = Arc::new(Anthropic::new(api.key.clone(), api.endpoint.clone(), api.timeout_secs));
        Self::with_provider(api, provider, log, meter)
    }

    /// Create an orchestrator backed by an arbitrary provider
    pub fn with_provider(
        api: ApiConfig,
        provider: Arc<dyn ChatProvider>,
        log: Arc<ResponseLog>,
        meter: Arc<UsageMeter>,
    ) -> Self {
        Self {
            provider,
            api,
            log,
            meter,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry bounds
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Issue a single logical request and return its parsed response
    ///
    /// Free-text responses are returned as `Value::String`. Every call
    /// through this path is metered, including cache hits and configuration
    /// failures.
    pub async fn dispatch(&self, request: LlmRequest) -> Result<Value, DispatchError> {
        self.meter.record(DISPATCH_FUNCTION, &request.origin);

        if self.api.key.trim().is_empty() {
            return Err(DispatchError::Configuration("api.key is missing".to_string()));
        }
        if self.api.model.trim().is_empty() {
            return Err(DispatchError::Configuration("api.model is missing".to_string()));
        }

        if let Some(partition) = &request.log_title {
            if let Some(cached) = self.log.lookup(&request.prompt, partition) {
                debug!("Serving dispatch from partition '{}' without a remote call", partition);
                return Ok(cached);
            }
        }

        // The JSON instruction is additive: caller-supplied context stays first.
        let system = if request.expect_structured {
            Some(match &request.system_context {
                Some(context) => format!("{}\n{}", context, JSON_INSTRUCTION),
                None => JSON_INSTRUCTION.to_string(),
            })
        } else {
            request.system_context.clone()
        };

        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_failure: Option<ProviderError> = None;

        for attempt in 1..=max_attempts {
            let chat = ChatRequest {
                model: self.api.model.clone(),
                prompt: request.prompt.clone(),
                system: system.clone(),
                temperature: request.temperature,
                max_tokens: request.max_output_tokens.filter(|&tokens| tokens > 0),
            };

            let text = match self.provider.complete(chat).await {
                Ok(text) => text,
                Err(err) => {
                    warn!(
                        "Provider request failed: {} - attempt {}/{}",
                        err, attempt, max_attempts
                    );
                    last_failure = Some(err);
                    if attempt < max_attempts {
                        sleep(self.retry.backoff).await;
                    }
                    continue;
                }
            };

            if !request.expect_structured {
                let response = Value::String(text);
                self.record_success(&request, &response);
                return Ok(response);
            }

            let parsed: Value = match serde_json::from_str(&text) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(
                        "Structured parsing failed on attempt {}/{}: {}",
                        attempt, max_attempts, err
                    );
                    self.record_failure(&request.prompt, Value::String(text), "structured parsing failed");
                    if attempt == max_attempts {
                        return Err(DispatchError::Parse { attempts: max_attempts });
                    }
                    continue;
                }
            };

            if let Some(validator) = &request.validator {
                let verdict = validator(&parsed);
                if !verdict.is_success() {
                    self.record_failure(&request.prompt, parsed, verdict.message());
                    return Err(DispatchError::Validation(verdict.message().to_string()));
                }
            }

            self.record_success(&request, &parsed);
            return Ok(parsed);
        }

        Err(DispatchError::Transport {
            attempts: max_attempts,
            source: last_failure
                .unwrap_or_else(|| ProviderError::RequestFailed("no attempts were made".to_string())),
        })
    }

    /// Append a successful exchange to the request's partition, if logging is enabled
    ///
    /// Audit writes are best-effort: a storage failure must not discard a
    /// response already in hand.
    fn record_success(&self, request: &LlmRequest, response: &Value) {
        let Some(partition) = &request.log_title else {
            return;
        };
        if let Err(err) = self
            .log
            .append(&self.api.model, &request.prompt, response.clone(), partition, None)
        {
            error!("Failed to append response to partition '{}': {:#}", partition, err);
        }
    }

    /// Append a failed exchange to the error partition
    fn record_failure(&self, prompt: &str, response: Value, message: &str) {
        if let Err(err) = self.log.append(
            &self.api.model,
            prompt,
            response,
            ERROR_PARTITION,
            Some(message.to_string()),
        ) {
            error!("Failed to append failure to error partition: {:#}", err);
        }
    }
}
