/*!
 * Duration-constrained subtitle trimming.
 *
 * When a subtitle line's estimated reading duration exceeds the time window
 * allotted on the timeline, the trimmer asks the model to shorten it. The
 * trimmer never fails: any error on the LLM path degrades to a deterministic
 * punctuation-stripping fallback so the pipeline keeps moving even when the
 * remote service is fully unavailable.
 */

use std::sync::Arc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use log::{info, warn};

use crate::llm::prompts::subtitle_trim_prompt;
use crate::llm::{LlmRequest, RequestOrchestrator, ValidationResult};

/// Partition recording shortening exchanges
const TRIM_LOG_TITLE: &str = "subtitle_trim";

/// Sentence-ending and clause punctuation removed by the fallback, covering
/// ASCII and the corresponding full-width characters
static STRIP_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new("[,.!?;:，。！？；：]").expect("strip pattern is valid"));

/// Estimates the spoken/reading duration of a piece of text
pub trait DurationEstimator: Send + Sync {
    /// Estimated duration of `text` in seconds
    fn estimate(&self, text: &str) -> f64;
}

/// Estimator assuming a fixed reading rate in characters per second
#[derive(Debug, Clone)]
pub struct CharacterRateEstimator {
    chars_per_second: f64,
}

impl CharacterRateEstimator {
    /// Create an estimator reading at the given rate
    pub fn new(chars_per_second: f64) -> Self {
        Self { chars_per_second }
    }
}

impl Default for CharacterRateEstimator {
    fn default() -> Self {
        // Comfortable subtitle reading rate
        Self::new(15.0)
    }
}

impl DurationEstimator for CharacterRateEstimator {
    fn estimate(&self, text: &str) -> f64 {
        text.chars().count() as f64 / self.chars_per_second
    }
}

/// Shortens subtitle lines that exceed their time window
pub struct SubtitleTrimmer {
    orchestrator: Arc<RequestOrchestrator>,
    estimator: Arc<dyn DurationEstimator>,
    max_speed_factor: f64,
}

impl SubtitleTrimmer {
    /// Create a trimmer using the given estimator and maximum speed factor
    ///
    /// The estimate is divided by `max_speed_factor` before comparison, so
    /// the factor models how much faster than the estimator's base rate a
    /// viewer can still comfortably read. Non-positive factors fall back to
    /// 1.0.
    pub fn new(
        orchestrator: Arc<RequestOrchestrator>,
        estimator: Arc<dyn DurationEstimator>,
        max_speed_factor: f64,
    ) -> Self {
        let max_speed_factor = if max_speed_factor > 0.0 {
            max_speed_factor
        } else {
            warn!("Non-positive speed factor {}, using 1.0", max_speed_factor);
            1.0
        };
        Self {
            orchestrator,
            estimator,
            max_speed_factor,
        }
    }

    /// Shorten `text` if it cannot be read within `available_duration` seconds
    ///
    /// Returns the input unchanged when it fits. Otherwise the shortened
    /// subtitle from the model, or the punctuation-stripped input when the
    /// LLM path fails for any reason.
    pub async fn trim(&self, text: &str, available_duration: f64) -> String {
        let estimated = self.estimator.estimate(text) / self.max_speed_factor;
        info!(
            "Estimated reading duration {:.2}s for '{}' (available {:.2}s)",
            estimated, text, available_duration
        );

        if estimated <= available_duration {
            return text.to_string();
        }

        info!(
            "Estimated reading duration {:.2}s exceeds given duration {:.2}s, shortening",
            estimated, available_duration
        );

        let request = LlmRequest::new(subtitle_trim_prompt(text, available_duration))
            .log_title(TRIM_LOG_TITLE)
            .origin(TRIM_LOG_TITLE)
            .validator(|response: &Value| {
                if response.get("result").is_some() {
                    ValidationResult::success()
                } else {
                    ValidationResult::error("No result in response")
                }
            });

        match self.orchestrator.dispatch(request).await {
            Ok(response) => match response.get("result").and_then(Value::as_str) {
                Some(shortened) => {
                    info!("Subtitle before shortening: {}", text);
                    info!("Subtitle after shortening: {}", shortened);
                    shortened.to_string()
                }
                None => {
                    warn!("Shortening response carried a non-text result, stripping punctuation instead");
                    strip_punctuation(text)
                }
            },
            Err(err) => {
                warn!("Shortening request failed ({}), stripping punctuation instead", err);
                strip_punctuation(text)
            }
        }
    }
}

/// Replace the strip-set punctuation with spaces and trim the ends
pub fn strip_punctuation(text: &str) -> String {
    STRIP_PUNCTUATION.replace_all(text, " ").trim().to_string()
}
