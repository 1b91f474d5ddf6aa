/*!
 * Tests for the request orchestrator dispatch loop
 */

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use sublingo::app_config::ApiConfig;
use sublingo::errors::DispatchError;
use sublingo::llm::{
    LlmRequest, RequestOrchestrator, ResponseLog, RetryPolicy, UsageMeter, ValidationResult,
    ERROR_PARTITION,
};
use sublingo::providers::mock::{MockOutcome, MockProvider};

use crate::common::{create_temp_dir, test_api_config, test_orchestrator, test_orchestrator_with_retry};

#[tokio::test]
async fn test_dispatch_with_structured_reply_should_return_parsed_value() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::replying(r#"{"split": ["a", "b"]}"#));
    let (orchestrator, log, _meter) = test_orchestrator(dir.path(), provider.clone());

    let request = LlmRequest::new("split this").log_title("sentence_split");
    assert_eq!(request.prompt(), "split this");
    let result = orchestrator.dispatch(request).await.unwrap();

    assert_eq!(result, json!({"split": ["a", "b"]}));
    assert_eq!(provider.call_count(), 1);
    assert_eq!(log.entries("sentence_split").len(), 1);
}

#[tokio::test]
async fn test_dispatch_with_cache_hit_should_issue_zero_remote_calls() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::replying(r#"{"fresh": true}"#));
    let (orchestrator, log, _meter) = test_orchestrator(dir.path(), provider.clone());

    let cached = json!({"cached": true});
    log.append("test-model", "the prompt", cached.clone(), "sentence_split", None)
        .unwrap();

    let result = orchestrator
        .dispatch(LlmRequest::new("the prompt").log_title("sentence_split"))
        .await
        .unwrap();

    assert_eq!(result, cached);
    assert_eq!(provider.call_count(), 0);
    // The cached entry is already logged; a hit must not append another
    assert_eq!(log.entries("sentence_split").len(), 1);
}

#[tokio::test]
async fn test_dispatch_with_cache_hit_should_still_meter_the_call() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::replying(r#"{}"#));
    let (orchestrator, log, meter) = test_orchestrator(dir.path(), provider);

    log.append("test-model", "the prompt", json!({}), "default", None).unwrap();
    orchestrator
        .dispatch(LlmRequest::new("the prompt").origin("sentence_split"))
        .await
        .unwrap();

    let snapshot = meter.snapshot();
    assert_eq!(snapshot.by_function.get("dispatch"), Some(&1));
    assert_eq!(snapshot.by_module.get("sentence_split"), Some(&1));
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_with_two_transport_failures_should_succeed_after_two_backoffs() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::scripted(vec![
        MockOutcome::fail("connection reset"),
        MockOutcome::fail("connection reset"),
        MockOutcome::reply(r#"{"ok": true}"#),
    ]));
    let (orchestrator, log, _meter) = test_orchestrator_with_retry(
        dir.path(),
        provider.clone(),
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        },
    );

    let started = tokio::time::Instant::now();
    let result = orchestrator
        .dispatch(LlmRequest::new("prompt").log_title("default"))
        .await
        .unwrap();

    assert_eq!(result, json!({"ok": true}));
    assert_eq!(provider.call_count(), 3);
    // Exactly two backoff sleeps of 2s each, observed under paused time
    assert_eq!(started.elapsed(), Duration::from_secs(4));
    // Exactly one appended exchange for the eventual success
    assert_eq!(log.entries("default").len(), 1);
}

#[tokio::test]
async fn test_dispatch_with_persistent_transport_failure_should_return_transport_error() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::failing("host unreachable"));
    let (orchestrator, log, _meter) = test_orchestrator(dir.path(), provider.clone());

    let err = orchestrator
        .dispatch(LlmRequest::new("prompt"))
        .await
        .unwrap_err();

    match err {
        DispatchError::Transport { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(provider.call_count(), 3);
    // Transport failures are not audited in the error partition
    assert!(log.entries(ERROR_PARTITION).is_empty());
}

#[tokio::test]
async fn test_dispatch_with_parse_failures_should_retry_without_backoff_then_succeed() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::scripted(vec![
        MockOutcome::reply("this is not json"),
        MockOutcome::reply("still not json"),
        MockOutcome::reply(r#"{"fixed": true}"#),
    ]));
    let (orchestrator, log, _meter) = test_orchestrator(dir.path(), provider.clone());

    let result = orchestrator
        .dispatch(LlmRequest::new("prompt").log_title("default"))
        .await
        .unwrap();

    assert_eq!(result, json!({"fixed": true}));
    assert_eq!(provider.call_count(), 3);

    let errors = log.entries(ERROR_PARTITION);
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].message.as_deref(), Some("structured parsing failed"));
    assert_eq!(errors[0].response, Value::String("this is not json".to_string()));
}

#[tokio::test]
async fn test_dispatch_with_exhausted_parse_failures_should_return_parse_error() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::replying("never json"));
    let (orchestrator, log, _meter) = test_orchestrator(dir.path(), provider.clone());

    let err = orchestrator
        .dispatch(LlmRequest::new("prompt"))
        .await
        .unwrap_err();

    match &err {
        DispatchError::Parse { attempts } => assert_eq!(*attempts, 3),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(err.is_audited());
    assert_eq!(provider.call_count(), 3);
    assert_eq!(log.entries(ERROR_PARTITION).len(), 3);
}

#[tokio::test]
async fn test_dispatch_with_validator_rejection_should_fail_immediately() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::replying(r#"{"unexpected": "shape"}"#));
    let (orchestrator, log, _meter) = test_orchestrator(dir.path(), provider.clone());

    let request = LlmRequest::new("prompt")
        .log_title("sentence_split")
        .validator(|response: &Value| {
            if response.get("split").is_some() {
                ValidationResult::success()
            } else {
                ValidationResult::error("No split in response")
            }
        });

    let err = orchestrator.dispatch(request).await.unwrap_err();

    match err {
        DispatchError::Validation(message) => assert_eq!(message, "No split in response"),
        other => panic!("expected validation error, got {other:?}"),
    }
    // Semantic rejection is attempt-ending: no retries
    assert_eq!(provider.call_count(), 1);

    let errors = log.entries(ERROR_PARTITION);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message.as_deref(), Some("No split in response"));
    assert_eq!(errors[0].model, "test-model");
    // The rejected exchange is not written to the request's own partition
    assert!(log.entries("sentence_split").is_empty());
}

#[tokio::test]
async fn test_dispatch_with_plain_text_should_skip_parsing_and_validation() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::replying("a plain prose answer"));
    let (orchestrator, log, _meter) = test_orchestrator(dir.path(), provider.clone());

    let result = orchestrator
        .dispatch(
            LlmRequest::new("prompt")
                .expect_structured(false)
                .log_title("notes"),
        )
        .await
        .unwrap();

    assert_eq!(result, Value::String("a plain prose answer".to_string()));
    assert_eq!(log.entries("notes").len(), 1);
    assert!(log.entries(ERROR_PARTITION).is_empty());

    // No JSON instruction is added for free-text requests
    let sent = provider.last_request().unwrap();
    assert_eq!(sent.system, None);
}

#[tokio::test]
async fn test_dispatch_with_structured_request_should_append_json_instruction() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::replying(r#"{}"#));
    let (orchestrator, _log, _meter) = test_orchestrator(dir.path(), provider.clone());

    orchestrator
        .dispatch(LlmRequest::new("prompt").system_context("You split sentences."))
        .await
        .unwrap();

    let sent = provider.last_request().unwrap();
    let system = sent.system.unwrap();
    // Additive: caller context first, format instruction appended
    assert!(system.starts_with("You split sentences."));
    assert!(system.contains("valid JSON format"));
}

#[tokio::test]
async fn test_dispatch_with_zero_max_tokens_should_not_forward_the_bound() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::replying(r#"{}"#));
    let (orchestrator, _log, _meter) = test_orchestrator(dir.path(), provider.clone());

    orchestrator
        .dispatch(LlmRequest::new("prompt").max_output_tokens(0))
        .await
        .unwrap();
    assert_eq!(provider.last_request().unwrap().max_tokens, None);

    orchestrator
        .dispatch(LlmRequest::new("another prompt").max_output_tokens(512))
        .await
        .unwrap();
    assert_eq!(provider.last_request().unwrap().max_tokens, Some(512));
}

#[tokio::test]
async fn test_dispatch_without_logging_should_touch_no_partition() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::replying(r#"{"ok": true}"#));
    let log_dir = dir.path().join("llm_log");
    let log = Arc::new(ResponseLog::new(&log_dir));
    let meter = Arc::new(UsageMeter::new(
        dir.path().join("usage.json"),
        Duration::from_secs(300),
    ));
    let orchestrator =
        RequestOrchestrator::with_provider(test_api_config(), provider.clone(), log, meter);

    let result = orchestrator
        .dispatch(LlmRequest::new("prompt").without_logging())
        .await
        .unwrap();

    assert_eq!(result, json!({"ok": true}));
    assert_eq!(provider.call_count(), 1);
    // The sentinel disables both lookup and append: no files at all
    assert!(!log_dir.exists());
}

#[tokio::test]
async fn test_dispatch_with_missing_credentials_should_return_configuration_error() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::replying(r#"{}"#));
    let log = Arc::new(ResponseLog::new(dir.path().join("llm_log")));
    let meter = Arc::new(UsageMeter::new(
        dir.path().join("usage.json"),
        Duration::from_secs(300),
    ));
    let api = ApiConfig {
        key: String::new(),
        ..test_api_config()
    };
    let orchestrator = RequestOrchestrator::with_provider(api, provider.clone(), log, meter.clone());

    let err = orchestrator.dispatch(LlmRequest::new("prompt")).await.unwrap_err();

    assert!(matches!(err, DispatchError::Configuration(_)));
    assert_eq!(provider.call_count(), 0);
    // Configuration failures are still metered
    assert_eq!(meter.snapshot().total_calls, 1);
}

#[tokio::test]
async fn test_dispatch_with_missing_model_should_return_configuration_error() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::replying(r#"{}"#));
    let log = Arc::new(ResponseLog::new(dir.path().join("llm_log")));
    let meter = Arc::new(UsageMeter::new(
        dir.path().join("usage.json"),
        Duration::from_secs(300),
    ));
    let api = ApiConfig {
        model: "  ".to_string(),
        ..test_api_config()
    };
    let orchestrator = RequestOrchestrator::with_provider(api, provider.clone(), log, meter);

    let err = orchestrator.dispatch(LlmRequest::new("prompt")).await.unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(_)));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_dispatch_twice_with_same_prompt_should_hit_cache_second_time() {
    let dir = create_temp_dir().unwrap();
    let provider = Arc::new(MockProvider::replying(r#"{"n": 1}"#));
    let (orchestrator, log, _meter) = test_orchestrator(dir.path(), provider.clone());

    let first = orchestrator
        .dispatch(LlmRequest::new("same prompt").log_title("default"))
        .await
        .unwrap();
    let second = orchestrator
        .dispatch(LlmRequest::new("same prompt").log_title("default"))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(log.entries("default").len(), 1);
}
