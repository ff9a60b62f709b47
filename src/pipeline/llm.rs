//! Text generation: one prompt in, one completion out, with retry.
//!
//! The capability is reached through the [`TextGenerator`] trait so the
//! summary assembler never sees provider details. [`ProviderGenerator`]
//! adapts any `edgequake_llm` provider; tests plug in a scripted generator.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! concurrent load. Exponential backoff (`retry_backoff_ms * 2^(attempt-1)`)
//! spreads retries out: with 500 ms base and 3 retries the wait sequence is
//! 500 ms → 1 s → 2 s. Each attempt is also bounded by `api_timeout_secs`.
//!
//! ## Error Kinds
//!
//! [`GenerationError::Rejected`] means the service answered, but with an
//! error status or a body we cannot use. Once retries run out the part gets
//! the placeholder, whatever the failure policy. [`GenerationError::Transport`]
//! means no answer arrived at all; only that kind (and timeouts) can abort a
//! batch.

use crate::config::ConversionConfig;
use crate::error::UnitError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// One completion and its token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Why a single generation attempt produced no text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The service answered with an error status or a malformed body.
    #[error("{0}")]
    Rejected(String),

    /// The request never got an answer (connection, TLS, DNS, I/O).
    #[error("{0}")]
    Transport(String),
}

// An HTTP status in the 4xx/5xx range quoted in a provider error message.
static RE_ERROR_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:status(?:\s+code)?|http)\W{0,3}[45]\d{2}\b").unwrap());

impl GenerationError {
    /// Classify a provider error. API errors, and any error quoting a 4xx/5xx
    /// status, mean the service answered.
    pub fn from_llm(err: LlmError) -> Self {
        let message = err.to_string();
        if matches!(err, LlmError::ApiError { .. }) || RE_ERROR_STATUS.is_match(&message) {
            GenerationError::Rejected(message)
        } else {
            GenerationError::Transport(message)
        }
    }
}

/// The external text-generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send `prompt` and return the completion.
    async fn generate(&self, prompt: &str) -> Result<Generated, GenerationError>;
}

/// [`TextGenerator`] over an `edgequake_llm` chat provider.
pub struct ProviderGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    system_prompt: Option<String>,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            system_prompt: config.system_prompt.clone(),
        }
    }
}

#[async_trait]
impl TextGenerator for ProviderGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generated, GenerationError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage::system(system.as_str()));
        }
        messages.push(ChatMessage::user(prompt));

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(GenerationError::from_llm)?;

        Ok(Generated {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Build `CompletionOptions` from the conversion config.
fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Call `generator` for one part, retrying on error or timeout.
///
/// Returns the completion and the number of retries it took. After the last
/// attempt fails the error is [`UnitError::Timeout`] when every attempt
/// timed out, [`UnitError::Rejected`] when the last answered attempt was
/// rejected by the service, and [`UnitError::GenerationFailed`] otherwise.
pub async fn generate_with_retry(
    generator: &dyn TextGenerator,
    prompt: &str,
    page: usize,
    part: usize,
    config: &ConversionConfig,
) -> Result<(Generated, u8), UnitError> {
    let per_call = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<GenerationError> = None;
    let mut all_timed_out = true;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {} part {}: retry {}/{} after {}ms",
                page, part, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(per_call, generator.generate(prompt)).await {
            Ok(Ok(generated)) => {
                debug!(
                    "Page {} part {}: {} input tokens, {} output tokens",
                    page, part, generated.input_tokens, generated.output_tokens
                );
                return Ok((generated, attempt as u8));
            }
            Ok(Err(e)) => {
                warn!("Page {} part {}: attempt {} failed: {}", page, part, attempt + 1, e);
                all_timed_out = false;
                last_err = Some(e);
            }
            Err(_) => {
                warn!(
                    "Page {} part {}: attempt {} timed out after {}s",
                    page,
                    part,
                    attempt + 1,
                    config.api_timeout_secs
                );
            }
        }
    }

    if all_timed_out {
        return Err(UnitError::Timeout {
            page,
            part,
            secs: config.api_timeout_secs,
        });
    }
    match last_err {
        Some(GenerationError::Rejected(detail)) => Err(UnitError::Rejected { page, part, detail }),
        Some(GenerationError::Transport(detail)) => Err(UnitError::GenerationFailed {
            page,
            part,
            retries: config.max_retries as u8,
            detail,
        }),
        None => Err(UnitError::GenerationFailed {
            page,
            part,
            retries: config.max_retries as u8,
            detail: "Unknown error".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then echoes the prompt length.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for Flaky {
        async fn generate(&self, prompt: &str) -> Result<Generated, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(GenerationError::Transport(format!(
                    "connection reset on call {}",
                    n + 1
                )));
            }
            Ok(Generated {
                text: format!("{} chars", prompt.len()),
                input_tokens: prompt.len(),
                output_tokens: 2,
            })
        }
    }

    struct Stalled;

    #[async_trait]
    impl TextGenerator for Stalled {
        async fn generate(&self, _prompt: &str) -> Result<Generated, GenerationError> {
            sleep(Duration::from_secs(3600)).await;
            Ok(Generated::default())
        }
    }

    fn fast_config(retries: u32) -> ConversionConfig {
        ConversionConfig::builder()
            .max_retries(retries)
            .retry_backoff_ms(1)
            .api_timeout_secs(1)
            .build()
            .unwrap()
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&ConversionConfig::default());
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(1024));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let gen = Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
        };
        let (out, retries) = generate_with_retry(&gen, "abcd", 1, 1, &fast_config(3))
            .await
            .unwrap();
        assert_eq!(out.text, "4 chars");
        assert_eq!(retries, 2);
        assert_eq!(gen.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let gen = Flaky {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        };
        let err = generate_with_retry(&gen, "x", 2, 3, &fast_config(1))
            .await
            .unwrap_err();
        assert_eq!(gen.calls.load(Ordering::SeqCst), 2);
        match err {
            UnitError::GenerationFailed { page, part, retries, detail } => {
                assert_eq!((page, part, retries), (2, 3, 1));
                assert!(detail.contains("call 2"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    struct ServerError;

    #[async_trait]
    impl TextGenerator for ServerError {
        async fn generate(&self, _prompt: &str) -> Result<Generated, GenerationError> {
            Err(GenerationError::Rejected("HTTP 500 Internal Server Error".into()))
        }
    }

    #[tokio::test]
    async fn rejected_answers_become_placeholder_errors() {
        let err = generate_with_retry(&ServerError, "x", 4, 1, &fast_config(1))
            .await
            .unwrap_err();
        assert!(err.is_placeholder());
        assert!(matches!(err, UnitError::Rejected { page: 4, part: 1, .. }));
    }

    #[test]
    fn status_codes_in_messages_mark_rejections() {
        for msg in ["HTTP 500 from upstream", "status: 429 Too Many Requests", "Status code 503"] {
            assert!(RE_ERROR_STATUS.is_match(msg), "{msg}");
        }
        for msg in ["connection refused", "dns error: no record", "took 5000 ms"] {
            assert!(!RE_ERROR_STATUS.is_match(msg), "{msg}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_calls_time_out() {
        let err = generate_with_retry(&Stalled, "x", 1, 1, &fast_config(0))
            .await
            .unwrap_err();
        assert!(matches!(err, UnitError::Timeout { page: 1, part: 1, secs: 1 }));
    }
}
