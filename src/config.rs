//! Configuration for conversion, extraction and summarisation.
//!
//! Every knob lives in [`ConversionConfig`], built through its
//! [`ConversionConfigBuilder`]. One struct is shared by the conversion engine
//! and the summary assembler so a single CLI invocation maps to a single
//! value that can be logged and cloned across tasks.

use crate::error::DocShiftError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for a docshift run.
///
/// # Example
/// ```rust
/// use docshift::{CapabilityFailurePolicy, ConversionConfig};
///
/// let config = ConversionConfig::builder()
///     .concurrency(8)
///     .max_retries(2)
///     .failure_policy(CapabilityFailurePolicy::Placeholder)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 8);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Cap on either edge of a rendered PDF page, in pixels. Default: 4096.
    ///
    /// Pages are rendered at 2× their size in points; a poster-sized page
    /// would otherwise allocate hundreds of megabytes of RGBA.
    pub max_rendered_pixels: u32,

    /// Concurrent text-generation calls. Default: 4.
    pub concurrency: usize,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the
    /// environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens generated per part. Default: 1024.
    pub max_tokens: usize,

    /// Retries per part after a failed call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout for text generation, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// User password for encrypted PDFs.
    pub password: Option<String>,

    /// Optional system message sent ahead of every generation prompt.
    pub system_prompt: Option<String>,

    /// What happens when a generation call fails for good.
    /// Default: [`CapabilityFailurePolicy::Abort`].
    pub failure_policy: CapabilityFailurePolicy,

    /// Per-unit progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_rendered_pixels: 4096,
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 1024,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            password: None,
            system_prompt: None,
            failure_policy: CapabilityFailurePolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("failure_policy", &self.failure_policy)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConversionConfigBuilder")
            .field(&self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(64);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(10);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn failure_policy(mut self, policy: CapabilityFailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, DocShiftError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(DocShiftError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(DocShiftError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(DocShiftError::InvalidConfig(
                "Download timeout must be at least 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(DocShiftError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What the summary assembler does when a part's generation call gets no
/// answer after every retry. Answers carrying an error status always become
/// the placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CapabilityFailurePolicy {
    /// The whole batch fails with
    /// [`DocShiftError::CapabilityUnavailable`]. (default)
    #[default]
    Abort,
    /// The failed part gets the action's placeholder body and is listed in
    /// [`crate::output::SummaryOutput::failures`].
    Placeholder,
}
