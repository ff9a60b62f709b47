//! Summary assembly: one generation call per [`TextPage`], labeled and
//! joined in document order.
//!
//! ## Why one call per part?
//!
//! The capability accepts a bounded amount of text. The paginator already
//! cut every page to at most 1000 words, so each call carries exactly one
//! part and nothing else; no call ever sees a neighbouring page.
//!
//! ## Ordering
//!
//! Calls run concurrently (bounded by `concurrency`) and finish in any
//! order. Results are sorted by (page, part) before assembly, never by
//! completion order.

use crate::config::{CapabilityFailurePolicy, ConversionConfig};
use crate::error::{DocShiftError, UnitError};
use crate::output::{SummaryEntry, SummaryOutput, SummaryStats, TextPage};
use crate::pipeline::llm::{generate_with_retry, ProviderGenerator, TextGenerator};
use crate::pipeline::postprocess::clean_generated_text;
use crate::prompts::{
    build_prompt, KEYWORDS_INSTRUCTION, KEYWORDS_PLACEHOLDER, SUMMARY_INSTRUCTION,
    SUMMARY_PLACEHOLDER,
};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// What to ask of the capability for each part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryAction {
    #[default]
    PlainSummary,
    KeywordExtraction,
}

impl SummaryAction {
    pub fn prompt(self, text: &str) -> String {
        let instruction = match self {
            SummaryAction::PlainSummary => SUMMARY_INSTRUCTION,
            SummaryAction::KeywordExtraction => KEYWORDS_INSTRUCTION,
        };
        build_prompt(instruction, text)
    }

    /// Body used when no usable response is available.
    pub fn placeholder(self) -> &'static str {
        match self {
            SummaryAction::PlainSummary => SUMMARY_PLACEHOLDER,
            SummaryAction::KeywordExtraction => KEYWORDS_PLACEHOLDER,
        }
    }
}

/// Drives the text-generation capability over a sequence of parts.
pub struct SummaryAssembler {
    generator: Arc<dyn TextGenerator>,
    config: ConversionConfig,
}

impl SummaryAssembler {
    pub fn new(generator: Arc<dyn TextGenerator>, config: ConversionConfig) -> Self {
        Self { generator, config }
    }

    /// Build an assembler over the LLM provider the configuration resolves to.
    pub fn from_config(config: ConversionConfig) -> Result<Self, DocShiftError> {
        let provider = resolve_provider(&config)?;
        let generator = ProviderGenerator::new(provider, &config);
        Ok(Self::new(Arc::new(generator), config))
    }

    /// Summarise every part and assemble the labeled blocks.
    ///
    /// # Errors
    /// [`DocShiftError::CapabilityUnavailable`] when a call gets no answer
    /// (transport failure or timeout) under [`CapabilityFailurePolicy::Abort`].
    /// A call the service answers with an error status always falls back to
    /// the placeholder. Under [`CapabilityFailurePolicy::Placeholder`] this
    /// never fails. Every part that fell back is listed in
    /// [`SummaryOutput::failures`].
    pub async fn summarize(
        &self,
        pages: Vec<TextPage>,
        action: SummaryAction,
    ) -> Result<SummaryOutput, DocShiftError> {
        let total_start = Instant::now();
        let total = pages.len();
        info!("Summarising {} parts ({:?})", total, action);

        if let Some(cb) = &self.config.progress_callback {
            cb.on_conversion_start(total);
        }

        let mut outcomes: Vec<PartOutcome> = stream::iter(
            pages
                .into_iter()
                .enumerate()
                .map(|(i, page)| self.run_part(i + 1, total, page, action)),
        )
        .buffer_unordered(self.config.concurrency)
        .collect()
        .await;

        outcomes.sort_by_key(|o| (o.page.page_number, o.page.part_number));

        let generated_count = outcomes
            .iter()
            .filter(|o| matches!(o.result, Ok(Some(_))))
            .count();
        if let Some(cb) = &self.config.progress_callback {
            cb.on_conversion_complete(total, generated_count);
        }

        if self.config.failure_policy == CapabilityFailurePolicy::Abort {
            if let Some(err) = outcomes
                .iter()
                .filter_map(|o| o.result.as_ref().err())
                .find(|e| !e.is_placeholder())
            {
                return Err(DocShiftError::CapabilityUnavailable {
                    detail: err.to_string(),
                });
            }
        }

        let mut entries = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        let mut stats = SummaryStats {
            parts: outcomes.len(),
            ..Default::default()
        };

        for outcome in outcomes {
            let page = outcome.page;
            let (body, generated, input_tokens, output_tokens, retries) = match outcome.result {
                Ok(Some(part)) => (part.body, true, part.input_tokens, part.output_tokens, part.retries),
                Ok(None) => (action.placeholder().to_string(), false, 0, 0, 0),
                Err(e) => {
                    failures.push(e);
                    (action.placeholder().to_string(), false, 0, 0, 0)
                }
            };

            if generated {
                stats.generated += 1;
            } else {
                stats.placeholders += 1;
            }
            stats.total_input_tokens += input_tokens as u64;
            stats.total_output_tokens += output_tokens as u64;

            entries.push(SummaryEntry {
                page_number: page.page_number,
                part_number: page.part_number,
                label: page.label(),
                body,
                generated,
                input_tokens,
                output_tokens,
                duration_ms: outcome.duration_ms,
                retries,
            });
        }

        let text = entries
            .iter()
            .map(SummaryEntry::render)
            .collect::<Vec<_>>()
            .join("\n\n");
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Summary complete: {}/{} parts generated, {} placeholders, {}ms",
            stats.generated, stats.parts, stats.placeholders, stats.total_duration_ms
        );

        Ok(SummaryOutput {
            text,
            entries,
            failures,
            stats,
        })
    }

    async fn run_part(
        &self,
        unit: usize,
        total: usize,
        page: TextPage,
        action: SummaryAction,
    ) -> PartOutcome {
        let start = Instant::now();
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_unit_start(unit, total);
        }

        if page.word_count() == 0 {
            debug!("{}: blank, using placeholder", page.label());
            if let Some(cb) = cb {
                cb.on_unit_complete(unit, total, 0);
            }
            return PartOutcome {
                page,
                result: Ok(None),
                duration_ms: 0,
            };
        }

        let prompt = action.prompt(&page.text);
        let result = generate_with_retry(
            self.generator.as_ref(),
            &prompt,
            page.page_number,
            page.part_number,
            &self.config,
        )
        .await
        .map(|(generated, retries)| {
            let body = clean_generated_text(&generated.text);
            if body.is_empty() {
                warn!("{}: empty response, using placeholder", page.label());
                return None;
            }
            Some(GeneratedPart {
                body,
                input_tokens: generated.input_tokens,
                output_tokens: generated.output_tokens,
                retries,
            })
        });

        if let Some(cb) = cb {
            match &result {
                Ok(Some(part)) => cb.on_unit_complete(unit, total, part.body.len()),
                Ok(None) => cb.on_unit_complete(unit, total, 0),
                Err(e) => cb.on_unit_error(unit, total, &e.to_string()),
            }
        }

        PartOutcome {
            page,
            result,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

struct GeneratedPart {
    body: String,
    input_tokens: usize,
    output_tokens: usize,
    retries: u8,
}

/// `Ok(None)` means the placeholder stands in without a failure.
struct PartOutcome {
    page: TextPage,
    result: Result<Option<GeneratedPart>, UnitError>,
    duration_ms: u64,
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DocShiftError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocShiftError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured only when both are set.
/// 4. **OpenAI** when `OPENAI_API_KEY` is present.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, DocShiftError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocShiftError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
