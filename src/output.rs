//! Result records returned by conversion, extraction and summarisation.

use crate::artifact::OutputArtifact;
use crate::error::UnitError;
use serde::{Deserialize, Serialize};

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// The validated artifact: a single file, or a ZIP bundle of page files.
    pub artifact: OutputArtifact,
    /// One human-readable line per unit outcome, in page order.
    pub status: Vec<String>,
    /// Units that were skipped. Empty when every unit was produced.
    pub unit_errors: Vec<UnitError>,
    pub stats: ConversionStats,
}

/// Counters for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Logical output units the strategy attempted (pages for PDF sources).
    pub total_units: usize,
    pub produced_units: usize,
    pub failed_units: usize,
    /// Byte length of the delivered artifact.
    pub output_bytes: usize,
    pub total_duration_ms: u64,
}

/// A window of extracted text aligned to a logical page.
///
/// `part_number` is 1 when the page was not split, and `split` records
/// whether the page was cut into windows at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPage {
    pub page_number: usize,
    pub part_number: usize,
    pub split: bool,
    pub text: String,
}

impl TextPage {
    /// An unsplit page (part 1).
    pub fn whole(page_number: usize, text: impl Into<String>) -> Self {
        Self {
            page_number,
            part_number: 1,
            split: false,
            text: text.into(),
        }
    }

    /// One window of a split page.
    pub fn window(page_number: usize, part_number: usize, text: impl Into<String>) -> Self {
        Self {
            page_number,
            part_number,
            split: true,
            text: text.into(),
        }
    }

    /// `"Page {p}"` for unsplit pages, `"Page {p} Part {k}"` for every
    /// window of a split page (including the first).
    pub fn label(&self) -> String {
        if self.split {
            format!("Page {} Part {}", self.page_number, self.part_number)
        } else {
            format!("Page {}", self.page_number)
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// One labeled block of an assembled summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub page_number: usize,
    pub part_number: usize,
    pub label: String,
    pub body: String,
    /// False when `body` is the placeholder.
    pub generated: bool,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Retry attempts spent on this part (0 = first call succeeded).
    pub retries: u8,
}

impl SummaryEntry {
    /// `"{label}:\n{body}"`.
    pub fn render(&self) -> String {
        format!("{}:\n{}", self.label, self.body)
    }
}

/// Result of summarising or extracting keywords from a document.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutput {
    /// All blocks joined with a blank line, in page/part order.
    pub text: String,
    pub entries: Vec<SummaryEntry>,
    /// Parts that fell back to the placeholder under the placeholder policy.
    pub failures: Vec<UnitError>,
    pub stats: SummaryStats,
}

/// Counters for one summarisation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    pub parts: usize,
    pub generated: usize,
    pub placeholders: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}
