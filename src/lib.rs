//! # docshift
//!
//! Convert documents and images between file formats, and summarise their
//! text with a language model, one bounded chunk at a time.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload ─▶ FormatRegistry ─▶ ConversionEngine ─▶ BlobValidator ─▶ artifact
//!                               │  (RasterBridge: pdfium pages, SVG)
//!                               └─ single file, or ZIP of page{N}.{ext}
//!
//! upload ─▶ TextExtractor ─▶ Paginator ─▶ SummaryAssembler ─▶ labeled text
//!            (txt, docx, pdf)  (≤800 / 1000-word windows)  (LLM per part)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docshift::{ConversionConfig, ConversionEngine, FormatId, SummaryAction, SummaryAssembler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let engine = ConversionEngine::with_pdfium(config.clone());
//!
//!     // docx → pdf
//!     let out = engine.convert_path("report.docx", FormatId::Pdf).await?;
//!     std::fs::write(out.artifact.file_name(), out.artifact.bytes())?;
//!
//!     // Summarise, one call per page part.
//!     let source = docshift::resolve_input("report.pdf", 120).await?;
//!     let pages = engine.extract(&source).await?;
//!     let summary = SummaryAssembler::from_config(config)?
//!         .summarize(pages, SummaryAction::PlainSummary)
//!         .await?;
//!     println!("{}", summary.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docshift` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docshift = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;
pub mod summarize;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{OutputArtifact, SourceArtifact};
pub use config::{CapabilityFailurePolicy, ConversionConfig, ConversionConfigBuilder};
pub use convert::{check_conversion, convert_sync, ConversionEngine};
pub use error::{DocShiftError, UnitError};
pub use format::{detect_format, is_supported, supported_targets, FormatId, Strategy};
pub use output::{
    ConversionOutput, ConversionStats, SummaryEntry, SummaryOutput, SummaryStats, TextPage,
};
pub use pipeline::extract::TextExtractor;
pub use pipeline::input::resolve_input;
pub use pipeline::llm::{Generated, GenerationError, ProviderGenerator, TextGenerator};
pub use pipeline::paginate::paginate;
pub use pipeline::pdfium::{LazyPdfium, PdfBackend, PdfiumBackend};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{extract_stream, TextPageStream};
pub use summarize::{SummaryAction, SummaryAssembler};
pub use validate::validate;
