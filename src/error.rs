//! Error types for the docshift library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocShiftError`] (**fatal**): the requested operation cannot produce a
//!   result at all (unsupported format pair, unreadable payload, every page
//!   failed, capability down under the abort policy). Returned as
//!   `Err(DocShiftError)` from every public entry point.
//!
//! * [`UnitError`] (**non-fatal**): one output unit (a rendered page, a
//!   summarised part) failed while the others are fine. Stored in
//!   [`crate::output::ConversionOutput::unit_errors`] and
//!   [`crate::output::SummaryOutput::failures`] and mirrored in the status log.

use crate::format::FormatId;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docshift library.
#[derive(Debug, Error)]
pub enum DocShiftError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The (source, target) pair is not in the compatibility matrix.
    #[error("Conversion from {from} to {to} is not supported.\nRun `docshift formats` to list supported pairs.")]
    UnsupportedConversion { from: FormatId, to: FormatId },

    /// The uploaded file's extension is not in the extension table.
    #[error("Unsupported file type: '{file_name}'\nSupported extensions: pdf, docx, txt, png, jpg, jpeg, webp, svg, heic, zip")]
    UnsupportedUpload { file_name: String },

    /// Text extraction was requested for a format with no text model.
    #[error("Cannot extract text from {format} files")]
    UnsupportedForExtraction { format: FormatId },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The payload cannot be decoded as its declared format.
    #[error("Cannot read {format} payload: {detail}")]
    SourceUnreadable { format: FormatId, detail: String },

    // ── Transcoding errors ────────────────────────────────────────────────
    /// The only output unit failed while rendering or encoding.
    #[error("Transcoding failed for unit {unit}: {detail}")]
    TranscodeFailure { unit: usize, detail: String },

    /// Every unit of a multi-unit conversion failed.
    #[error("All {total} pages failed to render; no output produced.\nFirst error: {first_error}")]
    NoValidOutput { total: usize, first_error: String },

    /// The produced artifact did not pass validation and was discarded.
    #[error("Produced {format} artifact is invalid: {reason}")]
    OutputInvalid { format: FormatId, reason: String },

    // ── Text-generation errors ────────────────────────────────────────────
    /// The text-generation capability failed and the batch was aborted.
    #[error("Text generation is unavailable; no result was produced.\nFirst failure: {detail}")]
    CapabilityUnavailable { detail: String },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single output unit.
///
/// Page numbers are 1-indexed, matching the status log and the bundle entry
/// names.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// The page could not be rendered to a pixel buffer.
    #[error("Page {page}: rendering failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The page rendered to a buffer with no visible content.
    #[error("Page {page}: rendered buffer has no visible content ({width}x{height})")]
    Degenerate { page: usize, width: u32, height: u32 },

    /// The pixel buffer could not be encoded to the target format.
    #[error("Page {page}: encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },

    /// The encoded page did not pass validation.
    #[error("Page {page}: encoded output is invalid")]
    Invalid { page: usize },

    /// The text-generation call failed after retries.
    #[error("Page {page} part {part}: generation failed after {retries} retries: {detail}")]
    GenerationFailed {
        page: usize,
        part: usize,
        retries: u8,
        detail: String,
    },

    /// The text-generation call timed out on every attempt.
    #[error("Page {page} part {part}: generation timed out after {secs}s")]
    Timeout { page: usize, part: usize, secs: u64 },

    /// The capability answered every attempt with an error status or an
    /// unusable body. The part carries the placeholder under every policy.
    #[error("Page {page} part {part}: capability rejected the request: {detail}")]
    Rejected {
        page: usize,
        part: usize,
        detail: String,
    },
}

impl UnitError {
    /// The 1-indexed page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            UnitError::RenderFailed { page, .. }
            | UnitError::Degenerate { page, .. }
            | UnitError::EncodeFailed { page, .. }
            | UnitError::Invalid { page }
            | UnitError::GenerationFailed { page, .. }
            | UnitError::Timeout { page, .. }
            | UnitError::Rejected { page, .. } => *page,
        }
    }

    /// True when the unit fell back to a placeholder instead of failing.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, UnitError::Rejected { .. })
    }
}
