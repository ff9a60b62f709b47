//! Format conversion entry points.
//!
//! ## Why one blocking task per conversion?
//!
//! Every strategy is CPU-bound (pdfium rendering, image codecs, resvg, PDF
//! writing) and the PDF engine is not async-safe. The whole transcode runs on
//! a single [`tokio::task::spawn_blocking`] task that walks pages
//! sequentially through one reused [`RasterBridge`] surface, so a conversion
//! never holds more than one decoded page in memory and never runs two
//! transcodes of the same artifact at once.
//!
//! ## Order of checks
//!
//! The compatibility matrix is consulted before any payload byte is read: an
//! unsupported pair fails with [`DocShiftError::UnsupportedConversion`] and
//! no other side effect. Every produced unit is validated before it is
//! bundled, and the final artifact is validated again before it is returned.

use crate::artifact::{OutputArtifact, SourceArtifact};
use crate::config::ConversionConfig;
use crate::error::{DocShiftError, UnitError};
use crate::format::{strategy, FormatId, Strategy};
use crate::output::{ConversionOutput, ConversionStats, TextPage};
use crate::pipeline::bundle::{entry_name, BundleWriter};
use crate::pipeline::docx::docx_text;
use crate::pipeline::encode::{decode_raster, encode_surface};
use crate::pipeline::extract::{plain_text, TextExtractor};
use crate::pipeline::input;
use crate::pipeline::layout::{image_to_pdf, text_to_pdf};
use crate::pipeline::pdfium::{LazyPdfium, PdfBackend};
use crate::pipeline::raster::RasterBridge;
use crate::progress::ProgressCallback;
use crate::validate::{validate, validate_bytes};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Dispatches (source, target) pairs to transcoding strategies.
///
/// # Example
/// ```rust,no_run
/// use docshift::{ConversionConfig, ConversionEngine, FormatId};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = ConversionEngine::with_pdfium(ConversionConfig::default());
/// let output = engine.convert_path("slides.pdf", FormatId::Png).await?;
/// println!("{} ({} bytes)", output.artifact.file_name(), output.artifact.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConversionEngine {
    backend: Arc<dyn PdfBackend>,
    config: ConversionConfig,
}

impl ConversionEngine {
    /// Build an engine over an explicit PDF backend.
    pub fn new(backend: Arc<dyn PdfBackend>, config: ConversionConfig) -> Self {
        Self { backend, config }
    }

    /// Build an engine over pdfium. The library is located (and downloaded
    /// if needed) on the first PDF operation, inside the blocking task.
    pub fn with_pdfium(config: ConversionConfig) -> Self {
        Self::new(Arc::new(LazyPdfium::new()), config)
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// A text extractor sharing this engine's backend and password.
    pub fn extractor(&self) -> TextExtractor {
        TextExtractor::new(Arc::clone(&self.backend), self.config.password.clone())
    }

    /// Convert `source` to `target`.
    ///
    /// # Errors
    /// - [`DocShiftError::UnsupportedConversion`] before any work when the
    ///   pair is not in the matrix
    /// - [`DocShiftError::SourceUnreadable`] when the payload cannot be decoded
    /// - [`DocShiftError::TranscodeFailure`] when the only unit fails
    /// - [`DocShiftError::NoValidOutput`] when every page of a PDF fails
    /// - [`DocShiftError::OutputInvalid`] when the result fails validation
    pub async fn convert(
        &self,
        source: &SourceArtifact,
        target: FormatId,
    ) -> Result<ConversionOutput, DocShiftError> {
        let strategy = strategy(source.format(), target).ok_or(
            DocShiftError::UnsupportedConversion {
                from: source.format(),
                to: target,
            },
        )?;

        let total_start = Instant::now();
        info!(
            "Converting '{}' ({} bytes): {} → {} via {:?}",
            source.name(),
            source.len(),
            source.format(),
            target,
            strategy
        );

        let job = TranscodeJob {
            backend: Arc::clone(&self.backend),
            source: source.clone(),
            target,
            strategy,
            password: self.config.password.clone(),
            max_pixels: self.config.max_rendered_pixels,
            progress: self.config.progress_callback.clone(),
        };

        let transcoded = tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(|e| DocShiftError::Internal(format!("Transcode task panicked: {e}")))??;

        if !validate(&transcoded.artifact) {
            warn!(
                "Discarding invalid {} artifact ({} bytes)",
                target,
                transcoded.artifact.len()
            );
            return Err(DocShiftError::OutputInvalid {
                format: transcoded.artifact.format(),
                reason: "payload is empty or lacks the format signature".into(),
            });
        }

        let stats = ConversionStats {
            total_units: transcoded.total_units,
            produced_units: transcoded.produced_units,
            failed_units: transcoded.unit_errors.len(),
            output_bytes: transcoded.artifact.len(),
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Conversion complete: {}/{} units, {} bytes, {}ms",
            stats.produced_units, stats.total_units, stats.output_bytes, stats.total_duration_ms
        );

        Ok(ConversionOutput {
            artifact: transcoded.artifact,
            status: transcoded.status,
            unit_errors: transcoded.unit_errors,
            stats,
        })
    }

    /// Resolve a local path or URL, then convert it.
    ///
    /// The pair is checked against the matrix from the input's name before
    /// the file is read or downloaded.
    pub async fn convert_path(
        &self,
        input_str: impl AsRef<str>,
        target: FormatId,
    ) -> Result<ConversionOutput, DocShiftError> {
        check_conversion(input_str.as_ref(), target)?;
        let source = input::resolve_input(input_str.as_ref(), self.config.download_timeout_secs).await?;
        self.convert(&source, target).await
    }

    /// Convert and write the artifact to `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn convert_to_file(
        &self,
        input_str: impl AsRef<str>,
        target: FormatId,
        output_path: impl AsRef<Path>,
    ) -> Result<ConversionOutput, DocShiftError> {
        let output = self.convert_path(input_str, target).await?;
        write_atomic(output_path.as_ref(), output.artifact.bytes()).await?;
        Ok(output)
    }

    /// Extract every [`TextPage`] of `source` in document order.
    pub async fn extract(&self, source: &SourceArtifact) -> Result<Vec<TextPage>, DocShiftError> {
        let extractor = self.extractor();
        let source = source.clone();
        tokio::task::spawn_blocking(move || extractor.extract_all(&source))
            .await
            .map_err(|e| DocShiftError::Internal(format!("Extraction task panicked: {e}")))?
    }
}

/// Look up the strategy for converting `input_str` (a path or URL) to
/// `target`, using only its name.
///
/// # Errors
/// [`DocShiftError::UnsupportedUpload`] for an unknown extension and
/// [`DocShiftError::UnsupportedConversion`] for a pair outside the matrix.
pub fn check_conversion(input_str: &str, target: FormatId) -> Result<Strategy, DocShiftError> {
    let from = input::detect_input_format(input_str)?;
    strategy(from, target).ok_or(DocShiftError::UnsupportedConversion { from, to: target })
}

/// Synchronous wrapper around [`ConversionEngine::convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    engine: &ConversionEngine,
    source: &SourceArtifact,
    target: FormatId,
) -> Result<ConversionOutput, DocShiftError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocShiftError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(engine.convert(source, target))
}

/// Write `bytes` to `path` through a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DocShiftError> {
    let write_err = |e| DocShiftError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

// ── Blocking transcode ───────────────────────────────────────────────────

/// Everything a strategy needs, owned so it can move onto a blocking thread.
struct TranscodeJob {
    backend: Arc<dyn PdfBackend>,
    source: SourceArtifact,
    target: FormatId,
    strategy: Strategy,
    password: Option<String>,
    max_pixels: u32,
    progress: Option<ProgressCallback>,
}

struct Transcoded {
    artifact: OutputArtifact,
    status: Vec<String>,
    unit_errors: Vec<UnitError>,
    total_units: usize,
    produced_units: usize,
}

impl TranscodeJob {
    fn run(self) -> Result<Transcoded, DocShiftError> {
        match self.strategy {
            Strategy::PdfToRaster => self.pdf_to_raster(),
            _ => self.single_unit(),
        }
    }

    /// Strategies that always produce exactly one unit.
    fn single_unit(self) -> Result<Transcoded, DocShiftError> {
        if let Some(cb) = &self.progress {
            cb.on_conversion_start(1);
            cb.on_unit_start(1, 1);
        }

        let result = self.produce_single();

        let data = match result {
            Ok(data) => data,
            Err(e) => {
                if let Some(cb) = &self.progress {
                    cb.on_unit_error(1, 1, &e.to_string());
                    cb.on_conversion_complete(1, 0);
                }
                return Err(e);
            }
        };

        if let Some(cb) = &self.progress {
            cb.on_unit_complete(1, 1, data.len());
            cb.on_conversion_complete(1, 1);
        }

        let status = vec![format!(
            "Converted '{}' to {} ({} bytes)",
            self.source.name(),
            self.target,
            data.len()
        )];
        Ok(Transcoded {
            artifact: OutputArtifact::new(data, self.target, self.source.base_name()),
            status,
            unit_errors: Vec::new(),
            total_units: 1,
            produced_units: 1,
        })
    }

    fn produce_single(&self) -> Result<Vec<u8>, DocShiftError> {
        let source = &self.source;
        let mut bridge = RasterBridge::new();
        let failure = |detail: String| DocShiftError::TranscodeFailure { unit: 1, detail };

        let data = match self.strategy {
            Strategy::DocumentToPdf => {
                let text = match source.format() {
                    FormatId::Docx => docx_text(source.bytes())?,
                    _ => plain_text(source.bytes())?.to_string(),
                };
                text_to_pdf(source.name(), &text)
            }
            Strategy::RasterToPdf => {
                let image = decode_raster(source.format(), source.bytes())?;
                let surface = bridge.load_image(&image);
                image_to_pdf(source.name(), surface).map_err(failure)?
            }
            Strategy::VectorToPdf => {
                let surface = bridge.rasterize_svg(source.bytes())?;
                image_to_pdf(source.name(), surface).map_err(failure)?
            }
            Strategy::RasterToRaster => {
                let image = decode_raster(source.format(), source.bytes())?;
                let surface = bridge.load_image(&image);
                encode_surface(surface, self.target).map_err(failure)?
            }
            Strategy::VectorToRaster => {
                let surface = bridge.rasterize_svg(source.bytes())?;
                encode_surface(surface, self.target).map_err(failure)?
            }
            Strategy::TextExport => {
                let extractor =
                    TextExtractor::new(Arc::clone(&self.backend), self.password.clone());
                extractor.physical_pages(source)?.join("\n\n").into_bytes()
            }
            Strategy::PdfToRaster => {
                return Err(DocShiftError::Internal(
                    "page-by-page strategy reached the single-unit path".into(),
                ))
            }
        };

        if !validate_bytes(self.target, &data) {
            return Err(DocShiftError::OutputInvalid {
                format: self.target,
                reason: format!("{} bytes failed validation", data.len()),
            });
        }
        Ok(data)
    }

    /// Render each page, skip the failures, bundle when more than one page.
    fn pdf_to_raster(self) -> Result<Transcoded, DocShiftError> {
        let pdf = self.source.bytes();
        let password = self.password.as_deref();
        let total = self.backend.page_count(pdf, password)?;
        info!("PDF has {} pages", total);

        if let Some(cb) = &self.progress {
            cb.on_conversion_start(total);
        }

        let mut bridge = RasterBridge::new();
        let mut produced: Vec<(usize, Vec<u8>)> = Vec::new();
        let mut unit_errors: Vec<UnitError> = Vec::new();
        let mut status: Vec<String> = Vec::new();
        let target = self.target;
        let progress = self.progress.clone();

        bridge.render_pdf(
            self.backend.as_ref(),
            pdf,
            password,
            self.max_pixels,
            |page, rendered| {
                if let Some(cb) = &progress {
                    cb.on_unit_start(page, total);
                }
                let outcome = rendered.and_then(|surface| {
                    let data = encode_surface(surface, target)
                        .map_err(|detail| UnitError::EncodeFailed { page, detail })?;
                    if validate_bytes(target, &data) {
                        Ok(data)
                    } else {
                        Err(UnitError::Invalid { page })
                    }
                });
                match outcome {
                    Ok(data) => {
                        debug!("Page {}: {} bytes of {}", page, data.len(), target);
                        if let Some(cb) = &progress {
                            cb.on_unit_complete(page, total, data.len());
                        }
                        status.push(format!(
                            "Page {}: converted to {} ({} bytes)",
                            page,
                            target,
                            data.len()
                        ));
                        produced.push((page, data));
                    }
                    Err(e) => {
                        warn!("Skipping page {}: {}", page, e);
                        if let Some(cb) = &progress {
                            cb.on_unit_error(page, total, &e.to_string());
                        }
                        status.push(format!("Page {}: skipped ({})", page, e));
                        unit_errors.push(e);
                    }
                }
            },
        )?;

        if let Some(cb) = &progress {
            cb.on_conversion_complete(total, produced.len());
        }

        if produced.is_empty() {
            let first_error = unit_errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "document has no pages".to_string());
            return Err(DocShiftError::NoValidOutput { total, first_error });
        }

        let produced_units = produced.len();
        let base = self.source.base_name();
        let artifact = if total == 1 {
            let (_, data) = produced.remove(0);
            OutputArtifact::new(data, target, base)
        } else {
            let mut bundle = BundleWriter::new(target.extension());
            for (page, data) in &produced {
                bundle.add_page(*page, data).map_err(|e| DocShiftError::TranscodeFailure {
                    unit: *page,
                    detail: format!("cannot add {} to bundle: {e}", entry_name(*page, target.extension())),
                })?;
            }
            let bytes = bundle
                .finish()
                .map_err(|e| DocShiftError::Internal(format!("Failed to finish bundle: {e}")))?;
            OutputArtifact::new(bytes, FormatId::Zip, base)
        };

        Ok(Transcoded {
            artifact,
            status,
            unit_errors,
            total_units: total,
            produced_units,
        })
    }
}
