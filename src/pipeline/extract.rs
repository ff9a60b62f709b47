//! TextExtractor: plain text out of a source artifact, as [`TextPage`]s.
//!
//! Plain text and DOCX are treated as one virtual page. PDFs are read one
//! physical page at a time through the [`PdfBackend`], and every page is
//! run through the paginator as soon as its text is available.

use crate::artifact::SourceArtifact;
use crate::error::DocShiftError;
use crate::format::FormatId;
use crate::output::TextPage;
use crate::pipeline::docx::docx_text;
use crate::pipeline::paginate::paginate;
use crate::pipeline::pdfium::PdfBackend;
use std::sync::Arc;
use tracing::debug;

/// Formats that carry a text model.
pub fn is_extractable(format: FormatId) -> bool {
    matches!(format, FormatId::Txt | FormatId::Docx | FormatId::Pdf)
}

/// Decode a plain-text payload: UTF-8, with a leading BOM dropped.
pub fn plain_text(data: &[u8]) -> Result<&str, DocShiftError> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    std::str::from_utf8(data).map_err(|e| DocShiftError::SourceUnreadable {
        format: FormatId::Txt,
        detail: format!("not valid UTF-8: {e}"),
    })
}

/// Blocking text extraction over a shared PDF backend.
#[derive(Clone)]
pub struct TextExtractor {
    backend: Arc<dyn PdfBackend>,
    password: Option<String>,
}

impl TextExtractor {
    pub fn new(backend: Arc<dyn PdfBackend>, password: Option<String>) -> Self {
        Self { backend, password }
    }

    /// The text of each physical page, unsplit. Non-PDF sources yield one
    /// entry.
    pub fn physical_pages(&self, source: &SourceArtifact) -> Result<Vec<String>, DocShiftError> {
        match source.format() {
            FormatId::Txt => Ok(vec![plain_text(source.bytes())?.to_string()]),
            FormatId::Docx => Ok(vec![docx_text(source.bytes())?]),
            FormatId::Pdf => {
                let mut pages = Vec::new();
                self.backend
                    .page_texts(source.bytes(), self.password.as_deref(), &mut |_, text| {
                        pages.push(text);
                        true
                    })?;
                Ok(pages)
            }
            other => Err(DocShiftError::UnsupportedForExtraction { format: other }),
        }
    }

    /// Feed paginated [`TextPage`]s to `sink` in document order. Stops
    /// early when `sink` returns `false`.
    pub fn walk(
        &self,
        source: &SourceArtifact,
        sink: &mut dyn FnMut(TextPage) -> bool,
    ) -> Result<(), DocShiftError> {
        match source.format() {
            FormatId::Txt | FormatId::Docx => {
                let text = match source.format() {
                    FormatId::Txt => plain_text(source.bytes())?.to_string(),
                    _ => docx_text(source.bytes())?,
                };
                for page in paginate(1, &text) {
                    if !sink(page) {
                        break;
                    }
                }
                Ok(())
            }
            FormatId::Pdf => {
                let total = self.backend.page_texts(
                    source.bytes(),
                    self.password.as_deref(),
                    &mut |idx, text| paginate(idx + 1, &text).into_iter().all(|p| sink(p)),
                )?;
                debug!("Extracted text from {} PDF pages", total);
                Ok(())
            }
            other => Err(DocShiftError::UnsupportedForExtraction { format: other }),
        }
    }

    /// Collect every [`TextPage`] of the source.
    pub fn extract_all(&self, source: &SourceArtifact) -> Result<Vec<TextPage>, DocShiftError> {
        let mut pages = Vec::new();
        self.walk(source, &mut |p| {
            pages.push(p);
            true
        })?;
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::docx::tests::docx_with_body;
    use crate::pipeline::pdfium::{PageRender, RenderOptions};

    /// Backend whose pages are fixed strings.
    struct TextOnly(Vec<String>);

    impl PdfBackend for TextOnly {
        fn page_count(&self, _: &[u8], _: Option<&str>) -> Result<usize, DocShiftError> {
            Ok(self.0.len())
        }

        fn render_pages(
            &self,
            _: &[u8],
            _: Option<&str>,
            _: RenderOptions,
            visit: &mut dyn FnMut(usize, PageRender),
        ) -> Result<usize, DocShiftError> {
            for i in 0..self.0.len() {
                visit(i, Err("text-only backend".into()));
            }
            Ok(self.0.len())
        }

        fn page_texts(
            &self,
            _: &[u8],
            _: Option<&str>,
            visit: &mut dyn FnMut(usize, String) -> bool,
        ) -> Result<usize, DocShiftError> {
            for (i, t) in self.0.iter().enumerate() {
                if !visit(i, t.clone()) {
                    break;
                }
            }
            Ok(self.0.len())
        }
    }

    fn extractor(pages: &[&str]) -> TextExtractor {
        let backend = TextOnly(pages.iter().map(|s| s.to_string()).collect());
        TextExtractor::new(Arc::new(backend), None)
    }

    fn words(n: usize) -> String {
        vec!["lorem"; n].join(" ")
    }

    #[test]
    fn plain_text_is_one_page() {
        let src = SourceArtifact::new("a.txt", FormatId::Txt, b"\xEF\xBB\xBFhello there".to_vec());
        let pages = extractor(&[]).extract_all(&src).unwrap();
        assert_eq!(pages, vec![TextPage::whole(1, "hello there")]);
    }

    #[test]
    fn invalid_utf8_is_unreadable() {
        let src = SourceArtifact::new("a.txt", FormatId::Txt, vec![0xFF, 0xFE, 0x00]);
        let err = extractor(&[]).extract_all(&src).unwrap_err();
        assert!(matches!(err, DocShiftError::SourceUnreadable { format: FormatId::Txt, .. }));
    }

    #[test]
    fn docx_is_one_virtual_page() {
        let body = format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", words(1500));
        let src = SourceArtifact::new("a.docx", FormatId::Docx, docx_with_body(&body));
        let pages = extractor(&[]).extract_all(&src).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.page_number == 1));
        assert_eq!(pages[0].word_count(), 1000);
        assert_eq!(pages[1].word_count(), 500);
    }

    #[test]
    fn pdf_pages_are_paginated_per_physical_page() {
        let long = words(1850);
        let ex = extractor(&[&long, "short page"]);
        let src = SourceArtifact::new("a.pdf", FormatId::Pdf, b"%PDF-1.7".to_vec());
        let labels: Vec<String> = ex
            .extract_all(&src)
            .unwrap()
            .iter()
            .map(TextPage::label)
            .collect();
        assert_eq!(labels, vec!["Page 1 Part 1", "Page 1 Part 2", "Page 2"]);
    }

    #[test]
    fn walk_stops_when_sink_declines() {
        let ex = extractor(&["one", "two", "three"]);
        let src = SourceArtifact::new("a.pdf", FormatId::Pdf, b"%PDF-1.7".to_vec());
        let mut seen = Vec::new();
        ex.walk(&src, &mut |p| {
            seen.push(p.page_number);
            p.page_number < 2
        })
        .unwrap();
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn images_have_no_text_model() {
        let src = SourceArtifact::new("a.png", FormatId::Png, vec![0u8; 64]);
        let err = extractor(&[]).extract_all(&src).unwrap_err();
        assert!(matches!(err, DocShiftError::UnsupportedForExtraction { format: FormatId::Png }));
    }
}
