//! Shared fixtures: an in-memory PDF backend, a scripted text generator and
//! small document builders.

#![allow(dead_code)]

use async_trait::async_trait;
use docshift::pipeline::pdfium::{PageRender, RenderOptions};
use docshift::{
    CapabilityFailurePolicy, ConversionConfig, ConversionProgressCallback, DocShiftError,
    Generated, GenerationError, PdfBackend, TextGenerator,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

// ── PDF backend ──────────────────────────────────────────────────────────────

/// How a fake page behaves when rendered.
#[derive(Clone)]
pub enum PageImage {
    /// Opaque page with a colour gradient.
    Drawn { width: u32, height: u32 },
    /// Opaque page of plain white, as a blank page renders.
    Blank { width: u32, height: u32 },
    Transparent { width: u32, height: u32 },
    Broken(&'static str),
}

#[derive(Clone)]
pub struct FakePage {
    pub text: String,
    pub image: PageImage,
}

impl FakePage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: PageImage::Drawn {
                width: 60,
                height: 80,
            },
        }
    }

    pub fn image(image: PageImage) -> Self {
        Self {
            text: String::new(),
            image,
        }
    }
}

/// A [`PdfBackend`] that serves fixed pages and counts every call.
pub struct FakePdf {
    pub pages: Vec<FakePage>,
    pub calls: AtomicUsize,
    pub last_options: Mutex<Option<RenderOptions>>,
}

impl FakePdf {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PdfBackend for FakePdf {
    fn page_count(&self, pdf: &[u8], _password: Option<&str>) -> Result<usize, DocShiftError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        check_header(pdf)?;
        Ok(self.pages.len())
    }

    fn render_pages(
        &self,
        pdf: &[u8],
        _password: Option<&str>,
        options: RenderOptions,
        visit: &mut dyn FnMut(usize, PageRender),
    ) -> Result<usize, DocShiftError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        check_header(pdf)?;
        *self.last_options.lock().unwrap() = Some(options);
        for (idx, page) in self.pages.iter().enumerate() {
            let render = match page.image {
                PageImage::Drawn { width, height } => Ok(DynamicImage::ImageRgba8(
                    RgbaImage::from_fn(width, height, |x, y| {
                        Rgba([(x * 13 % 256) as u8, (y * 7 % 256) as u8, 200, 255])
                    }),
                )),
                PageImage::Blank { width, height } => Ok(DynamicImage::ImageRgba8(
                    RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])),
                )),
                PageImage::Transparent { width, height } => Ok(DynamicImage::ImageRgba8(
                    RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])),
                )),
                PageImage::Broken(why) => Err(why.to_string()),
            };
            visit(idx, render);
        }
        Ok(self.pages.len())
    }

    fn page_texts(
        &self,
        pdf: &[u8],
        _password: Option<&str>,
        visit: &mut dyn FnMut(usize, String) -> bool,
    ) -> Result<usize, DocShiftError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        check_header(pdf)?;
        for (idx, page) in self.pages.iter().enumerate() {
            if !visit(idx, page.text.clone()) {
                break;
            }
        }
        Ok(self.pages.len())
    }
}

fn check_header(pdf: &[u8]) -> Result<(), DocShiftError> {
    if pdf.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(DocShiftError::SourceUnreadable {
            format: docshift::FormatId::Pdf,
            detail: "missing %PDF header".into(),
        })
    }
}

pub const PDF_STUB: &[u8] = b"%PDF-1.7\n% test stub\n";

// ── Text generator ───────────────────────────────────────────────────────────

type Respond = dyn Fn(&str) -> Result<String, GenerationError> + Send + Sync;
type Delay = dyn Fn(&str) -> Duration + Send + Sync;

/// A [`TextGenerator`] driven by closures. Records every prompt.
pub struct ScriptedGenerator {
    respond: Box<Respond>,
    delay: Option<Box<Delay>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(
        respond: impl Fn(&str) -> Result<String, GenerationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answers every prompt with `"summary of <first word after the instruction>"`.
    pub fn echo_first_word() -> Self {
        Self::new(|prompt| {
            let body = prompt.split_once('\n').map(|(_, b)| b).unwrap_or("");
            let first = body.split_whitespace().next().unwrap_or("nothing");
            Ok(format!("summary of {first}"))
        })
    }

    pub fn with_delay(mut self, delay: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generated, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(prompt)).await;
        }
        (self.respond)(prompt).map(|text| Generated {
            input_tokens: prompt.split_whitespace().count(),
            output_tokens: text.split_whitespace().count(),
            text,
        })
    }
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Recorder {
    pub started_total: AtomicUsize,
    pub unit_starts: AtomicUsize,
    pub completes: AtomicUsize,
    pub errors: AtomicUsize,
    pub finished_ok: AtomicUsize,
}

impl ConversionProgressCallback for Recorder {
    fn on_conversion_start(&self, total_units: usize) {
        self.started_total.store(total_units, Ordering::SeqCst);
    }

    fn on_unit_start(&self, _unit: usize, _total: usize) {
        self.unit_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_unit_complete(&self, _unit: usize, _total: usize, _bytes: usize) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_unit_error(&self, _unit: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_conversion_complete(&self, _total: usize, success_count: usize) {
        self.finished_ok.store(success_count, Ordering::SeqCst);
    }
}

// ── Builders ─────────────────────────────────────────────────────────────────

pub fn fast_config(policy: CapabilityFailurePolicy) -> ConversionConfig {
    ConversionConfig::builder()
        .max_retries(1)
        .retry_backoff_ms(1)
        .api_timeout_secs(5)
        .failure_policy(policy)
        .build()
        .unwrap()
}

/// A transport failure: the request never got an answer.
pub fn no_answer(detail: &str) -> GenerationError {
    GenerationError::Transport(detail.to_string())
}

/// An answer with an error status.
pub fn server_error(detail: &str) -> GenerationError {
    GenerationError::Rejected(detail.to_string())
}

/// `n` distinct words: `w0 w1 w2 …`.
pub fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 7) as u8, (y * 11) as u8, 120, 255])
    }));
    let img = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    };
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}</w:body></w:document>"
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(b"<?xml version=\"1.0\"?><Types/>").unwrap();
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

pub const RED_SVG: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20" viewBox="0 0 40 20"><rect width="40" height="20" fill="#ff0000"/></svg>"##;
