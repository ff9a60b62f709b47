//! Pipeline stages for conversion and text extraction.
//!
//! Each submodule implements one transformation step so it can be tested on
//! its own and swapped without touching its neighbours.
//!
//! ## Data Flow
//!
//! ```text
//! conversion:  input ──▶ pdfium / encode ──▶ raster ──▶ encode | layout ──▶ bundle
//!              (path/URL)   (decode)        (surface)  (png/jpg/webp | pdf)  (zip)
//!
//! text:        input ──▶ extract ──▶ paginate ──▶ llm ──▶ postprocess
//!                       (txt/docx/pdf) (windows)  (retry)  (cleanup)
//! ```
//!
//! - [`pdfium`] is the only stage that talks to the PDF engine, behind the
//!   [`pdfium::PdfBackend`] trait.
//! - [`llm`] is the only stage with network I/O besides URL input.

pub mod bundle;
pub mod docx;
pub mod encode;
pub mod extract;
pub mod input;
pub mod layout;
pub mod llm;
pub mod paginate;
pub mod pdfium;
pub mod postprocess;
pub mod raster;
