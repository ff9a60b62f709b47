//! Streaming extraction API: emit [`TextPage`]s as each page is read.
//!
//! ## Why stream?
//!
//! A long PDF takes a while to walk with pdfium. The stream lets callers
//! start summarising the first pages while later ones are still being read,
//! and keeps at most a channel's worth of text in flight.
//!
//! Pages arrive in document order: the blocking reader walks pages
//! sequentially and the channel preserves send order.

use crate::artifact::SourceArtifact;
use crate::error::DocShiftError;
use crate::output::TextPage;
use crate::pipeline::extract::{is_extractable, TextExtractor};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

/// A boxed stream of extracted pages.
pub type TextPageStream = Pin<Box<dyn Stream<Item = Result<TextPage, DocShiftError>> + Send>>;

/// Pages buffered between the reader thread and the consumer.
const CHANNEL_CAPACITY: usize = 16;

/// Extract `source` lazily.
///
/// Must be called from within a tokio runtime. A source with no text model
/// yields a single [`DocShiftError::UnsupportedForExtraction`] item and no
/// reader thread is started. Dropping the stream stops the reader after the
/// page it is on.
pub fn extract_stream(extractor: TextExtractor, source: SourceArtifact) -> TextPageStream {
    if !is_extractable(source.format()) {
        let err = DocShiftError::UnsupportedForExtraction {
            format: source.format(),
        };
        return Box::pin(stream::once(async move { Err(err) }));
    }

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || {
        let result = extractor.walk(&source, &mut |page| tx.blocking_send(Ok(page)).is_ok());
        if let Err(e) = result {
            let _ = tx.blocking_send(Err(e));
        }
        debug!("Extraction reader for '{}' finished", source.name());
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Collect a [`TextPageStream`], stopping at the first error.
pub async fn collect_pages(mut pages: TextPageStream) -> Result<Vec<TextPage>, DocShiftError> {
    let mut out = Vec::new();
    while let Some(item) = pages.next().await {
        out.push(item?);
    }
    Ok(out)
}
