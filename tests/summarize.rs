//! Summary assembly and streaming extraction tests.

mod common;

use common::{
    docx, fast_config, no_answer, server_error, words, FakePage, FakePdf, Recorder,
    ScriptedGenerator, PDF_STUB,
};
use docshift::stream::collect_pages;
use docshift::{
    extract_stream, CapabilityFailurePolicy, ConversionConfig, ConversionEngine, DocShiftError,
    FormatId, SourceArtifact, SummaryAction, SummaryAssembler, UnitError,
};
use futures::StreamExt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn assembler(generator: Arc<ScriptedGenerator>, policy: CapabilityFailurePolicy) -> SummaryAssembler {
    SummaryAssembler::new(generator, fast_config(policy))
}

async fn pdf_pages(pages: Vec<FakePage>) -> Vec<docshift::TextPage> {
    let engine = ConversionEngine::new(Arc::new(FakePdf::new(pages)), ConversionConfig::default());
    let source = SourceArtifact::new("doc.pdf", FormatId::Pdf, PDF_STUB.to_vec());
    engine.extract(&source).await.unwrap()
}

// ── Labels and chunking ──────────────────────────────────────────────────────

#[tokio::test]
async fn short_text_is_one_unlabeled_part() {
    let engine = ConversionEngine::new(Arc::new(FakePdf::new(vec![])), ConversionConfig::default());
    let source = SourceArtifact::new("notes.txt", FormatId::Txt, words(250).into_bytes());
    let pages = engine.extract(&source).await.unwrap();

    let generator = Arc::new(ScriptedGenerator::echo_first_word());
    let out = assembler(generator.clone(), CapabilityFailurePolicy::Abort)
        .summarize(pages, SummaryAction::PlainSummary)
        .await
        .unwrap();

    assert_eq!(out.text, "Page 1:\nsummary of w0");
    assert!(!out.text.contains("Part"));
    assert_eq!(generator.calls(), 1);
    assert_eq!(out.stats.parts, 1);
    assert_eq!(out.stats.generated, 1);
}

#[tokio::test]
async fn long_page_is_windowed_and_labeled_in_order() {
    let pages = pdf_pages(vec![FakePage::text(words(1850))]).await;
    assert_eq!(pages.len(), 2);

    let generator = Arc::new(ScriptedGenerator::echo_first_word());
    let out = assembler(generator.clone(), CapabilityFailurePolicy::Abort)
        .summarize(pages, SummaryAction::PlainSummary)
        .await
        .unwrap();

    assert_eq!(
        out.text,
        "Page 1 Part 1:\nsummary of w0\n\nPage 1 Part 2:\nsummary of w1000"
    );

    let mut counts: Vec<usize> = generator
        .prompts
        .lock()
        .unwrap()
        .iter()
        .map(|p| p.split_once('\n').unwrap().1.split_whitespace().count())
        .collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![850, 1000]);
}

#[tokio::test]
async fn page_numbers_follow_physical_pages() {
    let pages = pdf_pages(vec![
        FakePage::text("alpha one"),
        FakePage::text(words(900)),
        FakePage::text("omega"),
    ])
    .await;

    let out = assembler(
        Arc::new(ScriptedGenerator::echo_first_word()),
        CapabilityFailurePolicy::Abort,
    )
    .summarize(pages, SummaryAction::PlainSummary)
    .await
    .unwrap();

    let labels: Vec<&str> = out.entries.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, ["Page 1", "Page 2 Part 1", "Page 3"]);
}

#[tokio::test]
async fn keyword_action_uses_its_instruction() {
    let source = SourceArtifact::new("d.docx", FormatId::Docx, docx(&["Rust ownership"]));
    let engine = ConversionEngine::new(Arc::new(FakePdf::new(vec![])), ConversionConfig::default());
    let pages = engine.extract(&source).await.unwrap();

    let generator = Arc::new(ScriptedGenerator::new(|_| Ok("rust, ownership".into())));
    let out = assembler(generator.clone(), CapabilityFailurePolicy::Abort)
        .summarize(pages, SummaryAction::KeywordExtraction)
        .await
        .unwrap();

    assert_eq!(out.text, "Page 1:\nrust, ownership");
    let prompt = generator.prompts.lock().unwrap()[0].clone();
    assert!(prompt.starts_with("Extract keywords from this document:\n"));
    assert!(prompt.contains("Rust ownership"));
}

// ── Ordering ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn slow_early_parts_do_not_reorder_output() {
    let pages = pdf_pages(vec![
        FakePage::text("first"),
        FakePage::text("second"),
        FakePage::text("third"),
    ])
    .await;

    let generator = Arc::new(ScriptedGenerator::echo_first_word().with_delay(|prompt| {
        if prompt.contains("first") {
            Duration::from_millis(80)
        } else {
            Duration::ZERO
        }
    }));
    let out = assembler(generator, CapabilityFailurePolicy::Abort)
        .summarize(pages, SummaryAction::PlainSummary)
        .await
        .unwrap();

    assert_eq!(
        out.text,
        "Page 1:\nsummary of first\n\nPage 2:\nsummary of second\n\nPage 3:\nsummary of third"
    );
}

// ── Placeholders and failures ────────────────────────────────────────────────

#[tokio::test]
async fn blank_page_gets_placeholder_without_a_call() {
    let pages = pdf_pages(vec![FakePage::text("   \n "), FakePage::text("body")]).await;

    let generator = Arc::new(ScriptedGenerator::echo_first_word());
    let out = assembler(generator.clone(), CapabilityFailurePolicy::Abort)
        .summarize(pages, SummaryAction::PlainSummary)
        .await
        .unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(out.entries[0].body, "No summary available.");
    assert!(!out.entries[0].generated);
    assert!(out.failures.is_empty());
    assert_eq!(out.stats.placeholders, 1);
}

#[tokio::test]
async fn fenced_or_empty_responses_are_cleaned() {
    let pages = pdf_pages(vec![FakePage::text("fenced"), FakePage::text("silent")]).await;

    let generator = Arc::new(ScriptedGenerator::new(|prompt| {
        if prompt.contains("fenced") {
            Ok("```markdown\nclean text\n```".into())
        } else {
            Ok("  \n\n ".into())
        }
    }));
    let out = assembler(generator, CapabilityFailurePolicy::Abort)
        .summarize(pages, SummaryAction::KeywordExtraction)
        .await
        .unwrap();

    assert_eq!(out.entries[0].body, "clean text");
    assert_eq!(out.entries[1].body, "No keywords found.");
    assert!(out.failures.is_empty());
}

#[tokio::test]
async fn abort_policy_fails_the_whole_summary() {
    let pages = pdf_pages(vec![FakePage::text("fine"), FakePage::text("broken")]).await;

    let generator = Arc::new(ScriptedGenerator::new(|prompt| {
        if prompt.contains("broken") {
            Err(no_answer("connection reset by peer"))
        } else {
            Ok("ok".into())
        }
    }));
    let err = assembler(generator.clone(), CapabilityFailurePolicy::Abort)
        .summarize(pages, SummaryAction::PlainSummary)
        .await
        .unwrap_err();

    match err {
        DocShiftError::CapabilityUnavailable { detail } => {
            assert!(detail.contains("Page 2"), "{detail}");
            assert!(detail.contains("connection reset"), "{detail}");
        }
        other => panic!("unexpected: {other:?}"),
    }
    // One initial attempt plus one retry for the failing part.
    assert_eq!(generator.calls(), 3);
}

#[tokio::test]
async fn error_status_gets_placeholder_under_default_policy() {
    let pages = pdf_pages(vec![FakePage::text("broken"), FakePage::text("fine")]).await;

    let generator = Arc::new(ScriptedGenerator::new(|prompt| {
        if prompt.contains("broken") {
            Err(server_error("HTTP 500 Internal Server Error"))
        } else {
            Ok("ok".into())
        }
    }));
    let out = SummaryAssembler::new(generator, fast_config(CapabilityFailurePolicy::default()))
        .summarize(pages, SummaryAction::PlainSummary)
        .await
        .unwrap();

    assert_eq!(out.text, "Page 1:\nNo summary available.\n\nPage 2:\nok");
    assert_eq!(out.failures.len(), 1);
    assert!(matches!(out.failures[0], UnitError::Rejected { page: 1, part: 1, .. }));
    assert_eq!(out.stats.placeholders, 1);
}

#[tokio::test]
async fn placeholder_policy_lists_failures() {
    let pages = pdf_pages(vec![FakePage::text("fine"), FakePage::text("broken")]).await;
    let recorder = Arc::new(Recorder::default());
    let config = ConversionConfig::builder()
        .max_retries(0)
        .retry_backoff_ms(1)
        .failure_policy(CapabilityFailurePolicy::Placeholder)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let generator = Arc::new(ScriptedGenerator::new(|prompt| {
        if prompt.contains("broken") {
            Err(no_answer("dns error"))
        } else {
            Ok("ok".into())
        }
    }));
    let out = SummaryAssembler::new(generator, config)
        .summarize(pages, SummaryAction::PlainSummary)
        .await
        .unwrap();

    assert_eq!(out.text, "Page 1:\nok\n\nPage 2:\nNo summary available.");
    assert_eq!(out.failures.len(), 1);
    assert!(matches!(
        out.failures[0],
        UnitError::GenerationFailed { page: 2, part: 1, .. }
    ));
    assert_eq!(out.stats.generated, 1);
    assert_eq!(out.stats.placeholders, 1);

    assert_eq!(recorder.started_total.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.completes.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.finished_ok.load(Ordering::SeqCst), 1);
}

// ── Streaming extraction ─────────────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_pages_in_document_order() {
    let backend = Arc::new(FakePdf::new(vec![
        FakePage::text("one"),
        FakePage::text(words(1200)),
        FakePage::text("three"),
    ]));
    let engine = ConversionEngine::new(backend, ConversionConfig::default());
    let source = SourceArtifact::new("doc.pdf", FormatId::Pdf, PDF_STUB.to_vec());

    let pages = collect_pages(extract_stream(engine.extractor(), source)).await.unwrap();
    let order: Vec<(usize, usize)> = pages.iter().map(|p| (p.page_number, p.part_number)).collect();
    assert_eq!(order, [(1, 1), (2, 1), (2, 2), (3, 1)]);
    assert_eq!(pages[2].word_count(), 200);
}

#[tokio::test]
async fn stream_rejects_formats_without_text() {
    let engine = ConversionEngine::new(Arc::new(FakePdf::new(vec![])), ConversionConfig::default());
    let source = SourceArtifact::new("a.png", FormatId::Png, vec![0u8; 8]);

    let mut stream = extract_stream(engine.extractor(), source);
    let first = stream.next().await.unwrap();
    assert!(matches!(
        first,
        Err(DocShiftError::UnsupportedForExtraction { format: FormatId::Png })
    ));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn stream_surfaces_unreadable_pdf_as_an_item() {
    let engine = ConversionEngine::new(Arc::new(FakePdf::new(vec![])), ConversionConfig::default());
    let source = SourceArtifact::new("bad.pdf", FormatId::Pdf, b"garbage".to_vec());

    let err = collect_pages(extract_stream(engine.extractor(), source))
        .await
        .unwrap_err();
    assert!(matches!(err, DocShiftError::SourceUnreadable { .. }));
}
