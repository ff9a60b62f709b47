//! CLI binary for docshift.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docshift::convert::write_atomic;
use docshift::progress::percent_complete;
use docshift::{
    check_conversion, resolve_input, supported_targets, CapabilityFailurePolicy, ConversionConfig,
    ConversionConfigBuilder, ConversionEngine, ConversionProgressCallback, FormatId,
    ProgressCallback, SourceArtifact, SummaryAction, SummaryAssembler,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per unit.
/// Units may complete out of order when summarising concurrently.
struct CliProgressCallback {
    bar: ProgressBar,
    /// "pages" while converting, "parts" while summarising.
    noun: &'static str,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` reports the unit count.
    fn new_dynamic(noun: &'static str, opening: &str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message(opening.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            noun,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {} {{msg:>4}}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}",
            self.noun
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Working");
        self.bar.set_message(format!("{}%", percent_complete(0, total)));
        self.bar.reset_eta();
    }

    /// Count one finished unit and show the running percentage.
    fn advance(&self, total: usize) {
        self.bar.inc(1);
        let pct = percent_complete(self.bar.position() as usize, total);
        self.bar.set_message(format!("{pct}%"));
    }

    fn elapsed_ms(&self, unit: usize) -> u128 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&unit))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_units: usize) {
        self.activate_bar(total_units);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_units} {}…", self.noun))
        ));
    }

    fn on_unit_start(&self, unit: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(unit, Instant::now());
        }
    }

    fn on_unit_complete(&self, unit: usize, total: usize, bytes: usize) {
        let elapsed_ms = self.elapsed_ms(unit);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            unit,
            total,
            dim(&format!("{bytes:>7} bytes")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.advance(total);
    }

    fn on_unit_error(&self, unit: usize, total: usize, error: &str) {
        let elapsed_ms = self.elapsed_ms(unit);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            unit,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.advance(total);
    }

    fn on_conversion_complete(&self, total_units: usize, success_count: usize) {
        let failed = total_units.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} {} done",
                green("✔"),
                bold(&success_count.to_string()),
                self.noun
            );
        } else {
            eprintln!(
                "{} {}/{} {} done  ({} failed)",
                if failed == total_units {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_units,
                self.noun,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Word document to PDF (writes report.pdf)
  docshift convert report.docx --to pdf

  # Every page of a PDF as PNG (slides.zip with page1.png, page2.png, …)
  docshift convert slides.pdf --to png -o out/slides.zip

  # Re-encode an image
  docshift convert photo.webp --to jpg

  # Summarise a document page by page
  docshift summarize paper.pdf -o summary.txt

  # Keywords instead of a summary, keep going past failed calls
  docshift summarize notes.docx --keywords --on-failure placeholder

  # Show the extracted text windows
  docshift extract paper.pdf

  # List the supported conversions
  docshift formats

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory

  Every flag also reads a DOCSHIFT_* variable (see --help on each command).

  PDFium (~30 MB) is downloaded automatically the first time a PDF is read
  and cached afterwards. Documents and images that are not PDFs never need it.
"#;

/// Convert documents and images between formats; summarise their text.
#[derive(Parser, Debug)]
#[command(
    name = "docshift",
    version,
    about = "Convert documents and images between formats and summarise their text",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output structured JSON instead of plain text.
    #[arg(long, global = true, env = "DOCSHIFT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "DOCSHIFT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCSHIFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCSHIFT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a file to another format.
    Convert {
        /// Local file path or HTTP/HTTPS URL.
        input: String,

        /// Target format: pdf, txt, png, jpg, webp.
        #[arg(long, env = "DOCSHIFT_TO")]
        to: FormatId,

        /// Write the result here instead of `{name}.{ext}` in the current directory.
        #[arg(short, long, env = "DOCSHIFT_OUTPUT")]
        output: Option<PathBuf>,

        /// Cap on either edge of a rendered PDF page, in pixels.
        #[arg(long, env = "DOCSHIFT_MAX_PIXELS", default_value_t = 4096)]
        max_pixels: u32,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Summarise a document, one labeled block per page part.
    Summarize {
        /// Local file path or HTTP/HTTPS URL (pdf, docx or txt).
        input: String,

        /// Extract keywords instead of writing a summary.
        #[arg(long, env = "DOCSHIFT_KEYWORDS")]
        keywords: bool,

        /// Write the summary to this file instead of stdout.
        #[arg(short, long, env = "DOCSHIFT_OUTPUT")]
        output: Option<PathBuf>,

        #[command(flatten)]
        llm: LlmArgs,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print the labeled text windows that summarisation would send.
    Extract {
        /// Local file path or HTTP/HTTPS URL (pdf, docx or txt).
        input: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// List supported conversions.
    Formats,
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCSHIFT_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCSHIFT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "DOCSHIFT_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "DOCSHIFT_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Number of concurrent LLM calls.
    #[arg(short, long, env = "DOCSHIFT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Retries per part on LLM failure.
    #[arg(long, env = "DOCSHIFT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "DOCSHIFT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Max LLM output tokens per part.
    #[arg(long, env = "DOCSHIFT_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCSHIFT_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Path to a text file containing a system prompt.
    #[arg(long, env = "DOCSHIFT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// What to do when a part's call fails for good.
    #[arg(long, env = "DOCSHIFT_ON_FAILURE", value_enum, default_value = "abort")]
    on_failure: PolicyArg,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PolicyArg {
    /// Fail the whole summary.
    Abort,
    /// Use the placeholder for the failed part and continue.
    Placeholder,
}

impl From<PolicyArg> for CapabilityFailurePolicy {
    fn from(v: PolicyArg) -> Self {
        match v {
            PolicyArg::Abort => CapabilityFailurePolicy::Abort,
            PolicyArg::Placeholder => CapabilityFailurePolicy::Placeholder,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Formats => print_formats(cli.json),
        Command::Convert {
            input,
            to,
            output,
            max_pixels,
            source,
        } => run_convert(&cli, input, *to, output.as_ref(), *max_pixels, source, show_progress).await,
        Command::Summarize {
            input,
            keywords,
            output,
            llm,
            source,
        } => {
            let action = if *keywords {
                SummaryAction::KeywordExtraction
            } else {
                SummaryAction::PlainSummary
            };
            run_summarize(&cli, input, action, output.as_ref(), llm, source, show_progress).await
        }
        Command::Extract { input, source } => run_extract(&cli, input, source).await,
    }
}

// ── Subcommands ──────────────────────────────────────────────────────────

async fn run_convert(
    cli: &Cli,
    input: &str,
    target: FormatId,
    output: Option<&PathBuf>,
    max_pixels: u32,
    source_args: &SourceArgs,
    show_progress: bool,
) -> Result<()> {
    // Reject the pair before reading the input or fetching the PDF engine.
    check_conversion(input, target).context("Conversion failed")?;
    let source = load_source(input, source_args).await?;
    ensure_pdf_engine(&source, cli.quiet)?;

    let mut builder = base_builder(source_args).max_rendered_pixels(max_pixels);
    if show_progress {
        builder = builder.progress_callback(progress_callback("pages", "Opening document…"));
    }
    let config = builder.build().context("Invalid configuration")?;

    let engine = ConversionEngine::with_pdfium(config);
    let result = engine
        .convert(&source, target)
        .await
        .context("Conversion failed")?;

    let path = output
        .cloned()
        .unwrap_or_else(|| PathBuf::from(result.artifact.file_name()));
    write_atomic(&path, result.artifact.bytes())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        if !show_progress {
            for line in &result.status {
                eprintln!("{line}");
            }
        }
        eprintln!(
            "{}  {}/{} units  {} bytes  {}ms  →  {}",
            if result.stats.failed_units == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            result.stats.produced_units,
            result.stats.total_units,
            result.stats.output_bytes,
            result.stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
    }
    Ok(())
}

async fn run_summarize(
    cli: &Cli,
    input: &str,
    action: SummaryAction,
    output: Option<&PathBuf>,
    llm: &LlmArgs,
    source_args: &SourceArgs,
    show_progress: bool,
) -> Result<()> {
    let source = load_source(input, source_args).await?;
    ensure_pdf_engine(&source, cli.quiet)?;

    let system_prompt = if let Some(ref path) = llm.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = base_builder(source_args)
        .concurrency(llm.concurrency)
        .max_retries(llm.max_retries)
        .api_timeout_secs(llm.api_timeout)
        .max_tokens(llm.max_tokens)
        .temperature(llm.temperature)
        .failure_policy(llm.on_failure.clone().into());
    if let Some(ref model) = llm.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = llm.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if show_progress {
        builder = builder.progress_callback(progress_callback("parts", "Reading text…"));
    }
    let config = builder.build().context("Invalid configuration")?;

    let engine = ConversionEngine::with_pdfium(config.clone());
    let pages = engine
        .extract(&source)
        .await
        .context("Text extraction failed")?;
    let assembler = SummaryAssembler::from_config(config).context("No LLM provider")?;
    let summary = assembler
        .summarize(pages, action)
        .await
        .context("Summarisation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise output")?;
        println!("{json}");
    } else if let Some(path) = output {
        let mut text = summary.text.clone();
        text.push('\n');
        write_atomic(path, text.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(summary.text.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "   {} parts  {} placeholders  {} tokens in  /  {} tokens out  {}ms",
            summary.stats.parts,
            summary.stats.placeholders,
            dim(&summary.stats.total_input_tokens.to_string()),
            dim(&summary.stats.total_output_tokens.to_string()),
            summary.stats.total_duration_ms,
        );
        for failure in &summary.failures {
            eprintln!("  {} {}", red("✗"), failure);
        }
    }
    Ok(())
}

async fn run_extract(cli: &Cli, input: &str, source_args: &SourceArgs) -> Result<()> {
    let source = load_source(input, source_args).await?;
    ensure_pdf_engine(&source, cli.quiet)?;

    let config = base_builder(source_args)
        .build()
        .context("Invalid configuration")?;
    let engine = ConversionEngine::with_pdfium(config);
    let pages = engine
        .extract(&source)
        .await
        .context("Text extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&pages).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for page in &pages {
        writeln!(handle, "{}  {}", bold(&page.label()), dim(&format!("({} words)", page.word_count())))
            .context("Failed to write to stdout")?;
        writeln!(handle, "{}\n", page.text).context("Failed to write to stdout")?;
    }
    Ok(())
}

fn print_formats(json: bool) -> Result<()> {
    let rows: Vec<(FormatId, Vec<FormatId>)> = FormatId::ALL
        .iter()
        .map(|&f| (f, supported_targets(f)))
        .collect();

    if json {
        let map: serde_json::Map<String, serde_json::Value> = rows
            .iter()
            .map(|(f, targets)| (f.to_string(), serde_json::json!(targets)))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&map).context("Failed to serialise formats")?
        );
        return Ok(());
    }

    for (from, targets) in rows {
        let list = if targets.is_empty() {
            dim("(none)")
        } else {
            targets
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("{:<6} → {}", bold(from.extension()), list);
    }
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────────

async fn load_source(input: &str, args: &SourceArgs) -> Result<SourceArtifact> {
    resolve_input(input, args.download_timeout)
        .await
        .with_context(|| format!("Failed to read input '{input}'"))
}

fn base_builder(args: &SourceArgs) -> ConversionConfigBuilder {
    let mut builder = ConversionConfig::builder().download_timeout_secs(args.download_timeout);
    if let Some(ref password) = args.password {
        builder = builder.password(password);
    }
    builder
}

fn progress_callback(noun: &'static str, opening: &str) -> ProgressCallback {
    CliProgressCallback::new_dynamic(noun, opening) as Arc<dyn ConversionProgressCallback>
}

/// Download pdfium with a byte-level bar before a PDF is read for the first
/// time. Non-PDF sources skip this entirely.
fn ensure_pdf_engine(source: &SourceArtifact, quiet: bool) -> Result<()> {
    if source.format() != FormatId::Pdf || pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }

    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}
