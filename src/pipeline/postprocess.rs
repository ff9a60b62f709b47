//! Post-processing: deterministic cleanup of generated text.
//!
//! ## Why is post-processing necessary?
//!
//! Language models occasionally return text that is fine to a human reader
//! but awkward once assembled into a labeled summary, for example:
//!
//! - Wrapping the answer in ` ```text ... ``` ` fences
//! - Using Windows-style `\r\n` line endings
//! - Emitting zero-width spaces or a BOM
//! - Padding the answer with long runs of blank lines
//!
//! Every rule here is a pure `&str → String` pass, so each is tested on its
//! own and the order is the only coupling between them.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one completion.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 5. Collapse runs of blank lines to a single blank line
/// 6. Trim leading and trailing blank space
///
/// The result carries no trailing newline: the assembler owns block
/// separation. An all-whitespace completion comes back empty.
pub fn clean_generated_text(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = remove_invisible_chars(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 5: Collapse blank-line runs ─────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}
