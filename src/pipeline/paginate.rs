//! Word-count-bounded chunking of one logical page.
//!
//! The same rule applies to every source: a page of at most
//! [`SINGLE_PART_MAX_WORDS`] words is emitted verbatim as part 1; a longer
//! page is cut into windows of [`WINDOW_WORDS`] words, left to right, with
//! only the last window allowed to be shorter. Words are runs of
//! non-whitespace, so the split is a pure function of the text.

use crate::output::TextPage;

/// Pages up to this many words are never split.
pub const SINGLE_PART_MAX_WORDS: usize = 800;

/// Window size for pages above [`SINGLE_PART_MAX_WORDS`].
pub const WINDOW_WORDS: usize = 1000;

/// Split one page's text into [`TextPage`]s numbered from part 1.
///
/// Windowed parts join their words with a single space; the original
/// whitespace is only kept for unsplit pages.
pub fn paginate(page_number: usize, text: &str) -> Vec<TextPage> {
    let words: Vec<&str> = text.split_whitespace().collect();

    if words.len() <= SINGLE_PART_MAX_WORDS {
        return vec![TextPage::whole(page_number, text)];
    }

    words
        .chunks(WINDOW_WORDS)
        .enumerate()
        .map(|(i, window)| TextPage::window(page_number, i + 1, window.join(" ")))
        .collect()
}

/// Paginate a sequence of physical pages, numbering them from 1.
pub fn paginate_all<I, S>(pages: I) -> Vec<TextPage>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pages
        .into_iter()
        .enumerate()
        .flat_map(|(i, text)| paginate(i + 1, text.as_ref()))
        .collect()
}
