//! Text folding shared by every rule-based matcher.

use std::ops::Range;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lower-cases text, strips diacritics and collapses whitespace.
///
/// Punctuation is kept so that clock times (`10:30`) and dates (`15/3`)
/// survive folding. `ñ` folds to `n`, so rules are written without it.
pub fn normalize(text: &str) -> String {
    FoldedText::new(text).folded
}

/// Like [`normalize`], but also drops punctuation.
///
/// Used for exact matching against small vocabularies where "¡Sí!" and
/// "si" must be the same word.
pub fn fold_words(text: &str) -> String {
    let spaced: String = normalize(text)
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Folded text that remembers where each byte came from.
///
/// Matching happens on the folded form; [`FoldedText::original`] maps a
/// matched range back so user-facing values (titles) keep their accents and
/// capitalisation.
#[derive(Debug, Clone)]
pub struct FoldedText<'a> {
    source: &'a str,
    folded: String,
    origin: Vec<usize>,
}

impl<'a> FoldedText<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut folded = String::with_capacity(source.len());
        let mut origin = Vec::with_capacity(source.len() + 1);
        let mut pending_space: Option<usize> = None;
        let mut last_end = 0;

        for (idx, c) in source.char_indices() {
            if c.is_whitespace() {
                if !folded.is_empty() && pending_space.is_none() {
                    pending_space = Some(idx);
                }
                continue;
            }
            if let Some(space_at) = pending_space.take() {
                folded.push(' ');
                origin.push(space_at);
            }
            for base in std::iter::once(c).nfd().filter(|ch| !is_combining_mark(*ch)) {
                for lower in base.to_lowercase() {
                    folded.push(lower);
                    origin.extend(std::iter::repeat(idx).take(lower.len_utf8()));
                }
            }
            last_end = idx + c.len_utf8();
        }
        origin.push(last_end);

        Self {
            source,
            folded,
            origin,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.folded
    }

    /// Byte offset in the source of a folded position.
    pub fn source_offset(&self, pos: usize) -> usize {
        self.origin[pos.min(self.folded.len())]
    }

    /// Original text behind a byte range of the folded text.
    pub fn original(&self, range: Range<usize>) -> &'a str {
        let end = range.end.min(self.folded.len());
        let start = range.start.min(end);
        let from = self.origin[start];
        let to = self.origin[end];
        if from <= to {
            &self.source[from..to]
        } else {
            ""
        }
    }
}
