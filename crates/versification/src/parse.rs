//! Line-oriented rule format.
//!
//! ```text
//! # comment
//! GEN 31:55 = GEN 32:1
//! PSA 51:1-2 = PSA 51:3
//! MAL 4:1-6 = MAL 3:19
//! DAG 3:24-30 = DAN 3:91, DAN 4:1
//! ```
//!
//! Each side is `BOOK CHAPTER:VERSE[-VERSE]`. Lines that do not fit the
//! grammar are skipped. A line that fits the grammar but has a descending
//! verse range is an error.

use crate::books::book_index;
use crate::{Result, VersificationError};

/// A single `BOOK C:V[-V]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseRange {
    pub book: String,
    pub chapter: u32,
    pub verse_start: u32,
    pub verse_end: u32,
}

/// `FROM = TO[, TO...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    pub from: VerseRange,
    pub to: Vec<VerseRange>,
}

impl MappingRule {
    /// Book named by every target, if there is exactly one.
    #[must_use]
    pub fn target_book(&self) -> Option<&str> {
        let first = self.to.first()?.book.as_str();
        self.to.iter().all(|t| t.book == first).then_some(first)
    }
}

/// Parses every well-formed rule in `text`, in file order.
pub fn parse_rules(text: &str) -> Result<Vec<MappingRule>> {
    let mut rules = Vec::new();
    for (line_num, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_line(trimmed) {
            Some(Ok(rule)) => rules.push(rule),
            Some(Err(())) => {
                return Err(VersificationError::BadRange {
                    line: line_num + 1,
                    text: trimmed.to_string(),
                })
            }
            None => {
                tracing::trace!(line = line_num + 1, text = trimmed, "skipping malformed mapping line");
            }
        }
    }
    Ok(rules)
}

/// `None` when the line does not fit the grammar, `Some(Err(()))` when it
/// does but a range is descending.
fn parse_line(line: &str) -> Option<std::result::Result<MappingRule, ()>> {
    let (lhs, rhs) = line.split_once('=')?;
    let from = parse_side(lhs)?;
    let mut to = Vec::new();
    for part in rhs.split(',') {
        to.push(parse_side(part)?);
    }
    let rule = MappingRule {
        from: match from {
            Ok(r) => r,
            Err(()) => return Some(Err(())),
        },
        to: match to.into_iter().collect::<std::result::Result<Vec<_>, ()>>() {
            Ok(t) => t,
            Err(()) => return Some(Err(())),
        },
    };
    // targets must agree on one book, and a foreign book must be indexable
    let target = rule.target_book()?;
    if target != rule.from.book && book_index(target).is_none() {
        return None;
    }
    Some(Ok(rule))
}

fn parse_side(side: &str) -> Option<std::result::Result<VerseRange, ()>> {
    let mut parts = side.split_whitespace();
    let book = parts.next()?;
    let cv = parts.next()?;
    if parts.next().is_some() || book.contains(':') {
        return None;
    }
    let (chapter, verses) = cv.split_once(':')?;
    let chapter: u32 = chapter.parse().ok()?;
    let (verse_start, verse_end) = match verses.split_once('-') {
        Some((s, e)) => (s.parse().ok()?, e.parse().ok()?),
        None => {
            let v: u32 = verses.parse().ok()?;
            (v, v)
        }
    };
    if verse_end < verse_start {
        return Some(Err(()));
    }
    Some(Ok(VerseRange {
        book: book.to_string(),
        chapter,
        verse_start,
        verse_end,
    }))
}
