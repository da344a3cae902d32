//! Per-chapter succinct mapping tables.
//!
//! One record per rule, in rule order:
//!
//! ```text
//! [len: u8 (6 bits)][kind: u8 0=cv 1=bcv][from_start][from_end]
//! [book_index (bcv only)][n_pairs][chapter, verse_start] * n_pairs
//! ```
//!
//! Everything after the two leading bytes is nbyte encoded.

use buffer::{ByteBuffer, RECORD_LENGTH_MASK};

use crate::books::{book_code, book_index};
use crate::parse::{MappingRule, VerseRange};
use crate::{Result, VersificationError};

/// Same-book record discriminant.
pub const RECORD_CV: u8 = 0;
/// Cross-book record discriminant.
pub const RECORD_BCV: u8 = 1;

/// Longest record a table may hold.
pub const MAX_RECORD_LENGTH: usize = RECORD_LENGTH_MASK as usize;

/// A decoded table record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRecord {
    pub from_start: u32,
    pub from_end: u32,
    /// Target book, `None` for same-book records.
    pub book: Option<&'static str>,
    /// `(chapter, verse_start)` per target.
    pub targets: Vec<(u32, u32)>,
}

/// Appends the record for `rule` to `table`.
pub fn push_rule(table: &mut ByteBuffer, rule: &MappingRule) -> Result<()> {
    let target_book = rule
        .target_book()
        .ok_or_else(|| VersificationError::MixedTargets(rule.from.book.clone()))?;
    let book = if target_book == rule.from.book {
        None
    } else {
        Some(
            book_index(target_book)
                .ok_or_else(|| VersificationError::UnknownBook(target_book.to_string()))?,
        )
    };

    let mut values = vec![rule.from.verse_start, rule.from.verse_end];
    values.extend(book);
    values.push(rule.to.len() as u32);
    for t in &rule.to {
        values.push(t.chapter);
        values.push(t.verse_start);
    }

    let start = table.len();
    table.push_byte(0);
    table.push_byte(if book.is_some() { RECORD_BCV } else { RECORD_CV });
    if let Err(e) = table.push_nbytes(&values) {
        table.truncate(start);
        return Err(e.into());
    }
    let length = table.len() - start;
    if length > MAX_RECORD_LENGTH {
        table.truncate(start);
        return Err(VersificationError::RecordTooLong {
            book: rule.from.book.clone(),
            chapter: rule.from.chapter,
            length,
        });
    }
    table.set_byte(start, length as u8)?;
    Ok(())
}

/// Decodes the record at `pos`, returning it with its length.
pub fn read_record(table: &ByteBuffer, pos: usize) -> Result<(MappingRecord, usize)> {
    let length = (table.byte(pos)? & RECORD_LENGTH_MASK) as usize;
    if length < 2 || pos + length > table.len() {
        return Err(VersificationError::Corrupt {
            pos,
            reason: format!("record length {}", length),
        });
    }
    let kind = table.byte(pos + 1)?;
    let mut p = pos + 2;
    let mut next = |table: &ByteBuffer| -> Result<u32> {
        let (v, n) = table.nbyte_with_length(p)?;
        p += n;
        Ok(v)
    };
    let from_start = next(table)?;
    let from_end = next(table)?;
    let book = match kind {
        RECORD_CV => None,
        RECORD_BCV => {
            let idx = next(table)?;
            Some(book_code(idx).ok_or_else(|| VersificationError::Corrupt {
                pos,
                reason: format!("book index {}", idx),
            })?)
        }
        other => {
            return Err(VersificationError::Corrupt {
                pos,
                reason: format!("record kind {}", other),
            })
        }
    };
    let n = next(table)?;
    let mut targets = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let chapter = next(table)?;
        let verse = next(table)?;
        targets.push((chapter, verse));
    }
    Ok((
        MappingRecord {
            from_start,
            from_end,
            book,
            targets,
        },
        length,
    ))
}

/// Every record of `table`, in order.
pub fn records(table: &ByteBuffer) -> Result<Vec<MappingRecord>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < table.len() {
        let (record, length) = read_record(table, pos)?;
        out.push(record);
        pos += length;
    }
    Ok(out)
}

/// Maps `(book, chapter, verse)` through one chapter's table.
///
/// The first record whose from-range holds `verse` decides; target verses
/// keep the offset of `verse` inside that range. Without a match the
/// reference maps to itself.
pub fn map_verse(
    table: &ByteBuffer,
    book: &str,
    chapter: u32,
    verse: u32,
) -> Result<(String, Vec<(u32, u32)>)> {
    let mut pos = 0;
    while pos < table.len() {
        let (record, length) = read_record(table, pos)?;
        if record.from_start <= verse && verse <= record.from_end {
            let offset = verse - record.from_start;
            let target_book = record.book.unwrap_or(book).to_string();
            let verses = record
                .targets
                .iter()
                .map(|&(c, v)| (c, v + offset))
                .collect();
            return Ok((target_book, verses));
        }
        pos += length;
    }
    Ok((book.to_string(), vec![(chapter, verse)]))
}

/// Rebuilds the rules a table was compiled from.
pub(crate) fn rules_for(table: &ByteBuffer, book: &str, chapter: u32) -> Result<Vec<MappingRule>> {
    let mut rules = Vec::new();
    for r in records(table)? {
        let span = r.from_end - r.from_start;
        let target_book = r.book.unwrap_or(book);
        rules.push(MappingRule {
            from: VerseRange {
                book: book.to_string(),
                chapter,
                verse_start: r.from_start,
                verse_end: r.from_end,
            },
            to: r
                .targets
                .iter()
                .map(|&(c, v)| VerseRange {
                    book: target_book.to_string(),
                    chapter: c,
                    verse_start: v,
                    verse_end: v + span,
                })
                .collect(),
        });
    }
    Ok(rules)
}
