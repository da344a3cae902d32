//! # Chapter/verse index
//!
//! Built by one forward scan over the blocks of a main sequence. The result
//! is two succinct tables per chapter plus a token presence set:
//!
//! ```text
//! chapters[n]        one record: the whole chapter span
//! chapter_verses[n]  records for verse 0, 1, 2, ... max, in verse order
//!                    (several records per verse when it occurs more than
//!                    once, one empty record for an absent verse)
//! ```
//!
//! Every record starts with a header byte followed by nbyte integers:
//!
//! ```text
//! [type: 2 bits][last: 1 bit][length: 5 bits]
//!
//! type 0  empty   (verse tables only, 1 byte)
//! type 1  short   block, start_item, end_item, next_token [, verses_label]
//! type 2  long    start_block, start_item, end_block, end_item, next_token [, verses_label]
//! ```
//!
//! Type, `last` and a 6-bit length would need 9 bits, so the length gets
//! the remaining 5. The longest record (long, six 4-byte nbytes plus the
//! header) is 25 bytes, which fits.
//!
//! `last` marks the final record of a verse. Positions are `(block, item)`
//! pairs, where `item` is the ordinal of a content item inside its block,
//! and spans are inclusive at both ends. `next_token` is the number of
//! word-like tokens before the span starts. The verses label is a
//! `scopeBits` index and only appears in verse tables.
//!
//! The index is derived data. Any edit to the main sequence rebuilds it
//! from scratch.

use anyhow::{bail, Context, Result};
use buffer::ByteBuffer;
use enums::{EnumCategory, EnumTables};
use items::{chapter_number, scope_label, verse_number, ItemCursor, ItemKind, TokenKind};
use std::collections::BTreeMap;

use crate::model::Sequence;
use crate::presence::PresenceSet;

pub const RECORD_EMPTY: u8 = 0;
pub const RECORD_SHORT: u8 = 1;
pub const RECORD_LONG: u8 = 2;

const LAST_FLAG: u8 = 0x20;
const LENGTH_MASK: u8 = 0x1F;
const EMPTY_RECORD: u8 = (RECORD_EMPTY << 6) | LAST_FLAG | 1;

/// Span of a whole chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterSpan {
    pub start_block: u32,
    pub start_item: u32,
    pub end_block: u32,
    pub end_item: u32,
    pub next_token: u32,
}

/// One occurrence of a verse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseOccurrence {
    pub start_block: u32,
    pub start_item: u32,
    pub end_block: u32,
    pub end_item: u32,
    pub next_token: u32,
    /// Label of the enclosing `verses` scope, e.g. `4-5`, or the verse
    /// number itself.
    pub verses_label: String,
}

/// Succinct chapter and verse tables of one main sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CvIndex {
    pub(crate) chapters: BTreeMap<u32, ByteBuffer>,
    pub(crate) chapter_verses: BTreeMap<u32, ByteBuffer>,
    pub(crate) tokens_present: PresenceSet,
}

type Pos = (u32, u32);

#[derive(Debug)]
struct Span {
    start: Pos,
    end: Option<Pos>,
    next_token: u32,
}

#[derive(Debug)]
struct VerseSpan {
    span: Span,
    label: Option<String>,
}

#[derive(Debug)]
struct ChapterBuild {
    span: Span,
    verses: BTreeMap<u32, Vec<VerseSpan>>,
    /// Label of the `verses` scope currently open in this chapter.
    verses_label: Option<String>,
    /// A token or graft was seen since the chapter started.
    has_content: bool,
}

/// State of a single scan.
#[derive(Debug, Default)]
struct Scan {
    chapters: BTreeMap<u32, ChapterBuild>,
    current: Option<u32>,
    /// Open verse records: verse -> (chapter, record index).
    open_verses: BTreeMap<u32, (u32, usize)>,
    tokens: u32,
    /// Position of the last item visited.
    last: Option<Pos>,
}

impl Scan {
    fn start_scope(&mut self, label: &str, here: Pos) {
        if let Some(n) = chapter_number(label) {
            if self.chapters.contains_key(&n) {
                tracing::debug!(chapter = n, "chapter started again, replacing earlier record");
                self.open_verses.retain(|_, (ch, _)| *ch != n);
            }
            self.chapters.insert(
                n,
                ChapterBuild {
                    span: Span {
                        start: here,
                        end: None,
                        next_token: self.tokens,
                    },
                    verses: BTreeMap::new(),
                    verses_label: None,
                    has_content: false,
                },
            );
            self.current = Some(n);
        } else if let Some(v) = verse_number(label) {
            if let Some((ch, idx)) = self.open_verses.remove(&v) {
                tracing::debug!(verse = v, "verse started again while open, closing earlier record");
                let end = self.last.unwrap_or(here);
                self.close_verse(ch, v, idx, end);
            }
            let Some(ch) = self.current else {
                tracing::debug!(label, "verse outside any chapter, skipping");
                return;
            };
            let Some(chapter) = self.chapters.get_mut(&ch) else {
                return;
            };
            if v == 1 && chapter.has_content && chapter.verses.is_empty() {
                chapter.verses.insert(
                    0,
                    vec![VerseSpan {
                        span: Span {
                            start: chapter.span.start,
                            end: self.last,
                            next_token: chapter.span.next_token,
                        },
                        label: Some("0".to_string()),
                    }],
                );
            }
            let records = chapter.verses.entry(v).or_default();
            records.push(VerseSpan {
                span: Span {
                    start: here,
                    end: None,
                    next_token: self.tokens,
                },
                label: None,
            });
            self.open_verses.insert(v, (ch, records.len() - 1));
        } else if let Some(range) = label.strip_prefix("verses/") {
            if let Some(chapter) = self.current.and_then(|ch| self.chapters.get_mut(&ch)) {
                chapter.verses_label = Some(range.to_string());
            }
        } else if label.starts_with("chapter/") || label.starts_with("verse/") {
            tracing::debug!(label, "non-numeric chapter or verse scope, skipping");
        }
    }

    fn end_scope(&mut self, label: &str, here: Pos) {
        if let Some(n) = chapter_number(label) {
            match self.chapters.get_mut(&n) {
                Some(c) if c.span.end.is_none() => c.span.end = Some(here),
                _ => {
                    tracing::debug!(chapter = n, "end of chapter that is not open");
                    return;
                }
            }
            // verses left open end with their chapter
            let dangling: Vec<(u32, usize)> = self
                .open_verses
                .iter()
                .filter(|(_, (ch, _))| *ch == n)
                .map(|(&v, &(_, idx))| (v, idx))
                .collect();
            for (v, idx) in dangling {
                self.open_verses.remove(&v);
                self.close_verse(n, v, idx, here);
            }
        } else if let Some(v) = verse_number(label) {
            match self.open_verses.remove(&v) {
                Some((ch, idx)) => self.close_verse(ch, v, idx, here),
                None => tracing::debug!(verse = v, "end of verse that is not open"),
            }
        } else if label.starts_with("verses/") {
            if let Some(chapter) = self.current.and_then(|ch| self.chapters.get_mut(&ch)) {
                chapter.verses_label = None;
            }
        }
    }

    fn close_verse(&mut self, ch: u32, v: u32, idx: usize, here: Pos) {
        let Some(chapter) = self.chapters.get_mut(&ch) else {
            return;
        };
        let label = chapter
            .verses_label
            .clone()
            .unwrap_or_else(|| v.to_string());
        if let Some(record) = chapter.verses.get_mut(&v).and_then(|r| r.get_mut(idx)) {
            record.span.end = Some(here);
            record.label = Some(label);
        }
    }

    fn mark_content(&mut self) {
        if let Some(chapter) = self.current.and_then(|ch| self.chapters.get_mut(&ch)) {
            chapter.has_content = true;
        }
    }

    /// Closes whatever is still open at the last item.
    fn finish(&mut self) {
        let Some(last) = self.last else {
            return;
        };
        let open: Vec<(u32, (u32, usize))> = std::mem::take(&mut self.open_verses).into_iter().collect();
        for (v, (ch, idx)) in open {
            self.close_verse(ch, v, idx, last);
        }
        for chapter in self.chapters.values_mut() {
            if chapter.span.end.is_none() {
                chapter.span.end = Some(last);
            }
            for record in chapter.verses.values_mut().flatten() {
                if record.span.end.is_none() {
                    record.span.end = Some(last);
                }
            }
        }
    }
}

impl CvIndex {
    /// Scans `seq` and builds its index.
    ///
    /// Verses labels are interned into `scopeBits`. Nothing else in `enums`
    /// changes.
    pub fn build(seq: &Sequence, enums: &mut EnumTables) -> Result<Self> {
        let mut scan = Scan::default();
        let mut present = PresenceSet::with_len(enums.len(EnumCategory::WordLike));

        for (b, block) in seq.blocks.iter().enumerate() {
            for (i, entry) in ItemCursor::new(&block.c).enumerate() {
                let (pos, header) =
                    entry.with_context(|| format!("block {} of sequence {}", b, seq.id))?;
                let here = (b as u32, i as u32);
                match header.kind {
                    ItemKind::Token => {
                        if header.subtype == TokenKind::WordLike as u8 {
                            present.insert(block.c.nbyte(pos + 2)?);
                            scan.tokens += 1;
                        }
                        scan.mark_content();
                    }
                    ItemKind::Graft => scan.mark_content(),
                    ItemKind::StartScope => {
                        let label = scope_label(&block.c, pos, &header, enums)?;
                        scan.start_scope(&label, here);
                    }
                    ItemKind::EndScope => {
                        let label = scope_label(&block.c, pos, &header, enums)?;
                        scan.end_scope(&label, here);
                    }
                }
                scan.last = Some(here);
            }
        }
        scan.finish();

        let mut index = CvIndex {
            tokens_present: present,
            ..Default::default()
        };
        for (&n, chapter) in &scan.chapters {
            let mut table = ByteBuffer::with_capacity(8);
            let (start, end) = span_bounds(&chapter.span)?;
            push_span(&mut table, start, end, chapter.span.next_token, None, true)?;
            index.chapters.insert(n, table);

            let mut verses = ByteBuffer::with_capacity(64);
            let max_verse = chapter.verses.keys().next_back().copied().unwrap_or(0);
            for v in 0..=max_verse {
                let records = match chapter.verses.get(&v) {
                    Some(r) if !r.is_empty() => r,
                    _ => {
                        verses.push_byte(EMPTY_RECORD);
                        continue;
                    }
                };
                for (k, record) in records.iter().enumerate() {
                    let (start, end) = span_bounds(&record.span)?;
                    let text = record.label.clone().unwrap_or_else(|| v.to_string());
                    let label = enums.intern(EnumCategory::ScopeBits, &text)?;
                    let last = k + 1 == records.len();
                    push_span(&mut verses, start, end, record.span.next_token, Some(label), last)?;
                }
            }
            verses.trim();
            index.chapter_verses.insert(n, verses);
        }
        tracing::debug!(
            seq = %seq.id,
            chapters = index.chapters.len(),
            tokens = scan.tokens,
            "built chapter/verse index"
        );
        Ok(index)
    }

    /// Rebuilds an index from its persisted tables.
    pub fn from_parts(
        chapters: BTreeMap<u32, ByteBuffer>,
        chapter_verses: BTreeMap<u32, ByteBuffer>,
        tokens_present: PresenceSet,
    ) -> Result<Self> {
        let index = Self {
            chapters,
            chapter_verses,
            tokens_present,
        };
        for (&n, t) in &index.chapters {
            read_table(t).with_context(|| format!("chapter table {}", n))?;
        }
        for (&n, t) in &index.chapter_verses {
            read_table(t).with_context(|| format!("verse table {}", n))?;
        }
        Ok(index)
    }

    /// Chapter numbers present in the index, ascending.
    pub fn chapter_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.chapters.keys().copied()
    }

    pub fn chapter_table(&self, chapter: u32) -> Option<&ByteBuffer> {
        self.chapters.get(&chapter)
    }

    pub fn verse_table(&self, chapter: u32) -> Option<&ByteBuffer> {
        self.chapter_verses.get(&chapter)
    }

    #[must_use]
    pub fn tokens_present(&self) -> &PresenceSet {
        &self.tokens_present
    }

    /// The span of `chapter`, decoded straight from its table.
    pub fn chapter_index(&self, chapter: u32) -> Result<Option<ChapterSpan>> {
        let Some(table) = self.chapters.get(&chapter) else {
            return Ok(None);
        };
        let Some((rec, _)) = read_table(table)?.into_iter().next() else {
            bail!("empty chapter table for chapter {}", chapter);
        };
        let Some(rec) = rec else {
            bail!("chapter table for chapter {} holds an empty record", chapter);
        };
        Ok(Some(ChapterSpan {
            start_block: rec.start_block,
            start_item: rec.start_item,
            end_block: rec.end_block,
            end_item: rec.end_item,
            next_token: rec.next_token,
        }))
    }

    /// Occurrences of every verse of `chapter`, indexed by verse number.
    /// Absent verses get an empty list.
    pub fn chapter_verse_index(
        &self,
        chapter: u32,
        enums: &EnumTables,
    ) -> Result<Vec<Vec<VerseOccurrence>>> {
        let Some(table) = self.chapter_verses.get(&chapter) else {
            return Ok(Vec::new());
        };
        let mut verses = Vec::new();
        let mut group = Vec::new();
        for (rec, last) in read_table(table)? {
            if let Some(rec) = rec {
                let label = match rec.label {
                    Some(idx) => enums.string(EnumCategory::ScopeBits, idx)?.to_string(),
                    None => bail!("verse record in chapter {} lacks a label", chapter),
                };
                group.push(VerseOccurrence {
                    start_block: rec.start_block,
                    start_item: rec.start_item,
                    end_block: rec.end_block,
                    end_item: rec.end_item,
                    next_token: rec.next_token,
                    verses_label: label,
                });
            }
            if last {
                verses.push(std::mem::take(&mut group));
            }
        }
        Ok(verses)
    }

    /// Occurrences of one verse.
    pub fn verse_occurrences(
        &self,
        chapter: u32,
        verse: u32,
        enums: &EnumTables,
    ) -> Result<Vec<VerseOccurrence>> {
        Ok(self
            .chapter_verse_index(chapter, enums)?
            .into_iter()
            .nth(verse as usize)
            .unwrap_or_default())
    }
}

fn span_bounds(span: &Span) -> Result<(Pos, Pos)> {
    match span.end {
        Some(end) => Ok((span.start, end)),
        None => bail!("span starting at {:?} was never closed", span.start),
    }
}

/// Appends one short or long record.
fn push_span(
    buf: &mut ByteBuffer,
    start: Pos,
    end: Pos,
    next_token: u32,
    label: Option<u32>,
    last: bool,
) -> Result<()> {
    let (kind, mut values) = if start.0 == end.0 {
        (RECORD_SHORT, vec![start.0, start.1, end.1, next_token])
    } else {
        (RECORD_LONG, vec![start.0, start.1, end.0, end.1, next_token])
    };
    values.extend(label);

    let at = buf.len();
    buf.push_byte(0);
    if let Err(e) = buf.push_nbytes(&values) {
        buf.truncate(at);
        return Err(e.into());
    }
    let length = buf.len() - at;
    if length > LENGTH_MASK as usize {
        buf.truncate(at);
        bail!("index record of {} bytes exceeds {}", length, LENGTH_MASK);
    }
    let flag = if last { LAST_FLAG } else { 0 };
    buf.set_byte(at, (kind << 6) | flag | length as u8)?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Record {
    start_block: u32,
    start_item: u32,
    end_block: u32,
    end_item: u32,
    next_token: u32,
    label: Option<u32>,
}

/// Decodes every record of a table as `(record, last)`; empty records
/// decode as `None`.
fn read_table(table: &ByteBuffer) -> Result<Vec<(Option<Record>, bool)>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < table.len() {
        let header = table.byte(pos)?;
        let length = (header & LENGTH_MASK) as usize;
        let last = header & LAST_FLAG != 0;
        if length == 0 || pos + length > table.len() {
            bail!("corrupt index record at {}: length {}", pos, length);
        }
        let mut values = Vec::with_capacity(6);
        let mut p = pos + 1;
        while p < pos + length {
            let (v, n) = table.nbyte_with_length(p)?;
            values.push(v);
            p += n;
        }
        if p != pos + length {
            bail!("index record at {} overruns its length", pos);
        }
        let rec = match (header >> 6, values.as_slice()) {
            (RECORD_EMPTY, []) => None,
            (RECORD_SHORT, &[block, start_item, end_item, next_token, ref rest @ ..]) => Some(Record {
                start_block: block,
                start_item,
                end_block: block,
                end_item,
                next_token,
                label: rest.first().copied(),
            }),
            (RECORD_LONG, &[start_block, start_item, end_block, end_item, next_token, ref rest @ ..]) => {
                Some(Record {
                    start_block,
                    start_item,
                    end_block,
                    end_item,
                    next_token,
                    label: rest.first().copied(),
                })
            }
            (kind, _) => bail!("corrupt index record at {}: type {} with {} values", pos, kind, values.len()),
        };
        out.push((rec, last));
        pos += length;
    }
    Ok(out)
}
