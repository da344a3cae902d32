//! # Versification - verse remapping between numbering schemes
//!
//! Different traditions number the same text differently (Malachi 4 vs 3:19-24,
//! the Psalm titles, the Greek additions to Daniel...). A mapping file lists
//! the differences as rules; everything not covered by a rule maps to itself.
//!
//! Rules are grouped by the book and chapter of their *from* side and compiled
//! into one small [`ByteBuffer`] per chapter. Lookups scan that table linearly:
//! a chapter rarely carries more than a handful of rules.
//!
//! ## Example
//!
//! ```rust
//! use versification::VerseMapping;
//!
//! let m = VerseMapping::from_rules_text("MAL 4:1-6 = MAL 3:19").unwrap();
//! assert_eq!(m.map("MAL", 4, 2).unwrap(), ("MAL".to_string(), vec![(3, 20)]));
//! assert_eq!(m.map("MAL", 1, 1).unwrap(), ("MAL".to_string(), vec![(1, 1)]));
//! ```

pub mod books;
pub mod parse;
pub mod table;

pub use parse::{parse_rules, MappingRule, VerseRange};
pub use table::{map_verse, push_rule, records, MappingRecord};

use buffer::{BufferError, ByteBuffer};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while compiling or reading mapping tables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersificationError {
    #[error("descending verse range on mapping line {line}: {text}")]
    BadRange { line: usize, text: String },

    #[error("mapping record for {book} {chapter} is {length} bytes, limit is 63")]
    RecordTooLong {
        book: String,
        chapter: u32,
        length: usize,
    },

    #[error("unknown book code '{0}'")]
    UnknownBook(String),

    #[error("mapping from {0} names more than one target book")]
    MixedTargets(String),

    #[error("corrupt mapping record at position {pos}: {reason}")]
    Corrupt { pos: usize, reason: String },

    #[error("invalid chapter key '{0}'")]
    BadChapterKey(String),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

pub type Result<T> = std::result::Result<T, VersificationError>;

/// Compiled tables keyed by book, then chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerseMapping {
    tables: BTreeMap<String, BTreeMap<u32, ByteBuffer>>,
}

impl VerseMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and compiles a rule file.
    pub fn from_rules_text(text: &str) -> Result<Self> {
        Self::compile(&parse_rules(text)?)
    }

    /// Compiles `rules`, keeping their order within each chapter.
    pub fn compile(rules: &[MappingRule]) -> Result<Self> {
        let mut tables: BTreeMap<String, BTreeMap<u32, ByteBuffer>> = BTreeMap::new();
        for rule in rules {
            let table = tables
                .entry(rule.from.book.clone())
                .or_default()
                .entry(rule.from.chapter)
                .or_insert_with(|| ByteBuffer::with_capacity(64));
            push_rule(table, rule)?;
        }
        for chapters in tables.values_mut() {
            for t in chapters.values_mut() {
                t.trim();
            }
        }
        Ok(Self { tables })
    }

    /// The compiled table for one chapter, if it has any rules.
    #[must_use]
    pub fn table(&self, book: &str, chapter: u32) -> Option<&ByteBuffer> {
        self.tables.get(book)?.get(&chapter)
    }

    /// Maps a reference; chapters without a table map to themselves.
    pub fn map(&self, book: &str, chapter: u32, verse: u32) -> Result<(String, Vec<(u32, u32)>)> {
        match self.table(book, chapter) {
            Some(t) => map_verse(t, book, chapter, verse),
            None => Ok((book.to_string(), vec![(chapter, verse)])),
        }
    }

    /// Builds the inverse mapping: each target range maps back to the start
    /// of the range it came from.
    pub fn reversed(&self) -> Result<Self> {
        let mut inverse = Vec::new();
        for (book, chapters) in &self.tables {
            for (&chapter, t) in chapters {
                for rule in table::rules_for(t, book, chapter)? {
                    for target in &rule.to {
                        inverse.push(MappingRule {
                            from: target.clone(),
                            to: vec![VerseRange {
                                book: rule.from.book.clone(),
                                chapter: rule.from.chapter,
                                verse_start: rule.from.verse_start,
                                verse_end: rule.from.verse_end,
                            }],
                        });
                    }
                }
            }
        }
        Self::compile(&inverse)
    }

    /// Number of books with at least one rule.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Persisted form: book -> chapter -> base64 table.
    #[must_use]
    pub fn to_serialized(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.tables
            .iter()
            .map(|(book, chapters)| {
                let inner = chapters
                    .iter()
                    .map(|(c, t)| (c.to_string(), t.to_base64()))
                    .collect();
                (book.clone(), inner)
            })
            .collect()
    }

    pub fn from_serialized(data: &BTreeMap<String, BTreeMap<String, String>>) -> Result<Self> {
        let mut tables = BTreeMap::new();
        for (book, chapters) in data {
            let mut inner = BTreeMap::new();
            for (c, text) in chapters {
                let chapter: u32 = c
                    .parse()
                    .map_err(|_| VersificationError::BadChapterKey(c.clone()))?;
                let t = ByteBuffer::from_base64(text)?;
                // validate eagerly so lookups never meet a corrupt table
                records(&t)?;
                inner.insert(chapter, t);
            }
            tables.insert(book.clone(), inner);
        }
        Ok(Self { tables })
    }
}
