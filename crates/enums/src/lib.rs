//! # Enums - deduplicated string tables
//!
//! Encoded items never store text inline. Every string is interned into one of
//! five per-category tables and referenced by its integer index.
//!
//! ## Lifecycle
//!
//! ```text
//!  record()  ──>  provisional table  (string -> {index, frequency})
//!                       │
//!  build_enums()        v
//!                 frozen table       [len: u8][utf8] [len: u8][utf8] ...   (dirty)
//!                       │
//!  build_enum_indexes() v
//!                 offset index + reverse map                               (clean)
//! ```
//!
//! A frozen table keeps the provisional insertion order, so frozen position
//! `i` holds the string whose provisional index was `i`.
//!
//! Reads ([`EnumTables::lookup`], [`EnumTables::string`]) on a dirty category
//! fail with [`EnumError::StaleIndex`]; the index must be rebuilt first.
//!
//! [`EnumTables::lookup`] never mutates. Adding a value that is not yet in a
//! frozen table is only possible through [`EnumTables::intern`].

use buffer::{BufferError, ByteBuffer, MAX_COUNTED_STRING};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The string categories. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnumCategory {
    /// Sequence identifiers (graft targets).
    Ids,
    /// Text of word-like tokens.
    WordLike,
    /// Text of every other token.
    NotWordLike,
    /// Components of scope labels.
    ScopeBits,
    /// Graft kinds.
    GraftTypes,
}

impl EnumCategory {
    pub const ALL: [EnumCategory; 5] = [
        EnumCategory::Ids,
        EnumCategory::WordLike,
        EnumCategory::NotWordLike,
        EnumCategory::ScopeBits,
        EnumCategory::GraftTypes,
    ];

    /// Name used in the persisted form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EnumCategory::Ids => "ids",
            EnumCategory::WordLike => "wordLike",
            EnumCategory::NotWordLike => "notWordLike",
            EnumCategory::ScopeBits => "scopeBits",
            EnumCategory::GraftTypes => "graftTypes",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EnumCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnumCategory {
    type Err = EnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EnumCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| EnumError::UnknownCategory(s.to_string()))
    }
}

/// Errors raised by enum table operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnumError {
    #[error("unknown enum category '{0}'")]
    UnknownCategory(String),

    #[error("value '{value}' not found in enum category {category}")]
    UnknownValue { category: EnumCategory, value: String },

    #[error("index {index} out of range for enum category {category} ({len} entries)")]
    IndexOutOfRange {
        category: EnumCategory,
        index: u32,
        len: usize,
    },

    #[error("enum category {0} was rebuilt and its index is stale")]
    StaleIndex(EnumCategory),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

pub type Result<T> = std::result::Result<T, EnumError>;

/// Provisional index and occurrence count of a recorded string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreEnumEntry {
    pub index: u32,
    pub frequency: u32,
}

/// Mutable provisional table for one category.
#[derive(Debug, Default, Clone)]
pub struct PreEnum {
    entries: HashMap<String, PreEnumEntry>,
    /// Keys in insertion order (= provisional index order).
    order: Vec<String>,
}

impl PreEnum {
    /// Records one occurrence of `value`, returning its provisional index.
    pub fn record(&mut self, value: &str) -> u32 {
        if let Some(e) = self.entries.get_mut(value) {
            e.frequency += 1;
            return e.index;
        }
        let index = self.order.len() as u32;
        self.entries
            .insert(value.to_string(), PreEnumEntry { index, frequency: 1 });
        self.order.push(value.to_string());
        index
    }

    #[must_use]
    pub fn get(&self, value: &str) -> Option<&PreEnumEntry> {
        self.entries.get(value)
    }

    /// Keys in provisional index order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Serialized table for one category plus its derived index.
#[derive(Debug, Clone)]
struct FrozenTable {
    buf: ByteBuffer,
    /// Byte offset of each entry, by index.
    offsets: Vec<usize>,
    /// Reverse map, string -> index.
    lookup: HashMap<String, u32>,
    /// Set when `buf` changed without the index being rebuilt.
    dirty: bool,
    /// Set once the table has been built or loaded.
    built: bool,
}

impl FrozenTable {
    fn new(capacity: usize) -> Self {
        Self {
            buf: ByteBuffer::with_capacity(capacity),
            offsets: Vec::new(),
            lookup: HashMap::new(),
            dirty: false,
            built: false,
        }
    }
}

/// The five category tables of a document set.
#[derive(Debug, Clone)]
pub struct EnumTables {
    pre: [PreEnum; 5],
    frozen: [FrozenTable; 5],
    capacity: usize,
}

impl EnumTables {
    pub fn new() -> Self {
        Self::with_capacity(buffer::DEFAULT_CAPACITY)
    }

    /// Creates empty tables whose frozen buffers start at `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pre: Default::default(),
            frozen: std::array::from_fn(|_| FrozenTable::new(capacity)),
            capacity,
        }
    }

    // ---- Provisional phase ----

    /// Records one occurrence of `value` in `category`.
    pub fn record(&mut self, category: EnumCategory, value: &str) -> u32 {
        self.pre[category.slot()].record(value)
    }

    #[must_use]
    pub fn pre_enum(&self, category: EnumCategory) -> &PreEnum {
        &self.pre[category.slot()]
    }

    /// Drops every provisional table.
    pub fn reset_pre_enums(&mut self) {
        for p in self.pre.iter_mut() {
            *p = PreEnum::default();
        }
    }

    // ---- Freezing ----

    /// Serializes the provisional table of `category`, replacing any frozen
    /// table. Strings longer than 255 bytes are truncated. The category is
    /// left dirty until [`build_enum_index`](Self::build_enum_index) runs.
    pub fn build_enum(&mut self, category: EnumCategory) -> Result<()> {
        let mut buf = ByteBuffer::with_capacity(self.capacity);
        let mut written = HashSet::new();
        for key in self.pre[category.slot()].keys() {
            let value = truncate_to_limit(category, key);
            // a long string and its truncated form share one entry
            if written.insert(value) {
                buf.push_counted_string(value)?;
            }
        }
        let table = &mut self.frozen[category.slot()];
        table.buf = buf;
        table.dirty = true;
        table.built = true;
        Ok(())
    }

    /// Freezes every category.
    pub fn build_enums(&mut self) -> Result<()> {
        for c in EnumCategory::ALL {
            self.build_enum(c)?;
        }
        Ok(())
    }

    /// Rebuilds the offset index and reverse map of `category`.
    pub fn build_enum_index(&mut self, category: EnumCategory) -> Result<()> {
        let table = &mut self.frozen[category.slot()];
        let mut offsets = Vec::new();
        let mut lookup = HashMap::new();
        let mut pos = 0;
        while pos < table.buf.len() {
            let s = table.buf.counted_string(pos)?;
            lookup
                .entry(s.to_string())
                .or_insert(offsets.len() as u32);
            offsets.push(pos);
            pos += 1 + s.len();
        }
        table.offsets = offsets;
        table.lookup = lookup;
        table.dirty = false;
        Ok(())
    }

    pub fn build_enum_indexes(&mut self) -> Result<()> {
        for c in EnumCategory::ALL {
            self.build_enum_index(c)?;
        }
        Ok(())
    }

    /// Installs a persisted frozen table and indexes it.
    pub fn load_frozen(&mut self, category: EnumCategory, buf: ByteBuffer) -> Result<()> {
        let previous = std::mem::replace(&mut self.frozen[category.slot()].buf, buf);
        if let Err(e) = self.build_enum_index(category) {
            self.frozen[category.slot()].buf = previous;
            return Err(e);
        }
        self.frozen[category.slot()].built = true;
        Ok(())
    }

    /// `true` once any category has been frozen or loaded.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.iter().any(|t| t.built)
    }

    // ---- Reads ----

    /// Read-only lookup of `value`. Unknown values are an error.
    ///
    /// Overlong values are matched by their truncated form, the same form
    /// the table stores.
    pub fn lookup(&self, category: EnumCategory, value: &str) -> Result<u32> {
        let table = self.clean(category)?;
        table
            .lookup
            .get(clip(value))
            .copied()
            .ok_or_else(|| EnumError::UnknownValue {
                category,
                value: value.to_string(),
            })
    }

    /// Returns the index of `value`, appending it to the frozen table first
    /// if it is not there yet.
    pub fn intern(&mut self, category: EnumCategory, value: &str) -> Result<u32> {
        match self.lookup(category, value) {
            Err(EnumError::UnknownValue { .. }) => {}
            other => return other,
        }
        let value = truncate_to_limit(category, value);
        let table = &mut self.frozen[category.slot()];
        let pos = table.buf.len();
        table.buf.push_counted_string(value)?;
        let index = table.offsets.len() as u32;
        table.offsets.push(pos);
        table.lookup.insert(value.to_string(), index);
        table.built = true;
        Ok(index)
    }

    /// The string stored at `index`.
    pub fn string(&self, category: EnumCategory, index: u32) -> Result<&str> {
        let table = self.clean(category)?;
        let pos = *table
            .offsets
            .get(index as usize)
            .ok_or(EnumError::IndexOutOfRange {
                category,
                index,
                len: table.offsets.len(),
            })?;
        Ok(table.buf.counted_string(pos)?)
    }

    /// Number of frozen entries in `category`.
    #[must_use]
    pub fn len(&self, category: EnumCategory) -> usize {
        self.frozen[category.slot()].offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self, category: EnumCategory) -> bool {
        self.len(category) == 0
    }

    /// Frozen buffer of `category`, for persistence.
    #[must_use]
    pub fn frozen(&self, category: EnumCategory) -> &ByteBuffer {
        &self.frozen[category.slot()].buf
    }

    /// Trims every frozen buffer ahead of serialization.
    pub fn trim(&mut self) {
        for t in self.frozen.iter_mut() {
            t.buf.trim();
        }
    }

    fn clean(&self, category: EnumCategory) -> Result<&FrozenTable> {
        let table = &self.frozen[category.slot()];
        if table.dirty {
            return Err(EnumError::StaleIndex(category));
        }
        Ok(table)
    }
}

impl Default for EnumTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Cuts `s` to at most 255 bytes on a char boundary.
fn clip(s: &str) -> &str {
    if s.len() <= MAX_COUNTED_STRING {
        return s;
    }
    let mut end = MAX_COUNTED_STRING;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// [`clip`], with a warning when anything was cut.
fn truncate_to_limit(category: EnumCategory, s: &str) -> &str {
    let clipped = clip(s);
    if clipped.len() < s.len() {
        tracing::warn!(
            category = %category,
            bytes = s.len(),
            "enum string exceeds {} bytes, truncating",
            MAX_COUNTED_STRING
        );
    }
    clipped
}
