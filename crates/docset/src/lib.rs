//! # DocSet - succinct document store
//!
//! Ties the [`buffer`], [`enums`] and [`items`] crates together into a set of
//! encoded documents with chapter/verse indexes.
//!
//! ## Architecture
//!
//! ```text
//! RawDocument (lexer events)
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   DOCSET                      │
//! │                                               │
//! │ write.rs → intern strings → encode blocks     │
//! │              |                                │
//! │              v                                │
//! │ cv_index.rs → one scan of the main sequence   │
//! │                                               │
//! │ read.rs → decode, prune, chapter/verse filter │
//! │ rehash.rs → rebuild enums, rewrite blocks     │
//! │ serialize.rs → base64 / JSON persisted form   │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module          | Purpose                                              |
//! |-----------------|------------------------------------------------------|
//! | [`lib.rs`]      | `DocSet` struct, constructors, accessors             |
//! | [`model`]       | `Document`, `Sequence`, `Block`, block edits         |
//! | [`write`]       | raw input types, `add_document()`, tag validation    |
//! | [`cv_index`]    | chapter/verse index build and lookups                |
//! | [`presence`]    | word-like token presence bitset                      |
//! | [`cv_ref`]      | chapter/verse reference grammar                      |
//! | [`read`]        | streaming decoders and index-sliced reads            |
//! | [`rehash`]      | `rehash()`                                           |
//! | [`serialize`]   | persisted form                                       |
//!
//! All mutation takes `&mut self`: one writer at a time.

pub mod cv_index;
pub mod cv_ref;
pub mod model;
pub mod presence;
pub mod read;
mod rehash;
pub mod serialize;
pub mod write;

pub use cv_index::{ChapterSpan, CvIndex, VerseOccurrence};
pub use cv_ref::CvRef;
pub use model::{Block, Document, Sequence};
pub use presence::PresenceSet;
pub use read::{
    decode_items, decode_items_for_cv, decode_pruned_items, DecodeOptions, DecodeState,
    ItemFilter, OpenScopes, ScopeMatch,
};
pub use serialize::SerializedDocSet;
pub use write::{is_valid_tag, RawBlock, RawDocument, RawGraft, RawItem, RawSequence};

use anyhow::{bail, Context, Result};
use config::EngineConfig;
use enums::EnumTables;
use items::Item;
use std::collections::{BTreeMap, BTreeSet};

/// A set of documents sharing one set of enum tables.
pub struct DocSet {
    pub(crate) id: String,
    pub(crate) selectors: BTreeMap<String, String>,
    pub(crate) enums: EnumTables,
    pub(crate) docs: BTreeMap<String, Document>,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) config: EngineConfig,
}

impl std::fmt::Debug for DocSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocSet")
            .field("id", &self.id)
            .field("docs", &self.docs.len())
            .field("tags", &self.tags)
            .field("config", &self.config)
            .finish()
    }
}

impl DocSet {
    /// An empty set with the default configuration.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_config(id, EngineConfig::default())
    }

    pub fn with_config(id: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            id: id.into(),
            selectors: BTreeMap::new(),
            enums: EnumTables::with_capacity(config.enum_capacity),
            docs: BTreeMap::new(),
            tags: BTreeSet::new(),
            config,
        }
    }

    // ---- Accessors ----

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn enums(&self) -> &EnumTables {
        &self.enums
    }

    pub fn selectors(&self) -> &BTreeMap<String, String> {
        &self.selectors
    }

    pub fn set_selector(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.selectors.insert(key.into(), value.into());
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn add_tag(&mut self, tag: &str) -> Result<()> {
        if !is_valid_tag(tag) {
            bail!("invalid tag '{}'", tag);
        }
        self.tags.insert(tag.to_string());
        Ok(())
    }

    pub fn document(&self, doc_id: &str) -> Result<&Document> {
        self.docs
            .get(doc_id)
            .with_context(|| format!("document {} not found", doc_id))
    }

    pub fn document_ids(&self) -> impl Iterator<Item = &str> {
        self.docs.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Mutable access to a document together with the enum tables its
    /// edits need.
    pub fn document_mut(&mut self, doc_id: &str) -> Result<(&mut Document, &mut EnumTables)> {
        let doc = self
            .docs
            .get_mut(doc_id)
            .with_context(|| format!("document {} not found", doc_id))?;
        Ok((doc, &mut self.enums))
    }

    // ---- Edits ----

    pub fn delete_document(&mut self, doc_id: &str) -> Result<()> {
        if self.docs.remove(doc_id).is_none() {
            bail!("document {} not found", doc_id);
        }
        tracing::debug!(doc = doc_id, "deleted document");
        Ok(())
    }

    pub fn delete_sequence(&mut self, doc_id: &str, seq_id: &str) -> Result<()> {
        let (doc, enums) = self.document_mut(doc_id)?;
        doc.delete_sequence(enums, seq_id)
    }

    pub fn delete_block_item(
        &mut self,
        doc_id: &str,
        seq_id: &str,
        block: usize,
        item: usize,
    ) -> Result<()> {
        let (doc, enums) = self.document_mut(doc_id)?;
        doc.delete_block_item(enums, seq_id, block, item)
    }

    pub fn insert_block_items(
        &mut self,
        doc_id: &str,
        seq_id: &str,
        block: usize,
        item: usize,
        new_items: &[RawItem],
    ) -> Result<()> {
        let (doc, enums) = self.document_mut(doc_id)?;
        doc.insert_block_items(enums, seq_id, block, item, new_items)
    }

    /// Trims every buffer to its exact length.
    pub fn trim(&mut self) {
        self.enums.trim();
        for d in self.docs.values_mut() {
            d.trim();
        }
    }

    // ---- Index lookups ----

    fn cv_index(&self, doc_id: &str) -> Result<&CvIndex> {
        let doc = self.document(doc_id)?;
        doc.main_sequence()?
            .cv_index
            .as_ref()
            .with_context(|| format!("document {} has no chapter/verse index", doc_id))
    }

    pub fn chapter_index(&self, doc_id: &str, chapter: u32) -> Result<Option<ChapterSpan>> {
        self.cv_index(doc_id)?.chapter_index(chapter)
    }

    pub fn chapter_verse_index(
        &self,
        doc_id: &str,
        chapter: u32,
    ) -> Result<Vec<Vec<VerseOccurrence>>> {
        self.cv_index(doc_id)?.chapter_verse_index(chapter, &self.enums)
    }

    pub fn verse_occurrences(
        &self,
        doc_id: &str,
        chapter: u32,
        verse: u32,
    ) -> Result<Vec<VerseOccurrence>> {
        self.cv_index(doc_id)?
            .verse_occurrences(chapter, verse, &self.enums)
    }

    /// `true` if the word-like string `word` occurs in the main sequence of
    /// `doc_id`.
    pub fn has_word(&self, doc_id: &str, word: &str) -> Result<bool> {
        let index = self.cv_index(doc_id)?;
        Ok(match self.enums.lookup(enums::EnumCategory::WordLike, word) {
            Ok(i) => index.tokens_present().contains(i),
            Err(_) => false,
        })
    }

    // ---- Reads ----

    pub fn items_for_chapter(
        &self,
        doc_id: &str,
        chapter: u32,
        options: &DecodeOptions,
    ) -> Result<Vec<Item>> {
        self.document(doc_id)?
            .items_for_chapter(&self.enums, chapter, options)
    }

    pub fn items_for_verse(
        &self,
        doc_id: &str,
        chapter: u32,
        verse: u32,
        options: &DecodeOptions,
    ) -> Result<Vec<Item>> {
        self.document(doc_id)?
            .items_for_verse(&self.enums, chapter, verse, options)
    }

    /// Decodes one block of a sequence.
    pub fn block_items(
        &self,
        doc_id: &str,
        seq_id: &str,
        block: usize,
        options: &DecodeOptions,
    ) -> Result<Vec<Item>> {
        let seq = self.document(doc_id)?.sequence(seq_id)?;
        let b = seq
            .blocks
            .get(block)
            .with_context(|| format!("block {} out of range in {}", block, seq_id))?;
        b.decode(&self.enums, options)
    }
}

#[cfg(test)]
mod tests;
