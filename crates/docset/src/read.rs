/// Read path: streaming decode of block content.
///
/// Every decoder walks a content buffer once, front to back, keeping the set
/// of open scopes and the running word count up to date as it goes. Filters
/// and predicates are evaluated per item, after that item's own effect on
/// the open set, so a `verse/1` start is inside verse 1 and its end is not.
use anyhow::{Context, Result};
use buffer::ByteBuffer;
use enums::EnumTables;
use items::{chapter_number, decode_item, verse_number, Item, ItemCursor, ItemKind, TokenKind};
use std::collections::HashSet;

use crate::cv_index::{ChapterSpan, VerseOccurrence};
use crate::cv_ref::CvRef;
use crate::model::{Block, Document, Sequence};

/// Which item kinds a decoder returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemFilter {
    pub tokens: bool,
    pub scopes: bool,
    pub grafts: bool,
}

impl ItemFilter {
    pub const ALL: ItemFilter = ItemFilter {
        tokens: true,
        scopes: true,
        grafts: true,
    };

    pub const TOKENS: ItemFilter = ItemFilter {
        tokens: true,
        scopes: false,
        grafts: false,
    };

    #[must_use]
    pub fn accepts(&self, kind: ItemKind) -> bool {
        match kind {
            ItemKind::Token => self.tokens,
            ItemKind::StartScope | ItemKind::EndScope => self.scopes,
            ItemKind::Graft => self.grafts,
        }
    }
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub filter: ItemFilter,
    /// Attach the running word-like token count to each token.
    pub with_positions: bool,
    /// Attach the labels of the open scopes to each token.
    pub with_scopes: bool,
}

impl DecodeOptions {
    /// Tokens only, with positions and open scopes.
    #[must_use]
    pub fn annotated_tokens() -> Self {
        Self {
            filter: ItemFilter::TOKENS,
            with_positions: true,
            with_scopes: true,
        }
    }
}

/// Labels of the currently open scopes, in the order they were opened.
///
/// A label is open at most once. Opening an open label again is tolerated
/// and changes nothing; closing a label that is not open is a no-op, since
/// edits may have removed the matching start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenScopes {
    labels: Vec<String>,
}

impl OpenScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the set from a block's `os` buffer.
    pub fn from_block(block: &Block, enums: &EnumTables) -> Result<Self> {
        let mut open = Self::new();
        for entry in ItemCursor::new(&block.os) {
            let (pos, _) = entry?;
            if let (Item::StartScope(label), _) = decode_item(&block.os, pos, enums)? {
                open.open(&label);
            }
        }
        Ok(open)
    }

    pub fn open(&mut self, label: &str) {
        if self.contains(label) {
            tracing::debug!(label, "scope already open");
            return;
        }
        self.labels.push(label.to_string());
    }

    pub fn close(&mut self, label: &str) {
        self.labels.retain(|l| l != label);
    }

    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Numbers of the open `chapter/<n>` scopes.
    #[must_use]
    pub fn chapters(&self) -> Vec<u32> {
        self.labels.iter().filter_map(|l| chapter_number(l)).collect()
    }

    /// Numbers of the open `verse/<n>` scopes.
    #[must_use]
    pub fn verses(&self) -> Vec<u32> {
        self.labels.iter().filter_map(|l| verse_number(l)).collect()
    }
}

/// Scope predicate for [`decode_pruned_items`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeMatch {
    /// Every label must be open.
    All(Vec<String>),
    /// At least one label must be open.
    Any(Vec<String>),
}

impl ScopeMatch {
    #[must_use]
    pub fn matches(&self, open: &OpenScopes) -> bool {
        match self {
            ScopeMatch::All(labels) => labels.iter().all(|l| open.contains(l)),
            ScopeMatch::Any(labels) => labels.iter().any(|l| open.contains(l)),
        }
    }
}

/// Decoder state carried from item to item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeState {
    pub open: OpenScopes,
    /// Word-like tokens seen so far.
    pub position: u32,
}

impl DecodeState {
    /// State at the start of `block`: its open scopes and token offset.
    pub fn for_block(block: &Block, enums: &EnumTables) -> Result<Self> {
        Ok(Self {
            open: OpenScopes::from_block(block, enums)?,
            position: block.token_offset()?,
        })
    }
}

/// Inclusive range of item ordinals to emit.
type ItemRange = (usize, usize);

fn walk<F>(
    buf: &ByteBuffer,
    enums: &EnumTables,
    options: &DecodeOptions,
    state: &mut DecodeState,
    range: Option<ItemRange>,
    mut keep: F,
) -> Result<Vec<Item>>
where
    F: FnMut(&Item, &OpenScopes) -> Result<bool>,
{
    let mut out = Vec::new();
    for (i, entry) in ItemCursor::new(buf).enumerate() {
        if range.is_some_and(|(_, hi)| i > hi) {
            break;
        }
        let (pos, _) = entry?;
        let (mut item, _) = decode_item(buf, pos, enums)?;
        let position = state.position;
        match &item {
            Item::StartScope(label) => state.open.open(label),
            Item::EndScope(label) => state.open.close(label),
            Item::Token(t) if t.kind == TokenKind::WordLike => state.position += 1,
            _ => {}
        }
        if range.is_some_and(|(lo, _)| i < lo) || !options.filter.accepts(item.kind()) {
            continue;
        }
        if !keep(&item, &state.open)? {
            continue;
        }
        if let Item::Token(t) = &mut item {
            if options.with_positions {
                t.position = Some(position);
            }
            if options.with_scopes {
                t.scopes = Some(state.open.labels().to_vec());
            }
        }
        out.push(item);
    }
    Ok(out)
}

/// Decodes every item of `buf` that passes the kind filter.
pub fn decode_items(
    buf: &ByteBuffer,
    enums: &EnumTables,
    options: &DecodeOptions,
    state: &mut DecodeState,
) -> Result<Vec<Item>> {
    walk(buf, enums, options, state, None, |_, _| Ok(true))
}

/// Like [`decode_items`], keeping only items inside the required scopes and,
/// when `allowed` is given, only tokens whose text it contains.
pub fn decode_pruned_items(
    buf: &ByteBuffer,
    enums: &EnumTables,
    options: &DecodeOptions,
    state: &mut DecodeState,
    required: &ScopeMatch,
    allowed: Option<&HashSet<String>>,
) -> Result<Vec<Item>> {
    walk(buf, enums, options, state, None, |item, open| {
        let text_ok = match (item, allowed) {
            (Item::Token(t), Some(set)) => set.contains(&t.chars),
            _ => true,
        };
        Ok(text_ok && required.matches(open))
    })
}

/// Like [`decode_items`], keeping only items inside the chapter/verse
/// `reference` (see [`CvRef`] for the accepted forms).
///
/// # Errors
///
/// Fails on a malformed reference, and for cross-chapter references when
/// more than one chapter is open at an item.
pub fn decode_items_for_cv(
    buf: &ByteBuffer,
    enums: &EnumTables,
    options: &DecodeOptions,
    state: &mut DecodeState,
    reference: &str,
) -> Result<Vec<Item>> {
    let cv: CvRef = reference.parse()?;
    walk(buf, enums, options, state, None, |_, open| {
        cv.matches(&open.chapters(), &open.verses())
    })
}

impl Block {
    /// Decodes the block content, seeded with the block's own open scopes
    /// and token offset.
    pub fn decode(&self, enums: &EnumTables, options: &DecodeOptions) -> Result<Vec<Item>> {
        let mut state = DecodeState::for_block(self, enums)?;
        decode_items(&self.c, enums, options, &mut state)
    }

    /// The block-scope label, e.g. `blockTag/p`.
    pub fn block_scope(&self, enums: &EnumTables) -> Result<String> {
        match decode_item(&self.bs, 0, enums)?.0 {
            Item::StartScope(label) => Ok(label),
            other => anyhow::bail!("block scope holds {:?}", other.kind()),
        }
    }

    /// Block-level grafts.
    pub fn grafts(&self, enums: &EnumTables) -> Result<Vec<Item>> {
        let mut state = DecodeState::default();
        decode_items(&self.bg, enums, &DecodeOptions::default(), &mut state)
    }
}

/// Decodes the items between two `(block, item)` positions, inclusive.
fn slice(
    seq: &Sequence,
    enums: &EnumTables,
    options: &DecodeOptions,
    start: (u32, u32),
    end: (u32, u32),
) -> Result<Vec<Item>> {
    let mut out = Vec::new();
    for b in start.0..=end.0 {
        let block = seq
            .blocks
            .get(b as usize)
            .with_context(|| format!("index points at missing block {} of {}", b, seq.id))?;
        let lo = if b == start.0 { start.1 as usize } else { 0 };
        let hi = if b == end.0 { end.1 as usize } else { usize::MAX };
        let mut state = DecodeState::for_block(block, enums)?;
        out.extend(walk(&block.c, enums, options, &mut state, Some((lo, hi)), |_, _| Ok(true))?);
    }
    Ok(out)
}

impl Document {
    /// Items of one chapter, located through the chapter/verse index.
    pub fn items_for_chapter(
        &self,
        enums: &EnumTables,
        chapter: u32,
        options: &DecodeOptions,
    ) -> Result<Vec<Item>> {
        let main = self.main_sequence()?;
        let Some(index) = &main.cv_index else {
            anyhow::bail!("document {} has no chapter/verse index", self.id);
        };
        match index.chapter_index(chapter)? {
            Some(ChapterSpan {
                start_block,
                start_item,
                end_block,
                end_item,
                ..
            }) => slice(main, enums, options, (start_block, start_item), (end_block, end_item)),
            None => Ok(Vec::new()),
        }
    }

    /// Items of every occurrence of one verse, in document order.
    pub fn items_for_verse(
        &self,
        enums: &EnumTables,
        chapter: u32,
        verse: u32,
        options: &DecodeOptions,
    ) -> Result<Vec<Item>> {
        let main = self.main_sequence()?;
        let Some(index) = &main.cv_index else {
            anyhow::bail!("document {} has no chapter/verse index", self.id);
        };
        let mut out = Vec::new();
        for VerseOccurrence {
            start_block,
            start_item,
            end_block,
            end_item,
            ..
        } in index.verse_occurrences(chapter, verse, enums)?
        {
            out.extend(slice(main, enums, options, (start_block, start_item), (end_block, end_item))?);
        }
        Ok(out)
    }
}
