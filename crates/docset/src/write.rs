/// Ingestion: raw lexer events → interned strings → encoded blocks.
///
/// The first document of a set records every string it uses, freezes the
/// tables and indexes them. Later documents intern into the frozen tables.
/// Either way the document is assembled against a copy of the tables and
/// nothing is installed unless the whole document encodes.
use anyhow::{bail, Context, Result};
use buffer::ByteBuffer;
use config::EngineConfig;
use enums::{EnumCategory, EnumTables};
use items::{push_graft, push_scope, push_token, ItemKind, ScopeLabel, TokenKind};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Block, Document, Sequence};
use crate::DocSet;

/// One content event from the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawItem {
    Token { kind: TokenKind, chars: String },
    StartScope(String),
    EndScope(String),
    Graft(RawGraft),
}

impl RawItem {
    pub fn token(kind: TokenKind, chars: impl Into<String>) -> Self {
        RawItem::Token {
            kind,
            chars: chars.into(),
        }
    }

    pub fn word(chars: impl Into<String>) -> Self {
        Self::token(TokenKind::WordLike, chars)
    }

    pub fn start(label: impl Into<String>) -> Self {
        RawItem::StartScope(label.into())
    }

    pub fn end(label: impl Into<String>) -> Self {
        RawItem::EndScope(label.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGraft {
    pub kind: String,
    pub seq_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawBlock {
    /// Label of the block scope, e.g. `blockTag/p`.
    pub block_scope: String,
    pub grafts: Vec<RawGraft>,
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawSequence {
    pub id: String,
    pub kind: String,
    pub tags: Vec<String>,
    pub blocks: Vec<RawBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawDocument {
    pub id: String,
    pub headers: BTreeMap<String, String>,
    pub main_id: String,
    pub tags: Vec<String>,
    pub sequences: Vec<RawSequence>,
}

/// `true` for tags of the form `name[:value]`, where `name` is a lowercase
/// ASCII letter followed by lowercase letters or digits.
#[must_use]
pub fn is_valid_tag(tag: &str) -> bool {
    let name = tag.split_once(':').map_or(tag, |(n, _)| n);
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && !tag[name.len()..].contains('\n')
}

pub(crate) fn validate_tags<'a>(tags: impl IntoIterator<Item = &'a String>) -> Result<BTreeSet<String>> {
    let mut out = BTreeSet::new();
    for t in tags {
        if !is_valid_tag(t) {
            bail!("invalid tag '{}'", t);
        }
        out.insert(t.clone());
    }
    Ok(out)
}

/// Every `(category, string)` an item references, in scan order.
fn item_strings(raw: &RawItem) -> Result<Vec<(EnumCategory, String)>> {
    Ok(match raw {
        RawItem::Token { kind, chars } => vec![(kind.category(), chars.clone())],
        RawItem::StartScope(label) | RawItem::EndScope(label) => {
            let parsed: ScopeLabel = label.parse()?;
            parsed
                .components
                .into_iter()
                .map(|c| (EnumCategory::ScopeBits, c))
                .collect()
        }
        RawItem::Graft(g) => vec![
            (EnumCategory::GraftTypes, g.kind.clone()),
            (EnumCategory::Ids, g.seq_id.clone()),
        ],
    })
}

/// Strings of a whole document in scan order: sequence ids, then per block
/// the block scope, grafts and content.
fn document_strings(raw: &RawDocument) -> Result<Vec<(EnumCategory, String)>> {
    let mut out: Vec<(EnumCategory, String)> = raw
        .sequences
        .iter()
        .map(|s| (EnumCategory::Ids, s.id.clone()))
        .collect();
    for seq in &raw.sequences {
        for block in &seq.blocks {
            out.extend(item_strings(&RawItem::StartScope(block.block_scope.clone()))?);
            for g in &block.grafts {
                out.extend(item_strings(&RawItem::Graft(g.clone()))?);
            }
            for item in &block.items {
                out.extend(item_strings(item)?);
            }
        }
    }
    Ok(out)
}

/// Makes sure every string `raw` references is in the frozen tables.
pub(crate) fn intern_item(enums: &mut EnumTables, raw: &RawItem) -> Result<()> {
    for (category, s) in item_strings(raw)? {
        enums.intern(category, &s)?;
    }
    Ok(())
}

fn push_label(buf: &mut ByteBuffer, enums: &EnumTables, kind: ItemKind, label: &str) -> Result<()> {
    let parsed: ScopeLabel = label.parse()?;
    let mut indices = Vec::with_capacity(parsed.components.len());
    for c in &parsed.components {
        indices.push(enums.lookup(EnumCategory::ScopeBits, c)?);
    }
    push_scope(buf, kind, parsed.scope_type, &indices)
        .with_context(|| format!("encoding scope {}", label))?;
    Ok(())
}

fn push_raw_graft(buf: &mut ByteBuffer, enums: &EnumTables, g: &RawGraft) -> Result<()> {
    push_graft(
        buf,
        enums.lookup(EnumCategory::GraftTypes, &g.kind)?,
        enums.lookup(EnumCategory::Ids, &g.seq_id)?,
    )?;
    Ok(())
}

/// Encodes one item. Its strings must already be in the frozen tables.
pub(crate) fn encode_item(buf: &mut ByteBuffer, enums: &EnumTables, raw: &RawItem) -> Result<()> {
    match raw {
        RawItem::Token { kind, chars } => {
            push_token(buf, *kind, enums.lookup(kind.category(), chars)?)?;
        }
        RawItem::StartScope(label) => push_label(buf, enums, ItemKind::StartScope, label)?,
        RawItem::EndScope(label) => push_label(buf, enums, ItemKind::EndScope, label)?,
        RawItem::Graft(g) => push_raw_graft(buf, enums, g)?,
    }
    Ok(())
}

/// Encodes the blocks of one sequence, carrying open scopes and the word
/// count from block to block.
fn encode_sequence(
    raw: &RawSequence,
    enums: &EnumTables,
    config: &EngineConfig,
) -> Result<Sequence> {
    let mut seq = Sequence::new(raw.id.clone(), raw.kind.clone());
    seq.tags = validate_tags(&raw.tags).with_context(|| format!("sequence {}", raw.id))?;

    let mut open: Vec<String> = Vec::new();
    let mut words: u32 = 0;
    for (n, rb) in raw.blocks.iter().enumerate() {
        let mut block = Block::with_config(config);
        let ctx = || format!("sequence {} block {}", raw.id, n);

        push_label(&mut block.bs, enums, ItemKind::StartScope, &rb.block_scope).with_context(ctx)?;
        for g in &rb.grafts {
            push_raw_graft(&mut block.bg, enums, g).with_context(ctx)?;
        }
        for label in &open {
            push_label(&mut block.os, enums, ItemKind::StartScope, label).with_context(ctx)?;
        }
        block.nt.push_nbyte(words).with_context(ctx)?;

        let mut included: Vec<&str> = Vec::new();
        for item in &rb.items {
            encode_item(&mut block.c, enums, item).with_context(ctx)?;
            match item {
                RawItem::Token {
                    kind: TokenKind::WordLike,
                    ..
                } => words += 1,
                RawItem::StartScope(label) => {
                    if open.contains(label) {
                        tracing::debug!(seq = %raw.id, block = n, label = %label, "scope opened twice");
                    } else {
                        open.push(label.clone());
                    }
                    if !included.contains(&label.as_str()) {
                        included.push(label);
                    }
                }
                RawItem::EndScope(label) => open.retain(|l| l != label),
                _ => {}
            }
        }
        for label in included {
            push_label(&mut block.is, enums, ItemKind::StartScope, label).with_context(ctx)?;
        }
        seq.blocks.push(block);
    }
    Ok(seq)
}

impl DocSet {
    /// Encodes and indexes a document, then adds it to the set.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate document id, a missing main sequence, duplicate
    /// sequence ids, invalid tags, malformed scope labels or any encoding
    /// violation. The set is left unchanged on failure.
    pub fn add_document(&mut self, raw: &RawDocument) -> Result<()> {
        if self.docs.contains_key(&raw.id) {
            bail!("document {} already exists", raw.id);
        }
        if !raw.sequences.iter().any(|s| s.id == raw.main_id) {
            bail!("document {} has no main sequence {}", raw.id, raw.main_id);
        }

        let mut enums = self.enums.clone();
        let strings = document_strings(raw).with_context(|| format!("document {}", raw.id))?;
        if enums.is_frozen() {
            for (category, s) in &strings {
                enums.intern(*category, s)?;
            }
        } else {
            for (category, s) in &strings {
                enums.record(*category, s);
            }
            enums.build_enums()?;
            enums.build_enum_indexes()?;
        }

        let mut sequences = BTreeMap::new();
        for rs in &raw.sequences {
            let seq = encode_sequence(rs, &enums, &self.config)
                .with_context(|| format!("document {}", raw.id))?;
            if sequences.insert(rs.id.clone(), seq).is_some() {
                bail!("document {} has duplicate sequence {}", raw.id, rs.id);
            }
        }

        let mut doc = Document {
            id: raw.id.clone(),
            headers: raw.headers.clone(),
            main_id: raw.main_id.clone(),
            tags: validate_tags(&raw.tags).with_context(|| format!("document {}", raw.id))?,
            sequences,
        };
        doc.rebuild_cv_index(&mut enums)?;

        tracing::debug!(
            doc = %doc.id,
            sequences = doc.sequences.len(),
            "added document"
        );
        self.enums = enums;
        self.docs.insert(doc.id.clone(), doc);
        Ok(())
    }
}
