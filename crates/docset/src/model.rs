/// Document model: `Document` → `Sequence` → `Block`.
///
/// The model holds exactly what the persisted form holds. How blocks are
/// grouped into sequences is decided by the caller at ingestion time.
use anyhow::{bail, Context, Result};
use buffer::ByteBuffer;
use config::EngineConfig;
use enums::{EnumCategory, EnumTables};
use items::{read_record, ItemCursor, ItemKind};
use std::collections::{BTreeMap, BTreeSet};

use crate::cv_index::CvIndex;

/// One encoded block.
///
/// | field | content                                                  |
/// |-------|----------------------------------------------------------|
/// | `bs`  | the block-scope start item                               |
/// | `bg`  | block-level grafts                                       |
/// | `c`   | content items                                            |
/// | `os`  | scopes open at block entry, as scope-start items         |
/// | `is`  | scopes started inside the block, as scope-start items    |
/// | `nt`  | one nbyte: word-like tokens before this block            |
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub bs: ByteBuffer,
    pub bg: ByteBuffer,
    pub c: ByteBuffer,
    pub os: ByteBuffer,
    pub is: ByteBuffer,
    pub nt: ByteBuffer,
}

impl Block {
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            bs: ByteBuffer::with_growth(8, config.max_growth),
            bg: ByteBuffer::with_growth(8, config.max_growth),
            c: ByteBuffer::with_growth(config.initial_block_capacity, config.max_growth),
            os: ByteBuffer::with_growth(16, config.max_growth),
            is: ByteBuffer::with_growth(16, config.max_growth),
            nt: ByteBuffer::with_growth(4, config.max_growth),
        }
    }

    /// Word-like tokens preceding this block in its sequence.
    pub fn token_offset(&self) -> Result<u32> {
        if self.nt.is_empty() {
            return Ok(0);
        }
        Ok(self.nt.nbyte(0)?)
    }

    /// The item buffers in rehash scan order.
    pub(crate) fn item_buffers(&self) -> [&ByteBuffer; 5] {
        [&self.bs, &self.bg, &self.c, &self.os, &self.is]
    }

    pub(crate) fn item_buffers_mut(&mut self) -> [&mut ByteBuffer; 5] {
        [
            &mut self.bs,
            &mut self.bg,
            &mut self.c,
            &mut self.os,
            &mut self.is,
        ]
    }

    /// Byte position of the `index`-th content item, or the end of the
    /// buffer when `index` equals the item count.
    pub(crate) fn item_position(&self, index: usize) -> Result<usize> {
        let mut n = 0;
        for entry in ItemCursor::new(&self.c) {
            let (pos, _) = entry?;
            if n == index {
                return Ok(pos);
            }
            n += 1;
        }
        if n == index {
            return Ok(self.c.len());
        }
        bail!("item {} out of range ({} items in block)", index, n)
    }

    fn trim(&mut self) {
        self.bs.trim();
        self.bg.trim();
        self.c.trim();
        self.os.trim();
        self.is.trim();
        self.nt.trim();
    }
}

/// An ordered run of blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub id: String,
    /// Sequence type, e.g. `main`, `heading`, `footnote`.
    pub kind: String,
    pub tags: BTreeSet<String>,
    pub blocks: Vec<Block>,
    /// Chapter/verse index, only ever present on a document's main sequence.
    pub cv_index: Option<CvIndex>,
}

impl Sequence {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            tags: BTreeSet::new(),
            blocks: Vec::new(),
            cv_index: None,
        }
    }

    /// Copy without blocks or index.
    pub(crate) fn clone_shell(&self) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind.clone(),
            tags: self.tags.clone(),
            blocks: Vec::new(),
            cv_index: None,
        }
    }

    pub fn trim(&mut self) {
        for b in &mut self.blocks {
            b.trim();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub headers: BTreeMap<String, String>,
    pub main_id: String,
    pub tags: BTreeSet<String>,
    pub sequences: BTreeMap<String, Sequence>,
}

impl Document {
    /// Copy without sequences.
    pub(crate) fn clone_shell(&self) -> Self {
        Self {
            id: self.id.clone(),
            headers: self.headers.clone(),
            main_id: self.main_id.clone(),
            tags: self.tags.clone(),
            sequences: BTreeMap::new(),
        }
    }

    pub fn main_sequence(&self) -> Result<&Sequence> {
        self.sequences
            .get(&self.main_id)
            .with_context(|| format!("document {} has no main sequence {}", self.id, self.main_id))
    }

    pub fn sequence(&self, seq_id: &str) -> Result<&Sequence> {
        self.sequences
            .get(seq_id)
            .with_context(|| format!("sequence {} not found in document {}", seq_id, self.id))
    }

    fn sequence_mut(&mut self, seq_id: &str) -> Result<&mut Sequence> {
        let doc_id = &self.id;
        self.sequences
            .get_mut(seq_id)
            .with_context(|| format!("sequence {} not found in document {}", seq_id, doc_id))
    }

    fn block_mut(&mut self, seq_id: &str, block: usize) -> Result<&mut Block> {
        let seq = self.sequence_mut(seq_id)?;
        let n = seq.blocks.len();
        seq.blocks
            .get_mut(block)
            .with_context(|| format!("block {} out of range ({} blocks in {})", block, n, seq_id))
    }

    /// Rebuilds the chapter/verse index of the main sequence.
    pub fn rebuild_cv_index(&mut self, enums: &mut EnumTables) -> Result<()> {
        let index = CvIndex::build(self.main_sequence()?, enums)
            .with_context(|| format!("building chapter/verse index for {}", self.id))?;
        let main_id = self.main_id.clone();
        self.sequence_mut(&main_id)?.cv_index = Some(index);
        Ok(())
    }

    /// Applies `edit` to a copy of one block's content and installs it,
    /// together with a rebuilt index when the block is in the main
    /// sequence. On error the document and `enums` are unchanged.
    fn splice<F>(&mut self, enums: &mut EnumTables, seq_id: &str, block: usize, edit: F) -> Result<()>
    where
        F: FnOnce(&Block, &mut ByteBuffer, &mut EnumTables) -> Result<()>,
    {
        let mut scratch = enums.clone();
        let b = self.block_mut(seq_id, block)?;
        let mut content = b.c.clone();
        edit(b, &mut content, &mut scratch)?;
        let previous = std::mem::replace(&mut b.c, content);
        if seq_id == self.main_id {
            let built = CvIndex::build(self.main_sequence()?, &mut scratch);
            match built {
                Ok(index) => {
                    let main_id = self.main_id.clone();
                    self.sequence_mut(&main_id)?.cv_index = Some(index);
                }
                Err(e) => {
                    self.block_mut(seq_id, block)?.c = previous;
                    return Err(e.context(format!(
                        "rebuilding chapter/verse index for {} after edit",
                        self.id
                    )));
                }
            }
        }
        *enums = scratch;
        Ok(())
    }

    /// Splices the `item`-th content item out of a block.
    pub fn delete_block_item(
        &mut self,
        enums: &mut EnumTables,
        seq_id: &str,
        block: usize,
        item: usize,
    ) -> Result<()> {
        self.splice(enums, seq_id, block, |b, content, _| {
            let pos = b.item_position(item)?;
            if pos == content.len() {
                bail!("item {} out of range in block {}", item, block);
            }
            content.delete_item(pos)?;
            Ok(())
        })
    }

    /// Encodes `new_items` and splices them in before the `item`-th content
    /// item of a block (`item` equal to the item count appends).
    pub fn insert_block_items(
        &mut self,
        enums: &mut EnumTables,
        seq_id: &str,
        block: usize,
        item: usize,
        new_items: &[crate::RawItem],
    ) -> Result<()> {
        self.splice(enums, seq_id, block, |b, content, enums| {
            for raw in new_items {
                crate::write::intern_item(enums, raw)?;
            }
            let mut encoded = ByteBuffer::new();
            for raw in new_items {
                crate::write::encode_item(&mut encoded, enums, raw)?;
            }
            let pos = b.item_position(item)?;
            content.insert(pos, &encoded)?;
            Ok(())
        })
    }

    /// Removes a sequence and every graft pointing at it.
    ///
    /// Strings only the deleted sequence used stay in the enum tables until
    /// the next [`DocSet::rehash`](crate::DocSet::rehash). On error nothing
    /// changes.
    pub fn delete_sequence(&mut self, enums: &mut EnumTables, seq_id: &str) -> Result<()> {
        if seq_id == self.main_id {
            bail!("cannot delete main sequence {} of document {}", seq_id, self.id);
        }
        if !self.sequences.contains_key(seq_id) {
            bail!("sequence {} not found in document {}", seq_id, self.id);
        }
        let mut doc = self.clone();
        doc.sequences.remove(seq_id);
        let mut scratch = enums.clone();
        if let Ok(target) = enums.lookup(EnumCategory::Ids, seq_id) {
            let mut main_changed = false;
            for seq in doc.sequences.values_mut() {
                for block in &mut seq.blocks {
                    let removed =
                        strip_grafts(&mut block.bg, target)? + strip_grafts(&mut block.c, target)?;
                    if removed > 0 && seq.id == doc.main_id {
                        main_changed = true;
                    }
                }
            }
            if main_changed {
                doc.rebuild_cv_index(&mut scratch)?;
            }
        }
        tracing::debug!(doc = %self.id, seq = seq_id, "deleted sequence");
        *self = doc;
        *enums = scratch;
        Ok(())
    }

    pub fn trim(&mut self) {
        for s in self.sequences.values_mut() {
            s.trim();
        }
    }
}

/// Deletes every graft item targeting `target`, returning how many went.
fn strip_grafts(buf: &mut ByteBuffer, target: u32) -> Result<usize> {
    let mut doomed = Vec::new();
    for entry in ItemCursor::new(buf) {
        let (pos, header) = entry?;
        if header.kind == ItemKind::Graft && read_record(buf, pos)?.0.payload == [target] {
            doomed.push(pos);
        }
    }
    // back to front so earlier positions stay valid
    for &pos in doomed.iter().rev() {
        buf.delete_item(pos)?;
    }
    Ok(doomed.len())
}
