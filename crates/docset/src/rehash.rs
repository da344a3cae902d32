/// Rehash: rebuild the enum tables from what the documents still use.
///
/// 1. Re-record every string referenced by every block, in a fixed order
///    (documents and sequences in id order; per document the sequence ids
///    first, then per block `bs`, `bg`, `c`, `os`, `is`).
/// 2. Freeze and index the new tables.
/// 3. Map each old index to its new index per category. Strings nothing
///    references any more map to nothing and are dropped.
/// 4. Rewrite every item into a fresh buffer and rebuild every
///    chapter/verse index.
///
/// Everything is assembled off to the side and swapped in at the end, so a
/// failure leaves the set untouched. Because the scan order is fixed, a
/// second rehash reproduces the first byte for byte.
use anyhow::{bail, Context, Result};
use buffer::ByteBuffer;
use enums::{EnumCategory, EnumTables};
use items::{push_record, read_record, ItemCursor, ItemKind, TokenKind};
use std::collections::BTreeMap;

use crate::model::Block;
use crate::DocSet;

/// Old index -> new index, per category.
struct IndexMap {
    maps: BTreeMap<EnumCategory, Vec<Option<u32>>>,
}

impl IndexMap {
    fn build(old: &EnumTables, new: &EnumTables) -> Result<Self> {
        let mut maps = BTreeMap::new();
        for category in EnumCategory::ALL {
            let mut map = Vec::with_capacity(old.len(category));
            for i in 0..old.len(category) as u32 {
                let s = old.string(category, i)?;
                map.push(new.lookup(category, s).ok());
            }
            maps.insert(category, map);
        }
        Ok(Self { maps })
    }

    fn get(&self, category: EnumCategory, old: u32) -> Result<u32> {
        match self
            .maps
            .get(&category)
            .and_then(|m| m.get(old as usize))
            .copied()
            .flatten()
        {
            Some(new) => Ok(new),
            None => bail!("{} index {} has no counterpart after rehash", category, old),
        }
    }
}

/// Records every string an item buffer references.
fn record_items(buf: &ByteBuffer, old: &EnumTables, new: &mut EnumTables) -> Result<()> {
    for entry in ItemCursor::new(buf) {
        let (pos, _) = entry?;
        let (record, _) = read_record(buf, pos)?;
        match record.kind {
            ItemKind::Token => {
                let category = TokenKind::from_byte(record.subtype)?.category();
                new.record(category, old.string(category, record.payload[0])?);
            }
            ItemKind::StartScope | ItemKind::EndScope => {
                for &i in &record.payload {
                    new.record(EnumCategory::ScopeBits, old.string(EnumCategory::ScopeBits, i)?);
                }
            }
            ItemKind::Graft => {
                new.record(
                    EnumCategory::GraftTypes,
                    old.string(EnumCategory::GraftTypes, u32::from(record.subtype))?,
                );
                new.record(EnumCategory::Ids, old.string(EnumCategory::Ids, record.payload[0])?);
            }
        }
    }
    Ok(())
}

/// Copies an item buffer with every enum index remapped.
fn rewrite_items(buf: &ByteBuffer, map: &IndexMap) -> Result<ByteBuffer> {
    let mut out = ByteBuffer::with_capacity(buf.len().max(1));
    for entry in ItemCursor::new(buf) {
        let (pos, _) = entry?;
        let (mut record, _) = read_record(buf, pos)?;
        match record.kind {
            ItemKind::Token => {
                let category = TokenKind::from_byte(record.subtype)?.category();
                record.payload[0] = map.get(category, record.payload[0])?;
            }
            ItemKind::StartScope | ItemKind::EndScope => {
                for v in record.payload.iter_mut() {
                    *v = map.get(EnumCategory::ScopeBits, *v)?;
                }
            }
            ItemKind::Graft => {
                let kind = map.get(EnumCategory::GraftTypes, u32::from(record.subtype))?;
                record.subtype = u8::try_from(kind)
                    .with_context(|| format!("graft type index {} does not fit a byte", kind))?;
                record.payload[0] = map.get(EnumCategory::Ids, record.payload[0])?;
            }
        }
        push_record(&mut out, &record)?;
    }
    Ok(out)
}

impl DocSet {
    /// Rebuilds the enum tables from the strings still in use and rewrites
    /// every block against them.
    pub fn rehash(&mut self) -> Result<()> {
        let old = &self.enums;
        let mut new = EnumTables::with_capacity(self.config.enum_capacity);

        for doc in self.docs.values() {
            for seq_id in doc.sequences.keys() {
                new.record(EnumCategory::Ids, seq_id);
            }
            for seq in doc.sequences.values() {
                for (n, block) in seq.blocks.iter().enumerate() {
                    for buf in block.item_buffers() {
                        record_items(buf, old, &mut new).with_context(|| {
                            format!("document {} sequence {} block {}", doc.id, seq.id, n)
                        })?;
                    }
                }
            }
        }
        new.build_enums()?;
        new.build_enum_indexes()?;
        let map = IndexMap::build(old, &new)?;

        let mut docs = BTreeMap::new();
        for (id, doc) in &self.docs {
            let mut rewritten = doc.clone_shell();
            for (seq_id, seq) in &doc.sequences {
                let mut blocks = Vec::with_capacity(seq.blocks.len());
                for (n, block) in seq.blocks.iter().enumerate() {
                    let mut fresh = Block {
                        nt: block.nt.clone(),
                        ..Block::default()
                    };
                    for (src, dst) in block.item_buffers().into_iter().zip(fresh.item_buffers_mut()) {
                        *dst = rewrite_items(src, &map).with_context(|| {
                            format!("document {} sequence {} block {}", id, seq_id, n)
                        })?;
                    }
                    blocks.push(fresh);
                }
                let mut s = seq.clone_shell();
                s.blocks = blocks;
                rewritten.sequences.insert(seq_id.clone(), s);
            }
            rewritten.rebuild_cv_index(&mut new)?;
            docs.insert(id.clone(), rewritten);
        }

        let before: usize = EnumCategory::ALL.iter().map(|&c| self.enums.len(c)).sum();
        let after: usize = EnumCategory::ALL.iter().map(|&c| new.len(c)).sum();
        tracing::debug!(docs = docs.len(), before, after, "rehashed enum tables");

        self.enums = new;
        self.docs = docs;
        Ok(())
    }
}
