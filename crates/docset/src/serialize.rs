/// Persisted form of a document set.
///
/// Every buffer is stored as the base64 of its exact bytes. Enum tables are
/// loaded before any document, since block content is meaningless without
/// them.
///
/// ```text
/// { id, metadata: { selectors }, enums: { category: base64 },
///   docs: { docId: { headers, mainId, tags,
///                    sequences: { seqId: { type, blocks: [ { bs, bg, c, is, os, nt } ], tags,
///                                          chapters?, chapterVerses?, tokensPresent? } } } },
///   tags }
/// ```
use anyhow::{Context, Result};
use buffer::ByteBuffer;
use config::EngineConfig;
use enums::{EnumCategory, EnumTables};
use items::item_count;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::cv_index::CvIndex;
use crate::model::{Block, Document, Sequence};
use crate::presence::PresenceSet;
use crate::write::validate_tags;
use crate::DocSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedDocSet {
    pub id: String,
    pub metadata: SerializedMetadata,
    pub enums: BTreeMap<String, String>,
    pub docs: BTreeMap<String, SerializedDocument>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedMetadata {
    pub selectors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedDocument {
    pub headers: BTreeMap<String, String>,
    pub main_id: String,
    pub tags: Vec<String>,
    pub sequences: BTreeMap<String, SerializedSequence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedSequence {
    #[serde(rename = "type")]
    pub kind: String,
    pub blocks: Vec<SerializedBlock>,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapters: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_verses: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_present: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedBlock {
    pub bs: String,
    pub bg: String,
    pub c: String,
    pub is: String,
    pub os: String,
    pub nt: String,
}

fn tables_to_base64(tables: &BTreeMap<u32, ByteBuffer>) -> BTreeMap<String, String> {
    tables
        .iter()
        .map(|(n, t)| (n.to_string(), t.to_base64()))
        .collect()
}

fn tables_from_base64(tables: &BTreeMap<String, String>) -> Result<BTreeMap<u32, ByteBuffer>> {
    let mut out = BTreeMap::new();
    for (key, text) in tables {
        let n: u32 = key
            .parse()
            .with_context(|| format!("invalid chapter key '{}'", key))?;
        out.insert(n, ByteBuffer::from_base64(text)?);
    }
    Ok(out)
}

impl SerializedBlock {
    fn from_block(b: &Block) -> Self {
        Self {
            bs: b.bs.to_base64(),
            bg: b.bg.to_base64(),
            c: b.c.to_base64(),
            is: b.is.to_base64(),
            os: b.os.to_base64(),
            nt: b.nt.to_base64(),
        }
    }

    fn to_block(&self) -> Result<Block> {
        let block = Block {
            bs: ByteBuffer::from_base64(&self.bs).context("bs")?,
            bg: ByteBuffer::from_base64(&self.bg).context("bg")?,
            c: ByteBuffer::from_base64(&self.c).context("c")?,
            is: ByteBuffer::from_base64(&self.is).context("is")?,
            os: ByteBuffer::from_base64(&self.os).context("os")?,
            nt: ByteBuffer::from_base64(&self.nt).context("nt")?,
        };
        // reject buffers that do not walk cleanly
        for buf in block.item_buffers() {
            item_count(buf)?;
        }
        Ok(block)
    }
}

impl SerializedSequence {
    fn from_sequence(seq: &Sequence) -> Self {
        let index = seq.cv_index.as_ref();
        Self {
            kind: seq.kind.clone(),
            blocks: seq.blocks.iter().map(SerializedBlock::from_block).collect(),
            tags: seq.tags.iter().cloned().collect(),
            chapters: index.map(|i| tables_to_base64(&i.chapters)),
            chapter_verses: index.map(|i| tables_to_base64(&i.chapter_verses)),
            tokens_present: index.map(|i| i.tokens_present.to_hex()),
        }
    }

    fn to_sequence(&self, id: &str) -> Result<Sequence> {
        let mut seq = Sequence::new(id, self.kind.clone());
        seq.tags = validate_tags(&self.tags)?;
        for (n, b) in self.blocks.iter().enumerate() {
            seq.blocks
                .push(b.to_block().with_context(|| format!("block {}", n))?);
        }
        if let (Some(chapters), Some(verses)) = (&self.chapters, &self.chapter_verses) {
            let present = match &self.tokens_present {
                Some(hex) => PresenceSet::from_hex(hex)?,
                None => PresenceSet::default(),
            };
            seq.cv_index = Some(CvIndex::from_parts(
                tables_from_base64(chapters)?,
                tables_from_base64(verses)?,
                present,
            )?);
        }
        Ok(seq)
    }
}

impl SerializedDocument {
    fn from_document(doc: &Document) -> Self {
        Self {
            headers: doc.headers.clone(),
            main_id: doc.main_id.clone(),
            tags: doc.tags.iter().cloned().collect(),
            sequences: doc
                .sequences
                .iter()
                .map(|(id, s)| (id.clone(), SerializedSequence::from_sequence(s)))
                .collect(),
        }
    }

    fn to_document(&self, id: &str) -> Result<Document> {
        let mut sequences = BTreeMap::new();
        for (seq_id, s) in &self.sequences {
            let seq = s
                .to_sequence(seq_id)
                .with_context(|| format!("sequence {}", seq_id))?;
            sequences.insert(seq_id.clone(), seq);
        }
        let doc = Document {
            id: id.to_string(),
            headers: self.headers.clone(),
            main_id: self.main_id.clone(),
            tags: validate_tags(&self.tags)?,
            sequences,
        };
        doc.main_sequence()?;
        Ok(doc)
    }
}

impl DocSet {
    /// The persisted form of the whole set.
    #[must_use]
    pub fn to_serialized(&self) -> SerializedDocSet {
        SerializedDocSet {
            id: self.id.clone(),
            metadata: SerializedMetadata {
                selectors: self.selectors.clone(),
            },
            enums: EnumCategory::ALL
                .iter()
                .map(|&c| (c.as_str().to_string(), self.enums.frozen(c).to_base64()))
                .collect(),
            docs: self
                .docs
                .iter()
                .map(|(id, d)| (id.clone(), SerializedDocument::from_document(d)))
                .collect(),
            tags: self.tags.iter().cloned().collect(),
        }
    }

    /// Restores a set from its persisted form. Enum tables go in first.
    pub fn from_serialized(data: &SerializedDocSet, config: EngineConfig) -> Result<Self> {
        let mut enums = EnumTables::with_capacity(config.enum_capacity);
        for (name, text) in &data.enums {
            let category: EnumCategory = name.parse()?;
            enums
                .load_frozen(category, ByteBuffer::from_base64(text)?)
                .with_context(|| format!("enum table {}", name))?;
        }

        let mut docs = BTreeMap::new();
        for (id, d) in &data.docs {
            let doc = d.to_document(id).with_context(|| format!("document {}", id))?;
            docs.insert(id.clone(), doc);
        }

        let tags: BTreeSet<String> = validate_tags(&data.tags)?;
        tracing::debug!(id = %data.id, docs = docs.len(), "loaded document set");
        Ok(Self {
            id: data.id.clone(),
            selectors: data.metadata.selectors.clone(),
            enums,
            docs,
            tags,
            config,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_serialized())?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let data: SerializedDocSet =
            serde_json::from_str(text).context("parsing serialized document set")?;
        Self::from_serialized(&data, EngineConfig::default())
    }
}
