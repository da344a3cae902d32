use crate::*;
use anyhow::Result;
use items::{Item, TokenKind};

pub const DOC: &str = "GEN";

fn block(scope: &str, items: Vec<RawItem>) -> RawBlock {
    RawBlock {
        block_scope: scope.to_string(),
        grafts: Vec::new(),
        items,
    }
}

/// Two chapters over two blocks, verse 2 of chapter 1 crossing the block
/// boundary, plus a footnote sequence.
///
/// ```text
/// block 0: 0 +chapter/1  1 In  2 ' '  3 the  4 +verses/1  5 +verse/1
///          6 beginning  7 graft(footnote, fn1)  8 -verse/1  9 -verses/1
///          10 +verse/2  11 God
/// block 1: 0 created  1 -verse/2  2 -chapter/1  3 +chapter/2  4 +verse/1
///          5 And  6 -verse/1  7 -chapter/2
/// ```
pub fn sample_document() -> RawDocument {
    let main = RawSequence {
        id: "main".to_string(),
        kind: "main".to_string(),
        tags: Vec::new(),
        blocks: vec![
            block(
                "blockTag/p",
                vec![
                    RawItem::start("chapter/1"),
                    RawItem::word("In"),
                    RawItem::token(TokenKind::LineSpace, " "),
                    RawItem::word("the"),
                    RawItem::start("verses/1"),
                    RawItem::start("verse/1"),
                    RawItem::word("beginning"),
                    RawItem::Graft(RawGraft {
                        kind: "footnote".to_string(),
                        seq_id: "fn1".to_string(),
                    }),
                    RawItem::end("verse/1"),
                    RawItem::end("verses/1"),
                    RawItem::start("verse/2"),
                    RawItem::word("God"),
                ],
            ),
            block(
                "blockTag/p",
                vec![
                    RawItem::word("created"),
                    RawItem::end("verse/2"),
                    RawItem::end("chapter/1"),
                    RawItem::start("chapter/2"),
                    RawItem::start("verse/1"),
                    RawItem::word("And"),
                    RawItem::end("verse/1"),
                    RawItem::end("chapter/2"),
                ],
            ),
        ],
    };
    let footnote = RawSequence {
        id: "fn1".to_string(),
        kind: "footnote".to_string(),
        tags: Vec::new(),
        blocks: vec![block("blockTag/f", vec![RawItem::word("Note")])],
    };
    RawDocument {
        id: DOC.to_string(),
        headers: [("bookCode".to_string(), "GEN".to_string())].into_iter().collect(),
        main_id: "main".to_string(),
        tags: vec!["draft".to_string()],
        sequences: vec![main, footnote],
    }
}

/// A document whose main sequence is the single block `items`.
pub fn single_block_document(id: &str, items: Vec<RawItem>) -> RawDocument {
    RawDocument {
        id: id.to_string(),
        main_id: "main".to_string(),
        sequences: vec![RawSequence {
            id: "main".to_string(),
            kind: "main".to_string(),
            tags: Vec::new(),
            blocks: vec![block("blockTag/p", items)],
        }],
        ..Default::default()
    }
}

pub fn sample_docset() -> Result<DocSet> {
    let mut ds = DocSet::new("test");
    ds.add_document(&sample_document())?;
    Ok(ds)
}

pub fn token_text(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .filter_map(|i| i.as_token().map(|t| t.chars.clone()))
        .collect()
}

pub fn tokens() -> DecodeOptions {
    DecodeOptions {
        filter: ItemFilter::TOKENS,
        ..Default::default()
    }
}
