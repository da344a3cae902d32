use super::helpers::*;
use crate::*;
use anyhow::Result;
use items::{Graft, Item};
use std::collections::HashSet;

fn hello_world() -> Result<DocSet> {
    let mut ds = DocSet::new("hello");
    ds.add_document(&single_block_document(
        "HEL",
        vec![
            RawItem::start("chapter/1"),
            RawItem::start("verse/1"),
            RawItem::word("Hello"),
            RawItem::word("world"),
            RawItem::end("verse/1"),
            RawItem::end("chapter/1"),
        ],
    ))?;
    Ok(ds)
}

fn main_block(ds: &DocSet, block: usize) -> Result<&Block> {
    Ok(&ds.document(DOC)?.main_sequence()?.blocks[block])
}

// --------------------- Streaming decode ---------------------

#[test]
fn hello_world_tokens_carry_position_and_scopes() -> Result<()> {
    let ds = hello_world()?;
    let items = ds.block_items("HEL", "main", 0, &DecodeOptions::annotated_tokens())?;
    assert_eq!(items.len(), 2);
    for (n, item) in items.iter().enumerate() {
        let t = item.as_token().unwrap();
        assert_eq!(t.position, Some(n as u32));
        assert_eq!(
            t.scopes.as_deref(),
            Some(&["chapter/1".to_string(), "verse/1".to_string()][..])
        );
    }
    assert_eq!(token_text(&items), vec!["Hello", "world"]);
    Ok(())
}

#[test]
fn hello_world_cv_queries() -> Result<()> {
    let ds = hello_world()?;
    let block = &ds.document("HEL")?.main_sequence()?.blocks[0];
    let mut state = DecodeState::for_block(block, ds.enums())?;
    let hits = decode_items_for_cv(&block.c, ds.enums(), &tokens(), &mut state, "1:1")?;
    assert_eq!(token_text(&hits), vec!["Hello", "world"]);

    let mut state = DecodeState::for_block(block, ds.enums())?;
    let none = decode_items_for_cv(&block.c, ds.enums(), &tokens(), &mut state, "2:1")?;
    assert!(none.is_empty());
    Ok(())
}

#[test]
fn unannotated_decode_leaves_tokens_bare() -> Result<()> {
    let ds = hello_world()?;
    let items = ds.block_items("HEL", "main", 0, &DecodeOptions::default())?;
    assert_eq!(items.len(), 6);
    assert_eq!(items[0], Item::StartScope("chapter/1".to_string()));
    assert_eq!(items[5], Item::EndScope("chapter/1".to_string()));
    let t = items[2].as_token().unwrap();
    assert_eq!((t.position.as_ref(), t.scopes.as_ref()), (None, None));
    Ok(())
}

#[test]
fn later_block_resumes_from_its_open_scopes() -> Result<()> {
    let ds = sample_docset()?;
    let items = ds.block_items(DOC, "main", 1, &DecodeOptions::annotated_tokens())?;
    let created = items[0].as_token().unwrap();
    assert_eq!(created.chars, "created");
    assert_eq!(created.position, Some(4));
    assert_eq!(
        created.scopes.clone().unwrap(),
        vec!["chapter/1".to_string(), "verse/2".to_string()]
    );
    let and = items[1].as_token().unwrap();
    assert_eq!(and.position, Some(5));
    assert_eq!(and.scopes.clone().unwrap(), vec!["chapter/2".to_string(), "verse/1".to_string()]);
    Ok(())
}

#[test]
fn graft_filter_and_block_metadata() -> Result<()> {
    let ds = sample_docset()?;
    let only_grafts = DecodeOptions {
        filter: ItemFilter {
            tokens: false,
            scopes: false,
            grafts: true,
        },
        ..Default::default()
    };
    let items = ds.block_items(DOC, "main", 0, &only_grafts)?;
    assert_eq!(
        items,
        vec![Item::Graft(Graft {
            kind: "footnote".to_string(),
            seq_id: "fn1".to_string(),
        })]
    );
    let block = main_block(&ds, 0)?;
    assert_eq!(block.block_scope(ds.enums())?, "blockTag/p");
    assert!(block.grafts(ds.enums())?.is_empty());
    Ok(())
}

#[test]
fn open_scopes_tolerate_duplicates_and_stray_ends() {
    let mut open = OpenScopes::new();
    open.open("chapter/1");
    open.open("verse/3");
    open.open("chapter/1");
    assert_eq!(open.len(), 2);
    open.close("verse/9");
    assert_eq!(open.chapters(), vec![1]);
    assert_eq!(open.verses(), vec![3]);
    open.close("verse/3");
    open.close("chapter/1");
    assert!(open.is_empty());
}

// --------------------- Pruned decode ---------------------

#[test]
fn pruned_decode_requires_all_scopes() -> Result<()> {
    let ds = sample_docset()?;
    let block = main_block(&ds, 0)?;
    let mut state = DecodeState::for_block(block, ds.enums())?;
    let required = ScopeMatch::All(vec!["chapter/1".to_string(), "verse/1".to_string()]);
    let items = decode_pruned_items(&block.c, ds.enums(), &tokens(), &mut state, &required, None)?;
    assert_eq!(token_text(&items), vec!["beginning"]);
    // the state still saw every word
    assert_eq!(state.position, 4);
    Ok(())
}

#[test]
fn pruned_decode_any_scope_with_allowed_text() -> Result<()> {
    let ds = sample_docset()?;
    let block = main_block(&ds, 0)?;
    let any = ScopeMatch::Any(vec!["verse/1".to_string(), "verse/2".to_string()]);
    let mut state = DecodeState::for_block(block, ds.enums())?;
    let items = decode_pruned_items(&block.c, ds.enums(), &tokens(), &mut state, &any, None)?;
    assert_eq!(token_text(&items), vec!["beginning", "God"]);

    let allowed: HashSet<String> = ["In", "God"].iter().map(|s| s.to_string()).collect();
    let chapter = ScopeMatch::Any(vec!["chapter/1".to_string()]);
    let mut state = DecodeState::for_block(block, ds.enums())?;
    let items = decode_pruned_items(
        &block.c,
        ds.enums(),
        &tokens(),
        &mut state,
        &chapter,
        Some(&allowed),
    )?;
    assert_eq!(token_text(&items), vec!["In", "God"]);
    Ok(())
}

// --------------------- Chapter/verse decode ---------------------

#[test]
fn cv_decode_verse_ranges() -> Result<()> {
    let ds = sample_docset()?;
    let b0 = main_block(&ds, 0)?;
    let mut state = DecodeState::for_block(b0, ds.enums())?;
    let items = decode_items_for_cv(&b0.c, ds.enums(), &tokens(), &mut state, "1:1-2")?;
    assert_eq!(token_text(&items), vec!["beginning", "God"]);

    let mut state = DecodeState::for_block(b0, ds.enums())?;
    let intro = decode_items_for_cv(&b0.c, ds.enums(), &tokens(), &mut state, "1:0")?;
    assert_eq!(token_text(&intro), vec!["In", " ", "the"]);

    let b1 = main_block(&ds, 1)?;
    let mut state = DecodeState::for_block(b1, ds.enums())?;
    let items = decode_items_for_cv(&b1.c, ds.enums(), &tokens(), &mut state, "1:2-2:1")?;
    assert_eq!(token_text(&items), vec!["created", "And"]);
    Ok(())
}

#[test]
fn cv_decode_whole_chapters() -> Result<()> {
    let ds = sample_docset()?;
    let b1 = main_block(&ds, 1)?;
    let mut state = DecodeState::for_block(b1, ds.enums())?;
    let items = decode_items_for_cv(&b1.c, ds.enums(), &tokens(), &mut state, "2")?;
    assert_eq!(token_text(&items), vec!["And"]);

    let mut state = DecodeState::for_block(b1, ds.enums())?;
    let items = decode_items_for_cv(&b1.c, ds.enums(), &tokens(), &mut state, "1-2")?;
    assert_eq!(token_text(&items), vec!["created", "And"]);
    Ok(())
}

#[test]
fn cv_decode_rejects_bad_references() -> Result<()> {
    let ds = sample_docset()?;
    let b0 = main_block(&ds, 0)?;
    for bad in ["one", "2-1", "1:3-1:2"] {
        let mut state = DecodeState::for_block(b0, ds.enums())?;
        assert!(decode_items_for_cv(&b0.c, ds.enums(), &tokens(), &mut state, bad).is_err());
    }
    Ok(())
}

#[test]
fn cv_decode_span_over_overlapping_chapters_fails() -> Result<()> {
    let mut ds = DocSet::new("test");
    ds.add_document(&single_block_document(
        "ODD",
        vec![
            RawItem::start("chapter/1"),
            RawItem::start("chapter/2"),
            RawItem::word("both"),
            RawItem::end("chapter/1"),
            RawItem::end("chapter/2"),
        ],
    ))?;
    let block = &ds.document("ODD")?.main_sequence()?.blocks[0];
    let mut state = DecodeState::for_block(block, ds.enums())?;
    assert!(decode_items_for_cv(&block.c, ds.enums(), &tokens(), &mut state, "1:1-2:1").is_err());

    let mut state = DecodeState::for_block(block, ds.enums())?;
    let items = decode_items_for_cv(&block.c, ds.enums(), &tokens(), &mut state, "2")?;
    assert_eq!(token_text(&items), vec!["both"]);
    Ok(())
}

// --------------------- Index-sliced reads ---------------------

#[test]
fn items_for_chapter_follow_the_index() -> Result<()> {
    let ds = sample_docset()?;
    let ch1 = ds.items_for_chapter(DOC, 1, &tokens())?;
    assert_eq!(token_text(&ch1), vec!["In", " ", "the", "beginning", "God", "created"]);
    let ch2 = ds.items_for_chapter(DOC, 2, &DecodeOptions::default())?;
    assert_eq!(ch2.first(), Some(&Item::StartScope("chapter/2".to_string())));
    assert_eq!(ch2.last(), Some(&Item::EndScope("chapter/2".to_string())));
    assert_eq!(token_text(&ch2), vec!["And"]);
    assert!(ds.items_for_chapter(DOC, 9, &tokens())?.is_empty());
    Ok(())
}

#[test]
fn items_for_verse_follow_the_index() -> Result<()> {
    let ds = sample_docset()?;
    assert_eq!(token_text(&ds.items_for_verse(DOC, 1, 0, &tokens())?), vec!["In", " ", "the"]);
    assert_eq!(token_text(&ds.items_for_verse(DOC, 1, 2, &tokens())?), vec!["God", "created"]);

    let verse = ds.items_for_verse(DOC, 1, 1, &DecodeOptions::default())?;
    assert_eq!(verse.len(), 4);
    assert_eq!(verse[0], Item::StartScope("verse/1".to_string()));
    assert!(matches!(verse[2], Item::Graft(_)));
    assert_eq!(verse[3], Item::EndScope("verse/1".to_string()));

    let annotated = ds.items_for_verse(DOC, 1, 2, &DecodeOptions::annotated_tokens())?;
    let positions: Vec<Option<u32>> = annotated
        .iter()
        .map(|i| i.as_token().unwrap().position)
        .collect();
    assert_eq!(positions, vec![Some(3), Some(4)]);
    assert!(ds.items_for_verse(DOC, 2, 0, &tokens())?.is_empty());
    Ok(())
}

#[test]
fn reads_of_unknown_targets_fail() {
    let ds = sample_docset().unwrap();
    assert!(ds.items_for_chapter("NOPE", 1, &tokens()).is_err());
    assert!(ds.block_items(DOC, "nope", 0, &tokens()).is_err());
    assert!(ds.block_items(DOC, "main", 7, &tokens()).is_err());
}
