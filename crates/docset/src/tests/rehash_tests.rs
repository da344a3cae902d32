use super::helpers::*;
use crate::*;
use anyhow::Result;
use enums::EnumCategory;
use items::Item;

fn all_items(ds: &DocSet, doc: &str) -> Result<Vec<Vec<Item>>> {
    let mut out = Vec::new();
    for seq in ds.document(doc)?.sequences.keys() {
        let n = ds.document(doc)?.sequence(seq)?.blocks.len();
        for b in 0..n {
            out.push(ds.block_items(doc, seq, b, &DecodeOptions::annotated_tokens())?);
            out.push(ds.block_items(doc, seq, b, &DecodeOptions::default())?);
        }
    }
    Ok(out)
}

#[test]
fn rehash_drops_strings_of_deleted_sequences() -> Result<()> {
    let mut ds = sample_docset()?;
    ds.delete_sequence(DOC, "fn1")?;
    let before = all_items(&ds, DOC)?;
    let verses_before = ds.chapter_verse_index(DOC, 1)?;

    ds.rehash()?;

    let e = ds.enums();
    assert!(e.lookup(EnumCategory::Ids, "fn1").is_err());
    assert!(e.lookup(EnumCategory::WordLike, "Note").is_err());
    assert!(e.lookup(EnumCategory::GraftTypes, "footnote").is_err());
    assert!(e.lookup(EnumCategory::ScopeBits, "f").is_err());
    assert_eq!(e.len(EnumCategory::Ids), 1);
    assert_eq!(e.len(EnumCategory::WordLike), 6);

    assert_eq!(all_items(&ds, DOC)?, before);
    assert_eq!(ds.chapter_verse_index(DOC, 1)?, verses_before);
    assert_eq!(
        ds.document(DOC)?
            .main_sequence()?
            .cv_index
            .as_ref()
            .unwrap()
            .tokens_present()
            .to_hex(),
        "0x3f"
    );
    Ok(())
}

#[test]
fn rehash_drops_strings_of_deleted_documents() -> Result<()> {
    let mut ds = sample_docset()?;
    ds.add_document(&single_block_document(
        "EXO",
        vec![
            RawItem::start("chapter/1"),
            RawItem::word("Now"),
            RawItem::word("God"),
            RawItem::end("chapter/1"),
        ],
    ))?;
    ds.delete_document(DOC)?;
    let before = all_items(&ds, "EXO")?;

    ds.rehash()?;

    let e = ds.enums();
    assert_eq!(e.lookup(EnumCategory::WordLike, "Now")?, 0);
    assert_eq!(e.lookup(EnumCategory::WordLike, "God")?, 1);
    assert_eq!(e.len(EnumCategory::WordLike), 2);
    assert!(e.lookup(EnumCategory::WordLike, "beginning").is_err());
    assert!(e.lookup(EnumCategory::NotWordLike, " ").is_err());
    assert_eq!(all_items(&ds, "EXO")?, before);
    assert!(ds.has_word("EXO", "Now")?);
    Ok(())
}

#[test]
fn second_rehash_is_byte_identical() -> Result<()> {
    let mut ds = sample_docset()?;
    ds.add_document(&single_block_document(
        "EXO",
        vec![RawItem::start("chapter/1"), RawItem::word("Now")],
    ))?;
    ds.delete_sequence(DOC, "fn1")?;
    ds.rehash()?;
    let first = ds.to_json()?;
    ds.rehash()?;
    assert_eq!(ds.to_json()?, first);
    Ok(())
}

#[test]
fn rehash_of_empty_set() -> Result<()> {
    let mut ds = DocSet::new("empty");
    ds.rehash()?;
    assert!(ds.is_empty());
    for c in EnumCategory::ALL {
        assert_eq!(ds.enums().len(c), 0);
    }
    Ok(())
}

#[test]
fn documents_added_after_rehash_intern() -> Result<()> {
    let mut ds = sample_docset()?;
    ds.rehash()?;
    ds.add_document(&single_block_document("LEV", vec![RawItem::word("Then")]))?;
    assert_eq!(ds.enums().lookup(EnumCategory::WordLike, "Then")?, 7);
    assert_eq!(token_text(&ds.block_items("LEV", "main", 0, &tokens())?), vec!["Then"]);
    Ok(())
}
