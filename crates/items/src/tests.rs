use super::*;
use anyhow::Result;
use buffer::ByteBuffer;
use enums::{EnumCategory, EnumTables};

/// Tables holding the strings used by the sample block.
fn sample_enums() -> Result<EnumTables> {
    let mut t = EnumTables::new();
    t.record(EnumCategory::WordLike, "Hello");
    t.record(EnumCategory::WordLike, "world");
    t.record(EnumCategory::NotWordLike, " ");
    t.record(EnumCategory::ScopeBits, "1");
    t.record(EnumCategory::ScopeBits, "p");
    t.record(EnumCategory::GraftTypes, "footnote");
    t.record(EnumCategory::Ids, "fn1");
    t.build_enums()?;
    t.build_enum_indexes()?;
    Ok(t)
}

fn sample_block(t: &EnumTables) -> Result<ByteBuffer> {
    let one = t.lookup(EnumCategory::ScopeBits, "1")?;
    let mut b = ByteBuffer::new();
    push_scope(&mut b, ItemKind::StartScope, ScopeType::Chapter, &[one])?;
    push_scope(&mut b, ItemKind::StartScope, ScopeType::Verse, &[one])?;
    push_token(&mut b, TokenKind::WordLike, t.lookup(EnumCategory::WordLike, "Hello")?)?;
    push_token(&mut b, TokenKind::LineSpace, t.lookup(EnumCategory::NotWordLike, " ")?)?;
    push_token(&mut b, TokenKind::WordLike, t.lookup(EnumCategory::WordLike, "world")?)?;
    push_graft(
        &mut b,
        t.lookup(EnumCategory::GraftTypes, "footnote")?,
        t.lookup(EnumCategory::Ids, "fn1")?,
    )?;
    push_scope(&mut b, ItemKind::EndScope, ScopeType::Verse, &[one])?;
    push_scope(&mut b, ItemKind::EndScope, ScopeType::Chapter, &[one])?;
    Ok(b)
}

fn decode_all(b: &ByteBuffer, t: &EnumTables) -> Result<Vec<Item>> {
    let mut out = Vec::new();
    for entry in ItemCursor::new(b) {
        let (pos, _) = entry?;
        out.push(decode_item(b, pos, t)?.0);
    }
    Ok(out)
}

// -------------------- Encoding --------------------

#[test]
fn token_wire_format() -> Result<()> {
    let mut b = ByteBuffer::new();
    push_token(&mut b, TokenKind::Punctuation, 300)?;
    // header: kind 0, length 4 | subtype 6 | 300 as nbyte
    assert_eq!(b.as_slice(), &[0x04, 6, 0x2C, 0x82]);
    Ok(())
}

#[test]
fn scope_and_graft_headers() -> Result<()> {
    let mut b = ByteBuffer::new();
    push_scope(&mut b, ItemKind::EndScope, ScopeType::Verse, &[2])?;
    push_graft(&mut b, 1, 0)?;
    assert_eq!(b.as_slice(), &[0x83, 6, 0x82, 0xC3, 1, 0x80]);
    let h = header_bytes(&b, 3)?;
    assert_eq!(
        h,
        ItemHeader {
            length: 3,
            kind: ItemKind::Graft,
            subtype: 1
        }
    );
    Ok(())
}

#[test]
fn scope_arity_is_checked() {
    let mut b = ByteBuffer::new();
    let err = push_scope(&mut b, ItemKind::StartScope, ScopeType::Cell, &[1]).unwrap_err();
    assert_eq!(
        err,
        ItemError::Arity {
            scope_type: ScopeType::Cell,
            expected: 3,
            found: 1
        }
    );
    assert!(push_scope(&mut b, ItemKind::Token, ScopeType::Verse, &[1]).is_err());
    assert!(b.is_empty());
}

#[test]
fn graft_type_must_fit_subtype_byte() {
    let mut b = ByteBuffer::new();
    assert_eq!(push_graft(&mut b, 256, 0), Err(ItemError::SubtypeOverflow(256)));
    assert!(b.is_empty());
}

#[test]
fn oversized_item_is_rejected_without_partial_write() -> Result<()> {
    let mut b = ByteBuffer::new();
    push_token(&mut b, TokenKind::WordLike, 1)?;
    let before = b.as_slice().to_vec();
    let record = RawRecord {
        kind: ItemKind::StartScope,
        subtype: ScopeType::Attribute as u8,
        payload: vec![1 << 27; 16],
    };
    assert!(matches!(push_record(&mut b, &record), Err(ItemError::ItemTooLong(66))));
    assert_eq!(b.as_slice(), before.as_slice());
    Ok(())
}

// -------------------- Decoding --------------------

#[test]
fn decode_sample_block() -> Result<()> {
    let t = sample_enums()?;
    let b = sample_block(&t)?;
    let items = decode_all(&b, &t)?;
    assert_eq!(items.len(), 8);
    assert_eq!(items[0], Item::StartScope("chapter/1".to_string()));
    assert_eq!(items[1], Item::StartScope("verse/1".to_string()));
    let hello = items[2].as_token().unwrap();
    assert_eq!(hello.kind, TokenKind::WordLike);
    assert_eq!(hello.chars, "Hello");
    assert_eq!(items[3].as_token().unwrap().chars, " ");
    assert_eq!(
        items[5],
        Item::Graft(Graft {
            kind: "footnote".to_string(),
            seq_id: "fn1".to_string()
        })
    );
    assert_eq!(items[7], Item::EndScope("chapter/1".to_string()));
    Ok(())
}

#[test]
fn decode_unknown_enum_index_fails() -> Result<()> {
    let t = sample_enums()?;
    let mut b = ByteBuffer::new();
    push_token(&mut b, TokenKind::WordLike, 99)?;
    assert!(matches!(decode_item(&b, 0, &t), Err(ItemError::Enum(_))));
    Ok(())
}

#[test]
fn read_and_push_record_copies_item() -> Result<()> {
    let mut src = ByteBuffer::new();
    push_scope(&mut src, ItemKind::StartScope, ScopeType::Attribute, &[1, 2, 3, 400])?;
    let (record, header) = read_record(&src, 0)?;
    assert_eq!(record.payload, vec![1, 2, 3, 400]);
    assert_eq!(header.length, src.len());
    let mut dst = ByteBuffer::new();
    push_record(&mut dst, &record)?;
    assert_eq!(dst, src);
    Ok(())
}

// -------------------- Scanning and splicing --------------------

#[test]
fn cursor_rejects_truncated_item() {
    let b = ByteBuffer::from_bytes(vec![0x04, 0, 0x81]);
    let mut c = ItemCursor::new(&b);
    assert!(matches!(c.next(), Some(Err(ItemError::Malformed { pos: 0, .. }))));
    assert!(c.next().is_none());
}

#[test]
fn delete_item_keeps_buffer_self_describing() -> Result<()> {
    let t = sample_enums()?;
    let mut b = sample_block(&t)?;
    let n = item_count(&b)?;
    for k in 0..n {
        let mut copy = b.clone();
        let pos = ItemCursor::new(&copy).nth(k).unwrap()?.0;
        copy.delete_item(pos)?;
        assert_eq!(item_count(&copy)?, n - 1, "after deleting item {}", k);
    }
    // deleting the first token of the verse leaves the rest decodable
    b.delete_item(6)?;
    let items = decode_all(&b, &t)?;
    assert_eq!(items[2].as_token().unwrap().chars, " ");
    Ok(())
}

#[test]
fn insert_spliced_items() -> Result<()> {
    let t = sample_enums()?;
    let mut b = sample_block(&t)?;
    let mut extra = ByteBuffer::new();
    push_token(&mut extra, TokenKind::WordLike, t.lookup(EnumCategory::WordLike, "world")?)?;
    let pos = ItemCursor::new(&b).nth(3).unwrap()?.0;
    b.insert(pos, &extra)?;
    let items = decode_all(&b, &t)?;
    assert_eq!(items.len(), 9);
    assert_eq!(items[3].as_token().unwrap().chars, "world");
    Ok(())
}

// -------------------- Labels --------------------

#[test]
fn scope_label_parse_and_format() -> Result<()> {
    let l: ScopeLabel = "attribute/w/lemma/0/a/b".parse()?;
    assert_eq!(l.scope_type, ScopeType::Attribute);
    assert_eq!(l.components, vec!["w", "lemma", "0", "a/b"]);
    assert_eq!(l.to_string(), "attribute/w/lemma/0/a/b");

    assert_eq!(
        "cell/body/left".parse::<ScopeLabel>(),
        Err(ItemError::Arity {
            scope_type: ScopeType::Cell,
            expected: 3,
            found: 2
        })
    );
    assert!("bogus/1".parse::<ScopeLabel>().is_err());
    assert!("chapter".parse::<ScopeLabel>().is_err());
    Ok(())
}

#[test]
fn chapter_and_verse_numbers() {
    assert_eq!(chapter_number("chapter/12"), Some(12));
    assert_eq!(verse_number("verse/3"), Some(3));
    assert_eq!(verse_number("verses/3-4"), None);
    assert_eq!(chapter_number("chapter/A"), None);
}
