//! Item encode/decode on top of [`ByteBuffer`].
//!
//! ```text
//! [header: kind(2 bits) | length(6 bits)][subtype: u8][nbyte payload ...]
//! ```
//!
//! | kind        | subtype              | payload                         |
//! |-------------|----------------------|---------------------------------|
//! | token       | [`TokenKind`]        | chars index (wordLike / notWordLike) |
//! | start scope | [`ScopeType`]        | `arity` scopeBits indices       |
//! | end scope   | [`ScopeType`]        | `arity` scopeBits indices       |
//! | graft       | graftTypes index     | ids index (target sequence)     |

use buffer::{ByteBuffer, RECORD_LENGTH_MASK};
use enums::{EnumCategory, EnumTables};

use crate::kinds::{ItemKind, ScopeType, TokenKind};
use crate::scope::ScopeLabel;
use crate::{Graft, Item, ItemError, Result, Token};

/// Longest encodable item, header included.
pub const MAX_ITEM_LENGTH: usize = RECORD_LENGTH_MASK as usize;

/// Decoded header and subtype bytes of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemHeader {
    pub length: usize,
    pub kind: ItemKind,
    pub subtype: u8,
}

/// An item with its enum indices still unresolved.
///
/// This is the form used when items are copied between buffers with their
/// indices rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub kind: ItemKind,
    pub subtype: u8,
    pub payload: Vec<u32>,
}

/// Reads the header and subtype of the item at `pos` without decoding it.
pub fn header_bytes(buf: &ByteBuffer, pos: usize) -> Result<ItemHeader> {
    let header = buf.byte(pos)?;
    let length = (header & RECORD_LENGTH_MASK) as usize;
    if length < 2 {
        return Err(ItemError::Malformed {
            pos,
            reason: format!("item length {} is below the 2-byte minimum", length),
        });
    }
    if pos + length > buf.len() {
        return Err(ItemError::Malformed {
            pos,
            reason: format!("item of {} bytes runs past end of buffer ({})", length, buf.len()),
        });
    }
    Ok(ItemHeader {
        length,
        kind: ItemKind::from_header(header),
        subtype: buf.byte(pos + 1)?,
    })
}

/// Number of payload integers an item of this header carries.
pub fn payload_len(header: &ItemHeader) -> Result<usize> {
    match header.kind {
        ItemKind::Token | ItemKind::Graft => Ok(1),
        ItemKind::StartScope | ItemKind::EndScope => {
            Ok(ScopeType::from_byte(header.subtype)?.arity())
        }
    }
}

/// Reads the item at `pos` with its payload integers.
pub fn read_record(buf: &ByteBuffer, pos: usize) -> Result<(RawRecord, ItemHeader)> {
    let header = header_bytes(buf, pos)?;
    let payload = buf.nbytes(pos + 2, payload_len(&header)?)?;
    Ok((
        RawRecord {
            kind: header.kind,
            subtype: header.subtype,
            payload,
        },
        header,
    ))
}

/// Appends `record`, backfilling its header. On error the buffer is unchanged.
pub fn push_record(buf: &mut ByteBuffer, record: &RawRecord) -> Result<()> {
    let start = buf.len();
    buf.push_byte(0);
    buf.push_byte(record.subtype);
    if let Err(e) = buf.push_nbytes(&record.payload) {
        buf.truncate(start);
        return Err(e.into());
    }
    let length = buf.len() - start;
    if length > MAX_ITEM_LENGTH {
        buf.truncate(start);
        return Err(ItemError::ItemTooLong(length));
    }
    buf.set_byte(start, ((record.kind as u8) << 6) | length as u8)?;
    Ok(())
}

pub fn push_token(buf: &mut ByteBuffer, kind: TokenKind, chars_index: u32) -> Result<()> {
    push_record(
        buf,
        &RawRecord {
            kind: ItemKind::Token,
            subtype: kind as u8,
            payload: vec![chars_index],
        },
    )
}

/// Appends a scope boundary. `kind` must be a scope kind and `components`
/// must match the arity of `scope_type`.
pub fn push_scope(
    buf: &mut ByteBuffer,
    kind: ItemKind,
    scope_type: ScopeType,
    components: &[u32],
) -> Result<()> {
    if !kind.is_scope() {
        return Err(ItemError::NotAScope(kind));
    }
    if components.len() != scope_type.arity() {
        return Err(ItemError::Arity {
            scope_type,
            expected: scope_type.arity(),
            found: components.len(),
        });
    }
    push_record(
        buf,
        &RawRecord {
            kind,
            subtype: scope_type as u8,
            payload: components.to_vec(),
        },
    )
}

/// Appends a graft. The graft kind index must fit the subtype byte.
pub fn push_graft(buf: &mut ByteBuffer, graft_type_index: u32, seq_index: u32) -> Result<()> {
    let subtype =
        u8::try_from(graft_type_index).map_err(|_| ItemError::SubtypeOverflow(graft_type_index))?;
    push_record(
        buf,
        &RawRecord {
            kind: ItemKind::Graft,
            subtype,
            payload: vec![seq_index],
        },
    )
}

/// Resolves the label of the scope item at `pos`.
pub fn scope_label(buf: &ByteBuffer, pos: usize, header: &ItemHeader, enums: &EnumTables) -> Result<String> {
    let scope_type = ScopeType::from_byte(header.subtype)?;
    let indices = buf.nbytes(pos + 2, scope_type.arity())?;
    let mut components = Vec::with_capacity(indices.len());
    for i in indices {
        components.push(enums.string(EnumCategory::ScopeBits, i)?.to_string());
    }
    Ok(ScopeLabel::new(scope_type, components)?.to_string())
}

/// Decodes the item at `pos`, returning it with its encoded length.
pub fn decode_item(buf: &ByteBuffer, pos: usize, enums: &EnumTables) -> Result<(Item, usize)> {
    let header = header_bytes(buf, pos)?;
    let item = match header.kind {
        ItemKind::Token => {
            let kind = TokenKind::from_byte(header.subtype)?;
            let index = buf.nbyte(pos + 2)?;
            Item::Token(Token {
                kind,
                chars: enums.string(kind.category(), index)?.to_string(),
                position: None,
                scopes: None,
            })
        }
        ItemKind::StartScope => Item::StartScope(scope_label(buf, pos, &header, enums)?),
        ItemKind::EndScope => Item::EndScope(scope_label(buf, pos, &header, enums)?),
        ItemKind::Graft => Item::Graft(Graft {
            kind: enums
                .string(EnumCategory::GraftTypes, u32::from(header.subtype))?
                .to_string(),
            seq_id: enums.string(EnumCategory::Ids, buf.nbyte(pos + 2)?)?.to_string(),
        }),
    };
    Ok((item, header.length))
}

/// Forward-only walk over the items of a buffer.
///
/// Yields `(pos, header)` for each item and stops after the first error.
pub struct ItemCursor<'a> {
    buf: &'a ByteBuffer,
    pos: usize,
    failed: bool,
}

impl<'a> ItemCursor<'a> {
    #[must_use]
    pub fn new(buf: &'a ByteBuffer) -> Self {
        Self {
            buf,
            pos: 0,
            failed: false,
        }
    }
}

impl Iterator for ItemCursor<'_> {
    type Item = Result<(usize, ItemHeader)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }
        let pos = self.pos;
        match header_bytes(self.buf, pos) {
            Ok(h) => {
                self.pos += h.length;
                Some(Ok((pos, h)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Number of items in `buf`.
pub fn item_count(buf: &ByteBuffer) -> Result<usize> {
    let mut n = 0;
    for entry in ItemCursor::new(buf) {
        entry?;
        n += 1;
    }
    Ok(n)
}
