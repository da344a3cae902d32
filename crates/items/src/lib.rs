//! # Items - self-describing content records
//!
//! Block content is a flat run of variable-length items. Each item states its
//! own kind and byte length in its first byte, so a buffer can be walked
//! forward without any external index and an item can be spliced out by
//! reading a single byte.
//!
//! ```text
//!  pos ─┐
//!       v
//!  ┌────────┬─────────┬──────────────────┐┌────────┬─────────┬─────┐
//!  │kk llllll│ subtype │ nbyte payload... ││kk llllll│ subtype │ ... │
//!  └────────┴─────────┴──────────────────┘└────────┴─────────┴─────┘
//!   <──────────── llllll bytes ──────────>
//! ```
//!
//! See [`codec`] for the per-kind layout, [`kinds`] for the closed subtype
//! enumerations and [`scope`] for scope labels.

pub mod codec;
pub mod kinds;
pub mod scope;

pub use codec::{
    decode_item, header_bytes, item_count, push_graft, push_record, push_scope, push_token,
    read_record, scope_label, ItemCursor, ItemHeader, RawRecord, MAX_ITEM_LENGTH,
};
pub use kinds::{ItemKind, ScopeType, TokenKind};
pub use scope::{chapter_number, verse_number, ScopeLabel};

use buffer::BufferError;
use enums::EnumError;
use thiserror::Error;

/// A decoded token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub chars: String,
    /// Running word-like token count, when requested by the decoder.
    pub position: Option<u32>,
    /// Labels of the scopes open at this token, when requested by the decoder.
    pub scopes: Option<Vec<String>>,
}

/// A decoded cross-reference to another sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graft {
    pub kind: String,
    pub seq_id: String,
}

/// A decoded item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Token(Token),
    StartScope(String),
    EndScope(String),
    Graft(Graft),
}

impl Item {
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Token(_) => ItemKind::Token,
            Item::StartScope(_) => ItemKind::StartScope,
            Item::EndScope(_) => ItemKind::EndScope,
            Item::Graft(_) => ItemKind::Graft,
        }
    }

    #[must_use]
    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Item::Token(t) => Some(t),
            _ => None,
        }
    }
}

/// Errors raised while encoding or decoding items.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("unknown token subtype {0}")]
    UnknownTokenKind(u8),

    #[error("unknown scope subtype {0}")]
    UnknownScopeType(u8),

    #[error("unknown scope type '{0}'")]
    UnknownScopeName(String),

    #[error("malformed scope label '{0}'")]
    BadLabel(String),

    #[error("scope type {scope_type} takes {expected} component(s), got {found}")]
    Arity {
        scope_type: ScopeType,
        expected: usize,
        found: usize,
    },

    #[error("{0:?} is not a scope boundary kind")]
    NotAScope(ItemKind),

    #[error("item of {0} bytes exceeds the {MAX_ITEM_LENGTH}-byte record limit")]
    ItemTooLong(usize),

    #[error("graft type index {0} does not fit in the subtype byte")]
    SubtypeOverflow(u32),

    #[error("malformed item at position {pos}: {reason}")]
    Malformed { pos: usize, reason: String },

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Enum(#[from] EnumError),
}

pub type Result<T> = std::result::Result<T, ItemError>;

#[cfg(test)]
mod tests;
