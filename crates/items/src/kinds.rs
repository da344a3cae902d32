//! Closed enumerations carried in item header and subtype bytes.

use enums::EnumCategory;
use std::fmt;
use std::str::FromStr;

use crate::ItemError;

/// Item kind, stored in the top two bits of the header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Token = 0,
    StartScope = 1,
    EndScope = 2,
    Graft = 3,
}

impl ItemKind {
    /// Decodes the top two bits of a header byte.
    #[must_use]
    pub fn from_header(header: u8) -> Self {
        match header >> 6 {
            0 => ItemKind::Token,
            1 => ItemKind::StartScope,
            2 => ItemKind::EndScope,
            _ => ItemKind::Graft,
        }
    }

    #[must_use]
    pub fn is_scope(self) -> bool {
        matches!(self, ItemKind::StartScope | ItemKind::EndScope)
    }
}

/// Token subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    WordLike = 0,
    Eol = 1,
    LineSpace = 2,
    SoftLineBreak = 3,
    NoBreakSpace = 4,
    BareSlash = 5,
    Punctuation = 6,
    Unknown = 7,
}

impl TokenKind {
    pub const ALL: [TokenKind; 8] = [
        TokenKind::WordLike,
        TokenKind::Eol,
        TokenKind::LineSpace,
        TokenKind::SoftLineBreak,
        TokenKind::NoBreakSpace,
        TokenKind::BareSlash,
        TokenKind::Punctuation,
        TokenKind::Unknown,
    ];

    pub fn from_byte(b: u8) -> Result<Self, ItemError> {
        TokenKind::ALL
            .get(b as usize)
            .copied()
            .ok_or(ItemError::UnknownTokenKind(b))
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::WordLike => "wordLike",
            TokenKind::Eol => "eol",
            TokenKind::LineSpace => "lineSpace",
            TokenKind::SoftLineBreak => "softLineBreak",
            TokenKind::NoBreakSpace => "noBreakSpace",
            TokenKind::BareSlash => "bareSlash",
            TokenKind::Punctuation => "punctuation",
            TokenKind::Unknown => "unknown",
        }
    }

    /// Enum table holding the text of tokens of this kind.
    #[must_use]
    pub fn category(self) -> EnumCategory {
        match self {
            TokenKind::WordLike => EnumCategory::WordLike,
            _ => EnumCategory::NotWordLike,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope type, stored in the subtype byte of scope items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeType {
    BlockTag = 0,
    Inline = 1,
    Chapter = 2,
    PubChapter = 3,
    AltChapter = 4,
    Verses = 5,
    Verse = 6,
    PubVerse = 7,
    AltVerse = 8,
    EsbCat = 9,
    Span = 10,
    SpanWithAtts = 11,
    Milestone = 12,
    Attribute = 13,
    HangingGraft = 14,
    OrphanTokens = 15,
    Cell = 16,
}

impl ScopeType {
    pub const ALL: [ScopeType; 17] = [
        ScopeType::BlockTag,
        ScopeType::Inline,
        ScopeType::Chapter,
        ScopeType::PubChapter,
        ScopeType::AltChapter,
        ScopeType::Verses,
        ScopeType::Verse,
        ScopeType::PubVerse,
        ScopeType::AltVerse,
        ScopeType::EsbCat,
        ScopeType::Span,
        ScopeType::SpanWithAtts,
        ScopeType::Milestone,
        ScopeType::Attribute,
        ScopeType::HangingGraft,
        ScopeType::OrphanTokens,
        ScopeType::Cell,
    ];

    pub fn from_byte(b: u8) -> Result<Self, ItemError> {
        ScopeType::ALL
            .get(b as usize)
            .copied()
            .ok_or(ItemError::UnknownScopeType(b))
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeType::BlockTag => "blockTag",
            ScopeType::Inline => "inline",
            ScopeType::Chapter => "chapter",
            ScopeType::PubChapter => "pubChapter",
            ScopeType::AltChapter => "altChapter",
            ScopeType::Verses => "verses",
            ScopeType::Verse => "verse",
            ScopeType::PubVerse => "pubVerse",
            ScopeType::AltVerse => "altVerse",
            ScopeType::EsbCat => "esbCat",
            ScopeType::Span => "span",
            ScopeType::SpanWithAtts => "spanWithAtts",
            ScopeType::Milestone => "milestone",
            ScopeType::Attribute => "attribute",
            ScopeType::HangingGraft => "hangingGraft",
            ScopeType::OrphanTokens => "orphanTokens",
            ScopeType::Cell => "cell",
        }
    }

    /// Number of `scopeBits` components a label of this type carries.
    ///
    /// ```text
    /// attribute/<element>/<name>/<index>/<value>
    /// cell/<role>/<alignment>/<width>
    /// <type>/<value>                      every other type
    /// ```
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            ScopeType::Attribute => 4,
            ScopeType::Cell => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeType {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScopeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ItemError::UnknownScopeName(s.to_string()))
    }
}
