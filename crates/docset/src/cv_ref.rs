/// Chapter/verse references accepted by
/// [`decode_items_for_cv`](crate::read::decode_items_for_cv).
///
/// | text          | variant     |
/// |---------------|-------------|
/// | `3`           | `Chapter`   |
/// | `3-5`         | `Chapters`  |
/// | `3:4`         | `Verse`     |
/// | `3:4-9`       | `Verses`    |
/// | `3:4-5:2`     | `Span`      |
///
/// Verse 0 stands for the chapter introduction, the content before the
/// first verse.
use anyhow::{bail, Context, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvRef {
    Chapter(u32),
    Chapters { from: u32, to: u32 },
    Verse { chapter: u32, verse: u32 },
    Verses { chapter: u32, from: u32, to: u32 },
    Span {
        from_chapter: u32,
        from_verse: u32,
        to_chapter: u32,
        to_verse: u32,
    },
}

/// Digits only: no sign, no surrounding whitespace.
fn number(text: &str, whole: &str) -> Result<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        bail!("malformed chapter/verse reference '{}'", whole);
    }
    text.parse()
        .with_context(|| format!("chapter/verse number out of range in '{}'", whole))
}

impl FromStr for CvRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let r = match s.split_once('-') {
            None => match s.split_once(':') {
                None => CvRef::Chapter(number(s, s)?),
                Some((c, v)) => CvRef::Verse {
                    chapter: number(c, s)?,
                    verse: number(v, s)?,
                },
            },
            Some((lhs, rhs)) => match (lhs.split_once(':'), rhs.split_once(':')) {
                (None, None) => CvRef::Chapters {
                    from: number(lhs, s)?,
                    to: number(rhs, s)?,
                },
                (Some((c, v)), None) => CvRef::Verses {
                    chapter: number(c, s)?,
                    from: number(v, s)?,
                    to: number(rhs, s)?,
                },
                (Some((c1, v1)), Some((c2, v2))) => CvRef::Span {
                    from_chapter: number(c1, s)?,
                    from_verse: number(v1, s)?,
                    to_chapter: number(c2, s)?,
                    to_verse: number(v2, s)?,
                },
                (None, Some(_)) => bail!("malformed chapter/verse reference '{}'", s),
            },
        };
        let ascending = match r {
            CvRef::Chapter(_) | CvRef::Verse { .. } => true,
            CvRef::Chapters { from, to } => from <= to,
            CvRef::Verses { from, to, .. } => from <= to,
            CvRef::Span {
                from_chapter,
                from_verse,
                to_chapter,
                to_verse,
            } => (from_chapter, from_verse) <= (to_chapter, to_verse),
        };
        if !ascending {
            bail!("descending chapter/verse reference '{}'", s);
        }
        Ok(r)
    }
}

impl fmt::Display for CvRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CvRef::Chapter(c) => write!(f, "{}", c),
            CvRef::Chapters { from, to } => write!(f, "{}-{}", from, to),
            CvRef::Verse { chapter, verse } => write!(f, "{}:{}", chapter, verse),
            CvRef::Verses { chapter, from, to } => write!(f, "{}:{}-{}", chapter, from, to),
            CvRef::Span {
                from_chapter,
                from_verse,
                to_chapter,
                to_verse,
            } => write!(f, "{}:{}-{}:{}", from_chapter, from_verse, to_chapter, to_verse),
        }
    }
}

impl CvRef {
    /// Tests the reference against the chapters and verses currently open.
    ///
    /// A [`CvRef::Span`] needs to know which single chapter is open, so more
    /// than one open chapter is an error for it.
    pub fn matches(&self, chapters: &[u32], verses: &[u32]) -> Result<bool> {
        let chapter_open = |c: u32| chapters.contains(&c);
        let no_verse = verses.is_empty();
        let verse_in = |from: u32, to: u32| verses.iter().any(|&v| from <= v && v <= to);
        Ok(match *self {
            CvRef::Chapter(c) => chapter_open(c),
            CvRef::Chapters { from, to } => chapters.iter().any(|&c| from <= c && c <= to),
            CvRef::Verse { chapter, verse } => {
                chapter_open(chapter) && if verse == 0 { no_verse } else { verse_in(verse, verse) }
            }
            CvRef::Verses { chapter, from, to } => {
                chapter_open(chapter) && (verse_in(from, to) || (from == 0 && no_verse))
            }
            CvRef::Span {
                from_chapter,
                from_verse,
                to_chapter,
                to_verse,
            } => {
                let ch = match chapters {
                    [] => return Ok(false),
                    [ch] => *ch,
                    _ => bail!(
                        "{} chapters open at once during cross-chapter query {}",
                        chapters.len(),
                        self
                    ),
                };
                if ch < from_chapter || ch > to_chapter {
                    false
                } else if ch > from_chapter && ch < to_chapter {
                    true
                } else {
                    let lo = if ch == from_chapter { from_verse } else { 0 };
                    let hi = if ch == to_chapter { to_verse } else { u32::MAX };
                    verse_in(lo, hi) || (lo == 0 && no_verse)
                }
            }
        })
    }
}
