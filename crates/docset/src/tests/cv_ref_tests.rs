use crate::*;
use anyhow::Result;
use proptest::prelude::*;

#[test]
fn parses_every_form() -> Result<()> {
    assert_eq!("3".parse::<CvRef>()?, CvRef::Chapter(3));
    assert_eq!("3-5".parse::<CvRef>()?, CvRef::Chapters { from: 3, to: 5 });
    assert_eq!("3:4".parse::<CvRef>()?, CvRef::Verse { chapter: 3, verse: 4 });
    assert_eq!(
        "3:4-9".parse::<CvRef>()?,
        CvRef::Verses {
            chapter: 3,
            from: 4,
            to: 9
        }
    );
    assert_eq!(
        "3:4-5:2".parse::<CvRef>()?,
        CvRef::Span {
            from_chapter: 3,
            from_verse: 4,
            to_chapter: 5,
            to_verse: 2
        }
    );
    assert_eq!("1:0".parse::<CvRef>()?, CvRef::Verse { chapter: 1, verse: 0 });
    Ok(())
}

#[test]
fn rejects_malformed_references() {
    for bad in [
        "", "a", "1:", ":2", "1-", "1-2:3", "1:2:3", "1:x-4", "-1", "1:2-3:", " 3", "3 : 4",
        "1 - 2", "+3", "99999999999",
    ] {
        assert!(bad.parse::<CvRef>().is_err(), "{:?} should not parse", bad);
    }
}

#[test]
fn rejects_descending_references() {
    for bad in ["5-3", "3:9-4", "4:1-3:9", "3:5-3:4"] {
        assert!(bad.parse::<CvRef>().is_err(), "{:?} should not parse", bad);
    }
    assert!("3:4-3:4".parse::<CvRef>().is_ok());
}

#[test]
fn chapter_and_verse_matching() -> Result<()> {
    let chapter: CvRef = "2".parse()?;
    assert!(chapter.matches(&[2], &[])?);
    assert!(chapter.matches(&[1, 2], &[7])?);
    assert!(!chapter.matches(&[1], &[2])?);

    let verses: CvRef = "2:3-5".parse()?;
    assert!(verses.matches(&[2], &[4])?);
    assert!(!verses.matches(&[2], &[6])?);
    assert!(!verses.matches(&[3], &[4])?);
    assert!(!verses.matches(&[2], &[])?);
    Ok(())
}

#[test]
fn verse_zero_means_no_verse_open() -> Result<()> {
    let intro: CvRef = "2:0".parse()?;
    assert!(intro.matches(&[2], &[])?);
    assert!(!intro.matches(&[2], &[1])?);

    let from_intro: CvRef = "2:0-1".parse()?;
    assert!(from_intro.matches(&[2], &[])?);
    assert!(from_intro.matches(&[2], &[1])?);
    assert!(!from_intro.matches(&[2], &[2])?);
    Ok(())
}

#[test]
fn span_matching_across_chapters() -> Result<()> {
    let span: CvRef = "1:5-3:2".parse()?;
    assert!(!span.matches(&[1], &[4])?);
    assert!(span.matches(&[1], &[5])?);
    assert!(span.matches(&[1], &[40])?);
    assert!(span.matches(&[2], &[])?);
    assert!(span.matches(&[2], &[17])?);
    assert!(span.matches(&[3], &[])?);
    assert!(span.matches(&[3], &[2])?);
    assert!(!span.matches(&[3], &[3])?);
    assert!(!span.matches(&[4], &[1])?);
    assert!(!span.matches(&[], &[])?);
    Ok(())
}

#[test]
fn span_with_two_open_chapters_is_an_error() -> Result<()> {
    let span: CvRef = "1:5-3:2".parse()?;
    assert!(span.matches(&[1, 2], &[5]).is_err());
    // single-chapter forms do not care
    let chapter: CvRef = "1".parse()?;
    assert!(chapter.matches(&[1, 2], &[5])?);
    Ok(())
}

fn any_ref() -> impl Strategy<Value = CvRef> {
    prop_oneof![
        (0u32..200).prop_map(CvRef::Chapter),
        (0u32..200, 0u32..200).prop_map(|(a, b)| CvRef::Chapters {
            from: a.min(b),
            to: a.max(b)
        }),
        (0u32..200, 0u32..200).prop_map(|(chapter, verse)| CvRef::Verse { chapter, verse }),
        (0u32..200, 0u32..200, 0u32..200).prop_map(|(chapter, a, b)| CvRef::Verses {
            chapter,
            from: a.min(b),
            to: a.max(b)
        }),
        ((0u32..200, 0u32..200), (0u32..200, 0u32..200)).prop_map(|(a, b)| {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            CvRef::Span {
                from_chapter: lo.0,
                from_verse: lo.1,
                to_chapter: hi.0,
                to_verse: hi.1,
            }
        }),
    ]
}

proptest! {
    #[test]
    fn display_parses_back(r in any_ref()) {
        let text = r.to_string();
        prop_assert_eq!(text.parse::<CvRef>().unwrap(), r);
    }
}
