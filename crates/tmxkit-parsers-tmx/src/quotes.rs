use quick_xml::escape::escape;
use quick_xml::events::BytesStart;
use tmxkit_core::TmxError;

use crate::xml::parse_error;

/// Inline-tag families whose attributes the CAT tool expects in single quotes.
pub const SINGLE_QUOTED_TAGS: [&str; 4] = ["bpt", "ept", "ph", "it"];

/// `name` is one of [`SINGLE_QUOTED_TAGS`]. Prefixed names never match.
pub fn is_single_quoted(name: &[u8]) -> bool {
    SINGLE_QUOTED_TAGS.iter().any(|t| t.as_bytes() == name)
}

/// Serialize a start (or, with `empty`, a self-closing) tag with every
/// attribute value in single quotes.
pub fn write_single_quoted(
    e: &BytesStart<'_>,
    empty: bool,
    out: &mut Vec<u8>,
    position: u64,
) -> Result<(), TmxError> {
    out.push(b'<');
    out.extend_from_slice(e.name().as_ref());
    let mut attrs = e.attributes();
    attrs.with_checks(false);
    for a in attrs {
        let a = a.map_err(|err| parse_error(position, err))?;
        let value = a.unescape_value().map_err(|err| parse_error(position, err))?;
        out.push(b' ');
        out.extend_from_slice(a.key.as_ref());
        out.extend_from_slice(b"='");
        out.extend_from_slice(escape(value.as_ref()).as_bytes());
        out.push(b'\'');
    }
    out.extend_from_slice(if empty { b"/>" } else { b">" });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::Event;
    use quick_xml::Reader;

    fn requote(tag: &str) -> String {
        let mut reader = Reader::from_str(tag);
        let mut out = Vec::new();
        match reader.read_event().unwrap() {
            Event::Start(e) => write_single_quoted(&e, false, &mut out, 0).unwrap(),
            Event::Empty(e) => write_single_quoted(&e, true, &mut out, 0).unwrap(),
            other => panic!("not a tag: {other:?}"),
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn attributes_end_up_single_quoted() {
        assert_eq!(requote(r#"<bpt i="1" type="bold">"#), "<bpt i='1' type='bold'>");
        assert_eq!(requote(r#"<ph x='2'/>"#), "<ph x='2'/>");
        assert_eq!(requote("<it>"), "<it>");
    }

    #[test]
    fn values_are_escaped_for_single_quotes() {
        assert_eq!(requote(r#"<ph x="it's &lt;b&gt;"/>"#), "<ph x='it&apos;s &lt;b&gt;'/>");
    }

    #[test]
    fn only_the_four_inline_tags_qualify() {
        for name in SINGLE_QUOTED_TAGS {
            assert!(is_single_quoted(name.as_bytes()));
        }
        assert!(!is_single_quoted(b"itx"));
        assert!(!is_single_quoted(b"hi"));
        assert!(!is_single_quoted(b"x:ph"));
    }
}
