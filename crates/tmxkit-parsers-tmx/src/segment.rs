use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn literal_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

/// Drop `<...>` sequences that survived as literal text (e.g. the escaped
/// `&lt;b&gt;` payload of a `<bpt>`).
pub fn strip_literal_tags(text: &str) -> Cow<'_, str> {
    if !text.contains('<') {
        return Cow::Borrowed(text);
    }
    literal_tag_re().replace_all(text, "")
}

/// Clean character length of a segment's concatenated text.
///
/// `segment` is the text of every node under `<seg>` joined in document order,
/// or `None` when the variant had no segment. Whitespace counts.
pub fn clean_length(segment: Option<&str>) -> usize {
    match segment {
        None => 0,
        Some(text) => strip_literal_tags(text).chars().count(),
    }
}
