//! Small helpers over quick-xml shared by the reader and the rewriters.

use std::borrow::Cow;
use std::io;
use std::path::Path;

use quick_xml::events::BytesStart;
use tmxkit_core::TmxError;

/// Element name without namespace prefix equals `name`.
pub(crate) fn is_local(e: &BytesStart<'_>, name: &[u8]) -> bool {
    e.local_name().as_ref() == name
}

pub(crate) fn parse_error(position: u64, message: impl std::fmt::Display) -> TmxError {
    TmxError::Parse {
        position,
        message: message.to_string(),
    }
}

pub(crate) fn xml_error(err: quick_xml::Error, position: u64, origin: &Path) -> TmxError {
    match err {
        quick_xml::Error::Io(e) => TmxError::io(origin, io::Error::new(e.kind(), e.to_string())),
        other => parse_error(position, other),
    }
}

/// Unescaped value of the first attribute whose full name is in `names`
/// (checked in order of `names`). Empty values count as absent.
pub(crate) fn attr(
    e: &BytesStart<'_>,
    names: &[&[u8]],
    position: u64,
) -> Result<Option<String>, TmxError> {
    let mut found: Vec<Option<String>> = vec![None; names.len()];
    let mut attrs = e.attributes();
    attrs.with_checks(false);
    for a in attrs {
        let a = a.map_err(|err| parse_error(position, err))?;
        if let Some(slot) = names.iter().position(|n| a.key.as_ref() == *n) {
            if found[slot].is_none() {
                let v = a
                    .unescape_value()
                    .map_err(|err| parse_error(position, err))?;
                if !v.is_empty() {
                    found[slot] = Some(v.into_owned());
                }
            }
        }
    }
    Ok(found.into_iter().flatten().next())
}

/// Language tag of a `<tuv>`: `xml:lang`, falling back to bare `lang`.
pub(crate) fn lang_attr(e: &BytesStart<'_>, position: u64) -> Result<Option<String>, TmxError> {
    attr(e, &[b"xml:lang", b"lang"], position)
}

/// Unescape text content, keeping unknown entities verbatim rather than failing.
pub(crate) fn text_lossy<E>(raw: &[u8], unescaped: Result<Cow<'_, str>, E>) -> String {
    match unescaped {
        Ok(s) => s.into_owned(),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}
