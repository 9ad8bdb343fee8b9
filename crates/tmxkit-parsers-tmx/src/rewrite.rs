use std::io::{self, BufRead, Write};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use tmxkit_core::TmxError;

use crate::classify::RetentionPolicy;
use crate::quotes::{is_single_quoted, write_single_quoted};
use crate::reader::unit_from_start;
use crate::xml::{is_local, parse_error, xml_error};

/// Counts produced by a rewrite pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub total_units: u64,
    pub removed_units: u64,
}

impl RewriteStats {
    pub fn retained_units(&self) -> u64 {
        self.total_units - self.removed_units
    }
}

/// Paths used to label I/O errors of a rewrite pass.
#[derive(Debug, Clone, Copy)]
pub struct Labels<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
}

/// Copy of `e` whose attributes are re-serialized with double quotes.
fn normalized_start(e: &BytesStart<'_>, pos: u64) -> Result<BytesStart<'static>, TmxError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    let mut attrs = e.attributes();
    attrs.with_checks(false);
    for a in attrs {
        let a = a.map_err(|err| parse_error(pos, err))?;
        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
        let value = a.unescape_value().map_err(|err| parse_error(pos, err))?;
        out.push_attribute((key.as_str(), value.as_ref()));
    }
    Ok(out)
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>, labels: Labels<'_>) -> Result<(), TmxError> {
    writer
        .write_event(event)
        .map_err(|e| TmxError::io(labels.output, io::Error::other(e.to_string())))
}

/// Serialize a start or empty tag. Inline tags get single-quoted attributes,
/// everything else goes through the writer with double quotes.
fn emit_tag(
    writer: &mut Writer<Vec<u8>>,
    e: &BytesStart<'_>,
    empty: bool,
    pos: u64,
    labels: Labels<'_>,
) -> Result<(), TmxError> {
    if is_single_quoted(e.name().as_ref()) {
        return write_single_quoted(e, empty, writer.get_mut(), pos);
    }
    let tag = normalized_start(e, pos)?;
    let event = if empty { Event::Empty(tag) } else { Event::Start(tag) };
    emit(writer, event, labels)
}

/// Move everything serialized so far to `out`.
fn flush_chunk<W: Write>(
    writer: &mut Writer<Vec<u8>>,
    out: &mut W,
    labels: Labels<'_>,
) -> Result<(), TmxError> {
    let chunk = writer.get_mut();
    if chunk.is_empty() {
        return Ok(());
    }
    out.write_all(chunk)
        .map_err(|e| TmxError::io(labels.output, e))?;
    chunk.clear();
    Ok(())
}

fn is_blank(raw: &[u8]) -> bool {
    raw.iter().all(|b| b.is_ascii_whitespace())
}

/// Structural rewrite: stream the document, drop denied units, re-serialize
/// the rest.
///
/// `prolog` replaces the source XML declaration and DOCTYPE. Only one unit is
/// buffered at a time. Whitespace directly preceding a dropped unit is dropped
/// with it so removals leave no blank lines.
pub fn rewrite_structural<R: BufRead, W: Write>(
    input: R,
    out: &mut W,
    prolog: &str,
    policy: &RetentionPolicy,
    labels: Labels<'_>,
) -> Result<RewriteStats, TmxError> {
    let mut xml = Reader::from_reader(input);
    xml.config_mut().trim_text(false);
    let mut buf = Vec::with_capacity(4096);
    let mut skip_buf = Vec::new();
    let mut writer = Writer::new(Vec::with_capacity(8192));
    let mut pending_ws: Vec<u8> = Vec::new();
    let mut stats = RewriteStats::default();
    let mut seen_root = false;
    let mut saw_body = false;
    let mut in_body = false;
    // Nesting depth below the currently retained <tu>.
    let mut unit_depth: Option<usize> = None;

    out.write_all(prolog.as_bytes())
        .map_err(|e| TmxError::io(labels.output, e))?;

    loop {
        buf.clear();
        let pos = xml.buffer_position() as u64;
        let event = xml
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(e, pos, labels.input))?;

        match event {
            Event::Eof => break,
            Event::Decl(_) | Event::DocType(_) => continue,
            Event::Text(_) if !seen_root => continue,
            Event::Text(t) if unit_depth.is_none() && is_blank(&t) => {
                pending_ws.extend_from_slice(&t);
                continue;
            }
            Event::Start(e) => {
                seen_root = true;
                if let Some(d) = unit_depth.as_mut() {
                    *d += 1;
                } else if in_body && is_local(&e, b"tu") {
                    stats.total_units += 1;
                    let meta = unit_from_start(&e, pos)?;
                    if policy.drops_unit(&meta) {
                        stats.removed_units += 1;
                        pending_ws.clear();
                        let end = e.name().as_ref().to_vec();
                        skip_buf.clear();
                        xml.read_to_end_into(QName(&end), &mut skip_buf)
                            .map_err(|err| xml_error(err, pos, labels.input))?;
                        continue;
                    }
                    unit_depth = Some(0);
                } else if is_local(&e, b"body") {
                    saw_body = true;
                    in_body = true;
                }
                writer.get_mut().append(&mut pending_ws);
                emit_tag(&mut writer, &e, false, pos, labels)?;
            }
            Event::Empty(e) => {
                seen_root = true;
                if unit_depth.is_none() {
                    if in_body && is_local(&e, b"tu") {
                        stats.total_units += 1;
                        if policy.drops_unit(&unit_from_start(&e, pos)?) {
                            stats.removed_units += 1;
                            pending_ws.clear();
                            continue;
                        }
                    } else if is_local(&e, b"body") {
                        saw_body = true;
                    }
                }
                writer.get_mut().append(&mut pending_ws);
                emit_tag(&mut writer, &e, true, pos, labels)?;
            }
            Event::End(e) => {
                match unit_depth {
                    Some(0) => unit_depth = None,
                    Some(d) => unit_depth = Some(d - 1),
                    None => {
                        if e.local_name().as_ref() == b"body" {
                            in_body = false;
                        }
                    }
                }
                writer.get_mut().append(&mut pending_ws);
                emit(&mut writer, Event::End(e), labels)?;
            }
            other => {
                writer.get_mut().append(&mut pending_ws);
                emit(&mut writer, other, labels)?;
            }
        }

        if unit_depth.is_none() {
            flush_chunk(&mut writer, out, labels)?;
        }
    }

    if unit_depth.is_some() {
        return Err(parse_error(
            xml.buffer_position() as u64,
            "unexpected end of document inside <tu>",
        ));
    }
    writer.get_mut().append(&mut pending_ws);
    flush_chunk(&mut writer, out, labels)?;
    out.flush().map_err(|e| TmxError::io(labels.output, e))?;

    if !saw_body {
        return Err(TmxError::MissingBody);
    }
    Ok(stats)
}
