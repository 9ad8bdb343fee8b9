use std::io::BufRead;
use std::path::PathBuf;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Reader;
use tmxkit_core::{TmxError, TranslationUnit, Variant};

use crate::segment::clean_length;
use crate::xml::{attr, is_local, lang_attr, parse_error, text_lossy, xml_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Before `<body>`; the target language may still be unknown.
    ScanningHeader,
    ScanningBody,
    Done,
}

/// Case-insensitive containment of the declared target language in a variant tag.
pub fn matches_target(target: Option<&str>, lang: Option<&str>) -> bool {
    match (target, lang) {
        (Some(t), Some(l)) if !t.is_empty() => l.to_lowercase().contains(&t.to_lowercase()),
        _ => false,
    }
}

/// Metadata attributes of a `<tu>` start tag.
pub(crate) fn unit_from_start(e: &BytesStart<'_>, position: u64) -> Result<TranslationUnit, TmxError> {
    Ok(TranslationUnit {
        creation_id: attr(e, &[b"creationid"], position)?,
        creation_date: attr(e, &[b"creationdate"], position)?,
        change_id: attr(e, &[b"changeid"], position)?,
        change_date: attr(e, &[b"changedate"], position)?,
        variants: Vec::new(),
    })
}

fn is_target_prop(e: &BytesStart<'_>, position: u64) -> Result<bool, TmxError> {
    Ok(is_local(e, b"prop")
        && attr(e, &[b"type"], position)?.is_some_and(|t| t.eq_ignore_ascii_case("targetlang")))
}

/// Accumulates one `<tu>` while its children stream past.
struct UnitBuilder {
    unit: TranslationUnit,
    depth: usize,
    target_found: bool,
    in_target_variant: bool,
    seg_depth: usize,
    seg_text: String,
}

impl UnitBuilder {
    fn new(unit: TranslationUnit) -> Self {
        Self {
            unit,
            depth: 0,
            target_found: false,
            in_target_variant: false,
            seg_depth: 0,
            seg_text: String::new(),
        }
    }

    fn capturing(&self) -> bool {
        self.seg_depth > 0
    }

    fn open_variant(&mut self, e: &BytesStart<'_>, target: Option<&str>, pos: u64) -> Result<(), TmxError> {
        let lang = lang_attr(e, pos)?;
        self.in_target_variant = !self.target_found && matches_target(target, lang.as_deref());
        if self.in_target_variant {
            self.target_found = true;
        }
        self.unit.variants.push(Variant {
            lang,
            clean_len: None,
        });
        Ok(())
    }

    fn wants_segment(&self, e: &BytesStart<'_>) -> bool {
        self.in_target_variant
            && is_local(e, b"seg")
            && self.unit.variants.last().is_some_and(|v| v.clean_len.is_none())
    }

    fn set_target_len(&mut self, len: usize) {
        if let Some(v) = self.unit.variants.last_mut() {
            v.clean_len = Some(len);
        }
    }

    fn start(&mut self, e: &BytesStart<'_>, target: Option<&str>, pos: u64) -> Result<(), TmxError> {
        self.depth += 1;
        if self.capturing() {
            self.seg_depth += 1;
        } else if self.depth == 1 && is_local(e, b"tuv") {
            self.open_variant(e, target, pos)?;
        } else if self.wants_segment(e) {
            self.seg_depth = 1;
            self.seg_text.clear();
        }
        Ok(())
    }

    fn empty(&mut self, e: &BytesStart<'_>, target: Option<&str>, pos: u64) -> Result<(), TmxError> {
        if self.capturing() {
            return Ok(());
        }
        if self.depth == 0 && is_local(e, b"tuv") {
            self.open_variant(e, target, pos)?;
            self.in_target_variant = false;
        } else if self.wants_segment(e) {
            self.set_target_len(0);
        }
        Ok(())
    }

    fn text(&mut self, s: &str) {
        self.seg_text.push_str(s);
    }

    /// Returns `true` when `e` closes the unit itself.
    fn end(&mut self, e: &BytesEnd<'_>) -> bool {
        if self.depth == 0 {
            return true;
        }
        self.depth -= 1;
        if self.capturing() {
            self.seg_depth -= 1;
            if self.seg_depth == 0 {
                let len = clean_length(Some(&self.seg_text));
                self.seg_text = String::new();
                self.set_target_len(len);
            }
        } else if e.local_name().as_ref() == b"tuv" {
            self.in_target_variant = false;
        }
        false
    }

    fn finish(self) -> TranslationUnit {
        self.unit
    }
}

/// Forward-only TMX reader yielding one translation unit at a time.
///
/// Only the unit being assembled is held in memory; each call to
/// [`TmxReader::next_unit`] hands it over and forgets it.
pub struct TmxReader<R: BufRead> {
    xml: Reader<R>,
    buf: Vec<u8>,
    state: ReaderState,
    target_lang: Option<String>,
    saw_body: bool,
    eof: bool,
    origin: PathBuf,
}

impl<R: BufRead> TmxReader<R> {
    /// `origin` is only used to label I/O errors.
    pub fn new(input: R, origin: impl Into<PathBuf>) -> Self {
        let mut xml = Reader::from_reader(input);
        xml.config_mut().trim_text(false);
        Self {
            xml,
            buf: Vec::with_capacity(4096),
            state: ReaderState::ScanningHeader,
            target_lang: None,
            saw_body: false,
            eof: false,
            origin: origin.into(),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn target_lang(&self) -> Option<&str> {
        self.target_lang.as_deref()
    }

    /// Next translation unit, `Ok(None)` at end of document.
    pub fn next_unit(&mut self) -> Result<Option<TranslationUnit>, TmxError> {
        if self.eof {
            return Ok(None);
        }
        let mut unit: Option<UnitBuilder> = None;
        let mut prop_text: Option<String> = None;

        loop {
            self.buf.clear();
            let pos = self.xml.buffer_position() as u64;
            match self.xml.read_event_into(&mut self.buf) {
                Err(e) => {
                    self.eof = true;
                    self.state = ReaderState::Done;
                    return Err(xml_error(e, pos, &self.origin));
                }
                Ok(Event::Start(e)) => match unit.as_mut() {
                    Some(u) => u.start(&e, self.target_lang.as_deref(), pos)?,
                    None => {
                        if is_local(&e, b"tu") {
                            unit = Some(UnitBuilder::new(unit_from_start(&e, pos)?));
                        } else if is_local(&e, b"body") {
                            self.saw_body = true;
                            self.state = ReaderState::ScanningBody;
                        } else if self.target_lang.is_none() && is_target_prop(&e, pos)? {
                            prop_text = Some(String::new());
                        }
                    }
                },
                Ok(Event::Empty(e)) => match unit.as_mut() {
                    Some(u) => u.empty(&e, self.target_lang.as_deref(), pos)?,
                    None => {
                        if is_local(&e, b"tu") {
                            return Ok(Some(unit_from_start(&e, pos)?));
                        } else if is_local(&e, b"body") {
                            self.saw_body = true;
                            self.state = ReaderState::Done;
                        }
                    }
                },
                Ok(Event::Text(t)) => {
                    if let Some(u) = unit.as_mut().filter(|u| u.capturing()) {
                        u.text(&text_lossy(&t, t.unescape()));
                    } else if let Some(p) = prop_text.as_mut() {
                        p.push_str(&text_lossy(&t, t.unescape()));
                    }
                }
                Ok(Event::CData(c)) => {
                    if let Some(u) = unit.as_mut().filter(|u| u.capturing()) {
                        u.text(&String::from_utf8_lossy(&c));
                    }
                }
                Ok(Event::End(e)) => {
                    if let Some(u) = unit.as_mut() {
                        if u.end(&e) {
                            return Ok(unit.take().map(UnitBuilder::finish));
                        }
                    } else if e.local_name().as_ref() == b"prop" {
                        if let Some(text) = prop_text.take() {
                            let lang = text.trim();
                            if !lang.is_empty() {
                                tracing::debug!(event = "target_lang_found", lang = lang, state = ?self.state);
                                self.target_lang = Some(lang.to_string());
                            }
                        }
                    } else if e.local_name().as_ref() == b"body" {
                        self.state = ReaderState::Done;
                    }
                }
                Ok(Event::Eof) => {
                    self.eof = true;
                    self.state = ReaderState::Done;
                    if unit.is_some() {
                        return Err(parse_error(pos, "unexpected end of document inside <tu>"));
                    }
                    if !self.saw_body {
                        return Err(TmxError::MissingBody);
                    }
                    return Ok(None);
                }
                Ok(_) => {}
            }
        }
    }
}
