//! Line-buffered rewriter used when the structural pass cannot parse a file.
//!
//! Each `<tu>...</tu>` span is collected as raw text and either copied
//! verbatim or dropped. Everything outside units passes through untouched, so
//! a file with no denied units comes out byte-identical after re-encoding.
//! A self-closing `<tu .../>` is a complete unit on its own.

use std::borrow::Cow;
use std::io::{BufRead, Write};
use std::sync::OnceLock;

use regex::Regex;
use tmxkit_core::TmxError;

use crate::classify::RetentionPolicy;
use crate::rewrite::{Labels, RewriteStats};

const TU_CLOSE: &str = "</tu>";

fn tu_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<tu[\s/>]").unwrap())
}

fn creation_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\bcreationid\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
    })
}

fn change_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)\bchangeid\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap())
}

fn raw_attr<'a>(re: &Regex, tag: &'a str) -> Option<Cow<'a, str>> {
    let caps = re.captures(tag)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    if raw.is_empty() {
        return None;
    }
    Some(quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw)))
}

/// Identities from the opening tag of a buffered unit.
fn unit_ids(unit: &str) -> (Option<Cow<'_, str>>, Option<Cow<'_, str>>) {
    let unit = unit.trim_start();
    let end = tag_end(unit, &mut None).map_or(unit.len(), |i| i + 1);
    let tag = &unit[..end];
    (raw_attr(creation_id_re(), tag), raw_attr(change_id_re(), tag))
}

/// Where the scanner stands relative to the current unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    Outside,
    /// Inside the `<tu ...>` tag, with the open attribute quote if any.
    OpenTag(Option<u8>),
    Body,
}

/// Byte index of the `>` closing the tag `s` is inside of, skipping quoted
/// attribute values. `quote` carries the open quote across lines.
fn tag_end(s: &str, quote: &mut Option<u8>) -> Option<usize> {
    for (i, b) in s.bytes().enumerate() {
        match *quote {
            Some(q) if b == q => *quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => *quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }
    None
}

/// Move `rest[..end]` into `unit`, plus the remainder of the line when it is
/// only whitespace. Returns what is left to scan.
fn take_unit_end<'a>(unit: &mut String, rest: &'a str, end: usize) -> &'a str {
    let (head, tail) = rest.split_at(end);
    unit.push_str(head);
    if tail.trim().is_empty() {
        unit.push_str(tail);
        ""
    } else {
        tail
    }
}

struct LineRewriter<'o, W: Write> {
    out: &'o mut W,
    policy: &'o RetentionPolicy,
    labels: Labels<'o>,
    stats: RewriteStats,
}

impl<W: Write> LineRewriter<'_, W> {
    fn write(&mut self, s: &str) -> Result<(), TmxError> {
        self.out
            .write_all(s.as_bytes())
            .map_err(|e| TmxError::io(self.labels.output, e))
    }

    fn finish_unit(&mut self, unit: &str) -> Result<(), TmxError> {
        self.stats.total_units += 1;
        let (creation, change) = unit_ids(unit);
        if self.policy.drops(creation.as_deref(), change.as_deref()) {
            self.stats.removed_units += 1;
            return Ok(());
        }
        self.write(unit)
    }
}

/// Copy `input` to `out` line by line, dropping denied units.
///
/// Indentation before `<tu` and trailing whitespace after `</tu>` on the same
/// line belong to the unit, so removing a unit removes its whole lines.
pub fn rewrite_lines<R: BufRead, W: Write>(
    mut input: R,
    out: &mut W,
    policy: &RetentionPolicy,
    labels: Labels<'_>,
) -> Result<RewriteStats, TmxError> {
    let mut rw = LineRewriter {
        out,
        policy,
        labels,
        stats: RewriteStats::default(),
    };
    let mut line = String::new();
    let mut unit = String::new();
    let mut span = Span::Outside;

    loop {
        line.clear();
        let n = input
            .read_line(&mut line)
            .map_err(|e| TmxError::io(labels.input, e))?;
        if n == 0 {
            break;
        }
        let mut rest: &str = &line;
        while !rest.is_empty() {
            match span {
                Span::Outside => match tu_open_re().find(rest) {
                    Some(m) => {
                        let (before, from) = rest.split_at(m.start());
                        if before.trim().is_empty() {
                            unit.push_str(before);
                        } else {
                            rw.write(before)?;
                        }
                        span = Span::OpenTag(None);
                        rest = from;
                    }
                    None => {
                        rw.write(rest)?;
                        rest = "";
                    }
                },
                Span::OpenTag(mut quote) => match tag_end(rest, &mut quote) {
                    Some(i) if rest[..i].ends_with('/') => {
                        rest = take_unit_end(&mut unit, rest, i + 1);
                        rw.finish_unit(&unit)?;
                        unit.clear();
                        span = Span::Outside;
                    }
                    Some(i) => {
                        unit.push_str(&rest[..=i]);
                        rest = &rest[i + 1..];
                        span = Span::Body;
                    }
                    None => {
                        unit.push_str(rest);
                        rest = "";
                        span = Span::OpenTag(quote);
                    }
                },
                Span::Body => match rest.find(TU_CLOSE) {
                    Some(i) => {
                        rest = take_unit_end(&mut unit, rest, i + TU_CLOSE.len());
                        rw.finish_unit(&unit)?;
                        unit.clear();
                        span = Span::Outside;
                    }
                    None => {
                        unit.push_str(rest);
                        rest = "";
                    }
                },
            }
        }
    }

    if span != Span::Outside {
        tracing::warn!(
            event = "unterminated_unit",
            path = %labels.input.display(),
            bytes = unit.len(),
        );
        rw.write(&unit)?;
    }
    rw.out
        .flush()
        .map_err(|e| TmxError::io(labels.output, e))?;
    Ok(rw.stats)
}
