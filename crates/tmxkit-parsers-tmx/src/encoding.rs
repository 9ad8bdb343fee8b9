//! Encoding detection and streaming transcoding.
//!
//! TMX exports arrive as UTF-8 or as UTF-16 with a byte-order mark. The parser
//! only ever sees UTF-8: input is decoded on the fly, output is re-encoded on
//! the fly, and neither side buffers more than a few kilobytes.

use std::fs::File;
use std::io::{self, BufReader, Chain, Cursor, Read, Write};
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::{CoderResult, Decoder, Encoder, Encoding, UTF_16BE, UTF_16LE, UTF_8};
use regex::bytes::Regex;
use std::sync::OnceLock;
use tmxkit_core::TmxError;

const SNIFF_LEN: usize = 4096;
const CHUNK: usize = 16 * 1024;

/// How the input encoding was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    Bom,
    ZeroBytePattern,
    Declaration,
    Utf8Valid,
    Guess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub encoding: &'static Encoding,
    pub has_bom: bool,
    pub method: DetectionMethod,
}

impl Detection {
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }
}

fn decl_encoding_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<\?xml[^>]*encoding\s*=\s*['"]([^'"]+)['"][^>]*\?>"#).unwrap()
    })
}

fn is_utf16(enc: &'static Encoding) -> bool {
    enc == UTF_16LE || enc == UTF_16BE
}

/// Pick the encoding of a document from its first bytes.
///
/// Candidates are tried in a fixed order: byte-order mark, UTF-16 zero-byte
/// pattern of `<?`, the encoding declared in `<?xml ...?>`, UTF-8 validity of
/// the prefix, and finally a statistical guess.
pub fn detect(prefix: &[u8]) -> Detection {
    if let Some((enc, _)) = Encoding::for_bom(prefix) {
        tracing::debug!(event = "encoding_probe", method = "bom", result = enc.name());
        return Detection {
            encoding: enc,
            has_bom: true,
            method: DetectionMethod::Bom,
        };
    }
    tracing::debug!(event = "encoding_probe", method = "bom", result = "none");

    if prefix.starts_with(&[b'<', 0, b'?', 0]) {
        tracing::debug!(event = "encoding_probe", method = "zero_bytes", result = "UTF-16LE");
        return Detection {
            encoding: UTF_16LE,
            has_bom: false,
            method: DetectionMethod::ZeroBytePattern,
        };
    }
    if prefix.starts_with(&[0, b'<', 0, b'?']) {
        tracing::debug!(event = "encoding_probe", method = "zero_bytes", result = "UTF-16BE");
        return Detection {
            encoding: UTF_16BE,
            has_bom: false,
            method: DetectionMethod::ZeroBytePattern,
        };
    }
    tracing::debug!(event = "encoding_probe", method = "zero_bytes", result = "none");

    if let Some(caps) = decl_encoding_re().captures(prefix) {
        let label = &caps[1];
        match Encoding::for_label(label) {
            // A UTF-16 label inside an ASCII-compatible prolog cannot be true.
            Some(enc) if !is_utf16(enc) => {
                tracing::debug!(event = "encoding_probe", method = "declaration", result = enc.name());
                return Detection {
                    encoding: enc,
                    has_bom: false,
                    method: DetectionMethod::Declaration,
                };
            }
            other => tracing::debug!(
                event = "encoding_probe",
                method = "declaration",
                label = %String::from_utf8_lossy(label),
                rejected = ?other.map(|e| e.name()),
            ),
        }
    }

    let utf8_ok = match std::str::from_utf8(prefix) {
        Ok(_) => true,
        // A multi-byte sequence cut off by the sniff window is still UTF-8.
        Err(e) => e.error_len().is_none(),
    };
    tracing::debug!(event = "encoding_probe", method = "utf8_valid", result = utf8_ok);
    if utf8_ok {
        return Detection {
            encoding: UTF_8,
            has_bom: false,
            method: DetectionMethod::Utf8Valid,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(prefix, false);
    let guess = detector.guess(None, true);
    tracing::debug!(event = "encoding_probe", method = "guess", result = guess.name());
    Detection {
        encoding: guess,
        has_bom: false,
        method: DetectionMethod::Guess,
    }
}

/// `Read` adapter that decodes any supported encoding into UTF-8.
///
/// A leading byte-order mark of the selected encoding is removed.
pub struct DecodeReader<R> {
    inner: R,
    decoder: Decoder,
    in_buf: Box<[u8]>,
    in_pos: usize,
    in_len: usize,
    out_buf: Box<[u8]>,
    out_pos: usize,
    out_len: usize,
    eof: bool,
    finished: bool,
    malformed: bool,
}

impl<R: Read> DecodeReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            decoder: encoding.new_decoder_with_bom_removal(),
            in_buf: vec![0; CHUNK].into_boxed_slice(),
            in_pos: 0,
            in_len: 0,
            out_buf: vec![0; CHUNK].into_boxed_slice(),
            out_pos: 0,
            out_len: 0,
            eof: false,
            finished: false,
            malformed: false,
        }
    }

    /// `true` once any malformed byte sequence was replaced with U+FFFD.
    pub fn had_malformed(&self) -> bool {
        self.malformed
    }
}

impl<R: Read> Read for DecodeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.out_pos < self.out_len {
                let n = buf.len().min(self.out_len - self.out_pos);
                buf[..n].copy_from_slice(&self.out_buf[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            if self.in_pos == self.in_len && !self.eof {
                self.in_len = self.inner.read(&mut self.in_buf)?;
                self.in_pos = 0;
                if self.in_len == 0 {
                    self.eof = true;
                }
            }
            let (result, read, written, had_errors) = self.decoder.decode_to_utf8(
                &self.in_buf[self.in_pos..self.in_len],
                &mut self.out_buf,
                self.eof,
            );
            self.in_pos += read;
            self.out_pos = 0;
            self.out_len = written;
            self.malformed |= had_errors;
            if self.eof && result == CoderResult::InputEmpty {
                self.finished = true;
            }
        }
    }
}

pub type TmxInput = BufReader<DecodeReader<Chain<Cursor<Vec<u8>>, File>>>;

/// Open a TMX file, detect its encoding and return a UTF-8 reader over it.
pub fn open_decoded(path: &Path) -> Result<(Detection, TmxInput), TmxError> {
    let mut file = File::open(path).map_err(|e| TmxError::io(path, e))?;
    let mut prefix = Vec::with_capacity(SNIFF_LEN);
    (&mut file)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut prefix)
        .map_err(|e| TmxError::io(path, e))?;
    let detection = detect(&prefix);
    tracing::debug!(
        event = "encoding_detected",
        path = %path.display(),
        encoding = detection.name(),
        bom = detection.has_bom,
        method = ?detection.method,
    );
    let reader = DecodeReader::new(Cursor::new(prefix).chain(file), detection.encoding);
    Ok((detection, BufReader::with_capacity(CHUNK, reader)))
}

/// Fail when decoding `input` had to replace malformed bytes with U+FFFD.
///
/// Call once the stream has been consumed; the flag only covers bytes read
/// so far.
pub fn reject_malformed(input: &TmxInput, detection: &Detection, path: &Path) -> Result<(), TmxError> {
    if input.get_ref().had_malformed() {
        tracing::warn!(event = "malformed_input", path = %path.display(), encoding = detection.name());
        return Err(TmxError::Encoding(format!(
            "{} contains byte sequences that are not valid {}",
            path.display(),
            detection.name()
        )));
    }
    Ok(())
}

/// Text encoding of a rewritten file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputEncoding {
    /// UTF-16LE with `FF FE` byte-order mark, what the CAT tool imports.
    #[default]
    Utf16Le,
    Utf8,
    Utf8Bom,
    /// Same encoding and byte-order mark as the input.
    Source,
}

impl std::str::FromStr for OutputEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-16le" | "utf-16" | "utf16" => Ok(OutputEncoding::Utf16Le),
            "utf-8" | "utf8" => Ok(OutputEncoding::Utf8),
            "utf-8-bom" | "utf-8-sig" => Ok(OutputEncoding::Utf8Bom),
            "source" | "preserve" => Ok(OutputEncoding::Source),
            other => Err(format!("unknown output encoding: {other}")),
        }
    }
}

/// Concrete output encoding after resolving [`OutputEncoding::Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub encoding: &'static Encoding,
    pub bom: bool,
}

impl OutputEncoding {
    pub fn resolve(self, source: &Detection) -> Target {
        match self {
            OutputEncoding::Utf16Le => Target {
                encoding: UTF_16LE,
                bom: true,
            },
            OutputEncoding::Utf8 => Target {
                encoding: UTF_8,
                bom: false,
            },
            OutputEncoding::Utf8Bom => Target {
                encoding: UTF_8,
                bom: true,
            },
            OutputEncoding::Source => Target {
                encoding: source.encoding,
                bom: source.has_bom,
            },
        }
    }
}

impl Target {
    /// Label for the `encoding` pseudo-attribute of the XML declaration.
    pub fn xml_label(&self) -> String {
        if is_utf16(self.encoding) {
            "utf-16".to_string()
        } else {
            self.encoding.name().to_ascii_lowercase()
        }
    }

    fn bom_bytes(&self) -> &'static [u8] {
        if !self.bom {
            &[]
        } else if self.encoding == UTF_16LE {
            &[0xFF, 0xFE]
        } else if self.encoding == UTF_16BE {
            &[0xFE, 0xFF]
        } else if self.encoding == UTF_8 {
            &[0xEF, 0xBB, 0xBF]
        } else {
            &[]
        }
    }
}

enum Sink {
    Utf8,
    Utf16 { little_endian: bool },
    Legacy(Encoder),
}

/// `Write` adapter accepting UTF-8 and emitting the target encoding.
pub struct EncodeWriter<W: Write> {
    inner: W,
    sink: Sink,
    pending: Vec<u8>,
    scratch: Vec<u8>,
}

impl<W: Write> EncodeWriter<W> {
    pub fn new(inner: W, target: Target) -> Self {
        let sink = if target.encoding == UTF_8 {
            Sink::Utf8
        } else if target.encoding == UTF_16LE {
            Sink::Utf16 { little_endian: true }
        } else if target.encoding == UTF_16BE {
            Sink::Utf16 {
                little_endian: false,
            }
        } else {
            Sink::Legacy(target.encoding.new_encoder())
        };
        Self {
            inner,
            sink,
            pending: Vec::new(),
            scratch: Vec::with_capacity(CHUNK),
        }
    }

    /// Create the writer and emit the target's byte-order mark, if any.
    pub fn with_bom(mut inner: W, target: Target) -> io::Result<Self> {
        inner.write_all(target.bom_bytes())?;
        Ok(Self::new(inner, target))
    }

    pub fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.encode(s)
    }

    fn encode(&mut self, s: &str) -> io::Result<()> {
        match &mut self.sink {
            Sink::Utf8 => self.inner.write_all(s.as_bytes()),
            Sink::Utf16 { little_endian } => {
                self.scratch.clear();
                for unit in s.encode_utf16() {
                    let bytes = if *little_endian {
                        unit.to_le_bytes()
                    } else {
                        unit.to_be_bytes()
                    };
                    self.scratch.extend_from_slice(&bytes);
                }
                self.inner.write_all(&self.scratch)
            }
            Sink::Legacy(encoder) => {
                let mut out = [0u8; 4096];
                let mut rest = s;
                loop {
                    let (result, read, written, _) = encoder.encode_from_utf8(rest, &mut out, false);
                    self.inner.write_all(&out[..written])?;
                    rest = &rest[read..];
                    if result == CoderResult::InputEmpty {
                        return Ok(());
                    }
                }
            }
        }
    }

    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for EncodeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        let pending = std::mem::take(&mut self.pending);
        let valid = match std::str::from_utf8(&pending) {
            Ok(s) => s.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(io::Error::new(io::ErrorKind::InvalidData, e));
            }
        };
        let text = std::str::from_utf8(&pending[..valid])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.encode(text)?;
        self.pending = pending[valid..].to_vec();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "incomplete UTF-8 sequence at end of output",
            ));
        }
        self.inner.flush()
    }
}
