use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tmxkit_core::TmxError;

use crate::classify::RetentionPolicy;
use crate::encoding::{open_decoded, reject_malformed, EncodeWriter, OutputEncoding, Target};
use crate::rewrite::{rewrite_structural, Labels, RewriteStats};
use crate::rewrite_lines::rewrite_lines;

pub const DEFAULT_DOCTYPE: &str = r#"<!DOCTYPE tmx SYSTEM "tmx14.dtd">"#;

/// How a filtered file is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RewriteStrategy {
    /// Parse and re-serialize. Normalizes the prolog and attribute quoting.
    #[default]
    Structural,
    /// Copy raw unit text. Keeps source bytes and encoding.
    Lines,
    /// Structural, retried as `Lines` when the document is not well-formed.
    Auto,
}

impl RewriteStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RewriteStrategy::Structural => "structural",
            RewriteStrategy::Lines => "lines",
            RewriteStrategy::Auto => "auto",
        }
    }
}

impl fmt::Display for RewriteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RewriteStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structural" | "tree" => Ok(RewriteStrategy::Structural),
            "lines" | "line-buffered" => Ok(RewriteStrategy::Lines),
            "auto" => Ok(RewriteStrategy::Auto),
            other => Err(format!("unknown rewrite strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub policy: RetentionPolicy,
    pub strategy: RewriteStrategy,
    pub output_encoding: OutputEncoding,
    /// Replaces the generated `<?xml ...?>` line. Structural only.
    pub xml_declaration: Option<String>,
    /// Replaces the default DOCTYPE; an empty string omits it. Structural only.
    pub doctype: Option<String>,
}

impl FilterOptions {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Declaration and DOCTYPE lines written ahead of the root element.
    pub fn prolog(&self, target: &Target) -> String {
        let decl = match &self.xml_declaration {
            Some(d) => d.clone(),
            None => format!(r#"<?xml version="1.0" encoding="{}"?>"#, target.xml_label()),
        };
        let doctype = self.doctype.as_deref().unwrap_or(DEFAULT_DOCTYPE);
        let mut prolog = format!("{decl}\r\n");
        if !doctype.is_empty() {
            prolog.push_str(doctype);
            prolog.push_str("\r\n");
        }
        prolog
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    pub stats: RewriteStats,
    /// Strategy that produced the output, never `Auto`.
    pub strategy: RewriteStrategy,
    pub input_encoding: &'static str,
    pub output_encoding: &'static str,
}

fn create(output: &Path, target: Target) -> Result<EncodeWriter<BufWriter<File>>, TmxError> {
    let file = File::create(output).map_err(|e| TmxError::io(output, e))?;
    EncodeWriter::with_bom(BufWriter::new(file), target).map_err(|e| TmxError::io(output, e))
}

fn close(sink: EncodeWriter<BufWriter<File>>, output: &Path) -> Result<(), TmxError> {
    let mut inner = sink.into_inner().map_err(|e| TmxError::io(output, e))?;
    inner.flush().map_err(|e| TmxError::io(output, e))
}

fn run_structural(input: &Path, output: &Path, opts: &FilterOptions) -> Result<FilterOutcome, TmxError> {
    let (detection, mut reader) = open_decoded(input)?;
    let target = opts.output_encoding.resolve(&detection);
    let mut sink = create(output, target)?;
    let labels = Labels { input, output };
    let stats = rewrite_structural(&mut reader, &mut sink, &opts.prolog(&target), &opts.policy, labels)?;
    close(sink, output)?;
    reject_malformed(&reader, &detection, input)?;
    Ok(FilterOutcome {
        stats,
        strategy: RewriteStrategy::Structural,
        input_encoding: detection.name(),
        output_encoding: target.encoding.name(),
    })
}

fn run_lines(input: &Path, output: &Path, opts: &FilterOptions) -> Result<FilterOutcome, TmxError> {
    let (detection, mut reader) = open_decoded(input)?;
    let target = OutputEncoding::Source.resolve(&detection);
    let mut sink = create(output, target)?;
    let labels = Labels { input, output };
    let stats = rewrite_lines(&mut reader, &mut sink, &opts.policy, labels)?;
    close(sink, output)?;
    reject_malformed(&reader, &detection, input)?;
    Ok(FilterOutcome {
        stats,
        strategy: RewriteStrategy::Lines,
        input_encoding: detection.name(),
        output_encoding: target.encoding.name(),
    })
}

/// Filter `input` into `output` with the configured strategy.
///
/// `output` is created or truncated. On error it may hold partial content;
/// callers decide whether to remove it. Input bytes that are invalid in the
/// detected encoding fail the file with [`TmxError::Encoding`].
pub fn filter_file(input: &Path, output: &Path, opts: &FilterOptions) -> Result<FilterOutcome, TmxError> {
    match opts.strategy {
        RewriteStrategy::Structural => run_structural(input, output, opts),
        RewriteStrategy::Lines => run_lines(input, output, opts),
        RewriteStrategy::Auto => match run_structural(input, output, opts) {
            Err(err @ TmxError::Parse { .. }) => {
                tracing::warn!(
                    event = "structural_rewrite_failed",
                    path = %input.display(),
                    error = %err,
                    fallback = "lines",
                );
                run_lines(input, output, opts)
            }
            other => other,
        },
    }
}
