//! Streaming TMX reading, attribution analysis and denylist rewriting.

pub mod analysis;
pub mod classify;
pub mod dates;
pub mod encoding;
pub mod filter;
pub mod ledger;
pub mod quotes;
pub mod reader;
pub mod rewrite;
pub mod rewrite_lines;
pub mod segment;
mod xml;

pub use analysis::{analyze_file, analyze_reader, AnalysisSession, FileAnalysis};
pub use classify::{classify, is_creation_only, Classification, DenyMatch, RetentionPolicy};
pub use encoding::{detect, open_decoded, Detection, OutputEncoding};
pub use filter::{filter_file, FilterOptions, FilterOutcome, RewriteStrategy, DEFAULT_DOCTYPE};
pub use ledger::{normalize_identity, Ledger};
pub use reader::{ReaderState, TmxReader};
pub use rewrite::RewriteStats;
pub use segment::clean_length;
