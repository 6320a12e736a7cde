//! Source text and line/column bookkeeping, analogous to the teacher's
//! `ruff_source_file::SourceFile`/`SourceLocation` split but self-contained.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A single position in a source file. 1-indexed, matching what a reader
/// expects in an editor rather than the 0-indexed byte offsets the parser
/// uses internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open range between two [`Location`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    pub const fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    pub const fn point(at: Location) -> Self {
        Self { start: at, end: at }
    }
}

/// An in-memory source file plus a lazily-useful line index, shared cheaply
/// across `Module`s and `Violation`s the way the teacher shares
/// `ruff_source_file::SourceFile` by clone.
#[derive(Debug, Clone)]
pub struct SourceFile {
    inner: Arc<SourceFileInner>,
}

#[derive(Debug)]
struct SourceFileInner {
    path: PathBuf,
    text: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        Self {
            inner: Arc::new(SourceFileInner {
                path: path.into(),
                text,
                line_starts,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn text(&self) -> &str {
        &self.inner.text
    }

    /// Converts a byte offset into a 1-indexed (line, column) pair.
    pub fn location_for(&self, offset: usize) -> Location {
        let line_idx = match self.inner.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let line_start = self.inner.line_starts[line_idx];
        let column = self.inner.text[line_start..offset.min(self.inner.text.len())]
            .chars()
            .count();
        Location::new(line_idx + 1, column + 1)
    }
}

impl PartialEq for SourceFile {
    fn eq(&self, other: &Self) -> bool {
        self.inner.path == other.inner.path
    }
}
impl Eq for SourceFile {}
