//! Source locations attached to diagnostics.

use serde::{Deserialize, Serialize};

/// Identifier of a file registered in a [`SourceCache`](crate::SourceCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    /// Used when the originating file is unknown.
    pub const DUMMY: FileId = FileId(u32::MAX);
}

/// Byte range inside one source file.
///
/// Offsets are relative to the start of the file. The parser numbers
/// positions globally across its source map, so callers convert with
/// [`Span::from_positions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub file_id: FileId,
    /// Inclusive start offset
    pub start: u32,
    /// Exclusive end offset
    pub end: u32,
}

impl Span {
    pub const DUMMY: Span = Span {
        file_id: FileId::DUMMY,
        start: 0,
        end: 0,
    };

    pub fn new(file_id: FileId, start: u32, end: u32) -> Self {
        Self { file_id, start, end }
    }

    /// Build a span from parser positions, given the position of the
    /// file's first byte.
    pub fn from_positions(file_id: FileId, base: u32, lo: u32, hi: u32) -> Self {
        Self::new(file_id, lo.saturating_sub(base), hi.saturating_sub(base))
    }

    pub fn is_dummy(&self) -> bool {
        self.file_id == FileId::DUMMY
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::DUMMY
    }
}

/// A span resolved to a printable file position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    /// 1-indexed
    pub line: u32,
    /// 1-indexed
    pub column: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_positions_is_file_relative() {
        let span = Span::from_positions(FileId(0), 1, 1, 4);
        assert_eq!(span.start, 0);
        assert_eq!(span.end, 3);
        assert_eq!(span.len(), 3);
    }

    #[test]
    fn test_dummy_span() {
        assert!(Span::default().is_dummy());
        assert!(!Span::new(FileId(2), 0, 0).is_dummy());
    }
}
