//! Source positions and on-demand line/column recovery.
//!
//! Positions are tracked as byte offsets everywhere in the pipeline (lexer,
//! AST nodes, graph nodes); line numbers are only recovered when a
//! diagnostic actually needs to be rendered, via a line-start index built
//! once per compilation.

/// A byte offset into the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct SourceLoc(pub u32);

impl SourceLoc {
    #[must_use]
    pub fn offset(self) -> usize {
        self.0 as usize
    }
}

/// A resolved `(line, column)` pair, 1-indexed, for user-visible diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for LineCol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Maps byte offsets to `(line, column)` pairs without re-scanning the source
/// on every diagnostic.
pub struct LineIndex {
    /// Byte offset of the start of each line; `line_starts[0]` is always 0.
    line_starts: Vec<u32>,
}

impl LineIndex {
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    #[must_use]
    pub fn resolve(&self, loc: SourceLoc) -> LineCol {
        let offset = loc.0;
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let col = offset - self.line_starts[line];
        LineCol {
            line: line as u32 + 1,
            column: col + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_first_line() {
        let idx = LineIndex::new("hello\nworld\n");
        assert_eq!(idx.resolve(SourceLoc(0)), LineCol { line: 1, column: 1 });
        assert_eq!(idx.resolve(SourceLoc(3)), LineCol { line: 1, column: 4 });
    }

    #[test]
    fn resolves_second_line() {
        let idx = LineIndex::new("hello\nworld\n");
        assert_eq!(idx.resolve(SourceLoc(6)), LineCol { line: 2, column: 1 });
        assert_eq!(idx.resolve(SourceLoc(9)), LineCol { line: 2, column: 4 });
    }
}
