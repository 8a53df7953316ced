//! Stage errors and the top-level [`CompileError`] that aggregates them.
//!
//! Every stage gets its own small `enum` with a hand-written `Display`,
//! aggregated the way a top-level REPL error wraps `ParseError` /
//! `CompileError` / `Exception` variants — no `thiserror`, no `anyhow`.

use std::fmt;

use crate::source::{LineIndex, SourceLoc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    InvalidCharacter { ch: char, loc: SourceLoc },
    UnterminatedString { loc: SourceLoc },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCharacter { ch, .. } => write!(f, "invalid character {ch:?}"),
            Self::UnterminatedString { .. } => write!(f, "unterminated string literal"),
        }
    }
}

impl std::error::Error for LexError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    UnmatchedBracket { loc: SourceLoc },
    UnexpectedToken { found: String, loc: SourceLoc },
    UnsupportedForm { form: String, loc: SourceLoc },
    EmptyInput,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmatchedBracket { .. } => write!(f, "unmatched bracket"),
            Self::UnexpectedToken { found, .. } => write!(f, "unexpected token {found:?}"),
            Self::UnsupportedForm { form, .. } => {
                write!(f, "unsupported form `{form}`")
            }
            Self::EmptyInput => write!(f, "empty input"),
        }
    }
}

impl std::error::Error for SyntaxError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    Undefined { name: String, loc: SourceLoc },
    RebindReadOnly { name: String, loc: SourceLoc },
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined { name, .. } => write!(f, "undefined name `{name}`"),
            Self::RebindReadOnly { name, .. } => {
                write!(f, "cannot rebind read-only name `{name}`")
            }
        }
    }
}

impl std::error::Error for NameError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    Mismatch { expected: String, found: String, loc: SourceLoc },
    NotCallable { found: String, loc: SourceLoc },
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { expected, found, .. } => {
                write!(f, "expected type {expected}, found {found}")
            }
            Self::NotCallable { found, .. } => write!(f, "value of type {found} is not callable"),
        }
    }
}

impl std::error::Error for TypeError {}

/// Raised by the optimizer when a `for`/comprehension over a literal
/// sequence would unroll past the fixed iteration cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrollLimitExceeded {
    pub limit: usize,
    pub loc: SourceLoc,
}

impl fmt::Display for UnrollLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop unrolling exceeded the {}-iteration cap", self.limit)
    }
}

impl std::error::Error for UnrollLimitExceeded {}

/// The single error type returned by [`crate::compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    Lex(LexError),
    Syntax(SyntaxError),
    Name(NameError),
    Type(TypeError),
    UnrollLimit(UnrollLimitExceeded),
}

impl CompileError {
    /// The byte offset this error is anchored to, if any.
    #[must_use]
    pub fn loc(&self) -> Option<SourceLoc> {
        match self {
            Self::Lex(LexError::InvalidCharacter { loc, .. } | LexError::UnterminatedString { loc }) => Some(*loc),
            Self::Syntax(
                SyntaxError::UnmatchedBracket { loc }
                | SyntaxError::UnexpectedToken { loc, .. }
                | SyntaxError::UnsupportedForm { loc, .. },
            ) => Some(*loc),
            Self::Syntax(SyntaxError::EmptyInput) => None,
            Self::Name(NameError::Undefined { loc, .. } | NameError::RebindReadOnly { loc, .. }) => Some(*loc),
            Self::Type(TypeError::Mismatch { loc, .. } | TypeError::NotCallable { loc, .. }) => Some(*loc),
            Self::UnrollLimit(e) => Some(e.loc),
        }
    }

    /// Renders this error with a `line:column` prefix resolved against
    /// `source`, for CLI-style diagnostics.
    #[must_use]
    pub fn render(&self, source: &str) -> String {
        match self.loc() {
            Some(loc) => {
                let pos = LineIndex::new(source).resolve(loc);
                format!("{pos}: {self}")
            }
            None => self.to_string(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(e) => write!(f, "{e}"),
            Self::Syntax(e) => write!(f, "{e}"),
            Self::Name(e) => write!(f, "{e}"),
            Self::Type(e) => write!(f, "{e}"),
            Self::UnrollLimit(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Lex(e) => Some(e),
            Self::Syntax(e) => Some(e),
            Self::Name(e) => Some(e),
            Self::Type(e) => Some(e),
            Self::UnrollLimit(e) => Some(e),
        }
    }
}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        Self::Lex(e)
    }
}

impl From<SyntaxError> for CompileError {
    fn from(e: SyntaxError) -> Self {
        Self::Syntax(e)
    }
}

impl From<NameError> for CompileError {
    fn from(e: NameError) -> Self {
        Self::Name(e)
    }
}

impl From<TypeError> for CompileError {
    fn from(e: TypeError) -> Self {
        Self::Type(e)
    }
}

impl From<UnrollLimitExceeded> for CompileError {
    fn from(e: UnrollLimitExceeded) -> Self {
        Self::UnrollLimit(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_line_column() {
        let err = CompileError::Name(NameError::Undefined { name: "z".into(), loc: SourceLoc(6) });
        assert_eq!(err.render("x = 1\nz\n"), "2:1: undefined name `z`");
    }
}
