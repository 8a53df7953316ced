//! Surface-syntax parsing: a Lisp-family reader and a bespoke imperative
//! parser, both feeding the one closed AST in [`crate::ast`].
//!
//! One entry point hands off to per-construct helpers, deciding which
//! *surface grammar* to use before parsing even starts: a leading `;` or
//! `(` selects the Lisp reader, anything else the imperative parser,
//! unless [`crate::ctx::Language`] forces one.

mod imperative;
mod lisp;

use crate::{ast::Node, ctx::Language, error::CompileError, intern::Interner};

/// Parses `source` into one AST root, auto-detecting the surface syntax
/// from its first non-whitespace character unless `forced` overrides it.
pub fn parse(source: &str, forced: Option<Language>, interner: &mut Interner) -> Result<Node, CompileError> {
    let language = forced.unwrap_or_else(|| detect(source));
    match language {
        Language::Clojure | Language::Foppl => lisp::parse(source, interner),
        Language::Python => imperative::parse(source, interner),
    }
}

fn detect(source: &str) -> Language {
    match source.trim_start().chars().next() {
        Some(';' | '(') => Language::Clojure,
        _ => Language::Python,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_lisp_from_leading_paren() {
        assert_eq!(detect("(+ 1 2)"), Language::Clojure);
    }

    #[test]
    fn detects_imperative_by_default() {
        assert_eq!(detect("x = 1"), Language::Python);
    }
}
