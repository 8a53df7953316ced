//! Character-category lexer shared by both surface parsers.
//!
//! Neither FOPPL surface syntax is real Python or real Clojure, so this is
//! a hand-rolled scanner rather than a borrowed Python/Clojure front end: a
//! character-category table drives a single pass
//! that produces a flat token stream, and the two parsers in
//! [`crate::parse`] each interpret that stream their own way. Keyword
//! reclassification (`if`, `let`, `def`, ...) is deliberately left to the
//! parsers rather than done here, since the two surfaces don't share a
//! keyword set.

use crate::{
    error::LexError,
    intern::{Interner, StringId},
    source::SourceLoc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharCategory {
    Whitespace,
    Newline,
    Alpha,
    Numeric,
    Symbol,
    Delimiter,
    StringDelim,
    LineComment,
    LeftBracket,
    RightBracket,
    Invalid,
}

fn categorize(c: char) -> CharCategory {
    match c {
        '\n' => CharCategory::Newline,
        c if c.is_whitespace() => CharCategory::Whitespace,
        '(' | '[' | '{' => CharCategory::LeftBracket,
        ')' | ']' | '}' => CharCategory::RightBracket,
        '"' => CharCategory::StringDelim,
        ';' => CharCategory::LineComment,
        ',' | ':' => CharCategory::Delimiter,
        c if c.is_ascii_digit() => CharCategory::Numeric,
        c if c.is_alphabetic() || c == '_' => CharCategory::Alpha,
        '+' | '-' | '*' | '/' | '%' | '<' | '>' | '=' | '!' | '&' | '|' | '^' | '~' | '.' | '?' | '#' => {
            CharCategory::Symbol
        }
        c if c.is_ascii() => CharCategory::Invalid,
        _ => CharCategory::Symbol,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Ident(StringId),
    Int(i64),
    Float(f64),
    Str(StringId),
    Newline,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: SourceLoc,
}

/// A byte-indexed cursor over the source text.
struct CharStream<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> CharStream<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, chars: source.char_indices().peekable() }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_offset(&mut self) -> u32 {
        self.chars.peek().map_or(self.source.len() as u32, |&(i, _)| i as u32)
    }

    fn advance(&mut self) -> Option<(u32, char)> {
        self.chars.next().map(|(i, c)| (i as u32, c))
    }
}

pub struct Lexer<'a> {
    stream: CharStream<'a>,
    interner: &'a mut Interner,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(source: &'a str, interner: &'a mut Interner) -> Self {
        Self { stream: CharStream::new(source), interner }
    }

    /// Lexes the entire source into a flat token stream, terminated by one
    /// trailing [`TokenKind::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let loc = SourceLoc(self.stream.peek_offset());
            let Some(c) = self.stream.peek() else {
                tokens.push(Token { kind: TokenKind::Eof, loc });
                return Ok(tokens);
            };
            let kind = match categorize(c) {
                CharCategory::Newline => {
                    self.stream.advance();
                    TokenKind::Newline
                }
                CharCategory::LeftBracket => {
                    self.stream.advance();
                    match c {
                        '(' => TokenKind::LParen,
                        '[' => TokenKind::LBracket,
                        _ => TokenKind::LBrace,
                    }
                }
                CharCategory::RightBracket => {
                    self.stream.advance();
                    match c {
                        ')' => TokenKind::RParen,
                        ']' => TokenKind::RBracket,
                        _ => TokenKind::RBrace,
                    }
                }
                CharCategory::Delimiter => {
                    self.stream.advance();
                    if c == ',' { TokenKind::Comma } else { TokenKind::Colon }
                }
                CharCategory::StringDelim => self.read_string(loc)?,
                CharCategory::Numeric => self.read_number(loc),
                CharCategory::Alpha => self.read_identifier(loc),
                CharCategory::Symbol => self.read_operator(loc),
                CharCategory::Invalid => return Err(LexError::InvalidCharacter { ch: c, loc }),
                CharCategory::Whitespace | CharCategory::LineComment => unreachable!("consumed by skip_trivia"),
            };
            tokens.push(Token { kind, loc });
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.stream.peek() {
                Some(c) if categorize(c) == CharCategory::Whitespace => {
                    self.stream.advance();
                }
                Some(c) if categorize(c) == CharCategory::LineComment => {
                    while let Some(c) = self.stream.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.stream.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_identifier(&mut self, loc: SourceLoc) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.stream.peek() {
            let cat = categorize(c);
            if cat == CharCategory::Alpha || cat == CharCategory::Numeric || c == '-' || c == '?' || c == '!' {
                text.push(c);
                self.stream.advance();
            } else {
                break;
            }
        }
        let _ = loc;
        TokenKind::Ident(self.interner.intern(&text))
    }

    /// Maximal run of symbol characters: covers operators like `+`, `->`,
    /// `->>`, `<=`, `==` with a single rule instead of one token kind each.
    fn read_operator(&mut self, _loc: SourceLoc) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.stream.peek() {
            if categorize(c) == CharCategory::Symbol {
                text.push(c);
                self.stream.advance();
            } else {
                break;
            }
        }
        TokenKind::Ident(self.interner.intern(&text))
    }

    fn read_number(&mut self, loc: SourceLoc) -> TokenKind {
        let mut text = String::new();
        if self.stream.peek() == Some('0') {
            let mut clone_chars = self.stream.chars.clone();
            clone_chars.next();
            if let Some(&(_, base_char)) = clone_chars.peek() {
                if matches!(base_char, 'b' | 'o' | 'x' | 'B' | 'O' | 'X') {
                    self.stream.advance();
                    self.stream.advance();
                    let radix = match base_char.to_ascii_lowercase() {
                        'b' => 2,
                        'o' => 8,
                        _ => 16,
                    };
                    let mut digits = String::new();
                    while let Some(c) = self.stream.peek() {
                        if c.is_digit(radix) || c == '_' {
                            if c != '_' {
                                digits.push(c);
                            }
                            self.stream.advance();
                        } else {
                            break;
                        }
                    }
                    let value = i64::from_str_radix(&digits, radix).unwrap_or(0);
                    let _ = loc;
                    return TokenKind::Int(value);
                }
            }
        }
        let mut is_float = false;
        while let Some(c) = self.stream.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    text.push(c);
                }
                self.stream.advance();
            } else {
                break;
            }
        }
        if self.stream.peek() == Some('.') {
            let mut lookahead = self.stream.chars.clone();
            lookahead.next();
            if lookahead.peek().is_some_and(|&(_, c)| c.is_ascii_digit()) {
                is_float = true;
                text.push('.');
                self.stream.advance();
                while let Some(c) = self.stream.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.stream.advance();
                    } else {
                        break;
                    }
                }
            }
        }
        if matches!(self.stream.peek(), Some('e' | 'E')) {
            is_float = true;
            text.push('e');
            self.stream.advance();
            if matches!(self.stream.peek(), Some('+' | '-')) {
                let (_, sign) = self.stream.advance().expect("peeked");
                text.push(sign);
            }
            while let Some(c) = self.stream.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.stream.advance();
                } else {
                    break;
                }
            }
        }
        if is_float {
            TokenKind::Float(text.parse().unwrap_or(0.0))
        } else {
            TokenKind::Int(text.parse().unwrap_or(0))
        }
    }

    fn read_string(&mut self, loc: SourceLoc) -> Result<TokenKind, LexError> {
        self.stream.advance();
        let mut text = String::new();
        loop {
            match self.stream.advance() {
                None => return Err(LexError::UnterminatedString { loc }),
                Some((_, '"')) => break,
                Some((_, '\\')) => match self.stream.advance() {
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, 't')) => text.push('\t'),
                    Some((_, 'r')) => text.push('\r'),
                    Some((_, '\\')) => text.push('\\'),
                    Some((_, '"')) => text.push('"'),
                    Some((_, other)) => text.push(other),
                    None => return Err(LexError::UnterminatedString { loc }),
                },
                Some((_, c)) => text.push(c),
            }
        }
        Ok(TokenKind::Str(self.interner.intern(&text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> (Vec<TokenKind>, Interner) {
        let mut interner = Interner::new();
        let tokens = Lexer::new(source, &mut interner).tokenize().unwrap().into_iter().map(|t| t.kind).collect();
        (tokens, interner)
    }

    #[test]
    fn lexes_parens_and_symbols() {
        let (tokens, interner) = lex("(+ 1 2)");
        assert_eq!(tokens[0], TokenKind::LParen);
        match tokens[1] {
            TokenKind::Ident(id) => assert_eq!(interner.resolve(id), "+"),
            _ => panic!("expected Ident"),
        }
        assert_eq!(tokens[2], TokenKind::Int(1));
        assert_eq!(tokens[3], TokenKind::Int(2));
        assert_eq!(tokens[4], TokenKind::RParen);
        assert_eq!(tokens[5], TokenKind::Eof);
    }

    #[test]
    fn lexes_hex_and_float_literals() {
        let (tokens, _) = lex("0x1F 1.5e10");
        assert_eq!(tokens[0], TokenKind::Int(31));
        assert_eq!(tokens[1], TokenKind::Float(1.5e10));
    }

    #[test]
    fn lexes_string_with_escapes() {
        let (tokens, interner) = lex("\"a\\nb\"");
        match tokens[0] {
            TokenKind::Str(id) => assert_eq!(interner.resolve(id), "a\nb"),
            _ => panic!("expected Str"),
        }
    }

    #[test]
    fn skips_line_comments() {
        let (tokens, _) = lex("1 ; comment\n2");
        assert_eq!(tokens[0], TokenKind::Int(1));
        assert_eq!(tokens[1], TokenKind::Newline);
        assert_eq!(tokens[2], TokenKind::Int(2));
    }

    #[test]
    fn rejects_invalid_character() {
        let mut interner = Interner::new();
        let err = Lexer::new("1 ` 2", &mut interner).tokenize().unwrap_err();
        assert!(matches!(err, LexError::InvalidCharacter { ch: '`', .. }));
    }
}
