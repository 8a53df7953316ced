//! The imperative surface syntax: Python-shaped statements over the same
//! closed AST the Lisp reader produces.
//!
//! Blocks are indentation-delimited the way Python's are, but instead of an
//! INDENT/DEDENT token stream this groups physical *lines* into a tree by
//! indentation width first, then tokenizes and parses each line's text with
//! the shared [`crate::lexer`]. One statement per logical line is assumed;
//! parenthesized line continuations are not supported, matching the scope
//! of the imperative examples in practice.

use crate::{
    ast::{BinOp, CallNode, CmpOp, CompareNode, FunctionNode, Literal, Node, NodeKind, UnaryOp, UnpackTarget},
    error::{CompileError, SyntaxError},
    intern::{Interner, StringId},
    lexer::{Lexer, Token, TokenKind},
    source::SourceLoc,
};

struct Line {
    indent: usize,
    text: String,
    offset: u32,
    children: Vec<Line>,
}

/// Groups `source`'s physical lines into a tree by leading-whitespace width.
fn blockify(source: &str) -> Vec<Line> {
    let mut flat = Vec::new();
    let mut offset = 0u32;
    for raw in source.lines() {
        let trimmed = raw.trim_end();
        let stripped = trimmed.trim_start();
        if !stripped.is_empty() && !stripped.starts_with('#') {
            let indent = trimmed.len() - stripped.len();
            flat.push((indent, stripped.to_owned(), offset + indent as u32));
        }
        offset += raw.len() as u32 + 1;
    }
    build_tree(&flat, 0, flat.len()).0
}

fn build_tree(flat: &[(usize, String, u32)], start: usize, end: usize) -> (Vec<Line>, usize) {
    let mut out = Vec::new();
    let mut i = start;
    if i >= end {
        return (out, i);
    }
    let base_indent = flat[i].0;
    while i < end && flat[i].0 == base_indent {
        let (indent, text, offset) = flat[i].clone();
        let mut j = i + 1;
        while j < end && flat[j].0 > indent {
            j += 1;
        }
        let (children, _) = build_tree(flat, i + 1, j);
        out.push(Line { indent, text, offset, children });
        i = j;
    }
    (out, i)
}

/// Parses imperative `source` into one AST root.
pub fn parse(source: &str, interner: &mut Interner) -> Result<Node, CompileError> {
    let lines = blockify(source);
    if lines.is_empty() {
        return Err(SyntaxError::EmptyInput.into());
    }
    let body = parse_block(&lines, interner)?;
    Ok(Node::body(body))
}

fn parse_block(lines: &[Line], interner: &mut Interner) -> Result<Vec<Node>, CompileError> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let (node, consumed) = parse_statement(lines, i, interner)?;
        out.push(node);
        i += consumed;
    }
    Ok(out)
}

fn tokenize_line(text: &str, offset: u32, interner: &mut Interner) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Lexer::new(text, interner).tokenize()?;
    for tok in &mut tokens {
        tok.loc = SourceLoc(tok.loc.0 + offset);
    }
    Ok(tokens)
}

/// Parses the statement starting at `lines[i]`, returning it and how many
/// sibling lines it consumed (more than 1 only for block headers, which own
/// their `children` rather than following siblings).
fn parse_statement(lines: &[Line], i: usize, interner: &mut Interner) -> Result<(Node, usize), CompileError> {
    let line = &lines[i];
    let loc = SourceLoc(line.offset);
    let text = line.text.as_str();

    if let Some(rest) = text.strip_prefix("if ") {
        let (cond_src, _) = split_trailing_colon(rest)?;
        let test = parse_expr_str(cond_src, line.offset + 3, interner)?;
        let then_branch = Node::body(parse_block(&line.children, interner)?);
        let mut j = i + 1;
        let mut else_branch = None;
        if j < lines.len() {
            if let Some(rest) = lines[j].text.strip_prefix("elif ") {
                let (inner, consumed) = parse_elif_chain(lines, j, rest, interner)?;
                else_branch = Some(Box::new(inner));
                j += consumed;
            } else if lines[j].text.trim() == "else:" {
                else_branch = Some(Box::new(Node::body(parse_block(&lines[j].children, interner)?)));
                j += 1;
            }
        }
        return Ok((
            Node::new(NodeKind::If { test: Box::new(test), then_branch: Box::new(then_branch), else_branch }).at(loc),
            j - i,
        ));
    }

    if let Some(rest) = text.strip_prefix("for ") {
        let (head, _) = split_trailing_colon(rest)?;
        let (target_src, source_src) = split_once_keyword(head, " in ")
            .ok_or(SyntaxError::UnexpectedToken { found: "missing `in`".into(), loc })?;
        let target = parse_target_str(target_src, interner)?;
        let source = parse_expr_str(source_src, line.offset, interner)?;
        let mut body_stmts = parse_block(&line.children, interner)?;
        let mut j = i + 1;
        if j < lines.len() && lines[j].text.trim() == "else:" {
            body_stmts.extend(parse_block(&lines[j].children, interner)?);
            j += 1;
        }
        return Ok((
            Node::new(NodeKind::For { target, source: Box::new(source), body: Box::new(Node::body(body_stmts)) }).at(loc),
            j - i,
        ));
    }

    if let Some(rest) = text.strip_prefix("while ") {
        let (cond_src, _) = split_trailing_colon(rest)?;
        let test = parse_expr_str(cond_src, line.offset + 6, interner)?;
        let mut body_stmts = parse_block(&line.children, interner)?;
        let mut j = i + 1;
        if j < lines.len() && lines[j].text.trim() == "else:" {
            body_stmts.extend(parse_block(&lines[j].children, interner)?);
            j += 1;
        }
        return Ok((Node::new(NodeKind::While { test: Box::new(test), body: Box::new(Node::body(body_stmts)) }).at(loc), j - i));
    }

    if let Some(rest) = text.strip_prefix("def ") {
        let open = rest.find('(').ok_or(SyntaxError::UnexpectedToken { found: "(".into(), loc })?;
        let name_text = rest[..open].trim();
        let name_id = interner.intern(name_text);
        let close = rest.rfind(')').ok_or(SyntaxError::UnexpectedToken { found: ")".into(), loc })?;
        let params_src = &rest[open + 1..close];
        let (params, vararg) = parse_params(params_src, interner);
        let body = Node::body(parse_block(&line.children, interner)?);
        let func = FunctionNode { name: Some(name_id), params, vararg, body: Box::new(body), doc: None };
        return Ok((
            Node::new(NodeKind::Def {
                name: UnpackTarget::Single(name_id),
                value: Box::new(Node::new(NodeKind::Function(func)).at(loc)),
                is_global: true,
            })
            .at(loc),
            1,
        ));
    }

    if let Some(rest) = text.strip_prefix("return") {
        let rest = rest.trim();
        let value = if rest.is_empty() { None } else { Some(Box::new(parse_expr_str(rest, line.offset + 6, interner)?)) };
        return Ok((Node::new(NodeKind::Return(value)).at(loc), 1));
    }

    if text.trim() == "break" {
        return Ok((Node::new(NodeKind::Break).at(loc), 1));
    }

    if let Some(rest) = text.strip_prefix("import ") {
        let module = interner.intern(rest.trim());
        return Ok((Node::new(NodeKind::Import { module, names: None, alias: None }).at(loc), 1));
    }

    if let Some(rest) = text.strip_prefix("from ") {
        let (module_src, names_src) =
            split_once_keyword(rest, " import ").ok_or(SyntaxError::UnexpectedToken { found: "import".into(), loc })?;
        let module = interner.intern(module_src.trim());
        let names = names_src.split(',').map(|n| interner.intern(n.trim())).collect();
        return Ok((Node::new(NodeKind::Import { module, names: Some(names), alias: None }).at(loc), 1));
    }

    // Assignment: `target[, target...] = expr`, else a bare expression statement.
    if let Some(eq) = find_top_level_assign(text) {
        let (targets_src, value_src) = (text[..eq].trim(), text[eq + 1..].trim());
        let target = parse_target_str(targets_src, interner)?;
        let value = parse_expr_str(value_src, line.offset + eq as u32 + 1, interner)?;
        return Ok((Node::new(NodeKind::Def { name: target, value: Box::new(value), is_global: false }).at(loc), 1));
    }

    Ok((parse_expr_str(text, line.offset, interner)?, 1))
}

fn parse_elif_chain(lines: &[Line], i: usize, rest: &str, interner: &mut Interner) -> Result<(Node, usize), CompileError> {
    let loc = SourceLoc(lines[i].offset);
    let (cond_src, _) = split_trailing_colon(rest)?;
    let test = parse_expr_str(cond_src, lines[i].offset + 5, interner)?;
    let then_branch = Node::body(parse_block(&lines[i].children, interner)?);
    let mut j = i + 1;
    let mut else_branch = None;
    if j < lines.len() {
        if let Some(rest) = lines[j].text.strip_prefix("elif ") {
            let (inner, consumed) = parse_elif_chain(lines, j, rest, interner)?;
            else_branch = Some(Box::new(inner));
            j += consumed;
        } else if lines[j].text.trim() == "else:" {
            else_branch = Some(Box::new(Node::body(parse_block(&lines[j].children, interner)?)));
            j += 1;
        }
    }
    Ok((
        Node::new(NodeKind::If { test: Box::new(test), then_branch: Box::new(then_branch), else_branch }).at(loc),
        j - i,
    ))
}

fn split_trailing_colon(s: &str) -> Result<(&str, ()), SyntaxError> {
    let s = s.trim();
    s.strip_suffix(':').map(|inner| (inner.trim(), ())).ok_or(SyntaxError::UnexpectedToken {
        found: "missing trailing `:`".into(),
        loc: SourceLoc::default(),
    })
}

fn split_once_keyword<'a>(s: &'a str, kw: &str) -> Option<(&'a str, &'a str)> {
    s.find(kw).map(|idx| (&s[..idx], &s[idx + kw.len()..]))
}

/// Finds the `=` of a top-level assignment, ignoring `==`, `!=`, `<=`, `>=`
/// and anything nested inside brackets.
fn find_top_level_assign(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 => {
                let prev = if i == 0 { 0 } else { bytes[i - 1] };
                let next = bytes.get(i + 1).copied().unwrap_or(0);
                if prev != b'=' && prev != b'!' && prev != b'<' && prev != b'>' && next != b'=' {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn parse_params(src: &str, interner: &mut Interner) -> (Vec<StringId>, Option<StringId>) {
    let mut params = Vec::new();
    let mut vararg = None;
    for part in src.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(name) = part.strip_prefix('*') {
            vararg = Some(interner.intern(name.trim()));
        } else {
            params.push(interner.intern(part));
        }
    }
    (params, vararg)
}

fn parse_target_str(src: &str, interner: &mut Interner) -> Result<UnpackTarget, CompileError> {
    let src = src.trim();
    if src.contains(',') {
        let names = src.split(',').map(|n| interner.intern(n.trim())).collect();
        Ok(UnpackTarget::Tuple(names))
    } else {
        Ok(UnpackTarget::Single(interner.intern(src)))
    }
}

fn parse_expr_str(src: &str, offset: u32, interner: &mut Interner) -> Result<Node, CompileError> {
    let tokens = tokenize_line(src, offset, interner)?;
    let mut parser = ExprParser { tokens: &tokens, pos: 0, interner };
    let node = parser.parse_expr()?;
    Ok(node)
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    interner: &'a mut Interner,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Token {
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let t = self.peek();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn ident_text(&self, id: StringId) -> &str {
        self.interner.resolve(id)
    }

    fn at_ident(&self, word: &str) -> bool {
        matches!(self.peek().kind, TokenKind::Ident(id) if self.ident_text(id) == word)
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if self.at_ident(word) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self) -> Result<Node, CompileError> {
        self.parse_lambda()
    }

    fn parse_lambda(&mut self) -> Result<Node, CompileError> {
        if self.eat_ident("lambda") {
            let loc = self.peek().loc;
            let mut params = Vec::new();
            while !matches!(self.peek().kind, TokenKind::Colon) {
                if let TokenKind::Ident(id) = self.peek().kind {
                    params.push(id);
                    self.bump();
                }
                if matches!(self.peek().kind, TokenKind::Comma) {
                    self.bump();
                }
            }
            self.bump();
            let body = self.parse_or()?;
            let func = FunctionNode { name: None, params, vararg: None, body: Box::new(body), doc: None };
            return Ok(Node::new(NodeKind::Function(func)).at(loc));
        }
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_and()?;
        while self.at_ident("or") {
            let loc = self.bump().loc;
            let right = self.parse_and()?;
            left = Node::new(NodeKind::Binary { left: Box::new(left), op: BinOp::Or, right: Box::new(right) }).at(loc);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_not()?;
        while self.at_ident("and") {
            let loc = self.bump().loc;
            let right = self.parse_not()?;
            left = Node::new(NodeKind::Binary { left: Box::new(left), op: BinOp::And, right: Box::new(right) }).at(loc);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Node, CompileError> {
        if self.eat_ident("not") {
            let loc = self.peek().loc;
            let item = self.parse_not()?;
            return Ok(Node::new(NodeKind::Unary { op: UnaryOp::Not, item: Box::new(item) }).at(loc));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Node, CompileError> {
        let left = self.parse_bitor()?;
        if let Some((op, loc)) = self.read_cmp_op() {
            let right = self.parse_bitor()?;
            let mut second_op = None;
            let mut second_right = None;
            if let Some((op2, _)) = self.read_cmp_op() {
                second_op = Some(op2);
                second_right = Some(Box::new(self.parse_bitor()?));
            }
            return Ok(Node::new(NodeKind::Compare(CompareNode {
                left: Box::new(left),
                op,
                right: Box::new(right),
                second_op,
                second_right,
            }))
            .at(loc));
        }
        Ok(left)
    }

    /// Consumes a comparison operator token (or `is not` / `not in` pair),
    /// returning it along with its source location.
    fn read_cmp_op(&mut self) -> Option<(CmpOp, SourceLoc)> {
        if self.at_ident("not") && matches!(self.tokens.get(self.pos + 1).map(|t| t.kind), Some(TokenKind::Ident(id)) if self.ident_text(id) == "in") {
            let loc = self.bump().loc;
            self.bump();
            return Some((CmpOp::NotIn, loc));
        }
        let TokenKind::Ident(id) = self.peek().kind else { return None };
        let op = match self.ident_text(id) {
            "==" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::Le,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::Ge,
            "is" => CmpOp::Is,
            "in" => CmpOp::In,
            _ => return None,
        };
        let loc = self.bump().loc;
        if op == CmpOp::Is && self.eat_ident("not") {
            return Some((CmpOp::IsNot, loc));
        }
        Some((op, loc))
    }

    fn parse_bitor(&mut self) -> Result<Node, CompileError> {
        self.parse_binop_level(&[("|", BinOp::BitOr)], Self::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> Result<Node, CompileError> {
        self.parse_binop_level(&[("^", BinOp::BitXor)], Self::parse_bitand)
    }

    fn parse_bitand(&mut self) -> Result<Node, CompileError> {
        self.parse_binop_level(&[("&", BinOp::BitAnd)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<Node, CompileError> {
        self.parse_binop_level(&[("<<", BinOp::Shl), (">>", BinOp::Shr)], Self::parse_additive)
    }

    fn parse_additive(&mut self) -> Result<Node, CompileError> {
        self.parse_binop_level(&[("+", BinOp::Add), ("-", BinOp::Sub)], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Result<Node, CompileError> {
        self.parse_binop_level(
            &[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Mod), ("//", BinOp::FloorDiv)],
            Self::parse_unary,
        )
    }

    fn parse_binop_level(
        &mut self,
        ops: &[(&str, BinOp)],
        mut next: impl FnMut(&mut Self) -> Result<Node, CompileError>,
    ) -> Result<Node, CompileError> {
        let mut left = next(self)?;
        loop {
            let matched = match self.peek().kind {
                TokenKind::Ident(id) => {
                    let text = self.ident_text(id);
                    ops.iter().find(|(s, _)| *s == text).map(|&(_, op)| op)
                }
                _ => None,
            };
            let Some(op) = matched else { break };
            let loc = self.bump().loc;
            let right = next(self)?;
            left = Node::new(NodeKind::Binary { left: Box::new(left), op, right: Box::new(right) }).at(loc);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, CompileError> {
        match self.peek().kind {
            TokenKind::Ident(id) if self.ident_text(id) == "-" => {
                let loc = self.bump().loc;
                let item = self.parse_unary()?;
                Ok(Node::new(NodeKind::Unary { op: UnaryOp::Neg, item: Box::new(item) }).at(loc))
            }
            TokenKind::Ident(id) if self.ident_text(id) == "+" => {
                let loc = self.bump().loc;
                let item = self.parse_unary()?;
                Ok(Node::new(NodeKind::Unary { op: UnaryOp::Pos, item: Box::new(item) }).at(loc))
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Node, CompileError> {
        let base = self.parse_postfix()?;
        if matches!(self.peek().kind, TokenKind::Ident(id) if self.ident_text(id) == "**") {
            let loc = self.bump().loc;
            let exp = self.parse_unary()?;
            return Ok(Node::new(NodeKind::Binary { left: Box::new(base), op: BinOp::Pow, right: Box::new(exp) }).at(loc));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Node, CompileError> {
        let mut node = self.parse_atom()?;
        loop {
            match self.peek().kind {
                TokenKind::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    let mut keyword_args = Vec::new();
                    while !matches!(self.peek().kind, TokenKind::RParen) {
                        if let (TokenKind::Ident(id), true) = (self.peek().kind, self.is_kwarg_ahead()) {
                            self.bump();
                            self.bump();
                            keyword_args.push((id, self.parse_expr()?));
                        } else {
                            args.push(self.parse_expr()?);
                        }
                        if matches!(self.peek().kind, TokenKind::Comma) {
                            self.bump();
                        }
                    }
                    let loc = self.bump().loc;
                    node = Node::new(NodeKind::Call(CallNode { function: Box::new(node), args: args.into(), keyword_args })).at(loc);
                }
                TokenKind::LBracket => {
                    let loc = self.bump().loc;
                    let start = if matches!(self.peek().kind, TokenKind::Colon) { None } else { Some(Box::new(self.parse_expr()?)) };
                    if matches!(self.peek().kind, TokenKind::Colon) {
                        self.bump();
                        let stop = if matches!(self.peek().kind, TokenKind::RBracket) { None } else { Some(Box::new(self.parse_expr()?)) };
                        self.expect_rbracket()?;
                        node = Node::new(NodeKind::Slice { base: Box::new(node), start, stop }).at(loc);
                    } else {
                        let index = start.expect("non-slice subscript needs an index");
                        self.expect_rbracket()?;
                        node = Node::new(NodeKind::Subscript { base: Box::new(node), index, default: None }).at(loc);
                    }
                }
                TokenKind::Ident(id) if self.ident_text(id) == "." => {
                    let loc = self.bump().loc;
                    let attr = match self.bump().kind {
                        TokenKind::Ident(name) => name,
                        _ => return Err(SyntaxError::UnexpectedToken { found: "attribute name".into(), loc }.into()),
                    };
                    node = Node::new(NodeKind::Attribute { base: Box::new(node), attr }).at(loc);
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn is_kwarg_ahead(&self) -> bool {
        matches!(self.tokens.get(self.pos + 1).map(|t| t.kind), Some(TokenKind::Ident(id)) if self.ident_text(id) == "=")
    }

    fn expect_rbracket(&mut self) -> Result<(), CompileError> {
        if matches!(self.peek().kind, TokenKind::RBracket) {
            self.bump();
            Ok(())
        } else {
            Err(SyntaxError::UnmatchedBracket { loc: self.peek().loc }.into())
        }
    }

    fn parse_atom(&mut self) -> Result<Node, CompileError> {
        let tok = self.bump();
        match tok.kind {
            TokenKind::Int(v) => Ok(Node::value(Literal::Int(v)).at(tok.loc)),
            TokenKind::Float(v) => Ok(Node::value(Literal::Float(v)).at(tok.loc)),
            TokenKind::Str(id) => Ok(Node::value(Literal::Str(id)).at(tok.loc)),
            TokenKind::Ident(id) => match self.ident_text(id) {
                "True" => Ok(Node::value(Literal::Bool(true)).at(tok.loc)),
                "False" => Ok(Node::value(Literal::Bool(false)).at(tok.loc)),
                _ => Ok(Node::new(NodeKind::Symbol(crate::ast::SymbolRef { name: id, import_source: None, resolved: None })).at(tok.loc)),
            },
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                if matches!(self.peek().kind, TokenKind::RParen) {
                    self.bump();
                }
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_bracket_literal(tok.loc),
            TokenKind::LBrace => self.parse_dict_literal(tok.loc),
            _ => Err(SyntaxError::UnexpectedToken { found: format!("{:?}", tok.kind), loc: tok.loc }.into()),
        }
    }

    /// Either a vector literal `[a, b, c]` or a comprehension
    /// `[expr for target in source if filter]`.
    fn parse_bracket_literal(&mut self, loc: SourceLoc) -> Result<Node, CompileError> {
        if matches!(self.peek().kind, TokenKind::RBracket) {
            self.bump();
            return Ok(Node::new(NodeKind::Vector(Vec::new())).at(loc));
        }
        let first = self.parse_expr()?;
        if self.eat_ident("for") {
            let target = self.parse_comprehension_target()?;
            if !self.eat_ident("in") {
                return Err(SyntaxError::UnexpectedToken { found: "in".into(), loc }.into());
            }
            let source = self.parse_or()?;
            let filter = if self.eat_ident("if") { Some(Box::new(self.parse_or()?)) } else { None };
            self.expect_rbracket()?;
            return Ok(Node::new(NodeKind::ListFor { target, source: Box::new(source), expr: Box::new(first), filter }).at(loc));
        }
        let mut items = vec![first];
        while matches!(self.peek().kind, TokenKind::Comma) {
            self.bump();
            if matches!(self.peek().kind, TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_expr()?);
        }
        self.expect_rbracket()?;
        Ok(Node::new(NodeKind::Vector(items)).at(loc))
    }

    fn parse_comprehension_target(&mut self) -> Result<UnpackTarget, CompileError> {
        let TokenKind::Ident(first) = self.bump().kind else {
            return Err(SyntaxError::UnexpectedToken { found: "comprehension target".into(), loc: self.peek().loc }.into());
        };
        if matches!(self.peek().kind, TokenKind::Comma) {
            let mut names = vec![first];
            while matches!(self.peek().kind, TokenKind::Comma) {
                self.bump();
                if let TokenKind::Ident(id) = self.bump().kind {
                    names.push(id);
                }
            }
            Ok(UnpackTarget::Tuple(names))
        } else {
            Ok(UnpackTarget::Single(first))
        }
    }

    fn parse_dict_literal(&mut self, loc: SourceLoc) -> Result<Node, CompileError> {
        let mut entries = indexmap::IndexMap::new();
        while !matches!(self.peek().kind, TokenKind::RBrace) {
            let key_node = self.parse_expr()?;
            let key = literal_dict_key(&key_node, loc)?;
            if matches!(self.peek().kind, TokenKind::Colon) {
                self.bump();
            }
            let value = self.parse_expr()?;
            entries.insert(key, value);
            if matches!(self.peek().kind, TokenKind::Comma) {
                self.bump();
            }
        }
        self.bump();
        Ok(Node::new(NodeKind::Dict(entries)).at(loc))
    }
}

fn literal_dict_key(node: &Node, loc: SourceLoc) -> Result<crate::ast::DictKey, CompileError> {
    match &node.kind {
        NodeKind::Value(Literal::Int(v)) => Ok(crate::ast::DictKey::Int(*v)),
        NodeKind::Value(Literal::Bool(v)) => Ok(crate::ast::DictKey::Bool(*v)),
        NodeKind::Value(Literal::Str(id)) => Ok(crate::ast::DictKey::Str(*id)),
        NodeKind::Symbol(sym) => Ok(crate::ast::DictKey::Str(sym.name)),
        _ => Err(SyntaxError::UnexpectedToken { found: "non-literal dict key".into(), loc }.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(src: &str) -> Node {
        let mut interner = Interner::new();
        parse(src, &mut interner).unwrap()
    }

    #[test]
    fn parses_assignment_and_if() {
        let node = parse_str("x = 1\nif x < 2:\n    y = x\nelse:\n    y = 0\n");
        match node.kind {
            NodeKind::Body(items) => {
                assert!(matches!(items[0].kind, NodeKind::Def { .. }));
                assert!(matches!(items[1].kind, NodeKind::If { .. }));
            }
            _ => panic!("expected Body"),
        }
    }

    #[test]
    fn parses_def_and_return() {
        let node = parse_str("def f(x, y):\n    return x + y\n");
        assert!(matches!(node.kind, NodeKind::Def { .. }));
    }

    #[test]
    fn parses_list_comprehension() {
        let node = parse_str("[x * 2 for x in xs if x > 0]");
        assert!(matches!(node.kind, NodeKind::ListFor { .. }));
    }

    #[test]
    fn parses_for_loop() {
        let node = parse_str("for x in xs:\n    y = x\n");
        assert!(matches!(node.kind, NodeKind::For { .. }));
    }
}
