//! The Lisp-family surface syntax: an s-expression reader plus a dispatch
//! table from leading symbol to AST shape, in the spirit of Clojure's
//! special forms.

use crate::{
    ast::{BinOp, CallNode, CmpOp, CompareNode, DictKey, FunctionNode, Literal, Node, NodeKind, UnaryOp, UnpackTarget},
    error::{CompileError, SyntaxError},
    intern::{Interner, StringId},
    lexer::{Lexer, Token, TokenKind},
    source::SourceLoc,
};

#[derive(Debug, Clone)]
enum SExpr {
    Int(i64, SourceLoc),
    Float(f64, SourceLoc),
    Str(StringId, SourceLoc),
    Symbol(StringId, SourceLoc),
    List(Vec<SExpr>, SourceLoc),
    Vector(Vec<SExpr>, SourceLoc),
    DictLit(Vec<SExpr>, SourceLoc),
}

impl SExpr {
    fn loc(&self) -> SourceLoc {
        match self {
            Self::Int(_, l)
            | Self::Float(_, l)
            | Self::Str(_, l)
            | Self::Symbol(_, l)
            | Self::List(_, l)
            | Self::Vector(_, l)
            | Self::DictLit(_, l) => *l,
        }
    }
}

struct Reader<'a> {
    tokens: &'a [Token],
    pos: usize,
    hash_id: StringId,
}

impl<'a> Reader<'a> {
    fn peek(&self) -> Token {
        self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.bump();
        }
    }

    fn read_form(&mut self) -> Result<SExpr, SyntaxError> {
        self.skip_newlines();
        let tok = self.peek();
        match tok.kind {
            TokenKind::LParen => {
                self.bump();
                let items = self.read_seq(TokenKind::RParen)?;
                Ok(SExpr::List(items, tok.loc))
            }
            TokenKind::LBracket => {
                self.bump();
                let items = self.read_seq(TokenKind::RBracket)?;
                Ok(SExpr::Vector(items, tok.loc))
            }
            TokenKind::LBrace => {
                self.bump();
                let items = self.read_seq(TokenKind::RBrace)?;
                Ok(SExpr::DictLit(items, tok.loc))
            }
            TokenKind::Int(v) => {
                self.bump();
                Ok(SExpr::Int(v, tok.loc))
            }
            TokenKind::Float(v) => {
                self.bump();
                Ok(SExpr::Float(v, tok.loc))
            }
            TokenKind::Str(id) => {
                self.bump();
                Ok(SExpr::Str(id, tok.loc))
            }
            TokenKind::Ident(id) => {
                if id == self.hash_id && matches!(self.tokens[self.pos + 1].kind, TokenKind::LParen) {
                    return Err(SyntaxError::UnsupportedForm { form: "#()".to_owned(), loc: tok.loc });
                }
                self.bump();
                Ok(SExpr::Symbol(id, tok.loc))
            }
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                Err(SyntaxError::UnmatchedBracket { loc: tok.loc })
            }
            TokenKind::Comma | TokenKind::Colon => {
                self.bump();
                self.read_form()
            }
            TokenKind::Newline => unreachable!("skip_newlines consumed them"),
            TokenKind::Eof => Err(SyntaxError::UnexpectedToken { found: "end of input".into(), loc: tok.loc }),
        }
    }

    fn read_seq(&mut self, close: TokenKind) -> Result<Vec<SExpr>, SyntaxError> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek().kind == close {
                self.bump();
                return Ok(items);
            }
            if matches!(self.peek().kind, TokenKind::Eof) {
                return Err(SyntaxError::UnmatchedBracket { loc: self.peek().loc });
            }
            items.push(self.read_form()?);
        }
    }
}

/// Parses Lisp-family `source` into one AST root.
pub fn parse(source: &str, interner: &mut Interner) -> Result<Node, CompileError> {
    let tokens = Lexer::new(source, interner).tokenize()?;
    let hash_id = interner.intern("#");
    let mut reader = Reader { tokens: &tokens, pos: 0, hash_id };
    reader.skip_newlines();
    if matches!(reader.peek().kind, TokenKind::Eof) {
        return Err(SyntaxError::EmptyInput.into());
    }
    let mut forms = Vec::new();
    loop {
        reader.skip_newlines();
        if matches!(reader.peek().kind, TokenKind::Eof) {
            break;
        }
        forms.push(reader.read_form()?);
    }
    let nodes = forms.into_iter().map(|f| convert(f, interner)).collect::<Result<Vec<_>, SyntaxError>>()?;
    Ok(Node::body(nodes))
}

fn text<'a>(interner: &'a Interner, id: StringId) -> &'a str {
    interner.resolve(id)
}

fn symbol_node(id: StringId, loc: SourceLoc) -> Node {
    Node::new(NodeKind::Symbol(crate::ast::SymbolRef { name: id, import_source: None, resolved: None })).at(loc)
}

fn convert(expr: SExpr, interner: &mut Interner) -> Result<Node, SyntaxError> {
    match expr {
        SExpr::Int(v, loc) => Ok(Node::value(Literal::Int(v)).at(loc)),
        SExpr::Float(v, loc) => Ok(Node::value(Literal::Float(v)).at(loc)),
        SExpr::Str(id, loc) => Ok(Node::value(Literal::Str(id)).at(loc)),
        SExpr::Symbol(id, loc) => Ok(match text(interner, id) {
            "true" => Node::value(Literal::Bool(true)).at(loc),
            "false" => Node::value(Literal::Bool(false)).at(loc),
            "nil" => Node::new(NodeKind::Value(Literal::Bool(false))).at(loc),
            _ => symbol_node(id, loc),
        }),
        SExpr::Vector(items, loc) => {
            let nodes = items.into_iter().map(|i| convert(i, interner)).collect::<Result<Vec<_>, _>>()?;
            Ok(Node::new(NodeKind::Vector(nodes)).at(loc))
        }
        SExpr::DictLit(items, loc) => {
            let mut entries = indexmap::IndexMap::with_capacity(items.len() / 2);
            let mut iter = items.into_iter();
            while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                let key = dict_key(&k, interner)?;
                let value = convert(v, interner)?;
                entries.insert(key, value);
            }
            Ok(Node::new(NodeKind::Dict(entries)).at(loc))
        }
        SExpr::List(items, loc) => convert_list(items, loc, interner),
    }
}

fn dict_key(expr: &SExpr, interner: &Interner) -> Result<DictKey, SyntaxError> {
    match *expr {
        SExpr::Int(v, _) => Ok(DictKey::Int(v)),
        SExpr::Str(id, _) => Ok(DictKey::Str(id)),
        SExpr::Symbol(id, loc) => match text(interner, id) {
            "true" => Ok(DictKey::Bool(true)),
            "false" => Ok(DictKey::Bool(false)),
            _ => Ok(DictKey::Str(id)),
        },
        ref other => Err(SyntaxError::UnexpectedToken { found: "non-literal dict key".into(), loc: other.loc() }),
    }
}

fn binding_target(expr: &SExpr, interner: &Interner) -> Result<UnpackTarget, SyntaxError> {
    match expr {
        SExpr::Symbol(id, _) => Ok(UnpackTarget::Single(*id)),
        SExpr::Vector(items, loc) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    SExpr::Symbol(id, _) => names.push(*id),
                    _ => return Err(SyntaxError::UnexpectedToken { found: "non-symbol binding target".into(), loc: *loc }),
                }
            }
            Ok(UnpackTarget::Tuple(names))
        }
        other => Err(SyntaxError::UnexpectedToken { found: "invalid binding target".into(), loc: other.loc() }),
    }
}

fn binary_op(op: &str) -> Option<BinOp> {
    Some(match op {
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "*" => BinOp::Mul,
        "/" => BinOp::Div,
        "%" | "mod" => BinOp::Mod,
        "quot" => BinOp::FloorDiv,
        "**" | "pow" => BinOp::Pow,
        "<<" => BinOp::Shl,
        ">>" => BinOp::Shr,
        "bit-and" => BinOp::BitAnd,
        "bit-or" => BinOp::BitOr,
        "bit-xor" => BinOp::BitXor,
        "and" => BinOp::And,
        "or" => BinOp::Or,
        _ => return None,
    })
}

fn compare_op(op: &str) -> Option<CmpOp> {
    Some(match op {
        "=" | "==" => CmpOp::Eq,
        "not=" | "!=" => CmpOp::Ne,
        "<" => CmpOp::Lt,
        "<=" => CmpOp::Le,
        ">" => CmpOp::Gt,
        ">=" => CmpOp::Ge,
        _ => return None,
    })
}

/// Folds an n-ary arithmetic/comparison call `(op a b c ...)` into a
/// left-associated chain of binary nodes.
fn fold_nary(op: BinOp, args: Vec<Node>, loc: SourceLoc) -> Node {
    let mut iter = args.into_iter();
    let first = iter.next().unwrap_or_else(|| Node::value(Literal::Int(0)));
    iter.fold(first, |acc, next| {
        Node::new(NodeKind::Binary { left: Box::new(acc), op, right: Box::new(next) }).at(loc)
    })
}

fn convert_list(items: Vec<SExpr>, loc: SourceLoc, interner: &mut Interner) -> Result<Node, SyntaxError> {
    let Some(head) = items.first() else {
        return Ok(Node::body(vec![]).at(loc));
    };
    let head_name = match head {
        SExpr::Symbol(id, _) => Some(text(interner, *id).to_owned()),
        _ => None,
    };
    let rest = &items[1..];

    if let Some(name) = head_name.as_deref() {
        match name {
            "loop" | "apply" => {
                return Err(SyntaxError::UnsupportedForm { form: name.to_owned(), loc });
            }
            "def" => {
                let target = binding_target(&rest[0], interner)?;
                let value = convert(rest[1].clone(), interner)?;
                return Ok(Node::new(NodeKind::Def { name: target, value: Box::new(value), is_global: true }).at(loc));
            }
            "defn" | "fn" => {
                let mut idx = 0;
                let fn_name = match &rest[idx] {
                    SExpr::Symbol(id, _) if name == "defn" => {
                        idx += 1;
                        Some(*id)
                    }
                    SExpr::Symbol(id, _) => {
                        idx += 1;
                        Some(*id)
                    }
                    _ => None,
                };
                let SExpr::Vector(params, _) = &rest[idx] else {
                    return Err(SyntaxError::UnexpectedToken { found: "parameter vector".into(), loc });
                };
                let mut param_names = Vec::new();
                let mut vararg = None;
                let mut it = params.iter().peekable();
                while let Some(p) = it.next() {
                    let SExpr::Symbol(id, ploc) = p else {
                        return Err(SyntaxError::UnexpectedToken { found: "parameter".into(), loc });
                    };
                    if text(interner, *id) == "&" {
                        if let Some(SExpr::Symbol(rest_id, _)) = it.next() {
                            vararg = Some(*rest_id);
                        } else {
                            return Err(SyntaxError::UnexpectedToken { found: "vararg name".into(), loc: *ploc });
                        }
                    } else {
                        param_names.push(*id);
                    }
                }
                let body_forms = rest[idx + 1..].iter().cloned().map(|f| convert(f, interner)).collect::<Result<Vec<_>, _>>()?;
                let func = FunctionNode { name: fn_name, params: param_names, vararg, body: Box::new(Node::body(body_forms)), doc: None };
                let node = Node::new(NodeKind::Function(func)).at(loc);
                return if name == "defn" {
                    Ok(Node::new(NodeKind::Def { name: UnpackTarget::Single(fn_name.expect("defn requires a name")), value: Box::new(node), is_global: true }).at(loc))
                } else {
                    Ok(node)
                };
            }
            "let" => {
                let SExpr::Vector(bindings, _) = &rest[0] else {
                    return Err(SyntaxError::UnexpectedToken { found: "binding vector".into(), loc });
                };
                let mut targets = Vec::new();
                let mut sources = Vec::new();
                let mut it = bindings.iter();
                while let (Some(t), Some(v)) = (it.next(), it.next()) {
                    targets.push(binding_target(t, interner)?);
                    sources.push(convert(v.clone(), interner)?);
                }
                let body_forms = rest[1..].iter().cloned().map(|f| convert(f, interner)).collect::<Result<Vec<_>, _>>()?;
                return Ok(Node::new(NodeKind::Let { targets, sources, body: Box::new(Node::body(body_forms)) }).at(loc));
            }
            "do" => {
                let body_forms = rest.iter().cloned().map(|f| convert(f, interner)).collect::<Result<Vec<_>, _>>()?;
                return Ok(Node::body(body_forms).at(loc));
            }
            "if" | "if-not" => {
                let test = convert(rest[0].clone(), interner)?;
                let test = if name == "if-not" {
                    Node::new(NodeKind::Unary { op: UnaryOp::Not, item: Box::new(test) }).at(loc)
                } else {
                    test
                };
                let then_branch = convert(rest[1].clone(), interner)?;
                let else_branch = rest.get(2).cloned().map(|f| convert(f, interner)).transpose()?;
                return Ok(Node::new(NodeKind::If { test: Box::new(test), then_branch: Box::new(then_branch), else_branch: else_branch.map(Box::new) }).at(loc));
            }
            "cond" => {
                let mut pairs = rest.iter().cloned();
                let mut arms = Vec::new();
                while let (Some(test), Some(expr)) = (pairs.next(), pairs.next()) {
                    arms.push((test, expr));
                }
                let mut result: Option<Node> = None;
                for (test, expr) in arms.into_iter().rev() {
                    let is_else = matches!(&test, SExpr::Symbol(id, _) if text(interner, *id) == ":else");
                    let expr_node = convert(expr, interner)?;
                    result = Some(if is_else {
                        expr_node
                    } else {
                        let test_node = convert(test, interner)?;
                        Node::new(NodeKind::If {
                            test: Box::new(test_node),
                            then_branch: Box::new(expr_node),
                            else_branch: result.map(Box::new),
                        })
                        .at(loc)
                    });
                }
                return Ok(result.unwrap_or_else(|| Node::value(Literal::Bool(false)).at(loc)));
            }
            "for" => {
                let SExpr::Vector(spec, _) = &rest[0] else {
                    return Err(SyntaxError::UnexpectedToken { found: "for binding vector".into(), loc });
                };
                let target = binding_target(&spec[0], interner)?;
                let source = convert(spec[1].clone(), interner)?;
                let body_forms = rest[1..].iter().cloned().map(|f| convert(f, interner)).collect::<Result<Vec<_>, _>>()?;
                return Ok(Node::new(NodeKind::For { target, source: Box::new(source), body: Box::new(Node::body(body_forms)) }).at(loc));
            }
            "while" => {
                let test = convert(rest[0].clone(), interner)?;
                let body_forms = rest[1..].iter().cloned().map(|f| convert(f, interner)).collect::<Result<Vec<_>, _>>()?;
                return Ok(Node::new(NodeKind::While { test: Box::new(test), body: Box::new(Node::body(body_forms)) }).at(loc));
            }
            "sample" => {
                let dist = convert(rest[0].clone(), interner)?;
                return Ok(Node::new(NodeKind::Sample { dist: Box::new(dist) }).at(loc));
            }
            "observe" => {
                let dist = convert(rest[0].clone(), interner)?;
                let value = convert(rest[1].clone(), interner)?;
                return Ok(Node::new(NodeKind::Observe { dist: Box::new(dist), value: Box::new(value) }).at(loc));
            }
            "require" | "use" => {
                let SExpr::Symbol(module, _) = &rest[0] else {
                    return Err(SyntaxError::UnexpectedToken { found: "module name".into(), loc });
                };
                return Ok(Node::new(NodeKind::Import { module: *module, names: None, alias: None }).at(loc));
            }
            "->" | "->>" => {
                let mut acc = convert(rest[0].clone(), interner)?;
                for step in &rest[1..] {
                    acc = thread(acc, step.clone(), name == "->>", interner)?;
                }
                return Ok(acc);
            }
            _ => {}
        }
        if let Some(op) = binary_op(name) {
            let args = rest.iter().cloned().map(|f| convert(f, interner)).collect::<Result<Vec<_>, _>>()?;
            return Ok(fold_nary(op, args, loc));
        }
        if let Some(op) = compare_op(name) {
            let left = convert(rest[0].clone(), interner)?;
            let right = convert(rest[1].clone(), interner)?;
            return Ok(Node::new(NodeKind::Compare(CompareNode { left: Box::new(left), op, right: Box::new(right), second_op: None, second_right: None })).at(loc));
        }
    }

    let function = convert(head.clone(), interner)?;
    let args = rest.iter().cloned().map(|f| convert(f, interner)).collect::<Result<_, _>>()?;
    Ok(Node::new(NodeKind::Call(CallNode { function: Box::new(function), args, keyword_args: Vec::new() })).at(loc))
}

/// Inserts `acc` as the first (`->`) or last (`->>`) argument of `step`.
fn thread(acc: Node, step: SExpr, append: bool, interner: &mut Interner) -> Result<Node, SyntaxError> {
    let loc = step.loc();
    match step {
        SExpr::List(items, _) if !items.is_empty() => {
            let function = convert(items[0].clone(), interner)?;
            let mut args: Vec<Node> = items[1..].iter().cloned().map(|f| convert(f, interner)).collect::<Result<_, _>>()?;
            if append {
                args.push(acc);
            } else {
                args.insert(0, acc);
            }
            Ok(Node::new(NodeKind::Call(CallNode { function: Box::new(function), args: args.into(), keyword_args: Vec::new() })).at(loc))
        }
        other => {
            let function = convert(other, interner)?;
            Ok(Node::new(NodeKind::Call(CallNode { function: Box::new(function), args: smallvec::smallvec![acc], keyword_args: Vec::new() })).at(loc))
        }
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
    fn parses_nary_addition() {
        let node = parse_str("(+ 1 2 3)");
        assert!(matches!(node.kind, NodeKind::Binary { op: BinOp::Add, .. }));
    }

    #[test]
    fn parses_let_and_if() {
        let node = parse_str("(let [x 1] (if (< x 2) :small :big))");
        assert!(matches!(node.kind, NodeKind::Let { .. }));
    }

    #[test]
    fn sample_and_observe_parse() {
        let node = parse_str("(do (sample (normal 0 1)) (observe (normal 0 1) 2))");
        match node.kind {
            NodeKind::Body(items) => {
                assert!(matches!(items[0].kind, NodeKind::Sample { .. }));
                assert!(matches!(items[1].kind, NodeKind::Observe { .. }));
            }
            _ => panic!("expected Body"),
        }
    }

    #[test]
    fn loop_form_is_rejected() {
        let mut interner = Interner::new();
        let err = parse("(loop [x 0] x)", &mut interner).unwrap_err();
        assert!(matches!(err, CompileError::Syntax(SyntaxError::UnsupportedForm { .. })));
    }

    #[test]
    fn apply_form_is_rejected() {
        let mut interner = Interner::new();
        let err = parse("(apply + [1 2])", &mut interner).unwrap_err();
        assert!(matches!(err, CompileError::Syntax(SyntaxError::UnsupportedForm { .. })));
    }

    #[test]
    fn anon_fn_literal_is_rejected() {
        let mut interner = Interner::new();
        let err = parse("(#(+ % 1) 2)", &mut interner).unwrap_err();
        assert!(matches!(err, CompileError::Syntax(SyntaxError::UnsupportedForm { .. })));
    }
}
