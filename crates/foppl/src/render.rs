//! Renders an AST expression back to the Python-like textual surface an
//! external runtime contract expects to `eval`: a module-level `dist`
//! namespace, a `state` mapping, `math.*`.
//!
//! This is a one-way pretty-printer, not a parser inverse: it exists only so
//! the graph/codegen stages can turn a (by then atomic) expression subtree
//! into the text a `sample_code`/`logpdf_code` string embeds.

use crate::ast::{BinOp, CmpOp, DictKey, Literal, Node, NodeKind, UnaryOp};
use crate::intern::Interner;

pub fn render(node: &Node, interner: &Interner) -> String {
    match &node.kind {
        NodeKind::Value(lit) => render_literal(lit, interner),
        NodeKind::ValueVector(items) => render_literal_list(items, interner),
        NodeKind::Symbol(sym) => interner.resolve(sym.name).to_owned(),
        NodeKind::Vector(items) => {
            let parts: Vec<String> = items.iter().map(|i| render(i, interner)).collect();
            format!("[{}]", parts.join(", "))
        }
        NodeKind::Dict(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", render_dict_key(k, interner), render(v, interner)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        NodeKind::Binary { left, op, right } => {
            format!("({} {} {})", render(left, interner), bin_op_text(*op), render(right, interner))
        }
        NodeKind::Unary { op, item } => match op {
            UnaryOp::Pos => format!("(+{})", render(item, interner)),
            UnaryOp::Neg => format!("(-{})", render(item, interner)),
            UnaryOp::Not => format!("(not {})", render(item, interner)),
        },
        NodeKind::Compare(cmp) => {
            let mut text = format!("({} {} {}", render(&cmp.left, interner), cmp_op_text(cmp.op), render(&cmp.right, interner));
            if let (Some(op), Some(right)) = (cmp.second_op, &cmp.second_right) {
                text.push_str(&format!(" {} {}", cmp_op_text(op), render(right, interner)));
            }
            text.push(')');
            text
        }
        NodeKind::Attribute { base, attr } => format!("{}.{}", render(base, interner), interner.resolve(*attr)),
        NodeKind::Subscript { base, index, .. } => format!("{}[{}]", render(base, interner), render(index, interner)),
        NodeKind::Slice { base, start, stop } => format!(
            "{}[{}:{}]",
            render(base, interner),
            start.as_ref().map(|s| render(s, interner)).unwrap_or_default(),
            stop.as_ref().map(|s| render(s, interner)).unwrap_or_default(),
        ),
        NodeKind::Call(call) => {
            let mut parts: Vec<String> = call.args.iter().map(|a| render(a, interner)).collect();
            parts.extend(call.keyword_args.iter().map(|(k, v)| format!("{}={}", interner.resolve(*k), render(v, interner))));
            format!("{}({})", render(&call.function, interner), parts.join(", "))
        }
        NodeKind::If { test, then_branch, else_branch } => format!(
            "({} if {} else {})",
            render(then_branch, interner),
            render(test, interner),
            else_branch.as_ref().map(|e| render(e, interner)).unwrap_or_else(|| "None".to_owned()),
        ),
        NodeKind::Body(items) => items.last().map(|i| render(i, interner)).unwrap_or_else(|| "None".to_owned()),
        _ => "None".to_owned(),
    }
}

pub fn render_literal(lit: &Literal, interner: &Interner) -> String {
    match lit {
        Literal::Bool(b) => if *b { "True" } else { "False" }.to_owned(),
        Literal::Int(v) => v.to_string(),
        Literal::Float(v) => format!("{v:?}"),
        Literal::Complex(re, im) => format!("complex({re:?}, {im:?})"),
        Literal::Str(s) => format!("{:?}", interner.resolve(*s)),
        Literal::Vector(items) => render_literal_list(items, interner),
    }
}

fn render_literal_list(items: &[Literal], interner: &Interner) -> String {
    let parts: Vec<String> = items.iter().map(|i| render_literal(i, interner)).collect();
    format!("[{}]", parts.join(", "))
}

fn render_dict_key(key: &DictKey, interner: &Interner) -> String {
    match key {
        DictKey::Bool(b) => if *b { "True" } else { "False" }.to_owned(),
        DictKey::Int(v) => v.to_string(),
        DictKey::Str(s) => format!("{:?}", interner.resolve(*s)),
    }
}

fn bin_op_text(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::FloorDiv => "//",
        BinOp::Pow => "**",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::And => "and",
        BinOp::Or => "or",
    }
}

fn cmp_op_text(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "==",
        CmpOp::Ne => "!=",
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
        CmpOp::Is => "is",
        CmpOp::In => "in",
        CmpOp::IsNot => "is not",
        CmpOp::NotIn => "not in",
    }
}

/// Renders a distribution `Call` as `dist.<Name>(args...)`, capitalizing the
/// first letter of the callee's name per the runtime's `dist` namespace
/// convention (`normal` → `dist.Normal`).
pub fn render_distribution(call: &crate::ast::CallNode, interner: &Interner) -> (String, String) {
    let NodeKind::Symbol(sym) = &call.function.kind else {
        let code = render(&Node::new(NodeKind::Call(call.clone())), interner);
        return ("Unknown".to_owned(), code);
    };
    let raw = interner.resolve(sym.name);
    let name = capitalize(raw);
    let mut parts: Vec<String> = call.args.iter().map(|a| render(a, interner)).collect();
    parts.extend(call.keyword_args.iter().map(|(k, v)| format!("{}={}", interner.resolve(*k), render(v, interner))));
    (name.clone(), format!("dist.{}({})", name, parts.join(", ")))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CallNode;

    #[test]
    fn renders_binary_expression() {
        let mut interner = Interner::new();
        let node = Node::new(NodeKind::Binary {
            left: Box::new(Node::value(Literal::Int(1))),
            op: BinOp::Add,
            right: Box::new(Node::value(Literal::Int(2))),
        });
        assert_eq!(render(&node, &interner), "(1 + 2)");
        interner.intern("unused");
    }

    #[test]
    fn renders_distribution_call_with_dist_prefix() {
        let mut interner = Interner::new();
        let normal = interner.intern("normal");
        let call = CallNode {
            function: Box::new(Node::new(NodeKind::Symbol(crate::ast::SymbolRef { name: normal, import_source: None, resolved: None }))),
            args: smallvec::smallvec![Node::value(Literal::Int(0)), Node::value(Literal::Int(1))],
            keyword_args: Vec::new(),
        };
        let (name, code) = render_distribution(&call, &interner);
        assert_eq!(name, "Normal");
        assert_eq!(code, "dist.Normal(0, 1)");
    }
}
