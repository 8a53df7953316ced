//! Sequence rewrites: collapsing an all-literal `Vector` into a
//! `ValueVector`, resolving a literal index into a literal vector, and
//! folding the Lisp sequence primitives (`first`, `rest`, `nth`, `conj`,
//! `concat`, ...) against known-length operands.

use crate::ast::{CallNode, Literal, Node, NodeKind};
use crate::intern::Interner;

const NIL: Literal = Literal::Bool(false);

pub fn rewrite(node: &Node, interner: &Interner) -> Option<Node> {
    match &node.kind {
        NodeKind::Vector(items) => vector_literal(items),
        NodeKind::Subscript { base, index, default } => subscript(base, index, default.as_deref()),
        NodeKind::Call(call) => call_form(call, interner),
        _ => None,
    }
}

fn vector_literal(items: &[Node]) -> Option<Node> {
    let literals = items
        .iter()
        .map(|item| match &item.kind {
            NodeKind::Value(lit) => Some(lit.clone()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(Node::new(NodeKind::ValueVector(literals)))
}

fn subscript(base: &Node, index: &Node, default: Option<&Node>) -> Option<Node> {
    let NodeKind::ValueVector(items) = &base.kind else { return None };
    let NodeKind::Value(Literal::Int(i)) = &index.kind else { return None };
    let idx = usize::try_from(*i).ok()?;
    match items.get(idx) {
        Some(lit) => Some(Node::value(lit.clone())),
        None => default.map(|d| d.clone()),
    }
}

fn literal_items(node: &Node) -> Option<Vec<Literal>> {
    match &node.kind {
        NodeKind::ValueVector(items) => Some(items.clone()),
        NodeKind::Vector(items) => items
            .iter()
            .map(|i| match &i.kind {
                NodeKind::Value(lit) => Some(lit.clone()),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn as_usize(node: &Node) -> Option<usize> {
    match &node.kind {
        NodeKind::Value(Literal::Int(v)) if *v >= 0 => Some(*v as usize),
        _ => None,
    }
}

fn head_name<'a>(call: &CallNode, interner: &'a Interner) -> Option<&'a str> {
    let NodeKind::Symbol(sym) = &call.function.kind else { return None };
    Some(interner.resolve(sym.name))
}

/// Folds a sequence-primitive call against known-length/known-value
/// operands. Unrecognized heads, or recognized heads whose operands are not
/// yet known, fall through to `None` so the call survives to graph
/// construction unchanged.
fn call_form(call: &CallNode, interner: &Interner) -> Option<Node> {
    let name = head_name(call, interner)?;
    match name {
        "first" => Some(Node::value(literal_items(call.args.first()?)?.into_iter().next().unwrap_or(NIL))),
        "second" => Some(Node::value(literal_items(call.args.first()?)?.into_iter().nth(1).unwrap_or(NIL))),
        "last" => Some(Node::value(literal_items(call.args.first()?)?.into_iter().last().unwrap_or(NIL))),
        "rest" => Some(Node::new(NodeKind::ValueVector(literal_items(call.args.first()?)?.into_iter().skip(1).collect()))),
        "nth" | "get" => {
            let items = literal_items(call.args.first()?)?;
            let idx = as_usize(call.args.get(1)?)?;
            match items.into_iter().nth(idx) {
                Some(lit) => Some(Node::value(lit)),
                None => Some(call.args.get(2).cloned().unwrap_or_else(|| Node::value(NIL))),
            }
        }
        "take" => {
            let items = literal_items(call.args.first()?)?;
            let n = as_usize(call.args.get(1)?)?;
            Some(Node::new(NodeKind::ValueVector(items.into_iter().take(n).collect())))
        }
        "drop" => {
            let items = literal_items(call.args.first()?)?;
            let n = as_usize(call.args.get(1)?)?;
            Some(Node::new(NodeKind::ValueVector(items.into_iter().skip(n).collect())))
        }
        "conj" => {
            let mut items = literal_items(call.args.first()?)?;
            let NodeKind::Value(tail) = &call.args.get(1)?.kind else { return None };
            items.push(tail.clone());
            Some(Node::new(NodeKind::ValueVector(items)))
        }
        "cons" => {
            let NodeKind::Value(head) = &call.args.first()?.kind else { return None };
            let tail = literal_items(call.args.get(1)?)?;
            let mut items = vec![head.clone()];
            items.extend(tail);
            Some(Node::new(NodeKind::ValueVector(items)))
        }
        "concat" => {
            let mut items = Vec::new();
            for arg in &call.args {
                items.extend(literal_items(arg)?);
            }
            Some(Node::new(NodeKind::ValueVector(items)))
        }
        "repeat" => {
            let n = as_usize(call.args.first()?)?;
            let NodeKind::Value(lit) = &call.args.get(1)?.kind else { return None };
            Some(Node::new(NodeKind::ValueVector(std::iter::repeat(lit.clone()).take(n).collect())))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SymbolRef;

    fn call(name: &str, args: Vec<Node>, interner: &mut Interner) -> Node {
        let id = interner.intern(name);
        Node::new(NodeKind::Call(CallNode {
            function: Box::new(Node::new(NodeKind::Symbol(SymbolRef { name: id, import_source: None, resolved: None }))),
            args: args.into(),
            keyword_args: Vec::new(),
        }))
    }

    fn literal_vec(items: Vec<i64>) -> Node {
        Node::new(NodeKind::ValueVector(items.into_iter().map(Literal::Int).collect()))
    }

    #[test]
    fn collapses_literal_vector() {
        let node = Node::new(NodeKind::Vector(vec![Node::value(Literal::Int(1)), Node::value(Literal::Int(2))]));
        let interner = Interner::new();
        let rewritten = rewrite(&node, &interner).unwrap();
        assert_eq!(rewritten.kind, NodeKind::ValueVector(vec![Literal::Int(1), Literal::Int(2)]));
    }

    #[test]
    fn first_and_rest_fold_against_known_vector() {
        let mut interner = Interner::new();
        let node = call("first", vec![literal_vec(vec![10, 20, 30])], &mut interner);
        assert_eq!(rewrite(&node, &interner), Some(Node::value(Literal::Int(10))));

        let node = call("rest", vec![literal_vec(vec![10, 20, 30])], &mut interner);
        assert_eq!(rewrite(&node, &interner), Some(Node::new(NodeKind::ValueVector(vec![Literal::Int(20), Literal::Int(30)]))));
    }

    #[test]
    fn nth_out_of_range_falls_back_to_default() {
        let mut interner = Interner::new();
        let node = call("nth", vec![literal_vec(vec![1, 2]), Node::value(Literal::Int(5)), Node::value(Literal::Int(-1))], &mut interner);
        assert_eq!(rewrite(&node, &interner), Some(Node::value(Literal::Int(-1))));
    }

    #[test]
    fn concat_joins_known_vectors() {
        let mut interner = Interner::new();
        let node = call("concat", vec![literal_vec(vec![1, 2]), literal_vec(vec![3])], &mut interner);
        assert_eq!(
            rewrite(&node, &interner),
            Some(Node::new(NodeKind::ValueVector(vec![Literal::Int(1), Literal::Int(2), Literal::Int(3)])))
        );
    }

    #[test]
    fn conj_appends_a_known_value() {
        let mut interner = Interner::new();
        let node = call("conj", vec![literal_vec(vec![1, 2]), Node::value(Literal::Int(3))], &mut interner);
        assert_eq!(rewrite(&node, &interner), Some(Node::new(NodeKind::ValueVector(vec![Literal::Int(1), Literal::Int(2), Literal::Int(3)]))));
    }
}
