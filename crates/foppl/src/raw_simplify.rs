//! Normalizes the raw parser output before symbol resolution: squashes any
//! nested `Body` that slipped past the parser's own flattening, and drops
//! single-statement `Let`/`If` wrappers that carry no bindings.
//!
//! Purely structural — no constant folding or inlining happens here, that's
//! [`crate::optimize`]'s job once names are resolved.

use crate::ast::{CallNode, CompareNode, FunctionNode, Node, NodeKind};

/// Rebuilds `node` bottom-up, re-flattening every `Body` through
/// [`Node::body`] and collapsing empty-binding `Let`s to their body.
#[must_use]
pub fn simplify(node: Node) -> Node {
    let loc = node.loc;
    let ty = node.ty;
    let kind = match node.kind {
        NodeKind::Vector(items) => NodeKind::Vector(items.into_iter().map(simplify).collect()),
        NodeKind::Dict(entries) => NodeKind::Dict(entries.into_iter().map(|(k, v)| (k, simplify(v))).collect()),
        NodeKind::Binary { left, op, right } => {
            NodeKind::Binary { left: Box::new(simplify(*left)), op, right: Box::new(simplify(*right)) }
        }
        NodeKind::Unary { op, item } => NodeKind::Unary { op, item: Box::new(simplify(*item)) },
        NodeKind::Compare(cmp) => NodeKind::Compare(CompareNode {
            left: Box::new(simplify(*cmp.left)),
            op: cmp.op,
            right: Box::new(simplify(*cmp.right)),
            second_op: cmp.second_op,
            second_right: cmp.second_right.map(|r| Box::new(simplify(*r))),
        }),
        NodeKind::Attribute { base, attr } => NodeKind::Attribute { base: Box::new(simplify(*base)), attr },
        NodeKind::Subscript { base, index, default } => NodeKind::Subscript {
            base: Box::new(simplify(*base)),
            index: Box::new(simplify(*index)),
            default: default.map(|d| Box::new(simplify(*d))),
        },
        NodeKind::Slice { base, start, stop } => NodeKind::Slice {
            base: Box::new(simplify(*base)),
            start: start.map(|s| Box::new(simplify(*s))),
            stop: stop.map(|s| Box::new(simplify(*s))),
        },
        NodeKind::Call(call) => NodeKind::Call(CallNode {
            function: Box::new(simplify(*call.function)),
            args: call.args.into_iter().map(simplify).collect(),
            keyword_args: call.keyword_args.into_iter().map(|(k, v)| (k, simplify(v))).collect(),
        }),
        NodeKind::If { test, then_branch, else_branch } => NodeKind::If {
            test: Box::new(simplify(*test)),
            then_branch: Box::new(simplify(*then_branch)),
            else_branch: else_branch.map(|e| Box::new(simplify(*e))),
        },
        NodeKind::For { target, source, body } => {
            NodeKind::For { target, source: Box::new(simplify(*source)), body: Box::new(simplify(*body)) }
        }
        NodeKind::ListFor { target, source, expr, filter } => NodeKind::ListFor {
            target,
            source: Box::new(simplify(*source)),
            expr: Box::new(simplify(*expr)),
            filter: filter.map(|f| Box::new(simplify(*f))),
        },
        NodeKind::While { test, body } => NodeKind::While { test: Box::new(simplify(*test)), body: Box::new(simplify(*body)) },
        NodeKind::Let { targets, sources, body } => {
            let sources: Vec<_> = sources.into_iter().map(simplify).collect();
            let body = simplify(*body);
            if targets.is_empty() {
                return body;
            }
            NodeKind::Let { targets, sources, body: Box::new(body) }
        }
        NodeKind::Def { name, value, is_global } => NodeKind::Def { name, value: Box::new(simplify(*value)), is_global },
        NodeKind::Function(func) => NodeKind::Function(FunctionNode {
            name: func.name,
            params: func.params,
            vararg: func.vararg,
            body: Box::new(simplify(*func.body)),
            doc: func.doc,
        }),
        NodeKind::Return(value) => NodeKind::Return(value.map(|v| Box::new(simplify(*v)))),
        NodeKind::Sample { dist } => NodeKind::Sample { dist: Box::new(simplify(*dist)) },
        NodeKind::Observe { dist, value } => {
            NodeKind::Observe { dist: Box::new(simplify(*dist)), value: Box::new(simplify(*value)) }
        }
        NodeKind::Body(items) => {
            let flattened = Node::body(items.into_iter().map(simplify).collect());
            return Node { kind: flattened.kind, loc, ty };
        }
        kind @ (NodeKind::Value(_) | NodeKind::ValueVector(_) | NodeKind::Symbol(_) | NodeKind::Break | NodeKind::Import { .. }) => {
            kind
        }
    };
    Node { kind, loc, ty }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;

    #[test]
    fn flattens_doubly_nested_body() {
        let innermost = Node::new(NodeKind::Body(vec![Node::value(Literal::Int(1))]));
        let inner = Node::new(NodeKind::Body(vec![innermost, Node::value(Literal::Int(2))]));
        let outer = Node::new(NodeKind::Body(vec![inner]));
        let simplified = simplify(outer);
        match simplified.kind {
            NodeKind::Body(items) => assert_eq!(items.len(), 2),
            _ => panic!("expected flattened Body"),
        }
    }

    #[test]
    fn empty_let_collapses_to_body() {
        let node = Node::new(NodeKind::Let { targets: vec![], sources: vec![], body: Box::new(Node::value(Literal::Int(7))) });
        let simplified = simplify(node);
        assert!(matches!(simplified.kind, NodeKind::Value(Literal::Int(7))));
    }
}
