//! The fixed-point optimizer / partial evaluator.
//!
//! Each rewrite group lives in its own module as a pure `Node -> Option<Node>`
//! rule (`None` means "didn't fire"); [`optimize`] applies every group
//! bottom-up and repeats until a full pass makes no further change, the same
//! "keep rewriting until it stops moving" shape as the original's
//! transform-pipeline driver.

pub mod algebra;
pub mod compare;
pub mod control;
pub mod fold;
pub mod seq;

use crate::{
    ast::{CallNode, CompareNode, FunctionNode, Node, NodeKind},
    error::UnrollLimitExceeded,
    intern::Interner,
};

/// Hard cap on fixed-point iterations, guarding against a rewrite cycle
/// that never settles.
const MAX_PASSES: usize = 64;

/// Runs every rewrite group to a fixed point.
pub fn optimize(mut node: Node, interner: &Interner) -> Result<Node, UnrollLimitExceeded> {
    for _ in 0..MAX_PASSES {
        let (next, changed) = pass(node, interner)?;
        node = next;
        if !changed {
            break;
        }
    }
    Ok(node)
}

fn pass(node: Node, interner: &Interner) -> Result<(Node, bool), UnrollLimitExceeded> {
    let (node, mut changed) = recurse_children(node, interner)?;
    let mut node = node;
    loop {
        let mut fired = false;
        if let Some(rewritten) = algebra::rewrite(&node) {
            node = rewritten;
            fired = true;
        } else if let Some(rewritten) = compare::rewrite(&node) {
            node = rewritten;
            fired = true;
        } else if let Some(rewritten) = fold::rewrite(&node) {
            node = rewritten;
            fired = true;
        } else if let Some(rewritten) = seq::rewrite(&node, interner) {
            node = rewritten;
            fired = true;
        } else if let Some(rewritten) = control::rewrite(&node)? {
            node = rewritten;
            fired = true;
        }
        if !fired {
            break;
        }
        changed = true;
    }
    Ok((node, changed))
}

/// Recurses into every child of `node`, applying [`pass`] to each, and
/// reports whether any child actually changed.
fn recurse_children(node: Node, interner: &Interner) -> Result<(Node, bool), UnrollLimitExceeded> {
    let loc = node.loc;
    let ty = node.ty.clone();
    let mut changed = false;
    macro_rules! rec {
        ($child:expr) => {{
            let (n, c) = pass($child, interner)?;
            changed |= c;
            n
        }};
    }
    macro_rules! rec_box {
        ($child:expr) => {
            Box::new(rec!(*$child))
        };
    }
    macro_rules! rec_opt {
        ($child:expr) => {
            match $child {
                Some(c) => Some(rec_box!(c)),
                None => None,
            }
        };
    }
    macro_rules! rec_vec {
        ($children:expr) => {{
            let mut out = Vec::with_capacity($children.len());
            for c in $children {
                out.push(rec!(c));
            }
            out
        }};
    }

    let kind = match node.kind {
        NodeKind::Vector(items) => NodeKind::Vector(rec_vec!(items)),
        NodeKind::Dict(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                out.push((k, rec!(v)));
            }
            NodeKind::Dict(out)
        }
        NodeKind::Binary { left, op, right } => NodeKind::Binary { left: rec_box!(left), op, right: rec_box!(right) },
        NodeKind::Unary { op, item } => NodeKind::Unary { op, item: rec_box!(item) },
        NodeKind::Compare(cmp) => NodeKind::Compare(CompareNode {
            left: rec_box!(cmp.left),
            op: cmp.op,
            right: rec_box!(cmp.right),
            second_op: cmp.second_op,
            second_right: rec_opt!(cmp.second_right),
        }),
        NodeKind::Attribute { base, attr } => NodeKind::Attribute { base: rec_box!(base), attr },
        NodeKind::Subscript { base, index, default } => {
            NodeKind::Subscript { base: rec_box!(base), index: rec_box!(index), default: rec_opt!(default) }
        }
        NodeKind::Slice { base, start, stop } => NodeKind::Slice { base: rec_box!(base), start: rec_opt!(start), stop: rec_opt!(stop) },
        NodeKind::Call(call) => {
            let function = rec_box!(call.function);
            let args = rec_vec!(call.args.into_vec()).into();
            let mut keyword_args = Vec::with_capacity(call.keyword_args.len());
            for (k, v) in call.keyword_args {
                keyword_args.push((k, rec!(v)));
            }
            NodeKind::Call(CallNode { function, args, keyword_args })
        }
        NodeKind::If { test, then_branch, else_branch } => {
            NodeKind::If { test: rec_box!(test), then_branch: rec_box!(then_branch), else_branch: rec_opt!(else_branch) }
        }
        NodeKind::For { target, source, body } => NodeKind::For { target, source: rec_box!(source), body: rec_box!(body) },
        NodeKind::ListFor { target, source, expr, filter } => {
            NodeKind::ListFor { target, source: rec_box!(source), expr: rec_box!(expr), filter: rec_opt!(filter) }
        }
        NodeKind::While { test, body } => NodeKind::While { test: rec_box!(test), body: rec_box!(body) },
        NodeKind::Let { targets, sources, body } => {
            NodeKind::Let { targets, sources: rec_vec!(sources), body: rec_box!(body) }
        }
        NodeKind::Def { name, value, is_global } => NodeKind::Def { name, value: rec_box!(value), is_global },
        NodeKind::Function(func) => NodeKind::Function(FunctionNode {
            name: func.name,
            params: func.params,
            vararg: func.vararg,
            body: rec_box!(func.body),
            doc: func.doc,
        }),
        NodeKind::Return(value) => NodeKind::Return(rec_opt!(value)),
        NodeKind::Sample { dist } => NodeKind::Sample { dist: rec_box!(dist) },
        NodeKind::Observe { dist, value } => NodeKind::Observe { dist: rec_box!(dist), value: rec_box!(value) },
        NodeKind::Body(items) => {
            let items = rec_vec!(items);
            return Ok((Node { kind: Node::body(items).kind, loc, ty }, changed));
        }
        kind @ (NodeKind::Value(_) | NodeKind::ValueVector(_) | NodeKind::Symbol(_) | NodeKind::Break | NodeKind::Import { .. }) => {
            kind
        }
    };
    Ok((Node { kind, loc, ty }, changed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, Literal};

    #[test]
    fn folds_nested_constant_arithmetic() {
        let node = Node::new(NodeKind::Binary {
            left: Box::new(Node::new(NodeKind::Binary {
                left: Box::new(Node::value(Literal::Int(1))),
                op: BinOp::Add,
                right: Box::new(Node::value(Literal::Int(2))),
            })),
            op: BinOp::Mul,
            right: Box::new(Node::value(Literal::Int(10))),
        });
        let optimized = optimize(node, &Interner::new()).unwrap();
        assert!(matches!(optimized.kind, NodeKind::Value(Literal::Int(30))));
    }
}
