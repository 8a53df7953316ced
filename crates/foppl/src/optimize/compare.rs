//! Comparison folding and normalization: literal comparisons collapse to a
//! `Bool`, a negated-operand pair normalizes to drop the negation, a
//! constant is moved to the right-hand side, and an all-literal chained
//! comparison (`a rel b rel c`) evaluates outright.

use crate::ast::{CmpOp, CompareNode, Literal, Node, NodeKind, UnaryOp};

fn as_f64(lit: &Literal) -> Option<f64> {
    match lit {
        Literal::Int(v) => Some(*v as f64),
        Literal::Float(v) => Some(*v),
        Literal::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn compare_f64(op: CmpOp, a: f64, b: f64) -> Option<bool> {
    Some(match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
        CmpOp::Is | CmpOp::In | CmpOp::IsNot | CmpOp::NotIn => return None,
    })
}

fn compare_literals(op: CmpOp, left: &Literal, right: &Literal) -> Option<bool> {
    match (left, right) {
        (Literal::Str(a), Literal::Str(b)) => match op {
            CmpOp::Eq => Some(a == b),
            CmpOp::Ne => Some(a != b),
            _ => None,
        },
        _ => compare_f64(op, as_f64(left)?, as_f64(right)?),
    }
}

/// Flips a relational operator to read the operands the other way round
/// (`a < b` becomes `b > a`); equality/inequality and identity/membership
/// operators are already symmetric or have no mirror.
fn flip(op: CmpOp) -> Option<CmpOp> {
    Some(match op {
        CmpOp::Lt => CmpOp::Gt,
        CmpOp::Le => CmpOp::Ge,
        CmpOp::Gt => CmpOp::Lt,
        CmpOp::Ge => CmpOp::Le,
        CmpOp::Eq | CmpOp::Ne => op,
        CmpOp::Is | CmpOp::In | CmpOp::IsNot | CmpOp::NotIn => return None,
    })
}

fn neg_operand(node: &Node) -> Option<&Node> {
    match &node.kind {
        NodeKind::Unary { op: UnaryOp::Neg, item } => Some(item),
        _ => None,
    }
}

pub fn rewrite(node: &Node) -> Option<Node> {
    let NodeKind::Compare(cmp) = &node.kind else { return None };

    if cmp.second_op.is_none() {
        if let Some(result) = fold_single(cmp) {
            return Some(Node::value(Literal::Bool(result)));
        }
    } else if let Some(result) = fold_chain(cmp) {
        return Some(Node::value(Literal::Bool(result)));
    }

    if cmp.second_op.is_none() {
        if let Some(rewritten) = negate_both_sides(cmp) {
            return Some(rewritten);
        }
        if let Some(rewritten) = constant_to_rhs(cmp) {
            return Some(rewritten);
        }
    }
    None
}

fn fold_single(cmp: &CompareNode) -> Option<bool> {
    let NodeKind::Value(left) = &cmp.left.kind else { return None };
    let NodeKind::Value(right) = &cmp.right.kind else { return None };
    compare_literals(cmp.op, left, right)
}

/// Evaluates `a rel1 b rel2 c` when `a`, `b`, and `c` are all literals.
fn fold_chain(cmp: &CompareNode) -> Option<bool> {
    let second_op = cmp.second_op?;
    let second_right = cmp.second_right.as_ref()?;
    let NodeKind::Value(a) = &cmp.left.kind else { return None };
    let NodeKind::Value(b) = &cmp.right.kind else { return None };
    let NodeKind::Value(c) = &second_right.kind else { return None };
    let first = compare_literals(cmp.op, a, b)?;
    if !first {
        return Some(false);
    }
    compare_literals(second_op, b, c)
}

/// `(-a) rel (-b) -> b rel a`: negating both sides of a relation flips its
/// sense, so the negations cancel when the operator is mirrored.
fn negate_both_sides(cmp: &CompareNode) -> Option<Node> {
    let left_inner = neg_operand(&cmp.left)?;
    let right_inner = neg_operand(&cmp.right)?;
    let op = flip(cmp.op)?;
    Some(Node::new(NodeKind::Compare(CompareNode {
        left: Box::new(right_inner.clone()),
        op,
        right: Box::new(left_inner.clone()),
        second_op: None,
        second_right: None,
    })))
}

/// `const rel x -> x rel' const`: moves a literal on the left over to the
/// right, mirroring the operator so the relation still reads the same way.
fn constant_to_rhs(cmp: &CompareNode) -> Option<Node> {
    if !cmp.left.is_literal() || cmp.right.is_literal() {
        return None;
    }
    let op = flip(cmp.op)?;
    Some(Node::new(NodeKind::Compare(CompareNode {
        left: Box::new(cmp.right.clone()),
        op,
        right: Box::new(cmp.left.clone()),
        second_op: None,
        second_right: None,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SymbolRef;

    fn sym() -> Node {
        Node::new(NodeKind::Symbol(SymbolRef { name: crate::intern::StringId::default(), import_source: None, resolved: None }))
    }

    #[test]
    fn folds_literal_less_than() {
        let node = Node::new(NodeKind::Compare(CompareNode {
            left: Box::new(Node::value(Literal::Int(1))),
            op: CmpOp::Lt,
            right: Box::new(Node::value(Literal::Int(2))),
            second_op: None,
            second_right: None,
        }));
        assert_eq!(rewrite(&node), Some(Node::value(Literal::Bool(true))));
    }

    #[test]
    fn folds_all_literal_chain() {
        let node = Node::new(NodeKind::Compare(CompareNode {
            left: Box::new(Node::value(Literal::Int(1))),
            op: CmpOp::Lt,
            right: Box::new(Node::value(Literal::Int(2))),
            second_op: Some(CmpOp::Lt),
            second_right: Some(Box::new(Node::value(Literal::Int(3)))),
        }));
        assert_eq!(rewrite(&node), Some(Node::value(Literal::Bool(true))));
    }

    #[test]
    fn short_circuits_chain_on_false_first_leg() {
        let node = Node::new(NodeKind::Compare(CompareNode {
            left: Box::new(Node::value(Literal::Int(5))),
            op: CmpOp::Lt,
            right: Box::new(Node::value(Literal::Int(2))),
            second_op: Some(CmpOp::Lt),
            second_right: Some(Box::new(Node::value(Literal::Int(3)))),
        }));
        assert_eq!(rewrite(&node), Some(Node::value(Literal::Bool(false))));
    }

    #[test]
    fn negated_operands_cancel_and_flip() {
        let x = sym();
        let y = Node::new(NodeKind::Symbol(SymbolRef { name: crate::intern::StringId::default(), import_source: None, resolved: None }));
        let node = Node::new(NodeKind::Compare(CompareNode {
            left: Box::new(Node::new(NodeKind::Unary { op: UnaryOp::Neg, item: Box::new(x.clone()) })),
            op: CmpOp::Lt,
            right: Box::new(Node::new(NodeKind::Unary { op: UnaryOp::Neg, item: Box::new(y.clone()) })),
            second_op: None,
            second_right: None,
        }));
        assert_eq!(
            rewrite(&node),
            Some(Node::new(NodeKind::Compare(CompareNode {
                left: Box::new(y),
                op: CmpOp::Gt,
                right: Box::new(x),
                second_op: None,
                second_right: None,
            })))
        );
    }

    #[test]
    fn constant_moves_to_right_hand_side() {
        let x = sym();
        let node = Node::new(NodeKind::Compare(CompareNode {
            left: Box::new(Node::value(Literal::Int(1))),
            op: CmpOp::Lt,
            right: Box::new(x.clone()),
            second_op: None,
            second_right: None,
        }));
        assert_eq!(
            rewrite(&node),
            Some(Node::new(NodeKind::Compare(CompareNode {
                left: Box::new(x),
                op: CmpOp::Gt,
                right: Box::new(Node::value(Literal::Int(1))),
                second_op: None,
                second_right: None,
            })))
        );
    }
}
