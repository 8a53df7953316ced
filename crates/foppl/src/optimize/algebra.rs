//! Algebraic identities: `x + 0 -> x`, `x * 1 -> x`, `x and true -> x`, and
//! their symmetric/boolean/self-cancelling counterparts. Each rule only
//! fires when exactly one side is the distinguished constant, or when both
//! sides are the same pure sub-expression — both-literal cases are left to
//! [`crate::optimize::fold`].

use crate::ast::{BinOp, Literal, Node, NodeKind, UnaryOp};

fn is_num(node: &Node, want: f64) -> bool {
    match &node.kind {
        NodeKind::Value(Literal::Int(v)) => (*v as f64) == want,
        NodeKind::Value(Literal::Float(v)) => *v == want,
        _ => false,
    }
}

fn is_bool(node: &Node, want: bool) -> bool {
    matches!(&node.kind, NodeKind::Value(Literal::Bool(v)) if *v == want)
}

fn as_nonneg_int(node: &Node) -> Option<u32> {
    match &node.kind {
        NodeKind::Value(Literal::Int(v)) if *v >= 0 => Some(*v as u32),
        _ => None,
    }
}

/// True when `a` and `b` are the same pure expression, so replacing both
/// occurrences with a single evaluation changes nothing observable.
fn same_pure(a: &Node, b: &Node) -> bool {
    a.is_trivially_pure() && a == b
}

fn neg_operand(node: &Node) -> Option<&Node> {
    match &node.kind {
        NodeKind::Unary { op: UnaryOp::Neg, item } => Some(item),
        _ => None,
    }
}

pub fn rewrite(node: &Node) -> Option<Node> {
    match &node.kind {
        NodeKind::Binary { left, op, right } => rewrite_binary(left, *op, right),
        NodeKind::Unary { op: UnaryOp::Not, item } => match &item.kind {
            NodeKind::Unary { op: UnaryOp::Not, item: inner } => Some((**inner).clone()),
            _ => None,
        },
        NodeKind::Unary { op: UnaryOp::Neg, item } => match &item.kind {
            NodeKind::Unary { op: UnaryOp::Neg, item: inner } => Some((**inner).clone()),
            _ => None,
        },
        _ => None,
    }
}

fn rewrite_binary(left: &Node, op: BinOp, right: &Node) -> Option<Node> {
    if left.is_literal() && right.is_literal() {
        return None;
    }
    match op {
        BinOp::Add if is_num(right, 0.0) => Some(left.clone()),
        BinOp::Add if is_num(left, 0.0) => Some(right.clone()),
        BinOp::Sub if is_num(right, 0.0) => Some(left.clone()),
        BinOp::Sub if is_num(left, 0.0) => {
            Some(Node::new(NodeKind::Unary { op: UnaryOp::Neg, item: Box::new(right.clone()) }))
        }
        BinOp::Sub if same_pure(left, right) => Some(Node::value(Literal::Int(0))),
        BinOp::Mul if is_num(right, 1.0) => Some(left.clone()),
        BinOp::Mul if is_num(left, 1.0) => Some(right.clone()),
        BinOp::Mul if is_num(right, 0.0) || is_num(left, 0.0) => Some(Node::value(Literal::Int(0))),
        BinOp::Mul => {
            let (a, b) = (neg_operand(left)?, neg_operand(right)?);
            Some(Node::new(NodeKind::Binary { left: Box::new(a.clone()), op: BinOp::Mul, right: Box::new(b.clone()) }))
        }
        BinOp::Div if is_num(right, 1.0) => Some(left.clone()),
        BinOp::Div if same_pure(left, right) => Some(Node::value(Literal::Int(1))),
        BinOp::Pow if is_num(right, 1.0) => Some(left.clone()),
        BinOp::Pow if is_num(right, 0.0) => Some(Node::value(Literal::Int(1))),
        BinOp::Shl => {
            let k = as_nonneg_int(right)?;
            let factor = 1i64.checked_shl(k)?;
            Some(Node::new(NodeKind::Binary { left: Box::new(left.clone()), op: BinOp::Mul, right: Box::new(Node::value(Literal::Int(factor))) }))
        }
        BinOp::Shr => {
            let k = as_nonneg_int(right)?;
            let factor = 0.5f64.powi(k as i32);
            Some(Node::new(NodeKind::Binary { left: Box::new(left.clone()), op: BinOp::Mul, right: Box::new(Node::value(Literal::Float(factor))) }))
        }
        BinOp::And if is_bool(right, true) => Some(left.clone()),
        BinOp::And if is_bool(left, true) => Some(right.clone()),
        BinOp::And if is_bool(right, false) || is_bool(left, false) => Some(Node::value(Literal::Bool(false))),
        BinOp::Or if is_bool(right, false) => Some(left.clone()),
        BinOp::Or if is_bool(left, false) => Some(right.clone()),
        BinOp::Or if is_bool(right, true) || is_bool(left, true) => Some(Node::value(Literal::Bool(true))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SymbolRef;

    fn sym() -> Node {
        Node::new(NodeKind::Symbol(SymbolRef { name: crate::intern::StringId::default(), import_source: None, resolved: None }))
    }

    #[test]
    fn add_zero_identity() {
        let x = sym();
        let node = Node::new(NodeKind::Binary { left: Box::new(x.clone()), op: BinOp::Add, right: Box::new(Node::value(Literal::Int(0))) });
        assert_eq!(rewrite(&node), Some(x));
    }

    #[test]
    fn mul_zero_collapses() {
        let x = sym();
        let node = Node::new(NodeKind::Binary { left: Box::new(x), op: BinOp::Mul, right: Box::new(Node::value(Literal::Int(0))) });
        assert_eq!(rewrite(&node), Some(Node::value(Literal::Int(0))));
    }

    #[test]
    fn zero_minus_x_negates() {
        let x = sym();
        let node = Node::new(NodeKind::Binary { left: Box::new(Node::value(Literal::Int(0))), op: BinOp::Sub, right: Box::new(x.clone()) });
        assert_eq!(rewrite(&node), Some(Node::new(NodeKind::Unary { op: UnaryOp::Neg, item: Box::new(x) })));
    }

    #[test]
    fn self_subtraction_is_zero() {
        let x = sym();
        let node = Node::new(NodeKind::Binary { left: Box::new(x.clone()), op: BinOp::Sub, right: Box::new(x) });
        assert_eq!(rewrite(&node), Some(Node::value(Literal::Int(0))));
    }

    #[test]
    fn self_division_is_one() {
        let x = sym();
        let node = Node::new(NodeKind::Binary { left: Box::new(x.clone()), op: BinOp::Div, right: Box::new(x) });
        assert_eq!(rewrite(&node), Some(Node::value(Literal::Int(1))));
    }

    #[test]
    fn double_negation_multiplies_clean() {
        let x = sym();
        let y = Node::new(NodeKind::Symbol(SymbolRef { name: crate::intern::StringId::default(), import_source: None, resolved: None }));
        let neg_x = Node::new(NodeKind::Unary { op: UnaryOp::Neg, item: Box::new(x.clone()) });
        let neg_y = Node::new(NodeKind::Unary { op: UnaryOp::Neg, item: Box::new(y.clone()) });
        let node = Node::new(NodeKind::Binary { left: Box::new(neg_x), op: BinOp::Mul, right: Box::new(neg_y) });
        assert_eq!(rewrite(&node), Some(Node::new(NodeKind::Binary { left: Box::new(x), op: BinOp::Mul, right: Box::new(y) })));
    }

    #[test]
    fn shift_left_becomes_power_of_two_multiply() {
        let x = sym();
        let node = Node::new(NodeKind::Binary { left: Box::new(x.clone()), op: BinOp::Shl, right: Box::new(Node::value(Literal::Int(3))) });
        assert_eq!(
            rewrite(&node),
            Some(Node::new(NodeKind::Binary { left: Box::new(x), op: BinOp::Mul, right: Box::new(Node::value(Literal::Int(8))) }))
        );
    }

    #[test]
    fn shift_right_becomes_fractional_multiply() {
        let x = sym();
        let node = Node::new(NodeKind::Binary { left: Box::new(x.clone()), op: BinOp::Shr, right: Box::new(Node::value(Literal::Int(2))) });
        assert_eq!(
            rewrite(&node),
            Some(Node::new(NodeKind::Binary { left: Box::new(x), op: BinOp::Mul, right: Box::new(Node::value(Literal::Float(0.25))) }))
        );
    }
}
