//! Constant folding: evaluates `Binary`/`Unary` nodes whose operands are
//! already literals.

use crate::ast::{BinOp, Literal, Node, NodeKind, UnaryOp};

fn both_numeric(left: &Literal, right: &Literal) -> Option<(f64, f64, bool)> {
    let is_float = matches!(left, Literal::Float(_)) || matches!(right, Literal::Float(_));
    let a = match left {
        Literal::Int(v) => *v as f64,
        Literal::Float(v) => *v,
        Literal::Bool(v) => *v as i64 as f64,
        _ => return None,
    };
    let b = match right {
        Literal::Int(v) => *v as f64,
        Literal::Float(v) => *v,
        Literal::Bool(v) => *v as i64 as f64,
        _ => return None,
    };
    Some((a, b, is_float))
}

fn lit(v: f64, is_float: bool) -> Literal {
    if is_float {
        Literal::Float(v)
    } else {
        Literal::Int(v as i64)
    }
}

pub fn rewrite(node: &Node) -> Option<Node> {
    match &node.kind {
        NodeKind::Binary { left, op, right } => {
            let NodeKind::Value(l) = &left.kind else { return None };
            let NodeKind::Value(r) = &right.kind else { return None };
            fold_binary(l, *op, r)
        }
        NodeKind::Unary { op, item } => {
            let NodeKind::Value(v) = &item.kind else { return None };
            fold_unary(*op, v)
        }
        _ => None,
    }
}

fn fold_binary(left: &Literal, op: BinOp, right: &Literal) -> Option<Node> {
    if matches!(op, BinOp::And | BinOp::Or) {
        let (Literal::Bool(a), Literal::Bool(b)) = (left, right) else { return None };
        let result = match op {
            BinOp::And => *a && *b,
            BinOp::Or => *a || *b,
            _ => unreachable!(),
        };
        return Some(Node::value(Literal::Bool(result)));
    }
    let (a, b, is_float) = both_numeric(left, right)?;
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Mod => a % b,
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Pow => a.powf(b),
        BinOp::Shl => ((a as i64) << (b as i64)) as f64,
        BinOp::Shr => ((a as i64) >> (b as i64)) as f64,
        BinOp::BitAnd => ((a as i64) & (b as i64)) as f64,
        BinOp::BitOr => ((a as i64) | (b as i64)) as f64,
        BinOp::BitXor => ((a as i64) ^ (b as i64)) as f64,
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    };
    let is_float = is_float || matches!(op, BinOp::Div | BinOp::Pow);
    Some(Node::value(lit(value, is_float)))
}

fn fold_unary(op: UnaryOp, value: &Literal) -> Option<Node> {
    match (op, value) {
        (UnaryOp::Not, Literal::Bool(v)) => Some(Node::value(Literal::Bool(!v))),
        (UnaryOp::Neg, Literal::Int(v)) => Some(Node::value(Literal::Int(-v))),
        (UnaryOp::Neg, Literal::Float(v)) => Some(Node::value(Literal::Float(-v))),
        (UnaryOp::Pos, Literal::Int(_) | Literal::Float(_)) => Some(Node::value(value.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_integer_addition() {
        let node = Node::new(NodeKind::Binary {
            left: Box::new(Node::value(Literal::Int(1))),
            op: BinOp::Add,
            right: Box::new(Node::value(Literal::Int(2))),
        });
        assert_eq!(rewrite(&node), Some(Node::value(Literal::Int(3))));
    }

    #[test]
    fn division_always_yields_float() {
        let node = Node::new(NodeKind::Binary {
            left: Box::new(Node::value(Literal::Int(4))),
            op: BinOp::Div,
            right: Box::new(Node::value(Literal::Int(2))),
        });
        assert_eq!(rewrite(&node), Some(Node::value(Literal::Float(2.0))));
    }

    #[test]
    fn folds_unary_negation() {
        let node = Node::new(NodeKind::Unary { op: UnaryOp::Neg, item: Box::new(Node::value(Literal::Int(5))) });
        assert_eq!(rewrite(&node), Some(Node::value(Literal::Int(-5))));
    }
}
