//! The closed type lattice and the bottom-up inference pass.
//!
//! `Any ⊃ Numeric ⊃ Float ⊃ Integer ⊃ Boolean`, plus `Sequence` (parametric
//! over an item type and an optional exact length), `Dict`, `Function`, and
//! `NullType`. Inference never fails outright: an irreconcilable join widens
//! to `Any` rather than erroring, the way the original's `Type.union` does;
//! only genuine operator/argument mismatches raise [`TypeError`].

use std::fmt;

use crate::{
    ast::{BinOp, CallNode, CmpOp, CompareNode, Literal, Node, NodeKind, UnaryOp},
    error::TypeError,
    source::SourceLoc,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceKind {
    List,
    Tuple,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Any,
    Numeric,
    Float,
    Integer,
    Boolean,
    Sequence { kind: SequenceKind, item: Box<Type>, size: Option<usize> },
    Dict,
    Function,
    NullType,
}

impl Type {
    #[must_use]
    pub fn list(item: Type, size: Option<usize>) -> Self {
        Self::Sequence { kind: SequenceKind::List, item: Box::new(item), size }
    }

    #[must_use]
    pub fn tuple(item: Type, size: Option<usize>) -> Self {
        Self::Sequence { kind: SequenceKind::Tuple, item: Box::new(item), size }
    }

    #[must_use]
    pub const fn string() -> Self {
        Self::Sequence { kind: SequenceKind::String, item: Box::new(Self::Any), size: None }
    }

    /// `Numeric ⊃ Float ⊃ Integer ⊃ Boolean`: true when `self` is `other` or
    /// one of its subtypes in the fixed numeric chain.
    #[must_use]
    pub fn contains(&self, other: &Type) -> bool {
        if self == other || matches!(self, Type::Any) {
            return true;
        }
        match (self, other) {
            (Type::Numeric, Type::Float | Type::Integer | Type::Boolean) => true,
            (Type::Float, Type::Integer | Type::Boolean) => true,
            (Type::Integer, Type::Boolean) => true,
            (
                Type::Sequence { kind: k1, item: i1, size: s1 },
                Type::Sequence { kind: k2, item: i2, size: s2 },
            ) => k1 == k2 && i1.contains(i2) && (s1.is_none() || s1 == s2),
            _ => false,
        }
    }

    /// The least upper bound of two types in the lattice. Falls back to
    /// `Any` when the two types share no common supertype.
    #[must_use]
    pub fn union(self, other: Type) -> Type {
        if self == other {
            return self;
        }
        if self.contains(&other) {
            return self;
        }
        if other.contains(&self) {
            return other;
        }
        match (&self, &other) {
            (
                Type::Sequence { kind: k1, item: i1, .. },
                Type::Sequence { kind: k2, item: i2, .. },
            ) if k1 == k2 => Type::Sequence {
                kind: k1.clone(),
                item: Box::new((**i1).clone().union((**i2).clone())),
                size: None,
            },
            _ => Type::Any,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Numeric => write!(f, "numeric"),
            Self::Float => write!(f, "float"),
            Self::Integer => write!(f, "int"),
            Self::Boolean => write!(f, "bool"),
            Self::Dict => write!(f, "dict"),
            Self::Function => write!(f, "function"),
            Self::NullType => write!(f, "null"),
            Self::Sequence { kind, item, size } => {
                let name = match kind {
                    SequenceKind::List => "list",
                    SequenceKind::Tuple => "tuple",
                    SequenceKind::String => "str",
                };
                match size {
                    Some(n) => write!(f, "{name}[{item}; {n}]"),
                    None => write!(f, "{name}[{item}]"),
                }
            }
        }
    }
}

/// Infers a type for `node` bottom-up, returning a new node with `ty` set.
/// Child nodes are re-typed recursively before their parent.
pub fn infer(node: Node) -> Result<Node, TypeError> {
    let ty = match &node.kind {
        NodeKind::Value(lit) => lit.type_of(),
        NodeKind::ValueVector(items) => {
            let item_ty = items
                .iter()
                .map(Literal::type_of)
                .reduce(Type::union)
                .unwrap_or(Type::Any);
            Type::list(item_ty, Some(items.len()))
        }
        NodeKind::Symbol(_) => Type::Any,
        NodeKind::Vector(items) => {
            let mut item_ty = Type::Any;
            let mut first = true;
            for item in items {
                let t = infer(item.clone())?.ty.unwrap_or(Type::Any);
                item_ty = if first { t } else { item_ty.union(t) };
                first = false;
            }
            Type::list(item_ty, Some(items.len()))
        }
        NodeKind::Dict(_) => Type::Dict,
        NodeKind::Binary { left, op, right } => infer_binary(left, *op, right, node.loc)?,
        NodeKind::Unary { op, item } => infer_unary(*op, item)?,
        NodeKind::Compare(cmp) => infer_compare(cmp, node.loc)?,
        NodeKind::Attribute { .. } => Type::Any,
        NodeKind::Subscript { base, index, default } => {
            infer_subscript(base, index, default.as_deref(), node.loc)?
        }
        NodeKind::Slice { base, start, stop } => infer_slice(base, start.as_deref(), stop.as_deref(), node.loc)?,
        NodeKind::Call(call) => infer_call(call, node.loc)?,
        NodeKind::If { then_branch, else_branch, .. } => {
            let then_ty = infer((**then_branch).clone())?.ty.unwrap_or(Type::Any);
            match else_branch {
                Some(e) => {
                    let else_ty = infer((**e).clone())?.ty.unwrap_or(Type::Any);
                    then_ty.union(else_ty)
                }
                None => then_ty,
            }
        }
        NodeKind::For { .. } | NodeKind::While { .. } | NodeKind::Def { .. } | NodeKind::Import { .. } => {
            Type::NullType
        }
        NodeKind::ListFor { .. } => Type::list(Type::Any, None),
        NodeKind::Let { body, .. } => infer((**body).clone())?.ty.unwrap_or(Type::Any),
        NodeKind::Function(_) => Type::Function,
        NodeKind::Return(_) | NodeKind::Break => Type::NullType,
        NodeKind::Sample { .. } => Type::Float,
        NodeKind::Observe { .. } => Type::NullType,
        NodeKind::Body(items) => match items.last() {
            Some(last) => infer(last.clone())?.ty.unwrap_or(Type::Any),
            None => Type::NullType,
        },
    };
    Ok(node.with_type(ty))
}

fn infer_binary(left: &Node, op: BinOp, right: &Node, loc: Option<SourceLoc>) -> Result<Type, TypeError> {
    let lt = infer(left.clone())?.ty.unwrap_or(Type::Any);
    let rt = infer(right.clone())?.ty.unwrap_or(Type::Any);
    match op {
        BinOp::And | BinOp::Or => Ok(lt.union(rt)),
        _ => {
            if !Type::Numeric.contains(&lt) && lt != Type::Any {
                return Err(TypeError::Mismatch {
                    expected: "numeric".into(),
                    found: lt.to_string(),
                    loc: loc.unwrap_or_default(),
                });
            }
            Ok(lt.union(rt))
        }
    }
}

fn infer_unary(op: UnaryOp, item: &Node) -> Result<Type, TypeError> {
    let it = infer(item.clone())?.ty.unwrap_or(Type::Any);
    Ok(match op {
        UnaryOp::Not => Type::Boolean,
        UnaryOp::Pos | UnaryOp::Neg => it,
    })
}

fn is_indexable(ty: &Type) -> bool {
    matches!(ty, Type::Any | Type::Dict | Type::Sequence { .. })
}

/// `base[index]`, optionally with a fallback `default`. Only errors once
/// `base`'s type is known and provably not a sequence or dict; an unresolved
/// `Any` stays permissive.
fn infer_subscript(base: &Node, index: &Node, default: Option<&Node>, loc: Option<SourceLoc>) -> Result<Type, TypeError> {
    let base_ty = infer(base.clone())?.ty.unwrap_or(Type::Any);
    infer(index.clone())?;
    if let Some(d) = default {
        infer(d.clone())?;
    }
    if !is_indexable(&base_ty) {
        return Err(TypeError::NotCallable { found: base_ty.to_string(), loc: loc.unwrap_or_default() });
    }
    Ok(match base_ty {
        Type::Sequence { item, .. } => *item,
        _ => Type::Any,
    })
}

fn infer_slice(base: &Node, start: Option<&Node>, stop: Option<&Node>, loc: Option<SourceLoc>) -> Result<Type, TypeError> {
    let base_ty = infer(base.clone())?.ty.unwrap_or(Type::Any);
    if let Some(s) = start {
        infer(s.clone())?;
    }
    if let Some(s) = stop {
        infer(s.clone())?;
    }
    match base_ty {
        Type::Any => Ok(Type::Any),
        Type::Sequence { kind, item, .. } => Ok(Type::Sequence { kind, item, size: None }),
        other => Err(TypeError::NotCallable { found: other.to_string(), loc: loc.unwrap_or_default() }),
    }
}

/// A `Call`'s function position is ordinarily a free distribution/builtin
/// name or a bound function value, both typed `Any`/`Function` and left
/// unchecked. The one case this can prove wrong: the function position is a
/// literal dict used map-as-lookup-function style, which only accepts the
/// single key argument.
fn infer_call(call: &CallNode, loc: Option<SourceLoc>) -> Result<Type, TypeError> {
    let fn_ty = infer((*call.function).clone())?.ty.unwrap_or(Type::Any);
    for arg in &call.args {
        infer(arg.clone())?;
    }
    for (_, value) in &call.keyword_args {
        infer(value.clone())?;
    }
    match fn_ty {
        Type::Function | Type::Any => Ok(Type::Any),
        Type::Dict if call.args.len() == 1 && call.keyword_args.is_empty() => Ok(Type::Any),
        Type::Dict => Err(TypeError::NotCallable { found: "dict".into(), loc: loc.unwrap_or_default() }),
        other => Err(TypeError::NotCallable { found: other.to_string(), loc: loc.unwrap_or_default() }),
    }
}

fn infer_compare(cmp: &CompareNode, loc: Option<SourceLoc>) -> Result<Type, TypeError> {
    let left = infer(cmp.left.clone())?.ty.unwrap_or(Type::Any);
    let right = infer(cmp.right.clone())?.ty.unwrap_or(Type::Any);
    check_compare_pair(cmp.op, &left, &right, loc)?;
    if let Some(second_op) = cmp.second_op {
        let second_right = infer(cmp.second_right.as_ref().expect("second_right set with second_op").as_ref().clone())?
            .ty
            .unwrap_or(Type::Any);
        check_compare_pair(second_op, &right, &second_right, loc)?;
    }
    Ok(Type::Boolean)
}

fn check_compare_pair(op: CmpOp, left: &Type, right: &Type, loc: Option<SourceLoc>) -> Result<(), TypeError> {
    let ok = match op {
        CmpOp::Eq | CmpOp::Ne => true,
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            matches!(left, Type::Any) || matches!(right, Type::Any) || (Type::Numeric.contains(left) && Type::Numeric.contains(right)) || (left == &Type::string() && right == &Type::string())
        }
        CmpOp::Is | CmpOp::IsNot | CmpOp::In | CmpOp::NotIn => {
            matches!(right, Type::Any | Type::Dict | Type::Sequence { .. })
        }
    };
    if ok {
        Ok(())
    } else {
        Err(TypeError::Mismatch { expected: "numeric".into(), found: format!("{left} and {right}"), loc: loc.unwrap_or_default() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_chain_contains() {
        assert!(Type::Numeric.contains(&Type::Integer));
        assert!(Type::Float.contains(&Type::Boolean));
        assert!(!Type::Integer.contains(&Type::Float));
    }

    #[test]
    fn union_of_int_and_float_is_float() {
        assert_eq!(Type::Integer.union(Type::Float), Type::Float);
    }

    #[test]
    fn union_of_unrelated_types_is_any() {
        assert_eq!(Type::Dict.union(Type::Function), Type::Any);
    }

    #[test]
    fn infers_literal_vector_item_type() {
        let node = Node::new(NodeKind::ValueVector(vec![Literal::Int(1), Literal::Float(2.0)]));
        let typed = infer(node).unwrap();
        assert_eq!(typed.ty, Some(Type::list(Type::Float, Some(2))));
    }

    #[test]
    fn subscripting_an_integer_is_not_callable() {
        let node = Node::new(NodeKind::Subscript {
            base: Box::new(Node::value(Literal::Int(1))),
            index: Box::new(Node::value(Literal::Int(0))),
            default: None,
        });
        assert!(matches!(infer(node), Err(TypeError::NotCallable { .. })));
    }

    #[test]
    fn calling_a_dict_literal_with_two_keys_is_not_callable() {
        let mut entries = indexmap::IndexMap::new();
        entries.insert(crate::ast::DictKey::Int(1), Node::value(Literal::Str(crate::intern::StringId::default())));
        let dict = Node::new(NodeKind::Dict(entries));
        let call = Node::new(NodeKind::Call(CallNode {
            function: Box::new(dict),
            args: vec![Node::value(Literal::Int(1)), Node::value(Literal::Int(2))].into(),
            keyword_args: Vec::new(),
        }));
        assert!(matches!(infer(call), Err(TypeError::NotCallable { .. })));
    }

    #[test]
    fn comparing_incompatible_types_is_a_mismatch() {
        let node = Node::new(NodeKind::Compare(CompareNode {
            left: Box::new(Node::value(Literal::Int(1))),
            op: CmpOp::Lt,
            right: Box::new(Node::value(Literal::Str(crate::intern::StringId::default()))),
            second_op: None,
            second_right: None,
        }));
        assert!(matches!(infer(node), Err(TypeError::Mismatch { .. })));
    }
}
