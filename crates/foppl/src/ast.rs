//! The closed AST sum type shared by both surface parsers.
//!
//! Nodes are value-like and immutable after construction: every transform
//! pass returns a freshly built tree rather than mutating shared nodes.
//! The resolved [`crate::symtab::SymbolId`] lives directly on [`Symbol`]
//! and is set by the symbol-table pass returning a new node.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::{intern::StringId, source::SourceLoc, symtab::SymbolId, types::Type};

/// A literal value. `Vector` nests recursively so [`NodeKind::ValueVector`]
/// can hold literal vectors of literal vectors (invariant iii).
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    Str(StringId),
    Vector(Vec<Literal>),
}

impl Literal {
    #[must_use]
    pub fn type_of(&self) -> Type {
        match self {
            Self::Bool(_) => Type::Boolean,
            Self::Int(_) => Type::Integer,
            Self::Float(_) | Self::Complex(..) => Type::Float,
            Self::Str(_) => Type::string(),
            Self::Vector(items) => {
                let item_ty = items
                    .iter()
                    .map(Literal::type_of)
                    .reduce(Type::union)
                    .unwrap_or(Type::Any);
                Type::list(item_ty, Some(items.len()))
            }
        }
    }
}

/// A restricted, hashable key type for [`NodeKind::Dict`] literal keys.
/// FOPPL/Clojure dict keys are names, ints, or strings in practice; floats
/// are excluded so `Dict` can use ordinary `Eq`/`Hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictKey {
    Bool(bool),
    Int(i64),
    Str(StringId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    FloorDiv,
    Pow,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    In,
    IsNot,
    NotIn,
}

/// A let/for/comprehension binding target: a single name or a tuple of
/// names to unpack into.
#[derive(Debug, Clone, PartialEq)]
pub enum UnpackTarget {
    Single(StringId),
    Tuple(Vec<StringId>),
}

impl UnpackTarget {
    #[must_use]
    pub fn names(&self) -> &[StringId] {
        match self {
            Self::Single(name) => std::slice::from_ref(name),
            Self::Tuple(names) => names,
        }
    }
}

/// A resolved symbol reference, set by the symbol-table pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRef {
    pub name: StringId,
    pub import_source: Option<StringId>,
    pub resolved: Option<SymbolId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallNode {
    pub function: Box<Node>,
    pub args: SmallVec<[Node; 4]>,
    pub keyword_args: Vec<(StringId, Node)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompareNode {
    pub left: Box<Node>,
    pub op: CmpOp,
    pub right: Box<Node>,
    pub second_op: Option<CmpOp>,
    pub second_right: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionNode {
    pub name: Option<StringId>,
    pub params: Vec<StringId>,
    pub vararg: Option<StringId>,
    pub body: Box<Node>,
    pub doc: Option<String>,
}

/// The closed sum of AST node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Value(Literal),
    ValueVector(Vec<Literal>),
    Symbol(SymbolRef),
    Vector(Vec<Node>),
    /// Insertion-order-preserving, the way the source's own `dict` literal
    /// order is observable through iteration.
    Dict(IndexMap<DictKey, Node>),
    Binary { left: Box<Node>, op: BinOp, right: Box<Node> },
    Unary { op: UnaryOp, item: Box<Node> },
    Compare(CompareNode),
    Attribute { base: Box<Node>, attr: StringId },
    Subscript { base: Box<Node>, index: Box<Node>, default: Option<Box<Node>> },
    Slice { base: Box<Node>, start: Option<Box<Node>>, stop: Option<Box<Node>> },
    Call(CallNode),
    If { test: Box<Node>, then_branch: Box<Node>, else_branch: Option<Box<Node>> },
    For { target: UnpackTarget, source: Box<Node>, body: Box<Node> },
    ListFor { target: UnpackTarget, source: Box<Node>, expr: Box<Node>, filter: Option<Box<Node>> },
    While { test: Box<Node>, body: Box<Node> },
    Let { targets: Vec<UnpackTarget>, sources: Vec<Node>, body: Box<Node> },
    Def { name: UnpackTarget, value: Box<Node>, is_global: bool },
    Function(FunctionNode),
    Return(Option<Box<Node>>),
    Break,
    Import { module: StringId, names: Option<Vec<StringId>>, alias: Option<StringId> },
    Sample { dist: Box<Node> },
    Observe { dist: Box<Node>, value: Box<Node> },
    Body(Vec<Node>),
}

/// One AST node: a kind, an optional source location, and an optional
/// inferred type (set by the [`crate::types`] pass).
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub loc: Option<SourceLoc>,
    pub ty: Option<Type>,
}

/// Two nodes are equal when their expressions match, regardless of where in
/// the source they occurred or what the inferencer annotated them with — the
/// optimizer compares subexpressions for being "the same computation", not
/// for sharing a parse site.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Node {
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self { kind, loc: None, ty: None }
    }

    #[must_use]
    pub fn at(mut self, loc: SourceLoc) -> Self {
        self.loc = Some(loc);
        self
    }

    #[must_use]
    pub fn with_type(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    #[must_use]
    pub fn value(lit: Literal) -> Self {
        Self::new(NodeKind::Value(lit))
    }

    /// Builds a `Body`, flattening any directly-nested `Body` exactly one
    /// level, per invariant (i). A single-item body collapses to that item.
    #[must_use]
    pub fn body(items: Vec<Node>) -> Self {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item.kind {
                NodeKind::Body(inner) => flat.extend(inner),
                _ => flat.push(item),
            }
        }
        if flat.len() == 1 {
            flat.into_iter().next().unwrap()
        } else {
            Self::new(NodeKind::Body(flat))
        }
    }

    #[must_use]
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Value(_) | NodeKind::ValueVector(_))
    }

    /// True for nodes the optimizer may freely duplicate or drop: literals
    /// and bare symbol references. Anything else (calls, control flow,
    /// `Sample`/`Observe`) may have a side effect and is not "pure" by this
    /// narrow definition — see [`crate::optimize::effects`] for the fuller
    /// effect analysis used before inlining.
    #[must_use]
    pub fn is_trivially_pure(&self) -> bool {
        matches!(self.kind, NodeKind::Value(_) | NodeKind::ValueVector(_) | NodeKind::Symbol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_flattens_one_level() {
        let inner = Node::new(NodeKind::Body(vec![Node::value(Literal::Int(1)), Node::value(Literal::Int(2))]));
        let outer = Node::body(vec![inner, Node::value(Literal::Int(3))]);
        match outer.kind {
            NodeKind::Body(items) => assert_eq!(items.len(), 3),
            _ => panic!("expected Body"),
        }
    }

    #[test]
    fn single_item_body_collapses() {
        let node = Node::body(vec![Node::value(Literal::Int(42))]);
        assert!(matches!(node.kind, NodeKind::Value(Literal::Int(42))));
    }
}
