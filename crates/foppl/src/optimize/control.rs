//! Control-flow rewrites: collapsing an `If` with a literal-bool or negated
//! test, merging branches that turn out identical or that differ only in
//! one call/distribution argument, converting an equality-dispatch chain
//! into a dict lookup, inlining a `Let` whose source is trivially pure, and
//! unrolling a `For`/`ListFor` over a literal vector.
//!
//! `Let` inlining substitutes by spelling rather than by resolved
//! [`crate::symtab::SymbolId`] directly: the symbol table rewrites every
//! bound name (and every reference to it) to a mangled spelling unique
//! across the whole program, so by the time this pass runs, two `Symbol`s
//! sharing a spelling are guaranteed to be the same binding — matching by
//! name and matching by `SymbolId` are the same check.

use indexmap::IndexMap;

use crate::{
    ast::{CallNode, CmpOp, CompareNode, DictKey, FunctionNode, Literal, Node, NodeKind, UnaryOp, UnpackTarget},
    error::UnrollLimitExceeded,
    intern::StringId,
};

/// Loop/comprehension unrolling never expands past this many iterations.
pub const UNROLL_LIMIT: usize = 100;

pub fn rewrite(node: &Node) -> Result<Option<Node>, UnrollLimitExceeded> {
    match &node.kind {
        NodeKind::If { test, then_branch, else_branch } => Ok(rewrite_if(test, then_branch, else_branch.as_deref())),
        NodeKind::Let { targets, sources, body } => Ok(rewrite_let(targets, sources, body)),
        NodeKind::For { target, source, body } => rewrite_for(target, source, body, node.loc),
        NodeKind::ListFor { target, source, expr, filter } => rewrite_list_for(target, source, expr, filter.as_deref(), node.loc),
        _ => Ok(None),
    }
}

fn rewrite_if(test: &Node, then_branch: &Node, else_branch: Option<&Node>) -> Option<Node> {
    match &test.kind {
        NodeKind::Value(Literal::Bool(true)) => return Some(then_branch.clone()),
        NodeKind::Value(Literal::Bool(false)) => return Some(else_branch.cloned().unwrap_or_else(|| Node::body(vec![]))),
        NodeKind::Unary { op: UnaryOp::Not, item } => {
            return Some(Node::new(NodeKind::If {
                test: item.clone(),
                then_branch: Box::new(else_branch.cloned().unwrap_or_else(|| Node::body(vec![]))),
                else_branch: Some(Box::new(then_branch.clone())),
            }));
        }
        _ => {}
    }
    let else_branch = else_branch?;
    if then_branch == else_branch {
        return Some(then_branch.clone());
    }
    if let Some(merged) = merge_branch_calls(then_branch, else_branch, test) {
        return Some(merged);
    }
    rewrite_eq_chain(test, then_branch, else_branch)
}

/// Recognizes `symbol == const` as a dispatch test, in either operand order.
fn eq_const_test(test: &Node) -> Option<(&Node, Literal)> {
    let NodeKind::Compare(cmp) = &test.kind else { return None };
    if cmp.op != CmpOp::Eq || cmp.second_op.is_some() {
        return None;
    }
    match (&cmp.left.kind, &cmp.right.kind) {
        (NodeKind::Symbol(_), NodeKind::Value(lit)) => Some((&cmp.left, lit.clone())),
        (NodeKind::Value(lit), NodeKind::Symbol(_)) => Some((&cmp.right, lit.clone())),
        _ => None,
    }
}

fn dict_key_of(lit: &Literal) -> Option<DictKey> {
    match lit {
        Literal::Bool(b) => Some(DictKey::Bool(*b)),
        Literal::Int(v) => Some(DictKey::Int(*v)),
        Literal::Str(s) => Some(DictKey::Str(*s)),
        _ => None,
    }
}

fn same_symbol(a: &Node, b: &Node) -> bool {
    matches!((&a.kind, &b.kind), (NodeKind::Symbol(x), NodeKind::Symbol(y)) if x.name == y.name)
}

/// Converts a chain of `If(subject == const, arm, If(subject == const2, ...))`
/// testing the same subject into a single dict lookup keyed by the
/// constants, with the chain's final fallthrough as the lookup default.
fn rewrite_eq_chain(test: &Node, then_branch: &Node, else_branch: &Node) -> Option<Node> {
    let (subject, key_lit) = eq_const_test(test)?;
    let key = dict_key_of(&key_lit)?;
    let mut entries: IndexMap<DictKey, Node> = IndexMap::new();
    entries.insert(key, then_branch.clone());
    let mut default = else_branch.clone();
    loop {
        let NodeKind::If { test: next_test, then_branch: next_then, else_branch: next_else } = &default.kind else { break };
        let Some((next_subject, next_key_lit)) = eq_const_test(next_test) else { break };
        if !same_symbol(subject, next_subject) {
            break;
        }
        let Some(next_key) = dict_key_of(&next_key_lit) else { break };
        entries.insert(next_key, (**next_then).clone());
        match next_else {
            Some(e) => default = (**e).clone(),
            None => {
                default = Node::body(vec![]);
                break;
            }
        }
    }
    if entries.len() < 2 {
        return None;
    }
    let dict = Node::new(NodeKind::Dict(entries));
    Some(Node::new(NodeKind::Subscript { base: Box::new(dict), index: Box::new(subject.clone()), default: Some(Box::new(default)) }))
}

/// Merges two branches that are `Observe`/`Call` of the same distribution
/// or function and differ in exactly one argument, gating that argument on
/// `test` instead of duplicating the whole call.
fn merge_branch_calls(then_branch: &Node, else_branch: &Node, test: &Node) -> Option<Node> {
    match (&then_branch.kind, &else_branch.kind) {
        (NodeKind::Observe { dist: d1, value: v1 }, NodeKind::Observe { dist: d2, value: v2 }) if v1 == v2 => {
            let NodeKind::Call(c1) = &d1.kind else { return None };
            let NodeKind::Call(c2) = &d2.kind else { return None };
            let merged = merge_call_nodes(c1, c2, test)?;
            Some(Node::new(NodeKind::Observe { dist: Box::new(merged), value: v1.clone() }))
        }
        (NodeKind::Call(c1), NodeKind::Call(c2)) => merge_call_nodes(c1, c2, test),
        _ => None,
    }
}

fn merge_call_nodes(c1: &CallNode, c2: &CallNode, test: &Node) -> Option<Node> {
    if c1.function != c2.function || c1.args.len() != c2.args.len() {
        return None;
    }
    if !c1.keyword_args.is_empty() || !c2.keyword_args.is_empty() {
        return None;
    }
    let mut diff_idx = None;
    for (i, (a, b)) in c1.args.iter().zip(c2.args.iter()).enumerate() {
        if a != b {
            if diff_idx.is_some() {
                return None;
            }
            diff_idx = Some(i);
        }
    }
    let idx = diff_idx?;
    let mut args = c1.args.clone();
    args[idx] = Node::new(NodeKind::If {
        test: Box::new(test.clone()),
        then_branch: Box::new(c1.args[idx].clone()),
        else_branch: Some(Box::new(c2.args[idx].clone())),
    });
    Some(Node::new(NodeKind::Call(CallNode { function: c1.function.clone(), args, keyword_args: Vec::new() })))
}

fn rewrite_let(targets: &[UnpackTarget], sources: &[Node], body: &Node) -> Option<Node> {
    if targets.len() != 1 || sources.len() != 1 {
        return None;
    }
    let UnpackTarget::Single(name) = &targets[0] else { return None };
    if !sources[0].is_trivially_pure() {
        return None;
    }
    Some(substitute(body, *name, &sources[0]))
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

fn rewrite_for(target: &UnpackTarget, source: &Node, body: &Node, loc: Option<crate::source::SourceLoc>) -> Result<Option<Node>, UnrollLimitExceeded> {
    let Some(items) = literal_items(source) else { return Ok(None) };
    if items.len() > UNROLL_LIMIT {
        return Err(UnrollLimitExceeded { limit: UNROLL_LIMIT, loc: loc.unwrap_or_default() });
    }
    let UnpackTarget::Single(name) = target else { return Ok(None) };
    let unrolled = items
        .into_iter()
        .map(|item| substitute(body, *name, &Node::value(item)))
        .collect();
    Ok(Some(Node::body(unrolled)))
}

fn rewrite_list_for(
    target: &UnpackTarget,
    source: &Node,
    expr: &Node,
    filter: Option<&Node>,
    loc: Option<crate::source::SourceLoc>,
) -> Result<Option<Node>, UnrollLimitExceeded> {
    let Some(items) = literal_items(source) else { return Ok(None) };
    if filter.is_some() {
        return Ok(None);
    }
    if items.len() > UNROLL_LIMIT {
        return Err(UnrollLimitExceeded { limit: UNROLL_LIMIT, loc: loc.unwrap_or_default() });
    }
    let UnpackTarget::Single(name) = target else { return Ok(None) };
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        let substituted = substitute(expr, *name, &Node::value(item));
        match &substituted.kind {
            NodeKind::Value(lit) => results.push(lit.clone()),
            _ => return Ok(None),
        }
    }
    Ok(Some(Node::new(NodeKind::ValueVector(results))))
}

/// Replaces every `Symbol` named `name` in `node` with a clone of
/// `replacement`, leaving everything else structurally intact.
fn substitute(node: &Node, name: StringId, replacement: &Node) -> Node {
    let loc = node.loc;
    let ty = node.ty.clone();
    let kind = match &node.kind {
        NodeKind::Symbol(sym) if sym.name == name => return replacement.clone(),
        NodeKind::Vector(items) => NodeKind::Vector(items.iter().map(|i| substitute(i, name, replacement)).collect()),
        NodeKind::Dict(entries) => {
            NodeKind::Dict(entries.iter().map(|(k, v)| (*k, substitute(v, name, replacement))).collect())
        }
        NodeKind::Binary { left, op, right } => {
            NodeKind::Binary { left: Box::new(substitute(left, name, replacement)), op: *op, right: Box::new(substitute(right, name, replacement)) }
        }
        NodeKind::Unary { op, item } => NodeKind::Unary { op: *op, item: Box::new(substitute(item, name, replacement)) },
        NodeKind::Compare(cmp) => NodeKind::Compare(CompareNode {
            left: Box::new(substitute(&cmp.left, name, replacement)),
            op: cmp.op,
            right: Box::new(substitute(&cmp.right, name, replacement)),
            second_op: cmp.second_op,
            second_right: cmp.second_right.as_ref().map(|r| Box::new(substitute(r, name, replacement))),
        }),
        NodeKind::Attribute { base, attr } => NodeKind::Attribute { base: Box::new(substitute(base, name, replacement)), attr: *attr },
        NodeKind::Subscript { base, index, default } => NodeKind::Subscript {
            base: Box::new(substitute(base, name, replacement)),
            index: Box::new(substitute(index, name, replacement)),
            default: default.as_ref().map(|d| Box::new(substitute(d, name, replacement))),
        },
        NodeKind::Slice { base, start, stop } => NodeKind::Slice {
            base: Box::new(substitute(base, name, replacement)),
            start: start.as_ref().map(|s| Box::new(substitute(s, name, replacement))),
            stop: stop.as_ref().map(|s| Box::new(substitute(s, name, replacement))),
        },
        NodeKind::Call(call) => NodeKind::Call(CallNode {
            function: Box::new(substitute(&call.function, name, replacement)),
            args: call.args.iter().map(|a| substitute(a, name, replacement)).collect(),
            keyword_args: call.keyword_args.iter().map(|(k, v)| (*k, substitute(v, name, replacement))).collect(),
        }),
        NodeKind::If { test, then_branch, else_branch } => NodeKind::If {
            test: Box::new(substitute(test, name, replacement)),
            then_branch: Box::new(substitute(then_branch, name, replacement)),
            else_branch: else_branch.as_ref().map(|e| Box::new(substitute(e, name, replacement))),
        },
        NodeKind::For { target, source, body } => NodeKind::For {
            target: target.clone(),
            source: Box::new(substitute(source, name, replacement)),
            body: Box::new(substitute(body, name, replacement)),
        },
        NodeKind::ListFor { target, source, expr, filter } => NodeKind::ListFor {
            target: target.clone(),
            source: Box::new(substitute(source, name, replacement)),
            expr: Box::new(substitute(expr, name, replacement)),
            filter: filter.as_ref().map(|f| Box::new(substitute(f, name, replacement))),
        },
        NodeKind::While { test, body } => {
            NodeKind::While { test: Box::new(substitute(test, name, replacement)), body: Box::new(substitute(body, name, replacement)) }
        }
        NodeKind::Let { targets, sources, body } => NodeKind::Let {
            targets: targets.clone(),
            sources: sources.iter().map(|s| substitute(s, name, replacement)).collect(),
            body: Box::new(substitute(body, name, replacement)),
        },
        NodeKind::Def { name: target, value, is_global } => {
            NodeKind::Def { name: target.clone(), value: Box::new(substitute(value, name, replacement)), is_global: *is_global }
        }
        NodeKind::Function(func) => NodeKind::Function(FunctionNode {
            name: func.name,
            params: func.params.clone(),
            vararg: func.vararg,
            body: Box::new(substitute(&func.body, name, replacement)),
            doc: func.doc.clone(),
        }),
        NodeKind::Return(value) => NodeKind::Return(value.as_ref().map(|v| Box::new(substitute(v, name, replacement)))),
        NodeKind::Sample { dist } => NodeKind::Sample { dist: Box::new(substitute(dist, name, replacement)) },
        NodeKind::Observe { dist, value } => {
            NodeKind::Observe { dist: Box::new(substitute(dist, name, replacement)), value: Box::new(substitute(value, name, replacement)) }
        }
        NodeKind::Body(items) => NodeKind::Body(items.iter().map(|i| substitute(i, name, replacement)).collect()),
        other => other.clone(),
    };
    Node { kind, loc, ty }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SymbolRef;

    #[test]
    fn if_with_true_test_collapses_to_then() {
        let node = Node::new(NodeKind::If {
            test: Box::new(Node::value(Literal::Bool(true))),
            then_branch: Box::new(Node::value(Literal::Int(1))),
            else_branch: Some(Box::new(Node::value(Literal::Int(2)))),
        });
        let NodeKind::If { test, then_branch, else_branch } = node.kind else { unreachable!() };
        assert_eq!(rewrite_if(&test, &then_branch, else_branch.as_deref()), Some(Node::value(Literal::Int(1))));
    }

    #[test]
    fn let_with_literal_source_inlines() {
        let name = StringId::default();
        let body = Node::new(NodeKind::Symbol(SymbolRef { name, import_source: None, resolved: None }));
        let result = substitute(&body, name, &Node::value(Literal::Int(42)));
        assert_eq!(result, Node::value(Literal::Int(42)));
    }

    #[test]
    fn for_over_literal_vector_unrolls() {
        let name = StringId::default();
        let source = Node::new(NodeKind::ValueVector(vec![Literal::Int(1), Literal::Int(2)]));
        let body = Node::new(NodeKind::Symbol(SymbolRef { name, import_source: None, resolved: None }));
        let result = rewrite_for(&UnpackTarget::Single(name), &source, &body, None).unwrap().unwrap();
        match result.kind {
            NodeKind::Body(items) => assert_eq!(items.len(), 2),
            _ => panic!("expected Body"),
        }
    }

    #[test]
    fn negated_test_flips_branches() {
        let test = Node::new(NodeKind::Unary {
            op: UnaryOp::Not,
            item: Box::new(Node::new(NodeKind::Symbol(SymbolRef { name: StringId::default(), import_source: None, resolved: None }))),
        });
        let then_branch = Node::value(Literal::Int(1));
        let else_branch = Node::value(Literal::Int(2));
        let rewritten = rewrite_if(&test, &then_branch, Some(&else_branch)).unwrap();
        match rewritten.kind {
            NodeKind::If { then_branch, else_branch, .. } => {
                assert_eq!(*then_branch, else_branch_value(2));
                assert_eq!(*else_branch.unwrap(), else_branch_value(1));
            }
            _ => panic!("expected If"),
        }
    }

    fn else_branch_value(v: i64) -> Node {
        Node::value(Literal::Int(v))
    }

    #[test]
    fn identical_branches_collapse() {
        let test = Node::new(NodeKind::Symbol(SymbolRef { name: StringId::default(), import_source: None, resolved: None }));
        let arm = Node::value(Literal::Int(7));
        assert_eq!(rewrite_if(&test, &arm, Some(&arm)), Some(arm));
    }

    #[test]
    fn equal_symbol_chain_becomes_dict_lookup() {
        let subject = Node::new(NodeKind::Symbol(SymbolRef { name: StringId::default(), import_source: None, resolved: None }));
        let test = Node::new(NodeKind::Compare(CompareNode {
            left: Box::new(subject.clone()),
            op: CmpOp::Eq,
            right: Box::new(Node::value(Literal::Int(1))),
            second_op: None,
            second_right: None,
        }));
        let inner_test = Node::new(NodeKind::Compare(CompareNode {
            left: Box::new(subject),
            op: CmpOp::Eq,
            right: Box::new(Node::value(Literal::Int(2))),
            second_op: None,
            second_right: None,
        }));
        let inner_if = Node::new(NodeKind::If {
            test: Box::new(inner_test),
            then_branch: Box::new(Node::value(Literal::Int(20))),
            else_branch: Some(Box::new(Node::value(Literal::Int(0)))),
        });
        let rewritten = rewrite_if(&test, &Node::value(Literal::Int(10)), Some(&inner_if)).unwrap();
        match rewritten.kind {
            NodeKind::Subscript { base, default, .. } => {
                let NodeKind::Dict(entries) = base.kind else { panic!("expected dict base") };
                assert_eq!(entries.len(), 2);
                assert_eq!(*default.unwrap(), Node::value(Literal::Int(0)));
            }
            other => panic!("expected Subscript, got {other:?}"),
        }
    }

    #[test]
    fn merges_branches_differing_in_one_call_argument() {
        let function = Box::new(Node::new(NodeKind::Symbol(SymbolRef { name: StringId::default(), import_source: None, resolved: None })));
        let test = Node::new(NodeKind::Symbol(SymbolRef { name: StringId::default(), import_source: None, resolved: None }));
        let then_branch = Node::new(NodeKind::Call(CallNode {
            function: function.clone(),
            args: smallvec::smallvec![Node::value(Literal::Int(1)), Node::value(Literal::Int(9))],
            keyword_args: Vec::new(),
        }));
        let else_branch = Node::new(NodeKind::Call(CallNode {
            function,
            args: smallvec::smallvec![Node::value(Literal::Int(2)), Node::value(Literal::Int(9))],
            keyword_args: Vec::new(),
        }));
        let merged = rewrite_if(&test, &then_branch, Some(&else_branch)).unwrap();
        match merged.kind {
            NodeKind::Call(call) => assert!(matches!(call.args[0].kind, NodeKind::If { .. })),
            other => panic!("expected Call, got {other:?}"),
        }
    }
}
