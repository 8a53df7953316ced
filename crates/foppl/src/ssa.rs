//! Static single assignment / condition-expansion pass.
//!
//! When both arms of an `If` bind the same name, each arm's binding is
//! renamed apart (`x__then`, `x__else`) and a single ϕ-join binds the
//! original name to `phi(test, x__then, x__else)` — a plain `Call` to a
//! synthetic `phi` symbol, so no new AST variant is needed for it.
//!
//! [`lift_conditionals`] runs second: it lifts an `If` out of any operator,
//! comparison, call, or `Sample`/`Observe` position it sits in as a direct
//! operand, so that by the time graph construction runs, every distribution
//! and observation expression has atomic leaves.

use crate::{
    ast::{CallNode, FunctionNode, Node, NodeKind, UnpackTarget},
    ctx::CompilationContext,
    intern::StringId,
};

/// Rewrites `node`, lifting `If`s whose arms both bind the same name into a
/// ϕ-join. Recurses into every child first so nested conditionals resolve
/// from the inside out.
pub fn expand(ctx: &mut CompilationContext, node: Node) -> Node {
    let loc = node.loc;
    let ty = node.ty.clone();
    let kind = match node.kind {
        NodeKind::Vector(items) => NodeKind::Vector(items.into_iter().map(|i| expand(ctx, i)).collect()),
        NodeKind::Dict(entries) => {
            NodeKind::Dict(entries.into_iter().map(|(k, v)| (k, expand(ctx, v))).collect())
        }
        NodeKind::Binary { left, op, right } => {
            NodeKind::Binary { left: Box::new(expand(ctx, *left)), op, right: Box::new(expand(ctx, *right)) }
        }
        NodeKind::Unary { op, item } => NodeKind::Unary { op, item: Box::new(expand(ctx, *item)) },
        NodeKind::Compare(cmp) => NodeKind::Compare(crate::ast::CompareNode {
            left: Box::new(expand(ctx, *cmp.left)),
            op: cmp.op,
            right: Box::new(expand(ctx, *cmp.right)),
            second_op: cmp.second_op,
            second_right: cmp.second_right.map(|r| Box::new(expand(ctx, *r))),
        }),
        NodeKind::Attribute { base, attr } => NodeKind::Attribute { base: Box::new(expand(ctx, *base)), attr },
        NodeKind::Subscript { base, index, default } => NodeKind::Subscript {
            base: Box::new(expand(ctx, *base)),
            index: Box::new(expand(ctx, *index)),
            default: default.map(|d| Box::new(expand(ctx, *d))),
        },
        NodeKind::Slice { base, start, stop } => NodeKind::Slice {
            base: Box::new(expand(ctx, *base)),
            start: start.map(|s| Box::new(expand(ctx, *s))),
            stop: stop.map(|s| Box::new(expand(ctx, *s))),
        },
        NodeKind::Call(call) => NodeKind::Call(CallNode {
            function: Box::new(expand(ctx, *call.function)),
            args: call.args.into_iter().map(|a| expand(ctx, a)).collect(),
            keyword_args: call.keyword_args.into_iter().map(|(k, v)| (k, expand(ctx, v))).collect(),
        }),
        NodeKind::If { test, then_branch, else_branch } => {
            return expand_if(ctx, loc, ty, *test, *then_branch, else_branch.map(|e| *e));
        }
        NodeKind::For { target, source, body } => {
            NodeKind::For { target, source: Box::new(expand(ctx, *source)), body: Box::new(expand(ctx, *body)) }
        }
        NodeKind::ListFor { target, source, expr, filter } => NodeKind::ListFor {
            target,
            source: Box::new(expand(ctx, *source)),
            expr: Box::new(expand(ctx, *expr)),
            filter: filter.map(|f| Box::new(expand(ctx, *f))),
        },
        NodeKind::While { test, body } => NodeKind::While { test: Box::new(expand(ctx, *test)), body: Box::new(expand(ctx, *body)) },
        NodeKind::Let { targets, sources, body } => NodeKind::Let {
            targets,
            sources: sources.into_iter().map(|s| expand(ctx, s)).collect(),
            body: Box::new(expand(ctx, *body)),
        },
        NodeKind::Def { name, value, is_global } => NodeKind::Def { name, value: Box::new(expand(ctx, *value)), is_global },
        NodeKind::Function(func) => NodeKind::Function(FunctionNode {
            name: func.name,
            params: func.params,
            vararg: func.vararg,
            body: Box::new(expand(ctx, *func.body)),
            doc: func.doc,
        }),
        NodeKind::Return(value) => NodeKind::Return(value.map(|v| Box::new(expand(ctx, *v)))),
        NodeKind::Sample { dist } => NodeKind::Sample { dist: Box::new(expand(ctx, *dist)) },
        NodeKind::Observe { dist, value } => {
            NodeKind::Observe { dist: Box::new(expand(ctx, *dist)), value: Box::new(expand(ctx, *value)) }
        }
        NodeKind::Body(items) => NodeKind::Body(items.into_iter().map(|i| expand(ctx, i)).collect()),
        kind @ (NodeKind::Value(_) | NodeKind::ValueVector(_) | NodeKind::Symbol(_) | NodeKind::Break | NodeKind::Import { .. }) => {
            kind
        }
    };
    Node { kind, loc, ty }
}

fn expand_if(
    ctx: &mut CompilationContext,
    loc: Option<crate::source::SourceLoc>,
    ty: Option<crate::types::Type>,
    test: Node,
    then_branch: Node,
    else_branch: Option<Node>,
) -> Node {
    let test = expand(ctx, test);
    let then_branch = expand(ctx, then_branch);
    let Some(else_branch) = else_branch else {
        return Node { kind: NodeKind::If { test: Box::new(test), then_branch: Box::new(then_branch), else_branch: None }, loc, ty };
    };
    let else_branch = expand(ctx, else_branch);

    let then_names = trailing_def_names(&then_branch);
    let else_names = trailing_def_names(&else_branch);
    let shared: Vec<StringId> = then_names.iter().copied().filter(|n| else_names.contains(n)).collect();

    if shared.is_empty() {
        return Node {
            kind: NodeKind::If { test: Box::new(test), then_branch: Box::new(then_branch), else_branch: Some(Box::new(else_branch)) },
            loc,
            ty,
        };
    }

    let phi_fn = ctx.interner.intern("phi");
    let mut stmts = Vec::new();
    let mut then_renamed = then_branch;
    let mut else_renamed = else_branch;
    let mut joins = Vec::new();
    for name in shared {
        let suffix = ctx.next_symbol_suffix();
        let then_name = ctx.interner.intern(&format!("{}__then{suffix}", ctx.interner.resolve(name)));
        let else_name = ctx.interner.intern(&format!("{}__else{suffix}", ctx.interner.resolve(name)));
        then_renamed = rename_def(then_renamed, name, then_name);
        else_renamed = rename_def(else_renamed, name, else_name);
        joins.push((name, then_name, else_name));
    }
    stmts.push(then_renamed);
    stmts.push(else_renamed);
    for (name, then_name, else_name) in joins {
        let phi_call = NodeKind::Call(CallNode {
            function: Box::new(Node::new(NodeKind::Symbol(crate::ast::SymbolRef { name: phi_fn, import_source: None, resolved: None }))),
            args: smallvec::smallvec![test.clone(), symbol(then_name), symbol(else_name)],
            keyword_args: Vec::new(),
        });
        stmts.push(Node::new(NodeKind::Def { name: UnpackTarget::Single(name), value: Box::new(Node::new(phi_call)), is_global: false }));
    }
    Node { kind: Node::body(stmts).kind, loc, ty }
}

fn symbol(name: StringId) -> Node {
    Node::new(NodeKind::Symbol(crate::ast::SymbolRef { name, import_source: None, resolved: None }))
}

/// Lifts an `If` appearing as a direct sub-expression of an operator,
/// comparison, call, or `Sample`/`Observe` out to wrap the whole expression:
/// `f(.., if c then a else b, ..)` becomes `if c then f(.., a, ..) else
/// f(.., b, ..)`, so distributions and observations always see atomic
/// leaves. Runs after [`expand`] so any ϕ-joins are already in place, and
/// recurses until no direct child of a liftable node is itself an `If`.
pub fn lift_conditionals(node: Node) -> Node {
    let loc = node.loc;
    let ty = node.ty.clone();
    let kind = match node.kind {
        NodeKind::Vector(items) => NodeKind::Vector(items.into_iter().map(lift_conditionals).collect()),
        NodeKind::Dict(entries) => NodeKind::Dict(entries.into_iter().map(|(k, v)| (k, lift_conditionals(v))).collect()),
        NodeKind::Binary { left, op, right } => {
            return lift_binary(lift_conditionals(*left), op, lift_conditionals(*right), loc, ty);
        }
        NodeKind::Unary { op, item } => return lift_unary(op, lift_conditionals(*item), loc, ty),
        NodeKind::Compare(cmp) => {
            return lift_compare(lift_conditionals(*cmp.left), cmp.op, lift_conditionals(*cmp.right), cmp.second_op, cmp.second_right, loc, ty);
        }
        NodeKind::Attribute { base, attr } => NodeKind::Attribute { base: Box::new(lift_conditionals(*base)), attr },
        NodeKind::Subscript { base, index, default } => NodeKind::Subscript {
            base: Box::new(lift_conditionals(*base)),
            index: Box::new(lift_conditionals(*index)),
            default: default.map(|d| Box::new(lift_conditionals(*d))),
        },
        NodeKind::Slice { base, start, stop } => NodeKind::Slice {
            base: Box::new(lift_conditionals(*base)),
            start: start.map(|s| Box::new(lift_conditionals(*s))),
            stop: stop.map(|s| Box::new(lift_conditionals(*s))),
        },
        NodeKind::Call(call) => {
            let function = lift_conditionals(*call.function);
            let args: Vec<Node> = call.args.into_iter().map(lift_conditionals).collect();
            let keyword_args: Vec<(StringId, Node)> = call.keyword_args.into_iter().map(|(k, v)| (k, lift_conditionals(v))).collect();
            return lift_call(function, args, keyword_args, loc, ty);
        }
        NodeKind::If { test, then_branch, else_branch } => NodeKind::If {
            test: Box::new(lift_conditionals(*test)),
            then_branch: Box::new(lift_conditionals(*then_branch)),
            else_branch: else_branch.map(|e| Box::new(lift_conditionals(*e))),
        },
        NodeKind::For { target, source, body } => {
            NodeKind::For { target, source: Box::new(lift_conditionals(*source)), body: Box::new(lift_conditionals(*body)) }
        }
        NodeKind::ListFor { target, source, expr, filter } => NodeKind::ListFor {
            target,
            source: Box::new(lift_conditionals(*source)),
            expr: Box::new(lift_conditionals(*expr)),
            filter: filter.map(|f| Box::new(lift_conditionals(*f))),
        },
        NodeKind::While { test, body } => NodeKind::While { test: Box::new(lift_conditionals(*test)), body: Box::new(lift_conditionals(*body)) },
        NodeKind::Let { targets, sources, body } => {
            NodeKind::Let { targets, sources: sources.into_iter().map(lift_conditionals).collect(), body: Box::new(lift_conditionals(*body)) }
        }
        NodeKind::Def { name, value, is_global } => NodeKind::Def { name, value: Box::new(lift_conditionals(*value)), is_global },
        NodeKind::Function(func) => NodeKind::Function(FunctionNode {
            name: func.name,
            params: func.params,
            vararg: func.vararg,
            body: Box::new(lift_conditionals(*func.body)),
            doc: func.doc,
        }),
        NodeKind::Return(value) => NodeKind::Return(value.map(|v| Box::new(lift_conditionals(*v)))),
        NodeKind::Sample { dist } => return lift_sample(lift_conditionals(*dist), loc, ty),
        NodeKind::Observe { dist, value } => {
            return lift_observe(lift_conditionals(*dist), lift_conditionals(*value), loc, ty);
        }
        NodeKind::Body(items) => NodeKind::Body(items.into_iter().map(lift_conditionals).collect()),
        kind @ (NodeKind::Value(_) | NodeKind::ValueVector(_) | NodeKind::Symbol(_) | NodeKind::Break | NodeKind::Import { .. }) => kind,
    };
    Node { kind, loc, ty }
}

fn as_if(node: Node) -> Result<(Node, Node, Option<Node>), Node> {
    match node.kind {
        NodeKind::If { test, then_branch, else_branch } => Ok((*test, *then_branch, else_branch.map(|e| *e))),
        _ => Err(node),
    }
}

fn wrap_if(test: Node, then_val: Node, else_val: Node, loc: Option<crate::source::SourceLoc>, ty: Option<crate::types::Type>) -> Node {
    Node {
        kind: NodeKind::If { test: Box::new(test), then_branch: Box::new(lift_conditionals(then_val)), else_branch: Some(Box::new(lift_conditionals(else_val))) },
        loc,
        ty,
    }
}

fn lift_binary(left: Node, op: crate::ast::BinOp, right: Node, loc: Option<crate::source::SourceLoc>, ty: Option<crate::types::Type>) -> Node {
    match as_if(left) {
        Ok((test, then_val, Some(else_val))) => wrap_if(
            test,
            Node::new(NodeKind::Binary { left: Box::new(then_val), op, right: Box::new(right.clone()) }),
            Node::new(NodeKind::Binary { left: Box::new(else_val), op, right: Box::new(right) }),
            loc,
            ty,
        ),
        Ok((test, then_val, None)) => Node {
            kind: NodeKind::If { test: Box::new(test), then_branch: Box::new(Node::new(NodeKind::Binary { left: Box::new(then_val), op, right: Box::new(right) })), else_branch: None },
            loc,
            ty,
        },
        Err(left) => match as_if(right) {
            Ok((test, then_val, Some(else_val))) => wrap_if(
                test,
                Node::new(NodeKind::Binary { left: Box::new(left.clone()), op, right: Box::new(then_val) }),
                Node::new(NodeKind::Binary { left: Box::new(left), op, right: Box::new(else_val) }),
                loc,
                ty,
            ),
            Ok((test, then_val, None)) => Node {
                kind: NodeKind::If { test: Box::new(test), then_branch: Box::new(Node::new(NodeKind::Binary { left: Box::new(left), op, right: Box::new(then_val) })), else_branch: None },
                loc,
                ty,
            },
            Err(right) => Node { kind: NodeKind::Binary { left: Box::new(left), op, right: Box::new(right) }, loc, ty },
        },
    }
}

fn lift_unary(op: crate::ast::UnaryOp, item: Node, loc: Option<crate::source::SourceLoc>, ty: Option<crate::types::Type>) -> Node {
    match as_if(item) {
        Ok((test, then_val, Some(else_val))) => wrap_if(
            test,
            Node::new(NodeKind::Unary { op, item: Box::new(then_val) }),
            Node::new(NodeKind::Unary { op, item: Box::new(else_val) }),
            loc,
            ty,
        ),
        Ok((test, then_val, None)) => {
            Node { kind: NodeKind::If { test: Box::new(test), then_branch: Box::new(Node::new(NodeKind::Unary { op, item: Box::new(then_val) })), else_branch: None }, loc, ty }
        }
        Err(item) => Node { kind: NodeKind::Unary { op, item: Box::new(item) }, loc, ty },
    }
}

fn lift_compare(
    left: Node,
    op: crate::ast::CmpOp,
    right: Node,
    second_op: Option<crate::ast::CmpOp>,
    second_right: Option<Box<Node>>,
    loc: Option<crate::source::SourceLoc>,
    ty: Option<crate::types::Type>,
) -> Node {
    let rebuild = |left: Node, right: Node| {
        Node::new(NodeKind::Compare(crate::ast::CompareNode {
            left: Box::new(left),
            op,
            right: Box::new(right),
            second_op,
            second_right: second_right.clone(),
        }))
    };
    match as_if(left) {
        Ok((test, then_val, Some(else_val))) => wrap_if(test, rebuild(then_val, right.clone()), rebuild(else_val, right), loc, ty),
        Ok((test, then_val, None)) => Node { kind: NodeKind::If { test: Box::new(test), then_branch: Box::new(rebuild(then_val, right)), else_branch: None }, loc, ty },
        Err(left) => match as_if(right) {
            Ok((test, then_val, Some(else_val))) => wrap_if(test, rebuild(left.clone(), then_val), rebuild(left, else_val), loc, ty),
            Ok((test, then_val, None)) => Node { kind: NodeKind::If { test: Box::new(test), then_branch: Box::new(rebuild(left, then_val)), else_branch: None }, loc, ty },
            Err(right) => rebuild(left, right),
        },
    }
}

fn lift_call(function: Node, args: Vec<Node>, keyword_args: Vec<(StringId, Node)>, loc: Option<crate::source::SourceLoc>, ty: Option<crate::types::Type>) -> Node {
    let Some(pos) = args.iter().position(|a| matches!(a.kind, NodeKind::If { .. })) else {
        return Node {
            kind: NodeKind::Call(CallNode { function: Box::new(function), args: args.into(), keyword_args }),
            loc,
            ty,
        };
    };
    let mut then_args = args.clone();
    let (test, then_val, else_branch) = as_if(then_args[pos].clone()).unwrap_or_else(|_| unreachable!("position located by the matches! check above"));
    then_args[pos] = then_val;
    let then_call = Node::new(NodeKind::Call(CallNode { function: Box::new(function.clone()), args: then_args.into(), keyword_args: keyword_args.clone() }));
    let Some(else_val) = else_branch else {
        return Node { kind: NodeKind::If { test: Box::new(test), then_branch: Box::new(then_call), else_branch: None }, loc, ty };
    };
    let mut else_args = args;
    else_args[pos] = else_val;
    let else_call = Node::new(NodeKind::Call(CallNode { function: Box::new(function), args: else_args.into(), keyword_args }));
    wrap_if(test, then_call, else_call, loc, ty)
}

fn lift_sample(dist: Node, loc: Option<crate::source::SourceLoc>, ty: Option<crate::types::Type>) -> Node {
    match as_if(dist) {
        Ok((test, then_val, Some(else_val))) => wrap_if(
            test,
            Node::new(NodeKind::Sample { dist: Box::new(then_val) }),
            Node::new(NodeKind::Sample { dist: Box::new(else_val) }),
            loc,
            ty,
        ),
        Ok((test, then_val, None)) => {
            Node { kind: NodeKind::If { test: Box::new(test), then_branch: Box::new(Node::new(NodeKind::Sample { dist: Box::new(then_val) })), else_branch: None }, loc, ty }
        }
        Err(dist) => Node { kind: NodeKind::Sample { dist: Box::new(dist) }, loc, ty },
    }
}

fn lift_observe(dist: Node, value: Node, loc: Option<crate::source::SourceLoc>, ty: Option<crate::types::Type>) -> Node {
    match as_if(dist) {
        Ok((test, then_val, Some(else_val))) => wrap_if(
            test,
            Node::new(NodeKind::Observe { dist: Box::new(then_val), value: Box::new(value.clone()) }),
            Node::new(NodeKind::Observe { dist: Box::new(else_val), value: Box::new(value) }),
            loc,
            ty,
        ),
        Ok((test, then_val, None)) => Node {
            kind: NodeKind::If { test: Box::new(test), then_branch: Box::new(Node::new(NodeKind::Observe { dist: Box::new(then_val), value: Box::new(value) })), else_branch: None },
            loc,
            ty,
        },
        Err(dist) => match as_if(value) {
            Ok((test, then_val, Some(else_val))) => wrap_if(
                test,
                Node::new(NodeKind::Observe { dist: Box::new(dist.clone()), value: Box::new(then_val) }),
                Node::new(NodeKind::Observe { dist: Box::new(dist), value: Box::new(else_val) }),
                loc,
                ty,
            ),
            Ok((test, then_val, None)) => Node {
                kind: NodeKind::If { test: Box::new(test), then_branch: Box::new(Node::new(NodeKind::Observe { dist: Box::new(dist), value: Box::new(then_val) })), else_branch: None },
                loc,
                ty,
            },
            Err(value) => Node { kind: NodeKind::Observe { dist: Box::new(dist), value: Box::new(value) }, loc, ty },
        },
    }
}

/// The names bound by the `Def` statements at the tail of a (possibly
/// `Body`-wrapped) branch — the only bindings visible to code after the
/// `If` without further `let`-scoping.
fn trailing_def_names(node: &Node) -> Vec<StringId> {
    let items: Vec<&Node> = match &node.kind {
        NodeKind::Body(items) => items.iter().collect(),
        _ => vec![node],
    };
    items
        .into_iter()
        .filter_map(|item| match &item.kind {
            NodeKind::Def { name: UnpackTarget::Single(n), .. } => Some(*n),
            _ => None,
        })
        .collect()
}

/// Replaces the bound name of every top-level `Def { name: Single(old), .. }`
/// in `node` with `new` (only at the statement level `trailing_def_names`
/// inspects; reads of `old` inside the branch are untouched since `old` is
/// about to become dead once renamed consistently by the caller).
fn rename_def(node: Node, old: StringId, new: StringId) -> Node {
    match node.kind {
        NodeKind::Body(items) => Node::body(items.into_iter().map(|i| rename_def(i, old, new)).collect()),
        NodeKind::Def { name: UnpackTarget::Single(n), value, is_global } if n == old => {
            Node { kind: NodeKind::Def { name: UnpackTarget::Single(new), value, is_global }, loc: node.loc, ty: node.ty }
        }
        kind => Node { kind, loc: node.loc, ty: node.ty },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;

    #[test]
    fn joins_shared_def_across_branches() {
        let mut ctx = CompilationContext::new();
        let x = ctx.interner.intern("x");
        let then_branch = Node::new(NodeKind::Def {
            name: UnpackTarget::Single(x),
            value: Box::new(Node::value(Literal::Int(1))),
            is_global: false,
        });
        let else_branch = Node::new(NodeKind::Def {
            name: UnpackTarget::Single(x),
            value: Box::new(Node::value(Literal::Int(2))),
            is_global: false,
        });
        let if_node = Node::new(NodeKind::If {
            test: Box::new(Node::value(Literal::Bool(true))),
            then_branch: Box::new(then_branch),
            else_branch: Some(Box::new(else_branch)),
        });
        let expanded = expand(&mut ctx, if_node);
        match expanded.kind {
            NodeKind::Body(items) => {
                assert_eq!(items.len(), 3);
                match &items[2].kind {
                    NodeKind::Def { name: UnpackTarget::Single(n), value, .. } => {
                        assert_eq!(*n, x);
                        assert!(matches!(value.kind, NodeKind::Call(_)));
                    }
                    _ => panic!("expected phi Def"),
                }
            }
            _ => panic!("expected Body"),
        }
    }

    #[test]
    fn lifts_if_out_of_call_argument() {
        let mut ctx = CompilationContext::new();
        let c = ctx.interner.intern("c");
        let mu1 = ctx.interner.intern("mu1");
        let mu2 = ctx.interner.intern("mu2");
        let normal = ctx.interner.intern("normal");

        let test = symbol(c);
        let branch_if = Node::new(NodeKind::If {
            test: Box::new(test),
            then_branch: Box::new(symbol(mu1)),
            else_branch: Some(Box::new(symbol(mu2))),
        });
        let call = Node::new(NodeKind::Call(CallNode {
            function: Box::new(symbol(normal)),
            args: smallvec::smallvec![branch_if, Node::value(Literal::Int(1))],
            keyword_args: Vec::new(),
        }));

        let lifted = lift_conditionals(call);
        match lifted.kind {
            NodeKind::If { then_branch, else_branch, .. } => {
                assert!(matches!(then_branch.kind, NodeKind::Call(_)));
                assert!(matches!(else_branch.unwrap().kind, NodeKind::Call(_)));
            }
            other => panic!("expected the Call to be wrapped by If, got {other:?}"),
        }
    }
}
