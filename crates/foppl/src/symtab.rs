//! Symbol table construction and unique renaming.
//!
//! Every name bound by `let`, a function parameter, or a `for`/comprehension
//! target is given a fresh mangled name and a [`SymbolId`], so later passes
//! (the optimizer's inlining, SSA's ϕ-insertion) never have to worry about
//! variable capture. Lookup walks a scope stack, the way a namespace chain
//! does, minus any runtime namespace object itself.

use ahash::AHashMap;

use crate::{
    ast::{CallNode, CompareNode, FunctionNode, Node, NodeKind, UnpackTarget},
    ctx::CompilationContext,
    error::NameError,
    intern::StringId,
    source::SourceLoc,
    types::Type,
};

/// Index into a [`SymbolTable`]'s storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single bound name: its original spelling, its mangled (globally
/// unique) spelling, and the bookkeeping the optimizer and SSA pass need.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub original_name: StringId,
    pub mangled_name: StringId,
    pub read_only: bool,
    pub use_count: u32,
    pub modify_count: u32,
    pub ty: Option<Type>,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    fn push(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    fn mark_used(&mut self, id: SymbolId) {
        self.symbols[id.index()].use_count += 1;
    }

    fn mark_modified(&mut self, id: SymbolId) {
        self.symbols[id.index()].modify_count += 1;
    }
}

type Scope = AHashMap<StringId, SymbolId>;

struct Resolver<'a> {
    ctx: &'a mut CompilationContext,
    table: &'a mut SymbolTable,
    scopes: Vec<Scope>,
}

impl<'a> Resolver<'a> {
    fn lookup(&self, name: StringId) -> Option<SymbolId> {
        self.scopes.iter().rev().find_map(|scope| scope.get(&name).copied())
    }

    /// Binds `name` as a fresh symbol in the innermost scope, returning its
    /// id. Fails if `name` already names a read-only binding reachable from
    /// here.
    fn bind(&mut self, name: StringId, read_only: bool, loc_name: &str) -> Result<SymbolId, NameError> {
        if let Some(existing) = self.lookup(name) {
            if self.table.get(existing).read_only {
                return Err(NameError::RebindReadOnly { name: loc_name.to_owned(), loc: Default::default() });
            }
        }
        let suffix = self.ctx.next_symbol_suffix();
        let mangled_text = format!("{loc_name}_{suffix}");
        let mangled_name = self.ctx.interner.intern(&mangled_text);
        let id = self.table.push(Symbol {
            original_name: name,
            mangled_name,
            read_only,
            use_count: 0,
            modify_count: 0,
            ty: None,
        });
        self.scopes.last_mut().expect("at least one scope active").insert(name, id);
        Ok(id)
    }

    /// Binds every name in `target`, returning a new [`UnpackTarget`] whose
    /// names are the mangled spellings, so the binding occurrence reads the
    /// same text as every reference the resolver rewrites to match it.
    fn bind_target(&mut self, target: &UnpackTarget, read_only: bool) -> Result<UnpackTarget, NameError> {
        match target {
            UnpackTarget::Single(name) => Ok(UnpackTarget::Single(self.bind_mangled(*name, read_only)?)),
            UnpackTarget::Tuple(names) => {
                let mangled = names.iter().map(|&name| self.bind_mangled(name, read_only)).collect::<Result<_, _>>()?;
                Ok(UnpackTarget::Tuple(mangled))
            }
        }
    }

    /// Binds `name` and returns its mangled spelling.
    fn bind_mangled(&mut self, name: StringId, read_only: bool) -> Result<StringId, NameError> {
        let text = self.ctx.interner.resolve(name).to_owned();
        let id = self.bind(name, read_only, &text)?;
        Ok(self.table.get(id).mangled_name)
    }

    /// Resolves a reference occurrence: on a successful scope lookup, marks
    /// the binding used and rewrites `sym.name` to its mangled spelling so
    /// every reference to one binding reads identically. `allow_free` lets
    /// an unresolved name through unchanged instead of erroring — used for
    /// a `Call`'s function position, where a distribution or sequence
    /// primitive name is never locally bound.
    fn resolve_symbol(&mut self, mut sym: crate::ast::SymbolRef, allow_free: bool, loc: Option<SourceLoc>) -> Result<crate::ast::SymbolRef, NameError> {
        match self.lookup(sym.name) {
            Some(id) => {
                self.table.mark_used(id);
                sym.resolved = Some(id);
                sym.name = self.table.get(id).mangled_name;
            }
            None if sym.import_source.is_some() || allow_free => {}
            None => {
                let text = self.ctx.interner.resolve(sym.name).to_owned();
                return Err(NameError::Undefined { name: text, loc: loc.unwrap_or_default() });
            }
        }
        Ok(sym)
    }

    fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, NameError>) -> Result<T, NameError> {
        self.scopes.push(Scope::default());
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn visit(&mut self, node: Node) -> Result<Node, NameError> {
        let loc = node.loc;
        let kind = match node.kind {
            NodeKind::Symbol(sym) => NodeKind::Symbol(self.resolve_symbol(sym, false, loc)?),
            NodeKind::Vector(items) => NodeKind::Vector(self.visit_all(items)?),
            NodeKind::Dict(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    out.push((key, self.visit(value)?));
                }
                NodeKind::Dict(out)
            }
            NodeKind::Binary { left, op, right } => NodeKind::Binary {
                left: Box::new(self.visit(*left)?),
                op,
                right: Box::new(self.visit(*right)?),
            },
            NodeKind::Unary { op, item } => NodeKind::Unary { op, item: Box::new(self.visit(*item)?) },
            NodeKind::Compare(cmp) => NodeKind::Compare(CompareNode {
                left: Box::new(self.visit(*cmp.left)?),
                op: cmp.op,
                right: Box::new(self.visit(*cmp.right)?),
                second_op: cmp.second_op,
                second_right: match cmp.second_right {
                    Some(r) => Some(Box::new(self.visit(*r)?)),
                    None => None,
                },
            }),
            NodeKind::Attribute { base, attr } => NodeKind::Attribute { base: Box::new(self.visit(*base)?), attr },
            NodeKind::Subscript { base, index, default } => NodeKind::Subscript {
                base: Box::new(self.visit(*base)?),
                index: Box::new(self.visit(*index)?),
                default: match default {
                    Some(d) => Some(Box::new(self.visit(*d)?)),
                    None => None,
                },
            },
            NodeKind::Slice { base, start, stop } => NodeKind::Slice {
                base: Box::new(self.visit(*base)?),
                start: match start {
                    Some(s) => Some(Box::new(self.visit(*s)?)),
                    None => None,
                },
                stop: match stop {
                    Some(s) => Some(Box::new(self.visit(*s)?)),
                    None => None,
                },
            },
            NodeKind::Call(call) => {
                let func_node = *call.function;
                let function = if let NodeKind::Symbol(sym) = func_node.kind {
                    let func_loc = func_node.loc;
                    let resolved = self.resolve_symbol(sym, true, func_loc)?;
                    Box::new(Node { kind: NodeKind::Symbol(resolved), loc: func_loc, ty: func_node.ty })
                } else {
                    Box::new(self.visit(func_node)?)
                };
                NodeKind::Call(CallNode {
                    function,
                    args: call.args.into_iter().map(|a| self.visit(a)).collect::<Result<_, _>>()?,
                    keyword_args: call
                        .keyword_args
                        .into_iter()
                        .map(|(k, v)| Ok((k, self.visit(v)?)))
                        .collect::<Result<_, NameError>>()?,
                })
            }
            NodeKind::If { test, then_branch, else_branch } => NodeKind::If {
                test: Box::new(self.visit(*test)?),
                then_branch: Box::new(self.with_scope(|r| r.visit(*then_branch))?),
                else_branch: match else_branch {
                    Some(e) => Some(Box::new(self.with_scope(|r| r.visit(*e))?)),
                    None => None,
                },
            },
            NodeKind::For { target, source, body } => {
                let source = self.visit(*source)?;
                let (target, body) = self.with_scope(|r| {
                    let target = r.bind_target(&target, true)?;
                    let body = r.visit(*body)?;
                    Ok((target, body))
                })?;
                NodeKind::For { target, source: Box::new(source), body: Box::new(body) }
            }
            NodeKind::ListFor { target, source, expr, filter } => {
                let source = self.visit(*source)?;
                let (target, expr, filter) = self.with_scope(|r| {
                    let target = r.bind_target(&target, true)?;
                    let expr = r.visit(*expr)?;
                    let filter = match filter {
                        Some(f) => Some(Box::new(r.visit(*f)?)),
                        None => None,
                    };
                    Ok((target, expr, filter))
                })?;
                NodeKind::ListFor { target, source: Box::new(source), expr: Box::new(expr), filter }
            }
            NodeKind::While { test, body } => {
                NodeKind::While { test: Box::new(self.visit(*test)?), body: Box::new(self.with_scope(|r| r.visit(*body))?) }
            }
            NodeKind::Let { targets, sources, body } => {
                let sources = self.visit_all(sources)?;
                let (targets, body) = self.with_scope(|r| {
                    let targets = targets.iter().map(|target| r.bind_target(target, true)).collect::<Result<_, _>>()?;
                    let body = r.visit(*body)?;
                    Ok((targets, body))
                })?;
                NodeKind::Let { targets, sources, body: Box::new(body) }
            }
            NodeKind::Def { name, value, is_global } => {
                let value = self.visit(*value)?;
                let name = self.bind_target(&name, false)?;
                NodeKind::Def { name, value: Box::new(value), is_global }
            }
            NodeKind::Function(func) => NodeKind::Function(self.visit_function(func)?),
            NodeKind::Return(value) => NodeKind::Return(match value {
                Some(v) => Some(Box::new(self.visit(*v)?)),
                None => None,
            }),
            NodeKind::Sample { dist } => NodeKind::Sample { dist: Box::new(self.visit(*dist)?) },
            NodeKind::Observe { dist, value } => {
                NodeKind::Observe { dist: Box::new(self.visit(*dist)?), value: Box::new(self.visit(*value)?) }
            }
            NodeKind::Body(items) => NodeKind::Body(self.visit_all(items)?),
            kind @ (NodeKind::Value(_)
            | NodeKind::ValueVector(_)
            | NodeKind::Break
            | NodeKind::Import { .. }) => kind,
        };
        Ok(Node { kind, loc, ty: node.ty })
    }

    fn visit_all(&mut self, items: Vec<Node>) -> Result<Vec<Node>, NameError> {
        items.into_iter().map(|item| self.visit(item)).collect()
    }

    fn visit_function(&mut self, func: FunctionNode) -> Result<FunctionNode, NameError> {
        self.with_scope(|r| {
            let params = func.params.iter().map(|&param| r.bind_mangled(param, true)).collect::<Result<_, _>>()?;
            let vararg = match func.vararg {
                Some(vararg) => Some(r.bind_mangled(vararg, true)?),
                None => None,
            };
            let body = r.visit(*func.body)?;
            Ok(FunctionNode { name: func.name, params, vararg, body: Box::new(body), doc: func.doc })
        })
    }
}

/// Resolves every name in `node`, binding `let`/function-param/loop-target
/// names to fresh [`SymbolId`]s recorded in `table`.
pub fn resolve(ctx: &mut CompilationContext, table: &mut SymbolTable, node: Node) -> Result<Node, NameError> {
    let mut resolver = Resolver { ctx, table, scopes: vec![Scope::default()] };
    resolver.visit(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Literal, SymbolRef};

    #[test]
    fn let_binding_resolves_body_reference() {
        let mut ctx = CompilationContext::new();
        let mut table = SymbolTable::new();
        let x = ctx.interner.intern("x");
        let node = Node::new(NodeKind::Let {
            targets: vec![UnpackTarget::Single(x)],
            sources: vec![Node::value(Literal::Int(1))],
            body: Box::new(Node::new(NodeKind::Symbol(SymbolRef { name: x, import_source: None, resolved: None }))),
        });
        let resolved = resolve(&mut ctx, &mut table, node).unwrap();
        match resolved.kind {
            NodeKind::Let { body, .. } => match body.kind {
                NodeKind::Symbol(sym) => assert!(sym.resolved.is_some()),
                _ => panic!("expected Symbol"),
            },
            _ => panic!("expected Let"),
        }
    }

    #[test]
    fn undefined_reference_is_an_error() {
        let mut ctx = CompilationContext::new();
        let mut table = SymbolTable::new();
        let x = ctx.interner.intern("x");
        let node = Node::new(NodeKind::Symbol(SymbolRef { name: x, import_source: None, resolved: None }));
        assert!(resolve(&mut ctx, &mut table, node).is_err());
    }

    #[test]
    fn rebinding_a_let_target_in_nested_let_fails() {
        let mut ctx = CompilationContext::new();
        let mut table = SymbolTable::new();
        let x = ctx.interner.intern("x");
        let inner = Node::new(NodeKind::Let {
            targets: vec![UnpackTarget::Single(x)],
            sources: vec![Node::value(Literal::Int(2))],
            body: Box::new(Node::value(Literal::Int(0))),
        });
        let outer = Node::new(NodeKind::Let {
            targets: vec![UnpackTarget::Single(x)],
            sources: vec![Node::value(Literal::Int(1))],
            body: Box::new(inner),
        });
        assert!(resolve(&mut ctx, &mut table, outer).is_err());
    }
}
