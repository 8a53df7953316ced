//! The graph-construction visitor: walks the SSA-expanded,
//! optimized AST once, allocating `Vertex`/`ConditionNode`/`DataNode`s and
//! replacing each `Sample`/`Observe`/hoisted-literal with a `Symbol`
//! pointing at the generated name, exactly the way the optimizer's passes
//! rebuild the tree wholesale rather than mutate it in place.
//!
//! Tracks two contextual stacks while it walks: the current
//! branch-condition stack and an implicit parents-of-expression map, here
//! realized as `symbol_to_vertex`/`symbol_to_data` lookups since
//! every parent is, by construction, reached only through a `Symbol` the
//! graph builder itself planted.

use std::collections::BTreeSet;

use ahash::AHashMap;

use crate::{
    ast::{CallNode, CompareNode, FunctionNode, Literal, Node, NodeKind, SymbolRef, UnpackTarget},
    ctx::CompilationContext,
    intern::StringId,
    registry::DistributionRegistry,
    render,
};

use super::{ConditionId, ConditionNode, DataId, DataNode, Graph, Vertex, VertexId, VertexKind};

/// Runs the graph-construction visitor over `node` (already passed through
/// [`crate::optimize::optimize`] and [`crate::ssa::expand`]), returning the
/// built [`Graph`].
pub fn build(ctx: &mut CompilationContext, registry: &DistributionRegistry, node: Node) -> Graph {
    let mut builder = GraphBuilder {
        ctx,
        registry,
        graph: Graph::new(),
        symbol_to_vertex: AHashMap::new(),
        symbol_to_data: AHashMap::new(),
        data_by_key: AHashMap::new(),
        conditions: Vec::new(),
        renamed: AHashMap::new(),
    };
    builder.visit(node);
    builder.graph
}

struct GraphBuilder<'a> {
    ctx: &'a mut CompilationContext,
    registry: &'a DistributionRegistry,
    graph: Graph,
    symbol_to_vertex: AHashMap<StringId, VertexId>,
    symbol_to_data: AHashMap<StringId, DataId>,
    data_by_key: AHashMap<String, DataId>,
    conditions: Vec<(ConditionId, bool)>,
    /// Maps a `Def`/`Let`-bound name to the generated vertex/data name its
    /// value resolved to, so every later `Symbol` reference to the bound
    /// name renders and links as the generated name instead.
    renamed: AHashMap<StringId, StringId>,
}

fn symbol_node(name: StringId) -> Node {
    Node::new(NodeKind::Symbol(SymbolRef { name, import_source: None, resolved: None }))
}

impl<'a> GraphBuilder<'a> {
    fn visit(&mut self, node: Node) -> Node {
        let loc = node.loc;
        let ty = node.ty.clone();
        let kind = match node.kind {
            NodeKind::Sample { dist } => return self.make_sample(*dist),
            NodeKind::Observe { dist, value } => return self.make_observe(*dist, *value),
            NodeKind::If { test, then_branch, else_branch } => return self.make_if(*test, *then_branch, else_branch.map(|e| *e)),
            NodeKind::Vector(items) => {
                let visited: Vec<Node> = items.into_iter().map(|i| self.visit(i)).collect();
                if visited.len() > 3 {
                    if let Some(literal) = all_literal(&visited) {
                        return self.hoist_data(literal);
                    }
                }
                NodeKind::Vector(visited)
            }
            NodeKind::ValueVector(items) if items.len() > 3 => return self.hoist_data(Literal::Vector(items)),
            NodeKind::Dict(entries) => NodeKind::Dict(entries.into_iter().map(|(k, v)| (k, self.visit(v))).collect()),
            NodeKind::Binary { left, op, right } => {
                NodeKind::Binary { left: Box::new(self.visit(*left)), op, right: Box::new(self.visit(*right)) }
            }
            NodeKind::Unary { op, item } => NodeKind::Unary { op, item: Box::new(self.visit(*item)) },
            NodeKind::Compare(cmp) => NodeKind::Compare(CompareNode {
                left: Box::new(self.visit(*cmp.left)),
                op: cmp.op,
                right: Box::new(self.visit(*cmp.right)),
                second_op: cmp.second_op,
                second_right: cmp.second_right.map(|r| Box::new(self.visit(*r))),
            }),
            NodeKind::Attribute { base, attr } => NodeKind::Attribute { base: Box::new(self.visit(*base)), attr },
            NodeKind::Subscript { base, index, default } => NodeKind::Subscript {
                base: Box::new(self.visit(*base)),
                index: Box::new(self.visit(*index)),
                default: default.map(|d| Box::new(self.visit(*d))),
            },
            NodeKind::Slice { base, start, stop } => NodeKind::Slice {
                base: Box::new(self.visit(*base)),
                start: start.map(|s| Box::new(self.visit(*s))),
                stop: stop.map(|s| Box::new(self.visit(*s))),
            },
            NodeKind::Call(call) => NodeKind::Call(CallNode {
                function: Box::new(self.visit(*call.function)),
                args: call.args.into_iter().map(|a| self.visit(a)).collect(),
                keyword_args: call.keyword_args.into_iter().map(|(k, v)| (k, self.visit(v))).collect(),
            }),
            NodeKind::For { target, source, body } => {
                NodeKind::For { target, source: Box::new(self.visit(*source)), body: Box::new(self.visit(*body)) }
            }
            NodeKind::ListFor { target, source, expr, filter } => NodeKind::ListFor {
                target,
                source: Box::new(self.visit(*source)),
                expr: Box::new(self.visit(*expr)),
                filter: filter.map(|f| Box::new(self.visit(*f))),
            },
            NodeKind::While { test, body } => NodeKind::While { test: Box::new(self.visit(*test)), body: Box::new(self.visit(*body)) },
            NodeKind::Let { targets, sources, body } => {
                let sources: Vec<Node> = sources.into_iter().map(|s| self.visit(s)).collect();
                for (target, source) in targets.iter().zip(sources.iter()) {
                    self.register_rename(target, source);
                }
                NodeKind::Let { targets, sources, body: Box::new(self.visit(*body)) }
            }
            NodeKind::Def { name, value, is_global } => {
                let value = self.visit(*value);
                self.register_rename(&name, &value);
                NodeKind::Def { name, value: Box::new(value), is_global }
            }
            NodeKind::Function(func) => NodeKind::Function(FunctionNode {
                name: func.name,
                params: func.params,
                vararg: func.vararg,
                body: Box::new(self.visit(*func.body)),
                doc: func.doc,
            }),
            NodeKind::Return(value) => NodeKind::Return(value.map(|v| Box::new(self.visit(*v)))),
            NodeKind::Body(items) => NodeKind::Body(items.into_iter().map(|i| self.visit(i)).collect()),
            NodeKind::Symbol(sym) => match self.renamed.get(&sym.name) {
                Some(&renamed_to) => NodeKind::Symbol(SymbolRef { name: renamed_to, ..sym }),
                None => NodeKind::Symbol(sym),
            },
            other @ (NodeKind::Value(_) | NodeKind::ValueVector(_) | NodeKind::Break | NodeKind::Import { .. }) => other,
        };
        Node { kind, loc, ty }
    }

    fn make_sample(&mut self, dist: Node) -> Node {
        let dist = self.visit(dist);
        let (ancestors, data_deps) = self.collect_parents(&dist);
        let (dist_name, dist_code) = self.render_dist(&dist);
        let suffix = self.ctx.next_vertex_suffix();
        let name = self.ctx.interner.intern(&format!("x{suffix}"));
        let id = VertexId(self.graph.vertices.len() as u32);
        let class = self.registry.classify(&dist_name);
        self.graph.vertices.push(Vertex {
            id,
            name,
            kind: VertexKind::Sampled,
            ancestors,
            data_deps,
            dist_name,
            dist_code,
            observation_code: None,
            conditions: self.conditions.clone(),
            dependent_conditions: BTreeSet::new(),
            class,
            sample_size: 1,
        });
        self.symbol_to_vertex.insert(name, id);
        symbol_node(name)
    }

    fn make_observe(&mut self, dist: Node, value: Node) -> Node {
        let dist = self.visit(dist);
        let value = self.visit(value);
        let (mut ancestors, mut data_deps) = self.collect_parents(&dist);
        let (value_ancestors, value_data) = self.collect_parents(&value);
        ancestors.extend(value_ancestors);
        data_deps.extend(value_data);
        let (dist_name, dist_code) = self.render_dist(&dist);
        let suffix = self.ctx.next_vertex_suffix();
        let name = self.ctx.interner.intern(&format!("y{suffix}"));
        let id = VertexId(self.graph.vertices.len() as u32);
        let class = self.registry.classify(&dist_name);
        self.graph.vertices.push(Vertex {
            id,
            name,
            kind: VertexKind::Observed,
            ancestors,
            data_deps,
            dist_name,
            dist_code,
            observation_code: Some(render::render(&value, &self.ctx.interner)),
            conditions: self.conditions.clone(),
            dependent_conditions: BTreeSet::new(),
            class,
            sample_size: 1,
        });
        self.symbol_to_vertex.insert(name, id);
        symbol_node(name)
    }

    fn make_if(&mut self, test: Node, then_branch: Node, else_branch: Option<Node>) -> Node {
        let test = self.visit(test);
        let (ancestors, _data) = self.collect_parents(&test);
        let expr_code = render::render(&test, &self.ctx.interner);
        let suffix = self.ctx.next_condition_suffix();
        let name = self.ctx.interner.intern(&format!("cond{suffix}"));
        let id = ConditionId(self.graph.conditions.len() as u32);
        self.graph.conditions.push(ConditionNode { id, name, expr_code, ancestors: ancestors.clone() });
        for vid in self.graph.transitive_ancestors(&ancestors) {
            self.graph.vertex_mut(vid).dependent_conditions.insert(id);
        }

        self.conditions.push((id, true));
        let then_branch = self.visit(then_branch);
        self.conditions.pop();

        let else_branch = else_branch.map(|e| {
            self.conditions.push((id, false));
            let visited = self.visit(e);
            self.conditions.pop();
            Box::new(visited)
        });

        Node::new(NodeKind::If { test: Box::new(test), then_branch: Box::new(then_branch), else_branch })
    }

    fn hoist_data(&mut self, literal: Literal) -> Node {
        let key = render::render_literal(&literal, &self.ctx.interner);
        if let Some(&id) = self.data_by_key.get(&key) {
            return symbol_node(self.graph.data(id).name);
        }
        let suffix = self.ctx.next_data_suffix();
        let name = self.ctx.interner.intern(&format!("data{suffix}"));
        let id = DataId(self.graph.data.len() as u32);
        self.graph.data.push(DataNode { id, name, literal });
        self.symbol_to_data.insert(name, id);
        self.data_by_key.insert(key, id);
        symbol_node(name)
    }

    /// `Def`/`Let` binds `target` to a `value` graph construction may have
    /// already replaced with a `Symbol` pointing at a generated vertex or
    /// data node (a `Sample`/`Observe`/hoisted literal). Every later
    /// reference to `target`'s own name must read and render as that
    /// generated name instead.
    fn register_rename(&mut self, target: &UnpackTarget, value: &Node) {
        let UnpackTarget::Single(name) = target else { return };
        let NodeKind::Symbol(sym) = &value.kind else { return };
        self.renamed.insert(*name, sym.name);
    }

    fn render_dist(&self, dist: &Node) -> (String, String) {
        match &dist.kind {
            NodeKind::Call(call) => render::render_distribution(call, &self.ctx.interner),
            _ => ("Unknown".to_owned(), render::render(dist, &self.ctx.interner)),
        }
    }

    fn collect_parents(&self, node: &Node) -> (BTreeSet<VertexId>, BTreeSet<DataId>) {
        let mut vertices = BTreeSet::new();
        let mut data = BTreeSet::new();
        walk_symbols(node, &mut |name| {
            if let Some(&id) = self.symbol_to_vertex.get(&name) {
                vertices.insert(id);
            }
            if let Some(&id) = self.symbol_to_data.get(&name) {
                data.insert(id);
            }
        });
        (vertices, data)
    }
}

/// Every `Symbol` name reachable from `node`, including ones nested inside
/// otherwise-opaque subtrees (calls, comparisons, branches).
fn walk_symbols(node: &Node, f: &mut impl FnMut(StringId)) {
    match &node.kind {
        NodeKind::Symbol(sym) => f(sym.name),
        NodeKind::Vector(items) | NodeKind::Body(items) => items.iter().for_each(|i| walk_symbols(i, f)),
        NodeKind::ValueVector(_) | NodeKind::Value(_) | NodeKind::Break | NodeKind::Import { .. } => {}
        NodeKind::Dict(entries) => entries.iter().for_each(|(_, v)| walk_symbols(v, f)),
        NodeKind::Binary { left, right, .. } => {
            walk_symbols(left, f);
            walk_symbols(right, f);
        }
        NodeKind::Unary { item, .. } => walk_symbols(item, f),
        NodeKind::Compare(cmp) => {
            walk_symbols(&cmp.left, f);
            walk_symbols(&cmp.right, f);
            if let Some(r) = &cmp.second_right {
                walk_symbols(r, f);
            }
        }
        NodeKind::Attribute { base, .. } => walk_symbols(base, f),
        NodeKind::Subscript { base, index, default } => {
            walk_symbols(base, f);
            walk_symbols(index, f);
            if let Some(d) = default {
                walk_symbols(d, f);
            }
        }
        NodeKind::Slice { base, start, stop } => {
            walk_symbols(base, f);
            if let Some(s) = start {
                walk_symbols(s, f);
            }
            if let Some(s) = stop {
                walk_symbols(s, f);
            }
        }
        NodeKind::Call(call) => {
            walk_symbols(&call.function, f);
            call.args.iter().for_each(|a| walk_symbols(a, f));
            call.keyword_args.iter().for_each(|(_, v)| walk_symbols(v, f));
        }
        NodeKind::If { test, then_branch, else_branch } => {
            walk_symbols(test, f);
            walk_symbols(then_branch, f);
            if let Some(e) = else_branch {
                walk_symbols(e, f);
            }
        }
        NodeKind::For { source, body, .. } => {
            walk_symbols(source, f);
            walk_symbols(body, f);
        }
        NodeKind::ListFor { source, expr, filter, .. } => {
            walk_symbols(source, f);
            walk_symbols(expr, f);
            if let Some(flt) = filter {
                walk_symbols(flt, f);
            }
        }
        NodeKind::While { test, body } => {
            walk_symbols(test, f);
            walk_symbols(body, f);
        }
        NodeKind::Let { sources, body, .. } => {
            sources.iter().for_each(|s| walk_symbols(s, f));
            walk_symbols(body, f);
        }
        NodeKind::Def { value, .. } => walk_symbols(value, f),
        NodeKind::Function(func) => walk_symbols(&func.body, f),
        NodeKind::Return(value) => {
            if let Some(v) = value {
                walk_symbols(v, f);
            }
        }
        NodeKind::Sample { dist } => walk_symbols(dist, f),
        NodeKind::Observe { dist, value } => {
            walk_symbols(dist, f);
            walk_symbols(value, f);
        }
    }
}

fn all_literal(items: &[Node]) -> Option<Vec<Literal>> {
    items
        .iter()
        .map(|item| match &item.kind {
            NodeKind::Value(lit) => Some(lit.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SymbolRef as Sym;

    fn dist_call(ctx: &mut CompilationContext, name: &str, args: Vec<Node>) -> Node {
        let fname = ctx.interner.intern(name);
        Node::new(NodeKind::Call(CallNode {
            function: Box::new(Node::new(NodeKind::Symbol(Sym { name: fname, import_source: None, resolved: None }))),
            args: args.into(),
            keyword_args: Vec::new(),
        }))
    }

    #[test]
    fn sample_then_observe_links_ancestor() {
        let mut ctx = CompilationContext::new();
        let registry = DistributionRegistry::new();
        let x = ctx.interner.intern("x");

        let sample_dist = dist_call(&mut ctx, "normal", vec![Node::value(Literal::Int(0)), Node::value(Literal::Int(1))]);
        let sample = Node::new(NodeKind::Sample { dist: Box::new(sample_dist) });
        let def_x = Node::new(NodeKind::Def { name: UnpackTarget::Single(x), value: Box::new(sample), is_global: false });

        let x_ref = Node::new(NodeKind::Symbol(Sym { name: x, import_source: None, resolved: None }));
        let observe_dist = dist_call(&mut ctx, "normal", vec![x_ref, Node::value(Literal::Int(1))]);
        let observe = Node::new(NodeKind::Observe { dist: Box::new(observe_dist), value: Box::new(Node::value(Literal::Int(2))) });

        let program = Node::body(vec![def_x, observe]);
        let graph = build(&mut ctx, &registry, program);

        assert_eq!(graph.vertices.len(), 2);
        assert!(graph.vertices[0].is_sampled());
        assert!(graph.vertices[1].is_observed());
        assert!(graph.vertices[1].ancestors.contains(&graph.vertices[0].id));
        assert!(graph.is_acyclic());
    }

    #[test]
    fn branch_creates_condition_and_propagates() {
        let mut ctx = CompilationContext::new();
        let registry = DistributionRegistry::new();
        let p = ctx.interner.intern("p");

        let sample_dist = dist_call(&mut ctx, "bernoulli", vec![Node::value(Literal::Float(0.5))]);
        let def_p = Node::new(NodeKind::Def {
            name: UnpackTarget::Single(p),
            value: Box::new(Node::new(NodeKind::Sample { dist: Box::new(sample_dist) })),
            is_global: false,
        });

        let p_ref = Node::new(NodeKind::Symbol(Sym { name: p, import_source: None, resolved: None }));
        let test = Node::new(NodeKind::Compare(CompareNode {
            left: Box::new(p_ref),
            op: crate::ast::CmpOp::Eq,
            right: Box::new(Node::value(Literal::Int(1))),
            second_op: None,
            second_right: None,
        }));

        let then_dist = dist_call(&mut ctx, "normal", vec![Node::value(Literal::Int(0)), Node::value(Literal::Int(1))]);
        let then_branch = Node::new(NodeKind::Observe { dist: Box::new(then_dist), value: Box::new(Node::value(Literal::Int(0))) });
        let else_dist = dist_call(&mut ctx, "normal", vec![Node::value(Literal::Int(1)), Node::value(Literal::Int(1))]);
        let else_branch = Node::new(NodeKind::Observe { dist: Box::new(else_dist), value: Box::new(Node::value(Literal::Int(0))) });

        let if_node = Node::new(NodeKind::If { test: Box::new(test), then_branch: Box::new(then_branch), else_branch: Some(Box::new(else_branch)) });
        let program = Node::body(vec![def_p, if_node]);
        let graph = build(&mut ctx, &registry, program);

        assert_eq!(graph.vertices.len(), 3);
        assert_eq!(graph.conditions.len(), 1);
        let p_vertex = &graph.vertices[0];
        assert!(p_vertex.dependent_conditions.contains(&graph.conditions[0].id));
        assert_eq!(graph.vertices[1].conditions, vec![(graph.conditions[0].id, true)]);
        assert_eq!(graph.vertices[2].conditions, vec![(graph.conditions[0].id, false)]);
    }
}
