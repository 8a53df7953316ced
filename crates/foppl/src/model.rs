//! `Model`: the public query surface over a compiled graph — vertices by
//! class, rendered code strings, and a pretty-printed `V`/`A`/`C`/`D` dump.
//! A thin public wrapper that owns the pipeline's final artifact and
//! exposes read-only queries over it, never mutation.

use crate::{
    codegen,
    graph::{ConditionId, DataId, Graph, VertexId, VertexKind},
    intern::Interner,
    registry::DistributionClass,
};

/// The compiled graphical model returned by [`crate::compile`].
pub struct Model {
    graph: Graph,
    interner: Interner,
}

impl Model {
    pub(crate) fn new(graph: Graph, interner: Interner) -> Self {
        Self { graph, interner }
    }

    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[must_use]
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Vertices in compute (= topological) order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.graph.compute_order().into_iter()
    }

    pub fn sampled(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.graph.vertices.iter().filter(|v| v.is_sampled()).map(|v| v.id)
    }

    pub fn observed(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.graph.vertices.iter().filter(|v| v.is_observed()).map(|v| v.id)
    }

    pub fn conditional(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.graph.vertices.iter().filter(|v| v.is_conditional()).map(|v| v.id)
    }

    pub fn continuous(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.by_class(DistributionClass::Continuous)
    }

    pub fn discrete(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.by_class(DistributionClass::Discrete)
    }

    fn by_class(&self, class: DistributionClass) -> impl Iterator<Item = VertexId> + '_ {
        self.graph.vertices.iter().filter(move |v| v.class == class).map(|v| v.id)
    }

    #[must_use]
    pub fn vertex_name(&self, id: VertexId) -> &str {
        self.interner.resolve(self.graph.vertex(id).name)
    }

    #[must_use]
    pub fn condition_name(&self, id: ConditionId) -> &str {
        self.interner.resolve(self.graph.condition(id).name)
    }

    #[must_use]
    pub fn data_name(&self, id: DataId) -> &str {
        self.interner.resolve(self.graph.data(id).name)
    }

    #[must_use]
    pub fn sample_code(&self) -> String {
        codegen::sample_code(&self.graph, &self.interner)
    }

    #[must_use]
    pub fn logpdf_code(&self) -> String {
        codegen::logpdf_code(&self.graph, &self.interner)
    }

    #[must_use]
    pub fn render(&self) -> String {
        codegen::render_model(&self.graph, &self.interner)
    }

    /// A `V`/`A`/`C`/`D` dump: vertex set, arc set, condition set, data set,
    /// one per line, sorted by compute order — a plain-text debugging view,
    /// not part of the generated runtime code.
    #[must_use]
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        out.push_str("V: ");
        out.push_str(
            &self
                .graph
                .vertices
                .iter()
                .map(|v| format!("{}[{}]", self.interner.resolve(v.name), v.class))
                .collect::<Vec<_>>()
                .join(", "),
        );
        out.push('\n');

        out.push_str("A: ");
        let arcs: Vec<String> = self
            .graph
            .vertices
            .iter()
            .flat_map(|v| {
                v.ancestors.iter().map(move |&a| format!("{}->{}", self.interner.resolve(self.graph.vertex(a).name), self.interner.resolve(v.name)))
            })
            .collect();
        out.push_str(&arcs.join(", "));
        out.push('\n');

        out.push_str("C: ");
        out.push_str(&self.graph.conditions.iter().map(|c| self.interner.resolve(c.name)).collect::<Vec<_>>().join(", "));
        out.push('\n');

        out.push_str("D: ");
        out.push_str(&self.graph.data.iter().map(|d| self.interner.resolve(d.name)).collect::<Vec<_>>().join(", "));

        out
    }

    /// Placeholder kept for symmetry with `VertexKind`'s two variants, handy
    /// for callers that want to branch on kind without matching on the
    /// graph directly.
    #[must_use]
    pub fn vertex_kind(&self, id: VertexId) -> VertexKind {
        self.graph.vertex(id).kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::Literal, ast::Node, ast::NodeKind, ctx::CompilationContext, graph::build::build, registry::DistributionRegistry};

    #[test]
    fn pretty_print_lists_all_node_classes() {
        let mut ctx = CompilationContext::new();
        let registry = DistributionRegistry::new();
        let name = ctx.interner.intern("normal");
        let dist = Node::new(NodeKind::Call(crate::ast::CallNode {
            function: Box::new(Node::new(NodeKind::Symbol(crate::ast::SymbolRef { name, import_source: None, resolved: None }))),
            args: vec![Node::value(Literal::Int(0)), Node::value(Literal::Int(1))].into(),
            keyword_args: Vec::new(),
        }));
        let program = Node::new(NodeKind::Sample { dist: Box::new(dist) });
        let graph = build(&mut ctx, &registry, program);
        let model = Model::new(graph, ctx.interner);
        let printed = model.pretty_print();
        assert!(printed.starts_with("V: x1"));
        assert!(model.sampled().count() == 1);
    }
}
