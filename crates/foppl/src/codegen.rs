//! Code-template emission: for the full node arena, emit two
//! parallel textual code sequences — `sample_code` and `logpdf_code` — keyed
//! on a stateful `state` mapping, then splice them into a fixed model-class
//! template at the `{SAMPLE-CODE}`/`{LOGPDF-CODE}` markers.
//!
//! A `DataNode` contributes to the sample stream but never the log-pdf
//! stream (it carries no density), and consecutive nodes with identical
//! distribution text share one `dst_` binding instead of re-evaluating it.

use crate::{
    graph::{Graph, VertexKind},
    intern::Interner,
};

/// Default indent width used when splicing generated code under a marker
/// that itself sits at column 0 (the common case for the bundled template).
const INDENT: &str = "    ";

pub fn sample_code(graph: &Graph, interner: &Interner) -> String {
    let mut lines = Vec::new();
    let mut last_dist: Option<&str> = None;
    for data in &graph.data {
        lines.push(format!("state['{}'] = {}", interner.resolve(data.name), crate::render::render_literal(&data.literal, interner)));
    }
    for cond in &graph.conditions {
        lines.push(format!("state['{}'] = {}", interner.resolve(cond.name), cond.expr_code));
    }
    for vertex in &graph.vertices {
        let name = interner.resolve(vertex.name);
        match vertex.kind {
            VertexKind::Sampled => {
                if last_dist != Some(vertex.dist_code.as_str()) {
                    lines.push(format!("dst_ = {}", vertex.dist_code));
                }
                let call = if vertex.sample_size > 1 {
                    format!("dst_.sample(sample_size={})", vertex.sample_size)
                } else {
                    "dst_.sample()".to_owned()
                };
                lines.push(format!("state['{name}'] = {call}"));
            }
            VertexKind::Observed => {
                let obs = vertex.observation_code.as_deref().unwrap_or("None");
                lines.push(format!("state['{name}'] = {obs}"));
            }
        }
        last_dist = Some(vertex.dist_code.as_str());
    }
    lines.join("\n")
}

pub fn logpdf_code(graph: &Graph, interner: &Interner) -> String {
    let mut lines = Vec::new();
    let mut last_dist: Option<&str> = None;
    for vertex in &graph.vertices {
        let name = interner.resolve(vertex.name);
        let body = if last_dist != Some(vertex.dist_code.as_str()) {
            format!("dst_ = {}\nlog_pdf += dst_.log_pdf(state['{name}'])", vertex.dist_code)
        } else {
            format!("log_pdf += dst_.log_pdf(state['{name}'])")
        };
        last_dist = Some(vertex.dist_code.as_str());
        let gated = gate(&body, graph, vertex, interner);
        lines.push(gated);
    }
    lines.join("\n")
}

fn gate(body: &str, graph: &Graph, vertex: &crate::graph::Vertex, interner: &Interner) -> String {
    if vertex.conditions.is_empty() {
        return body.to_owned();
    }
    let guards: Vec<String> = vertex
        .conditions
        .iter()
        .map(|(cond_id, truth)| {
            let cond_name = interner.resolve(graph.condition(*cond_id).name);
            format!("state['{cond_name}'] == {}", if *truth { "True" } else { "False" })
        })
        .collect();
    let indented: String = body.lines().map(|line| format!("{INDENT}{line}")).collect::<Vec<_>>().join("\n");
    format!("if {}:\n{}", guards.join(" and "), indented)
}

/// The fixed model-class skeleton. `{SAMPLE-CODE}`/`{LOGPDF-CODE}` are
/// substituted preserving the leading indent of the marker line; the
/// skeleton's own indentation is what the substitution measures.
pub const MODEL_TEMPLATE: &str = "class Model:\n    def gen_prior_samples(self):\n        state = {}\n        {SAMPLE-CODE}\n        return state\n\n    def gen_log_pdf(self, state):\n        log_pdf = 0.0\n        {LOGPDF-CODE}\n        return log_pdf\n";

pub fn render_model(graph: &Graph, interner: &Interner) -> String {
    substitute_marker(&substitute_marker(MODEL_TEMPLATE, "{SAMPLE-CODE}", &sample_code(graph, interner)), "{LOGPDF-CODE}", &logpdf_code(graph, interner))
}

/// Replaces `marker` with `code`, re-indenting every line of `code` after
/// the first to match the marker's own leading whitespace so a multi-line
/// splice stays syntactically valid Python.
fn substitute_marker(template: &str, marker: &str, code: &str) -> String {
    let Some(line_start) = template.lines().find(|l| l.contains(marker)) else {
        return template.to_owned();
    };
    let indent: String = line_start.chars().take_while(|c| c.is_whitespace()).collect();
    let mut reindented_lines = code.lines();
    let mut reindented = String::new();
    if let Some(first) = reindented_lines.next() {
        reindented.push_str(first);
    }
    for line in reindented_lines {
        reindented.push('\n');
        reindented.push_str(&indent);
        reindented.push_str(line);
    }
    template.replace(marker, &reindented)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ctx::CompilationContext, graph::build::build, registry::DistributionRegistry};

    #[test]
    fn shares_dst_binding_across_consecutive_same_distribution() {
        let mut ctx = CompilationContext::new();
        let registry = DistributionRegistry::new();
        let name = ctx.interner.intern("normal");
        let dist = |ctx: &mut CompilationContext| {
            Node::new(crate::ast::NodeKind::Call(crate::ast::CallNode {
                function: Box::new(Node::new(crate::ast::NodeKind::Symbol(crate::ast::SymbolRef { name, import_source: None, resolved: None }))),
                args: vec![Node::value(crate::ast::Literal::Int(0)), Node::value(crate::ast::Literal::Int(1))].into(),
                keyword_args: Vec::new(),
            }))
        };
        use crate::ast::Node;
        let s1 = Node::new(crate::ast::NodeKind::Sample { dist: Box::new(dist(&mut ctx)) });
        let s2 = Node::new(crate::ast::NodeKind::Sample { dist: Box::new(dist(&mut ctx)) });
        let program = Node::body(vec![s1, s2]);
        let graph = build(&mut ctx, &registry, program);
        let code = sample_code(&graph, &ctx.interner);
        assert_eq!(code.matches("dst_ =").count(), 1);
    }

    #[test]
    fn logpdf_gates_on_condition_truth_value() {
        let mut ctx = CompilationContext::new();
        let registry = DistributionRegistry::new();
        let mut graph = crate::graph::Graph::new();
        let cond_name = ctx.interner.intern("cond1");
        graph.conditions.push(crate::graph::ConditionNode {
            id: crate::graph::ConditionId(0),
            name: cond_name,
            expr_code: "(p == 1)".to_owned(),
            ancestors: Default::default(),
        });
        let y_name = ctx.interner.intern("y1");
        graph.vertices.push(crate::graph::Vertex {
            id: crate::graph::VertexId(0),
            name: y_name,
            kind: VertexKind::Observed,
            ancestors: Default::default(),
            data_deps: Default::default(),
            dist_name: "Normal".to_owned(),
            dist_code: "dist.Normal(0, 1)".to_owned(),
            observation_code: Some("0".to_owned()),
            conditions: vec![(crate::graph::ConditionId(0), true)],
            dependent_conditions: Default::default(),
            class: crate::registry::DistributionClass::Continuous,
            sample_size: 1,
        });
        let code = logpdf_code(&graph, &ctx.interner);
        assert!(code.starts_with("if state['cond1'] == True:"));
    }
}
