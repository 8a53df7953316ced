//! End-to-end compilation scenarios, driven through the public
//! `foppl::compile` entry point rather than any one pass in isolation.

use foppl::{CompileOptions, compile, registry::DistributionRegistry};

fn compile_ok(source: &str) -> foppl::Model {
    let registry = DistributionRegistry::new();
    compile(source, &CompileOptions::new(), &registry).unwrap_or_else(|err| panic!("{}", err.render(source)))
}

/// A fully constant expression folds to a single literal, so the graph is
/// empty.
#[test]
fn constant_fold_yields_empty_graph() {
    let model = compile_ok("(+ 1 (* 2 3))");
    assert_eq!(model.graph().vertices.len(), 0);
    assert_eq!(model.graph().conditions.len(), 0);
    assert_eq!(model.graph().data.len(), 0);
}

/// One sampled Vertex `x1`, one observed Vertex `y2` with `x1` as its only
/// ancestor, no condition nodes.
#[test]
fn sample_then_observe() {
    let model = compile_ok("(let [x (sample (normal 0 1))] (observe (normal x 1) 2) x)");
    assert_eq!(model.graph().vertices.len(), 2);
    assert_eq!(model.sampled().count(), 1);
    assert_eq!(model.observed().count(), 1);
    assert_eq!(model.graph().conditions.len(), 0);

    let x1 = model.sampled().next().unwrap();
    let y2 = model.observed().next().unwrap();
    assert_eq!(model.vertex_name(x1), "x1");
    assert_eq!(model.vertex_name(y2), "y2");
    assert_eq!(model.graph().vertex(y2).ancestors, std::iter::once(x1).collect());
    assert_eq!(model.graph().vertex(x1).dist_code, "dist.Normal(0, 1)");
    assert_eq!(model.graph().vertex(y2).dist_code, "dist.Normal(x1, 1)");
    assert_eq!(model.graph().vertex(y2).observation_code.as_deref(), Some("2"));
}

/// Branching on a sampled Bernoulli creates one ConditionNode and gates
/// each observed branch on its truth value; `logpdf_code` must reflect the
/// guard.
#[test]
fn branch_creates_condition_node() {
    let source = "(let [p (sample (bernoulli 0.5))] (if (= p 1) (observe (normal 0 1) 0) (observe (normal 1 1) 0)))";
    let model = compile_ok(source);

    assert_eq!(model.sampled().count(), 1);
    assert_eq!(model.graph().conditions.len(), 1);
    assert_eq!(model.observed().count(), 2);

    let cond = model.graph().conditions[0].id;
    let mut observed: Vec<_> = model.observed().collect();
    observed.sort_by_key(|&v| model.graph().vertex(v).id.0);
    assert_eq!(model.graph().vertex(observed[0]).conditions, vec![(cond, true)]);
    assert_eq!(model.graph().vertex(observed[1]).conditions, vec![(cond, false)]);

    let logpdf = model.logpdf_code();
    assert!(logpdf.contains("if state['cond1'] == True:"));
    assert!(logpdf.contains("if state['cond1'] == False:"));
}

/// A 100-element numeric vector literal occurring twice in source hoists
/// to one DataNode, not two, with each site becoming its own Symbol
/// reference to it.
#[test]
fn large_literal_hoists_once() {
    let values = (0..100).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
    let source = format!("(do (observe (normal 0 1) [{values}]) (observe (normal 1 1) [{values}]))");
    let model = compile_ok(&source);

    assert_eq!(model.graph().data.len(), 1);
    assert_eq!(model.observed().count(), 2);
    for y in model.observed() {
        assert!(model.graph().vertex(y).data_deps.contains(&model.graph().data[0].id));
    }
}

/// A `for` loop over a literal 3-element vector unrolls into three
/// observed vertices with no ancestors, one per distinct mean.
#[test]
fn loop_unrolls_into_independent_observations() {
    let model = compile_ok("(for [i [0 1 2]] (observe (normal i 1) i))");

    assert_eq!(model.observed().count(), 3);
    let mut dists: Vec<_> = model.graph().vertices.iter().map(|v| v.dist_code.clone()).collect();
    dists.sort();
    assert_eq!(dists, vec!["dist.Normal(0, 1)".to_owned(), "dist.Normal(1, 1)".to_owned(), "dist.Normal(2, 1)".to_owned()]);
    for v in &model.graph().vertices {
        assert!(v.ancestors.is_empty());
    }
}

/// A distribution call built from an `if`-expression over its mean argument
/// expands (via SSA's phi join, then graph construction visiting both
/// branches) into two sample sub-structures, one per branch.
#[test]
fn if_over_call_argument_expands_both_branches() {
    let source = "(let [c (sample (bernoulli 0.5)) mu1 1 mu2 2] (sample (normal (if (= c 1) mu1 mu2) 1)))";
    let model = compile_ok(source);

    // The bernoulli sample, plus a sample vertex inside each branch of the
    // expanded `if`: three sampled vertices total, no observations.
    assert_eq!(model.observed().count(), 0);
    assert!(model.sampled().count() >= 2);
}

/// Graph acyclicity: for every scenario above, arcs form a DAG and vertex
/// suffixes already sort into a topological order.
#[test]
fn invariant_graph_is_always_acyclic() {
    for source in [
        "(+ 1 (* 2 3))",
        "(let [x (sample (normal 0 1))] (observe (normal x 1) 2) x)",
        "(let [p (sample (bernoulli 0.5))] (if (= p 1) (observe (normal 0 1) 0) (observe (normal 1 1) 0)))",
        "(for [i [0 1 2]] (observe (normal i 1) i))",
    ] {
        let model = compile_ok(source);
        assert!(model.graph().is_acyclic(), "graph for {source:?} was not acyclic");
    }
}

/// Idempotence: running the optimizer's fixed-point pass again on an
/// already-optimized program changes nothing further, so compiling the
/// same source twice with simplification on yields the same
/// vertex/condition/data counts.
#[test]
fn invariant_optimizer_is_idempotent_across_runs() {
    let source = "(let [p (sample (bernoulli 0.5))] (if (= p 1) (observe (normal 0 1) 0) (observe (normal 1 1) 0)))";
    let first = compile_ok(source);
    let second = compile_ok(source);
    assert_eq!(first.graph().vertices.len(), second.graph().vertices.len());
    assert_eq!(first.graph().conditions.len(), second.graph().conditions.len());
}

/// An undefined free variable is rejected before graph construction.
#[test]
fn undefined_name_fails_to_compile() {
    let registry = DistributionRegistry::new();
    let err = compile("(sample (normal x 1))", &CompileOptions::new(), &registry).unwrap_err();
    assert!(matches!(err, foppl::CompileError::Name(foppl::NameError::Undefined { .. })));
}

/// `first` folds against a known literal vector before graph construction
/// ever sees it, so the observed mean is the plain literal `1`, not a call.
#[test]
fn first_over_literal_vector_folds_before_graph_build() {
    let model = compile_ok("(observe (normal (first [1 2 3]) 1) 0)");

    assert_eq!(model.graph().vertices.len(), 1);
    assert_eq!(model.observed().count(), 1);
    let y = model.observed().next().unwrap();
    assert_eq!(model.graph().vertex(y).dist_code, "dist.Normal(1, 1)");
    assert!(model.graph().vertex(y).ancestors.is_empty());
}

/// `x - x` collapses to the literal `0`, dropping the dependency on the
/// sampled `x` entirely.
#[test]
fn self_subtraction_drops_the_ancestor_edge() {
    let source = "(let [x (sample (normal 0 1))] (observe (normal (- x x) 1) 0))";
    let model = compile_ok(source);

    assert_eq!(model.sampled().count(), 1);
    assert_eq!(model.observed().count(), 1);
    let y = model.observed().next().unwrap();
    assert_eq!(model.graph().vertex(y).dist_code, "dist.Normal(0, 1)");
    assert!(model.graph().vertex(y).ancestors.is_empty());
}

/// Branches that turn out identical after optimization collapse into a
/// single observation instead of two gated ones.
#[test]
fn identical_branches_collapse_to_one_observation() {
    let source = "(let [p (sample (bernoulli 0.5))] (if (= p 1) (observe (normal 0 1) 0) (observe (normal 0 1) 0)))";
    let model = compile_ok(source);

    assert_eq!(model.sampled().count(), 1);
    assert_eq!(model.observed().count(), 1);
    assert_eq!(model.graph().conditions.len(), 0);
}

/// `if-not` flips the branch pairing relative to the plain `if` form: the
/// arm observed when the condition holds is the one that reads `else` in
/// source.
#[test]
fn if_not_flips_branch_polarity() {
    let source = "(let [p (sample (bernoulli 0.5))] (if-not (= p 1) (observe (normal 0 1) 0) (observe (normal 1 1) 0)))";
    let model = compile_ok(source);

    assert_eq!(model.sampled().count(), 1);
    assert_eq!(model.graph().conditions.len(), 1);
    assert_eq!(model.observed().count(), 2);

    let cond = model.graph().conditions[0].id;
    let observed: Vec<_> = model.observed().collect();
    let true_arm = observed.iter().copied().find(|&v| model.graph().vertex(v).conditions == vec![(cond, true)]).unwrap();
    let false_arm = observed.iter().copied().find(|&v| model.graph().vertex(v).conditions == vec![(cond, false)]).unwrap();
    assert_eq!(model.graph().vertex(true_arm).dist_code, "dist.Normal(1, 1)");
    assert_eq!(model.graph().vertex(false_arm).dist_code, "dist.Normal(0, 1)");
}

/// A chain of `If(p == const, ...)` arms dispatching on the same sampled
/// variable collapses into a single dict lookup keyed by the constants.
#[test]
fn equality_chain_on_sampled_variable_becomes_dict_lookup() {
    let source = "(let [p (sample (categorical [0.3 0.3 0.4]))] \
                   (observe (normal (if (= p 0) 10 (if (= p 1) 20 30)) 1) 0))";
    let model = compile_ok(source);

    assert_eq!(model.sampled().count(), 1);
    assert_eq!(model.observed().count(), 1);
    assert_eq!(model.graph().conditions.len(), 0);
    let y = model.observed().next().unwrap();
    assert_eq!(model.graph().vertex(y).dist_code, "dist.Normal({0: 10, 1: 20}[x1], 1)");
}

/// A name rebound by a nested `let` resolves to the innermost binding; the
/// symbol table's renaming keeps the two `x`s from colliding.
#[test]
fn shadowed_let_binding_resolves_to_inner_scope() {
    let model = compile_ok("(let [x 1] (let [x 2] (observe (normal x 1) 0)))");

    assert_eq!(model.sampled().count(), 0);
    assert_eq!(model.observed().count(), 1);
    let y = model.observed().next().unwrap();
    assert_eq!(model.graph().vertex(y).dist_code, "dist.Normal(2, 1)");
}
