#![doc = include_str!("../../../README.md")]
#![expect(clippy::module_name_repetitions, reason = "Graph/Vertex naming is consistent across the graph module")]

pub mod ast;
pub mod codegen;
pub mod ctx;
pub mod error;
pub mod graph;
pub mod intern;
mod lexer;
pub mod model;
pub mod parse;
mod raw_simplify;
pub mod registry;
mod render;
pub mod source;
pub mod ssa;
pub mod symtab;
pub mod types;

mod optimize;

pub use crate::{
    ctx::{CompilationContext, CompileOptions, Language},
    error::{CompileError, LexError, NameError, SyntaxError, TypeError, UnrollLimitExceeded},
    model::Model,
};

use crate::{registry::DistributionRegistry, symtab::SymbolTable};

/// An external collaborator consulted when a source literal references a
/// data file: absent ⇒ data literals stay inline. Not implemented by this
/// crate — callers that want file-backed data supply one of their own.
pub trait DataLoader {
    fn load_from_source(&self, name: &str) -> Option<Vec<crate::ast::Literal>>;
}

/// Compiles FOPPL `source` into a graphical [`Model`], running the full
/// pipeline: lex+parse, raw-simplify, symbol table + type inference,
/// (optionally) the fixed-point optimizer, SSA/condition expansion, graph
/// construction.
///
/// `registry` classifies distribution names as continuous/discrete for the
/// `Model::continuous`/`discrete` queries; pass [`DistributionRegistry::new`]
/// for the built-in table, extended as needed.
pub fn compile(source: &str, options: &CompileOptions, registry: &DistributionRegistry) -> Result<Model, CompileError> {
    let mut ctx = CompilationContext::new();

    let node = parse::parse(source, options.language, &mut ctx.interner)?;
    let node = raw_simplify::simplify(node);

    let mut table = SymbolTable::new();
    let node = symtab::resolve(&mut ctx, &mut table, node)?;
    let node = types::infer(node)?;

    let node = if options.simplify { optimize::optimize(node, &ctx.interner)? } else { node };

    let node = ssa::expand(&mut ctx, node);
    let node = ssa::lift_conditionals(node);
    let graph = graph::build::build(&mut ctx, registry, node);

    Ok(Model::new(graph, ctx.interner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_constant_fold_to_empty_graph() {
        let registry = DistributionRegistry::new();
        let model = compile("(+ 1 (* 2 3))", &CompileOptions::new(), &registry).unwrap();
        assert_eq!(model.graph().vertices.len(), 0);
    }

    #[test]
    fn compiles_sample_and_observe_scenario() {
        let registry = DistributionRegistry::new();
        let source = "(let [x (sample (normal 0 1))] (observe (normal x 1) 2) x)";
        let model = compile(source, &CompileOptions::new(), &registry).unwrap();
        assert_eq!(model.graph().vertices.len(), 2);
        assert!(model.sampled().count() == 1);
        assert!(model.observed().count() == 1);
    }

    #[test]
    fn undefined_name_is_a_compile_error() {
        let registry = DistributionRegistry::new();
        let err = compile("(+ x 1)", &CompileOptions::new(), &registry).unwrap_err();
        assert!(matches!(err, CompileError::Name(NameError::Undefined { .. })));
    }
}
