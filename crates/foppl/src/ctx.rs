//! Per-compilation context: counters that must reset on every compilation,
//! bundled into one struct instead of living as process statics.

use crate::intern::Interner;

/// Which surface syntax a source string should be parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    Clojure,
    Foppl,
}

impl Language {
    #[must_use]
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint {
            "py" | "python" => Some(Self::Python),
            "clj" | "clojure" => Some(Self::Clojure),
            "foppl" => Some(Self::Foppl),
            _ => None,
        }
    }
}

/// Options threaded through [`crate::compile`].
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Whether to run the optimizer/partial evaluator pass at all.
    pub simplify: bool,
    /// Forces a surface syntax instead of auto-detecting from the first
    /// non-whitespace character.
    pub language: Option<Language>,
}

impl CompileOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            simplify: true,
            language: None,
        }
    }
}

/// Monotonic counters and the string interner, scoped to one compilation.
///
/// Two compilations never share a context, so there is no ambient global
/// mutable state: the mangled-symbol counter and the per-node-kind graph
/// counters all live here.
#[derive(Debug, Default)]
pub struct CompilationContext {
    pub interner: Interner,
    symbol_counter: u32,
    vertex_counter: u32,
    condition_counter: u32,
    data_counter: u32,
}

impl CompilationContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next globally-unique symbol-mangling suffix.
    pub fn next_symbol_suffix(&mut self) -> u32 {
        self.symbol_counter += 1;
        self.symbol_counter
    }

    /// Allocates the next `Vertex` suffix (shared by sampled `x` and
    /// observed `y` vertices, so they interleave in creation order).
    pub fn next_vertex_suffix(&mut self) -> u32 {
        self.vertex_counter += 1;
        self.vertex_counter
    }

    /// Allocates the next `ConditionNode` suffix.
    pub fn next_condition_suffix(&mut self) -> u32 {
        self.condition_counter += 1;
        self.condition_counter
    }

    /// Allocates the next `DataNode` suffix.
    pub fn next_data_suffix(&mut self) -> u32 {
        self.data_counter += 1;
        self.data_counter
    }
}
