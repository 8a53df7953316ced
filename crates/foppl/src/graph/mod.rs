//! Graph entities: `Vertex`, `ConditionNode`, `DataNode`, stored in
//! `Vec`-backed arenas addressed by small `Copy` handle types, since
//! `Vertex::dependent_conditions` and `ConditionNode::ancestors` would
//! otherwise be a cyclic ownership graph.

pub mod build;

use std::collections::BTreeSet;

use crate::{intern::StringId, registry::DistributionClass};

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(VertexId);
arena_id!(ConditionId);
arena_id!(DataId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    Sampled,
    Observed,
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub id: VertexId,
    pub name: StringId,
    pub kind: VertexKind,
    pub ancestors: BTreeSet<VertexId>,
    pub data_deps: BTreeSet<DataId>,
    pub dist_name: String,
    pub dist_code: String,
    pub observation_code: Option<String>,
    pub conditions: Vec<(ConditionId, bool)>,
    pub dependent_conditions: BTreeSet<ConditionId>,
    pub class: DistributionClass,
    pub sample_size: usize,
}

impl Vertex {
    #[must_use]
    pub fn is_sampled(&self) -> bool {
        matches!(self.kind, VertexKind::Sampled)
    }

    #[must_use]
    pub fn is_observed(&self) -> bool {
        matches!(self.kind, VertexKind::Observed)
    }

    #[must_use]
    pub fn is_conditional(&self) -> bool {
        !self.conditions.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ConditionNode {
    pub id: ConditionId,
    pub name: StringId,
    pub expr_code: String,
    pub ancestors: BTreeSet<VertexId>,
}

#[derive(Debug, Clone)]
pub struct DataNode {
    pub id: DataId,
    pub name: StringId,
    pub literal: crate::ast::Literal,
}

/// The graphical model: vertex/condition/data arenas plus the arc set
/// implied by each vertex's `ancestors`.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub vertices: Vec<Vertex>,
    pub conditions: Vec<ConditionNode>,
    pub data: Vec<DataNode>,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index()]
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.vertices[id.index()]
    }

    #[must_use]
    pub fn condition(&self, id: ConditionId) -> &ConditionNode {
        &self.conditions[id.index()]
    }

    #[must_use]
    pub fn data(&self, id: DataId) -> &DataNode {
        &self.data[id.index()]
    }

    /// Every Vertex in the transitive ancestor closure of `start`, including
    /// `start` itself — used to propagate a newly created `ConditionNode`
    /// into every upstream Vertex's `dependent_conditions` (testable
    /// property 5).
    #[must_use]
    pub fn transitive_ancestors(&self, start: &BTreeSet<VertexId>) -> BTreeSet<VertexId> {
        let mut seen: BTreeSet<VertexId> = BTreeSet::new();
        let mut stack: Vec<VertexId> = start.iter().copied().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            for &ancestor in &self.vertex(id).ancestors {
                stack.push(ancestor);
            }
        }
        seen
    }

    /// Vertex ids in creation (= compute) order, which by construction (the
    /// monotonic vertex counter) is already a topological order — graph
    /// invariant (c)/(d).
    #[must_use]
    pub fn compute_order(&self) -> Vec<VertexId> {
        self.vertices.iter().map(|v| v.id).collect()
    }

    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        for v in &self.vertices {
            if v.ancestors.iter().any(|&a| a.0 >= v.id.0) {
                return false;
            }
        }
        true
    }
}
