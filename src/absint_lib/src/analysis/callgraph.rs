//! Generate call graphs out of a program.

use crate::intermediate_representation::{Program, StatementKind};
use crate::prelude::*;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// The call graph of a program.
///
/// Nodes are CFG names; an edge connects a caller to a callee for each
/// call statement, labelled with the location of the call site. Calls to
/// names that do not belong to the program ("open calls") have no edges;
/// the interprocedural driver decides how to approximate them through its
/// open-call policy.
#[derive(Debug, Clone)]
pub struct CallGraph {
    graph: DiGraph<String, CodeLocation>,
    indices: HashMap<String, NodeIndex>,
}

impl CallGraph {
    /// Generate the call graph for the given program.
    pub fn from_program(program: &Program) -> CallGraph {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();
        for cfg in program.cfgs() {
            let index = graph.add_node(cfg.name().to_string());
            indices.insert(cfg.name().to_string(), index);
        }
        for cfg in program.cfgs() {
            let source = indices[cfg.name()];
            for node in cfg.nodes() {
                if let StatementKind::Call(call) = &cfg.statement(node).kind {
                    if let Some(target) = indices.get(&call.callee) {
                        graph.add_edge(source, *target, cfg.statement(node).location.clone());
                    }
                }
            }
        }
        CallGraph { graph, indices }
    }

    /// The CFGs of the program a call to the given name may reach. The
    /// returned set is empty for open calls.
    pub fn resolve(&self, callee: &str) -> Vec<String> {
        match self.indices.get(callee) {
            Some(_) => vec![callee.to_string()],
            None => Vec::new(),
        }
    }

    /// The names of the CFGs called by the given CFG.
    pub fn callees_of(&self, caller: &str) -> Vec<String> {
        match self.indices.get(caller) {
            Some(index) => self
                .graph
                .neighbors_directed(*index, petgraph::Direction::Outgoing)
                .map(|neighbor| self.graph[neighbor].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// The names of the CFGs calling the given CFG.
    pub fn callers_of(&self, callee: &str) -> Vec<String> {
        match self.indices.get(callee) {
            Some(index) => self
                .graph
                .neighbors_directed(*index, petgraph::Direction::Incoming)
                .map(|neighbor| self.graph[neighbor].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// The number of call edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
