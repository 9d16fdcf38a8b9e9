//! Control-flow graphs and programs.
//!
//! A [`Cfg`] is a directed graph of [`Statement`] nodes with typed edges.
//! Frontends build CFGs through the mutating methods and the engine
//! finalizes them once before the analysis starts: finalization computes
//! basic-block heads, which the optimized fixpoint uses to decide which
//! program points to materialize.

use super::{CodeLocation, Identifier, SymbolicExpression, TypeSet, Variable};
use crate::error::ValidationError;
use crate::prelude::*;
use itertools::Itertools;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashSet};

/// The kind of a control-flow edge.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum EdgeKind {
    /// Unconditional control transfer.
    Sequential,
    /// Control transfer taken when the source statement's expression
    /// evaluates to true.
    TrueBranch,
    /// Control transfer taken when the source statement's expression
    /// evaluates to false.
    FalseBranch,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EdgeKind::Sequential => write!(formatter, "seq"),
            EdgeKind::TrueBranch => write!(formatter, "true"),
            EdgeKind::FalseBranch => write!(formatter, "false"),
        }
    }
}

/// A call to another CFG or to an unresolved external target.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct Call {
    /// The name of the called code member.
    pub callee: String,
    /// The actual arguments of the call.
    pub arguments: Vec<SymbolicExpression>,
    /// The caller variable receiving the returned value, if any.
    pub result: Option<Variable>,
}

impl std::fmt::Display for Call {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        if let Some(result) = &self.result {
            write!(formatter, "{result} = ")?;
        }
        write!(
            formatter,
            "{}({})",
            self.callee,
            self.arguments.iter().join(", ")
        )
    }
}

/// The different statements a CFG node can carry.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum StatementKind {
    /// An assignment of a value to a (possibly heap-valued) target.
    Assignment {
        /// The assigned target expression.
        target: SymbolicExpression,
        /// The expression computing the assigned value.
        value: SymbolicExpression,
    },
    /// The evaluation of an expression for its effects, including branch
    /// guards.
    Expression(SymbolicExpression),
    /// A call to another code member.
    Call(Call),
    /// A return from the enclosing CFG, optionally carrying a value.
    Return(Option<SymbolicExpression>),
}

/// A node of a control-flow graph.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct Statement {
    /// The source location of the statement.
    pub location: CodeLocation,
    /// What the statement does.
    pub kind: StatementKind,
}

impl std::fmt::Display for Statement {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.kind {
            StatementKind::Assignment { target, value } => {
                write!(formatter, "{target} = {value}")
            }
            StatementKind::Expression(expr) => write!(formatter, "{expr}"),
            StatementKind::Call(call) => write!(formatter, "{call}"),
            StatementKind::Return(Some(expr)) => write!(formatter, "return {expr}"),
            StatementKind::Return(None) => write!(formatter, "return"),
        }
    }
}

/// The signature of a CFG: name, formal parameters and return type.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct CfgDescriptor {
    /// The unique name of the CFG within its program.
    pub name: String,
    /// The formal parameters, in declaration order.
    pub formals: Vec<Variable>,
    /// The type of the returned value; `None` for void CFGs.
    pub return_types: Option<TypeSet>,
    /// The location of the CFG's declaration.
    pub location: CodeLocation,
}

impl CfgDescriptor {
    /// Create a new descriptor.
    pub fn new(
        name: impl ToString,
        formals: Vec<Variable>,
        return_types: Option<TypeSet>,
        location: CodeLocation,
    ) -> CfgDescriptor {
        CfgDescriptor {
            name: name.to_string(),
            formals,
            return_types,
            location,
        }
    }

    /// The meta variable that `return` statements of this CFG assign the
    /// returned value to.
    pub fn result_identifier(&self) -> Identifier {
        let types = self
            .return_types
            .clone()
            .unwrap_or_else(TypeSet::empty);
        Identifier::Variable(Variable::new(format!("ret_value@{}", self.name), types))
    }
}

/// A control-flow graph.
#[derive(Debug, Clone)]
pub struct Cfg {
    descriptor: CfgDescriptor,
    graph: DiGraph<Statement, EdgeKind>,
    entries: Vec<NodeIndex>,
    exits: Vec<NodeIndex>,
    /// Basic-block heads, computed once by [`Cfg::finalize`].
    block_heads: HashSet<NodeIndex>,
    finalized: bool,
}

impl Cfg {
    /// Create an empty CFG for the given descriptor.
    pub fn new(descriptor: CfgDescriptor) -> Cfg {
        Cfg {
            descriptor,
            graph: DiGraph::new(),
            entries: Vec::new(),
            exits: Vec::new(),
            block_heads: HashSet::new(),
            finalized: false,
        }
    }

    /// The descriptor of the CFG.
    pub fn descriptor(&self) -> &CfgDescriptor {
        &self.descriptor
    }

    /// The name of the CFG.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Add a statement, returning its node index.
    pub fn add_statement(&mut self, statement: Statement) -> NodeIndex {
        self.finalized = false;
        self.graph.add_node(statement)
    }

    /// Add a typed edge between two statements.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) {
        self.finalized = false;
        self.graph.add_edge(from, to, kind);
    }

    /// Mark a statement as an entry point of the CFG.
    pub fn add_entry(&mut self, node: NodeIndex) {
        self.entries.push(node);
    }

    /// Mark a statement as an exit point of the CFG.
    pub fn add_exit(&mut self, node: NodeIndex) {
        self.exits.push(node);
    }

    /// The entry nodes of the CFG.
    pub fn entries(&self) -> &[NodeIndex] {
        &self.entries
    }

    /// The exit nodes of the CFG.
    pub fn exits(&self) -> &[NodeIndex] {
        &self.exits
    }

    /// The statement at the given node.
    ///
    /// Panics if the node does not belong to this CFG.
    pub fn statement(&self, node: NodeIndex) -> &Statement {
        &self.graph[node]
    }

    /// The number of statements in the CFG.
    pub fn statement_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Iterate over all nodes of the CFG in index order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }

    /// The program point of the given statement node.
    pub fn program_point(&self, node: NodeIndex) -> ProgramPoint {
        ProgramPoint::new(self.name(), self.statement(node).location.clone())
    }

    /// The successors of a node together with the connecting edge kinds,
    /// in edge insertion order.
    ///
    /// Iteration order is deterministic: petgraph walks outgoing edges
    /// newest-first, so the collected list is reversed.
    pub fn successors(&self, node: NodeIndex) -> Vec<(NodeIndex, EdgeKind)> {
        let mut successors: Vec<(NodeIndex, EdgeKind)> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| (edge.target(), *edge.weight()))
            .collect();
        successors.reverse();
        successors
    }

    /// The predecessors of a node together with the connecting edge kinds,
    /// in edge insertion order.
    pub fn predecessors(&self, node: NodeIndex) -> Vec<(NodeIndex, EdgeKind)> {
        let mut predecessors: Vec<(NodeIndex, EdgeKind)> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| (edge.source(), *edge.weight()))
            .collect();
        predecessors.reverse();
        predecessors
    }

    /// Returns whether the node starts a basic block.
    ///
    /// Only meaningful after [`Cfg::finalize`] has run.
    pub fn is_block_head(&self, node: NodeIndex) -> bool {
        self.block_heads.contains(&node)
    }

    /// Returns whether [`Cfg::finalize`] has run since the last mutation.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Compute basic-block information. Must be called once after
    /// construction and before the analysis starts.
    pub fn finalize(&mut self) {
        self.block_heads.clear();
        for node in self.graph.node_indices() {
            let preds: Vec<_> = self.predecessors(node);
            let is_head = self.entries.contains(&node)
                || preds.len() != 1
                || preds
                    .iter()
                    .any(|(pred, kind)| *kind != EdgeKind::Sequential || self.out_degree(*pred) > 1);
            if is_head {
                self.block_heads.insert(node);
            }
        }
        self.finalized = true;
    }

    fn out_degree(&self, node: NodeIndex) -> usize {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .count()
    }

    /// Check structural well-formedness of the CFG.
    ///
    /// Branch edges must leave statements rooting an expression (the
    /// guard), and entry/exit sets must be non-empty and refer to existing
    /// nodes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.entries.is_empty() {
            return Err(ValidationError::new(format!(
                "CFG '{}' has no entry nodes",
                self.name()
            )));
        }
        for node in self.entries.iter().chain(self.exits.iter()) {
            if self.graph.node_weight(*node).is_none() {
                return Err(ValidationError::new(format!(
                    "CFG '{}' refers to a non-existing entry or exit node",
                    self.name()
                )));
            }
        }
        for edge in self.graph.edge_references() {
            if *edge.weight() != EdgeKind::Sequential {
                let source = &self.graph[edge.source()];
                if !matches!(source.kind, StatementKind::Expression(_)) {
                    return Err(ValidationError::new(format!(
                        "CFG '{}': branch edge leaving non-expression statement '{}'",
                        self.name(),
                        source
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A whole program: a collection of CFGs plus the entry points the
/// interprocedural analysis starts from.
#[derive(Debug, Clone, Default)]
pub struct Program {
    cfgs: BTreeMap<String, Cfg>,
    entry_points: Vec<String>,
}

impl Program {
    /// Create an empty program.
    pub fn new() -> Program {
        Program::default()
    }

    /// Add a CFG to the program. Replaces any CFG with the same name.
    pub fn add_cfg(&mut self, cfg: Cfg) {
        self.cfgs.insert(cfg.name().to_string(), cfg);
    }

    /// Mark the CFG with the given name as an analysis entry point.
    pub fn add_entry_point(&mut self, name: impl ToString) {
        self.entry_points.push(name.to_string());
    }

    /// The entry points of the program.
    pub fn entry_points(&self) -> &[String] {
        &self.entry_points
    }

    /// Look up a CFG by name.
    pub fn cfg(&self, name: &str) -> Option<&Cfg> {
        self.cfgs.get(name)
    }

    /// Iterate over all CFGs in name order.
    pub fn cfgs(&self) -> impl Iterator<Item = &Cfg> {
        self.cfgs.values()
    }

    /// Finalize all CFGs of the program.
    pub fn finalize(&mut self) {
        for cfg in self.cfgs.values_mut() {
            cfg.finalize();
        }
    }

    /// Check well-formedness of the whole program.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.entry_points.is_empty() {
            return Err(ValidationError::new("program has no entry points"));
        }
        for entry in &self.entry_points {
            if !self.cfgs.contains_key(entry) {
                return Err(ValidationError::new(format!(
                    "entry point '{entry}' does not name a CFG of the program"
                )));
            }
        }
        for cfg in self.cfgs.values() {
            cfg.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intermediate_representation::Constant;

    fn stmt(line: u32, kind: StatementKind) -> Statement {
        Statement {
            location: CodeLocation::new("test.src", line, 0),
            kind,
        }
    }

    #[test]
    fn successor_order_is_insertion_order() {
        let mut cfg = Cfg::new(CfgDescriptor::new(
            "main",
            Vec::new(),
            None,
            CodeLocation::new("test.src", 1, 0),
        ));
        let guard = cfg.add_statement(stmt(
            1,
            StatementKind::Expression(SymbolicExpression::bool(true)),
        ));
        let then_branch = cfg.add_statement(stmt(
            2,
            StatementKind::Expression(SymbolicExpression::Skip),
        ));
        let else_branch = cfg.add_statement(stmt(
            3,
            StatementKind::Expression(SymbolicExpression::Skip),
        ));
        cfg.add_edge(guard, then_branch, EdgeKind::TrueBranch);
        cfg.add_edge(guard, else_branch, EdgeKind::FalseBranch);
        let successors = cfg.successors(guard);
        assert_eq!(
            successors,
            vec![
                (then_branch, EdgeKind::TrueBranch),
                (else_branch, EdgeKind::FalseBranch)
            ]
        );
    }

    #[test]
    fn block_heads_after_finalize() {
        let mut cfg = Cfg::new(CfgDescriptor::new(
            "main",
            Vec::new(),
            None,
            CodeLocation::new("test.src", 1, 0),
        ));
        let first = cfg.add_statement(stmt(
            1,
            StatementKind::Assignment {
                target: SymbolicExpression::var(Variable::new("x", TypeSet::of("int"))),
                value: SymbolicExpression::Constant(Constant::Int(1)),
            },
        ));
        let second = cfg.add_statement(stmt(
            2,
            StatementKind::Expression(SymbolicExpression::Skip),
        ));
        let third = cfg.add_statement(stmt(
            3,
            StatementKind::Expression(SymbolicExpression::Skip),
        ));
        cfg.add_edge(first, second, EdgeKind::Sequential);
        cfg.add_edge(second, third, EdgeKind::Sequential);
        // back edge turns `second` into a join point
        cfg.add_edge(third, second, EdgeKind::Sequential);
        cfg.add_entry(first);
        cfg.add_exit(third);
        cfg.finalize();
        assert!(cfg.is_block_head(first));
        assert!(cfg.is_block_head(second));
        assert!(!cfg.is_block_head(third));
    }

    #[test]
    fn validation_rejects_branch_from_assignment() {
        let mut cfg = Cfg::new(CfgDescriptor::new(
            "main",
            Vec::new(),
            None,
            CodeLocation::new("test.src", 1, 0),
        ));
        let assignment = cfg.add_statement(stmt(
            1,
            StatementKind::Assignment {
                target: SymbolicExpression::var(Variable::new("x", TypeSet::of("int"))),
                value: SymbolicExpression::int(1),
            },
        ));
        let target = cfg.add_statement(stmt(
            2,
            StatementKind::Expression(SymbolicExpression::Skip),
        ));
        cfg.add_edge(assignment, target, EdgeKind::TrueBranch);
        cfg.add_entry(assignment);
        assert!(cfg.validate().is_err());
    }
}
