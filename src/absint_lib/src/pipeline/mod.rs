//! This module contains the structs needed to assemble a complete
//! analysis pipeline: the configuration record, the cancellation token,
//! the serialized-graph schema, and the [`Analyzer`] driving
//! validation, fixpoint computation and checks.

use crate::analysis::interprocedural::{
    ContextBasedAnalysis, InterproceduralConfig, OpenCallPolicy,
};
use crate::analysis::{
    AbstractState, AnalysisState, AnalyzedCfg, FixpointConfig, FixpointWorkingSet,
};
use crate::checkers::{CheckTool, SemanticCheck, SyntacticCheck, Warning};
use crate::error::{AnalysisError, SetupError};
use crate::intermediate_representation::{Cfg, Program};
use crate::prelude::*;
use crate::utils::log::{LogMessage, LogThread};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// A cooperative cancellation flag checked by fixpoint loops between
/// worklist pops.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    /// Request cancellation of the run owning this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fail with [`AnalysisError::Cancelled`] if cancellation was
    /// requested.
    pub fn check(&self) -> Result<(), AnalysisError> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// The graph outputs the engine can produce for its results.
///
/// The engine itself only builds the serializable [`SerializedGraph`]
/// values; rendering them to files is the caller's business.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub enum GraphFormat {
    /// No graph output.
    #[default]
    None,
    /// Graphviz DOT.
    Dot,
    /// GraphML.
    Graphml,
    /// GraphML with expression subtrees as subnodes.
    GraphmlWithSubnodes,
    /// A self-contained HTML viewer.
    Html,
    /// A self-contained HTML viewer with expression subtrees as subnodes.
    HtmlWithSubnodes,
}

impl GraphFormat {
    /// Returns whether any graph output was requested.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, GraphFormat::None)
    }

    /// Returns whether expression subtrees should be serialized as
    /// subnodes.
    pub fn with_subnodes(&self) -> bool {
        matches!(
            self,
            GraphFormat::GraphmlWithSubnodes | GraphFormat::HtmlWithSubnodes
        )
    }
}

/// The configuration record threaded through an analysis run.
///
/// There is no global registry: every option lives here and is passed
/// explicitly to [`Analyzer::new`].
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub struct AnalysisConfig {
    /// Number of state updates of a CFG node before joins become
    /// widenings. Must be at least one.
    pub widening_threshold: u32,
    /// Number of descending (narrowing) visits allowed per node; zero
    /// disables the descending phase.
    pub narrowing_steps: u32,
    /// The working-set flavor scheduling fixpoint node visits.
    pub fixpoint_working_set: FixpointWorkingSet,
    /// The `k` of k-limited call-site context sensitivity.
    pub context_sensitivity: usize,
    /// The approximation of calls without resolved targets.
    pub open_call_policy: OpenCallPolicy,
    /// Store only basic-block heads during fixpoints and reconstruct
    /// intermediate states on demand.
    pub optimize: bool,
    /// Reconstruct all intermediate states when dumping graphs of
    /// optimized results.
    pub dump_forces_unwinding: bool,
    /// The graph output to produce for analysis results.
    pub analysis_graphs: GraphFormat,
    /// Serialize the input CFGs next to the results.
    pub serialize_inputs: bool,
    /// Serialize the analyzed CFGs with their abstract states.
    pub serialize_results: bool,
}

impl Default for AnalysisConfig {
    fn default() -> AnalysisConfig {
        AnalysisConfig {
            widening_threshold: 5,
            narrowing_steps: 0,
            fixpoint_working_set: FixpointWorkingSet::default(),
            context_sensitivity: 1,
            open_call_policy: OpenCallPolicy::default(),
            optimize: false,
            dump_forces_unwinding: false,
            analysis_graphs: GraphFormat::default(),
            serialize_inputs: false,
            serialize_results: false,
        }
    }
}

impl AnalysisConfig {
    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.widening_threshold < 1 {
            return Err(SetupError::new("the widening threshold must be at least 1"));
        }
        Ok(())
    }

    fn fixpoint_config(&self) -> FixpointConfig {
        FixpointConfig {
            widening_threshold: self.widening_threshold,
            narrowing_steps: self.narrowing_steps,
            working_set: self.fixpoint_working_set,
            optimize: self.optimize,
        }
    }

    fn interprocedural_config(&self) -> InterproceduralConfig {
        InterproceduralConfig {
            fixpoint: self.fixpoint_config(),
            context_sensitivity: self.context_sensitivity,
            open_call_policy: self.open_call_policy,
        }
    }
}

/// A serialized node of an analyzed or input CFG.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct SerializedNode {
    /// The node id, unique within its graph.
    pub id: usize,
    /// The display label of the node.
    pub label: String,
    /// The abstract state holding after the node, if available.
    pub state: Option<String>,
    /// Expression subtrees of the node, for formats with subnodes.
    pub subnodes: Vec<String>,
}

/// A serialized edge of an analyzed or input CFG.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct SerializedEdge {
    /// The id of the source node.
    pub src: usize,
    /// The id of the destination node.
    pub dst: usize,
    /// The edge kind: `seq`, `true` or `false`.
    pub kind: String,
}

/// The serializable form of a CFG, optionally enriched with the computed
/// abstract states.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct SerializedGraph {
    /// The name of the CFG.
    pub name: String,
    /// The format the serialization was requested for.
    pub format: GraphFormat,
    /// The nodes of the graph.
    pub nodes: Vec<SerializedNode>,
    /// The edges of the graph.
    pub edges: Vec<SerializedEdge>,
}

impl SerializedGraph {
    /// Serialize a CFG, attaching the states of the given result if
    /// present.
    pub fn new<A: AbstractState + std::fmt::Display>(
        cfg: &Cfg,
        format: GraphFormat,
        result: Option<&AnalyzedCfg<A>>,
        unwind: bool,
    ) -> SerializedGraph {
        let mut nodes = Vec::new();
        for node in cfg.nodes() {
            let statement = cfg.statement(node);
            let state = result.and_then(|analyzed| {
                if unwind {
                    analyzed
                        .unwinded_state_after(cfg, node)
                        .ok()
                        .map(|state| state.to_string())
                } else {
                    analyzed
                        .stored_state_after(node)
                        .map(|state| state.to_string())
                }
            });
            let subnodes = if format.with_subnodes() {
                match &statement.kind {
                    crate::intermediate_representation::StatementKind::Assignment {
                        target,
                        value,
                    } => vec![target.to_string(), value.to_string()],
                    crate::intermediate_representation::StatementKind::Expression(expr)
                    | crate::intermediate_representation::StatementKind::Return(Some(expr)) => {
                        vec![expr.to_string()]
                    }
                    crate::intermediate_representation::StatementKind::Call(call) => call
                        .arguments
                        .iter()
                        .map(|argument| argument.to_string())
                        .collect(),
                    crate::intermediate_representation::StatementKind::Return(None) => Vec::new(),
                }
            } else {
                Vec::new()
            };
            nodes.push(SerializedNode {
                id: node.index(),
                label: statement.to_string(),
                state,
                subnodes,
            });
        }
        let mut edges = Vec::new();
        for node in cfg.nodes() {
            for (successor, kind) in cfg.successors(node) {
                edges.push(SerializedEdge {
                    src: node.index(),
                    dst: successor.index(),
                    kind: kind.to_string(),
                });
            }
        }
        SerializedGraph {
            name: cfg.name().to_string(),
            format,
            nodes,
            edges,
        }
    }

    /// The JSON form of the graph.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("serialized graphs are plain data")
    }

    /// The pretty-printed JSON text of the graph.
    pub fn to_json_string(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self)
            .map_err(|error| anyhow!("cannot serialize graph '{}': {error}", self.name))
    }
}

/// Everything an analysis run produces.
#[derive(Debug)]
pub struct AnalysisOutcome {
    /// The warnings emitted by the registered checks.
    pub warnings: Vec<Warning>,
    /// The serialized graphs, if graph output or result serialization was
    /// requested.
    pub graphs: Vec<SerializedGraph>,
    /// The log messages collected during the run.
    pub logs: Vec<LogMessage>,
    /// The per-CFG errors recorded during the run.
    pub failures: Vec<(String, AnalysisError)>,
}

/// The analysis driver: validates the program, runs the interprocedural
/// fixpoint and dispatches the registered checks.
///
/// The abstract domains are chosen through the type parameter and the
/// initial state instance: the analyzer derives every lattice it needs
/// from that family member.
pub struct Analyzer<A: AbstractState + std::fmt::Display> {
    config: AnalysisConfig,
    initial_state: AnalysisState<A>,
    syntactic_checks: Vec<Box<dyn SyntacticCheck>>,
    semantic_checks: Vec<Box<dyn SemanticCheck<A>>>,
    cancel: CancellationToken,
}

impl<A: AbstractState + std::fmt::Display> Analyzer<A> {
    /// Create an analyzer from a configuration and the initial analysis
    /// state for entry points.
    pub fn new(
        config: AnalysisConfig,
        initial_state: AnalysisState<A>,
    ) -> Result<Analyzer<A>, SetupError> {
        config.validate()?;
        Ok(Analyzer {
            config,
            initial_state,
            syntactic_checks: Vec::new(),
            semantic_checks: Vec::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Register a syntactic check. Checks run in registration order.
    pub fn with_syntactic_check(mut self, check: Box<dyn SyntacticCheck>) -> Analyzer<A> {
        self.syntactic_checks.push(check);
        self
    }

    /// Register a semantic check. Checks run in registration order.
    pub fn with_semantic_check(mut self, check: Box<dyn SemanticCheck<A>>) -> Analyzer<A> {
        self.semantic_checks.push(check);
        self
    }

    /// The cancellation token of this analyzer. Cancelling it aborts a
    /// running [`Analyzer::run`] between worklist pops.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the whole analysis on the given program and return the
    /// warnings emitted by the registered checks.
    pub fn run(&self, program: &mut Program) -> Result<Vec<Warning>, AnalysisError> {
        self.run_with_outcome(program).map(|outcome| outcome.warnings)
    }

    /// Run the whole analysis on the given program and return warnings,
    /// serialized graphs and logs.
    pub fn run_with_outcome(
        &self,
        program: &mut Program,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        program.validate()?;
        // basic blocks are computed exactly once, before the driver
        // starts
        program.finalize();

        let log_thread = LogThread::spawn(LogThread::collect_and_deduplicate);
        let mut driver: ContextBasedAnalysis<A> = ContextBasedAnalysis::new(
            program,
            self.config.interprocedural_config(),
            self.cancel.clone(),
            log_thread.get_msg_sender(),
        );
        driver.fixpoint(&self.initial_state)?;

        let mut graphs = Vec::new();
        if self.config.serialize_inputs {
            for cfg in program.cfgs() {
                graphs.push(SerializedGraph::new::<A>(
                    cfg,
                    GraphFormat::None,
                    None,
                    false,
                ));
            }
        }
        if self.config.analysis_graphs.is_enabled() || self.config.serialize_results {
            let unwind = !self.config.optimize || self.config.dump_forces_unwinding;
            for cfg in program.cfgs() {
                for analyzed in driver.analysis_results_of(cfg.name()) {
                    graphs.push(SerializedGraph::new(
                        cfg,
                        self.config.analysis_graphs,
                        Some(analyzed),
                        unwind,
                    ));
                }
            }
        }

        let tool = CheckTool::new(&driver, program);
        let warnings = tool.run(program, &self.syntactic_checks, &self.semantic_checks);

        let failures = driver.failures().to_vec();
        drop(driver);
        let logs = log_thread.collect();
        Ok(AnalysisOutcome {
            warnings,
            graphs,
            logs,
            failures,
        })
    }
}
