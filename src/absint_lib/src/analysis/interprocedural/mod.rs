//! The interprocedural driver: call resolution, context-sensitive
//! summaries, and recursion stabilization.
//!
//! The driver owns a summary cache keyed by `(cfg, token)`. Analyzing a
//! CFG runs the intraprocedural fixpoint with a call handler that
//! recursively analyzes callees: formals are bound under a fresh scope,
//! the callee's exit state is popped back into the caller's scope, and
//! the returned value travels through a caller-scope meta variable.
//! Re-entering a `(cfg, token)` pair that is still on the active call
//! stack closes a recursive cycle; the driver then iterates the cycle,
//! widening the head's entry and exit after the configured threshold,
//! until the head's summary stabilizes.

mod context;
pub use context::*;

mod recursion;
pub use recursion::*;

use crate::abstract_domain::Lattice;
use super::callgraph::CallGraph;
use super::{
    compute_fixpoint, AbstractState, AnalysisState, AnalyzedCfg, FixpointConfig,
};
use crate::error::{AnalysisError, CallGraphError, ValidationError};
use crate::intermediate_representation::{
    Call, Cfg, ExpressionSet, Identifier, Program, ScopeToken, SymbolicExpression, TypeSet,
    Variable,
};
use crate::pipeline::CancellationToken;
use crate::prelude::*;
use crate::utils::log::{LogMessage, LogThreadMsg};
use std::collections::{BTreeMap, BTreeSet};

/// How calls without any resolved target are approximated.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub enum OpenCallPolicy {
    /// The call may do anything: its returned value is unknown.
    #[default]
    ReturnTop,
    /// The call never returns: the continuation is unreachable.
    ReturnBottom,
    /// Unresolved calls abort the analysis of the enclosing CFG.
    Fail,
}

/// The tunables of the interprocedural driver.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct InterproceduralConfig {
    /// The configuration of the per-CFG fixpoints.
    pub fixpoint: FixpointConfig,
    /// The `k` of k-limited call-site sensitivity; zero is
    /// context-insensitive.
    pub context_sensitivity: usize,
    /// The approximation of unresolved calls.
    pub open_call_policy: OpenCallPolicy,
}

type SummaryKey = (String, ContextSensitivityToken);

/// The context-sensitive interprocedural analysis.
pub struct ContextBasedAnalysis<'p, A: AbstractState> {
    program: &'p Program,
    call_graph: CallGraph,
    config: InterproceduralConfig,
    results: BTreeMap<SummaryKey, AnalyzedCfg<A>>,
    /// The explicit call stack of fixpoints currently being computed.
    active: Vec<SummaryKey>,
    /// Keys re-entered while active: the heads of recursive cycles.
    recursion_hits: BTreeSet<SummaryKey>,
    /// For each head, the members of its recursive cycle.
    recursion_members: BTreeMap<SummaryKey, BTreeSet<SummaryKey>>,
    /// Entry states joined at recursive call sites, to be folded into the
    /// head's entry on the next iteration.
    pending_entries: BTreeMap<SummaryKey, AnalysisState<A>>,
    recursions: Vec<Recursion<A>>,
    failures: Vec<(String, AnalysisError)>,
    cancel: CancellationToken,
    log: crossbeam_channel::Sender<LogThreadMsg>,
}

impl<'p, A: AbstractState> ContextBasedAnalysis<'p, A> {
    /// Create a driver for the given program.
    pub fn new(
        program: &'p Program,
        config: InterproceduralConfig,
        cancel: CancellationToken,
        log: crossbeam_channel::Sender<LogThreadMsg>,
    ) -> ContextBasedAnalysis<'p, A> {
        ContextBasedAnalysis {
            program,
            call_graph: CallGraph::from_program(program),
            config,
            results: BTreeMap::new(),
            active: Vec::new(),
            recursion_hits: BTreeSet::new(),
            recursion_members: BTreeMap::new(),
            pending_entries: BTreeMap::new(),
            recursions: Vec::new(),
            failures: Vec::new(),
            cancel,
            log,
        }
    }

    /// Whether the driver requires a call graph. Context-based analysis
    /// always resolves calls through one.
    pub fn needs_call_graph(&self) -> bool {
        true
    }

    /// The call graph driving call resolution.
    pub fn call_graph(&self) -> &CallGraph {
        &self.call_graph
    }

    /// The per-CFG errors recorded during the whole-program fixpoint.
    pub fn failures(&self) -> &[(String, AnalysisError)] {
        &self.failures
    }

    /// The recursions detected during the whole-program fixpoint.
    pub fn recursions(&self) -> &[Recursion<A>] {
        &self.recursions
    }

    /// Drive the whole-program analysis from the program's entry points.
    ///
    /// Errors of individual entry points are recorded and analysis
    /// continues with the next one; only cancellation aborts the run.
    pub fn fixpoint(&mut self, initial: &AnalysisState<A>) -> Result<(), AnalysisError> {
        let entry_points: Vec<String> = self.program.entry_points().to_vec();
        for entry_point in entry_points {
            let token = ContextSensitivityToken::starting(self.config.context_sensitivity);
            let entry = match self.prepare_entry_state(&entry_point, initial) {
                Ok(entry) => entry,
                Err(error) => {
                    self.record_failure(&entry_point, error);
                    continue;
                }
            };
            match self.analyze(&entry_point, token, entry, None) {
                Ok(_) => {}
                Err(AnalysisError::Cancelled) => return Err(AnalysisError::Cancelled),
                Err(error) => self.record_failure(&entry_point, error),
            }
        }
        let _ = self.log.send(
            LogMessage::new_info(format!(
                "whole-program fixpoint finished with {} summaries",
                self.results.len()
            ))
            .source("interprocedural")
            .into(),
        );
        Ok(())
    }

    /// The results computed for the given CFG, one per observed context
    /// token.
    pub fn analysis_results_of(&self, cfg_name: &str) -> Vec<&AnalyzedCfg<A>> {
        self.results
            .iter()
            .filter(|((name, _), _)| name.as_str() == cfg_name)
            .map(|(_, analyzed)| analyzed)
            .collect()
    }

    /// Iterate over all computed summaries.
    pub fn results(&self) -> impl Iterator<Item = (&str, &AnalyzedCfg<A>)> {
        self.results
            .iter()
            .map(|((name, _), analyzed)| (name.as_str(), analyzed))
    }

    fn record_failure(&mut self, cfg_name: &str, error: AnalysisError) {
        let _ = self.log.send(
            LogMessage::new_error(format!("analysis of '{cfg_name}' failed: {error}"))
                .source("interprocedural")
                .into(),
        );
        self.failures.push((cfg_name.to_string(), error));
    }

    /// The entry state of an entry-point CFG: nothing is known about its
    /// formals.
    fn prepare_entry_state(
        &self,
        cfg_name: &str,
        initial: &AnalysisState<A>,
    ) -> Result<AnalysisState<A>, AnalysisError> {
        let cfg = self.lookup_cfg(cfg_name)?;
        let pp = ProgramPoint::new(cfg_name, cfg.descriptor().location.clone());
        let mut entry = initial.clone();
        for formal in &cfg.descriptor().formals {
            let id = Identifier::Variable(formal.clone());
            entry = entry
                .assign(&id, &SymbolicExpression::Skip, &pp)
                .map_err(AnalysisError::from)?;
        }
        Ok(reset_stack(entry))
    }

    fn lookup_cfg(&self, cfg_name: &str) -> Result<&'p Cfg, AnalysisError> {
        self.program.cfg(cfg_name).ok_or_else(|| {
            ValidationError::new(format!("'{cfg_name}' does not name a CFG of the program"))
                .into()
        })
    }

    /// Analyze one CFG under one token, caching and reusing summaries.
    fn analyze(
        &mut self,
        cfg_name: &str,
        token: ContextSensitivityToken,
        mut entry: AnalysisState<A>,
        cause: Option<&Call>,
    ) -> Result<AnalyzedCfg<A>, AnalysisError> {
        let key: SummaryKey = (cfg_name.to_string(), token.clone());

        if self.active.contains(&key) {
            // a recursive cycle closed: remember it and hand the caller
            // the current summary approximation (bottom on the first
            // iteration)
            self.note_recursion(&key, &entry, cause);
            return Ok(self
                .results
                .get(&key)
                .cloned()
                .unwrap_or_else(|| AnalyzedCfg::seed(token, entry.bottom())));
        }

        if let Some(cached) = self.results.get(&key) {
            if entry.less_or_equal(cached.entry_state()) {
                return Ok(cached.clone());
            }
            entry = entry.lub(cached.entry_state());
        }

        let cfg = self.lookup_cfg(cfg_name)?;
        let fixpoint_config = self.config.fixpoint;
        let cancel = self.cancel.clone();
        let _ = self.log.send(
            LogMessage::new_debug(format!("computing fixpoint of '{cfg_name}' under {token}"))
                .source("interprocedural")
                .into(),
        );

        self.active.push(key.clone());
        let mut iteration: u32 = 0;
        let outcome = loop {
            let run = {
                let mut call_handler = |call: &Call,
                                        pp: &ProgramPoint,
                                        state: &AnalysisState<A>|
                 -> Result<AnalysisState<A>, AnalysisError> {
                    self.handle_call(call, pp, state, &token)
                };
                compute_fixpoint(
                    cfg,
                    token.clone(),
                    entry.clone(),
                    &fixpoint_config,
                    &cancel,
                    &mut call_handler,
                )
            };
            let analyzed = match run {
                Ok(analyzed) => analyzed,
                Err(error) => break Err(error),
            };

            if !self.recursion_hits.contains(&key) {
                break Ok(analyzed);
            }

            // this CFG heads a recursive cycle: iterate until its entry
            // and exit stabilize, widening after the threshold
            iteration += 1;
            let new_exit = analyzed.exit_state(cfg);
            let pending = self.pending_entries.remove(&key);
            let previous_exit = self.results.get(&key).map(|summary| summary.exit_state(cfg));
            let entry_stable = pending
                .as_ref()
                .map_or(true, |pending| pending.less_or_equal(&entry));
            let exit_stable = previous_exit
                .as_ref()
                .map_or(false, |previous| new_exit.less_or_equal(previous));
            if entry_stable && exit_stable {
                // converged: keep the widened exit so the installed
                // summary stays above everything seen mid-iteration
                let exit = previous_exit.expect("exit_stable implies a previous summary");
                break Ok(analyzed.with_exit_override(exit));
            }

            let merged_exit = match previous_exit {
                Some(previous) if iteration >= fixpoint_config.widening_threshold => {
                    previous.widening(&previous.lub(&new_exit))
                }
                Some(previous) => previous.lub(&new_exit),
                None => new_exit,
            };
            if let Some(pending) = pending {
                entry = if iteration >= fixpoint_config.widening_threshold {
                    entry.widening(&entry.lub(&pending))
                } else {
                    entry.lub(&pending)
                };
            }
            self.results.insert(
                key.clone(),
                analyzed
                    .with_entry_state(entry.clone())
                    .with_exit_override(merged_exit),
            );
            // the members of the cycle were computed against the stale
            // summary; drop them so the next iteration recomputes them
            if let Some(members) = self.recursion_members.get(&key) {
                for member in members.clone() {
                    if member != key {
                        self.results.remove(&member);
                    }
                }
            }
        };
        self.active.pop();

        match outcome {
            Ok(analyzed) => {
                self.recursion_hits.remove(&key);
                self.recursion_members.remove(&key);
                self.pending_entries.remove(&key);
                self.results.insert(key, analyzed.clone());
                Ok(analyzed)
            }
            Err(error) => Err(error),
        }
    }

    /// Record a recursion closing at `key`: the members are the suffix of
    /// the active stack starting at the head.
    fn note_recursion(&mut self, key: &SummaryKey, entry: &AnalysisState<A>, cause: Option<&Call>) {
        self.recursion_hits.insert(key.clone());
        match self.pending_entries.get_mut(key) {
            Some(pending) => *pending = pending.lub(entry),
            None => {
                self.pending_entries.insert(key.clone(), entry.clone());
            }
        }
        let position = self
            .active
            .iter()
            .position(|active| active == key)
            .expect("recursion hit on an inactive key");
        let members: BTreeSet<SummaryKey> = self.active[position..].iter().cloned().collect();
        let member_names: BTreeSet<String> =
            members.iter().map(|(name, _)| name.clone()).collect();
        self.recursion_members
            .entry(key.clone())
            .or_default()
            .extend(members);
        if let Some(call) = cause {
            let record = Recursion::new(
                call.clone(),
                key.0.clone(),
                member_names,
                key.1.clone(),
                entry.clone(),
            );
            if !self.recursions.contains(&record) {
                self.recursions.push(record);
            }
        }
    }

    /// The semantics of one call statement in the caller's state.
    fn handle_call(
        &mut self,
        call: &Call,
        pp: &ProgramPoint,
        state: &AnalysisState<A>,
        caller_token: &ContextSensitivityToken,
    ) -> Result<AnalysisState<A>, AnalysisError> {
        let targets = self.call_graph.resolve(&call.callee);
        if targets.is_empty() {
            return self.open_call(call, pp, state);
        }
        let mut joined: Option<AnalysisState<A>> = None;
        for target in targets {
            let returned = self.call_to(&target, call, pp, state, caller_token)?;
            joined = Some(match joined {
                Some(accumulated) => accumulated.lub(&returned),
                None => returned,
            });
        }
        Ok(joined.expect("resolved call targets are non-empty"))
    }

    /// Analyze one resolved call target and flow its effects back into
    /// the caller.
    fn call_to(
        &mut self,
        target: &str,
        call: &Call,
        pp: &ProgramPoint,
        caller_state: &AnalysisState<A>,
        caller_token: &ContextSensitivityToken,
    ) -> Result<AnalysisState<A>, AnalysisError> {
        let callee = self.lookup_cfg(target)?;
        let formals = callee.descriptor().formals.clone();
        if formals.len() != call.arguments.len() {
            return Err(CallGraphError::ArityMismatch {
                callee: target.to_string(),
                location: pp.location.clone(),
                actuals: call.arguments.len(),
                formals: formals.len(),
            }
            .into());
        }

        let scope = ScopeToken::new(pp.location.clone());
        let child_token = caller_token.push(&pp.location);

        // hide the caller's frame and bind the formals to the (rescoped)
        // actuals
        let mut callee_entry = caller_state
            .push_scope(&scope)
            .map_err(AnalysisError::from)?;
        for (formal, actual) in formals.iter().zip(&call.arguments) {
            let formal_id = Identifier::Variable(formal.clone());
            let scoped_actual = actual.push_scope(&scope);
            callee_entry = callee_entry
                .assign(&formal_id, &scoped_actual, pp)
                .map_err(AnalysisError::from)?;
        }
        let callee_entry = reset_stack(callee_entry);

        let analyzed = self.analyze(target, child_token, callee_entry, Some(call))?;
        let exit = analyzed.exit_state(callee);
        if exit.is_bottom() {
            // the callee never returns along the paths analyzed so far
            return Ok(caller_state.bottom());
        }

        // move the returned value onto a caller-scope meta variable, then
        // close the callee scope
        let returns_value = callee.descriptor().return_types.is_some() && call.result.is_some();
        let meta = Variable::new(
            format!("call_result@{}", pp.location),
            callee
                .descriptor()
                .return_types
                .clone()
                .unwrap_or_else(TypeSet::empty),
        );
        let meta_id = Identifier::Variable(meta);
        let transferred = if returns_value {
            let scoped_meta = meta_id.push_scope(&scope);
            let callee_result: SymbolicExpression = callee.descriptor().result_identifier().into();
            exit.assign(&scoped_meta, &callee_result, pp)
                .map_err(AnalysisError::from)?
        } else {
            exit
        };
        let popped = transferred.pop_scope(&scope).map_err(AnalysisError::from)?;

        if returns_value {
            let result_var = call.result.clone().expect("checked by returns_value");
            let result_id = Identifier::Variable(result_var);
            let assigned = popped
                .assign(&result_id, &meta_id.clone().into(), pp)
                .map_err(AnalysisError::from)?;
            Ok(assigned.forget_identifier(&meta_id))
        } else {
            Ok(reset_stack(popped))
        }
    }

    /// Approximate a call with no resolved targets.
    fn open_call(
        &mut self,
        call: &Call,
        pp: &ProgramPoint,
        state: &AnalysisState<A>,
    ) -> Result<AnalysisState<A>, AnalysisError> {
        match self.config.open_call_policy {
            OpenCallPolicy::ReturnTop => {
                let _ = self.log.send(
                    LogMessage::new_debug(format!(
                        "open call to '{}' at {} returns an unknown value",
                        call.callee, pp.location
                    ))
                    .source("interprocedural")
                    .into(),
                );
                match &call.result {
                    Some(result_var) => {
                        let id = Identifier::Variable(result_var.clone());
                        // `Skip` evaluates to top in every value domain
                        state
                            .assign(&id, &SymbolicExpression::Skip, pp)
                            .map_err(AnalysisError::from)
                    }
                    None => Ok(reset_stack(state.clone())),
                }
            }
            OpenCallPolicy::ReturnBottom => Ok(state.bottom()),
            OpenCallPolicy::Fail => Err(CallGraphError::UnresolvedCall {
                callee: call.callee.clone(),
                location: pp.location.clone(),
            }
            .into()),
        }
    }
}

/// Replace the computed-expression stack with the neutral `Skip`.
fn reset_stack<A: AbstractState>(state: AnalysisState<A>) -> AnalysisState<A> {
    AnalysisState::with_parts(
        state.state().clone(),
        ExpressionSet::singleton(SymbolicExpression::Skip),
        state.fixpoint_information().cloned(),
    )
}
