//! The intraprocedural CFG fixpoint: monotone ascending iteration with
//! widening, followed by an optional bounded descending phase with
//! narrowing.

use super::interprocedural::ContextSensitivityToken;
use super::{AbstractState, AnalysisState, FixpointWorkingSet};
use crate::abstract_domain::Lattice;
use crate::error::{AnalysisError, FixpointError, SemanticError, ValidationError};
use crate::intermediate_representation::{
    Call, Cfg, EdgeKind, Statement, StatementKind, SymbolicExpression,
};
use crate::pipeline::CancellationToken;
use crate::prelude::*;
use fnv::FnvHashMap;
use petgraph::graph::NodeIndex;

/// The tunables of a CFG fixpoint computation.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct FixpointConfig {
    /// Number of updates of a node's state before joins are replaced by
    /// widenings.
    pub widening_threshold: u32,
    /// Number of descending (narrowing) visits allowed per node; zero
    /// disables the descending phase.
    pub narrowing_steps: u32,
    /// The working-set flavor scheduling node visits.
    pub working_set: FixpointWorkingSet,
    /// Store only basic-block heads and reconstruct intermediate states
    /// on demand.
    pub optimize: bool,
}

impl Default for FixpointConfig {
    fn default() -> FixpointConfig {
        FixpointConfig {
            widening_threshold: 5,
            narrowing_steps: 0,
            working_set: FixpointWorkingSet::default(),
            optimize: false,
        }
    }
}

/// The handler invoked by the fixpoint when a call statement is reached.
///
/// The intraprocedural engine knows nothing about other CFGs; the
/// interprocedural driver passes a closure resolving the call, while
/// standalone uses can approximate calls directly.
pub type CallSemantics<'a, A> = dyn FnMut(
        &Call,
        &ProgramPoint,
        &AnalysisState<A>,
    ) -> Result<AnalysisState<A>, AnalysisError>
    + 'a;

/// The fixpoint results of one CFG under one context token.
#[derive(Debug, Clone)]
pub struct AnalyzedCfg<A: AbstractState> {
    token: ContextSensitivityToken,
    entry_state: AnalysisState<A>,
    results: FnvHashMap<NodeIndex, AnalysisState<A>>,
    optimized: bool,
    exit_override: Option<AnalysisState<A>>,
}

impl<A: AbstractState> AnalyzedCfg<A> {
    /// A result with no node states: the seed used while a recursion is
    /// being stabilized.
    pub fn seed(token: ContextSensitivityToken, entry_state: AnalysisState<A>) -> AnalyzedCfg<A> {
        AnalyzedCfg {
            token,
            entry_state,
            results: FnvHashMap::default(),
            optimized: false,
            exit_override: None,
        }
    }

    /// The context token this result was computed under.
    pub fn token(&self) -> &ContextSensitivityToken {
        &self.token
    }

    /// The entry state this result was computed from.
    pub fn entry_state(&self) -> &AnalysisState<A> {
        &self.entry_state
    }

    /// Widen the recorded entry state. Used while stabilizing recursions.
    pub fn with_entry_state(mut self, entry_state: AnalysisState<A>) -> AnalyzedCfg<A> {
        self.entry_state = entry_state;
        self
    }

    /// Force the exit state reported by [`AnalyzedCfg::exit_state`].
    /// Used while stabilizing recursions.
    pub fn with_exit_override(mut self, exit: AnalysisState<A>) -> AnalyzedCfg<A> {
        self.exit_override = Some(exit);
        self
    }

    /// The state holding after the execution of the given statement, if it
    /// was materialized.
    pub fn stored_state_after(&self, node: NodeIndex) -> Option<&AnalysisState<A>> {
        self.results.get(&node)
    }

    /// The state holding after the execution of the given statement,
    /// reconstructing it from the enclosing basic-block head if the
    /// fixpoint ran in optimized mode.
    pub fn unwinded_state_after(
        &self,
        cfg: &Cfg,
        node: NodeIndex,
    ) -> Result<AnalysisState<A>, AnalysisError> {
        if let Some(state) = self.results.get(&node) {
            return Ok(state.clone());
        }
        if !self.optimized {
            return Ok(self.entry_state.bottom());
        }
        // walk back through the basic block to the closest stored state
        let mut chain = vec![node];
        let mut current = node;
        let start = loop {
            let predecessors = cfg.predecessors(current);
            let [(predecessor, EdgeKind::Sequential)] = predecessors.as_slice() else {
                return Err(ValidationError::new(format!(
                    "statement at {} is not inside a basic block",
                    cfg.program_point(current).location
                ))
                .into());
            };
            if let Some(state) = self.results.get(predecessor) {
                break state.clone();
            }
            chain.push(*predecessor);
            current = *predecessor;
        };
        // replay the block; calls are always materialized, so the chain
        // cannot contain any
        let mut replay_calls = |call: &Call,
                                pp: &ProgramPoint,
                                _: &AnalysisState<A>|
         -> Result<AnalysisState<A>, AnalysisError> {
            Err(ValidationError::new(format!(
                "unexpected call to '{}' at {} during state reconstruction",
                call.callee, pp.location
            ))
            .into())
        };
        let mut state = start;
        for replayed in chain.into_iter().rev() {
            state = statement_semantics(cfg, replayed, &state, &mut replay_calls)?;
        }
        Ok(state)
    }

    /// The join of the post-states of the CFG's exit nodes.
    pub fn exit_state(&self, cfg: &Cfg) -> AnalysisState<A> {
        if let Some(exit) = &self.exit_override {
            return exit.clone();
        }
        let mut exit: Option<AnalysisState<A>> = None;
        for node in cfg.exits() {
            if let Some(state) = self.results.get(node) {
                exit = Some(match exit {
                    Some(accumulated) => accumulated.lub(state),
                    None => state.clone(),
                });
            }
        }
        exit.unwrap_or_else(|| self.entry_state.bottom())
    }

    /// Iterate over the materialized per-node states.
    pub fn results(&self) -> impl Iterator<Item = (NodeIndex, &AnalysisState<A>)> {
        self.results.iter().map(|(node, state)| (*node, state))
    }
}

/// The guard expression of a branching statement.
fn guard_of(cfg: &Cfg, node: NodeIndex) -> Result<SymbolicExpression, AnalysisError> {
    match &cfg.statement(node).kind {
        StatementKind::Expression(expr) => Ok(expr.clone()),
        other => Err(ValidationError::new(format!(
            "branch edge leaving a statement without a guard: '{}'",
            Statement {
                location: cfg.statement(node).location.clone(),
                kind: other.clone()
            }
        ))
        .into()),
    }
}

/// The semantics of a single statement.
pub(crate) fn statement_semantics<A: AbstractState>(
    cfg: &Cfg,
    node: NodeIndex,
    state: &AnalysisState<A>,
    call_semantics: &mut CallSemantics<A>,
) -> Result<AnalysisState<A>, AnalysisError> {
    let pp = cfg.program_point(node);
    let wrap = |error: SemanticError| -> AnalysisError {
        FixpointError {
            location: pp.location.clone(),
            source: error,
        }
        .into()
    };
    match &cfg.statement(node).kind {
        StatementKind::Assignment { target, value } => state
            .assign_expression(target, value, &pp)
            .map_err(wrap),
        StatementKind::Expression(expr) => {
            state.small_step_semantics(expr, &pp).map_err(wrap)
        }
        StatementKind::Call(call) => call_semantics(call, &pp, state),
        StatementKind::Return(Some(expr)) => {
            let result = cfg.descriptor().result_identifier();
            state.assign(&result, expr, &pp).map_err(wrap)
        }
        StatementKind::Return(None) => state
            .small_step_semantics(&SymbolicExpression::Skip, &pp)
            .map_err(wrap),
    }
}

/// The pre-state of a node: the join of the contributions of all incoming
/// edges, where branch edges assume the (negated) guard of their source.
/// Entry nodes additionally join the CFG's entry state.
fn pre_state<A: AbstractState>(
    cfg: &Cfg,
    node: NodeIndex,
    entry: &AnalysisState<A>,
    results: &FnvHashMap<NodeIndex, AnalysisState<A>>,
) -> Result<Option<AnalysisState<A>>, AnalysisError> {
    let mut pre: Option<AnalysisState<A>> = if cfg.entries().contains(&node) {
        Some(entry.clone())
    } else {
        None
    };
    for (predecessor, kind) in cfg.predecessors(node) {
        let Some(flowing) = results.get(&predecessor) else {
            continue;
        };
        if flowing.is_bottom() {
            continue;
        }
        let src = cfg.program_point(predecessor);
        let dest = cfg.program_point(node);
        let contributed = match kind {
            EdgeKind::Sequential => flowing.clone(),
            EdgeKind::TrueBranch => {
                let guard = guard_of(cfg, predecessor)?;
                flowing.assume(&guard, &src, &dest).map_err(|error| {
                    AnalysisError::from(FixpointError {
                        location: src.location.clone(),
                        source: error,
                    })
                })?
            }
            EdgeKind::FalseBranch => {
                let guard = guard_of(cfg, predecessor)?;
                flowing
                    .assume(&guard.negated(), &src, &dest)
                    .map_err(|error| {
                        AnalysisError::from(FixpointError {
                            location: src.location.clone(),
                            source: error,
                        })
                    })?
            }
        };
        pre = Some(match pre {
            Some(accumulated) => accumulated.lub(&contributed),
            None => contributed,
        });
    }
    Ok(pre)
}

/// Compute the fixpoint of a CFG from the given entry state.
///
/// The ascending phase joins states until the per-node visit count
/// reaches the widening threshold, then widens. If narrowing steps are
/// configured, a descending phase refines the result afterwards. The
/// worklist order determines which candidate is processed first;
/// correctness does not depend on it, but reproducibility does, so
/// successors are pushed in CFG insertion order.
pub fn compute_fixpoint<A: AbstractState>(
    cfg: &Cfg,
    token: ContextSensitivityToken,
    entry: AnalysisState<A>,
    config: &FixpointConfig,
    cancel: &CancellationToken,
    call_semantics: &mut CallSemantics<A>,
) -> Result<AnalyzedCfg<A>, AnalysisError> {
    let mut results: FnvHashMap<NodeIndex, AnalysisState<A>> = FnvHashMap::default();
    let mut visits: FnvHashMap<NodeIndex, u32> = FnvHashMap::default();
    let mut worklist = config.working_set.make::<NodeIndex>();
    for node in cfg.entries() {
        worklist.push(*node);
    }

    // ascending phase
    while let Ok(node) = worklist.pop() {
        cancel.check()?;
        let Some(pre) = pre_state(cfg, node, &entry, &results)? else {
            continue;
        };
        let post = statement_semantics(cfg, node, &pre, call_semantics)?;
        let updated = match results.get(&node) {
            Some(old) if post.less_or_equal(old) => None,
            Some(old) => {
                let count = visits.entry(node).or_insert(0);
                *count += 1;
                if *count < config.widening_threshold {
                    Some(old.lub(&post))
                } else {
                    Some(old.widening(&old.lub(&post)))
                }
            }
            None => {
                visits.insert(node, 1);
                Some(post)
            }
        };
        if let Some(new_state) = updated {
            results.insert(node, new_state);
            for (successor, _) in cfg.successors(node) {
                worklist.push(successor);
            }
        }
    }

    // descending phase
    if config.narrowing_steps > 0 {
        let mut narrowings: FnvHashMap<NodeIndex, u32> = FnvHashMap::default();
        let mut worklist = config.working_set.make::<NodeIndex>();
        for node in cfg.nodes() {
            worklist.push(node);
        }
        while let Ok(node) = worklist.pop() {
            cancel.check()?;
            let Some(pre) = pre_state(cfg, node, &entry, &results)? else {
                continue;
            };
            let post = statement_semantics(cfg, node, &pre, call_semantics)?;
            let Some(old) = results.get(&node) else {
                continue;
            };
            let refined = old.narrowing(&post);
            if &refined != old {
                let count = narrowings.entry(node).or_insert(0);
                *count += 1;
                if *count <= config.narrowing_steps {
                    results.insert(node, refined);
                    for (successor, _) in cfg.successors(node) {
                        worklist.push(successor);
                    }
                }
            }
        }
    }

    if config.optimize {
        results.retain(|node, _| {
            cfg.is_block_head(*node)
                || cfg.exits().contains(node)
                || matches!(cfg.statement(*node).kind, StatementKind::Call(_))
        });
    }

    Ok(AnalyzedCfg {
        token,
        entry_state: entry,
        results,
        optimized: config.optimize,
        exit_override: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstract_domain::{Bound, ConstantDomain, IntervalDomain, Sign};
    use crate::intermediate_representation::{Constant, Identifier};
    use crate::test_helpers::*;

    #[test]
    fn constant_propagation_straight_line() {
        // x = 3; y = x + 4; z = y * 2;
        let mut cfg = cfg_named("main");
        let first = push_stmt(&mut cfg, 1, assign("x", int(3)));
        let second = push_stmt(&mut cfg, 2, assign("y", add(var("x"), int(4))));
        let third = push_stmt(&mut cfg, 3, assign("z", mul(var("y"), int(2))));
        cfg.add_edge(first, second, EdgeKind::Sequential);
        cfg.add_edge(second, third, EdgeKind::Sequential);
        cfg.add_entry(first);
        cfg.add_exit(third);
        cfg.finalize();

        let analyzed = compute_fixpoint(
            &cfg,
            ContextSensitivityToken::starting(0),
            constant_state(),
            &FixpointConfig::default(),
            &CancellationToken::new(),
            &mut deny_calls(),
        )
        .unwrap();

        let exit = analyzed.exit_state(&cfg);
        let value = &exit.state().value;
        assert_eq!(
            value.get_state(&var_id("x")),
            ConstantDomain::Value(Constant::Int(3))
        );
        assert_eq!(
            value.get_state(&var_id("y")),
            ConstantDomain::Value(Constant::Int(7))
        );
        assert_eq!(
            value.get_state(&var_id("z")),
            ConstantDomain::Value(Constant::Int(14))
        );
    }

    #[test]
    fn sign_loop_with_widening() {
        // x = 1; while (x < 1000) x = x + 1;
        let mut cfg = cfg_named("main");
        let init = push_stmt(&mut cfg, 1, assign("x", int(1)));
        let guard = push_stmt(&mut cfg, 2, expression(lt(var("x"), int(1000))));
        let body = push_stmt(&mut cfg, 3, assign("x", add(var("x"), int(1))));
        let after = push_stmt(&mut cfg, 4, expression(skip()));
        cfg.add_edge(init, guard, EdgeKind::Sequential);
        cfg.add_edge(guard, body, EdgeKind::TrueBranch);
        cfg.add_edge(guard, after, EdgeKind::FalseBranch);
        cfg.add_edge(body, guard, EdgeKind::Sequential);
        cfg.add_entry(init);
        cfg.add_exit(after);
        cfg.finalize();

        let config = FixpointConfig {
            widening_threshold: 3,
            ..FixpointConfig::default()
        };
        let analyzed = compute_fixpoint(
            &cfg,
            ContextSensitivityToken::starting(0),
            sign_state(),
            &config,
            &CancellationToken::new(),
            &mut deny_calls(),
        )
        .unwrap();

        let exit = analyzed.exit_state(&cfg);
        assert_eq!(exit.state().value.get_state(&var_id("x")), Sign::Positive);
    }

    #[test]
    fn interval_loop_with_narrowing() {
        // x = 0; while (x < 1000) x = x + 1;  -- narrowing refines the
        // widened bound at the loop exit
        let mut cfg = cfg_named("main");
        let init = push_stmt(&mut cfg, 1, assign("x", int(0)));
        let guard = push_stmt(&mut cfg, 2, expression(lt(var("x"), int(1000))));
        let body = push_stmt(&mut cfg, 3, assign("x", add(var("x"), int(1))));
        let after = push_stmt(&mut cfg, 4, expression(skip()));
        cfg.add_edge(init, guard, EdgeKind::Sequential);
        cfg.add_edge(guard, body, EdgeKind::TrueBranch);
        cfg.add_edge(guard, after, EdgeKind::FalseBranch);
        cfg.add_edge(body, guard, EdgeKind::Sequential);
        cfg.add_entry(init);
        cfg.add_exit(after);
        cfg.finalize();

        let config = FixpointConfig {
            widening_threshold: 2,
            narrowing_steps: 2,
            ..FixpointConfig::default()
        };
        let analyzed = compute_fixpoint(
            &cfg,
            ContextSensitivityToken::starting(0),
            interval_state(),
            &config,
            &CancellationToken::new(),
            &mut deny_calls(),
        )
        .unwrap();

        let exit = analyzed.exit_state(&cfg);
        assert_eq!(
            exit.state().value.get_state(&var_id("x")),
            IntervalDomain::range(Bound::Int(1000), Bound::Int(1000))
        );
    }

    #[test]
    fn reaching_definitions_through_branches() {
        // x = 1; if (*) x = 2; else x = 3; y = x;
        use crate::abstract_domain::DefinitionLocations;
        let mut cfg = cfg_named("main");
        let first = push_stmt(&mut cfg, 1, assign("x", int(1)));
        let cond = push_stmt(&mut cfg, 2, expression(skip()));
        let then_branch = push_stmt(&mut cfg, 2, assign("x", int(2)));
        let else_branch = push_stmt(&mut cfg, 3, assign("x", int(3)));
        let read = push_stmt(&mut cfg, 4, assign("y", var("x")));
        cfg.add_edge(first, cond, EdgeKind::Sequential);
        cfg.add_edge(cond, then_branch, EdgeKind::Sequential);
        cfg.add_edge(cond, else_branch, EdgeKind::Sequential);
        cfg.add_edge(then_branch, read, EdgeKind::Sequential);
        cfg.add_edge(else_branch, read, EdgeKind::Sequential);
        cfg.add_entry(first);
        cfg.add_exit(read);
        cfg.finalize();

        let analyzed = compute_fixpoint(
            &cfg,
            ContextSensitivityToken::starting(0),
            reaching_definitions_state(),
            &FixpointConfig::default(),
            &CancellationToken::new(),
            &mut deny_calls(),
        )
        .unwrap();

        // at the read of `x` in `y = x`, the definitions of lines 2 and 3
        // reach; line 1 is killed on both branches
        let before_read = analyzed
            .stored_state_after(then_branch)
            .unwrap()
            .lub(analyzed.stored_state_after(else_branch).unwrap());
        let reaching = before_read.state().value.get_state(&var_id("x"));
        let expected: DefinitionLocations = [location(2), location(3)].into_iter().collect();
        assert_eq!(reaching, expected);
    }

    #[test]
    fn optimized_fixpoint_reconstructs_states() {
        let mut cfg = cfg_named("main");
        let first = push_stmt(&mut cfg, 1, assign("x", int(3)));
        let second = push_stmt(&mut cfg, 2, assign("y", add(var("x"), int(4))));
        let third = push_stmt(&mut cfg, 3, assign("z", mul(var("y"), int(2))));
        cfg.add_edge(first, second, EdgeKind::Sequential);
        cfg.add_edge(second, third, EdgeKind::Sequential);
        cfg.add_entry(first);
        cfg.add_exit(third);
        cfg.finalize();

        let config = FixpointConfig {
            optimize: true,
            ..FixpointConfig::default()
        };
        let analyzed = compute_fixpoint(
            &cfg,
            ContextSensitivityToken::starting(0),
            constant_state(),
            &config,
            &CancellationToken::new(),
            &mut deny_calls(),
        )
        .unwrap();

        // `second` sits in the middle of the block and is not stored
        assert!(analyzed.stored_state_after(second).is_none());
        let reconstructed = analyzed.unwinded_state_after(&cfg, second).unwrap();
        assert_eq!(
            reconstructed.state().value.get_state(&var_id("y")),
            ConstantDomain::Value(Constant::Int(7))
        );
    }

    #[test]
    fn monotone_entry_states_give_monotone_exits() {
        let mut cfg = cfg_named("main");
        let guard = push_stmt(&mut cfg, 1, expression(lt(var("x"), int(10))));
        let body = push_stmt(&mut cfg, 2, assign("x", add(var("x"), int(1))));
        let after = push_stmt(&mut cfg, 3, expression(skip()));
        cfg.add_edge(guard, body, EdgeKind::TrueBranch);
        cfg.add_edge(guard, after, EdgeKind::FalseBranch);
        cfg.add_edge(body, guard, EdgeKind::Sequential);
        cfg.add_entry(guard);
        cfg.add_exit(after);
        cfg.finalize();

        let small = interval_state()
            .assign(&var_id("x"), &int(0), &program_point(0))
            .unwrap();
        let large_env = crate::abstract_domain::Environment::assign(
            &small.state().value,
            &var_id("x"),
            IntervalDomain::range(Bound::Int(0), Bound::Int(5)),
        );
        let large = AnalysisState::with_parts(
            crate::analysis::SimpleAbstractState::new(
                small.state().heap.clone(),
                large_env,
                small.state().types.clone(),
            ),
            small.computed_expressions().clone(),
            None,
        );
        assert!(small.less_or_equal(&large));

        let run = |entry: AnalysisState<_>| {
            compute_fixpoint(
                &cfg,
                ContextSensitivityToken::starting(0),
                entry,
                &FixpointConfig::default(),
                &CancellationToken::new(),
                &mut deny_calls(),
            )
            .unwrap()
        };
        let small_result = run(small);
        let large_result = run(large);
        for (node, state) in small_result.results() {
            let larger = large_result.stored_state_after(node).unwrap();
            assert!(state.less_or_equal(larger));
        }
    }

    #[test]
    fn semantic_failures_become_fixpoint_errors() {
        let mut cfg = cfg_named("main");
        // assigning to a constant cannot be rewritten to an identifier
        let bad = push_stmt(
            &mut cfg,
            1,
            StatementKind::Assignment {
                target: int(1),
                value: int(2),
            },
        );
        cfg.add_entry(bad);
        cfg.add_exit(bad);
        cfg.finalize();

        let result = compute_fixpoint(
            &cfg,
            ContextSensitivityToken::starting(0),
            constant_state(),
            &FixpointConfig::default(),
            &CancellationToken::new(),
            &mut deny_calls(),
        );
        assert!(matches!(result, Err(AnalysisError::Fixpoint(_))));
    }

    #[test]
    fn cancellation_aborts_the_fixpoint() {
        let mut cfg = cfg_named("main");
        let only = push_stmt(&mut cfg, 1, assign("x", int(1)));
        cfg.add_entry(only);
        cfg.add_exit(only);
        cfg.finalize();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = compute_fixpoint(
            &cfg,
            ContextSensitivityToken::starting(0),
            constant_state(),
            &FixpointConfig::default(),
            &cancel,
            &mut deny_calls(),
        );
        assert!(matches!(result, Err(AnalysisError::Cancelled)));
    }

    #[test]
    fn weak_allocation_site_in_a_loop() {
        // while (*) { p = new T; p.f = 1; }
        use crate::intermediate_representation::{SymbolicExpression, TypeSet};
        let mut cfg = cfg_named("main");
        let head = push_stmt(&mut cfg, 1, expression(skip()));
        let alloc = push_stmt(
            &mut cfg,
            2,
            StatementKind::Assignment {
                target: typed_var("p", "T"),
                value: SymbolicExpression::HeapReference {
                    inner: Box::new(SymbolicExpression::HeapAllocation {
                        types: TypeSet::of("T"),
                    }),
                },
            },
        );
        let store = push_stmt(
            &mut cfg,
            3,
            StatementKind::Assignment {
                target: SymbolicExpression::AccessChild {
                    container: Box::new(SymbolicExpression::HeapDereference {
                        inner: Box::new(typed_var("p", "T")),
                    }),
                    child: Box::new(SymbolicExpression::Constant(Constant::Str(
                        "f".to_string(),
                    ))),
                    types: TypeSet::of("int"),
                },
                value: int(1),
            },
        );
        let after = push_stmt(&mut cfg, 4, expression(skip()));
        cfg.add_edge(head, alloc, EdgeKind::Sequential);
        cfg.add_edge(alloc, store, EdgeKind::Sequential);
        cfg.add_edge(store, head, EdgeKind::Sequential);
        cfg.add_edge(head, after, EdgeKind::Sequential);
        cfg.add_entry(head);
        cfg.add_exit(after);
        cfg.finalize();

        let analyzed = compute_fixpoint(
            &cfg,
            ContextSensitivityToken::starting(0),
            interval_state(),
            &FixpointConfig::default(),
            &CancellationToken::new(),
            &mut deny_calls(),
        )
        .unwrap();

        let exit = analyzed.exit_state(&cfg);
        let sites = exit.state().heap.sites_of(&var_id_typed("p", "T"));
        assert_eq!(sites.len(), 1);
        let site = sites.iter().next().unwrap().clone();
        assert!(site.weak);
        // the field value was assigned weakly onto the site identifier
        let site_id = Identifier::HeapLocation(site);
        assert_eq!(
            exit.state().value.get_state(&site_id),
            IntervalDomain::singleton(1)
        );
    }
}
