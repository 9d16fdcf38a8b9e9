//! The analysis state tracked at each program point: an abstract state,
//! the expressions pending evaluation, and auxiliary fixpoint information.

use super::{AbstractState, Satisfiability};
use crate::abstract_domain::{FixpointInfo, InfoValue, Lattice};
use crate::error::SemanticError;
use crate::intermediate_representation::{
    ExpressionSet, Identifier, ScopeToken, SymbolicExpression,
};
use crate::prelude::*;

/// The abstract analysis state at a given program point.
///
/// Combines an [`AbstractState`] modeling the values of program variables
/// and heap locations with the set of expressions that have been computed
/// and are available for later use without being stored in memory (the
/// "stack"), plus an optional key-value mapping of auxiliary information
/// computed during fixpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisState<A: AbstractState> {
    state: A,
    computed_expressions: ExpressionSet,
    info: Option<FixpointInfo>,
}

impl<A: AbstractState> AnalysisState<A> {
    /// Build a new state with a single computed expression.
    pub fn new(state: A, computed_expression: SymbolicExpression) -> AnalysisState<A> {
        AnalysisState {
            state,
            computed_expressions: ExpressionSet::singleton(computed_expression),
            info: None,
        }
    }

    /// Build a new state from its three components.
    pub fn with_parts(
        state: A,
        computed_expressions: ExpressionSet,
        info: Option<FixpointInfo>,
    ) -> AnalysisState<A> {
        AnalysisState {
            state,
            computed_expressions,
            info,
        }
    }

    /// The embedded abstract state.
    pub fn state(&self) -> &A {
        &self.state
    }

    /// The expressions computed by the latest semantic step.
    pub fn computed_expressions(&self) -> &ExpressionSet {
        &self.computed_expressions
    }

    /// The auxiliary fixpoint information, if any was stored.
    pub fn fixpoint_information(&self) -> Option<&FixpointInfo> {
        self.info.as_ref()
    }

    /// The auxiliary information stored under the given key, downcast to
    /// a concrete lattice type.
    pub fn info_as<T: std::any::Any>(&self, key: &str) -> Option<&T> {
        self.info.as_ref().and_then(|info| info.get_as::<T>(key))
    }

    /// A copy of this state where `key` maps to `value`, discarding any
    /// previous mapping (strong update).
    pub fn store_info(&self, key: impl ToString, value: InfoValue) -> AnalysisState<A> {
        let info = self.info.clone().unwrap_or_default().put(key, value);
        AnalysisState {
            state: self.state.clone(),
            computed_expressions: self.computed_expressions.clone(),
            info: Some(info),
        }
    }

    /// A copy of this state where `key` maps to the join of `value` and
    /// the previous mapping, if any (weak update).
    pub fn weak_store_info(&self, key: impl ToString, value: InfoValue) -> AnalysisState<A> {
        let info = self.info.clone().unwrap_or_default().put_weak(key, value);
        AnalysisState {
            state: self.state.clone(),
            computed_expressions: self.computed_expressions.clone(),
            info: Some(info),
        }
    }

    /// The state after assigning `value` to the identifier `id`. The
    /// computed expression set becomes `{id}`.
    pub fn assign(
        &self,
        id: &Identifier,
        value: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<AnalysisState<A>, SemanticError> {
        let state = self.state.assign(id, value, pp)?;
        Ok(AnalysisState {
            state,
            computed_expressions: ExpressionSet::singleton(id.clone().into()),
            info: self.info.clone(),
        })
    }

    /// The state after assigning `value` to the target expression: if the
    /// target is not an identifier it is rewritten first, and the
    /// assignment joins over all rewritten identifiers.
    pub fn assign_expression(
        &self,
        target: &SymbolicExpression,
        value: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<AnalysisState<A>, SemanticError> {
        if let SymbolicExpression::Identifier(id) = target {
            return self.assign(id, value, pp);
        }

        let evaluated = self.state.small_step_semantics(target, pp)?;
        let rewritten = evaluated.rewrite(target, pp)?;
        let mut state = self.state.bottom();
        for candidate in rewritten.iter() {
            match candidate {
                SymbolicExpression::Identifier(id) => {
                    state = state.lub(&evaluated.assign(id, value, pp)?);
                }
                other => {
                    return Err(SemanticError::NotAnIdentifier {
                        expression: target.to_string(),
                        rewritten: other.to_string(),
                    })
                }
            }
        }
        Ok(AnalysisState {
            state,
            computed_expressions: rewritten,
            info: self.info.clone(),
        })
    }

    /// The state after evaluating the expression without committing an
    /// assignment. The computed expression set becomes `{expr}`.
    pub fn small_step_semantics(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<AnalysisState<A>, SemanticError> {
        let state = self.state.small_step_semantics(expr, pp)?;
        Ok(AnalysisState {
            state,
            computed_expressions: ExpressionSet::singleton(expr.clone()),
            info: self.info.clone(),
        })
    }

    /// The state refined by assuming that the expression holds. The
    /// computed expression set is preserved.
    pub fn assume(
        &self,
        expr: &SymbolicExpression,
        src: &ProgramPoint,
        dest: &ProgramPoint,
    ) -> Result<AnalysisState<A>, SemanticError> {
        let state = self.state.assume(expr, src, dest)?;
        if state.is_bottom() {
            return Ok(self.bottom());
        }
        Ok(AnalysisState {
            state,
            computed_expressions: self.computed_expressions.clone(),
            info: self.info.clone(),
        })
    }

    /// Whether the state satisfies the given expression.
    pub fn satisfies(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<Satisfiability, SemanticError> {
        self.state.satisfies(expr, pp)
    }

    /// The state with all knowledge about the identifier dropped.
    pub fn forget_identifier(&self, id: &Identifier) -> AnalysisState<A> {
        AnalysisState {
            state: self.state.forget_identifier(id),
            computed_expressions: self.computed_expressions.clone(),
            info: self.info.clone(),
        }
    }

    /// The state with all knowledge about the matching identifiers
    /// dropped.
    pub fn forget_identifiers_if(
        &self,
        predicate: &dyn Fn(&Identifier) -> bool,
    ) -> AnalysisState<A> {
        AnalysisState {
            state: self.state.forget_identifiers_if(predicate),
            computed_expressions: self.computed_expressions.clone(),
            info: self.info.clone(),
        }
    }

    /// The state visible after entering the given scope.
    pub fn push_scope(&self, token: &ScopeToken) -> Result<AnalysisState<A>, SemanticError> {
        Ok(AnalysisState {
            state: self.state.push_scope(token)?,
            computed_expressions: self
                .computed_expressions
                .filter_map(|expr| Some(expr.push_scope(token))),
            info: self.info.clone(),
        })
    }

    /// The state visible after leaving the given scope.
    ///
    /// Computed expressions mentioning identifiers local to the closing
    /// scope have no meaning outside of it and are dropped.
    pub fn pop_scope(&self, token: &ScopeToken) -> Result<AnalysisState<A>, SemanticError> {
        Ok(AnalysisState {
            state: self.state.pop_scope(token)?,
            computed_expressions: self
                .computed_expressions
                .filter_map(|expr| expr.pop_scope(token)),
            info: self.info.clone(),
        })
    }
}

impl<A: AbstractState> Lattice for AnalysisState<A> {
    fn top(&self) -> Self {
        AnalysisState {
            state: self.state.top(),
            computed_expressions: ExpressionSet::universe(),
            info: None,
        }
    }

    fn bottom(&self) -> Self {
        AnalysisState {
            state: self.state.bottom(),
            computed_expressions: ExpressionSet::empty(),
            info: Some(FixpointInfo::bottom()),
        }
    }

    fn is_top(&self) -> bool {
        self.state.is_top() && self.computed_expressions.is_top() && self.info.is_none()
    }

    fn is_bottom(&self) -> bool {
        self.state.is_bottom()
            && self.computed_expressions.is_bottom()
            && self.info.as_ref().is_some_and(|info| info.is_bottom())
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        self.state.less_or_equal(&other.state)
            && self
                .computed_expressions
                .less_or_equal(&other.computed_expressions)
            && match (&self.info, &other.info) {
                (None, _) => true,
                (Some(info), Some(other_info)) => info.less_or_equal(other_info),
                (Some(info), None) => info.is_bottom(),
            }
    }

    fn lub(&self, other: &Self) -> Self {
        AnalysisState {
            state: self.state.lub(&other.state),
            computed_expressions: self.computed_expressions.lub(&other.computed_expressions),
            info: combine_info(&self.info, &other.info, |left, right| left.lub(right)),
        }
    }

    fn glb(&self, other: &Self) -> Self {
        AnalysisState {
            state: self.state.glb(&other.state),
            computed_expressions: self.computed_expressions.glb(&other.computed_expressions),
            info: combine_info(&self.info, &other.info, |left, right| left.glb(right)),
        }
    }

    fn widening(&self, other: &Self) -> Self {
        AnalysisState {
            state: self.state.widening(&other.state),
            computed_expressions: self.computed_expressions.lub(&other.computed_expressions),
            info: combine_info(&self.info, &other.info, |left, right| left.widening(right)),
        }
    }

    fn narrowing(&self, other: &Self) -> Self {
        AnalysisState {
            state: self.state.narrowing(&other.state),
            computed_expressions: self.computed_expressions.glb(&other.computed_expressions),
            info: combine_info(&self.info, &other.info, |left, right| left.narrowing(right)),
        }
    }
}

fn combine_info(
    left: &Option<FixpointInfo>,
    right: &Option<FixpointInfo>,
    combine: impl Fn(&FixpointInfo, &FixpointInfo) -> FixpointInfo,
) -> Option<FixpointInfo> {
    match (left, right) {
        (None, None) => None,
        (Some(info), None) | (None, Some(info)) => Some(info.clone()),
        (Some(left), Some(right)) => Some(combine(left, right)),
    }
}

impl<A: AbstractState + std::fmt::Display> std::fmt::Display for AnalysisState<A> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_bottom() {
            return write!(formatter, "BOTTOM");
        }
        write!(
            formatter,
            "{} || expressions: {}",
            self.state, self.computed_expressions
        )
    }
}
