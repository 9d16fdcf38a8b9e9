//! Shared builders for unit and scenario tests.

use crate::abstract_domain::{ConstantDomain, IntervalDomain, ReachingDefinitions, Sign};
use crate::analysis::{
    type_environment, value_environment, AbstractState, AnalysisState, NonRelationalValue,
    PointBasedHeap, SimpleAbstractState, TypeEnvironment, ValueEnvironment,
};
use crate::error::AnalysisError;
use crate::intermediate_representation::{
    BinaryOperator, Call, Cfg, CfgDescriptor, CodeLocation, Identifier, ProgramPoint, Statement,
    StatementKind, SymbolicExpression, TypeSet, Variable,
};
use petgraph::graph::NodeIndex;

/// The composite state used by most tests.
pub type TestState<V> = SimpleAbstractState<PointBasedHeap, ValueEnvironment<V>, TypeEnvironment>;

pub fn location(line: u32) -> CodeLocation {
    CodeLocation::new("test.src", line, 0)
}

pub fn program_point(line: u32) -> ProgramPoint {
    ProgramPoint::new("main", location(line))
}

pub fn cfg_named(name: &str) -> Cfg {
    Cfg::new(CfgDescriptor::new(name, Vec::new(), None, location(0)))
}

pub fn push_stmt(cfg: &mut Cfg, line: u32, kind: StatementKind) -> NodeIndex {
    cfg.add_statement(Statement {
        location: location(line),
        kind,
    })
}

pub fn int(value: i64) -> SymbolicExpression {
    SymbolicExpression::int(value)
}

pub fn skip() -> SymbolicExpression {
    SymbolicExpression::Skip
}

pub fn var(name: &str) -> SymbolicExpression {
    SymbolicExpression::var(Variable::new(name, TypeSet::of("int")))
}

pub fn typed_var(name: &str, type_name: &str) -> SymbolicExpression {
    SymbolicExpression::var(Variable::new(name, TypeSet::of(type_name)))
}

pub fn var_id(name: &str) -> Identifier {
    Identifier::Variable(Variable::new(name, TypeSet::of("int")))
}

pub fn var_id_typed(name: &str, type_name: &str) -> Identifier {
    Identifier::Variable(Variable::new(name, TypeSet::of(type_name)))
}

pub fn add(left: SymbolicExpression, right: SymbolicExpression) -> SymbolicExpression {
    SymbolicExpression::binary(BinaryOperator::Add, left, right)
}

pub fn sub(left: SymbolicExpression, right: SymbolicExpression) -> SymbolicExpression {
    SymbolicExpression::binary(BinaryOperator::Sub, left, right)
}

pub fn mul(left: SymbolicExpression, right: SymbolicExpression) -> SymbolicExpression {
    SymbolicExpression::binary(BinaryOperator::Mul, left, right)
}

pub fn lt(left: SymbolicExpression, right: SymbolicExpression) -> SymbolicExpression {
    SymbolicExpression::binary(BinaryOperator::Lt, left, right)
}

pub fn le(left: SymbolicExpression, right: SymbolicExpression) -> SymbolicExpression {
    SymbolicExpression::binary(BinaryOperator::Le, left, right)
}

pub fn assign(name: &str, value: SymbolicExpression) -> StatementKind {
    StatementKind::Assignment {
        target: var(name),
        value,
    }
}

pub fn expression(expr: SymbolicExpression) -> StatementKind {
    StatementKind::Expression(expr)
}

pub fn call(callee: &str, arguments: Vec<SymbolicExpression>, result: Option<&str>) -> StatementKind {
    StatementKind::Call(Call {
        callee: callee.to_string(),
        arguments,
        result: result.map(|name| Variable::new(name, TypeSet::of("int"))),
    })
}

pub fn state_with<V: NonRelationalValue>() -> AnalysisState<TestState<V>> {
    AnalysisState::new(
        SimpleAbstractState::new(
            PointBasedHeap::new(),
            value_environment::<V>(),
            type_environment(),
        ),
        SymbolicExpression::Skip,
    )
}

pub fn constant_state() -> AnalysisState<TestState<ConstantDomain>> {
    state_with::<ConstantDomain>()
}

pub fn sign_state() -> AnalysisState<TestState<Sign>> {
    state_with::<Sign>()
}

pub fn interval_state() -> AnalysisState<TestState<IntervalDomain>> {
    state_with::<IntervalDomain>()
}

pub fn reaching_definitions_state(
) -> AnalysisState<SimpleAbstractState<PointBasedHeap, ReachingDefinitions, TypeEnvironment>> {
    AnalysisState::new(
        SimpleAbstractState::new(
            PointBasedHeap::new(),
            ReachingDefinitions::new(),
            type_environment(),
        ),
        SymbolicExpression::Skip,
    )
}

/// A call handler for intraprocedural tests: any call is an error.
pub fn deny_calls<A: AbstractState>() -> impl FnMut(
    &Call,
    &ProgramPoint,
    &AnalysisState<A>,
) -> Result<AnalysisState<A>, AnalysisError> {
    |call: &Call, pp: &ProgramPoint, _: &AnalysisState<A>| {
        Err(crate::error::ValidationError::new(format!(
            "unexpected call to '{}' at {}",
            call.callee, pp.location
        ))
        .into())
    }
}
