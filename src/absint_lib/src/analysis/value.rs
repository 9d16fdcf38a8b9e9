//! Non-relational value analysis: evaluation of heap-free expressions over
//! an element domain, lifted pointwise to environments.

use super::{HeapReplacement, Satisfiability, SemanticDomain, ValueDomain};
use crate::abstract_domain::{Environment, Lattice};
use crate::error::SemanticError;
use crate::intermediate_representation::{
    BinaryOperator, Constant, Identifier, ScopeToken, SymbolicExpression, TernaryOperator,
    UnaryOperator,
};
use crate::prelude::*;

/// An element domain for non-relational value analyses.
///
/// Implementors describe how single abstract values react to constants and
/// operators; the [`Environment`] lifting takes care of everything else.
/// Unrepresentable inputs must be over-approximated to top, never reported
/// as errors.
pub trait NonRelationalValue: Lattice + std::fmt::Display {
    /// The greatest element of the domain.
    fn top_element() -> Self;

    /// The least element of the domain.
    fn bottom_element() -> Self;

    /// The abstraction of a literal constant.
    fn eval_constant(constant: &Constant) -> Self;

    /// The abstract result of a unary operation.
    fn eval_unary(op: UnaryOperator, arg: &Self) -> Self;

    /// The abstract result of a binary operation.
    fn eval_binary(op: BinaryOperator, left: &Self, right: &Self) -> Self;

    /// The abstract result of a ternary operation.
    fn eval_ternary(op: TernaryOperator, first: &Self, second: &Self, third: &Self) -> Self {
        let _ = (op, first);
        second.lub(third)
    }

    /// Whether `left op right` holds for the represented values.
    fn satisfies_binary(op: BinaryOperator, left: &Self, right: &Self) -> Satisfiability {
        let _ = (op, left, right);
        Satisfiability::Unknown
    }

    /// The operand values refined under the assumption that
    /// `left op right` holds.
    fn refine_comparison(op: BinaryOperator, left: &Self, right: &Self) -> (Self, Self) {
        let _ = op;
        (left.clone(), right.clone())
    }
}

/// Evaluate a heap-free expression in the given environment.
///
/// Residual heap forms (which a correct heap domain never produces) are
/// soundly evaluated to top.
pub fn eval<T: NonRelationalValue>(env: &Environment<T>, expr: &SymbolicExpression) -> T {
    use SymbolicExpression::*;
    match expr {
        Skip => T::top_element(),
        Constant(constant) => T::eval_constant(constant),
        Identifier(id) => env.get_state(id),
        Unary { op, inner } => T::eval_unary(*op, &eval(env, inner)),
        Binary { op, left, right } => T::eval_binary(*op, &eval(env, left), &eval(env, right)),
        Ternary {
            op,
            first,
            second,
            third,
        } => T::eval_ternary(
            *op,
            &eval(env, first),
            &eval(env, second),
            &eval(env, third),
        ),
        HeapAllocation { .. }
        | HeapReference { .. }
        | HeapDereference { .. }
        | AccessChild { .. } => T::top_element(),
    }
}

fn satisfies<T: NonRelationalValue>(
    env: &Environment<T>,
    expr: &SymbolicExpression,
) -> Satisfiability {
    use SymbolicExpression::*;
    match expr {
        Constant(crate::intermediate_representation::Constant::Bool(value)) => (*value).into(),
        Unary {
            op: UnaryOperator::LogicalNot,
            inner,
        } => satisfies(env, inner).negate(),
        Binary { op, left, right } if op.is_comparison() => {
            T::satisfies_binary(*op, &eval(env, left), &eval(env, right))
        }
        Binary {
            op: BinaryOperator::And,
            left,
            right,
        } => satisfies(env, left).and(&satisfies(env, right)),
        Binary {
            op: BinaryOperator::Or,
            left,
            right,
        } => satisfies(env, left).or(&satisfies(env, right)),
        _ => Satisfiability::Unknown,
    }
}

/// Refine the environment under the assumption that the expression holds.
fn assume<T: NonRelationalValue>(
    env: &Environment<T>,
    expr: &SymbolicExpression,
) -> Environment<T> {
    use SymbolicExpression::*;
    if env.is_bottom() {
        return env.clone();
    }
    match expr {
        Unary {
            op: UnaryOperator::LogicalNot,
            inner,
        } => assume_negation(env, inner),
        Binary {
            op: BinaryOperator::And,
            left,
            right,
        } => assume(&assume(env, left), right),
        Binary {
            op: BinaryOperator::Or,
            left,
            right,
        } => assume(env, left).lub(&assume(env, right)),
        Binary { op, left, right } if op.is_comparison() => {
            let left_value = eval(env, left);
            let right_value = eval(env, right);
            let (left_refined, right_refined) =
                T::refine_comparison(*op, &left_value, &right_value);
            if left_refined.is_bottom() || right_refined.is_bottom() {
                return env.bottom();
            }
            let mut refined = env.clone();
            if let Identifier(id) = left.as_ref() {
                refined = refined.assign(id, left_refined);
            }
            if let Identifier(id) = right.as_ref() {
                refined = refined.assign(id, right_refined);
            }
            refined
        }
        _ => match satisfies(env, expr) {
            Satisfiability::NotSatisfied => env.bottom(),
            _ => env.clone(),
        },
    }
}

/// Refine the environment under the assumption that the expression does
/// not hold, pushing the negation towards the leaves.
fn assume_negation<T: NonRelationalValue>(
    env: &Environment<T>,
    expr: &SymbolicExpression,
) -> Environment<T> {
    use SymbolicExpression::*;
    match expr {
        Unary {
            op: UnaryOperator::LogicalNot,
            inner,
        } => assume(env, inner),
        Binary { op, left, right } => {
            if let Some(negated) = op.negate() {
                return assume(
                    env,
                    &SymbolicExpression::binary(negated, (**left).clone(), (**right).clone()),
                );
            }
            match op {
                // de Morgan
                BinaryOperator::And => {
                    assume_negation(env, left).lub(&assume_negation(env, right))
                }
                BinaryOperator::Or => assume_negation(&assume_negation(env, left), right),
                _ => env.clone(),
            }
        }
        _ => match satisfies(env, expr) {
            Satisfiability::Satisfied => env.bottom(),
            _ => env.clone(),
        },
    }
}

impl<T: NonRelationalValue> SemanticDomain for Environment<T> {
    fn assign(
        &self,
        id: &Identifier,
        expr: &SymbolicExpression,
        _pp: &ProgramPoint,
    ) -> Result<Self, SemanticError> {
        Ok(Environment::assign(self, id, eval(self, expr)))
    }

    fn small_step_semantics(
        &self,
        _expr: &SymbolicExpression,
        _pp: &ProgramPoint,
    ) -> Result<Self, SemanticError> {
        // evaluation of heap-free expressions has no effect on a
        // non-relational environment
        Ok(self.clone())
    }

    fn assume(
        &self,
        expr: &SymbolicExpression,
        _src: &ProgramPoint,
        _dest: &ProgramPoint,
    ) -> Result<Self, SemanticError> {
        Ok(assume(self, expr))
    }

    fn satisfies(
        &self,
        expr: &SymbolicExpression,
        _pp: &ProgramPoint,
    ) -> Result<Satisfiability, SemanticError> {
        Ok(satisfies(self, expr))
    }

    fn forget_identifier(&self, id: &Identifier) -> Self {
        self.forget(id)
    }

    fn forget_identifiers_if(&self, predicate: &dyn Fn(&Identifier) -> bool) -> Self {
        self.forget_if(predicate)
    }

    fn push_scope(&self, token: &ScopeToken) -> Result<Self, SemanticError> {
        Ok(Environment::push_scope(self, token))
    }

    fn pop_scope(&self, token: &ScopeToken) -> Result<Self, SemanticError> {
        Ok(Environment::pop_scope(self, token))
    }
}

impl<T: NonRelationalValue> ValueDomain for Environment<T> {
    fn apply_replacement(&self, replacement: &HeapReplacement) -> Self {
        if self.is_bottom() || replacement.is_identity() {
            return self.clone();
        }
        let mut joined = T::bottom_element();
        for source in replacement.sources() {
            joined = joined.lub(&self.get_state(source));
        }
        let mut result = self.forget_if(&|id| replacement.sources().contains(id));
        for target in replacement.targets() {
            // weak targets join with their previous binding inside
            // `Environment::assign`
            result = result.assign(target, joined.clone());
        }
        result
    }
}

/// A pointwise value environment over the given element domain.
pub type ValueEnvironment<T> = Environment<T>;

/// Create a value environment for intraprocedural use.
///
/// Unbound identifiers default to bottom: a read of a never-assigned
/// identifier marks the state unreachable. Callers binding formals (the
/// interprocedural driver, test harnesses) must assign them before the
/// first read, e.g. from `Skip`, which evaluates to top.
pub fn value_environment<T: NonRelationalValue>() -> ValueEnvironment<T> {
    Environment::new(T::bottom_element())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstract_domain::{ConstantDomain, IntervalDomain, Sign};
    use crate::intermediate_representation::{CodeLocation, TypeSet, Variable};

    fn var(name: &str) -> Identifier {
        Identifier::Variable(Variable::new(name, TypeSet::of("int")))
    }

    fn var_expr(name: &str) -> SymbolicExpression {
        SymbolicExpression::Identifier(var(name))
    }

    fn pp() -> ProgramPoint {
        ProgramPoint::new("test", CodeLocation::new("test.src", 1, 0))
    }

    #[test]
    fn constant_evaluation() {
        let env = value_environment::<ConstantDomain>()
            .assign(
                &var("x"),
                &SymbolicExpression::int(3),
                &pp(),
            )
            .unwrap();
        let sum = SymbolicExpression::binary(
            BinaryOperator::Add,
            var_expr("x"),
            SymbolicExpression::int(4),
        );
        assert_eq!(
            eval(&env, &sum),
            ConstantDomain::Value(Constant::Int(7))
        );
    }

    #[test]
    fn small_step_is_idempotent() {
        let env = value_environment::<Sign>();
        let constant = SymbolicExpression::int(5);
        let once = env.small_step_semantics(&constant, &pp()).unwrap();
        let twice = once.small_step_semantics(&constant, &pp()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn assume_refines_intervals() {
        let env = Environment::assign(
            &value_environment::<IntervalDomain>(),
            &var("x"),
            IntervalDomain::unbounded(),
        );
        let guard = SymbolicExpression::binary(
            BinaryOperator::Lt,
            var_expr("x"),
            SymbolicExpression::int(1000),
        );
        let refined = SemanticDomain::assume(&env, &guard, &pp(), &pp()).unwrap();
        assert_eq!(
            refined.get_state(&var("x")),
            IntervalDomain::range(
                crate::abstract_domain::Bound::NegInf,
                crate::abstract_domain::Bound::Int(999)
            )
        );
    }

    #[test]
    fn assume_negated_guard() {
        let env = Environment::assign(
            &value_environment::<IntervalDomain>(),
            &var("n"),
            IntervalDomain::unbounded(),
        );
        let guard = SymbolicExpression::binary(
            BinaryOperator::Le,
            var_expr("n"),
            SymbolicExpression::int(0),
        );
        let refined = SemanticDomain::assume(&env, &guard.negated(), &pp(), &pp()).unwrap();
        assert_eq!(
            refined.get_state(&var("n")),
            IntervalDomain::range(
                crate::abstract_domain::Bound::Int(1),
                crate::abstract_domain::Bound::PosInf
            )
        );
    }

    #[test]
    fn contradictory_assumption_is_bottom() {
        let env = value_environment::<ConstantDomain>()
            .assign(&var("x"), &SymbolicExpression::int(3), &pp())
            .unwrap();
        let guard = SymbolicExpression::binary(
            BinaryOperator::Eq,
            var_expr("x"),
            SymbolicExpression::int(4),
        );
        let refined = SemanticDomain::assume(&env, &guard, &pp(), &pp()).unwrap();
        assert!(refined.is_bottom());
    }

    #[test]
    fn replacement_weakens_values() {
        use crate::intermediate_representation::AllocationSite;
        let strong = Identifier::HeapLocation(AllocationSite::new(
            TypeSet::of("T"),
            CodeLocation::new("test.src", 3, 0),
        ));
        let weak = Identifier::HeapLocation(
            AllocationSite::new(TypeSet::of("T"), CodeLocation::new("test.src", 3, 0))
                .with_weakness(true),
        );
        let env = value_environment::<Sign>().assign(&strong, &SymbolicExpression::int(1), &pp());
        let env = env.unwrap();
        let mut replacement = HeapReplacement::new();
        replacement.add_source(strong.clone());
        replacement.add_target(weak.clone());
        let replaced = env.apply_replacement(&replacement);
        assert!(!replaced.contains(&strong));
        assert_eq!(replaced.get_state(&weak), Sign::Positive);
    }
}
