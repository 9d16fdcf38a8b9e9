//! The type component of composite abstract states: a pointwise
//! environment tracking the sets of runtime types identifiers may have.

use super::{eval, NonRelationalValue, Satisfiability, TypeDomain, ValueDomain};
use crate::abstract_domain::{Environment, Lattice};
use crate::error::SemanticError;
use crate::intermediate_representation::{
    BinaryOperator, Constant, SymbolicExpression, TypeSet, UnaryOperator,
};
use crate::prelude::*;

/// A set of type names as a lattice element. `Any` is top, the empty set
/// is bottom.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct StaticTypes(pub TypeSet);

impl Lattice for StaticTypes {
    fn top(&self) -> Self {
        StaticTypes(TypeSet::any())
    }

    fn bottom(&self) -> Self {
        StaticTypes(TypeSet::empty())
    }

    fn is_top(&self) -> bool {
        self.0.is_any()
    }

    fn is_bottom(&self) -> bool {
        self.0.is_empty()
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        self.0.is_subset_of(&other.0)
    }

    fn lub(&self, other: &Self) -> Self {
        StaticTypes(self.0.union(&other.0))
    }

    fn glb(&self, other: &Self) -> Self {
        StaticTypes(self.0.intersect(&other.0))
    }
}

impl NonRelationalValue for StaticTypes {
    fn top_element() -> Self {
        StaticTypes(TypeSet::any())
    }

    fn bottom_element() -> Self {
        StaticTypes(TypeSet::empty())
    }

    fn eval_constant(constant: &Constant) -> Self {
        StaticTypes(constant.static_types())
    }

    fn eval_unary(op: UnaryOperator, arg: &Self) -> Self {
        if arg.is_bottom() {
            return Self::bottom_element();
        }
        match op {
            UnaryOperator::Negation => StaticTypes(TypeSet::of("int")),
            UnaryOperator::LogicalNot => StaticTypes(TypeSet::of("bool")),
        }
    }

    fn eval_binary(op: BinaryOperator, left: &Self, right: &Self) -> Self {
        use BinaryOperator::*;
        if left.is_bottom() || right.is_bottom() {
            return Self::bottom_element();
        }
        let types = match op {
            Eq | Ne | Lt | Le | Gt | Ge | And | Or => TypeSet::of("bool"),
            StrConcat => TypeSet::of("string"),
            Add | Sub | Mul | Div | Rem => TypeSet::of("int"),
        };
        StaticTypes(types)
    }

    fn satisfies_binary(_op: BinaryOperator, _left: &Self, _right: &Self) -> Satisfiability {
        // types alone cannot decide value comparisons
        Satisfiability::Unknown
    }
}

impl std::fmt::Display for StaticTypes {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// The environment mapping identifiers to their possible runtime types.
pub type TypeEnvironment = Environment<StaticTypes>;

/// Create a type environment for intraprocedural use.
pub fn type_environment() -> TypeEnvironment {
    Environment::new(StaticTypes(TypeSet::empty()))
}

impl TypeDomain for TypeEnvironment {
    fn apply_replacement(&self, replacement: &super::HeapReplacement) -> Self {
        ValueDomain::apply_replacement(self, replacement)
    }

    fn inferred_types(
        &self,
        expr: &SymbolicExpression,
        _pp: &ProgramPoint,
    ) -> Result<TypeSet, SemanticError> {
        Ok(eval(self, expr).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intermediate_representation::{CodeLocation, Identifier, Variable};

    #[test]
    fn assignment_tracks_static_types() {
        let pp = ProgramPoint::new("test", CodeLocation::new("test.src", 1, 0));
        let id = Identifier::Variable(Variable::new("x", TypeSet::of("int")));
        let env = type_environment()
            .assign(&id, &SymbolicExpression::int(3), &pp)
            .unwrap();
        assert_eq!(
            env.inferred_types(&SymbolicExpression::Identifier(id), &pp)
                .unwrap(),
            TypeSet::of("int")
        );
    }

    #[test]
    fn lattice_laws() {
        let samples = [
            StaticTypes(TypeSet::any()),
            StaticTypes(TypeSet::empty()),
            StaticTypes(TypeSet::of("int")),
            StaticTypes(TypeSet::of("bool")),
            StaticTypes(TypeSet::from_names(["int", "bool"])),
        ];
        crate::abstract_domain::tests::assert_lattice_laws(&samples);
    }
}
