//! A reaching-definitions analysis expressed as a value domain.
//!
//! Unlike the non-relational environments, reaching definitions ignore the
//! assigned expression entirely: an assignment maps the assigned
//! identifier to the singleton set holding the program point of the
//! assignment, killing every earlier definition of the same identifier.

use super::{Environment, Lattice, NonRedundantPowerset, Subsumption};
use crate::analysis::{HeapReplacement, Satisfiability, SemanticDomain, ValueDomain};
use crate::error::SemanticError;
use crate::intermediate_representation::{Identifier, ScopeToken, SymbolicExpression};
use crate::prelude::*;

impl Subsumption for CodeLocation {
    /// Definition sites are only comparable by equality.
    fn subsumed_by(&self, _other: &CodeLocation) -> bool {
        false
    }
}

/// The set of program locations whose definitions may reach a point.
pub type DefinitionLocations = NonRedundantPowerset<CodeLocation>;

/// The reaching-definitions domain: for each identifier, the set of
/// locations of the assignments that may have produced its current value.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct ReachingDefinitions {
    env: Environment<DefinitionLocations>,
}

impl ReachingDefinitions {
    /// Create an empty instance: no definitions reach yet.
    pub fn new() -> ReachingDefinitions {
        ReachingDefinitions {
            env: Environment::new(NonRedundantPowerset::empty()),
        }
    }

    /// The definitions reaching the given identifier.
    pub fn get_state(&self, id: &Identifier) -> DefinitionLocations {
        self.env.get_state(id)
    }

    fn with_env(env: Environment<DefinitionLocations>) -> ReachingDefinitions {
        ReachingDefinitions { env }
    }
}

impl Default for ReachingDefinitions {
    fn default() -> ReachingDefinitions {
        ReachingDefinitions::new()
    }
}

impl Lattice for ReachingDefinitions {
    fn top(&self) -> Self {
        ReachingDefinitions::with_env(self.env.top())
    }

    fn bottom(&self) -> Self {
        ReachingDefinitions::with_env(self.env.bottom())
    }

    fn is_top(&self) -> bool {
        self.env.is_top()
    }

    fn is_bottom(&self) -> bool {
        self.env.is_bottom()
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        self.env.less_or_equal(&other.env)
    }

    fn lub(&self, other: &Self) -> Self {
        ReachingDefinitions::with_env(self.env.lub(&other.env))
    }

    fn glb(&self, other: &Self) -> Self {
        ReachingDefinitions::with_env(self.env.glb(&other.env))
    }
}

impl SemanticDomain for ReachingDefinitions {
    fn assign(
        &self,
        id: &Identifier,
        _expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<Self, SemanticError> {
        let generated = NonRedundantPowerset::singleton(pp.location.clone());
        Ok(ReachingDefinitions::with_env(self.env.assign(id, generated)))
    }

    fn small_step_semantics(
        &self,
        _expr: &SymbolicExpression,
        _pp: &ProgramPoint,
    ) -> Result<Self, SemanticError> {
        Ok(self.clone())
    }

    fn assume(
        &self,
        _expr: &SymbolicExpression,
        _src: &ProgramPoint,
        _dest: &ProgramPoint,
    ) -> Result<Self, SemanticError> {
        // guards neither generate nor kill definitions
        Ok(self.clone())
    }

    fn satisfies(
        &self,
        _expr: &SymbolicExpression,
        _pp: &ProgramPoint,
    ) -> Result<Satisfiability, SemanticError> {
        Ok(Satisfiability::Unknown)
    }

    fn forget_identifier(&self, id: &Identifier) -> Self {
        ReachingDefinitions::with_env(self.env.forget(id))
    }

    fn forget_identifiers_if(&self, predicate: &dyn Fn(&Identifier) -> bool) -> Self {
        ReachingDefinitions::with_env(self.env.forget_if(predicate))
    }

    fn push_scope(&self, token: &ScopeToken) -> Result<Self, SemanticError> {
        Ok(ReachingDefinitions::with_env(self.env.push_scope(token)))
    }

    fn pop_scope(&self, token: &ScopeToken) -> Result<Self, SemanticError> {
        Ok(ReachingDefinitions::with_env(self.env.pop_scope(token)))
    }
}

impl ValueDomain for ReachingDefinitions {
    fn apply_replacement(&self, replacement: &HeapReplacement) -> Self {
        if self.env.is_bottom() || replacement.is_identity() {
            return self.clone();
        }
        let mut joined = NonRedundantPowerset::empty();
        for source in replacement.sources() {
            joined = joined.lub(&self.env.get_state(source));
        }
        let mut env = self
            .env
            .forget_if(&|id| replacement.sources().contains(id));
        for target in replacement.targets() {
            env = env.assign(target, joined.clone());
        }
        ReachingDefinitions::with_env(env)
    }
}

impl std::fmt::Display for ReachingDefinitions {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intermediate_representation::{CodeLocation, TypeSet, Variable};

    fn var(name: &str) -> Identifier {
        Identifier::Variable(Variable::new(name, TypeSet::of("int")))
    }

    fn pp(line: u32) -> ProgramPoint {
        ProgramPoint::new("test", CodeLocation::new("test.src", line, 0))
    }

    #[test]
    fn assignment_kills_previous_definitions() {
        let defs = ReachingDefinitions::new()
            .assign(&var("x"), &SymbolicExpression::int(1), &pp(1))
            .unwrap()
            .assign(&var("x"), &SymbolicExpression::int(2), &pp(2))
            .unwrap();
        let expected: DefinitionLocations =
            [CodeLocation::new("test.src", 2, 0)].into_iter().collect();
        assert_eq!(defs.get_state(&var("x")), expected);
    }

    #[test]
    fn join_accumulates_definitions() {
        let base = ReachingDefinitions::new();
        let left = base
            .assign(&var("x"), &SymbolicExpression::int(1), &pp(2))
            .unwrap();
        let right = base
            .assign(&var("x"), &SymbolicExpression::int(2), &pp(3))
            .unwrap();
        let joined = left.lub(&right);
        let expected: DefinitionLocations = [
            CodeLocation::new("test.src", 2, 0),
            CodeLocation::new("test.src", 3, 0),
        ]
        .into_iter()
        .collect();
        assert_eq!(joined.get_state(&var("x")), expected);
    }
}
