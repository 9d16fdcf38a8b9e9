//! The capability traits implemented by semantic domains, and the
//! replacement data they exchange.

use crate::abstract_domain::Lattice;
use crate::error::SemanticError;
use crate::intermediate_representation::{
    ExpressionSet, Identifier, ScopeToken, SymbolicExpression, TypeSet,
};
use crate::prelude::*;
use itertools::Itertools;
use std::collections::BTreeSet;

/// The result of checking whether an abstract state satisfies an
/// expression.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum Satisfiability {
    /// The expression is satisfied by all concrete states represented by
    /// the abstract state.
    Satisfied,
    /// The expression is satisfied by none of the represented states.
    NotSatisfied,
    /// The expression may or may not be satisfied.
    Unknown,
}

impl Satisfiability {
    /// The satisfiability of the negated expression.
    pub fn negate(&self) -> Satisfiability {
        match self {
            Satisfiability::Satisfied => Satisfiability::NotSatisfied,
            Satisfiability::NotSatisfied => Satisfiability::Satisfied,
            Satisfiability::Unknown => Satisfiability::Unknown,
        }
    }

    /// The satisfiability of the conjunction of two expressions.
    pub fn and(&self, other: &Satisfiability) -> Satisfiability {
        use Satisfiability::*;
        match (self, other) {
            (NotSatisfied, _) | (_, NotSatisfied) => NotSatisfied,
            (Satisfied, Satisfied) => Satisfied,
            _ => Unknown,
        }
    }

    /// The satisfiability of the disjunction of two expressions.
    pub fn or(&self, other: &Satisfiability) -> Satisfiability {
        use Satisfiability::*;
        match (self, other) {
            (Satisfied, _) | (_, Satisfied) => Satisfied,
            (NotSatisfied, NotSatisfied) => NotSatisfied,
            _ => Unknown,
        }
    }

    /// The join of two verdicts: agreement survives, disagreement becomes
    /// unknown.
    pub fn lub(&self, other: &Satisfiability) -> Satisfiability {
        if self == other {
            *self
        } else {
            Satisfiability::Unknown
        }
    }

    /// The meet of two verdicts: a definite verdict wins over unknown;
    /// conflicting definite verdicts degrade to unknown.
    pub fn glb(&self, other: &Satisfiability) -> Satisfiability {
        use Satisfiability::*;
        match (self, other) {
            (Unknown, verdict) | (verdict, Unknown) => *verdict,
            (left, right) if left == right => *left,
            _ => Unknown,
        }
    }
}

impl From<bool> for Satisfiability {
    fn from(value: bool) -> Satisfiability {
        if value {
            Satisfiability::Satisfied
        } else {
            Satisfiability::NotSatisfied
        }
    }
}

/// A declarative renaming of identifiers propagated across domains.
///
/// Every occurrence of a source identifier in downstream abstract values
/// must be substituted by the targets, joining the images of all targets.
/// A replacement with equal source and target sets is the identity.
/// Replacements compose by list concatenation, which is associative.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord, Default)]
pub struct HeapReplacement {
    sources: BTreeSet<Identifier>,
    targets: BTreeSet<Identifier>,
}

impl HeapReplacement {
    /// Create an empty replacement.
    pub fn new() -> HeapReplacement {
        HeapReplacement::default()
    }

    /// Add an identifier to be replaced.
    pub fn add_source(&mut self, id: Identifier) {
        self.sources.insert(id);
    }

    /// Add an identifier replacing the sources.
    pub fn add_target(&mut self, id: Identifier) {
        self.targets.insert(id);
    }

    /// The identifiers to be replaced.
    pub fn sources(&self) -> &BTreeSet<Identifier> {
        &self.sources
    }

    /// The identifiers replacing the sources.
    pub fn targets(&self) -> &BTreeSet<Identifier> {
        &self.targets
    }

    /// Returns whether applying the replacement changes nothing.
    pub fn is_identity(&self) -> bool {
        self.sources == self.targets
    }
}

impl std::fmt::Display for HeapReplacement {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            "{{{}}} -> {{{}}}",
            self.sources.iter().join(", "),
            self.targets.iter().join(", ")
        )
    }
}

/// A lattice that can interpret symbolic expressions.
///
/// Every transition is functional: the receiver is left untouched and a
/// fresh domain instance is returned.
pub trait SemanticDomain: Lattice {
    /// The state after assigning the given expression to the given
    /// identifier at the given program point.
    fn assign(
        &self,
        id: &Identifier,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<Self, SemanticError>;

    /// The state after evaluating the expression without committing an
    /// assignment.
    fn small_step_semantics(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<Self, SemanticError>;

    /// The state refined by assuming the expression holds on the edge from
    /// `src` to `dest`.
    fn assume(
        &self,
        expr: &SymbolicExpression,
        src: &ProgramPoint,
        dest: &ProgramPoint,
    ) -> Result<Self, SemanticError>;

    /// Whether the state satisfies the given expression.
    fn satisfies(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<Satisfiability, SemanticError>;

    /// The state with all knowledge about the given identifier dropped.
    fn forget_identifier(&self, id: &Identifier) -> Self;

    /// The state with all knowledge about the matching identifiers
    /// dropped.
    fn forget_identifiers_if(&self, predicate: &dyn Fn(&Identifier) -> bool) -> Self;

    /// The state visible after entering the scope identified by the token.
    fn push_scope(&self, token: &ScopeToken) -> Result<Self, SemanticError>;

    /// The state visible after leaving the scope identified by the token.
    fn pop_scope(&self, token: &ScopeToken) -> Result<Self, SemanticError>;
}

/// The capability of symbolic-memory abstractions.
///
/// Heap domains resolve heap forms to identifiers and communicate the
/// renamings ("replacements") their transitions cause to the other
/// domains of a composite state.
pub trait HeapDomain: SemanticDomain {
    /// Rewrite an expression into the set of heap-free expressions the
    /// value domain interprets in its place.
    fn rewrite(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<ExpressionSet, SemanticError>;

    /// The replacements produced by the transition that created this
    /// instance. Substitutions are transient: they do not partake in the
    /// partial order.
    fn substitution(&self) -> &[HeapReplacement];
}

/// The capability of domains tracking values of identifiers.
pub trait ValueDomain: SemanticDomain {
    /// The state after substituting the replacement's source identifiers
    /// with its targets.
    fn apply_replacement(&self, replacement: &HeapReplacement) -> Self;
}

/// The capability of domains tracking runtime types of identifiers.
pub trait TypeDomain: SemanticDomain {
    /// The state after substituting the replacement's source identifiers
    /// with its targets.
    fn apply_replacement(&self, replacement: &HeapReplacement) -> Self;

    /// The types the domain can infer for the given expression.
    fn inferred_types(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<TypeSet, SemanticError>;
}

/// The capability of full abstract states: semantic domains that can also
/// resolve arbitrary expressions to identifiers via their heap component.
pub trait AbstractState: SemanticDomain {
    /// Rewrite an expression into the set of heap-free expressions.
    fn rewrite(
        &self,
        expr: &SymbolicExpression,
        pp: &ProgramPoint,
    ) -> Result<ExpressionSet, SemanticError>;
}
