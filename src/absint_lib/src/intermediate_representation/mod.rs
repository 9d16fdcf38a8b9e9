//! The language-independent program representation consumed by the engine.
//!
//! Frontends lower source programs into [`Cfg`]s whose statements root
//! [`SymbolicExpression`] trees. The engine never inspects source syntax:
//! everything it knows about a program is contained in the types of this
//! module.

use crate::prelude::*;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::sync::Arc;

mod cfg;
pub use cfg::*;

mod expression;
pub use expression::*;

/// A location in the analyzed program.
///
/// Code locations are the stable identity used for allocation sites,
/// context-sensitivity tokens and warnings. Two statements with the same
/// location are considered the same program point.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct CodeLocation {
    /// The name of the source unit (file, compilation unit, ...) the
    /// location belongs to.
    pub source: String,
    /// The line within the source unit, 1-based.
    pub line: u32,
    /// The column within the line, 0-based.
    pub column: u32,
}

impl CodeLocation {
    /// Create a new code location.
    pub fn new(source: impl ToString, line: u32, column: u32) -> CodeLocation {
        CodeLocation {
            source: source.to_string(),
            line,
            column,
        }
    }

    /// Create a location that does not correspond to any source position.
    ///
    /// Synthetic locations are used for engine-generated entities like
    /// return-value meta variables.
    pub fn synthetic(id: impl std::fmt::Display) -> CodeLocation {
        CodeLocation {
            source: format!("<{id}>"),
            line: 0,
            column: 0,
        }
    }
}

impl std::fmt::Display for CodeLocation {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{}:{}:{}", self.source, self.line, self.column)
    }
}

/// A program point: a code location inside a specific CFG.
///
/// Semantic operations receive the program point where they are evaluated,
/// so that domains can derive stable identities (e.g. allocation sites)
/// from it.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct ProgramPoint {
    /// The name of the CFG containing the program point.
    pub cfg: String,
    /// The location of the statement rooting the evaluated expression.
    pub location: CodeLocation,
}

impl ProgramPoint {
    /// Create a new program point.
    pub fn new(cfg: impl ToString, location: CodeLocation) -> ProgramPoint {
        ProgramPoint {
            cfg: cfg.to_string(),
            location,
        }
    }
}

impl std::fmt::Display for ProgramPoint {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{}@{}", self.cfg, self.location)
    }
}

/// The set of static types attached to an expression.
///
/// The engine treats types as opaque names provided by the frontend's type
/// system. `Any` is the set of all types and acts as the top element of the
/// powerset ordering.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum TypeSet {
    /// The set of all types.
    Any,
    /// A finite set of type names.
    Set(Arc<BTreeSet<String>>),
}

impl TypeSet {
    /// The set of all types.
    pub fn any() -> TypeSet {
        TypeSet::Any
    }

    /// The empty type set.
    pub fn empty() -> TypeSet {
        TypeSet::Set(Arc::new(BTreeSet::new()))
    }

    /// A singleton type set.
    pub fn of(type_name: impl ToString) -> TypeSet {
        TypeSet::Set(Arc::new(std::iter::once(type_name.to_string()).collect()))
    }

    /// Build a type set from an iterator of type names.
    pub fn from_names<I: IntoIterator<Item = S>, S: ToString>(names: I) -> TypeSet {
        TypeSet::Set(Arc::new(
            names.into_iter().map(|name| name.to_string()).collect(),
        ))
    }

    /// Returns whether this is the set of all types.
    pub fn is_any(&self) -> bool {
        matches!(self, TypeSet::Any)
    }

    /// Returns whether the set contains no types.
    pub fn is_empty(&self) -> bool {
        match self {
            TypeSet::Any => false,
            TypeSet::Set(types) => types.is_empty(),
        }
    }

    /// Set union.
    pub fn union(&self, other: &TypeSet) -> TypeSet {
        match (self, other) {
            (TypeSet::Any, _) | (_, TypeSet::Any) => TypeSet::Any,
            (TypeSet::Set(left), TypeSet::Set(right)) => {
                TypeSet::Set(Arc::new(left.union(right).cloned().collect()))
            }
        }
    }

    /// Set intersection.
    pub fn intersect(&self, other: &TypeSet) -> TypeSet {
        match (self, other) {
            (TypeSet::Any, other) => other.clone(),
            (this, TypeSet::Any) => this.clone(),
            (TypeSet::Set(left), TypeSet::Set(right)) => {
                TypeSet::Set(Arc::new(left.intersection(right).cloned().collect()))
            }
        }
    }

    /// Returns whether `self` is contained in `other`.
    pub fn is_subset_of(&self, other: &TypeSet) -> bool {
        match (self, other) {
            (_, TypeSet::Any) => true,
            (TypeSet::Any, TypeSet::Set(_)) => false,
            (TypeSet::Set(left), TypeSet::Set(right)) => left.is_subset(right),
        }
    }
}

impl std::fmt::Display for TypeSet {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TypeSet::Any => write!(formatter, "*"),
            TypeSet::Set(types) => write!(formatter, "[{}]", types.iter().join(", ")),
        }
    }
}

/// A literal value embedded in an expression, together with its type.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum Constant {
    /// A mathematical integer constant.
    Int(i64),
    /// A boolean constant.
    Bool(bool),
    /// A string constant.
    Str(String),
}

impl Constant {
    /// The static type of the constant.
    pub fn static_types(&self) -> TypeSet {
        match self {
            Constant::Int(_) => TypeSet::of("int"),
            Constant::Bool(_) => TypeSet::of("bool"),
            Constant::Str(_) => TypeSet::of("string"),
        }
    }
}

impl std::fmt::Display for Constant {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Constant::Int(value) => write!(formatter, "{value}"),
            Constant::Bool(value) => write!(formatter, "{value}"),
            Constant::Str(value) => write!(formatter, "\"{value}\""),
        }
    }
}

/// The operators of unary expressions.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum UnaryOperator {
    /// Arithmetic negation.
    Negation,
    /// Boolean negation.
    LogicalNot,
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            UnaryOperator::Negation => write!(formatter, "-"),
            UnaryOperator::LogicalNot => write!(formatter, "!"),
        }
    }
}

/// The operators of binary expressions.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum BinaryOperator {
    /// Integer addition.
    Add,
    /// Integer subtraction.
    Sub,
    /// Integer multiplication.
    Mul,
    /// Integer division.
    Div,
    /// Integer remainder.
    Rem,
    /// Equality comparison.
    Eq,
    /// Inequality comparison.
    Ne,
    /// Strictly-less comparison.
    Lt,
    /// Less-or-equal comparison.
    Le,
    /// Strictly-greater comparison.
    Gt,
    /// Greater-or-equal comparison.
    Ge,
    /// Boolean conjunction.
    And,
    /// Boolean disjunction.
    Or,
    /// String concatenation.
    StrConcat,
}

impl BinaryOperator {
    /// Returns whether the operator is a comparison producing a boolean.
    pub fn is_comparison(&self) -> bool {
        use BinaryOperator::*;
        matches!(self, Eq | Ne | Lt | Le | Gt | Ge)
    }

    /// The comparison holding exactly when this one does not.
    ///
    /// Returns `None` for non-comparison operators.
    pub fn negate(&self) -> Option<BinaryOperator> {
        use BinaryOperator::*;
        match self {
            Eq => Some(Ne),
            Ne => Some(Eq),
            Lt => Some(Ge),
            Le => Some(Gt),
            Gt => Some(Le),
            Ge => Some(Lt),
            _ => None,
        }
    }

    /// The comparison obtained by swapping the operands of this one.
    ///
    /// Returns `None` for non-comparison operators.
    pub fn flip(&self) -> Option<BinaryOperator> {
        use BinaryOperator::*;
        match self {
            Eq => Some(Eq),
            Ne => Some(Ne),
            Lt => Some(Gt),
            Le => Some(Ge),
            Gt => Some(Lt),
            Ge => Some(Le),
            _ => None,
        }
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        use BinaryOperator::*;
        let symbol = match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            And => "&&",
            Or => "||",
            StrConcat => "++",
        };
        write!(formatter, "{symbol}")
    }
}

/// The operators of ternary expressions.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum TernaryOperator {
    /// The conditional choice `cond ? then : else`.
    Conditional,
}

impl std::fmt::Display for TernaryOperator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TernaryOperator::Conditional => write!(formatter, "?:"),
        }
    }
}
