//! The error taxonomy of the analysis engine.
//!
//! Domain operations never signal ordinary imprecision through errors:
//! unrepresentable inputs are soundly over-approximated to top, and bottom
//! is reserved for unreachability. The errors below mark genuine failures:
//! misconfiguration, malformed input programs, refused semantic steps and
//! broken fixpoints.

use crate::intermediate_representation::CodeLocation;
use thiserror::Error;

/// Misconfiguration detected before the fixpoint starts. Setup errors
/// abort the entire run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid setup: {message}")]
pub struct SetupError {
    /// Description of the misconfiguration.
    pub message: String,
}

impl SetupError {
    /// Create a new setup error.
    pub fn new(message: impl ToString) -> SetupError {
        SetupError {
            message: message.to_string(),
        }
    }
}

/// A malformed program handed over by a frontend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed program: {message}")]
pub struct ValidationError {
    /// Description of the malformation.
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(message: impl ToString) -> ValidationError {
        ValidationError {
            message: message.to_string(),
        }
    }
}

/// A violated lattice invariant.
///
/// Lattice operations are total on ordinary values; this error only
/// signals broken internal invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lattice invariant violated: {message}")]
pub struct LatticeError {
    /// Description of the violated invariant.
    pub message: String,
}

impl LatticeError {
    /// Create a new lattice error.
    pub fn new(message: impl ToString) -> LatticeError {
        LatticeError {
            message: message.to_string(),
        }
    }
}

/// A domain operation refused a semantic step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    /// Rewriting the target of an assignment did not produce an
    /// identifier.
    #[error("rewriting '{expression}' did not produce an identifier: {rewritten}")]
    NotAnIdentifier {
        /// The expression that was rewritten.
        expression: String,
        /// The offending rewriting result.
        rewritten: String,
    },
    /// Rewriting an expression produced no candidates at all.
    #[error("rewriting '{expression}' produced no expressions")]
    EmptyRewrite {
        /// The expression that was rewritten.
        expression: String,
    },
    /// A scope operation was applied to a state it does not fit.
    #[error("cannot {operation} scope {token}: {message}")]
    Scope {
        /// The operation that failed, `push` or `pop`.
        operation: String,
        /// The display form of the scope token.
        token: String,
        /// Description of the failure.
        message: String,
    },
    /// A violated lattice invariant surfaced during a semantic step.
    #[error(transparent)]
    Lattice(#[from] LatticeError),
}

/// Call resolution failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallGraphError {
    /// No target could be resolved for a call and the open-call policy
    /// forbids continuing.
    #[error("cannot resolve call to '{callee}' at {location}")]
    UnresolvedCall {
        /// The name of the unresolved callee.
        callee: String,
        /// The location of the call site.
        location: CodeLocation,
    },
    /// A call has a different number of arguments than the callee has
    /// formals.
    #[error("call to '{callee}' at {location} passes {actuals} arguments, expected {formals}")]
    ArityMismatch {
        /// The name of the callee.
        callee: String,
        /// The location of the call site.
        location: CodeLocation,
        /// Number of actual arguments at the call site.
        actuals: usize,
        /// Number of formal parameters of the callee.
        formals: usize,
    },
}

/// A fixpoint computation aborted.
///
/// Carries the program point of the offending node and the semantic error
/// that caused the abort. Partial results of other CFGs are preserved by
/// the driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("fixpoint computation failed at {location}: {source}")]
pub struct FixpointError {
    /// The location of the node whose semantics failed.
    pub location: CodeLocation,
    /// The underlying semantic failure.
    pub source: SemanticError,
}

/// The umbrella error type surfaced by the analysis driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Misconfiguration before the fixpoint; aborts the whole run.
    #[error(transparent)]
    Setup(#[from] SetupError),
    /// Malformed program from the frontend.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A domain operation refused a step outside of a fixpoint.
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    /// Call resolution failed.
    #[error(transparent)]
    CallGraph(#[from] CallGraphError),
    /// A fixpoint computation aborted.
    #[error(transparent)]
    Fixpoint(#[from] FixpointError),
    /// The run was cancelled cooperatively.
    #[error("analysis cancelled")]
    Cancelled,
}

/// Popping or peeking an empty working set.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("the working set is empty")]
pub struct WorkingSetEmpty;
