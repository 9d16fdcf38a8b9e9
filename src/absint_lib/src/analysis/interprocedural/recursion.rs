//! Bookkeeping for strongly-connected components of mutually recursive
//! calls.

use super::ContextSensitivityToken;
use crate::analysis::{AbstractState, AnalysisState};
use crate::intermediate_representation::Call;
use std::collections::BTreeSet;

/// A detected recursion: the call that closed the cycle, the CFG acting
/// as the head of the strongly-connected component, the members of the
/// component, the token the recursion was entered with, and the entry
/// state of the head when the recursion started.
///
/// The driver iterates the component as a nested fixpoint until the head's
/// summary stabilizes; the record delimits which summaries take part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recursion<A: AbstractState> {
    start: Call,
    head: String,
    members: BTreeSet<String>,
    invocation_token: ContextSensitivityToken,
    entry_state: AnalysisState<A>,
}

impl<A: AbstractState> Recursion<A> {
    /// Create a new recursion record.
    pub fn new(
        start: Call,
        head: String,
        members: BTreeSet<String>,
        invocation_token: ContextSensitivityToken,
        entry_state: AnalysisState<A>,
    ) -> Recursion<A> {
        Recursion {
            start,
            head,
            members,
            invocation_token,
            entry_state,
        }
    }

    /// The call that closed the recursive cycle.
    pub fn start(&self) -> &Call {
        &self.start
    }

    /// The CFG at the head of the component.
    pub fn head(&self) -> &str {
        &self.head
    }

    /// The CFGs involved in the component.
    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }

    /// The token the recursion was entered with.
    pub fn invocation_token(&self) -> &ContextSensitivityToken {
        &self.invocation_token
    }

    /// The entry state of the head when the recursion started.
    pub fn entry_state(&self) -> &AnalysisState<A> {
        &self.entry_state
    }
}
