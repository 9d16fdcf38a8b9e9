//! Context-sensitivity tokens: bounded abstractions of the call stack.

use crate::prelude::*;
use itertools::Itertools;
use std::sync::Arc;

/// A finite abstraction of the call stack, tracking the last `k` call
/// sites.
///
/// Tokens are the cache key for interprocedural summaries: two calls to
/// the same CFG under equal tokens share one summary. With `k = 0` the
/// analysis is context-insensitive and every CFG has a single summary.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct ContextSensitivityToken {
    sites: Arc<Vec<CodeLocation>>,
    k: usize,
}

impl ContextSensitivityToken {
    /// The starting token marking a root entry, with the given sensitivity
    /// bound.
    pub fn starting(k: usize) -> ContextSensitivityToken {
        ContextSensitivityToken {
            sites: Arc::new(Vec::new()),
            k,
        }
    }

    /// The token obtained by pushing a call site, discarding sites beyond
    /// the sensitivity bound.
    pub fn push(&self, call_site: &CodeLocation) -> ContextSensitivityToken {
        if self.k == 0 {
            return self.clone();
        }
        let mut sites: Vec<CodeLocation> = self.sites.as_ref().clone();
        sites.push(call_site.clone());
        let excess = sites.len().saturating_sub(self.k);
        if excess > 0 {
            sites.drain(..excess);
        }
        ContextSensitivityToken {
            sites: Arc::new(sites),
            k: self.k,
        }
    }

    /// Returns whether this is a starting token.
    pub fn is_starting(&self) -> bool {
        self.sites.is_empty()
    }

    /// The tracked call sites, oldest first.
    pub fn sites(&self) -> &[CodeLocation] {
        &self.sites
    }
}

impl std::fmt::Display for ContextSensitivityToken {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.sites.is_empty() {
            return write!(formatter, "<root>");
        }
        write!(formatter, "[{}]", self.sites.iter().join(", "))
    }
}
