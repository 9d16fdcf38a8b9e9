/*!
# absint_lib

A modular abstract-interpretation framework for whole-program static
analysis of imperative code.

Source programs are lowered by language frontends into
[control-flow graphs](intermediate_representation::Cfg) over a small set of
[symbolic expressions](intermediate_representation::SymbolicExpression).
The engine then computes a sound fixpoint of user-chosen abstract domains
over those graphs, both intraprocedurally and interprocedurally (with
context sensitivity and recursion handling), and produces per-program-point
abstract states suitable for checks and visualization.

The main entry point is the [`pipeline::Analyzer`], which is configured
through an explicit [`pipeline::AnalysisConfig`] record and returns the
warnings emitted by the registered checks.
*/

pub mod abstract_domain;
pub mod analysis;
pub mod checkers;
pub mod error;
pub mod intermediate_representation;
pub mod pipeline;
pub mod utils;

mod prelude {
    pub use serde::{Deserialize, Serialize};

    pub use crate::intermediate_representation::{CodeLocation, ProgramPoint};
    pub use anyhow::{anyhow, Error};
}

#[cfg(test)]
pub mod test_helpers;
