//! Modules necessary for fixpoint-based analyses: the semantic-domain
//! capability traits, the shipped heap/value/type domains, the composite
//! abstract state, and the intra- and interprocedural fixpoint engines.

mod analysis_state;
pub use analysis_state::*;

pub mod callgraph;

mod cfg_fixpoint;
pub use cfg_fixpoint::*;

mod domain;
pub use domain::*;

mod heap;
pub use heap::*;

pub mod interprocedural;

mod state;
pub use state::*;

mod types;
pub use types::*;

mod value;
pub use value::*;

mod worklist;
pub use worklist::*;
