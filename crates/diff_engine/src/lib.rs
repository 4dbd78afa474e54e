//! Diff Engine - Semantic edit scripts between program trees
//!
//! Implements the GumTree two-phase matcher over [`ast_model`] trees, the
//! closed set of tree edit operations, the five-phase edit-script
//! synthesizer, and the weighted script distance. The pipeline is
//! `compute_gumtree_mappings` → `compute_edit_script` → `compute_distance`,
//! with every step synchronous and deterministic.

mod diff;
mod distance;
mod edit;
mod error;
mod gumtree;
mod mappings;
mod util;

pub use diff::*;
pub use distance::*;
pub use edit::*;
pub use error::*;
pub use gumtree::*;
pub use mappings::*;
pub use util::*;
